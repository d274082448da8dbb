//! Executor error types.

use relay_broker::BrokerError;
use relay_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("Validation error: {0}")]
    Validation(#[from] CoreError),

    #[error("Invalid instruction: {0}")]
    InvalidInstruction(String),

    /// The queue was stopped; no further instructions are accepted.
    #[error("Trade queue is closed")]
    QueueClosed,
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;

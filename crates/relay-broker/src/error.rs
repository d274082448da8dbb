//! Broker error types.

use relay_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    /// Exchange rejected the request timestamp (outside the receive window).
    #[error("Timestamp window rejected ({code}): {message}")]
    ClockSkew { code: i64, message: String },

    /// Connection, timeout, DNS or gateway failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Any other non-zero result code. Never retried.
    #[error("{message} (ErrCode: {code})")]
    Exchange { code: i64, message: String },

    #[error("No instrument info for {0}")]
    NoInstrument(String),

    #[error("Validation error: {0}")]
    Validation(#[from] CoreError),

    #[error("Response decode error: {0}")]
    Decode(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("{op} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        op: String,
        attempts: u32,
        last: Box<BrokerError>,
    },

    #[error("{0} abandoned: shutdown requested")]
    Cancelled(String),
}

impl BrokerError {
    /// Whether the retry loop may try the call again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ClockSkew { .. } | Self::Transport(_))
    }
}

pub type BrokerResult<T> = Result<T, BrokerError>;

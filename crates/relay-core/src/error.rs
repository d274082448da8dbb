//! Error types for relay-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Invalid step: {0}")]
    InvalidStep(String),

    #[error("Arithmetic overflow: {0}")]
    Overflow(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

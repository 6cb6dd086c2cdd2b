//! Protocol error types

use thiserror::Error;

/// Errors raised while encoding or writing protocol messages
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// JSON serialization error from serde_json
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error while writing a report line
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;

//! Error types for labwire.

use thiserror::Error;

/// Main error type for all relay operations.
#[derive(Debug, Error)]
pub enum RelayError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Addressed client has no live connection.
    #[error("client not found: {0}")]
    ClientNotFound(String),

    /// No response arrived within the configured deadline.
    #[error("client response timed out")]
    ResponseTimeout,

    /// Frame decode failure (oversized length prefix, bad JSON).
    ///
    /// Terminates the connection it occurred on; never surfaced to
    /// unrelated callers.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Connection closed while a write or wait was in progress.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Result type alias using RelayError.
pub type Result<T> = std::result::Result<T, RelayError>;

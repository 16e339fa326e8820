//! Outbox error types.

use thiserror::Error;

/// Outbox error type.
#[derive(Error, Debug)]
pub enum OutboxError {
    /// Core error (configuration, paths, record encoding)
    #[error("Core error: {0}")]
    Core(#[from] beacon_core::CoreError),

    /// IO error on the durable log
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Cursor file holds something other than a byte offset
    #[error("Corrupt cursor file: {0}")]
    CorruptCursor(String),

    /// Operation needs a tokio runtime
    #[error("No tokio runtime available")]
    NoRuntime,
}

/// Result type alias using OutboxError.
pub type OutboxResult<T> = Result<T, OutboxError>;

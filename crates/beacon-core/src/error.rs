//! Core error types.

use thiserror::Error;

/// Core error type.
#[derive(Error, Debug)]
pub enum CoreError {
    /// App key is not `{prefix}-{region}-{id}` or names an unknown region
    #[error("Invalid app key: {0}")]
    InvalidAppKey(String),

    /// Event names must be non-empty
    #[error("Event name must not be empty")]
    EmptyEventName,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Path error (e.g., cache directory not found)
    #[error("Path error: {0}")]
    Path(String),
}

/// Result type alias using CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

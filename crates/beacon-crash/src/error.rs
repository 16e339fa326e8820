//! Crash reporting error types.

use thiserror::Error;

/// Crash reporting error type.
#[derive(Error, Debug)]
pub enum CrashError {
    /// Failed to register an OS signal handler
    #[error("Signal registration failed: {0}")]
    Signal(#[from] std::io::Error),

    /// A source can only feed one reporter
    #[error("Failure source already registered: {0}")]
    AlreadyRegistered(&'static str),
}

/// Result type alias using CrashError.
pub type CrashResult<T> = Result<T, CrashError>;

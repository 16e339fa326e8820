//! Transport error types.

use thiserror::Error;

/// Transport error type.
///
/// These only surface while building a transport. Once built, every send
/// resolves to a [`SendOutcome`](crate::SendOutcome) instead.
#[derive(Error, Debug)]
pub enum TransportError {
    /// App key or host configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] beacon_core::CoreError),

    /// Self-hosted region without a host override
    #[error("Host must be set when using a self-hosted app key")]
    MissingHost,

    /// HTTP client construction error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias using TransportError.
pub type TransportResult<T> = Result<T, TransportError>;

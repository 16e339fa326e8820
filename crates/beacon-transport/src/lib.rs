//! Collector transport for Beacon.
//!
//! Resolves the collector base URL from the app key's region and sends one
//! [`EventRecord`](beacon_core::EventRecord) per request. Every send ends in a
//! [`SendOutcome`]; the classification decides whether the pipeline drops
//! the record or backs off and retries:
//!
//! | Response                    | Outcome      |
//! |-----------------------------|--------------|
//! | 2xx                         | `Delivered`  |
//! | 4xx except 408/429          | `Rejected`   |
//! | 408, 429, 5xx, network error | `Retryable`  |
//! | transport disabled          | `Disabled`   |

mod endpoint;
mod error;
mod http;
mod outcome;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use beacon_core::EventRecord;

pub use endpoint::{resolve_base_url, APP_KEY_HEADER, EVENT_PATH};
pub use error::{TransportError, TransportResult};
pub use http::HttpTransport;
pub use outcome::{classify_status, SendOutcome};

/// Sends one event to the collector.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a stamped record. Never fails; the outcome says what happened.
    async fn send(&self, record: &EventRecord) -> SendOutcome;

    /// Whether sends can reach a collector at all.
    fn is_enabled(&self) -> bool {
        true
    }
}

//! HTTP transport.

use crate::endpoint::{event_url, resolve_base_url, APP_KEY_HEADER};
use crate::{classify_status, SendOutcome, Transport, TransportResult};
use async_trait::async_trait;
use beacon_core::{AppKey, BeaconConfig, EventRecord, Region};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Resolved collector connection.
struct Endpoint {
    client: Client,
    event_url: String,
    app_key: String,
}

/// Posts events to the collector.
///
/// A transport built from a bad app key or an incomplete self-hosted
/// configuration is permanently disabled: it is logged once here and every
/// later send is a silent no-op.
pub struct HttpTransport {
    endpoint: Option<Endpoint>,
}

impl HttpTransport {
    /// Build from configuration. Never fails; misconfiguration disables it.
    pub fn from_config(config: &BeaconConfig) -> Self {
        match Self::try_from_config(config) {
            Ok(transport) => transport,
            Err(e) => {
                warn!(
                    app_key = %config.app_key,
                    error = %e,
                    "Beacon app key or host is invalid, tracking will be disabled"
                );
                Self::disabled()
            }
        }
    }

    /// Build from configuration, reporting why it could not be enabled.
    pub fn try_from_config(config: &BeaconConfig) -> TransportResult<Self> {
        let app_key = config.parsed_app_key()?;
        let base_url = resolve_base_url(&app_key, config.host.as_deref())?;
        let client = build_client(&app_key, config.request_timeout())?;

        info!(
            region = app_key.region().code(),
            base_url = %base_url,
            "Beacon transport ready"
        );

        Ok(Self {
            endpoint: Some(Endpoint {
                client,
                event_url: event_url(&base_url),
                app_key: app_key.to_string(),
            }),
        })
    }

    /// A transport that never sends.
    pub fn disabled() -> Self {
        Self { endpoint: None }
    }
}

fn build_client(app_key: &AppKey, timeout: Duration) -> TransportResult<Client> {
    // The local development collector runs behind a self-signed certificate.
    let accept_local_certs = app_key.region() == Region::Dev;

    let client = Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(accept_local_certs)
        .build()?;

    Ok(client)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, record: &EventRecord) -> SendOutcome {
        let Some(endpoint) = &self.endpoint else {
            return SendOutcome::Disabled;
        };

        debug!(
            url = %endpoint.event_url,
            event = %record.event_name(),
            "Sending event"
        );

        let response = match endpoint
            .client
            .post(&endpoint.event_url)
            .header(APP_KEY_HEADER, &endpoint.app_key)
            .json(record)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(event = %record.event_name(), error = %e, "Event send failed");
                return SendOutcome::Retryable {
                    reason: e.to_string(),
                };
            }
        };

        let status = response.status();
        let outcome = classify_status(status);

        match &outcome {
            SendOutcome::Delivered => {
                debug!(event = %record.event_name(), status = status.as_u16(), "Event delivered");
            }
            SendOutcome::Rejected { .. } => {
                let body = response.text().await.unwrap_or_default();
                error!(
                    event = %record.event_name(),
                    status = status.as_u16(),
                    body = %body,
                    "Collector rejected event"
                );
            }
            SendOutcome::Retryable { .. } => {
                warn!(
                    event = %record.event_name(),
                    status = status.as_u16(),
                    "Collector returned a transient failure"
                );
            }
            SendOutcome::Disabled => {}
        }

        outcome
    }

    fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }
}

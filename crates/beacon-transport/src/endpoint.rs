//! Region to collector URL resolution.

use crate::{TransportError, TransportResult};
use beacon_core::{AppKey, Region};

/// Collector path events are posted to.
pub const EVENT_PATH: &str = "/api/v0/event";

/// Header carrying the app key.
pub const APP_KEY_HEADER: &str = "App-Key";

const US_HOST: &str = "https://us.aptabase.com";
const EU_HOST: &str = "https://eu.aptabase.com";
const DEV_HOST: &str = "https://localhost:3000";

/// Base URL for an app key. Self-hosted keys need `host`.
pub fn resolve_base_url(app_key: &AppKey, host: Option<&str>) -> TransportResult<String> {
    let base = match app_key.region() {
        Region::Us => US_HOST.to_string(),
        Region::Eu => EU_HOST.to_string(),
        Region::Dev => DEV_HOST.to_string(),
        Region::SelfHosted => host
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(TransportError::MissingHost)?
            .to_string(),
    };

    Ok(base.trim_end_matches('/').to_string())
}

/// Full event URL for a base URL.
pub(crate) fn event_url(base_url: &str) -> String {
    format!("{base_url}{EVENT_PATH}")
}

//! Event records.

use crate::{CoreError, CoreResult, SystemInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event properties: string keys to JSON values.
pub type Props = Map<String, Value>;

/// A single tracked occurrence.
///
/// The name, timestamp and properties are fixed when the record is built.
/// `session_id` and `system_props` stay empty until the consumer loop
/// stamps the record right before sending it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    timestamp: DateTime<Utc>,
    #[serde(default)]
    session_id: Option<String>,
    event_name: String,
    #[serde(default)]
    props: Option<Props>,
    #[serde(default)]
    system_props: Option<SystemInfo>,
}

impl EventRecord {
    /// Build a record timestamped now.
    pub fn new(name: impl Into<String>, props: Option<Props>) -> CoreResult<Self> {
        Self::with_timestamp(name, props, Utc::now())
    }

    /// Build a record with an explicit creation instant.
    pub fn with_timestamp(
        name: impl Into<String>,
        props: Option<Props>,
        timestamp: DateTime<Utc>,
    ) -> CoreResult<Self> {
        let event_name = name.into();
        if event_name.trim().is_empty() {
            return Err(CoreError::EmptyEventName);
        }

        Ok(Self {
            timestamp,
            session_id: None,
            event_name,
            props,
            system_props: None,
        })
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn props(&self) -> Option<&Props> {
        self.props.as_ref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn system_props(&self) -> Option<&SystemInfo> {
        self.system_props.as_ref()
    }

    /// Attach the send-time context.
    pub fn stamp(&mut self, session_id: &str, system_props: &SystemInfo) {
        self.session_id = Some(session_id.to_string());
        self.system_props = Some(system_props.clone());
    }

    /// Serialize as one NDJSON line (no trailing newline).
    pub fn to_json_line(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse one NDJSON line.
    pub fn from_json_line(line: &str) -> CoreResult<Self> {
        let record: EventRecord = serde_json::from_str(line.trim_end())?;
        if record.event_name.trim().is_empty() {
            return Err(CoreError::EmptyEventName);
        }
        Ok(record)
    }
}

//! Subcommand implementations.

use anyhow::{bail, Context, Result};
use beacon_core::{BeaconConfig, Paths, Props};
use beacon_outbox::{BeaconClient, EventLog, StoredRecord};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Interval for polling the in-memory backlog.
const BACKLOG_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Config file, then `BEACON_*` environment, then command-line flags.
pub fn build_config(
    file: Option<&Path>,
    app_key: Option<String>,
    host: Option<String>,
    cache_dir: Option<PathBuf>,
) -> Result<BeaconConfig> {
    let mut config = match file {
        Some(path) => BeaconConfig::load_from_file(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?,
        None => match Paths::new().map(|p| p.config_file()) {
            Ok(path) if path.exists() => BeaconConfig::load_from_file(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?,
            _ => BeaconConfig::default(),
        },
    };

    config.load_from_env();

    if let Some(app_key) = app_key {
        config.app_key = app_key;
    }
    if let Some(host) = host {
        config.host = Some(host);
    }
    if let Some(cache_dir) = cache_dir {
        config.cache_dir = Some(cache_dir);
    }

    if config.app_key.is_empty() {
        bail!("No app key configured. Use --app-key or BEACON_APP_KEY.");
    }

    Ok(config)
}

/// Parse `key=value`. The value is read as JSON when it is a number, boolean
/// or null, and as a string otherwise.
pub fn parse_prop(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("invalid property `{raw}`, expected key=value"))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("invalid property `{raw}`, key is empty"));
    }

    let value = match serde_json::from_str::<Value>(value) {
        Ok(v @ (Value::Number(_) | Value::Bool(_) | Value::Null)) => v,
        _ => Value::String(value.to_string()),
    };

    Ok((key.to_string(), value))
}

pub async fn track(
    config: &BeaconConfig,
    name: &str,
    props: Vec<(String, Value)>,
    timeout_secs: u64,
) -> Result<()> {
    let client = Arc::new(BeaconClient::new(config));
    let _crash_reporting = beacon_crash::install(client.clone(), config);

    let props: Option<Props> = if props.is_empty() {
        None
    } else {
        Some(props.into_iter().collect())
    };

    if !client.track_event_acked(name, props) {
        client.dispose().await;
        bail!("Event `{name}` was dropped; see the log for details");
    }

    client.start();
    let delivered = tokio::select! {
        delivered = wait_for_empty_backlog(&client, Duration::from_secs(timeout_secs)) => delivered,
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal, stopping...");
            false
        }
    };
    client.dispose().await;

    if delivered {
        println!("Tracked `{name}`");
    } else if client.pipeline().is_durable() {
        warn!(event = %name, "Event not delivered yet, left in durable log");
        println!("Queued `{name}`; run `beacon drain` to retry delivery");
    } else {
        bail!("Event `{name}` was not delivered within {timeout_secs}s");
    }

    Ok(())
}

pub fn inspect(config: &BeaconConfig) -> Result<()> {
    let paths = Paths::resolve(config.cache_dir.as_deref())?;
    let log = EventLog::open(paths.event_data_dir())
        .with_context(|| format!("Failed to open event log in {}", paths.event_data_dir().display()))?;

    println!("log:     {}", log.path().display());
    println!("cursor:  {}", log.cursor());
    println!("backlog: {}", log.backlog());

    for (i, stored) in log.snapshot()?.iter().enumerate() {
        println!("{}", describe_entry(i, stored));
    }

    Ok(())
}

pub async fn drain(config: &BeaconConfig, timeout_secs: u64) -> Result<()> {
    let mut config = config.clone();
    config.enable_persistence = true;

    let client = BeaconClient::new(&config);
    let Some(durable) = client.pipeline().as_durable() else {
        bail!("Durable event log is unavailable");
    };

    let before = durable.log().backlog();
    info!(backlog = before, "Draining durable event log");

    client.start();
    let drained = tokio::select! {
        drained = durable.wait_until_drained(Duration::from_secs(timeout_secs)) => drained,
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal, stopping...");
            false
        }
    };
    let remaining = durable.log().backlog();
    client.dispose().await;

    println!("resolved {} of {} queued events", before.saturating_sub(remaining), before);
    if !drained {
        bail!("{remaining} events still queued after {timeout_secs}s");
    }

    Ok(())
}

async fn wait_for_empty_backlog(client: &BeaconClient, timeout: Duration) -> bool {
    if let Some(durable) = client.pipeline().as_durable() {
        return durable.wait_until_drained(timeout).await;
    }

    let empty = async {
        while client.backlog() > 0 {
            tokio::time::sleep(BACKLOG_POLL_INTERVAL).await;
        }
    };
    tokio::time::timeout(timeout, empty).await.is_ok()
}

fn describe_entry(index: usize, stored: &StoredRecord) -> String {
    match stored {
        StoredRecord::Valid(record) => {
            let props = record
                .props()
                .map(|p| Value::Object(p.clone()).to_string())
                .unwrap_or_else(|| "-".to_string());
            format!(
                "{index:>5}  {}  {}  {props}",
                record.timestamp().to_rfc3339(),
                record.event_name()
            )
        }
        StoredRecord::Invalid { reason } => format!("{index:>5}  <corrupt: {reason}>"),
    }
}

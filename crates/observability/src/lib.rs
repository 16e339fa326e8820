//! # Observability
//!
//! Subscriber setup for Beacon binaries.
//!
//! The Beacon libraries emit through `tracing` macros and never install a
//! subscriber themselves; an SDK embedded in a host application must not
//! claim the global dispatcher. Binaries call [`init`] or
//! [`init_with_config`] once at startup.
//!
//! Events are written as JSON lines to `<cache dir>/beacon/logs/beacon.jsonl`
//! (rotated to `beacon.jsonl.1` once it outgrows [`LogConfig::max_file_bytes`]),
//! with an optional compact stderr copy.
//!
//! Filtering: `BEACON_LOG`, then `RUST_LOG`, then [`LogConfig::default_level`].
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "beacon".into(),
//!     also_stderr: true,
//!     ..Default::default()
//! });
//! tracing::info!(event = "app_started", "tracked");
//! ```

mod writer;

use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use writer::{rotated_path, LogFile};

/// Filter variable checked before `RUST_LOG`.
pub const LOG_ENV_VAR: &str = "BEACON_LOG";

/// Rotation threshold used by [`LogConfig::default`].
pub const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Recorded in the first line after startup.
    pub service_name: String,

    /// Level used when neither `BEACON_LOG` nor `RUST_LOG` is set.
    pub default_level: String,

    /// Defaults to [`default_log_path`].
    pub log_path: Option<PathBuf>,

    /// Rotate the log file on startup once it exceeds this size. 0 disables.
    pub max_file_bytes: u64,

    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "beacon".into(),
            default_level: "info".into(),
            log_path: None,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            also_stderr: false,
        }
    }
}

pub fn default_log_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("beacon")
        .join("logs")
        .join("beacon.jsonl")
}

pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Install the global subscriber.
///
/// An unwritable log file downgrades to stderr-only output. A second call
/// is a no-op.
pub fn init_with_config(config: LogConfig) {
    let level = normalize_level(&config.default_level);
    let log_path = config.log_path.clone().unwrap_or_else(default_log_path);

    let (file_layer, file_error) = match LogFile::open(&log_path, config.max_file_bytes) {
        Ok(file) => {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .flatten_event(true)
                .with_target(true)
                .with_writer(file)
                .with_filter(build_filter(level));
            (Some(layer), None)
        }
        Err(e) => (None, Some(e)),
    };

    let stderr_layer = (config.also_stderr || file_layer.is_none()).then(|| {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_filter(build_filter(level))
    });

    if tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .is_err()
    {
        return;
    }

    match file_error {
        None => tracing::info!(
            service = %config.service_name,
            log_path = %log_path.display(),
            "Logging initialized"
        ),
        Some(e) => tracing::warn!(
            service = %config.service_name,
            log_path = %log_path.display(),
            error = %e,
            "Log file unavailable, logging to stderr only"
        ),
    }
}

/// Map a user-supplied level to a filter directive. Unknown values fall
/// back to `info`.
pub fn normalize_level(level: &str) -> &'static str {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" => "error",
        "off" | "none" => "off",
        _ => "info",
    }
}

fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.service_name, "beacon");
        assert_eq!(config.default_level, "info");
        assert_eq!(config.max_file_bytes, DEFAULT_MAX_FILE_BYTES);
        assert!(config.log_path.is_none());
        assert!(!config.also_stderr);
    }

    #[test]
    fn test_default_log_path() {
        let path = default_log_path();
        assert_eq!(path.file_name().unwrap(), "beacon.jsonl");
        assert!(path.parent().unwrap().ends_with("beacon/logs"));
        assert_eq!(rotated_path(&path).file_name().unwrap(), "beacon.jsonl.1");
    }

    #[test]
    fn test_normalize_level() {
        assert_eq!(normalize_level("TRACE"), "trace");
        assert_eq!(normalize_level(" Warning "), "warn");
        assert_eq!(normalize_level("none"), "off");
        assert_eq!(normalize_level("verbose"), "info");
    }
}

//! Configuration for the Beacon client.

use crate::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default cap on unconsumed events kept in the durable log.
pub const DEFAULT_MAX_PERSISTED_EVENTS: usize = 1000;

/// Default pause between retries of a transiently failing send.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 30;

/// Default time sends stay paused after a fatal crash.
const DEFAULT_PAUSE_COOLDOWN_SECS: u64 = 30;

/// Default bound on how long shutdown waits for the consumer.
const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 5_000;

/// Default HTTP request timeout.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 100;

/// Collector region encoded in the app key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Us,
    Eu,
    /// Local development collector.
    Dev,
    /// Self-hosted collector; requires an explicit host.
    SelfHosted,
}

impl Region {
    pub fn code(&self) -> &'static str {
        match self {
            Region::Us => "US",
            Region::Eu => "EU",
            Region::Dev => "DEV",
            Region::SelfHosted => "SH",
        }
    }
}

impl FromStr for Region {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "US" => Ok(Region::Us),
            "EU" => Ok(Region::Eu),
            "DEV" => Ok(Region::Dev),
            "SH" => Ok(Region::SelfHosted),
            other => Err(CoreError::InvalidAppKey(format!("unknown region {other:?}"))),
        }
    }
}

/// A validated `{prefix}-{region}-{id}` app key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppKey {
    raw: String,
    region: Region,
}

impl AppKey {
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let parts: Vec<&str> = raw.split('-').collect();
        if parts.len() != 3 {
            return Err(CoreError::InvalidAppKey(format!(
                "expected 3 hyphen-separated parts, found {}",
                parts.len()
            )));
        }

        let region = parts[1].parse()?;
        Ok(Self {
            raw: raw.to_string(),
            region,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn region(&self) -> Region {
        self.region
    }
}

impl fmt::Display for AppKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeaconConfig {
    /// App key, `{prefix}-{region}-{id}`.
    pub app_key: String,
    /// Collector base URL for self-hosted app keys.
    #[serde(default)]
    pub host: Option<String>,
    /// Overrides build-profile debug detection.
    #[serde(default)]
    pub is_debug_mode: Option<bool>,
    /// Use the crash-safe on-disk pipeline.
    #[serde(default)]
    pub enable_persistence: bool,
    /// Report uncaught failures as events.
    #[serde(default)]
    pub enable_crash_reporting: bool,
    /// Root of the durable log; defaults to the platform cache directory.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default = "default_max_persisted_events")]
    pub max_persisted_events: usize,
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,
    #[serde(default = "default_pause_cooldown_secs")]
    pub pause_cooldown_secs: u64,
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub app_version: String,
    #[serde(default)]
    pub app_build_number: String,
}

fn default_max_persisted_events() -> usize {
    DEFAULT_MAX_PERSISTED_EVENTS
}

fn default_retry_interval_secs() -> u64 {
    DEFAULT_RETRY_INTERVAL_SECS
}

fn default_pause_cooldown_secs() -> u64 {
    DEFAULT_PAUSE_COOLDOWN_SECS
}

fn default_shutdown_grace_ms() -> u64 {
    DEFAULT_SHUTDOWN_GRACE_MS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            app_key: String::new(),
            host: None,
            is_debug_mode: None,
            enable_persistence: false,
            enable_crash_reporting: false,
            cache_dir: None,
            max_persisted_events: DEFAULT_MAX_PERSISTED_EVENTS,
            retry_interval_secs: DEFAULT_RETRY_INTERVAL_SECS,
            pause_cooldown_secs: DEFAULT_PAUSE_COOLDOWN_SECS,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            app_version: String::new(),
            app_build_number: String::new(),
        }
    }
}

impl BeaconConfig {
    /// Config for an app key with everything else defaulted.
    pub fn new(app_key: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            ..Default::default()
        }
    }

    /// Defaults overridden from `BEACON_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from a JSON file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BeaconConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    ///
    /// Written to a sibling temp file, synced, then renamed over `path`, so
    /// readers see either the old or the new file.
    pub fn save(&self, path: &Path) -> CoreResult<()> {
        let content = serde_json::to_string_pretty(self)?;

        let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(parent) = parent {
            fs::create_dir_all(parent)?;
        }

        let mut tmp_name = path
            .file_name()
            .ok_or_else(|| CoreError::Path(format!("Not a file path: {}", path.display())))?
            .to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        let written = (|| -> std::io::Result<()> {
            let mut file = File::create(&tmp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp_path, path)?;
            if let Some(parent) = parent {
                File::open(parent)?.sync_all()?;
            }
            Ok(())
        })();

        if written.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        written.map_err(CoreError::from)
    }

    /// Apply `BEACON_*` environment overrides on top of the current values.
    pub fn load_from_env(&mut self) {
        if let Ok(app_key) = std::env::var("BEACON_APP_KEY") {
            self.app_key = app_key;
        }
        if let Ok(host) = std::env::var("BEACON_HOST") {
            self.host = Some(host).filter(|h| !h.is_empty());
        }
        if let Some(debug) = env_flag("BEACON_DEBUG") {
            self.is_debug_mode = Some(debug);
        }
        if let Some(persist) = env_flag("BEACON_PERSIST") {
            self.enable_persistence = persist;
        }
        if let Some(crash) = env_flag("BEACON_CRASH_REPORTING") {
            self.enable_crash_reporting = crash;
        }
        if let Ok(dir) = std::env::var("BEACON_CACHE_DIR") {
            self.cache_dir = Some(PathBuf::from(dir));
        }
    }

    /// Parse and validate the app key.
    pub fn parsed_app_key(&self) -> CoreResult<AppKey> {
        AppKey::parse(&self.app_key)
    }

    /// Debug flag reported in system metadata.
    pub fn debug_mode(&self) -> bool {
        self.is_debug_mode.unwrap_or(cfg!(debug_assertions))
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn pause_cooldown(&self) -> Duration {
        Duration::from_secs(self.pause_cooldown_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let value = std::env::var(name).ok()?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

//! File system paths.

use crate::{CoreError, CoreResult};
use std::path::{Path, PathBuf};

/// Directory holding the durable event log.
const EVENT_DATA_DIR: &str = "EventData";

/// Resolves where Beacon keeps its files.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory (`<cache dir>/beacon`)
    base_dir: PathBuf,
}

impl Paths {
    /// Use the platform cache directory.
    pub fn new() -> CoreResult<Self> {
        let cache = dirs::cache_dir()
            .ok_or_else(|| CoreError::Path("Could not determine cache directory".to_string()))?;

        Ok(Self {
            base_dir: cache.join("beacon"),
        })
    }

    /// Use a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Explicit directory if given, else the platform default.
    pub fn resolve(base_dir: Option<&Path>) -> CoreResult<Self> {
        match base_dir {
            Some(dir) => Ok(Self::with_base_dir(dir.to_path_buf())),
            None => Self::new(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory of the durable event log.
    pub fn event_data_dir(&self) -> PathBuf {
        self.base_dir.join(EVENT_DATA_DIR)
    }

    /// Config file path (`<base>/config.json`).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }
}

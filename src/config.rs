//! Runtime configuration, read from a JSON file
//!
//! Missing files and missing fields fall back to defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::Mode;

const CONFIG_FILE: &str = ".config/streamcore.json";
const CONFIG_ENV: &str = "STREAMCORE_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Entries per cache (extracted items and media each get one)
    pub cache_capacity: usize,
    pub playlist_capacity: usize,
    /// Percent per volume step
    pub volume_step: u8,
    pub seek_step_secs: i64,
    pub default_mode: Mode,
    pub log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_capacity: 8,
            playlist_capacity: 256,
            volume_step: 5,
            seek_step_secs: 5,
            default_mode: Mode::Normal,
            log_dir: PathBuf::from(".logs"),
        }
    }
}

impl Config {
    /// Reads `path`, or returns the defaults when it does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("cannot parse {}", path.display()))?;

        tracing::info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// `$STREAMCORE_CONFIG`, or `.config/streamcore.json`
    pub fn load_default() -> Result<Self> {
        Self::load(Self::default_path())
    }

    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

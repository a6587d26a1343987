//! Optional settings file.
//!
//! Read from `<config dir>/sweepy/config.toml`. Every field is optional and
//! command-line flags take precedence.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::sweep::{default_index_path, DEFAULT_CANDIDATE_NAME, DEFAULT_TTL_HOURS};

/// Settings file contents.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Where the scan index is stored.
    pub cache_file: Option<PathBuf>,
    /// Length of a fresh index validity window.
    pub cache_ttl_hours: Option<u64>,
    /// Directory name treated as a candidate.
    pub candidate_name: Option<String>,
    /// Measurement worker threads.
    pub threads: Option<usize>,
}

impl Settings {
    /// Default settings file location, if the platform has a config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sweepy").join("config.toml"))
    }

    /// Load settings from the default location; a missing file yields defaults.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load settings from `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid settings file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn cache_file(&self) -> PathBuf {
        self.cache_file.clone().unwrap_or_else(default_index_path)
    }

    pub fn cache_ttl_hours(&self) -> u64 {
        self.cache_ttl_hours.unwrap_or(DEFAULT_TTL_HOURS)
    }

    pub fn candidate_name(&self) -> String {
        self.candidate_name
            .clone()
            .unwrap_or_else(|| DEFAULT_CANDIDATE_NAME.to_string())
    }

    pub fn threads(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get).max(1)
    }
}

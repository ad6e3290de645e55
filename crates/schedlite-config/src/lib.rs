//! schedlite-config: configuration file loading and path resolution.
//!
//! Configuration lives at `~/.schedlite/config.json5`; a missing file falls
//! back to defaults so a fresh install works with no setup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON5 parse error: {0}")]
    Json5(#[from] json5::Error),
    #[error("home directory not found")]
    NoDirFound,
}

/// Top-level schedlite configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Task database location. Defaults to `~/.schedlite/schedlite.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
    /// Connect timeout for URL actions, in seconds.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Shell used to run command actions.
    #[serde(default = "default_shell")]
    pub shell: String,
}

fn default_http_timeout_secs() -> u64 {
    5
}

fn default_shell() -> String {
    "sh".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            http_timeout_secs: default_http_timeout_secs(),
            shell: default_shell(),
        }
    }
}

impl Config {
    /// Resolve the effective database path, falling back to the default
    /// location under the config directory.
    pub fn db_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.db_path {
            Some(path) => Ok(path.clone()),
            None => Ok(config_dir()?.join("schedlite.db")),
        }
    }
}

/// Resolve the schedlite config directory (~/.schedlite/).
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|h| h.join(".schedlite"))
        .ok_or(ConfigError::NoDirFound)
}

/// Resolve the config file path (~/.schedlite/config.json5).
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.json5"))
}

/// Load configuration from the default path, falling back to defaults.
pub fn load_config() -> Result<Config, ConfigError> {
    let path = config_file_path()?;
    load_config_from(&path)
}

/// Load configuration from a specific path, falling back to defaults if not
/// found.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        tracing::debug!("config file not found at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: Config = json5::from_str(&content)?;
    Ok(config)
}

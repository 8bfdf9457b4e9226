//! Configuration for daylog.
//!
//! A single TOML file holds user preferences:
//!
//! ```toml
//! # ~/.config/daylog/config.toml
//! storage_dir = "/home/me/Documents/daylog"  # flat-file directory
//! backend = "sqlite"                          # storage plugin id
//! ```
//!
//! Directory resolution honors env overrides so tests and scripts can run
//! fully isolated:
//! - `DAYLOG_CONFIG_DIR` overrides the config directory
//! - `DAYLOG_DATA_DIR` overrides the data directory (database, default
//!   flat-file location)

use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const CONFIG_FILE: &str = "config.toml";

/// User preferences stored in config.toml.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory for the flat-file backend. Defaults to `<data dir>/files`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,

    /// Selected storage plugin id. Defaults to the registry default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
}

/// Resolve the config directory, honoring `DAYLOG_CONFIG_DIR`.
pub fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("DAYLOG_CONFIG_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::config_dir()
        .map(|d| d.join("daylog"))
        .ok_or_else(|| Error::Config("could not determine config directory".to_string()))
}

/// Resolve the data directory, honoring `DAYLOG_DATA_DIR`.
pub fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("DAYLOG_DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_dir()
        .map(|d| d.join("daylog"))
        .ok_or_else(|| Error::Config("could not determine data directory".to_string()))
}

fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Load the configuration; a missing file yields defaults.
pub fn load() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = fs::read_to_string(&path)?;
    toml::from_str(&raw).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
}

/// Persist the configuration.
pub fn save(config: &Config) -> Result<()> {
    let path = config_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let raw = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("serialize config: {e}")))?;
    fs::write(&path, raw)?;
    Ok(())
}

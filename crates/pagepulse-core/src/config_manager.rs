//! Config file loading.
//!
//! The agent reads [`AppConfig`] once at startup from a JSON file, by default
//! in the platform config directory. A missing file is created with the
//! defaults so integrators have something to edit.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::CoreError;

const CONFIG_FILE_NAME: &str = "config.json";

/// A loaded config and the file it came from.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: AppConfig,
    path: PathBuf,
}

impl ConfigManager {
    /// Loads `config.json` from the platform config directory
    pub fn new() -> Result<Self, CoreError> {
        Self::with_path(default_config_path()?)
    }

    /// Loads `path`, writing the defaults there first if it does not exist
    pub fn with_path(path: PathBuf) -> Result<Self, CoreError> {
        let config = if path.exists() {
            read_config(&path)?
        } else {
            let config = AppConfig::default();
            write_defaults(&path, &config)?;
            config
        };
        Ok(Self { config, path })
    }

    /// The loaded config (cloned)
    pub fn get(&self) -> AppConfig {
        self.config.clone()
    }

    pub fn config_path(&self) -> &Path {
        &self.path
    }
}

/// Platform config file location
pub fn default_config_path() -> Result<PathBuf, CoreError> {
    directories::ProjectDirs::from("com", "pagepulse", "agent")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
        .ok_or_else(|| CoreError::Config("no home directory to place config in".to_string()))
}

fn read_config(path: &Path) -> Result<AppConfig, CoreError> {
    let content = fs::read_to_string(path)
        .map_err(|e| CoreError::Config(format!("failed to read {}: {e}", path.display())))?;
    let config = serde_json::from_str(&content)?;
    debug!("config loaded: {}", path.display());
    Ok(config)
}

fn write_defaults(path: &Path, config: &AppConfig) -> Result<(), CoreError> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| {
            CoreError::Config(format!("failed to create {}: {e}", dir.display()))
        })?;
    }
    fs::write(path, serde_json::to_string_pretty(config)?)?;
    info!("wrote default config: {}", path.display());
    Ok(())
}

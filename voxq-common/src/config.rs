//! Configuration file resolution and loading
//!
//! Resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`VOXQ_CONFIG` by default)
//! 3. User config directory (`~/.config/voxq/config.toml` on Linux)
//! 4. System config (`/etc/voxq/config.toml`, unix only)
//! 5. Built-in defaults (no file)
//!
//! A missing file is never fatal: the caller gets defaults and a warning.
//! A file that exists but does not parse is a configuration error.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "VOXQ_CONFIG";

const CONFIG_FILE_NAME: &str = "config.toml";

/// Logging configuration (`[logging]` table)
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Locates the configuration file for an application
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    app_name: String,
    env_var: String,
}

impl ConfigResolver {
    pub fn new(app_name: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
            env_var: CONFIG_ENV_VAR.to_string(),
        }
    }

    /// Override the environment variable consulted in step 2
    pub fn with_env_var(mut self, env_var: &str) -> Self {
        self.env_var = env_var.to_string();
        self
    }

    /// Resolve the config file path, or `None` when defaults should be used
    ///
    /// Explicit paths (CLI, environment) are returned even if they do not
    /// exist so that [`load_toml`] can warn about them by name.
    pub fn resolve(&self, cli_arg: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = cli_arg {
            return Some(path.to_path_buf());
        }

        if let Ok(path) = std::env::var(&self.env_var) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        self.user_config_path()
            .filter(|p| p.exists())
            .or_else(|| self.system_config_path().filter(|p| p.exists()))
    }

    /// `<config dir>/<app>/config.toml`
    pub fn user_config_path(&self) -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(&self.app_name).join(CONFIG_FILE_NAME))
    }

    fn system_config_path(&self) -> Option<PathBuf> {
        if cfg!(unix) {
            Some(PathBuf::from("/etc").join(&self.app_name).join(CONFIG_FILE_NAME))
        } else {
            None
        }
    }
}

/// Load a TOML config file, falling back to `T::default()` when there is none
pub fn load_toml<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        warn!("No config file found, using built-in defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        warn!("Config file {} does not exist, using built-in defaults", path.display());
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse {}: {}", path.display(), e))
    })?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

//! voxq-player configuration
//!
//! Bootstrap settings come from a TOML file located by
//! [`voxq_common::config::ConfigResolver`]. Every table and key is optional:
//!
//! ```toml
//! [logging]
//! level = "info"
//!
//! [player]
//! event_capacity = 256
//!
//! [transport]
//! frame_capacity = 8
//! frame_interval_ms = 20
//! ```

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use voxq_common::config::{load_toml, ConfigResolver, LoggingConfig};

/// Application name used for config directory lookup
pub const APP_NAME: &str = "voxq";

/// Complete voxq-player configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerConfig {
    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Controller and registry settings (optional)
    #[serde(default)]
    pub player: PlayerSettings,

    /// Transport settings (optional)
    #[serde(default)]
    pub transport: TransportSettings,
}

/// `[player]` table
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PlayerSettings {
    /// Broadcast buffer for playback events; slow subscribers lag past this
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
        }
    }
}

/// `[transport]` table
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TransportSettings {
    /// Frames buffered between the controller and the transport
    #[serde(default = "default_frame_capacity")]
    pub frame_capacity: usize,

    /// Opus frame duration used to pace the loopback sink
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            frame_capacity: default_frame_capacity(),
            frame_interval_ms: default_frame_interval_ms(),
        }
    }
}

impl TransportSettings {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

fn default_event_capacity() -> usize {
    256
}

fn default_frame_capacity() -> usize {
    8
}

fn default_frame_interval_ms() -> u64 {
    20 // 20ms opus frames
}

impl PlayerConfig {
    /// Resolve and load the config file
    ///
    /// Priority: `cli_path` > `VOXQ_CONFIG` > user config dir > system config
    /// > built-in defaults. Returns the path actually consulted, if any.
    pub fn load(cli_path: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let path = ConfigResolver::new(APP_NAME).resolve(cli_path);
        let config: PlayerConfig = load_toml(path.as_deref())?;
        config.validate()?;
        Ok((config, path))
    }

    /// Parse a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PlayerConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.transport.frame_capacity == 0 {
            return Err(Error::Config(
                "transport.frame_capacity must be at least 1".to_string(),
            ));
        }
        if self.player.event_capacity == 0 {
            return Err(Error::Config(
                "player.event_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn log_summary(&self) {
        info!(
            "Config: log level {}, event capacity {}, frame capacity {}, frame interval {}ms",
            self.logging.level,
            self.player.event_capacity,
            self.transport.frame_capacity,
            self.transport.frame_interval_ms
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlayerConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.player.event_capacity, 256);
        assert_eq!(config.transport.frame_capacity, 8);
        assert_eq!(config.transport.frame_interval(), Duration::from_millis(20));
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = PlayerConfig::from_toml_str("").unwrap();
        assert_eq!(config.player, PlayerSettings::default());
        assert_eq!(config.transport, TransportSettings::default());
    }

    #[test]
    fn test_partial_tables() {
        let config = PlayerConfig::from_toml_str(
            r#"
            [logging]
            level = "debug"

            [transport]
            frame_interval_ms = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.transport.frame_capacity, 8);
        assert!(config.transport.frame_interval().is_zero());
    }

    #[test]
    fn test_zero_frame_capacity_rejected() {
        let result = PlayerConfig::from_toml_str("[transport]\nframe_capacity = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voxq.toml");
        std::fs::write(&path, "[player]\nevent_capacity = 16\n").unwrap();

        let (config, used) = PlayerConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(config.player.event_capacity, 16);
        assert_eq!(used, Some(path));
    }
}

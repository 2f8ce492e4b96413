//! # Configuration Management Module
//!
//! Recorder settings stored in platform-appropriate locations.
//! Handles loading, saving, validating and providing defaults.
//!
//! ## Settings
//! - `flush_threshold`: Samples per batch handed to the writer
//! - `max_backlog_batches`: How many batches the tick thread holds back while the writer is behind
//! - `time_precision_digits` / `vector_precision_digits`: Fractional digits written per field
//! - `force_precision_digits`: Keep trailing zeros (fixed width) instead of trimming them
//! - `output_path` / `overwrite_existing`: Where samples go and whether an existing file is replaced
//! - `start_enabled`: Whether recording is on before the first toggle
//! - `*_timeout_ms`: Lock and join bounds for the producer, writer and shutdown paths
//!
//! ## Storage Location
//! - macOS: ~/Library/Application Support/frame-recorder/config.toml
//! - Linux: ~/.config/frame-recorder/config.toml
//! - Windows: %APPDATA%\frame-recorder\config.toml

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound on how long a tick may wait for the handoff lock.
pub const MAX_PRODUCER_LOCK_TIMEOUT_MS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub flush_threshold: usize,
    pub max_backlog_batches: usize,
    pub time_precision_digits: usize,
    pub vector_precision_digits: usize,
    pub force_precision_digits: bool,
    pub output_path: PathBuf,
    pub overwrite_existing: bool,
    pub start_enabled: bool,
    pub producer_lock_timeout_ms: u64,
    pub writer_lock_timeout_ms: u64,
    pub shutdown_lock_timeout_ms: u64,
    pub shutdown_join_timeout_ms: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            flush_threshold: 1000,
            max_backlog_batches: 10,
            time_precision_digits: 10,
            vector_precision_digits: 6,
            force_precision_digits: true,
            output_path: PathBuf::from("fove_coordinates.csv"),
            overwrite_existing: false,
            start_enabled: false,
            producer_lock_timeout_ms: 3,
            writer_lock_timeout_ms: 10,
            shutdown_lock_timeout_ms: 200,
            shutdown_join_timeout_ms: 1000,
        }
    }
}

impl RecorderConfig {
    /// Get the path to the config file
    fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("frame-recorder").join("config.toml")
    }

    /// Load config from the default location, or create default if it doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_or_create(&Self::config_path())
    }

    /// Load config from `path`, writing defaults there first if the file is missing
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {}, writing defaults", path.display());
                let config = Self::default();
                config.save_to(path)?;
                Ok(config)
            }
            Err(e) => Err(ConfigError::ReadFailed(e)),
        }
    }

    /// Load config from an explicit file; a missing file is an error here
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(ConfigError::ReadFailed)?;
        Self::parse(&contents)
    }

    fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(ConfigError::ParseFailed)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save config to `path`, creating parent directories as needed
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::WriteFailed)?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)?;
        fs::write(path, toml_string).map_err(ConfigError::WriteFailed)?;

        Ok(())
    }

    /// Reject settings the recorder cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flush_threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "flush_threshold",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_backlog_batches == 0 {
            return Err(ConfigError::Invalid {
                field: "max_backlog_batches",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.producer_lock_timeout_ms == 0
            || self.producer_lock_timeout_ms > MAX_PRODUCER_LOCK_TIMEOUT_MS
        {
            return Err(ConfigError::Invalid {
                field: "producer_lock_timeout_ms",
                reason: format!(
                    "must be between 1 and {} ms, got {}",
                    MAX_PRODUCER_LOCK_TIMEOUT_MS, self.producer_lock_timeout_ms
                ),
            });
        }
        if self.writer_lock_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "writer_lock_timeout_ms",
                reason: "must be at least 1 ms".to_string(),
            });
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "output_path",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn producer_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.producer_lock_timeout_ms)
    }

    pub fn writer_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.writer_lock_timeout_ms)
    }

    pub fn shutdown_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_lock_timeout_ms)
    }

    pub fn shutdown_join_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_join_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = RecorderConfig::default();
        assert_eq!(config.flush_threshold, 1000);
        assert_eq!(config.time_precision_digits, 10);
        assert_eq!(config.vector_precision_digits, 6);
        assert!(config.force_precision_digits);
        assert!(!config.overwrite_existing);
        assert_eq!(config.max_backlog_batches, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = RecorderConfig {
            flush_threshold: 250,
            force_precision_digits: false,
            ..RecorderConfig::default()
        };

        let toml_str = toml::to_string(&config).expect("Failed to serialize");
        assert!(toml_str.contains("flush_threshold = 250"));
        assert!(toml_str.contains("force_precision_digits = false"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml_str = r#"
            flush_threshold = 10
            output_path = "run.csv"
        "#;

        let config = RecorderConfig::parse(toml_str).expect("Failed to deserialize");
        assert_eq!(config.flush_threshold, 10);
        assert_eq!(config.output_path, PathBuf::from("run.csv"));
        assert_eq!(config.vector_precision_digits, 6);
        assert_eq!(config.shutdown_lock_timeout_ms, 200);
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let err = RecorderConfig::parse("flush_threshold = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "flush_threshold", .. }));
    }

    #[test]
    fn test_zero_backlog_rejected() {
        let config = RecorderConfig {
            max_backlog_batches: 0,
            ..RecorderConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "max_backlog_batches", .. }));
    }

    #[test]
    fn test_producer_timeout_is_bounded() {
        let config = RecorderConfig {
            producer_lock_timeout_ms: 50,
            ..RecorderConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("producer_lock_timeout_ms"));
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = RecorderConfig::load_or_create(&path).unwrap();
        assert_eq!(config, RecorderConfig::default());
        assert!(path.exists());

        let reloaded = RecorderConfig::load_from(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let dir = tempdir().unwrap();
        let err = RecorderConfig::load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFailed(_)));
    }
}

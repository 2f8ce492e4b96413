//! # Error Types Module
//!
//! Centralized error handling for the frame recorder.
//! Provides custom error types for each module with proper context and error chaining.
//!
//! ## Error Types
//! - `ConfigError`: Configuration file I/O, parsing and validation errors
//! - `RecorderError`: Startup failures that disable recording entirely
//!
//! ## Usage Examples
//! ```rust,ignore
//! // Config module uses ConfigError
//! pub fn load() -> Result<RecorderConfig, ConfigError> { ... }
//!
//! // Recorder start-up uses RecorderError
//! pub fn start(config: RecorderConfig, source: S) -> Result<Recorder<S>, RecorderError> { ... }
//! ```
//!
//! Runtime failures on the producer and writer sides are deliberately absent:
//! they degrade to log output and counters in `RecorderStats`, never to a
//! failed tick.

use std::fmt;
use std::path::PathBuf;

/// Errors that can occur during configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read config file
    ReadFailed(std::io::Error),
    /// Failed to write config file
    WriteFailed(std::io::Error),
    /// Failed to parse config file
    ParseFailed(toml::de::Error),
    /// Failed to serialize config
    SerializeFailed(toml::ser::Error),
    /// A setting holds a value the recorder cannot run with
    Invalid { field: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ReadFailed(e) => {
                write!(f, "Failed to read config file: {}", e)
            }
            ConfigError::WriteFailed(e) => {
                write!(f, "Failed to write config file: {}", e)
            }
            ConfigError::ParseFailed(e) => {
                write!(f, "Failed to parse config file: {}", e)
            }
            ConfigError::SerializeFailed(e) => {
                write!(f, "Failed to serialize config: {}", e)
            }
            ConfigError::Invalid { field, reason } => {
                write!(f, "Invalid config value for {}: {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadFailed(e) => Some(e),
            ConfigError::WriteFailed(e) => Some(e),
            ConfigError::ParseFailed(e) => Some(e),
            ConfigError::SerializeFailed(e) => Some(e),
            ConfigError::Invalid { .. } => None,
        }
    }
}

/// Errors that prevent a recorder from starting.
///
/// Any of these leaves recording disabled with no writer thread running.
#[derive(Debug)]
pub enum RecorderError {
    /// Configuration was rejected before touching the filesystem
    Config(ConfigError),
    /// Output file could not be created
    CreateOutput { path: PathBuf, source: std::io::Error },
    /// Header line could not be written to the freshly created file
    WriteHeader { path: PathBuf, source: std::io::Error },
    /// The background writer thread could not be spawned
    SpawnWriter(std::io::Error),
}

impl fmt::Display for RecorderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecorderError::Config(e) => {
                write!(f, "Recorder configuration rejected: {}", e)
            }
            RecorderError::CreateOutput { path, source } => {
                write!(f, "Failed to create output file {}: {}", path.display(), source)
            }
            RecorderError::WriteHeader { path, source } => {
                write!(f, "Failed to write header to {}: {}", path.display(), source)
            }
            RecorderError::SpawnWriter(e) => {
                write!(f, "Failed to spawn writer thread: {}", e)
            }
        }
    }
}

impl std::error::Error for RecorderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RecorderError::Config(e) => Some(e),
            RecorderError::CreateOutput { source, .. } => Some(source),
            RecorderError::WriteHeader { source, .. } => Some(source),
            RecorderError::SpawnWriter(e) => Some(e),
        }
    }
}

impl From<ConfigError> for RecorderError {
    fn from(e: ConfigError) -> Self {
        RecorderError::Config(e)
    }
}

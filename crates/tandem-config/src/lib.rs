//! Tandem Config
//!
//! Serializable settings for the `tandem` binary: engine sizing, the default
//! context timeout and the log filter. Loaded from a JSON file; every field
//! is optional and falls back to its default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read config file {path}: {source}")]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },

  #[error("failed to parse config: {0}")]
  Parse(#[from] serde_json::Error),

  #[error("invalid config: {message}")]
  Invalid { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TandemConfig {
  pub engine: EngineSettings,
  /// Budget, in seconds, of the context created for each command.
  pub timeout_seconds: i64,
  /// `tracing` filter used when `RUST_LOG` is not set.
  pub log_filter: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
  pub worker_threads: usize,
}

impl Default for TandemConfig {
  fn default() -> Self {
    Self {
      engine: EngineSettings::default(),
      timeout_seconds: 5,
      log_filter: "info".to_string(),
    }
  }
}

impl Default for EngineSettings {
  fn default() -> Self {
    Self { worker_threads: 2 }
  }
}

impl TandemConfig {
  pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
    let config: Self = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
  }

  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json_str(&json)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.engine.worker_threads == 0 {
      return Err(ConfigError::Invalid {
        message: "engine.worker_threads must be at least 1".to_string(),
      });
    }
    if self.timeout_seconds < 1 {
      return Err(ConfigError::Invalid {
        message: format!(
          "timeout_seconds must be at least 1, got {}",
          self.timeout_seconds
        ),
      });
    }
    Ok(())
  }
}

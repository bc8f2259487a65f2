//! Sync engine configuration.
//!
//! Loaded from `~/.config/restrosync/config.toml` (or platform equivalent via
//! `dirs::config_dir()`). A missing file means defaults; a present file must
//! parse and validate.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// Full configuration for the sync engine.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SyncConfig {
    pub server: ServerConfig,
    pub reconnect: ReconnectConfig,
    pub storage: StorageConfig,
    pub broadcast: BroadcastConfig,
}

/// Where the authoritative server lives.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    /// Well-known sync port; every RestroFlow deployment serves on it.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3001,
        }
    }
}

/// Remote Link retry policy. There is no retry limit; the link reconnects
/// for as long as the process lives.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Delay after an established connection closes.
    pub retry_secs: u64,
    /// Delay after a connection attempt that never opened.
    pub connect_retry_secs: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            retry_secs: 3,
            connect_retry_secs: 5,
        }
    }
}

/// Durable local copy of the state tree.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Override for the state file location; defaults to
    /// `<data_dir>/restrosync/state.json`.
    pub state_file: Option<PathBuf>,
}

/// Same-device cross-process fan-out.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    pub enabled: bool,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl SyncConfig {
    /// Returns the path to the configuration file.
    ///
    /// Falls back to the current directory if `config_dir` is unavailable.
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("restrosync").join("config.toml")
    }

    /// Loads configuration from the default config file.
    ///
    /// - If the file doesn't exist, returns `SyncConfig::default()`.
    /// - If the file exists, parses it as TOML and validates.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Loads configuration from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: SyncConfig = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.is_empty() {
            return Err(ConfigError::ValidationError {
                message: "server.host must not be empty".to_string(),
            });
        }
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError {
                message: "server.port must be non-zero".to_string(),
            });
        }
        Ok(())
    }

    /// WebSocket URL of the authoritative server.
    pub fn ws_url(&self) -> String {
        format!("ws://{}:{}", self.server.host, self.server.port)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect.retry_secs)
    }

    pub fn connect_retry_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect.connect_retry_secs)
    }
}

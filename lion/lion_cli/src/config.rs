//! CLI configuration loaded from a TOML file.
//!
//! ```toml
//! [pool]
//! initial_size = 2
//! max_size = 10
//! validate_on_get = true
//!
//! [server]
//! addr = "127.0.0.1:8003"
//! connect_timeout_ms = 1000
//! io_timeout_ms = 5000
//! ```

use lion_pool::PoolConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Error loading or rendering the configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that was read
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be rendered as TOML
    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Top-level CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Pool sizing and validation
    pub pool: PoolSettings,

    /// Peer the pool connects to
    pub server: ServerSettings,
}

/// Pool section of the configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Connections opened when the pool is built
    pub initial_size: usize,

    /// Maximum idle connections kept
    pub max_size: usize,

    /// Check idle connections before handing them out
    pub validate_on_get: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        let defaults = PoolConfig::default();
        Self {
            initial_size: defaults.initial_size,
            max_size: defaults.max_size,
            validate_on_get: true,
        }
    }
}

impl PoolSettings {
    /// Capacity settings for the pool
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::new(self.initial_size, self.max_size)
    }
}

/// Server section of the configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address of the PING/PONG server
    pub addr: SocketAddr,

    /// Connect timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// Read/write timeout in milliseconds, 0 disables it
    pub io_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8003),
            connect_timeout_ms: 1000,
            io_timeout_ms: 5000,
        }
    }
}

impl ServerSettings {
    /// Connect timeout as a duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Read/write timeout as a duration, `None` when disabled
    pub fn io_timeout(&self) -> Option<Duration> {
        (self.io_timeout_ms > 0).then(|| Duration::from_millis(self.io_timeout_ms))
    }
}

impl CliConfig {
    /// Load the configuration from `path`, or use defaults when absent
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml(&content)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse the configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

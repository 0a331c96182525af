use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use thiserror::Error;

/// Environment variable naming a YAML config file.
pub const CONFIG_ENV: &str = "LANTERN_CONFIG";
/// Overrides `server.listen_addr`.
pub const LISTEN_ENV: &str = "LISTEN";
/// Overrides `static_files.root`.
pub const ROOT_ENV: &str = "LANTERN_ROOT";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Server configuration. Every field has a default, so an empty document is
/// a valid config.
///
/// ```yaml
/// server:
///   listen_addr: 0.0.0.0:8080
///   max_connections: 65535
///   idle_timeout_secs: 30
/// static_files:
///   root: ./resources
/// pool:
///   threads: 8
///   queue_capacity: 10000
/// limits:
///   read_buffer_size: 2048
///   write_buffer_size: 1024
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub static_files: StaticFilesConfig,
    pub pool: PoolConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub max_connections: usize,
    /// Close connections left idle this long; never when unset.
    pub idle_timeout_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            max_connections: 65535,
            idle_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticFilesConfig {
    pub root: PathBuf,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./resources"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    pub threads: usize,
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            threads: 8,
            queue_capacity: 10000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    pub read_buffer_size: usize,
    pub write_buffer_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: 2048,
            write_buffer_size: 1024,
        }
    }
}

impl Config {
    /// Loads the file named by `LANTERN_CONFIG` (defaults otherwise), then
    /// applies the `LISTEN` and `LANTERN_ROOT` overrides and validates.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };

        if let Ok(listen_addr) = std::env::var(LISTEN_ENV) {
            cfg.server.listen_addr = listen_addr;
        }
        if let Ok(root) = std::env::var(ROOT_ENV) {
            cfg.static_files.root = PathBuf::from(root);
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_yaml_str(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_yaml_str(raw: &str) -> anyhow::Result<Self> {
        // an empty document deserializes as null
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .listen_addr
            .parse()
            .map_err(|e: std::net::AddrParseError| {
                ConfigError::invalid("server.listen_addr", e.to_string())
            })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr()?;
        if self.server.max_connections == 0 {
            return Err(ConfigError::invalid("server.max_connections", "must be positive"));
        }
        if self.server.idle_timeout_secs == Some(0) {
            return Err(ConfigError::invalid("server.idle_timeout_secs", "must be positive"));
        }
        if self.pool.threads == 0 {
            return Err(ConfigError::invalid("pool.threads", "must be positive"));
        }
        if self.pool.queue_capacity == 0 {
            return Err(ConfigError::invalid("pool.queue_capacity", "must be positive"));
        }
        if self.limits.read_buffer_size == 0 {
            return Err(ConfigError::invalid("limits.read_buffer_size", "must be positive"));
        }
        if self.limits.write_buffer_size == 0 {
            return Err(ConfigError::invalid("limits.write_buffer_size", "must be positive"));
        }
        Ok(())
    }
}

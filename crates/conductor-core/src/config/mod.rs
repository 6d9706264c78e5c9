//! Controller configuration surface.
//!
//! Configuration is loaded from a TOML file, with every field defaulted so
//! a missing file yields a usable development configuration. The binary
//! applies CLI overrides on top before calling
//! [`validate`](ControllerConfig::validate); validation is fail-closed and
//! runs before recovery, so an invalid maximum-attempts value or a malformed
//! staging root never reaches the retry policy or the marker protocol.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for this schema.
    #[error("failed to parse configuration")]
    Parse(#[from] toml::de::Error),

    /// The configuration parsed but is not usable.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Per-job controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Root of the shared staging filesystem. Must be absolute: attempts of
    /// the same job may run on different hosts and must derive identical
    /// staging paths.
    #[serde(default = "default_staging_root")]
    pub staging_root: PathBuf,

    /// Maximum number of attempts the cluster manager will launch for this
    /// job. Must be at least 1.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Identity of the submitting user; owns the staging subtree.
    #[serde(default)]
    pub user: String,

    /// Interval between liveness reports to the cluster manager.
    #[serde(default = "default_heartbeat_interval")]
    #[serde(with = "humantime_serde")]
    pub heartbeat_interval: Duration,

    /// Number of containers the local allocator pool serves in single-host
    /// mode.
    #[serde(default = "default_allocator_pool_size")]
    pub allocator_pool_size: usize,
}

fn default_staging_root() -> PathBuf {
    PathBuf::from("/var/lib/conductor/staging")
}

const fn default_max_attempts() -> u32 {
    2
}

const fn default_heartbeat_interval() -> Duration {
    Duration::from_secs(1)
}

const fn default_allocator_pool_size() -> usize {
    4
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            staging_root: default_staging_root(),
            max_attempts: default_max_attempts(),
            user: String::new(),
            heartbeat_interval: default_heartbeat_interval(),
            allocator_pool_size: default_allocator_pool_size(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid for this schema.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Check the configuration before any of it is acted on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when:
    /// - `max_attempts` is zero (the retry policy assumes at least one
    ///   attempt exists),
    /// - `user` is empty (the staging layout is per-user),
    /// - `staging_root` is relative (attempts on different hosts would
    ///   derive different paths),
    /// - `heartbeat_interval` is zero,
    /// - `allocator_pool_size` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.user.is_empty() {
            return Err(ConfigError::Validation(
                "user must be set (staging paths are per-user)".to_string(),
            ));
        }
        if self.staging_root.is_relative() {
            return Err(ConfigError::Validation(format!(
                "staging_root must be absolute, got '{}'",
                self.staging_root.display()
            )));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::Validation(
                "heartbeat_interval must be non-zero".to_string(),
            ));
        }
        if self.allocator_pool_size == 0 {
            return Err(ConfigError::Validation(
                "allocator_pool_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

mod humantime_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

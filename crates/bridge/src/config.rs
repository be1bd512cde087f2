//! Configuration for the shell bridge.
//!
//! This module provides TOML-based configuration loading and saving for the
//! SSH target and the bridge timing knobs.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("target.host must not be empty")]
    EmptyHost,

    #[error("target.username must not be empty")]
    EmptyUsername,

    #[error("target must configure a password or a key_file")]
    MissingAuth,

    #[error("timeouts.ready_secs must be between 1 and 300, got {0}")]
    InvalidReadyTimeout(u64),

    #[error("timeouts.settle_delay_ms must be at most 10000, got {0}")]
    InvalidSettleDelay(u64),

    #[error("pump.read_retry_attempts must be between 1 and 10, got {0}")]
    InvalidRetryAttempts(u32),
}

/// Main configuration structure for the bridge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// The SSH target to bridge into.
    pub target: TargetConfig,

    /// Timing configuration for the session lifecycle.
    pub timeouts: TimeoutConfig,

    /// Outbound pump configuration.
    pub pump: PumpConfig,
}

/// SSH target host and credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TargetConfig {
    /// Host name or address of the remote machine.
    pub host: String,

    /// SSH port.
    pub port: u16,

    /// User to authenticate as.
    pub username: String,

    /// Password for password authentication.
    pub password: Option<String>,

    /// Path to a private key file for public-key authentication.
    pub key_file: Option<PathBuf>,

    /// Passphrase for the private key, if encrypted.
    pub key_passphrase: Option<String>,
}

/// Timing configuration for the session lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// TCP connect and SSH handshake timeout in seconds.
    pub connect_secs: u64,

    /// How long the dispatch path waits for the setup task's ready signal.
    pub ready_secs: u64,

    /// Pause after shell startup before streaming begins, absorbing the
    /// remote shell's own startup banner.
    pub settle_delay_ms: u64,

    /// Bound on enqueueing an input write, so the delivery path is never
    /// blocked indefinitely.
    pub write_enqueue_ms: u64,
}

/// Outbound pump configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PumpConfig {
    /// Attempts before a non-EOF read error closes the session.
    pub read_retry_attempts: u32,

    /// Initial backoff between read retries, doubled per attempt.
    pub read_retry_backoff_ms: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 22,
            username: String::new(),
            password: None,
            key_file: None,
            key_passphrase: None,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            ready_secs: 15,
            settle_delay_ms: 1000,
            write_enqueue_ms: 5000,
        }
    }
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            read_retry_attempts: 3,
            read_retry_backoff_ms: 100,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create config dir: {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.target.host.is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.target.username.is_empty() {
            return Err(ConfigError::EmptyUsername);
        }
        if self.target.password.is_none() && self.target.key_file.is_none() {
            return Err(ConfigError::MissingAuth);
        }
        if self.timeouts.ready_secs == 0 || self.timeouts.ready_secs > 300 {
            return Err(ConfigError::InvalidReadyTimeout(self.timeouts.ready_secs));
        }
        if self.timeouts.settle_delay_ms > 10_000 {
            return Err(ConfigError::InvalidSettleDelay(self.timeouts.settle_delay_ms));
        }
        if self.pump.read_retry_attempts == 0 || self.pump.read_retry_attempts > 10 {
            return Err(ConfigError::InvalidRetryAttempts(self.pump.read_retry_attempts));
        }
        Ok(())
    }
}

impl TimeoutConfig {
    /// Connect timeout as a [`Duration`].
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    /// Ready-signal timeout as a [`Duration`].
    pub fn ready(&self) -> Duration {
        Duration::from_secs(self.ready_secs)
    }

    /// Settle delay as a [`Duration`].
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Write-enqueue bound as a [`Duration`].
    pub fn write_enqueue(&self) -> Duration {
        Duration::from_millis(self.write_enqueue_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn valid_config() -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.target.host = "shell.example.com".to_string();
        config.target.username = "deploy".to_string();
        config.target.password = Some("hunter2".to_string());
        config
    }

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.target.port, 22);
        assert_eq!(config.timeouts.settle_delay_ms, 1000);
        assert_eq!(config.timeouts.ready_secs, 15);
        assert_eq!(config.pump.read_retry_attempts, 3);
    }

    #[test]
    fn test_validate_ok() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_empty_host() {
        let mut config = valid_config();
        config.target.host.clear();
        assert_eq!(config.validate(), Err(ConfigError::EmptyHost));
    }

    #[test]
    fn test_validate_empty_username() {
        let mut config = valid_config();
        config.target.username.clear();
        assert_eq!(config.validate(), Err(ConfigError::EmptyUsername));
    }

    #[test]
    fn test_validate_missing_auth() {
        let mut config = valid_config();
        config.target.password = None;
        assert_eq!(config.validate(), Err(ConfigError::MissingAuth));
    }

    #[test]
    fn test_validate_key_file_is_sufficient() {
        let mut config = valid_config();
        config.target.password = None;
        config.target.key_file = Some(PathBuf::from("/home/deploy/.ssh/id_ed25519"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_ready_timeout_bounds() {
        let mut config = valid_config();
        config.timeouts.ready_secs = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidReadyTimeout(0)));
        config.timeouts.ready_secs = 301;
        assert_eq!(config.validate(), Err(ConfigError::InvalidReadyTimeout(301)));
    }

    #[test]
    fn test_validate_retry_attempts_bounds() {
        let mut config = valid_config();
        config.pump.read_retry_attempts = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidRetryAttempts(0)));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bridge.toml");

        let config = valid_config();
        config.save(&path).unwrap();

        let loaded = BridgeConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bridge.toml");
        fs::write(&path, "[target]\nhost = \"h\"\nusername = \"u\"\n").unwrap();

        let config = BridgeConfig::load(&path).unwrap();
        assert_eq!(config.target.host, "h");
        assert_eq!(config.target.port, 22);
        assert_eq!(config.timeouts.ready_secs, 15);
    }

    #[test]
    fn test_load_missing_file() {
        let result = BridgeConfig::load(Path::new("/nonexistent/bridge.toml"));
        assert!(result.is_err());
    }
}

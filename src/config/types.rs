//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::directory::{AuthConfig, DirectoryConfig};
use super::limits::LimitsConfig;
use super::listen::ListenConfig;
use super::security::SecurityConfig;
use super::validation::{self, ValidationError};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {}", format_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Hub configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server identity and keepalive.
    #[serde(default)]
    pub server: ServerConfig,
    /// WebSocket listener.
    pub listen: ListenConfig,
    /// Frame, queue and deadline limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Rate limiting.
    #[serde(default)]
    pub security: SecurityConfig,
    /// Static bearer tokens for the development authenticator.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Conversations and contacts for the in-memory directory.
    #[serde(default)]
    pub directory: DirectoryConfig,
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate(self).map_err(ConfigError::Invalid)
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Name used in logs.
    #[serde(default = "default_server_name")]
    pub name: String,
    /// Prometheus metrics HTTP port (default: 9090, 0 disables).
    pub metrics_port: Option<u16>,
    /// Keepalive and liveness timing.
    #[serde(default)]
    pub idle_timeouts: IdleTimeoutsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            metrics_port: None,
            idle_timeouts: IdleTimeoutsConfig::default(),
        }
    }
}

fn default_server_name() -> String {
    "hubd".to_string()
}

/// Keepalive configuration for client connections.
///
/// The writer sends a WebSocket Ping every `ping` seconds; the reader drops
/// the connection when nothing at all has been read for `timeout` seconds. `ping` must be strictly less than `timeout`.
#[derive(Debug, Clone, Deserialize)]
pub struct IdleTimeoutsConfig {
    /// Seconds between keepalive pings (default: 30).
    #[serde(default = "default_ping_interval")]
    pub ping: u64,

    /// Seconds without any inbound frame before disconnect (default: 75).
    #[serde(default = "default_liveness_timeout")]
    pub timeout: u64,
}

impl IdleTimeoutsConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping)
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Default for IdleTimeoutsConfig {
    fn default() -> Self {
        Self {
            ping: default_ping_interval(),
            timeout: default_liveness_timeout(),
        }
    }
}

fn default_ping_interval() -> u64 {
    30
}

fn default_liveness_timeout() -> u64 {
    75
}

//! Rate limiting configuration.

use serde::Deserialize;

/// Security configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityConfig {
    /// Rate limiting configuration.
    #[serde(default)]
    pub rate_limits: RateLimitConfig,
}

/// Token bucket parameters for inbound events and new connections.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Sustained inbound events per second per connection (default: 20).
    #[serde(default = "default_event_rate")]
    pub event_rate_per_second: u32,
    /// Inbound event burst per connection (default: 40).
    #[serde(default = "default_event_burst")]
    pub event_burst: u32,
    /// New connections per second per IP (default: 5).
    #[serde(default = "default_connection_rate")]
    pub connection_rate_per_second: u32,
    /// Connection burst per IP (default: 10).
    #[serde(default = "default_connection_burst")]
    pub connection_burst_per_ip: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            event_rate_per_second: default_event_rate(),
            event_burst: default_event_burst(),
            connection_rate_per_second: default_connection_rate(),
            connection_burst_per_ip: default_connection_burst(),
        }
    }
}

fn default_event_rate() -> u32 {
    20
}

fn default_event_burst() -> u32 {
    40
}

fn default_connection_rate() -> u32 {
    5
}

fn default_connection_burst() -> u32 {
    10
}

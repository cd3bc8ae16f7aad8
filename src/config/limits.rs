//! Frame, queue and deadline limits.

use serde::Deserialize;
use std::time::Duration;

/// Per-connection and per-call limits.
///
/// These bound how much memory a single client can pin and how long any
/// one external call may hold up an event.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Largest inbound frame in bytes (default: 65536). Larger frames close the connection.
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
    /// Outbound queue capacity per connection (default: 256).
    /// A full queue marks the connection as a slow consumer.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
    /// Seconds allowed for a single socket write (default: 10).
    #[serde(default = "default_write_timeout")]
    pub write_timeout: u64,
    /// Maximum chat message length in characters (default: 4096).
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
    /// Deadline for collaborator calls in milliseconds (default: 5000).
    #[serde(default = "default_collaborator_timeout_ms")]
    pub collaborator_timeout_ms: u64,
    /// Capacity of the slow-consumer removal queue (default: 1024).
    #[serde(default = "default_removal_queue")]
    pub removal_queue: usize,
}

impl LimitsConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout)
    }

    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_millis(self.collaborator_timeout_ms)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_frame_size: default_max_frame_size(),
            outbound_queue: default_outbound_queue(),
            write_timeout: default_write_timeout(),
            max_message_length: default_max_message_length(),
            collaborator_timeout_ms: default_collaborator_timeout_ms(),
            removal_queue: default_removal_queue(),
        }
    }
}

fn default_max_frame_size() -> usize {
    64 * 1024
}

fn default_outbound_queue() -> usize {
    256
}

fn default_write_timeout() -> u64 {
    10
}

fn default_max_message_length() -> usize {
    4096
}

fn default_collaborator_timeout_ms() -> u64 {
    5000
}

fn default_removal_queue() -> usize {
    1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_are_correct() {
        let config = LimitsConfig::default();
        assert_eq!(config.max_frame_size, 65536);
        assert_eq!(config.outbound_queue, 256);
        assert_eq!(config.write_timeout(), Duration::from_secs(10));
        assert_eq!(config.max_message_length, 4096);
        assert_eq!(config.collaborator_timeout(), Duration::from_secs(5));
        assert_eq!(config.removal_queue, 1024);
    }

    #[test]
    fn partial_table_keeps_other_defaults() {
        let config: LimitsConfig = toml::from_str("outbound_queue = 4").unwrap();
        assert_eq!(config.outbound_queue, 4);
        assert_eq!(config.max_frame_size, 65536);
    }
}

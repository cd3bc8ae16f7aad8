//! WebSocket listener configuration.

use serde::Deserialize;
use std::net::SocketAddr;

/// WebSocket listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Address to bind to (e.g., "0.0.0.0:8080").
    pub address: SocketAddr,
    /// Allowed `Origin` header values. Empty allows every origin.
    #[serde(default)]
    pub allow_origins: Vec<String>,
    /// Seconds allowed for the WebSocket handshake and authentication (default: 10).
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout: u64,
}

impl ListenConfig {
    /// Whether a browser origin may open a connection.
    ///
    /// Clients that send no `Origin` (native apps) are always allowed.
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        match origin {
            None => true,
            Some(_) if self.allow_origins.is_empty() => true,
            Some(origin) => self
                .allow_origins
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(origin)),
        }
    }
}

fn default_handshake_timeout() -> u64 {
    10
}

//! Test hub management.
//!
//! Spawns and manages hubd instances for integration testing.

use std::process::{Child, Command};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

/// Rate limits loose enough that no ordinary test trips them.
pub const RELAXED_RATE_LIMITS: &str = r#"
[security.rate_limits]
event_rate_per_second = 1000
event_burst = 1000
connection_rate_per_second = 1000
connection_burst_per_ip = 1000
"#;

/// A test hub instance.
pub struct TestServer {
    child: Child,
    port: u16,
    _data_dir: TempDir,
}

impl TestServer {
    /// Spawn a hub with the standard directory and relaxed rate limits.
    pub async fn spawn(port: u16) -> anyhow::Result<Self> {
        Self::spawn_with(port, RELAXED_RATE_LIMITS, "").await
    }

    /// Spawn a hub with custom rate limits and extra TOML appended.
    ///
    /// Tokens: `<user>-token` for alice, bob, carol and dave. Conversation
    /// `c1` is between alice and bob; carol follows alice's presence.
    pub async fn spawn_with(port: u16, rate_limits: &str, extra: &str) -> anyhow::Result<Self> {
        let data_dir = tempfile::tempdir()?;
        let config_path = data_dir.path().join("config.toml");
        let config_content = format!(
            r#"
[server]
name = "test.hub"
metrics_port = 0

[server.idle_timeouts]
ping = 1
timeout = 3

[listen]
address = "127.0.0.1:{port}"
handshake_timeout = 2

{rate_limits}

[[auth.tokens]]
token = "alice-token"
user_id = "alice"

[[auth.tokens]]
token = "bob-token"
user_id = "bob"

[[auth.tokens]]
token = "carol-token"
user_id = "carol"

[[auth.tokens]]
token = "dave-token"
user_id = "dave"

[[directory.conversations]]
id = "c1"
participants = ["alice", "bob"]

[directory.contacts]
alice = ["carol"]

{extra}
"#
        );
        std::fs::write(&config_path, config_content)?;

        let child = Command::new(env!("CARGO_BIN_EXE_hubd"))
            .arg(&config_path)
            .env("RUST_LOG", "warn")
            .spawn()?;

        let server = Self {
            child,
            port,
            _data_dir: data_dir,
        };

        // Wait for server to start listening
        server.wait_until_ready().await?;

        Ok(server)
    }

    /// Wait until the hub is accepting connections.
    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for _ in 0..50 {
            if tokio::net::TcpStream::connect(("127.0.0.1", self.port))
                .await
                .is_ok()
            {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("Hub failed to start within 5 seconds")
    }

    /// WebSocket URL of the hub.
    pub fn url(&self) -> String {
        format!("ws://127.0.0.1:{}/ws", self.port)
    }

    /// Connect as `user` with its standard token and consume the greeting.
    pub async fn connect(&self, user: &str) -> anyhow::Result<super::client::TestClient> {
        let mut client =
            super::client::TestClient::connect(&self.url(), Some(&format!("{user}-token"))).await?;
        client.recv_type("connection_success").await?;
        Ok(client)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

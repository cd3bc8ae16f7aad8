//! Test WebSocket client.
//!
//! Sends JSON events and asserts on received ones.

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// A test hub client.
pub struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

/// What ended a connection, as seen by the client.
#[derive(Debug)]
pub enum Closed {
    Frame(Option<CloseFrame<'static>>),
    Eof,
}

impl TestClient {
    /// Connect to `url`, presenting `token` as a bearer header.
    pub async fn connect(url: &str, token: Option<&str>) -> anyhow::Result<Self> {
        let mut request = url.into_client_request()?;
        if let Some(token) = token {
            request
                .headers_mut()
                .insert("Authorization", format!("Bearer {token}").parse()?);
        }
        let (ws, _) = connect_async(request).await?;
        Ok(Self { ws })
    }

    /// Send a JSON event.
    pub async fn send_json(&mut self, value: Value) -> anyhow::Result<()> {
        self.send_raw(&value.to_string()).await
    }

    /// Send a raw text frame.
    pub async fn send_raw(&mut self, text: &str) -> anyhow::Result<()> {
        self.ws.send(Message::Text(text.to_string())).await?;
        Ok(())
    }

    /// Send a binary frame.
    pub async fn send_binary(&mut self, bytes: Vec<u8>) -> anyhow::Result<()> {
        self.ws.send(Message::Binary(bytes)).await?;
        Ok(())
    }

    /// Receive the next JSON event.
    pub async fn recv(&mut self) -> anyhow::Result<Value> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    /// Receive the next JSON event, skipping control frames.
    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<Value> {
        loop {
            let frame = timeout(dur, self.ws.next())
                .await?
                .ok_or_else(|| anyhow::anyhow!("connection closed"))??;
            match frame {
                Message::Text(text) => return Ok(serde_json::from_str(&text)?),
                Message::Close(frame) => anyhow::bail!("connection closed: {frame:?}"),
                _ => continue,
            }
        }
    }

    /// Receive events until one of type `kind` arrives.
    pub async fn recv_type(&mut self, kind: &str) -> anyhow::Result<Value> {
        loop {
            let event = self.recv().await?;
            if event["type"] == kind {
                return Ok(event);
            }
        }
    }

    /// Assert that no event of type `kind` arrives within `dur`.
    pub async fn expect_none_of(&mut self, kind: &str, dur: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + dur;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Ok(());
            }
            match self.recv_timeout(remaining).await {
                Ok(event) if event["type"] == kind => {
                    anyhow::bail!("unexpected {kind} event: {event}")
                }
                Ok(_) => continue,
                Err(_) => return Ok(()),
            }
        }
    }

    /// Read until the hub closes the connection.
    pub async fn recv_close(&mut self) -> anyhow::Result<Closed> {
        loop {
            match timeout(Duration::from_secs(5), self.ws.next()).await? {
                Some(Ok(Message::Close(frame))) => return Ok(Closed::Frame(frame)),
                Some(Ok(_)) => continue,
                Some(Err(_)) | None => return Ok(Closed::Eof),
            }
        }
    }

    /// Close from the client side.
    pub async fn close(mut self) -> anyhow::Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}

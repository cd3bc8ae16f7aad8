//! Connection worker - owns one authenticated WebSocket.
//!
//! ```text
//!   socket ──► read_loop ──► handlers ──► hub / rooms / users
//!                                              │ try_send
//!                                              ▼
//!   socket ◄── write_loop ◄──────────── bounded queue
//! ```
//!
//! The writer runs as its own task; the reader runs on the worker task.
//! Whichever side stops first triggers teardown through `Hub::disconnect`,
//! which cancels the close token the other side is watching.

mod error_handling;
mod event_loop;
mod writer;

use crate::config::Config;
use crate::security::EventLimiter;
use crate::state::{ConnectionHandle, Hub};
use futures_util::StreamExt;
use futures_util::stream::{SplitSink, SplitStream};
use hub_proto::Payload;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{Instrument, info};

pub(crate) type WsStream = WebSocketStream<TcpStream>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

/// Timing and size limits shared by every connection worker.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub ping_interval: Duration,
    pub liveness_timeout: Duration,
    pub write_timeout: Duration,
    pub max_frame_size: usize,
}

impl WorkerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ping_interval: config.server.idle_timeouts.ping_interval(),
            liveness_timeout: config.server.idle_timeouts.liveness_timeout(),
            write_timeout: config.limits.write_timeout(),
            max_frame_size: config.limits.max_frame_size,
        }
    }
}

/// A registered client connection.
pub(crate) struct Connection {
    hub: Arc<Hub>,
    conn: Arc<ConnectionHandle>,
    outbound: mpsc::Receiver<Payload>,
    ws: WsStream,
    limiter: EventLimiter,
    settings: WorkerSettings,
}

impl Connection {
    pub(crate) fn new(
        hub: Arc<Hub>,
        conn: Arc<ConnectionHandle>,
        outbound: mpsc::Receiver<Payload>,
        ws: WsStream,
        limiter: EventLimiter,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            hub,
            conn,
            outbound,
            ws,
            limiter,
            settings,
        }
    }

    /// Run both loops until the connection ends, then tear it down.
    pub(crate) async fn run(self) -> anyhow::Result<()> {
        let Self {
            hub,
            conn,
            outbound,
            ws,
            limiter,
            settings,
        } = self;

        let (sink, stream) = ws.split();
        let (close_tx, close_rx) = oneshot::channel();

        let writer = tokio::spawn(
            writer::write_loop(
                sink,
                outbound,
                Arc::clone(&conn),
                close_rx,
                hub.subscribe_shutdown(),
                settings.clone(),
            )
            .in_current_span(),
        );

        let exit = event_loop::read_loop(
            stream,
            &hub,
            &conn,
            limiter,
            &settings,
            hub.subscribe_shutdown(),
        )
        .await;

        if let Some(frame) = exit.close_frame() {
            let _ = close_tx.send(frame);
        }
        hub.disconnect(&conn, exit.reason()).await;
        writer.await?;

        info!(reason = exit.reason(), "Connection closed");
        Ok(())
    }
}

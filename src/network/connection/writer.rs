//! Outbound half of the connection worker.
//!
//! The writer is the only task that touches the socket sink. It drains the
//! connection's bounded queue, probes the peer with a Ping every interval,
//! and ends with a Close frame.
//! The Ping goes out on every tick, busy or not: the reader's liveness
//! deadline only moves on inbound frames.

use super::{WorkerSettings, WsWriter};
use crate::state::ConnectionHandle;
use futures_util::SinkExt;
use hub_proto::Payload;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::debug;

#[derive(Debug, Error)]
enum WriteError {
    #[error("write timed out")]
    Timeout,
    #[error(transparent)]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
}

async fn send(sink: &mut WsWriter, message: Message, limit: Duration) -> Result<(), WriteError> {
    timeout(limit, sink.send(message))
        .await
        .map_err(|_| WriteError::Timeout)??;
    Ok(())
}

pub(super) async fn write_loop(
    mut sink: WsWriter,
    mut outbound: mpsc::Receiver<Payload>,
    conn: Arc<ConnectionHandle>,
    mut close_frame: oneshot::Receiver<CloseFrame<'static>>,
    mut shutdown: broadcast::Receiver<()>,
    settings: WorkerSettings,
) {
    let close = conn.close_token();
    let mut keepalive = interval_at(
        Instant::now() + settings.ping_interval,
        settings.ping_interval,
    );
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = close.cancelled() => {
                while let Ok(payload) = outbound.try_recv() {
                    if send(&mut sink, Message::Text(payload.to_text()), settings.write_timeout)
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                let frame = close_frame.try_recv().unwrap_or(CloseFrame {
                    code: CloseCode::Normal,
                    reason: "".into(),
                });
                finish(&mut sink, frame, settings.write_timeout, &conn).await;
                return;
            }
            _ = shutdown.recv() => {
                let frame = CloseFrame {
                    code: CloseCode::Away,
                    reason: "server shutting down".into(),
                };
                finish(&mut sink, frame, settings.write_timeout, &conn).await;
                return;
            }
            payload = outbound.recv() => {
                let Some(payload) = payload else {
                    return;
                };
                if let Err(e) =
                    send(&mut sink, Message::Text(payload.to_text()), settings.write_timeout).await
                {
                    debug!(conn = %conn.id(), error = %e, "Write failed");
                    conn.close();
                    return;
                }
            }
            _ = keepalive.tick() => {
                if let Err(e) =
                    send(&mut sink, Message::Ping(Vec::new()), settings.write_timeout).await
                {
                    debug!(conn = %conn.id(), error = %e, "Keepalive ping failed");
                    conn.close();
                    return;
                }
            }
        }
    }
}

async fn finish(
    sink: &mut WsWriter,
    frame: CloseFrame<'static>,
    limit: Duration,
    conn: &ConnectionHandle,
) {
    let code = u16::from(frame.code);
    if let Err(e) = send(sink, Message::Close(Some(frame)), limit).await {
        debug!(conn = %conn.id(), code, error = %e, "Close frame not delivered");
    }
    let _ = timeout(limit, sink.close()).await;
}

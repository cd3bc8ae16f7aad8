//! Inbound half of the connection worker.

use super::error_handling::{ReadErrorAction, classify_read_error};
use super::{WorkerSettings, WsReader};
use crate::error::HandlerError;
use crate::handlers::{Context, route};
use crate::security::{EventLimiter, FloodVerdict};
use crate::state::{ConnectionHandle, Hub};
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{Instant, timeout_at};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, warn};

/// Why the read loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ReadExit {
    PeerClosed,
    Idle,
    Closing,
    Shutdown,
    FrameTooLarge,
    Flooded,
    Transport,
}

impl ReadExit {
    pub(super) fn reason(self) -> &'static str {
        match self {
            Self::PeerClosed => "peer closed",
            Self::Idle => "liveness timeout",
            Self::Closing => "close requested",
            Self::Shutdown => "server shutting down",
            Self::FrameTooLarge => "frame too large",
            Self::Flooded => "excess flood",
            Self::Transport => "transport error",
        }
    }

    /// Close frame the writer should send, when it differs from a plain close.
    pub(super) fn close_frame(self) -> Option<CloseFrame<'static>> {
        let code = match self {
            Self::FrameTooLarge => CloseCode::Size,
            Self::Flooded => CloseCode::Policy,
            Self::Shutdown => CloseCode::Away,
            Self::Idle => CloseCode::Normal,
            Self::PeerClosed | Self::Closing | Self::Transport => return None,
        };
        Some(CloseFrame {
            code,
            reason: self.reason().into(),
        })
    }
}

pub(super) async fn read_loop(
    mut stream: WsReader,
    hub: &Arc<Hub>,
    conn: &Arc<ConnectionHandle>,
    mut limiter: EventLimiter,
    settings: &WorkerSettings,
    mut shutdown: broadcast::Receiver<()>,
) -> ReadExit {
    let close = conn.close_token();
    let mut deadline = Instant::now() + settings.liveness_timeout;

    loop {
        let read = tokio::select! {
            biased;
            _ = close.cancelled() => return ReadExit::Closing,
            _ = shutdown.recv() => return ReadExit::Shutdown,
            read = timeout_at(deadline, stream.next()) => read,
        };

        let message = match read {
            Err(_) => {
                debug!(conn = %conn.id(), "No inbound traffic before liveness deadline");
                return ReadExit::Idle;
            }
            Ok(None) => return ReadExit::PeerClosed,
            Ok(Some(Err(e))) => {
                return match classify_read_error(&e) {
                    ReadErrorAction::Closed => ReadExit::PeerClosed,
                    ReadErrorAction::FrameTooLarge => {
                        warn!(conn = %conn.id(), error = %e, "Frame over size cap");
                        ReadExit::FrameTooLarge
                    }
                    ReadErrorAction::Protocol(detail) => {
                        warn!(conn = %conn.id(), error = %detail, "WebSocket protocol error");
                        ReadExit::Transport
                    }
                    ReadErrorAction::Io => {
                        debug!(conn = %conn.id(), error = %e, "Socket read failed");
                        ReadExit::Transport
                    }
                };
            }
            Ok(Some(Ok(message))) => message,
        };

        deadline = Instant::now() + settings.liveness_timeout;

        let text = match message {
            Message::Text(text) => Some(text),
            Message::Binary(_) => None,
            Message::Close(_) => return ReadExit::PeerClosed,
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
        };

        if text.as_ref().is_some_and(|t| t.len() > settings.max_frame_size) {
            return ReadExit::FrameTooLarge;
        }

        let ctx = Context::new(hub, conn);
        match limiter.check() {
            FloodVerdict::Allowed => {}
            FloodVerdict::Limited => {
                ctx.reply_error(&HandlerError::RateLimited);
                continue;
            }
            FloodVerdict::Exceeded => {
                warn!(conn = %conn.id(), user = %conn.user_id(), "Flood limit reached, closing");
                return ReadExit::Flooded;
            }
        }

        match text {
            Some(text) => route(&ctx, &text).await,
            None => {
                ctx.reply_error(&HandlerError::BinaryFrame);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_codes_follow_exit_reason() {
        assert_eq!(
            ReadExit::FrameTooLarge.close_frame().map(|f| f.code),
            Some(CloseCode::Size)
        );
        assert_eq!(
            ReadExit::Flooded.close_frame().map(|f| f.code),
            Some(CloseCode::Policy)
        );
        let shutdown = ReadExit::Shutdown.close_frame().unwrap();
        assert_eq!(shutdown.code, CloseCode::Away);
        assert_eq!(shutdown.reason, "server shutting down");
        assert!(ReadExit::PeerClosed.close_frame().is_none());
    }
}

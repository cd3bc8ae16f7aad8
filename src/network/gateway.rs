//! Gateway - WebSocket listener that authenticates and admits connections.
//!
//! The Gateway binds the listen socket, applies the per-IP connection rate
//! limit, performs the WebSocket upgrade (origin allow-list and bearer token
//! extraction happen inside the handshake callback), validates the token and
//! hands the registered connection to its worker.

use super::connection::{Connection, WorkerSettings, WsStream};
use crate::config::{Config, ListenConfig};
use crate::security::RateLimitManager;
use crate::state::Hub;
use crate::telemetry::spans;
use http::StatusCode;
use http::header::{AUTHORIZATION, ORIGIN};
use hub_proto::{OutboundEvent, Payload};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tracing::{Instrument, debug, error, info, instrument, warn};

/// Close code sent when the bearer token is rejected.
const CLOSE_UNAUTHORIZED: u16 = 4001;

/// State shared by every handshake task.
struct Admission {
    hub: Arc<Hub>,
    rate_limiter: Arc<RateLimitManager>,
    listen: ListenConfig,
    settings: WorkerSettings,
    ws_config: WebSocketConfig,
}

/// The Gateway accepts incoming WebSocket connections and spawns workers.
pub struct Gateway {
    listener: TcpListener,
    admission: Arc<Admission>,
}

impl Gateway {
    /// Bind the listener to `listen.address`.
    pub async fn bind(
        config: &Config,
        hub: Arc<Hub>,
        rate_limiter: Arc<RateLimitManager>,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(config.listen.address).await?;
        info!(address = %listener.local_addr()?, "WebSocket listener bound");

        let max_frame_size = config.limits.max_frame_size;
        let ws_config = WebSocketConfig {
            max_message_size: Some(max_frame_size),
            max_frame_size: Some(max_frame_size),
            ..WebSocketConfig::default()
        };

        Ok(Self {
            listener,
            admission: Arc::new(Admission {
                hub,
                rate_limiter,
                listen: config.listen.clone(),
                settings: WorkerSettings::from_config(config),
                ws_config,
            }),
        })
    }

    /// Accept connections until the hub shuts down.
    #[instrument(skip(self), name = "gateway")]
    pub async fn run(self) -> anyhow::Result<()> {
        let mut shutdown = self.admission.hub.subscribe_shutdown();

        loop {
            let (stream, addr) = tokio::select! {
                _ = shutdown.recv() => {
                    info!("Gateway stopped accepting connections");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                        continue;
                    }
                },
            };

            if !self.admission.rate_limiter.check_connection_rate(addr.ip()) {
                warn!(%addr, "Connection rate limit exceeded - rejecting");
                crate::metrics::record_connection_rejected("rate_limited");
                drop(stream);
                continue;
            }

            debug!(%addr, "Connection accepted");
            let admission = Arc::clone(&self.admission);
            tokio::spawn(async move {
                if let Err(e) = admission.admit(stream, addr).await {
                    warn!(%addr, error = %e, "Connection ended with error");
                }
            });
        }
    }
}

impl Admission {
    async fn admit(&self, stream: TcpStream, addr: SocketAddr) -> anyhow::Result<()> {
        let handshake_timeout = Duration::from_secs(self.listen.handshake_timeout);
        let Ok(upgraded) =
            tokio::time::timeout(handshake_timeout, self.handshake(stream, addr)).await
        else {
            warn!(%addr, "Handshake timed out");
            crate::metrics::record_connection_rejected("handshake_timeout");
            return Ok(());
        };
        let Some((mut ws, user_id)) = upgraded? else {
            return Ok(());
        };

        let hub = &self.hub;
        let (conn, outbound) = hub.new_connection(user_id, Some(addr));
        let span = spans::connection(conn.id().get(), conn.user_id(), &addr.ip().to_string());

        if let Err(e) = hub.register(&conn).await {
            error!(conn = %conn.id(), error = %e, "Registration failed");
            let frame = CloseFrame {
                code: CloseCode::Error,
                reason: "registration failed".into(),
            };
            let _ = ws.close(Some(frame)).await;
            return Ok(());
        }
        info!(parent: &span, "Client connected");

        hub.send_online_snapshot(&conn).await;
        conn.try_send(Payload::from(&OutboundEvent::ConnectionSuccess {
            user_id: conn.user_id().to_string(),
            connection_id: conn.id().get(),
            timestamp: hub.server_time(),
        }));

        Connection::new(
            Arc::clone(hub),
            conn,
            outbound,
            ws,
            self.rate_limiter.event_limiter(),
            self.settings.clone(),
        )
        .run()
        .instrument(span)
        .await
    }

    /// Upgrade the socket and authenticate the token it carried.
    ///
    /// Returns `None` when the client was turned away; the rejection has
    /// already been sent.
    async fn handshake(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
    ) -> anyhow::Result<Option<(WsStream, String)>> {
        let mut token = None;
        let callback = |req: &Request, response: Response| {
            let origin = req.headers().get(ORIGIN).and_then(|o| o.to_str().ok());
            if !self.listen.origin_allowed(origin) {
                warn!(%addr, origin = origin.unwrap_or_default(), "Origin not allowed");
                crate::metrics::record_connection_rejected("origin");
                return Err(reject(StatusCode::FORBIDDEN, "origin not allowed"));
            }
            match extract_token(req) {
                Some(found) => {
                    token = Some(found);
                    Ok(response)
                }
                None => {
                    crate::metrics::record_connection_rejected("missing_token");
                    Err(reject(StatusCode::UNAUTHORIZED, "missing token"))
                }
            }
        };

        let mut ws =
            match accept_hdr_async_with_config(stream, callback, Some(self.ws_config)).await {
                Ok(ws) => ws,
                Err(e) => {
                    debug!(%addr, error = %e, "WebSocket handshake failed");
                    return Ok(None);
                }
            };

        let Some(token) = token else {
            return Ok(None);
        };

        let call = self.hub.call_context();
        match call.run(self.hub.services.auth.validate(&call, &token)).await {
            Ok(user_id) => Ok(Some((ws, user_id))),
            Err(e) => {
                info!(%addr, error = %e, "Authentication failed");
                crate::metrics::record_connection_rejected("unauthorized");
                let frame = CloseFrame {
                    code: CloseCode::from(CLOSE_UNAUTHORIZED),
                    reason: "unauthorized".into(),
                };
                ws.close(Some(frame)).await?;
                Ok(None)
            }
        }
    }
}

fn reject(status: StatusCode, reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = status;
    response
}

/// Bearer token from the `Authorization` header, else the percent-decoded
/// `token` query parameter.
fn extract_token(req: &Request) -> Option<String> {
    let from_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            let (scheme, token) = value.split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
        })
        .filter(|token| !token.is_empty());

    if let Some(token) = from_header {
        return Some(token.to_string());
    }

    let (_, raw) = req
        .uri()
        .query()?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, value)| *key == "token" && !value.is_empty())?;
    urlencoding::decode(raw).ok().map(|token| token.into_owned())
}

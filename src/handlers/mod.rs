//! Message router and event handlers.
//!
//! Each inbound text frame is decoded once into an [`InboundEvent`] and
//! dispatched by an exhaustive match. Handler failures become an `error`
//! event for the originating connection; they never close it.

mod chat;
mod live;
mod presence;
mod room;
mod typing;

use crate::error::{HandlerError, HandlerResult};
use crate::services::CallContext;
use crate::state::{ConnectionHandle, Hub, SendOutcome};
use crate::telemetry::EventTimer;
use hub_proto::{InboundEvent, OutboundEvent, Payload};
use std::sync::Arc;
use tracing::{Instrument, Level, debug, span};

/// Everything a handler needs for one event.
pub struct Context<'a> {
    pub hub: &'a Arc<Hub>,
    pub conn: &'a Arc<ConnectionHandle>,
    /// Deadline shared by every collaborator call made for this event.
    pub call: CallContext,
}

impl<'a> Context<'a> {
    pub fn new(hub: &'a Arc<Hub>, conn: &'a Arc<ConnectionHandle>) -> Self {
        Self {
            hub,
            conn,
            call: hub.call_context(),
        }
    }

    pub fn user_id(&self) -> &str {
        self.conn.user_id()
    }

    /// Send an event to the originating connection only.
    pub fn reply(&self, event: &OutboundEvent) -> SendOutcome {
        self.conn.try_send(Payload::from(event))
    }

    pub fn reply_error(&self, err: &HandlerError) -> SendOutcome {
        self.reply(&err.to_event(self.hub.server_time()))
    }
}

/// Decode and handle one text frame.
pub async fn route(ctx: &Context<'_>, raw: &str) {
    let event = match InboundEvent::decode(raw) {
        Ok(event) => event,
        Err(e) => {
            let err = HandlerError::from(e);
            crate::metrics::record_event_error("undecodable", err.error_code());
            debug!(conn = %ctx.conn.id(), error = %err, "Rejected inbound frame");
            ctx.reply_error(&err);
            return;
        }
    };

    let kind = event.kind();
    let event_span = span!(
        Level::DEBUG,
        "hub.event",
        kind,
        conn = ctx.conn.id().get(),
        user = %ctx.user_id(),
    );
    let _timer = EventTimer::new(kind);

    if let Err(err) = dispatch(ctx, event).instrument(event_span).await {
        crate::metrics::record_event_error(kind, err.error_code());
        debug!(kind, conn = %ctx.conn.id(), error = %err, "Event error");
        ctx.reply_error(&err);
    }
}

async fn dispatch(ctx: &Context<'_>, event: InboundEvent) -> HandlerResult {
    match event {
        InboundEvent::ChatMessage(msg) => chat::handle_message(ctx, msg).await,
        InboundEvent::ReadReceipt(receipt) => chat::handle_read_receipt(ctx, receipt).await,
        InboundEvent::Typing(typing) => typing::handle(ctx, typing),
        InboundEvent::PresenceUpdate(update) => presence::handle(ctx, update).await,
        InboundEvent::JoinRoom(req) => room::handle_join(ctx, req).await,
        InboundEvent::LeaveRoom(req) => room::handle_leave(ctx, req).await,
        InboundEvent::LiveStream(action) => live::handle(ctx, action).await,
        InboundEvent::Ping => {
            ctx.reply(&OutboundEvent::Pong {
                timestamp: ctx.hub.server_time(),
            });
            Ok(())
        }
    }
}

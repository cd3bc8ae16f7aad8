//! Typing indicator relay. Stateless: no persistence, no ack, no retry.

use super::Context;
use crate::error::HandlerResult;
use hub_proto::{OutboundEvent, Payload, RoomId, Typing};
use tracing::debug;

pub fn handle(ctx: &Context<'_>, typing: Typing) -> HandlerResult {
    let room = RoomId::conversation(&typing.conversation_id)?;

    if !ctx.hub.rooms.is_member(&room, ctx.conn.id()) {
        debug!(%room, conn = %ctx.conn.id(), "Typing indicator from non-member dropped");
        return Ok(());
    }

    let event = OutboundEvent::Typing {
        conversation_id: typing.conversation_id,
        user_id: ctx.user_id().to_string(),
        is_typing: typing.is_typing,
        timestamp: ctx.hub.server_time(),
    };
    ctx.hub.broadcast_to_room(&room, &Payload::from(&event), Some(ctx.conn.id()));
    Ok(())
}

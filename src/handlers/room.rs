//! Explicit room membership.
//!
//! Stream rooms go through the live-stream join and leave, so room
//! membership and the stream's viewer list stay in step.

use super::{Context, chat, live};
use crate::error::{HandlerError, HandlerResult};
use hub_proto::{OutboundEvent, RoomKind, RoomRequest};

pub async fn handle_join(ctx: &Context<'_>, req: RoomRequest) -> HandlerResult {
    match req.room.kind() {
        RoomKind::Conversation => {
            chat::authorize(ctx, req.room.id()).await?;
            ctx.hub
                .rooms
                .join(&req.room, ctx.conn)
                .map_err(|_| HandlerError::ConnectionClosing)?;
        }
        RoomKind::Stream => live::join(ctx, &req.room).await?,
    }

    ctx.reply(&OutboundEvent::RoomJoined {
        room: req.room,
        timestamp: ctx.hub.server_time(),
    });
    Ok(())
}

pub async fn handle_leave(ctx: &Context<'_>, req: RoomRequest) -> HandlerResult {
    match req.room.kind() {
        RoomKind::Conversation => {
            ctx.hub.rooms.leave(&req.room, ctx.conn.id());
        }
        RoomKind::Stream => live::leave(ctx, &req.room).await?,
    }

    ctx.reply(&OutboundEvent::RoomLeft {
        room: req.room,
        timestamp: ctx.hub.server_time(),
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::route;
    use super::*;
    use crate::config::LimitsConfig;
    use crate::state::test_support::{
        connect, next_of_type, services_for, test_directory, test_hub, test_hub_with,
    };
    use hub_proto::RoomId;

    #[tokio::test]
    async fn participants_join_and_leave_conversation_rooms() {
        let hub = test_hub(LimitsConfig::default());
        let (alice, mut alice_rx) = connect(&hub, "alice").await;
        let ctx = Context::new(&hub, &alice);
        let room: RoomId = "conversation:c1".parse().unwrap();

        route(&ctx, r#"{"type":"join_room","room":"conversation:c1"}"#).await;
        let joined = next_of_type(&mut alice_rx, "room_joined").await;
        assert_eq!(joined["room"], "conversation:c1");
        assert!(hub.rooms.is_member(&room, alice.id()));

        route(&ctx, r#"{"type":"leave_room","room":"conversation:c1"}"#).await;
        next_of_type(&mut alice_rx, "room_left").await;
        assert!(!hub.rooms.is_member(&room, alice.id()));
        assert_eq!(hub.rooms.room_count(), 0);
    }

    #[tokio::test]
    async fn outsiders_cannot_join_conversation_rooms() {
        let hub = test_hub(LimitsConfig::default());
        let (dave, mut dave_rx) = connect(&hub, "dave").await;

        route(
            &Context::new(&hub, &dave),
            r#"{"type":"join_room","room":"conversation:c1"}"#,
        )
        .await;
        assert_eq!(next_of_type(&mut dave_rx, "error").await["code"], "not_participant");
        assert_eq!(hub.rooms.room_count(), 0);
    }

    #[tokio::test]
    async fn stream_rooms_register_the_viewer() {
        let directory = test_directory();
        let hub = test_hub_with(LimitsConfig::default(), services_for(directory.clone()));
        let (erin, mut erin_rx) = connect(&hub, "erin").await;
        let ctx = Context::new(&hub, &erin);

        route(&ctx, r#"{"type":"join_room","room":"stream:77"}"#).await;
        next_of_type(&mut erin_rx, "room_joined").await;
        assert_eq!(directory.viewers_of("77"), 1);

        route(
            &ctx,
            r#"{"type":"live_stream","stream_id":"77","action":"comment","content":"hi"}"#,
        )
        .await;
        let comment = next_of_type(&mut erin_rx, "stream_comment").await;
        assert_eq!(comment["event"]["user_id"], "erin");

        route(&ctx, r#"{"type":"leave_room","room":"stream:77"}"#).await;
        next_of_type(&mut erin_rx, "room_left").await;
        assert_eq!(directory.viewers_of("77"), 0);
        assert_eq!(hub.rooms.room_count(), 0);
    }
}

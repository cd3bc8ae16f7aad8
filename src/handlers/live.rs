//! Live-stream viewers, comments and reactions.
//!
//! Comments and reactions are persisted before they are broadcast, and the
//! broadcast includes the author's own connections.

use super::Context;
use crate::error::{HandlerError, HandlerResult};
use hub_proto::{LiveStreamAction, OutboundEvent, Payload, RoomId, StreamAction};
use tracing::debug;

pub async fn handle(ctx: &Context<'_>, action: LiveStreamAction) -> HandlerResult {
    let room = RoomId::stream(&action.stream_id)?;

    match action.action {
        StreamAction::Join => join(ctx, &room).await,
        StreamAction::Leave => leave(ctx, &room).await,
        StreamAction::Comment | StreamAction::Reaction => {
            interact(ctx, &room, action.action, action.content).await
        }
    }
}

/// Add this connection to the stream room. The store and the room hear
/// about the viewer only on the user's first connection in.
pub(super) async fn join(ctx: &Context<'_>, room: &RoomId) -> HandlerResult {
    let returning = ctx
        .hub
        .rooms
        .has_other_connection(room, ctx.user_id(), ctx.conn.id());
    let newly_joined = ctx
        .hub
        .rooms
        .join(room, ctx.conn)
        .map_err(|_| HandlerError::ConnectionClosing)?;
    if !newly_joined || returning {
        return Ok(());
    }

    let streams = &ctx.hub.services.streams;
    if let Err(e) = ctx
        .call
        .run(streams.viewer_joined(&ctx.call, room.id(), ctx.user_id()))
        .await
    {
        ctx.hub.rooms.leave(room, ctx.conn.id());
        return Err(e.into());
    }

    let event = OutboundEvent::StreamViewerJoined {
        stream_id: room.id().to_string(),
        user_id: ctx.user_id().to_string(),
        timestamp: ctx.hub.server_time(),
    };
    ctx.hub.broadcast_to_room(room, &Payload::from(&event), None);
    debug!(
        stream = %room.id(),
        viewers = ctx.hub.rooms.members_of(room).len(),
        "Viewer joined"
    );
    Ok(())
}

/// Remove this connection from the stream room. The viewer ends when the
/// user's last connection leaves.
pub(super) async fn leave(ctx: &Context<'_>, room: &RoomId) -> HandlerResult {
    if !ctx.hub.rooms.is_member(room, ctx.conn.id()) {
        return Ok(());
    }

    if !ctx
        .hub
        .rooms
        .has_other_connection(room, ctx.user_id(), ctx.conn.id())
    {
        ctx.hub.end_viewing(&ctx.call, room, ctx.user_id()).await;
    }
    ctx.hub.rooms.leave(room, ctx.conn.id());
    Ok(())
}

async fn interact(
    ctx: &Context<'_>,
    room: &RoomId,
    action: StreamAction,
    content: Option<String>,
) -> HandlerResult {
    if !ctx.hub.rooms.is_member(room, ctx.conn.id()) {
        return Err(HandlerError::NotInRoom(room.to_string()));
    }
    let content = content.unwrap_or_default();
    let content = content.trim();
    if content.is_empty() {
        return Err(HandlerError::MissingContent("content"));
    }
    let max = ctx.hub.limits.max_message_length;
    if content.chars().count() > max {
        return Err(HandlerError::MessageTooLong { max });
    }

    let streams = &ctx.hub.services.streams;
    let timestamp = ctx.hub.server_time();
    let event = if action == StreamAction::Comment {
        let stored = ctx
            .call
            .run(streams.add_comment(&ctx.call, room.id(), ctx.user_id(), content))
            .await?;
        OutboundEvent::StreamComment {
            stream_id: room.id().to_string(),
            event: stored,
            timestamp,
        }
    } else {
        let stored = ctx
            .call
            .run(streams.add_reaction(&ctx.call, room.id(), ctx.user_id(), content))
            .await?;
        OutboundEvent::StreamReaction {
            stream_id: room.id().to_string(),
            event: stored,
            timestamp,
        }
    };

    ctx.hub.broadcast_to_room(room, &Payload::from(&event), None);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::route;
    use super::*;
    use crate::config::LimitsConfig;
    use crate::state::test_support::{
        connect, drain_types, next_of_type, services_for, test_directory, test_hub, test_hub_with,
    };

    const JOIN_42: &str = r#"{"type":"live_stream","stream_id":"42","action":"join"}"#;
    const LEAVE_42: &str = r#"{"type":"live_stream","stream_id":"42","action":"leave"}"#;

    #[tokio::test]
    async fn reaction_reaches_every_viewer_connection_including_authors_devices() {
        let hub = test_hub(LimitsConfig::default());
        let (phone, mut phone_rx) = connect(&hub, "dave").await;
        let (laptop, mut laptop_rx) = connect(&hub, "dave").await;
        let (erin, mut erin_rx) = connect(&hub, "erin").await;

        for conn in [&phone, &laptop, &erin] {
            route(
                &Context::new(&hub, conn),
                r#"{"type":"live_stream","stream_id":"42","action":"join"}"#,
            )
            .await;
        }

        route(
            &Context::new(&hub, &phone),
            r#"{"type":"live_stream","stream_id":"42","action":"reaction","content":"fire"}"#,
        )
        .await;

        for rx in [&mut phone_rx, &mut laptop_rx, &mut erin_rx] {
            let event = next_of_type(rx, "stream_reaction").await;
            assert_eq!(event["stream_id"], "42");
            assert_eq!(event["event"]["content"], "fire");
            assert_eq!(event["event"]["user_id"], "dave");
        }
    }

    #[tokio::test]
    async fn viewers_see_joins_and_leaves() {
        let hub = test_hub(LimitsConfig::default());
        let (dave, _dave_rx) = connect(&hub, "dave").await;
        let (erin, mut erin_rx) = connect(&hub, "erin").await;
        let room: RoomId = "stream:7".parse().unwrap();

        route(
            &Context::new(&hub, &erin),
            r#"{"type":"live_stream","stream_id":"7","action":"join"}"#,
        )
        .await;
        next_of_type(&mut erin_rx, "stream_viewer_joined").await;

        let dave_ctx = Context::new(&hub, &dave);
        route(
            &dave_ctx,
            r#"{"type":"live_stream","stream_id":"7","action":"join"}"#,
        )
        .await;
        let joined = next_of_type(&mut erin_rx, "stream_viewer_joined").await;
        assert_eq!(joined["user_id"], "dave");

        route(
            &dave_ctx,
            r#"{"type":"live_stream","stream_id":"7","action":"leave"}"#,
        )
        .await;
        let left = next_of_type(&mut erin_rx, "stream_viewer_left").await;
        assert_eq!(left["user_id"], "dave");
        assert!(!hub.rooms.is_member(&room, dave.id()));
    }

    #[tokio::test]
    async fn comments_require_membership_and_content() {
        let hub = test_hub(LimitsConfig::default());
        let (dave, mut dave_rx) = connect(&hub, "dave").await;
        let ctx = Context::new(&hub, &dave);

        route(
            &ctx,
            r#"{"type":"live_stream","stream_id":"9","action":"comment","content":"hello"}"#,
        )
        .await;
        assert_eq!(next_of_type(&mut dave_rx, "error").await["code"], "not_in_room");

        route(
            &ctx,
            r#"{"type":"live_stream","stream_id":"9","action":"join"}"#,
        )
        .await;
        route(
            &ctx,
            r#"{"type":"live_stream","stream_id":"9","action":"comment"}"#,
        )
        .await;
        assert_eq!(next_of_type(&mut dave_rx, "error").await["code"], "missing_content");

        route(
            &ctx,
            r#"{"type":"live_stream","stream_id":"9","action":"comment","content":"hello"}"#,
        )
        .await;
        let comment = next_of_type(&mut dave_rx, "stream_comment").await;
        assert_eq!(comment["event"]["kind"], "comment");
        assert!(!drain_types(&mut dave_rx).await.contains(&"error".to_string()));
    }

    #[tokio::test]
    async fn viewer_ends_when_last_connection_disconnects() {
        let directory = test_directory();
        let hub = test_hub_with(LimitsConfig::default(), services_for(directory.clone()));
        let (phone, _phone_rx) = connect(&hub, "dave").await;
        let (laptop, _laptop_rx) = connect(&hub, "dave").await;
        let (erin, mut erin_rx) = connect(&hub, "erin").await;

        for conn in [&erin, &phone, &laptop] {
            route(&Context::new(&hub, conn), JOIN_42).await;
        }
        assert_eq!(directory.viewers_of("42"), 2);
        let seen = drain_types(&mut erin_rx).await;
        assert_eq!(
            seen.iter().filter(|t| *t == "stream_viewer_joined").count(),
            2
        );

        hub.disconnect(&phone, "test").await;
        assert_eq!(directory.viewers_of("42"), 2);
        assert!(!drain_types(&mut erin_rx).await.contains(&"stream_viewer_left".to_string()));

        hub.disconnect(&laptop, "test").await;
        assert_eq!(directory.viewers_of("42"), 1);
        let left = next_of_type(&mut erin_rx, "stream_viewer_left").await;
        assert_eq!(left["user_id"], "dave");
        assert_eq!(left["stream_id"], "42");
    }

    #[tokio::test]
    async fn leaving_from_one_device_keeps_the_viewer() {
        let directory = test_directory();
        let hub = test_hub_with(LimitsConfig::default(), services_for(directory.clone()));
        let (phone, _phone_rx) = connect(&hub, "dave").await;
        let (laptop, _laptop_rx) = connect(&hub, "dave").await;
        let room: RoomId = "stream:42".parse().unwrap();

        route(&Context::new(&hub, &phone), JOIN_42).await;
        route(&Context::new(&hub, &laptop), JOIN_42).await;
        assert_eq!(directory.viewers_of("42"), 1);

        route(&Context::new(&hub, &phone), LEAVE_42).await;
        assert!(!hub.rooms.is_member(&room, phone.id()));
        assert!(hub.rooms.is_member(&room, laptop.id()));
        assert_eq!(directory.viewers_of("42"), 1);

        route(&Context::new(&hub, &laptop), LEAVE_42).await;
        assert_eq!(directory.viewers_of("42"), 0);
        assert_eq!(hub.rooms.room_count(), 0);
    }
}

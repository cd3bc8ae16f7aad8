//! Client → hub events.
//!
//! The envelope is decoded once: the `type` discriminant is checked against
//! the known event catalogue first so that an unknown type and a malformed
//! known type produce different errors.

use crate::error::ProtocolError;
use crate::ids::RoomId;
use crate::outbound::PresenceStatus;
use serde::Deserialize;
use serde_json::Value;

/// Every `type` value the hub accepts from clients.
pub const INBOUND_TYPES: &[&str] = &[
    "chat_message",
    "typing",
    "read_receipt",
    "presence_update",
    "join_room",
    "leave_room",
    "live_stream",
    "ping",
];

/// A decoded inbound event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// Send a chat message to a conversation.
    ChatMessage(ChatMessage),
    /// Start or stop a typing indicator.
    Typing(Typing),
    /// Mark a message as read.
    ReadReceipt(ReadReceipt),
    /// Set the client-visible presence status.
    PresenceUpdate(PresenceUpdate),
    /// Join a room.
    JoinRoom(RoomRequest),
    /// Leave a room.
    LeaveRoom(RoomRequest),
    /// Interact with a live stream.
    LiveStream(LiveStreamAction),
    /// Application-level keepalive.
    Ping,
}

/// Body of a `chat_message` event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatMessage {
    /// Target conversation.
    pub conversation_id: String,
    /// Message text; may be empty when attachments are present.
    #[serde(default)]
    pub content: String,
    /// Opaque attachment references.
    #[serde(default)]
    pub attachments: Vec<String>,
    /// Client-side draft id, echoed back in the delivery status.
    #[serde(default)]
    pub client_message_id: Option<String>,
}

/// Body of a `typing` event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Typing {
    /// Conversation being typed in.
    pub conversation_id: String,
    /// `false` clears the indicator.
    #[serde(default = "default_is_typing")]
    pub is_typing: bool,
}

fn default_is_typing() -> bool {
    true
}

/// Body of a `read_receipt` event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReadReceipt {
    /// Conversation containing the message.
    pub conversation_id: String,
    /// Message that was read.
    pub message_id: String,
}

/// Body of a `presence_update` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PresenceUpdate {
    /// Requested status.
    pub status: PresenceStatus,
}

/// Body of `join_room` and `leave_room`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoomRequest {
    /// `conversation:<id>` or `stream:<id>`.
    pub room: RoomId,
}

/// Body of a `live_stream` event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LiveStreamAction {
    /// Target stream.
    pub stream_id: String,
    /// What the viewer is doing.
    pub action: StreamAction,
    /// Comment text or reaction token.
    #[serde(default)]
    pub content: Option<String>,
}

/// Live-stream viewer actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamAction {
    /// Start watching.
    Join,
    /// Stop watching.
    Leave,
    /// Post a comment.
    Comment,
    /// Post a reaction.
    Reaction,
}

impl InboundEvent {
    /// Decode one text frame.
    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;

        let Value::Object(ref map) = value else {
            return Err(ProtocolError::InvalidJson("expected an object".to_string()));
        };

        let kind = match map.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            _ => return Err(ProtocolError::MissingType),
        };

        if !INBOUND_TYPES.contains(&kind.as_str()) {
            return Err(ProtocolError::UnknownType(kind));
        }

        serde_json::from_value(value).map_err(|e| ProtocolError::InvalidEvent {
            kind,
            reason: e.to_string(),
        })
    }

    /// The wire `type` of this event. Used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ChatMessage(_) => "chat_message",
            Self::Typing(_) => "typing",
            Self::ReadReceipt(_) => "read_receipt",
            Self::PresenceUpdate(_) => "presence_update",
            Self::JoinRoom(_) => "join_room",
            Self::LeaveRoom(_) => "leave_room",
            Self::LiveStream(_) => "live_stream",
            Self::Ping => "ping",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_chat_message_with_defaults() {
        let event =
            InboundEvent::decode(r#"{"type":"chat_message","conversation_id":"c1","content":"hi"}"#)
                .unwrap();
        let InboundEvent::ChatMessage(msg) = event else {
            panic!("expected chat_message");
        };
        assert_eq!(msg.conversation_id, "c1");
        assert_eq!(msg.content, "hi");
        assert!(msg.attachments.is_empty());
        assert!(msg.client_message_id.is_none());
    }

    #[test]
    fn typing_defaults_to_started() {
        let event = InboundEvent::decode(r#"{"type":"typing","conversation_id":"c1"}"#).unwrap();
        assert_eq!(
            event,
            InboundEvent::Typing(Typing {
                conversation_id: "c1".to_string(),
                is_typing: true,
            })
        );
    }

    #[test]
    fn decodes_room_and_stream_events() {
        let join = InboundEvent::decode(r#"{"type":"join_room","room":"stream:42"}"#).unwrap();
        assert_eq!(join.kind(), "join_room");

        let react = InboundEvent::decode(
            r#"{"type":"live_stream","stream_id":"42","action":"reaction","content":"fire"}"#,
        )
        .unwrap();
        let InboundEvent::LiveStream(action) = react else {
            panic!("expected live_stream");
        };
        assert_eq!(action.action, StreamAction::Reaction);
        assert_eq!(action.content.as_deref(), Some("fire"));
    }

    #[test]
    fn ping_has_no_body() {
        assert_eq!(
            InboundEvent::decode(r#"{"type":"ping"}"#).unwrap(),
            InboundEvent::Ping
        );
    }

    #[test]
    fn unknown_type_is_distinguished_from_malformed() {
        assert_eq!(
            InboundEvent::decode(r#"{"type":"teleport"}"#),
            Err(ProtocolError::UnknownType("teleport".to_string()))
        );
        let err = InboundEvent::decode(r#"{"type":"typing"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidEvent { ref kind, .. } if kind == "typing"));
        assert_eq!(err.code(), "malformed_event");
    }

    #[test]
    fn rejects_non_objects_and_missing_type() {
        assert!(matches!(
            InboundEvent::decode("not json"),
            Err(ProtocolError::InvalidJson(_))
        ));
        assert!(matches!(
            InboundEvent::decode("[1,2]"),
            Err(ProtocolError::InvalidJson(_))
        ));
        assert_eq!(
            InboundEvent::decode(r#"{"type":7}"#),
            Err(ProtocolError::MissingType)
        );
    }

    #[test]
    fn bad_room_name_is_malformed() {
        let err = InboundEvent::decode(r#"{"type":"join_room","room":"lobby"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidEvent { .. }));
    }
}

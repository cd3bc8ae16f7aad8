//! Hub → client events.

use crate::ids::{RoomId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wall-clock timestamp carried by every outbound event.
pub type Timestamp = DateTime<Utc>;

/// Presence status as seen by other users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    /// Connected and available.
    Online,
    /// Connected, idle.
    Away,
    /// Connected, do not disturb.
    Busy,
    /// No live connections.
    Offline,
}

impl PresenceStatus {
    /// Wire name, as serialized.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Away => "away",
            Self::Busy => "busy",
            Self::Offline => "offline",
        }
    }

    /// Whether a client may set this status on itself.
    pub fn is_client_settable(self) -> bool {
        !matches!(self, Self::Offline)
    }
}

/// Delivery progress of a chat message, reported to its sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Persisted and fanned out.
    Sent,
    /// Reached a recipient device.
    Delivered,
    /// Read by a recipient.
    Read,
}

/// A persisted chat message, as returned by the message store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Store-assigned id.
    pub id: String,
    /// Owning conversation.
    pub conversation_id: String,
    /// Author.
    pub sender_id: UserId,
    /// Message text.
    pub content: String,
    /// Attachment references.
    #[serde(default)]
    pub attachments: Vec<String>,
    /// Store timestamp.
    pub created_at: Timestamp,
}

/// Kind of a persisted live-stream interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEventKind {
    /// Free-text comment.
    Comment,
    /// Reaction token.
    Reaction,
}

/// A persisted live-stream comment or reaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Store-assigned id.
    pub id: String,
    /// Stream the event belongs to.
    pub stream_id: String,
    /// Author.
    pub user_id: UserId,
    /// Comment or reaction.
    pub kind: StreamEventKind,
    /// Comment text or reaction token.
    pub content: String,
    /// Store timestamp.
    pub created_at: Timestamp,
}

/// An event sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// Sent once after registration.
    ConnectionSuccess {
        /// Authenticated user.
        user_id: UserId,
        /// Process-unique connection id.
        connection_id: u64,
        /// Server time.
        timestamp: Timestamp,
    },
    /// Contacts online at connect time.
    PresenceSnapshot {
        /// Online contacts.
        online_users: Vec<UserId>,
        /// Server time.
        timestamp: Timestamp,
    },
    /// A contact changed presence.
    PresenceUpdate {
        /// Contact.
        user_id: UserId,
        /// New status.
        status: PresenceStatus,
        /// Last activity, present when going offline.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_seen: Option<Timestamp>,
        /// Server time.
        timestamp: Timestamp,
    },
    /// A new chat message for a recipient.
    ChatMessage {
        /// Persisted message.
        message: StoredMessage,
        /// Author.
        sender_id: UserId,
        /// Server time.
        timestamp: Timestamp,
    },
    /// Delivery status for the sender of a message.
    MessageStatus {
        /// Message id.
        message_id: String,
        /// Conversation id.
        conversation_id: String,
        /// Progress.
        status: DeliveryStatus,
        /// Echo of the client draft id.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_message_id: Option<String>,
        /// The persisted message, on `sent`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<StoredMessage>,
        /// Server time.
        timestamp: Timestamp,
    },
    /// A participant read a message.
    ReadReceipt {
        /// Conversation id.
        conversation_id: String,
        /// Message id.
        message_id: String,
        /// Reader.
        user_id: UserId,
        /// Server time.
        timestamp: Timestamp,
    },
    /// Typing indicator relay.
    Typing {
        /// Conversation id.
        conversation_id: String,
        /// Typist.
        user_id: UserId,
        /// Started or stopped.
        is_typing: bool,
        /// Server time.
        timestamp: Timestamp,
    },
    /// Room join acknowledgement.
    RoomJoined {
        /// Room joined.
        room: RoomId,
        /// Server time.
        timestamp: Timestamp,
    },
    /// Room leave acknowledgement.
    RoomLeft {
        /// Room left.
        room: RoomId,
        /// Server time.
        timestamp: Timestamp,
    },
    /// A viewer joined a stream.
    StreamViewerJoined {
        /// Stream id.
        stream_id: String,
        /// Viewer.
        user_id: UserId,
        /// Server time.
        timestamp: Timestamp,
    },
    /// A viewer left a stream.
    StreamViewerLeft {
        /// Stream id.
        stream_id: String,
        /// Viewer.
        user_id: UserId,
        /// Server time.
        timestamp: Timestamp,
    },
    /// A comment was posted on a stream.
    StreamComment {
        /// Stream id.
        stream_id: String,
        /// Persisted comment.
        event: StreamEvent,
        /// Server time.
        timestamp: Timestamp,
    },
    /// A reaction was posted on a stream.
    StreamReaction {
        /// Stream id.
        stream_id: String,
        /// Persisted reaction.
        event: StreamEvent,
        /// Server time.
        timestamp: Timestamp,
    },
    /// Reply to an application `ping`.
    Pong {
        /// Server time.
        timestamp: Timestamp,
    },
    /// Per-event failure, sent to the originating connection only.
    Error {
        /// Human-readable message.
        error: String,
        /// Stable machine-readable code.
        code: String,
        /// Server time.
        timestamp: Timestamp,
    },
}

impl OutboundEvent {
    /// Build an error event.
    pub fn error(code: &str, error: impl Into<String>, timestamp: Timestamp) -> Self {
        Self::Error {
            error: error.into(),
            code: code.to_string(),
            timestamp,
        }
    }

    /// The wire `type` of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionSuccess { .. } => "connection_success",
            Self::PresenceSnapshot { .. } => "presence_snapshot",
            Self::PresenceUpdate { .. } => "presence_update",
            Self::ChatMessage { .. } => "chat_message",
            Self::MessageStatus { .. } => "message_status",
            Self::ReadReceipt { .. } => "read_receipt",
            Self::Typing { .. } => "typing",
            Self::RoomJoined { .. } => "room_joined",
            Self::RoomLeft { .. } => "room_left",
            Self::StreamViewerJoined { .. } => "stream_viewer_joined",
            Self::StreamViewerLeft { .. } => "stream_viewer_left",
            Self::StreamComment { .. } => "stream_comment",
            Self::StreamReaction { .. } => "stream_reaction",
            Self::Pong { .. } => "pong",
            Self::Error { .. } => "error",
        }
    }
}

//! Identifier validation and room naming.
//!
//! Rooms are derived deterministically from the thing they fan out for:
//! `conversation:<id>` for chats and `stream:<id>` for live streams.

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User identifier, as returned by the authenticator.
pub type UserId = String;

/// Longest identifier accepted from a client.
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Check that `value` is a plausible opaque identifier.
///
/// Identifiers are 1..=64 characters of ASCII alphanumerics, `-`, `_` or `.`.
pub fn validate_identifier(kind: &'static str, value: &str) -> Result<(), ProtocolError> {
    let valid = !value.is_empty()
        && value.len() <= MAX_IDENTIFIER_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));

    if valid {
        Ok(())
    } else {
        Err(ProtocolError::InvalidIdentifier {
            kind,
            value: value.to_string(),
        })
    }
}

/// The two kinds of room the hub knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomKind {
    /// Fan-out group for one conversation.
    Conversation,
    /// Fan-out group for one live stream.
    Stream,
}

impl RoomKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::Conversation => "conversation",
            Self::Stream => "stream",
        }
    }
}

/// A validated room name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId {
    kind: RoomKind,
    id: String,
}

impl RoomId {
    /// Room for a conversation.
    pub fn conversation(id: &str) -> Result<Self, ProtocolError> {
        validate_identifier("conversation_id", id)?;
        Ok(Self {
            kind: RoomKind::Conversation,
            id: id.to_string(),
        })
    }

    /// Room for a live stream.
    pub fn stream(id: &str) -> Result<Self, ProtocolError> {
        validate_identifier("stream_id", id)?;
        Ok(Self {
            kind: RoomKind::Stream,
            id: id.to_string(),
        })
    }

    /// Which kind of room this is.
    pub fn kind(&self) -> RoomKind {
        self.kind
    }

    /// The conversation or stream id, without prefix.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.prefix(), self.id)
    }
}

impl FromStr for RoomId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("conversation", id)) => Self::conversation(id),
            Some(("stream", id)) => Self::stream(id),
            _ => Err(ProtocolError::InvalidRoom(s.to_string())),
        }
    }
}

impl TryFrom<String> for RoomId {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RoomId> for String {
    fn from(room: RoomId) -> Self {
        room.to_string()
    }
}

//! Error types for decoding inbound frames and validating identifiers.

use thiserror::Error;

/// Errors produced while decoding an inbound frame.
///
/// All variants describe malformed client input; none of them is fatal to
/// the connection that sent the frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The frame is not a JSON object.
    #[error("event is not valid JSON: {0}")]
    InvalidJson(String),

    /// The frame has no string `type` field.
    #[error("event has no type")]
    MissingType,

    /// The `type` field names an event the hub does not handle.
    #[error("unknown event type: {0}")]
    UnknownType(String),

    /// The `type` is known but the remaining fields do not match it.
    #[error("invalid {kind} event: {reason}")]
    InvalidEvent {
        /// The declared event type.
        kind: String,
        /// Decoder message.
        reason: String,
    },

    /// An identifier field is empty, too long or contains illegal characters.
    #[error("invalid {kind}: {value:?}")]
    InvalidIdentifier {
        /// What the identifier names (`conversation_id`, `stream_id`, ...).
        kind: &'static str,
        /// The rejected value.
        value: String,
    },

    /// A room name is not `conversation:<id>` or `stream:<id>`.
    #[error("invalid room: {0:?}")]
    InvalidRoom(String),
}

impl ProtocolError {
    /// Stable machine-readable code sent to clients alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) | Self::MissingType | Self::InvalidEvent { .. } => {
                "malformed_event"
            }
            Self::UnknownType(_) => "unknown_event_type",
            Self::InvalidIdentifier { .. } => "invalid_identifier",
            Self::InvalidRoom(_) => "invalid_room",
        }
    }
}

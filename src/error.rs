//! Unified error handling for hubd.
//!
//! Handler errors never close a connection. Each one becomes an `error`
//! event for the originating connection and a metrics label.

use crate::services::ServiceError;
use hub_proto::{OutboundEvent, ProtocolError, Timestamp};
use thiserror::Error;

// ============================================================================
// Handler Errors (event processing)
// ============================================================================

/// Errors that can occur while handling one inbound event.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Envelope or payload could not be decoded (client error).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("binary frames are not supported")]
    BinaryFrame,

    #[error("message has no content or attachments")]
    EmptyMessage,

    #[error("message exceeds {max} characters")]
    MessageTooLong { max: usize },

    #[error("{0} is required for this action")]
    MissingContent(&'static str),

    #[error("status {0:?} cannot be set by clients")]
    InvalidStatus(String),

    /// Authorization failure.
    #[error("not a participant of conversation {0}")]
    NotParticipant(String),

    #[error("not in room {0}")]
    NotInRoom(String),

    #[error("connection is closing")]
    ConnectionClosing,

    #[error("rate limited, slow down")]
    RateLimited,

    /// A collaborator failed or timed out.
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl HandlerError {
    /// Get a static error code string for metrics labeling and the wire `code`.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Protocol(e) => e.code(),
            Self::BinaryFrame => "unsupported_frame",
            Self::EmptyMessage => "empty_message",
            Self::MessageTooLong { .. } => "message_too_long",
            Self::MissingContent(_) => "missing_content",
            Self::InvalidStatus(_) => "invalid_status",
            Self::NotParticipant(_) => "not_participant",
            Self::NotInRoom(_) => "not_in_room",
            Self::ConnectionClosing => "connection_closing",
            Self::RateLimited => "rate_limited",
            Self::Service(e) => e.error_code(),
        }
    }

    /// Convert to the `error` event sent back to the client.
    pub fn to_event(&self, timestamp: Timestamp) -> OutboundEvent {
        OutboundEvent::error(self.error_code(), self.to_string(), timestamp)
    }
}

/// Result type for event handlers.
pub type HandlerResult = Result<(), HandlerError>;

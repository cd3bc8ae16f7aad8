//! # hub-proto
//!
//! Wire types for the hubd real-time connection hub.
//!
//! Every frame on the wire is a JSON object with a `type` discriminant.
//! Inbound frames are decoded exactly once into [`InboundEvent`]; outbound
//! frames are built as [`OutboundEvent`] values and serialized into a
//! [`Payload`], an immutable buffer that can be queued on any number of
//! connections without copying.
//!
//! ```rust
//! use hub_proto::{InboundEvent, OutboundEvent, Payload};
//!
//! let event = InboundEvent::decode(r#"{"type":"ping"}"#).unwrap();
//! assert_eq!(event.kind(), "ping");
//!
//! let pong = OutboundEvent::Pong { timestamp: chrono::Utc::now() };
//! let payload = Payload::from(&pong);
//! assert!(payload.to_text().contains("\"pong\""));
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod ids;
pub mod inbound;
pub mod outbound;
pub mod payload;

pub use error::ProtocolError;
pub use ids::{RoomId, RoomKind, UserId, validate_identifier};
pub use inbound::{
    ChatMessage, InboundEvent, LiveStreamAction, PresenceUpdate, ReadReceipt, RoomRequest,
    StreamAction, Typing,
};
pub use outbound::{
    DeliveryStatus, OutboundEvent, PresenceStatus, StoredMessage, StreamEvent, StreamEventKind,
    Timestamp,
};
pub use payload::Payload;

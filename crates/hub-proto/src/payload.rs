//! Shared serialized payloads.

use crate::outbound::OutboundEvent;
use bytes::Bytes;

const ENCODE_FAILURE: &[u8] =
    br#"{"type":"error","error":"internal encoding failure","code":"internal"}"#;

/// An immutable serialized outbound event.
///
/// Cloning a payload bumps a reference count; the JSON is produced once no
/// matter how many connections it is queued on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload(Bytes);

impl Payload {
    /// Wrap already-serialized JSON.
    pub fn from_static(json: &'static str) -> Self {
        Self(Bytes::from_static(json.as_bytes()))
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Text for a WebSocket text frame.
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for a zero-length payload.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&OutboundEvent> for Payload {
    fn from(event: &OutboundEvent) -> Self {
        match serde_json::to_vec(event) {
            Ok(buf) => Self(Bytes::from(buf)),
            Err(_) => Self(Bytes::from_static(ENCODE_FAILURE)),
        }
    }
}

impl From<OutboundEvent> for Payload {
    fn from(event: OutboundEvent) -> Self {
        Self::from(&event)
    }
}

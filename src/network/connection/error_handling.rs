//! Classification of WebSocket read errors.

use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::error::CapacityError;

/// What the reader should do about a failed read.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum ReadErrorAction {
    /// The peer closed or the stream is already shut.
    Closed,
    /// A frame or message exceeded the configured size cap.
    FrameTooLarge,
    /// The peer violated the WebSocket protocol.
    Protocol(String),
    /// The socket is broken.
    Io,
}

pub(super) fn classify_read_error(e: &WsError) -> ReadErrorAction {
    match e {
        WsError::ConnectionClosed | WsError::AlreadyClosed => ReadErrorAction::Closed,
        WsError::Capacity(CapacityError::MessageTooLong { .. }) => ReadErrorAction::FrameTooLarge,
        WsError::Io(_) => ReadErrorAction::Io,
        other => ReadErrorAction::Protocol(other.to_string()),
    }
}

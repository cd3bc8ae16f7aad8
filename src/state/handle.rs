//! Shared, non-owning view of a live connection.
//!
//! The connection worker owns the socket. Everyone else (user registry,
//! rooms, handlers) holds an `Arc<ConnectionHandle>` and can only enqueue
//! payloads, check liveness, or ask for the connection to be closed.

use hub_proto::{Payload, UserId};
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

/// Process-unique connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(u64);

impl ConnId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Hands out increasing connection ids.
pub struct ConnIdGenerator {
    counter: AtomicU64,
}

impl ConnIdGenerator {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
        }
    }

    pub fn next(&self) -> ConnId {
        ConnId(self.counter.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a non-blocking enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The payload is on the outbound queue.
    Queued,
    /// The queue was full. The payload is gone and the connection is
    /// scheduled for removal.
    Dropped,
    /// The connection is shutting down.
    Closed,
}

/// Queue of connections to tear down as slow consumers.
pub type RemovalSender = mpsc::Sender<Weak<ConnectionHandle>>;

pub struct ConnectionHandle {
    id: ConnId,
    user_id: UserId,
    addr: Option<SocketAddr>,
    outbound: mpsc::Sender<Payload>,
    active: AtomicBool,
    removal_scheduled: AtomicBool,
    close: CancellationToken,
    removals: RemovalSender,
    this: Weak<ConnectionHandle>,
}

impl ConnectionHandle {
    /// Build a handle and the receiving end of its outbound queue.
    pub fn new(
        id: ConnId,
        user_id: UserId,
        addr: Option<SocketAddr>,
        capacity: usize,
        removals: RemovalSender,
    ) -> (Arc<Self>, mpsc::Receiver<Payload>) {
        let (outbound, rx) = mpsc::channel(capacity);
        let handle = Arc::new_cyclic(|this| Self {
            id,
            user_id,
            addr,
            outbound,
            active: AtomicBool::new(true),
            removal_scheduled: AtomicBool::new(false),
            close: CancellationToken::new(),
            removals,
            this: this.clone(),
        });
        (handle, rx)
    }

    pub fn id(&self) -> ConnId {
        self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Flip the active flag. Returns `true` only for the first caller.
    pub fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::AcqRel)
    }

    /// Signal both loops of the worker to stop.
    pub fn close(&self) {
        self.close.cancel();
    }

    pub fn close_token(&self) -> CancellationToken {
        self.close.clone()
    }

    /// Enqueue without blocking.
    pub fn try_send(&self, payload: Payload) -> SendOutcome {
        if !self.is_active() {
            return SendOutcome::Closed;
        }
        match self.outbound.try_send(payload) {
            Ok(()) => SendOutcome::Queued,
            Err(TrySendError::Full(_)) => {
                crate::metrics::record_payload_dropped();
                self.schedule_removal();
                SendOutcome::Dropped
            }
            Err(TrySendError::Closed(_)) => SendOutcome::Closed,
        }
    }

    /// Hand the connection to the cleanup worker, at most once.
    fn schedule_removal(&self) {
        if self.removal_scheduled.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::warn!(
            conn = %self.id,
            user = %self.user_id,
            "Outbound queue full, removing slow consumer"
        );
        match self.removals.try_send(self.this.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                // The worker sees the close signal and tears itself down.
                tracing::warn!(conn = %self.id, "Removal queue unavailable, closing directly");
                self.close();
            }
        }
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("active", &self.is_active())
            .finish()
    }
}

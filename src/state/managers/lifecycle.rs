//! Lifecycle management: shutdown signalling and slow-consumer removal.

use crate::state::ConnectionHandle;
use crate::state::handle::RemovalSender;
use std::sync::Weak;
use tokio::sync::{broadcast, mpsc};

/// Lifecycle management state.
///
/// - `shutdown_tx` fans the server shutdown out to every connection worker.
/// - `removals` carries connections whose outbound queue overflowed to the
///   single cleanup worker.
pub struct LifecycleManager {
    pub shutdown_tx: broadcast::Sender<()>,
    removals: RemovalSender,
}

impl LifecycleManager {
    /// Create the manager and the receiving end of the removal queue.
    pub fn new(removal_capacity: usize) -> (Self, mpsc::Receiver<Weak<ConnectionHandle>>) {
        let (shutdown_tx, _) = broadcast::channel(16);
        let (removals, removal_rx) = mpsc::channel(removal_capacity);
        (
            Self {
                shutdown_tx,
                removals,
            },
            removal_rx,
        )
    }

    /// Sender handed to each new connection handle.
    pub fn removal_sender(&self) -> RemovalSender {
        self.removals.clone()
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Tell every connection worker to close.
    pub fn shutdown(&self) {
        let receivers = self.shutdown_tx.send(()).unwrap_or(0);
        tracing::info!(receivers, "Shutdown signalled");
    }
}

//! Slow-consumer cleanup worker.
//!
//! `ConnectionHandle::try_send` never tears a connection down itself; it
//! pushes the handle onto the removal queue and this task disconnects it.

use super::Hub;
use crate::state::ConnectionHandle;
use std::sync::Weak;
use tokio::sync::mpsc;
use tracing::debug;

pub(super) async fn run(hub: Weak<Hub>, mut removals: mpsc::Receiver<Weak<ConnectionHandle>>) {
    while let Some(conn) = removals.recv().await {
        let Some(conn) = conn.upgrade() else {
            continue;
        };
        let Some(hub) = hub.upgrade() else {
            break;
        };
        crate::metrics::record_slow_consumer();
        hub.disconnect(&conn, "slow consumer").await;
    }
    debug!("Cleanup worker stopped");
}

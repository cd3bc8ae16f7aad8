//! Presence notifier worker.
//!
//! Transitions are fanned out one at a time in the order the coordinator
//! produced them, so a contact never sees "offline" overtake "online".

use super::Hub;
use hub_proto::{OutboundEvent, Payload, PresenceStatus, Timestamp, UserId};
use std::sync::Weak;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub(crate) enum PresenceNotice {
    Online { user_id: UserId },
    Offline { user_id: UserId, last_seen: Timestamp },
    Status { user_id: UserId, status: PresenceStatus },
}

impl PresenceNotice {
    fn user_id(&self) -> &str {
        match self {
            Self::Online { user_id }
            | Self::Offline { user_id, .. }
            | Self::Status { user_id, .. } => user_id,
        }
    }
}

pub(super) async fn run(hub: Weak<Hub>, mut notices: mpsc::Receiver<PresenceNotice>) {
    while let Some(notice) = notices.recv().await {
        let Some(hub) = hub.upgrade() else {
            break;
        };
        notify(&hub, notice).await;
    }
    debug!("Presence notifier stopped");
}

async fn notify(hub: &Hub, notice: PresenceNotice) {
    let ctx = hub.call_context();
    let parties = match ctx
        .run(hub.services.contacts.interested_parties_of(&ctx, notice.user_id()))
        .await
    {
        Ok(parties) => parties,
        Err(e) => {
            warn!(
                user = %notice.user_id(),
                error = %e,
                "Contact lookup failed, presence change not announced"
            );
            return;
        }
    };
    if parties.is_empty() {
        return;
    }

    let timestamp = hub.server_time();
    let event = match notice {
        PresenceNotice::Online { user_id } => OutboundEvent::PresenceUpdate {
            user_id,
            status: PresenceStatus::Online,
            last_seen: None,
            timestamp,
        },
        PresenceNotice::Offline { user_id, last_seen } => OutboundEvent::PresenceUpdate {
            user_id,
            status: PresenceStatus::Offline,
            last_seen: Some(last_seen),
            timestamp,
        },
        PresenceNotice::Status { user_id, status } => OutboundEvent::PresenceUpdate {
            user_id,
            status,
            last_seen: None,
            timestamp,
        },
    };

    let delivered = hub.broadcast_to_users(&parties, &Payload::from(&event));
    debug!(parties = parties.len(), delivered, "Presence change announced");
}

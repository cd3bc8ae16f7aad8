//! The hub: central coordinator for live connections.
//!
//! Registration and unregistration are serialized through one coordinator
//! task, which is the only writer of the user registry and presence counts.
//! Delivery (`send_to_user`, `broadcast_*`) runs on the caller's task and
//! never blocks: every target gets a `try_send`.

mod cleanup;
mod coordinator;
mod presence;

use crate::config::LimitsConfig;
use crate::services::{CallContext, Collaborators};
use crate::state::managers::{LifecycleManager, PresenceManager, RoomManager, UserManager};
use crate::state::{ConnId, ConnIdGenerator, ConnectionHandle, SendOutcome};
use chrono::{SubsecRound, Utc};
use coordinator::Command;
use hub_proto::{
    DeliveryStatus, OutboundEvent, Payload, PresenceStatus, RoomId, RoomKind, StoredMessage,
    Timestamp, UserId,
};
use presence::PresenceNotice;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

const COORDINATOR_QUEUE: usize = 1024;
const PRESENCE_QUEUE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegisterError {
    #[error("connection is closing")]
    Inactive,
    #[error("hub coordinator is not running")]
    CoordinatorGone,
}

/// A delivery-status update for the sender of a message.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub message_id: String,
    pub conversation_id: String,
    pub status: DeliveryStatus,
    pub client_message_id: Option<String>,
    pub message: Option<StoredMessage>,
}

/// Parameters for [`Hub::spawn`].
pub struct HubParams {
    pub limits: LimitsConfig,
    pub services: Collaborators,
}

pub struct Hub {
    pub users: Arc<UserManager>,
    pub rooms: RoomManager,
    pub presence: Arc<PresenceManager>,
    pub lifecycle: LifecycleManager,
    pub services: Collaborators,
    pub limits: LimitsConfig,
    conn_ids: ConnIdGenerator,
    coordinator: mpsc::Sender<Command>,
    notices: mpsc::Sender<PresenceNotice>,
}

impl Hub {
    /// Build the hub and start its coordinator, cleanup and presence workers.
    pub fn spawn(params: HubParams) -> Arc<Self> {
        let users = Arc::new(UserManager::new());
        let presence = Arc::new(PresenceManager::new());
        let (lifecycle, removal_rx) = LifecycleManager::new(params.limits.removal_queue);
        let (coordinator_tx, coordinator_rx) = mpsc::channel(COORDINATOR_QUEUE);
        let (notice_tx, notice_rx) = mpsc::channel(PRESENCE_QUEUE);

        let hub = Arc::new(Self {
            users: Arc::clone(&users),
            rooms: RoomManager::new(),
            presence: Arc::clone(&presence),
            lifecycle,
            services: params.services,
            limits: params.limits,
            conn_ids: ConnIdGenerator::new(),
            coordinator: coordinator_tx,
            notices: notice_tx.clone(),
        });

        tokio::spawn(coordinator::run(users, presence, coordinator_rx, notice_tx));
        tokio::spawn(cleanup::run(Arc::downgrade(&hub), removal_rx));
        tokio::spawn(presence::run(Arc::downgrade(&hub), notice_rx));

        hub
    }

    /// Allocate a handle for a freshly authenticated connection.
    pub fn new_connection(
        &self,
        user_id: UserId,
        addr: Option<SocketAddr>,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<Payload>) {
        ConnectionHandle::new(
            self.conn_ids.next(),
            user_id,
            addr,
            self.limits.outbound_queue,
            self.lifecycle.removal_sender(),
        )
    }

    /// Fresh deadline for a collaborator call.
    pub fn call_context(&self) -> CallContext {
        CallContext::with_timeout(self.limits.collaborator_timeout())
    }

    /// Wall clock for outbound timestamps, millisecond precision.
    pub fn server_time(&self) -> Timestamp {
        Utc::now().trunc_subsecs(3)
    }

    pub async fn register(&self, conn: &Arc<ConnectionHandle>) -> Result<(), RegisterError> {
        let (reply, rx) = oneshot::channel();
        self.coordinator
            .send(Command::Register {
                conn: Arc::clone(conn),
                reply,
            })
            .await
            .map_err(|_| RegisterError::CoordinatorGone)?;
        rx.await.map_err(|_| RegisterError::CoordinatorGone)?
    }

    /// Returns `false` if the connection was not registered.
    pub async fn unregister(&self, conn: &Arc<ConnectionHandle>) -> bool {
        let (reply, rx) = oneshot::channel();
        let sent = self
            .coordinator
            .send(Command::Unregister {
                conn: Arc::clone(conn),
                reply,
            })
            .await;
        if sent.is_err() {
            warn!(conn = %conn.id(), "Coordinator gone, unregistering inline");
            return self.users.remove(conn);
        }
        rx.await.unwrap_or(false)
    }

    /// Queue `payload` on every connection of `user_id`. Returns how many took it.
    pub fn send_to_user(&self, user_id: &str, payload: &Payload) -> usize {
        self.users
            .connections_of(user_id)
            .iter()
            .filter(|conn| conn.try_send(payload.clone()) == SendOutcome::Queued)
            .count()
    }

    /// `send_to_user` for each distinct id in `user_ids`.
    pub fn broadcast_to_users<'a, I>(&self, user_ids: I, payload: &Payload) -> usize
    where
        I: IntoIterator<Item = &'a UserId>,
    {
        let mut seen = HashSet::new();
        let delivered = user_ids
            .into_iter()
            .filter(|user| seen.insert(user.as_str()))
            .map(|user| self.send_to_user(user, payload))
            .sum();
        crate::metrics::record_fanout(delivered);
        delivered
    }

    pub fn broadcast_to_room(
        &self,
        room: &RoomId,
        payload: &Payload,
        exclude: Option<ConnId>,
    ) -> usize {
        self.rooms.broadcast(room, payload, exclude)
    }

    /// Send a `message_status` event to every connection of the sender.
    pub fn push_delivery_status(&self, sender_id: &str, report: DeliveryReport) -> usize {
        let event = OutboundEvent::MessageStatus {
            message_id: report.message_id,
            conversation_id: report.conversation_id,
            status: report.status,
            client_message_id: report.client_message_id,
            message: report.message,
            timestamp: self.server_time(),
        };
        self.send_to_user(sender_id, &Payload::from(&event))
    }

    /// Tear a connection down. Safe to call any number of times from any task.
    pub async fn disconnect(&self, conn: &Arc<ConnectionHandle>, reason: &str) {
        if !conn.deactivate() {
            debug!(conn = %conn.id(), reason, "Disconnect already in progress");
            return;
        }
        let rooms = self.rooms.remove_from_all(conn.id());
        debug!(conn = %conn.id(), ?rooms, "Left rooms");

        let streams: Vec<&RoomId> = rooms
            .iter()
            .filter(|room| room.kind() == RoomKind::Stream)
            .filter(|room| !self.rooms.has_other_connection(room, conn.user_id(), conn.id()))
            .collect();
        if !streams.is_empty() {
            let call = self.call_context();
            for room in streams {
                self.end_viewing(&call, room, conn.user_id()).await;
            }
        }

        self.unregister(conn).await;
        conn.close();
        info!(
            conn = %conn.id(),
            user = %conn.user_id(),
            addr = ?conn.addr(),
            rooms = rooms.len(),
            reason,
            "Connection removed"
        );
    }

    /// Record that `user_id` stopped watching the stream behind `room` and
    /// tell whoever is still in it.
    ///
    /// Callers check first that none of the user's connections remain in
    /// the room. A store failure is logged and the leave stands.
    pub async fn end_viewing(&self, call: &CallContext, room: &RoomId, user_id: &str) {
        let streams = &self.services.streams;
        if let Err(e) = call.run(streams.viewer_left(call, room.id(), user_id)).await {
            warn!(stream = %room.id(), user = %user_id, error = %e, "viewer_left failed");
        }

        let event = OutboundEvent::StreamViewerLeft {
            stream_id: room.id().to_string(),
            user_id: user_id.to_string(),
            timestamp: self.server_time(),
        };
        self.broadcast_to_room(room, &Payload::from(&event), None);
    }

    /// Store a client-chosen status and tell interested parties.
    pub async fn set_status(&self, user_id: &str, status: PresenceStatus) {
        if !self.presence.set_status(user_id, status) {
            return;
        }
        let notice = PresenceNotice::Status {
            user_id: user_id.to_string(),
            status,
        };
        if self.notices.send(notice).await.is_err() {
            warn!(user = %user_id, "Presence notifier gone");
        }
    }

    /// Send the contacts-online snapshot to one new connection.
    pub async fn send_online_snapshot(&self, conn: &ConnectionHandle) {
        let ctx = self.call_context();
        let contacts = match ctx
            .run(self.services.contacts.interested_parties_of(&ctx, conn.user_id()))
            .await
        {
            Ok(contacts) => contacts,
            Err(e) => {
                warn!(
                    user = %conn.user_id(),
                    error = %e,
                    "Contact lookup failed, sending empty snapshot"
                );
                Vec::new()
            }
        };

        let event = OutboundEvent::PresenceSnapshot {
            online_users: self.presence.online_among(&contacts),
            timestamp: self.server_time(),
        };
        conn.try_send(Payload::from(&event));
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.lifecycle.subscribe_shutdown()
    }

    pub fn shutdown(&self) {
        self.lifecycle.shutdown();
    }
}

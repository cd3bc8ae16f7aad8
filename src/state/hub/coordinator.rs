//! The coordinator task: sole writer of the user registry and presence counts.

use super::RegisterError;
use super::presence::PresenceNotice;
use crate::state::ConnectionHandle;
use crate::state::managers::{PresenceManager, Transition, UserManager};
use chrono::{SubsecRound, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

pub(crate) enum Command {
    Register {
        conn: Arc<ConnectionHandle>,
        reply: oneshot::Sender<Result<(), RegisterError>>,
    },
    Unregister {
        conn: Arc<ConnectionHandle>,
        reply: oneshot::Sender<bool>,
    },
}

pub(super) async fn run(
    users: Arc<UserManager>,
    presence: Arc<PresenceManager>,
    mut commands: mpsc::Receiver<Command>,
    notices: mpsc::Sender<PresenceNotice>,
) {
    while let Some(command) = commands.recv().await {
        let notice = match command {
            Command::Register { conn, reply } => {
                let (result, notice) = register(&users, &presence, &conn);
                let _ = reply.send(result);
                notice
            }
            Command::Unregister { conn, reply } => {
                let (removed, notice) = unregister(&users, &presence, &conn);
                let _ = reply.send(removed);
                notice
            }
        };

        crate::metrics::set_connections(users.connection_count());
        crate::metrics::set_online_users(presence.online_count());

        if let Some(notice) = notice
            && notices.send(notice).await.is_err()
        {
            warn!("Presence notifier gone, dropping transition");
        }
    }
    debug!("Hub coordinator stopped");
}

fn register(
    users: &UserManager,
    presence: &PresenceManager,
    conn: &Arc<ConnectionHandle>,
) -> (Result<(), RegisterError>, Option<PresenceNotice>) {
    if !conn.is_active() {
        return (Err(RegisterError::Inactive), None);
    }
    if !users.insert(conn) {
        return (Ok(()), None);
    }

    info!(
        conn = %conn.id(),
        user = %conn.user_id(),
        users = users.user_count(),
        "Connection registered"
    );
    let notice = match presence.connected(conn.user_id(), Utc::now().trunc_subsecs(3)) {
        Transition::CameOnline => Some(PresenceNotice::Online {
            user_id: conn.user_id().to_string(),
        }),
        _ => None,
    };
    (Ok(()), notice)
}

fn unregister(
    users: &UserManager,
    presence: &PresenceManager,
    conn: &ConnectionHandle,
) -> (bool, Option<PresenceNotice>) {
    if !users.remove(conn) {
        return (false, None);
    }

    let notice = match presence.disconnected(conn.user_id(), Utc::now().trunc_subsecs(3)) {
        Transition::WentOffline { last_seen } => Some(PresenceNotice::Offline {
            user_id: conn.user_id().to_string(),
            last_seen,
        }),
        _ => None,
    };
    (true, notice)
}

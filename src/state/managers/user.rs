//! User registry: user id → live connections.
//!
//! Written only by the hub coordinator task; read by anyone delivering to a
//! user. Readers snapshot under the lock and send after releasing it.

use crate::state::{ConnId, ConnectionHandle};
use hub_proto::UserId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct UserManager {
    users: RwLock<HashMap<UserId, HashMap<ConnId, Arc<ConnectionHandle>>>>,
}

impl UserManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. Returns `false` if it was already registered.
    pub fn insert(&self, conn: &Arc<ConnectionHandle>) -> bool {
        let mut users = self.users.write();
        users
            .entry(conn.user_id().to_string())
            .or_default()
            .insert(conn.id(), Arc::clone(conn))
            .is_none()
    }

    /// Remove a connection. Returns `false` if it was not registered.
    pub fn remove(&self, conn: &ConnectionHandle) -> bool {
        let mut users = self.users.write();
        let Some(conns) = users.get_mut(conn.user_id()) else {
            return false;
        };
        let removed = conns.remove(&conn.id()).is_some();
        if conns.is_empty() {
            users.remove(conn.user_id());
        }
        removed
    }

    /// Snapshot of a user's connections.
    pub fn connections_of(&self, user_id: &str) -> Vec<Arc<ConnectionHandle>> {
        self.users
            .read()
            .get(user_id)
            .map(|conns| conns.values().cloned().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn is_registered(&self, conn: &ConnectionHandle) -> bool {
        self.users
            .read()
            .get(conn.user_id())
            .is_some_and(|conns| conns.contains_key(&conn.id()))
    }

    pub fn connection_count(&self) -> usize {
        self.users.read().values().map(HashMap::len).sum()
    }

    pub fn user_count(&self) -> usize {
        self.users.read().len()
    }
}

//! Presence counting.
//!
//! A user is online while at least one of their connections is registered.
//! Counts change only from the hub coordinator; the client-set status is
//! written by the presence handler. Entries outlive the last connection so
//! last-seen survives until [`PresenceManager::prune_offline`] drops it.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hub_proto::{PresenceStatus, UserId};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone)]
struct PresenceEntry {
    connections: usize,
    last_seen: DateTime<Utc>,
    status: PresenceStatus,
}

/// What a count change meant for the user's visible presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    CameOnline,
    WentOffline { last_seen: DateTime<Utc> },
    Unchanged,
}

#[derive(Default)]
pub struct PresenceManager {
    entries: DashMap<UserId, PresenceEntry>,
    online: AtomicUsize,
}

impl PresenceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected(&self, user_id: &str, now: DateTime<Utc>) -> Transition {
        let mut entry = self
            .entries
            .entry(user_id.to_string())
            .or_insert_with(|| PresenceEntry {
                connections: 0,
                last_seen: now,
                status: PresenceStatus::Offline,
            });
        entry.connections += 1;
        entry.last_seen = now;
        if entry.connections == 1 {
            entry.status = PresenceStatus::Online;
            self.online.fetch_add(1, Ordering::Relaxed);
            Transition::CameOnline
        } else {
            Transition::Unchanged
        }
    }

    pub fn disconnected(&self, user_id: &str, now: DateTime<Utc>) -> Transition {
        let Some(mut entry) = self
            .entries
            .get_mut(user_id)
            .filter(|entry| entry.connections > 0)
        else {
            if cfg!(debug_assertions) {
                panic!("presence underflow for {user_id}");
            }
            tracing::error!(user = %user_id, "presence underflow ignored");
            return Transition::Unchanged;
        };

        entry.connections -= 1;
        entry.last_seen = now;
        if entry.connections == 0 {
            entry.status = PresenceStatus::Offline;
            self.online.fetch_sub(1, Ordering::Relaxed);
            Transition::WentOffline { last_seen: now }
        } else {
            Transition::Unchanged
        }
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.entries
            .get(user_id)
            .is_some_and(|entry| entry.connections > 0)
    }

    /// The subset of `users` currently online, in input order.
    pub fn online_among(&self, users: &[UserId]) -> Vec<UserId> {
        users
            .iter()
            .filter(|user| self.is_online(user))
            .cloned()
            .collect()
    }

    #[cfg(test)]
    pub fn status_of(&self, user_id: &str) -> PresenceStatus {
        self.entries
            .get(user_id)
            .map_or(PresenceStatus::Offline, |entry| entry.status)
    }

    /// Last connect or disconnect, for users seen since the last prune.
    #[cfg(test)]
    pub fn last_seen(&self, user_id: &str) -> Option<DateTime<Utc>> {
        self.entries.get(user_id).map(|entry| entry.last_seen)
    }

    /// Store a client-chosen status. Ignored for users with no connection.
    pub fn set_status(&self, user_id: &str, status: PresenceStatus) -> bool {
        match self.entries.get_mut(user_id) {
            Some(mut entry) if entry.connections > 0 => {
                entry.status = status;
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub fn connection_count(&self, user_id: &str) -> usize {
        self.entries.get(user_id).map_or(0, |entry| entry.connections)
    }

    pub fn online_count(&self) -> usize {
        self.online.load(Ordering::Relaxed)
    }

    /// Forget offline users last seen before `cutoff`. Returns how many.
    pub fn prune_offline(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.connections > 0 || entry.last_seen >= cutoff);
        before.saturating_sub(self.entries.len())
    }
}

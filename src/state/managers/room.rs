//! Room registry: named fan-out groups of connections.
//!
//! One lock guards both directions of the membership relation, so a
//! connection's room index and the rooms' member sets never disagree.
//! Rooms are created on first join and dropped when the last member leaves.

use crate::state::{ConnId, ConnectionHandle, SendOutcome};
use hub_proto::{Payload, RoomId};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("connection is closing")]
    Inactive,
}

#[derive(Default)]
struct Rooms {
    members: HashMap<RoomId, HashMap<ConnId, Arc<ConnectionHandle>>>,
    index: HashMap<ConnId, HashSet<RoomId>>,
}

#[derive(Default)]
pub struct RoomManager {
    rooms: RwLock<Rooms>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `conn` to `room`. Returns `Ok(false)` if it was already a member.
    pub fn join(&self, room: &RoomId, conn: &Arc<ConnectionHandle>) -> Result<bool, JoinError> {
        let mut rooms = self.rooms.write();
        // Checked under the write lock: teardown clears the flag before it
        // takes this lock to strip memberships.
        if !conn.is_active() {
            return Err(JoinError::Inactive);
        }

        let inserted = rooms
            .members
            .entry(room.clone())
            .or_default()
            .insert(conn.id(), Arc::clone(conn))
            .is_none();
        if inserted {
            rooms.index.entry(conn.id()).or_default().insert(room.clone());
        }
        crate::metrics::set_rooms(rooms.members.len());
        Ok(inserted)
    }

    /// Remove `conn` from `room`. Returns `false` if it was not a member.
    pub fn leave(&self, room: &RoomId, conn: ConnId) -> bool {
        let mut rooms = self.rooms.write();
        let removed = match rooms.members.get_mut(room) {
            Some(members) => {
                let removed = members.remove(&conn).is_some();
                if members.is_empty() {
                    rooms.members.remove(room);
                }
                removed
            }
            None => false,
        };

        if removed && let Some(joined) = rooms.index.get_mut(&conn) {
            joined.remove(room);
            if joined.is_empty() {
                rooms.index.remove(&conn);
            }
        }
        crate::metrics::set_rooms(rooms.members.len());
        removed
    }

    /// Drop `conn` from every room it joined. Returns the rooms it left.
    pub fn remove_from_all(&self, conn: ConnId) -> Vec<RoomId> {
        let mut rooms = self.rooms.write();
        let Some(joined) = rooms.index.remove(&conn) else {
            return Vec::new();
        };

        for room in &joined {
            if let Some(members) = rooms.members.get_mut(room) {
                members.remove(&conn);
                if members.is_empty() {
                    rooms.members.remove(room);
                }
            }
        }
        crate::metrics::set_rooms(rooms.members.len());
        joined.into_iter().collect()
    }

    /// Queue `payload` on every member except `exclude`.
    ///
    /// Returns the number of connections it was queued on. Full queues
    /// drop the payload and schedule that member for removal.
    pub fn broadcast(&self, room: &RoomId, payload: &Payload, exclude: Option<ConnId>) -> usize {
        let targets: Vec<Arc<ConnectionHandle>> = {
            let rooms = self.rooms.read();
            match rooms.members.get(room) {
                Some(members) => members
                    .values()
                    .filter(|conn| Some(conn.id()) != exclude)
                    .cloned()
                    .collect(),
                None => return 0,
            }
        };

        let delivered = targets
            .iter()
            .filter(|conn| conn.try_send(payload.clone()) == SendOutcome::Queued)
            .count();
        crate::metrics::record_fanout(delivered);
        delivered
    }

    pub fn is_member(&self, room: &RoomId, conn: ConnId) -> bool {
        self.rooms
            .read()
            .members
            .get(room)
            .is_some_and(|members| members.contains_key(&conn))
    }

    /// Whether any connection of `user_id` other than `except` is in `room`.
    pub fn has_other_connection(&self, room: &RoomId, user_id: &str, except: ConnId) -> bool {
        self.rooms.read().members.get(room).is_some_and(|members| {
            members
                .values()
                .any(|conn| conn.id() != except && conn.user_id() == user_id)
        })
    }

    pub fn members_of(&self, room: &RoomId) -> Vec<ConnId> {
        self.rooms
            .read()
            .members
            .get(room)
            .map(|members| members.keys().copied().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn rooms_of(&self, conn: ConnId) -> Vec<RoomId> {
        self.rooms
            .read()
            .index
            .get(&conn)
            .map(|joined| joined.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.read().members.len()
    }
}

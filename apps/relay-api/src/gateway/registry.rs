//! Session registry: the single owner of live-connection state.
//!
//! One entry per connection, guarded by one `parking_lot::RwLock`. All reads
//! used for fanout are snapshots copied out under the read lock; no await
//! point ever holds the lock, so a slow persistence call can never block
//! joins, leaves, or other sends. A join that completes before a snapshot is
//! taken is always reflected in that snapshot.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::auth::Identity;
use crate::error::RelayError;

use super::events::ServerEvent;

pub type ConnectionId = String;

/// Per-connection outbound queue. The connection's event loop drains this
/// onto the socket; a closed receiver means the connection is gone.
pub type OutboundSender = mpsc::UnboundedSender<Arc<ServerEvent>>;

struct SessionEntry {
    identity: Identity,
    sender: OutboundSender,
    /// At most one non-global room at a time; joining a new room implicitly
    /// leaves the previous one.
    joined_room: Option<i64>,
    /// Groups this connection has opted into. A derived, disposable view;
    /// durable membership lives in the store.
    joined_groups: HashSet<i64>,
}

/// State released by [`SessionRegistry::unregister`], handed back to the
/// caller so it can emit departure notifications.
pub struct ClosedSession {
    pub identity: Identity,
    pub joined_room: Option<i64>,
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<ConnectionId, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a freshly authenticated connection.
    pub fn register(
        &self,
        connection_id: &str,
        identity: Identity,
        sender: OutboundSender,
    ) -> Result<(), RelayError> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(connection_id) {
            return Err(RelayError::conflict("Connection already registered"));
        }
        sessions.insert(
            connection_id.to_string(),
            SessionEntry {
                identity,
                sender,
                joined_room: None,
                joined_groups: HashSet::new(),
            },
        );
        Ok(())
    }

    /// Remove a connection and release everything it held. Idempotent:
    /// removing an unknown connection is a no-op returning `None`.
    pub fn unregister(&self, connection_id: &str) -> Option<ClosedSession> {
        let mut sessions = self.sessions.write();
        sessions.remove(connection_id).map(|entry| ClosedSession {
            identity: entry.identity,
            joined_room: entry.joined_room,
        })
    }

    pub fn lookup(&self, connection_id: &str) -> Option<Identity> {
        let sessions = self.sessions.read();
        sessions.get(connection_id).map(|e| e.identity.clone())
    }

    /// Every live connection id belonging to a user (one per device/tab).
    pub fn active_connections_for(&self, user_id: i64) -> Vec<ConnectionId> {
        let sessions = self.sessions.read();
        sessions
            .iter()
            .filter(|(_, e)| e.identity.user_id == user_id)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Join a room, implicitly leaving any previously joined room.
    /// Returns the id of the room that was left, if any.
    pub fn join_room(
        &self,
        connection_id: &str,
        room_id: i64,
    ) -> Result<Option<i64>, RelayError> {
        let mut sessions = self.sessions.write();
        let entry = sessions
            .get_mut(connection_id)
            .ok_or_else(|| RelayError::not_found("Unknown connection"))?;
        let previous = entry.joined_room.replace(room_id);
        Ok(previous.filter(|prev| *prev != room_id))
    }

    /// Explicitly leave the current room, if any.
    pub fn leave_room(&self, connection_id: &str) -> Option<i64> {
        let mut sessions = self.sessions.write();
        sessions.get_mut(connection_id)?.joined_room.take()
    }

    pub fn current_room(&self, connection_id: &str) -> Option<i64> {
        let sessions = self.sessions.read();
        sessions.get(connection_id)?.joined_room
    }

    /// Record group interest on a connection.
    pub fn join_group(&self, connection_id: &str, group_id: i64) -> Result<(), RelayError> {
        let mut sessions = self.sessions.write();
        let entry = sessions
            .get_mut(connection_id)
            .ok_or_else(|| RelayError::not_found("Unknown connection"))?;
        entry.joined_groups.insert(group_id);
        Ok(())
    }

    /// Drop group interest from every connection of a user, used when the
    /// user loses durable membership.
    pub fn leave_group_for_user(&self, user_id: i64, group_id: i64) {
        let mut sessions = self.sessions.write();
        for entry in sessions.values_mut() {
            if entry.identity.user_id == user_id {
                entry.joined_groups.remove(&group_id);
            }
        }
    }

    // -- snapshots ---------------------------------------------------------

    /// All live connections.
    pub fn snapshot_all(&self) -> Vec<(ConnectionId, OutboundSender)> {
        let sessions = self.sessions.read();
        sessions
            .iter()
            .map(|(id, e)| (id.clone(), e.sender.clone()))
            .collect()
    }

    /// Connections currently joined to a room.
    pub fn snapshot_room(&self, room_id: i64) -> Vec<(ConnectionId, OutboundSender)> {
        let sessions = self.sessions.read();
        sessions
            .iter()
            .filter(|(_, e)| e.joined_room == Some(room_id))
            .map(|(id, e)| (id.clone(), e.sender.clone()))
            .collect()
    }

    /// Connections belonging to any of the given users. Each connection
    /// appears exactly once regardless of duplicates in `user_ids`.
    pub fn snapshot_users(&self, user_ids: &[i64]) -> Vec<(ConnectionId, OutboundSender)> {
        let sessions = self.sessions.read();
        sessions
            .iter()
            .filter(|(_, e)| user_ids.contains(&e.identity.user_id))
            .map(|(id, e)| (id.clone(), e.sender.clone()))
            .collect()
    }

    pub fn sender_of(&self, connection_id: &str) -> Option<OutboundSender> {
        let sessions = self.sessions.read();
        sessions.get(connection_id).map(|e| e.sender.clone())
    }

    /// Enqueue an event to every live connection. Returns how many
    /// connections accepted it.
    pub fn broadcast(&self, event: Arc<ServerEvent>) -> usize {
        let targets = self.snapshot_all();
        let mut sent = 0;
        for (_, sender) in targets {
            if sender.send(event.clone()).is_ok() {
                sent += 1;
            }
        }
        sent
    }

    pub fn connection_count(&self) -> usize {
        self.sessions.read().len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

//! Channel references and the resolver that maps client-supplied targets
//! onto concrete channel rows.
//!
//! The resolver (together with the membership synchronizer) is the only
//! component that consults the store for membership decisions; the fanout
//! path receives resolved ids and member lists and never touches storage
//! for them.

use std::sync::Arc;

use crate::config::Config;
use crate::error::RelayError;
use crate::models::conversation::Conversation;
use crate::models::room::Room;
use crate::store::ChatStore;

/// Maximum accepted room-name length after trimming.
pub const MAX_ROOM_NAME_LEN: usize = 64;

/// An addressable broadcast target. Two refs are equal iff their tag and id
/// match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelRef {
    Global,
    Room(i64),
    Group(i64),
    Direct(i64),
}

pub struct ChannelResolver {
    store: Arc<dyn ChatStore>,
    fold_room_names: bool,
}

impl ChannelResolver {
    pub fn new(store: Arc<dyn ChatStore>, config: &Config) -> Self {
        Self {
            store,
            fold_room_names: config.fold_room_names,
        }
    }

    /// Trim and validate a client-supplied room name, folding case when the
    /// relay is configured to treat differently-cased names as one room.
    pub fn normalize_room_name(&self, raw: &str) -> Result<String, RelayError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RelayError::validation("Room name is required"));
        }
        if trimmed.len() > MAX_ROOM_NAME_LEN {
            return Err(RelayError::validation(format!(
                "Room name must be {MAX_ROOM_NAME_LEN} characters or fewer"
            )));
        }
        if self.fold_room_names {
            Ok(trimmed.to_lowercase())
        } else {
            Ok(trimmed.to_string())
        }
    }

    /// Resolve a room by name, creating it when absent. Returns the room and
    /// whether this call created it.
    ///
    /// The store's unique constraint on the name is the final arbiter for
    /// racing creators: the loser's `Conflict` is converted into a re-fetch
    /// of the winner's row, never surfaced to the caller.
    pub async fn resolve_or_create_room(&self, raw: &str) -> Result<(Room, bool), RelayError> {
        let name = self.normalize_room_name(raw)?;

        if let Some(room) = self.store.room_by_name(&name).await? {
            return Ok((room, false));
        }

        match self.store.create_room(&name).await {
            Ok(room) => Ok((room, true)),
            Err(RelayError::Conflict(_)) => {
                let room = self
                    .store
                    .room_by_name(&name)
                    .await?
                    .ok_or_else(|| RelayError::internal("room vanished after create race"))?;
                Ok((room, false))
            }
            Err(err) => Err(err),
        }
    }

    /// Resolve an existing room by name. The send path never creates rooms.
    pub async fn resolve_room(&self, raw: &str) -> Result<Room, RelayError> {
        let name = self.normalize_room_name(raw)?;
        self.store
            .room_by_name(&name)
            .await?
            .ok_or_else(|| RelayError::not_found("Room not found"))
    }

    /// Resolve a group for a requester, returning the member user ids.
    /// Never auto-creates; non-members are rejected.
    pub async fn resolve_group(
        &self,
        group_id: i64,
        requester_id: i64,
    ) -> Result<Vec<i64>, RelayError> {
        if self.store.group_by_id(group_id).await?.is_none() {
            return Err(RelayError::not_found("Group not found"));
        }
        let members = self.store.group_member_ids(group_id).await?;
        if !members.contains(&requester_id) {
            return Err(RelayError::forbidden("Not a member of this group"));
        }
        Ok(members)
    }

    /// Resolve the direct conversation between two users, creating it when
    /// absent. `(A, B)` and `(B, A)` always resolve to the same row.
    pub async fn resolve_or_create_direct(
        &self,
        requester_id: i64,
        other_id: i64,
    ) -> Result<Conversation, RelayError> {
        if requester_id == other_id {
            return Err(RelayError::validation(
                "Cannot start a conversation with yourself",
            ));
        }
        if self.store.user_by_id(other_id).await?.is_none() {
            return Err(RelayError::not_found("User not found"));
        }

        let (user_a, user_b) = if requester_id < other_id {
            (requester_id, other_id)
        } else {
            (other_id, requester_id)
        };
        self.store.get_or_create_conversation(user_a, user_b).await
    }
}

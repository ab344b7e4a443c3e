//! Membership synchronizer: keeps the session registry and the durable
//! membership records in agreement when joins, leaves, and group roster
//! changes happen concurrently with sends.

use std::sync::Arc;

use crate::error::RelayError;
use crate::models::group::GroupMember;
use crate::models::room::Room;
use crate::store::ChatStore;

use super::channel::ChannelResolver;
use super::events::{GroupUpdatedPayload, RoomUserJoinedPayload, ServerEvent};
use super::registry::SessionRegistry;

pub struct MembershipSynchronizer {
    registry: Arc<SessionRegistry>,
    resolver: Arc<ChannelResolver>,
    store: Arc<dyn ChatStore>,
}

impl MembershipSynchronizer {
    pub fn new(
        registry: Arc<SessionRegistry>,
        resolver: Arc<ChannelResolver>,
        store: Arc<dyn ChatStore>,
    ) -> Self {
        Self {
            registry,
            resolver,
            store,
        }
    }

    /// Join a connection to a room, leaving any previously joined room, and
    /// tell the room's occupants (the joiner included) who arrived.
    pub fn join_room(
        &self,
        connection_id: &str,
        username: &str,
        room: &Room,
    ) -> Result<(), RelayError> {
        let left = self.registry.join_room(connection_id, room.id)?;
        if let Some(previous) = left {
            tracing::debug!(%connection_id, previous, room_id = room.id, "room switch");
        }

        let event = Arc::new(ServerEvent::RoomUserJoined(RoomUserJoinedPayload {
            room_id: room.id,
            username: username.to_string(),
        }));
        for (_, sender) in self.registry.snapshot_room(room.id) {
            let _ = sender.send(event.clone());
        }
        Ok(())
    }

    /// Opt a connection into a group's broadcasts. Requires durable
    /// membership (checked through the resolver); grants no persistence-level
    /// membership itself.
    pub async fn join_group_channel(
        &self,
        connection_id: &str,
        user_id: i64,
        group_id: i64,
    ) -> Result<(), RelayError> {
        self.resolver.resolve_group(group_id, user_id).await?;
        self.registry.join_group(connection_id, group_id)?;

        if let Some(sender) = self.registry.sender_of(connection_id) {
            let _ = sender.send(Arc::new(ServerEvent::GroupUpdated(GroupUpdatedPayload {
                group_id,
            })));
        }
        Ok(())
    }

    /// Add a user to a group. Admin-only; adding an existing member is an
    /// idempotent no-op. Returns the refreshed member list.
    pub async fn add_member(
        &self,
        group_id: i64,
        user_id: i64,
        requested_by: i64,
    ) -> Result<Vec<GroupMember>, RelayError> {
        if self.store.group_by_id(group_id).await?.is_none() {
            return Err(RelayError::not_found("Group not found"));
        }
        if !self.store.is_group_admin(group_id, requested_by).await? {
            return Err(RelayError::forbidden("Only group admins can add members"));
        }
        if self.store.user_by_id(user_id).await?.is_none() {
            return Err(RelayError::not_found("User not found"));
        }

        if !self.store.is_group_member(group_id, user_id).await? {
            match self.store.add_group_member(group_id, user_id).await {
                Ok(()) => {}
                // A racing admin added them first; converge on "member".
                Err(RelayError::Conflict(_)) => {}
                Err(err) => return Err(err),
            }
            self.notify_group(group_id).await?;
        }

        self.store.group_members(group_id).await
    }

    /// Remove a user from a group. Allowed for the user themselves or an
    /// admin; anyone else is rejected.
    pub async fn remove_member(
        &self,
        group_id: i64,
        user_id: i64,
        requested_by: i64,
    ) -> Result<Vec<GroupMember>, RelayError> {
        if self.store.group_by_id(group_id).await?.is_none() {
            return Err(RelayError::not_found("Group not found"));
        }
        if requested_by != user_id && !self.store.is_group_admin(group_id, requested_by).await? {
            return Err(RelayError::forbidden(
                "Only group admins can remove other members",
            ));
        }

        let removed = self.store.remove_group_member(group_id, user_id).await?;
        if !removed {
            return Err(RelayError::not_found("Not a member of this group"));
        }

        self.registry.leave_group_for_user(user_id, group_id);

        // Tell the remaining members and the removed user's own sessions.
        let mut audience = self.store.group_member_ids(group_id).await?;
        audience.push(user_id);
        let event = Arc::new(ServerEvent::GroupUpdated(GroupUpdatedPayload { group_id }));
        for (_, sender) in self.registry.snapshot_users(&audience) {
            let _ = sender.send(event.clone());
        }

        self.store.group_members(group_id).await
    }

    async fn notify_group(&self, group_id: i64) -> Result<(), RelayError> {
        let members = self.store.group_member_ids(group_id).await?;
        let event = Arc::new(ServerEvent::GroupUpdated(GroupUpdatedPayload { group_id }));
        for (_, sender) in self.registry.snapshot_users(&members) {
            let _ = sender.send(event.clone());
        }
        Ok(())
    }
}

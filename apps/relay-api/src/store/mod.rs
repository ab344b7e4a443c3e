//! Persistence Gateway: the durable store consumed by the relay core.
//!
//! The gateway and REST handlers never talk to storage directly; everything
//! goes through [`ChatStore`]. Uniqueness constraints (usernames, room
//! names, conversation pairs, group membership) live in the store and are
//! the conflict-resolution mechanism for racing writers.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::RelayError;
use crate::models::conversation::{Conversation, ConversationSummary};
use crate::models::group::{Group, GroupMember, GroupSummary};
use crate::models::message::MessageRow;
use crate::models::room::Room;
use crate::models::user::{User, UserSummary};

/// The durable facts about a just-persisted message: the id assigned by the
/// store and the stored timestamp. Broadcast payloads are built from this,
/// never from values invented at send time.
#[derive(Debug, Clone, Copy)]
pub struct StoredMessage {
    pub id: i64,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    // -- users ------------------------------------------------------------

    async fn create_user(&self, username: &str, password_hash: &str)
        -> Result<User, RelayError>;
    async fn user_by_id(&self, id: i64) -> Result<Option<User>, RelayError>;
    async fn user_by_username(&self, username: &str) -> Result<Option<User>, RelayError>;
    async fn search_users(&self, query: &str, limit: i64)
        -> Result<Vec<UserSummary>, RelayError>;

    // -- rooms ------------------------------------------------------------

    /// Fails with `Conflict` when a room with the same name already exists.
    async fn create_room(&self, name: &str) -> Result<Room, RelayError>;
    async fn room_by_id(&self, id: i64) -> Result<Option<Room>, RelayError>;
    async fn room_by_name(&self, name: &str) -> Result<Option<Room>, RelayError>;
    async fn list_rooms(&self) -> Result<Vec<Room>, RelayError>;

    // -- messages ---------------------------------------------------------

    async fn create_message(&self, sender_id: i64, content: &str)
        -> Result<StoredMessage, RelayError>;
    async fn create_room_message(
        &self,
        room_id: i64,
        sender_id: i64,
        content: &str,
    ) -> Result<StoredMessage, RelayError>;
    async fn create_direct_message(
        &self,
        conversation_id: i64,
        sender_id: i64,
        content: &str,
    ) -> Result<StoredMessage, RelayError>;
    async fn create_group_message(
        &self,
        group_id: i64,
        sender_id: i64,
        content: &str,
    ) -> Result<StoredMessage, RelayError>;

    async fn recent_messages(&self, limit: i64) -> Result<Vec<MessageRow>, RelayError>;
    async fn room_messages(&self, room_id: i64, limit: i64)
        -> Result<Vec<MessageRow>, RelayError>;
    async fn direct_messages(
        &self,
        conversation_id: i64,
        limit: i64,
    ) -> Result<Vec<MessageRow>, RelayError>;
    async fn group_messages(&self, group_id: i64, limit: i64)
        -> Result<Vec<MessageRow>, RelayError>;

    // -- conversations ----------------------------------------------------

    /// Get or create the conversation row for a canonical pair
    /// (`user_a < user_b`). Racing creators converge on one row.
    async fn get_or_create_conversation(
        &self,
        user_a: i64,
        user_b: i64,
    ) -> Result<Conversation, RelayError>;
    async fn conversation_by_id(&self, id: i64) -> Result<Option<Conversation>, RelayError>;
    async fn conversations_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<ConversationSummary>, RelayError>;

    // -- groups -----------------------------------------------------------

    /// Create a group; the creator becomes its first (admin) member.
    async fn create_group(&self, name: &str, creator_id: i64) -> Result<Group, RelayError>;
    async fn group_by_id(&self, id: i64) -> Result<Option<Group>, RelayError>;
    async fn groups_for_user(&self, user_id: i64) -> Result<Vec<GroupSummary>, RelayError>;
    async fn is_group_member(&self, group_id: i64, user_id: i64) -> Result<bool, RelayError>;
    async fn is_group_admin(&self, group_id: i64, user_id: i64) -> Result<bool, RelayError>;
    async fn group_member_ids(&self, group_id: i64) -> Result<Vec<i64>, RelayError>;
    async fn group_members(&self, group_id: i64) -> Result<Vec<GroupMember>, RelayError>;
    /// Fails with `Conflict` when the user is already a member.
    async fn add_group_member(&self, group_id: i64, user_id: i64) -> Result<(), RelayError>;
    /// Returns whether a membership row was actually removed.
    async fn remove_group_member(&self, group_id: i64, user_id: i64)
        -> Result<bool, RelayError>;
}

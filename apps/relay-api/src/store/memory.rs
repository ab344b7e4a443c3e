//! In-memory [`ChatStore`] used by the test suite.
//!
//! Mirrors the Postgres implementation's constraints: unique usernames and
//! room names, canonical conversation pairs, unique group membership.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::RelayError;
use crate::models::conversation::{Conversation, ConversationSummary};
use crate::models::group::{Group, GroupMember, GroupSummary};
use crate::models::message::MessageRow;
use crate::models::room::Room;
use crate::models::user::{User, UserSummary};

use super::{ChatStore, StoredMessage};

#[derive(Debug, Clone)]
struct MemberRecord {
    user_id: i64,
    is_admin: bool,
}

#[derive(Debug, Clone)]
struct MessageRecord {
    id: i64,
    sender_id: i64,
    content: String,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    users: Vec<User>,
    rooms: Vec<Room>,
    conversations: Vec<Conversation>,
    groups: Vec<Group>,
    group_members: HashMap<i64, Vec<MemberRecord>>,
    messages: Vec<MessageRecord>,
    room_messages: HashMap<i64, Vec<MessageRecord>>,
    direct_messages: HashMap<i64, Vec<MessageRecord>>,
    group_messages: HashMap<i64, Vec<MessageRecord>>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn username_of(&self, user_id: i64) -> String {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.username.clone())
            .unwrap_or_default()
    }

    fn to_rows(&self, records: &[MessageRecord], limit: i64) -> Vec<MessageRow> {
        let mut rows: Vec<MessageRow> = records
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .map(|m| MessageRow {
                id: m.id,
                content: m.content.clone(),
                user_id: m.sender_id,
                username: self.username_of(m.sender_id),
                created_at: m.created_at,
            })
            .collect();
        rows.reverse();
        rows
    }
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<User, RelayError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.iter().any(|u| u.username == username) {
            return Err(RelayError::conflict("Username already taken"));
        }
        let user = User {
            id: inner.next_id(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn user_by_id(&self, id: i64) -> Result<Option<User>, RelayError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, RelayError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.username == username).cloned())
    }

    async fn search_users(
        &self,
        query: &str,
        limit: i64,
    ) -> Result<Vec<UserSummary>, RelayError> {
        let inner = self.inner.lock().unwrap();
        let needle = query.to_lowercase();
        Ok(inner
            .users
            .iter()
            .filter(|u| u.username.to_lowercase().contains(&needle))
            .take(limit.max(0) as usize)
            .map(|u| UserSummary {
                id: u.id,
                username: u.username.clone(),
            })
            .collect())
    }

    async fn create_room(&self, name: &str) -> Result<Room, RelayError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.rooms.iter().any(|r| r.name == name) {
            return Err(RelayError::conflict("Room already exists"));
        }
        let room = Room {
            id: inner.next_id(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        inner.rooms.push(room.clone());
        Ok(room)
    }

    async fn room_by_id(&self, id: i64) -> Result<Option<Room>, RelayError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.rooms.iter().find(|r| r.id == id).cloned())
    }

    async fn room_by_name(&self, name: &str) -> Result<Option<Room>, RelayError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.rooms.iter().find(|r| r.name == name).cloned())
    }

    async fn list_rooms(&self) -> Result<Vec<Room>, RelayError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.rooms.clone())
    }

    async fn create_message(
        &self,
        sender_id: i64,
        content: &str,
    ) -> Result<StoredMessage, RelayError> {
        let mut inner = self.inner.lock().unwrap();
        let record = MessageRecord {
            id: inner.next_id(),
            sender_id,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        let stored = StoredMessage {
            id: record.id,
            created_at: record.created_at,
        };
        inner.messages.push(record);
        Ok(stored)
    }

    async fn create_room_message(
        &self,
        room_id: i64,
        sender_id: i64,
        content: &str,
    ) -> Result<StoredMessage, RelayError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.rooms.iter().any(|r| r.id == room_id) {
            return Err(RelayError::not_found("Room not found"));
        }
        let record = MessageRecord {
            id: inner.next_id(),
            sender_id,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        let stored = StoredMessage {
            id: record.id,
            created_at: record.created_at,
        };
        inner.room_messages.entry(room_id).or_default().push(record);
        Ok(stored)
    }

    async fn create_direct_message(
        &self,
        conversation_id: i64,
        sender_id: i64,
        content: &str,
    ) -> Result<StoredMessage, RelayError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.conversations.iter().any(|c| c.id == conversation_id) {
            return Err(RelayError::not_found("Conversation not found"));
        }
        let record = MessageRecord {
            id: inner.next_id(),
            sender_id,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        let stored = StoredMessage {
            id: record.id,
            created_at: record.created_at,
        };
        inner
            .direct_messages
            .entry(conversation_id)
            .or_default()
            .push(record);
        Ok(stored)
    }

    async fn create_group_message(
        &self,
        group_id: i64,
        sender_id: i64,
        content: &str,
    ) -> Result<StoredMessage, RelayError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.groups.iter().any(|g| g.id == group_id) {
            return Err(RelayError::not_found("Group not found"));
        }
        let record = MessageRecord {
            id: inner.next_id(),
            sender_id,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        let stored = StoredMessage {
            id: record.id,
            created_at: record.created_at,
        };
        inner.group_messages.entry(group_id).or_default().push(record);
        Ok(stored)
    }

    async fn recent_messages(&self, limit: i64) -> Result<Vec<MessageRow>, RelayError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.to_rows(&inner.messages, limit))
    }

    async fn room_messages(
        &self,
        room_id: i64,
        limit: i64,
    ) -> Result<Vec<MessageRow>, RelayError> {
        let inner = self.inner.lock().unwrap();
        let records = inner.room_messages.get(&room_id).cloned().unwrap_or_default();
        Ok(inner.to_rows(&records, limit))
    }

    async fn direct_messages(
        &self,
        conversation_id: i64,
        limit: i64,
    ) -> Result<Vec<MessageRow>, RelayError> {
        let inner = self.inner.lock().unwrap();
        let records = inner
            .direct_messages
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default();
        Ok(inner.to_rows(&records, limit))
    }

    async fn group_messages(
        &self,
        group_id: i64,
        limit: i64,
    ) -> Result<Vec<MessageRow>, RelayError> {
        let inner = self.inner.lock().unwrap();
        let records = inner.group_messages.get(&group_id).cloned().unwrap_or_default();
        Ok(inner.to_rows(&records, limit))
    }

    async fn get_or_create_conversation(
        &self,
        user_a: i64,
        user_b: i64,
    ) -> Result<Conversation, RelayError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner
            .conversations
            .iter()
            .find(|c| c.user_a == user_a && c.user_b == user_b)
        {
            return Ok(existing.clone());
        }
        let conversation = Conversation {
            id: inner.next_id(),
            user_a,
            user_b,
            created_at: Utc::now(),
        };
        inner.conversations.push(conversation.clone());
        Ok(conversation)
    }

    async fn conversation_by_id(&self, id: i64) -> Result<Option<Conversation>, RelayError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.conversations.iter().find(|c| c.id == id).cloned())
    }

    async fn conversations_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<ConversationSummary>, RelayError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .conversations
            .iter()
            .filter(|c| c.involves(user_id))
            .map(|c| {
                let other = c.other_participant(user_id);
                ConversationSummary {
                    id: c.id,
                    other_user_id: other,
                    other_username: inner.username_of(other),
                    created_at: c.created_at,
                }
            })
            .collect())
    }

    async fn create_group(&self, name: &str, creator_id: i64) -> Result<Group, RelayError> {
        let mut inner = self.inner.lock().unwrap();
        let group = Group {
            id: inner.next_id(),
            name: name.to_string(),
            created_by: creator_id,
            created_at: Utc::now(),
        };
        inner.groups.push(group.clone());
        inner.group_members.insert(
            group.id,
            vec![MemberRecord {
                user_id: creator_id,
                is_admin: true,
            }],
        );
        Ok(group)
    }

    async fn group_by_id(&self, id: i64) -> Result<Option<Group>, RelayError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.groups.iter().find(|g| g.id == id).cloned())
    }

    async fn groups_for_user(&self, user_id: i64) -> Result<Vec<GroupSummary>, RelayError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .groups
            .iter()
            .filter_map(|g| {
                let members = inner.group_members.get(&g.id)?;
                let me = members.iter().find(|m| m.user_id == user_id)?;
                Some(GroupSummary {
                    id: g.id,
                    name: g.name.clone(),
                    is_admin: me.is_admin,
                    created_at: g.created_at,
                })
            })
            .collect())
    }

    async fn is_group_member(&self, group_id: i64, user_id: i64) -> Result<bool, RelayError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .group_members
            .get(&group_id)
            .is_some_and(|members| members.iter().any(|m| m.user_id == user_id)))
    }

    async fn is_group_admin(&self, group_id: i64, user_id: i64) -> Result<bool, RelayError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .group_members
            .get(&group_id)
            .is_some_and(|members| members.iter().any(|m| m.user_id == user_id && m.is_admin)))
    }

    async fn group_member_ids(&self, group_id: i64) -> Result<Vec<i64>, RelayError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .group_members
            .get(&group_id)
            .map(|members| members.iter().map(|m| m.user_id).collect())
            .unwrap_or_default())
    }

    async fn group_members(&self, group_id: i64) -> Result<Vec<GroupMember>, RelayError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .group_members
            .get(&group_id)
            .map(|members| {
                members
                    .iter()
                    .map(|m| GroupMember {
                        user_id: m.user_id,
                        username: inner.username_of(m.user_id),
                        is_admin: m.is_admin,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn add_group_member(&self, group_id: i64, user_id: i64) -> Result<(), RelayError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.groups.iter().any(|g| g.id == group_id) {
            return Err(RelayError::not_found("Group not found"));
        }
        let members = inner.group_members.entry(group_id).or_default();
        if members.iter().any(|m| m.user_id == user_id) {
            return Err(RelayError::conflict("Already a member"));
        }
        members.push(MemberRecord {
            user_id,
            is_admin: false,
        });
        Ok(())
    }

    async fn remove_group_member(
        &self,
        group_id: i64,
        user_id: i64,
    ) -> Result<bool, RelayError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(members) = inner.group_members.get_mut(&group_id) else {
            return Ok(false);
        };
        let before = members.len();
        members.retain(|m| m.user_id != user_id);
        Ok(members.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_usernames_conflict() {
        let store = MemoryStore::new();
        store.create_user("alice", "h").await.unwrap();
        let err = store.create_user("alice", "h").await.unwrap_err();
        assert!(matches!(err, RelayError::Conflict(_)));
    }

    #[tokio::test]
    async fn duplicate_room_names_conflict() {
        let store = MemoryStore::new();
        store.create_room("lobby").await.unwrap();
        let err = store.create_room("lobby").await.unwrap_err();
        assert!(matches!(err, RelayError::Conflict(_)));
    }

    #[tokio::test]
    async fn conversation_get_or_create_is_idempotent() {
        let store = MemoryStore::new();
        let a = store.get_or_create_conversation(1, 2).await.unwrap();
        let b = store.get_or_create_conversation(1, 2).await.unwrap();
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn group_creator_is_admin_member() {
        let store = MemoryStore::new();
        let alice = store.create_user("alice", "h").await.unwrap();
        let group = store.create_group("book club", alice.id).await.unwrap();

        assert!(store.is_group_member(group.id, alice.id).await.unwrap());
        assert!(store.is_group_admin(group.id, alice.id).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_group_membership_conflicts() {
        let store = MemoryStore::new();
        let alice = store.create_user("alice", "h").await.unwrap();
        let bob = store.create_user("bob", "h").await.unwrap();
        let group = store.create_group("book club", alice.id).await.unwrap();

        store.add_group_member(group.id, bob.id).await.unwrap();
        let err = store.add_group_member(group.id, bob.id).await.unwrap_err();
        assert!(matches!(err, RelayError::Conflict(_)));
    }

    #[tokio::test]
    async fn history_reads_are_chronological_and_joined() {
        let store = MemoryStore::new();
        let alice = store.create_user("alice", "h").await.unwrap();
        store.create_message(alice.id, "first").await.unwrap();
        store.create_message(alice.id, "second").await.unwrap();

        let rows = store.recent_messages(50).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].content, "first");
        assert_eq!(rows[1].content, "second");
        assert_eq!(rows[1].username, "alice");
    }

    #[tokio::test]
    async fn history_read_respects_limit() {
        let store = MemoryStore::new();
        let alice = store.create_user("alice", "h").await.unwrap();
        for i in 0..5 {
            store
                .create_message(alice.id, &format!("m{i}"))
                .await
                .unwrap();
        }

        let rows = store.recent_messages(2).await.unwrap();
        assert_eq!(rows.len(), 2);
        // Newest two, oldest first.
        assert_eq!(rows[0].content, "m3");
        assert_eq!(rows[1].content, "m4");
    }
}

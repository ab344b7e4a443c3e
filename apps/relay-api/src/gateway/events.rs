//! Wire-format events exchanged over the gateway WebSocket.
//!
//! Frames are JSON objects of the shape `{"event": "<name>", "data": ...}`.
//! Payload shapes follow the relay's client protocol: bare strings where the
//! payload is a single value, camelCase objects otherwise.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Identity;
use crate::models::room::Room;
use crate::store::StoredMessage;

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "connect")]
    Connect(ConnectPayload),
    #[serde(rename = "room:create")]
    RoomCreate(String),
    #[serde(rename = "room:join")]
    RoomJoin(String),
    #[serde(rename = "message:send")]
    MessageSend(String),
    #[serde(rename = "room:message:send")]
    RoomMessageSend(RoomMessagePayload),
    #[serde(rename = "direct:message:send")]
    DirectMessageSend(DirectMessagePayload),
    #[serde(rename = "group:message:send")]
    GroupMessageSend(GroupMessagePayload),
    #[serde(rename = "group:join")]
    GroupJoin(i64),
}

#[derive(Debug, Deserialize)]
pub struct ConnectPayload {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMessagePayload {
    pub room_name: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessagePayload {
    pub recipient_id: i64,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMessagePayload {
    pub group_id: i64,
    pub content: String,
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "connected")]
    Connected { user: Identity },
    #[serde(rename = "user:joined")]
    UserJoined(UserPresencePayload),
    #[serde(rename = "user:left")]
    UserLeft(UserPresencePayload),
    #[serde(rename = "room:created")]
    RoomCreated(Room),
    #[serde(rename = "room:user-joined")]
    RoomUserJoined(RoomUserJoinedPayload),
    #[serde(rename = "message:received")]
    MessageReceived(MessagePayload),
    #[serde(rename = "room:message:received")]
    RoomMessageReceived(MessagePayload),
    #[serde(rename = "direct:message:received")]
    DirectMessageReceived(MessagePayload),
    #[serde(rename = "group:message:received")]
    GroupMessageReceived(MessagePayload),
    #[serde(rename = "conversation:updated")]
    ConversationUpdated(ConversationUpdatedPayload),
    #[serde(rename = "group:updated")]
    GroupUpdated(GroupUpdatedPayload),
    #[serde(rename = "error")]
    Error { message: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPresencePayload {
    pub user_id: i64,
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomUserJoinedPayload {
    pub room_id: i64,
    pub username: String,
}

/// A delivered message. The channel-specific id is present for exactly the
/// channel kind the message belongs to.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
    pub content: String,
    pub user_id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationUpdatedPayload {
    pub conversation_id: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupUpdatedPayload {
    pub group_id: i64,
}

impl MessagePayload {
    fn new(stored: &StoredMessage, sender: &Identity, content: &str) -> Self {
        Self {
            id: stored.id,
            room_id: None,
            conversation_id: None,
            group_id: None,
            content: content.to_string(),
            user_id: sender.user_id,
            username: sender.username.clone(),
            created_at: stored.created_at,
        }
    }
}

impl ServerEvent {
    pub fn message_received(stored: &StoredMessage, sender: &Identity, content: &str) -> Self {
        Self::MessageReceived(MessagePayload::new(stored, sender, content))
    }

    pub fn room_message_received(
        stored: &StoredMessage,
        sender: &Identity,
        content: &str,
        room_id: i64,
    ) -> Self {
        let mut payload = MessagePayload::new(stored, sender, content);
        payload.room_id = Some(room_id);
        Self::RoomMessageReceived(payload)
    }

    pub fn direct_message_received(
        stored: &StoredMessage,
        sender: &Identity,
        content: &str,
        conversation_id: i64,
    ) -> Self {
        let mut payload = MessagePayload::new(stored, sender, content);
        payload.conversation_id = Some(conversation_id);
        Self::DirectMessageReceived(payload)
    }

    pub fn group_message_received(
        stored: &StoredMessage,
        sender: &Identity,
        content: &str,
        group_id: i64,
    ) -> Self {
        let mut payload = MessagePayload::new(stored, sender, content);
        payload.group_id = Some(group_id);
        Self::GroupMessageReceived(payload)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

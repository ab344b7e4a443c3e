use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::{direct_messages, group_messages, messages, room_messages};

#[derive(Debug, Insertable)]
#[diesel(table_name = messages)]
pub struct NewMessage<'a> {
    pub user_id: i64,
    pub content: &'a str,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = room_messages)]
pub struct NewRoomMessage<'a> {
    pub room_id: i64,
    pub user_id: i64,
    pub content: &'a str,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = direct_messages)]
pub struct NewDirectMessage<'a> {
    pub conversation_id: i64,
    pub sender_id: i64,
    pub content: &'a str,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = group_messages)]
pub struct NewGroupMessage<'a> {
    pub group_id: i64,
    pub sender_id: i64,
    pub content: &'a str,
    pub created_at: DateTime<Utc>,
}

/// A message as read back for history endpoints, joined with its sender.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageRow {
    pub id: i64,
    pub content: String,
    pub user_id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

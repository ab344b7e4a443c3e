use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::{chat_groups, group_members};

#[derive(Debug, Clone, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = chat_groups)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = chat_groups)]
pub struct NewGroup<'a> {
    pub name: &'a str,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = group_members)]
pub struct NewGroupMember {
    pub group_id: i64,
    pub user_id: i64,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// A group member, joined with their username for listings.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GroupMember {
    pub user_id: i64,
    pub username: String,
    pub is_admin: bool,
}

/// A group as listed for one of its members.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GroupSummary {
    pub id: i64,
    pub name: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

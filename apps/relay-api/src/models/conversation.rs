use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::conversations;

/// A direct conversation between two users.
///
/// The pair is stored canonically: `user_a < user_b`, enforced by the
/// storage layer, so `(A, B)` and `(B, A)` always land on the same row.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = conversations)]
pub struct Conversation {
    pub id: i64,
    pub user_a: i64,
    pub user_b: i64,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// The participant that isn't `user_id`.
    pub fn other_participant(&self, user_id: i64) -> i64 {
        if self.user_a == user_id {
            self.user_b
        } else {
            self.user_a
        }
    }

    pub fn involves(&self, user_id: i64) -> bool {
        self.user_a == user_id || self.user_b == user_id
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = conversations)]
pub struct NewConversation {
    pub user_a: i64,
    pub user_b: i64,
    pub created_at: DateTime<Utc>,
}

/// A conversation as listed for one participant.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConversationSummary {
    pub id: i64,
    pub other_user_id: i64,
    pub other_username: String,
    pub created_at: DateTime<Utc>,
}

//! Postgres-backed [`ChatStore`] over diesel-async.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::OptionalExtension;
use diesel_async::AsyncConnection;
use scoped_futures::ScopedFutureExt;

use crate::db::pool::DbPool;
use crate::db::schema::{
    chat_groups, conversations, direct_messages, group_members, group_messages, messages,
    room_messages, rooms, users,
};
use crate::error::RelayError;
use crate::models::conversation::{Conversation, ConversationSummary, NewConversation};
use crate::models::group::{Group, GroupMember, GroupSummary, NewGroup, NewGroupMember};
use crate::models::message::{
    MessageRow, NewDirectMessage, NewGroupMessage, NewMessage, NewRoomMessage,
};
use crate::models::room::{NewRoom, Room};
use crate::models::user::{NewUser, User, UserSummary};

use super::{ChatStore, StoredMessage};

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

type HistoryTuple = (i64, String, i64, String, DateTime<Utc>);

fn to_rows(mut tuples: Vec<HistoryTuple>) -> Vec<MessageRow> {
    // Queries fetch newest-first; history is served oldest-first.
    tuples.reverse();
    tuples
        .into_iter()
        .map(|(id, content, user_id, username, created_at)| MessageRow {
            id,
            content,
            user_id,
            username,
            created_at,
        })
        .collect()
}

#[async_trait]
impl ChatStore for PgStore {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<User, RelayError> {
        let mut conn = self.pool.get().await?;
        let user: User = diesel_async::RunQueryDsl::get_result(
            diesel::insert_into(users::table)
                .values(NewUser {
                    username,
                    password_hash,
                    created_at: Utc::now(),
                })
                .returning(User::as_returning()),
            &mut conn,
        )
        .await?;
        Ok(user)
    }

    async fn user_by_id(&self, id: i64) -> Result<Option<User>, RelayError> {
        let mut conn = self.pool.get().await?;
        let user = diesel_async::RunQueryDsl::get_result(
            users::table.find(id).select(User::as_select()),
            &mut conn,
        )
        .await
        .optional()?;
        Ok(user)
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, RelayError> {
        let mut conn = self.pool.get().await?;
        let user = diesel_async::RunQueryDsl::get_result(
            users::table
                .filter(users::username.eq(username))
                .select(User::as_select()),
            &mut conn,
        )
        .await
        .optional()?;
        Ok(user)
    }

    async fn search_users(
        &self,
        query: &str,
        limit: i64,
    ) -> Result<Vec<UserSummary>, RelayError> {
        let mut conn = self.pool.get().await?;
        let pattern = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));
        let found: Vec<(i64, String)> = diesel_async::RunQueryDsl::load(
            users::table
                .filter(users::username.ilike(pattern))
                .order(users::username.asc())
                .limit(limit)
                .select((users::id, users::username)),
            &mut conn,
        )
        .await?;
        Ok(found
            .into_iter()
            .map(|(id, username)| UserSummary { id, username })
            .collect())
    }

    async fn create_room(&self, name: &str) -> Result<Room, RelayError> {
        let mut conn = self.pool.get().await?;
        let room: Room = diesel_async::RunQueryDsl::get_result(
            diesel::insert_into(rooms::table)
                .values(NewRoom {
                    name,
                    created_at: Utc::now(),
                })
                .returning(Room::as_returning()),
            &mut conn,
        )
        .await?;
        Ok(room)
    }

    async fn room_by_id(&self, id: i64) -> Result<Option<Room>, RelayError> {
        let mut conn = self.pool.get().await?;
        let room = diesel_async::RunQueryDsl::get_result(
            rooms::table.find(id).select(Room::as_select()),
            &mut conn,
        )
        .await
        .optional()?;
        Ok(room)
    }

    async fn room_by_name(&self, name: &str) -> Result<Option<Room>, RelayError> {
        let mut conn = self.pool.get().await?;
        let room = diesel_async::RunQueryDsl::get_result(
            rooms::table
                .filter(rooms::name.eq(name))
                .select(Room::as_select()),
            &mut conn,
        )
        .await
        .optional()?;
        Ok(room)
    }

    async fn list_rooms(&self) -> Result<Vec<Room>, RelayError> {
        let mut conn = self.pool.get().await?;
        let all = diesel_async::RunQueryDsl::load(
            rooms::table.order(rooms::name.asc()).select(Room::as_select()),
            &mut conn,
        )
        .await?;
        Ok(all)
    }

    async fn create_message(
        &self,
        sender_id: i64,
        content: &str,
    ) -> Result<StoredMessage, RelayError> {
        let mut conn = self.pool.get().await?;
        let (id, created_at): (i64, DateTime<Utc>) = diesel_async::RunQueryDsl::get_result(
            diesel::insert_into(messages::table)
                .values(NewMessage {
                    user_id: sender_id,
                    content,
                    created_at: Utc::now(),
                })
                .returning((messages::id, messages::created_at)),
            &mut conn,
        )
        .await?;
        Ok(StoredMessage { id, created_at })
    }

    async fn create_room_message(
        &self,
        room_id: i64,
        sender_id: i64,
        content: &str,
    ) -> Result<StoredMessage, RelayError> {
        let mut conn = self.pool.get().await?;
        let (id, created_at): (i64, DateTime<Utc>) = diesel_async::RunQueryDsl::get_result(
            diesel::insert_into(room_messages::table)
                .values(NewRoomMessage {
                    room_id,
                    user_id: sender_id,
                    content,
                    created_at: Utc::now(),
                })
                .returning((room_messages::id, room_messages::created_at)),
            &mut conn,
        )
        .await?;
        Ok(StoredMessage { id, created_at })
    }

    async fn create_direct_message(
        &self,
        conversation_id: i64,
        sender_id: i64,
        content: &str,
    ) -> Result<StoredMessage, RelayError> {
        let mut conn = self.pool.get().await?;
        let (id, created_at): (i64, DateTime<Utc>) = diesel_async::RunQueryDsl::get_result(
            diesel::insert_into(direct_messages::table)
                .values(NewDirectMessage {
                    conversation_id,
                    sender_id,
                    content,
                    created_at: Utc::now(),
                })
                .returning((direct_messages::id, direct_messages::created_at)),
            &mut conn,
        )
        .await?;
        Ok(StoredMessage { id, created_at })
    }

    async fn create_group_message(
        &self,
        group_id: i64,
        sender_id: i64,
        content: &str,
    ) -> Result<StoredMessage, RelayError> {
        let mut conn = self.pool.get().await?;
        let (id, created_at): (i64, DateTime<Utc>) = diesel_async::RunQueryDsl::get_result(
            diesel::insert_into(group_messages::table)
                .values(NewGroupMessage {
                    group_id,
                    sender_id,
                    content,
                    created_at: Utc::now(),
                })
                .returning((group_messages::id, group_messages::created_at)),
            &mut conn,
        )
        .await?;
        Ok(StoredMessage { id, created_at })
    }

    async fn recent_messages(&self, limit: i64) -> Result<Vec<MessageRow>, RelayError> {
        let mut conn = self.pool.get().await?;
        let rows: Vec<HistoryTuple> = diesel_async::RunQueryDsl::load(
            messages::table
                .inner_join(users::table)
                .order(messages::created_at.desc())
                .limit(limit)
                .select((
                    messages::id,
                    messages::content,
                    messages::user_id,
                    users::username,
                    messages::created_at,
                )),
            &mut conn,
        )
        .await?;
        Ok(to_rows(rows))
    }

    async fn room_messages(
        &self,
        room_id: i64,
        limit: i64,
    ) -> Result<Vec<MessageRow>, RelayError> {
        let mut conn = self.pool.get().await?;
        let rows: Vec<HistoryTuple> = diesel_async::RunQueryDsl::load(
            room_messages::table
                .inner_join(users::table)
                .filter(room_messages::room_id.eq(room_id))
                .order(room_messages::created_at.desc())
                .limit(limit)
                .select((
                    room_messages::id,
                    room_messages::content,
                    room_messages::user_id,
                    users::username,
                    room_messages::created_at,
                )),
            &mut conn,
        )
        .await?;
        Ok(to_rows(rows))
    }

    async fn direct_messages(
        &self,
        conversation_id: i64,
        limit: i64,
    ) -> Result<Vec<MessageRow>, RelayError> {
        let mut conn = self.pool.get().await?;
        let rows: Vec<HistoryTuple> = diesel_async::RunQueryDsl::load(
            direct_messages::table
                .inner_join(users::table)
                .filter(direct_messages::conversation_id.eq(conversation_id))
                .order(direct_messages::created_at.desc())
                .limit(limit)
                .select((
                    direct_messages::id,
                    direct_messages::content,
                    direct_messages::sender_id,
                    users::username,
                    direct_messages::created_at,
                )),
            &mut conn,
        )
        .await?;
        Ok(to_rows(rows))
    }

    async fn group_messages(
        &self,
        group_id: i64,
        limit: i64,
    ) -> Result<Vec<MessageRow>, RelayError> {
        let mut conn = self.pool.get().await?;
        let rows: Vec<HistoryTuple> = diesel_async::RunQueryDsl::load(
            group_messages::table
                .inner_join(users::table)
                .filter(group_messages::group_id.eq(group_id))
                .order(group_messages::created_at.desc())
                .limit(limit)
                .select((
                    group_messages::id,
                    group_messages::content,
                    group_messages::sender_id,
                    users::username,
                    group_messages::created_at,
                )),
            &mut conn,
        )
        .await?;
        Ok(to_rows(rows))
    }

    async fn get_or_create_conversation(
        &self,
        user_a: i64,
        user_b: i64,
    ) -> Result<Conversation, RelayError> {
        let mut conn = self.pool.get().await?;

        let existing = diesel_async::RunQueryDsl::get_result(
            conversations::table
                .filter(conversations::user_a.eq(user_a))
                .filter(conversations::user_b.eq(user_b))
                .select(Conversation::as_select()),
            &mut conn,
        )
        .await
        .optional()?;
        if let Some(conversation) = existing {
            return Ok(conversation);
        }

        // Racing creators: the loser's insert hits the unique pair constraint
        // and returns no row; the winner's row is then read back.
        let inserted = diesel_async::RunQueryDsl::get_result(
            diesel::insert_into(conversations::table)
                .values(NewConversation {
                    user_a,
                    user_b,
                    created_at: Utc::now(),
                })
                .on_conflict((conversations::user_a, conversations::user_b))
                .do_nothing()
                .returning(Conversation::as_returning()),
            &mut conn,
        )
        .await
        .optional()?;
        if let Some(conversation) = inserted {
            return Ok(conversation);
        }

        let conversation = diesel_async::RunQueryDsl::get_result(
            conversations::table
                .filter(conversations::user_a.eq(user_a))
                .filter(conversations::user_b.eq(user_b))
                .select(Conversation::as_select()),
            &mut conn,
        )
        .await?;
        Ok(conversation)
    }

    async fn conversation_by_id(&self, id: i64) -> Result<Option<Conversation>, RelayError> {
        let mut conn = self.pool.get().await?;
        let conversation = diesel_async::RunQueryDsl::get_result(
            conversations::table
                .find(id)
                .select(Conversation::as_select()),
            &mut conn,
        )
        .await
        .optional()?;
        Ok(conversation)
    }

    async fn conversations_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<ConversationSummary>, RelayError> {
        let mut conn = self.pool.get().await?;
        let mine: Vec<Conversation> = diesel_async::RunQueryDsl::load(
            conversations::table
                .filter(
                    conversations::user_a
                        .eq(user_id)
                        .or(conversations::user_b.eq(user_id)),
                )
                .order(conversations::created_at.desc())
                .select(Conversation::as_select()),
            &mut conn,
        )
        .await?;

        let other_ids: Vec<i64> = mine.iter().map(|c| c.other_participant(user_id)).collect();
        let names: Vec<(i64, String)> = diesel_async::RunQueryDsl::load(
            users::table
                .filter(users::id.eq_any(&other_ids))
                .select((users::id, users::username)),
            &mut conn,
        )
        .await?;

        Ok(mine
            .into_iter()
            .map(|c| {
                let other = c.other_participant(user_id);
                ConversationSummary {
                    id: c.id,
                    other_user_id: other,
                    other_username: names
                        .iter()
                        .find(|(id, _)| *id == other)
                        .map(|(_, name)| name.clone())
                        .unwrap_or_default(),
                    created_at: c.created_at,
                }
            })
            .collect())
    }

    async fn create_group(&self, name: &str, creator_id: i64) -> Result<Group, RelayError> {
        let mut conn = self.pool.get().await?;
        let now = Utc::now();
        let group = conn
            .transaction::<Group, diesel::result::Error, _>(|conn| {
                async move {
                    let group: Group = diesel_async::RunQueryDsl::get_result(
                        diesel::insert_into(chat_groups::table)
                            .values(NewGroup {
                                name,
                                created_by: creator_id,
                                created_at: now,
                            })
                            .returning(Group::as_returning()),
                        conn,
                    )
                    .await?;

                    diesel_async::RunQueryDsl::execute(
                        diesel::insert_into(group_members::table).values(NewGroupMember {
                            group_id: group.id,
                            user_id: creator_id,
                            is_admin: true,
                            created_at: now,
                        }),
                        conn,
                    )
                    .await?;

                    Ok(group)
                }
                .scope_boxed()
            })
            .await?;
        Ok(group)
    }

    async fn group_by_id(&self, id: i64) -> Result<Option<Group>, RelayError> {
        let mut conn = self.pool.get().await?;
        let group = diesel_async::RunQueryDsl::get_result(
            chat_groups::table.find(id).select(Group::as_select()),
            &mut conn,
        )
        .await
        .optional()?;
        Ok(group)
    }

    async fn groups_for_user(&self, user_id: i64) -> Result<Vec<GroupSummary>, RelayError> {
        let mut conn = self.pool.get().await?;
        let rows: Vec<(i64, String, bool, DateTime<Utc>)> = diesel_async::RunQueryDsl::load(
            group_members::table
                .inner_join(chat_groups::table)
                .filter(group_members::user_id.eq(user_id))
                .order(chat_groups::created_at.desc())
                .select((
                    chat_groups::id,
                    chat_groups::name,
                    group_members::is_admin,
                    chat_groups::created_at,
                )),
            &mut conn,
        )
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, name, is_admin, created_at)| GroupSummary {
                id,
                name,
                is_admin,
                created_at,
            })
            .collect())
    }

    async fn is_group_member(&self, group_id: i64, user_id: i64) -> Result<bool, RelayError> {
        let mut conn = self.pool.get().await?;
        let present: bool = diesel_async::RunQueryDsl::get_result(
            diesel::select(diesel::dsl::exists(
                group_members::table
                    .filter(group_members::group_id.eq(group_id))
                    .filter(group_members::user_id.eq(user_id)),
            )),
            &mut conn,
        )
        .await?;
        Ok(present)
    }

    async fn is_group_admin(&self, group_id: i64, user_id: i64) -> Result<bool, RelayError> {
        let mut conn = self.pool.get().await?;
        let present: bool = diesel_async::RunQueryDsl::get_result(
            diesel::select(diesel::dsl::exists(
                group_members::table
                    .filter(group_members::group_id.eq(group_id))
                    .filter(group_members::user_id.eq(user_id))
                    .filter(group_members::is_admin.eq(true)),
            )),
            &mut conn,
        )
        .await?;
        Ok(present)
    }

    async fn group_member_ids(&self, group_id: i64) -> Result<Vec<i64>, RelayError> {
        let mut conn = self.pool.get().await?;
        let ids = diesel_async::RunQueryDsl::load(
            group_members::table
                .filter(group_members::group_id.eq(group_id))
                .select(group_members::user_id),
            &mut conn,
        )
        .await?;
        Ok(ids)
    }

    async fn group_members(&self, group_id: i64) -> Result<Vec<GroupMember>, RelayError> {
        let mut conn = self.pool.get().await?;
        let rows: Vec<(i64, String, bool)> = diesel_async::RunQueryDsl::load(
            group_members::table
                .inner_join(users::table)
                .filter(group_members::group_id.eq(group_id))
                .order(users::username.asc())
                .select((group_members::user_id, users::username, group_members::is_admin)),
            &mut conn,
        )
        .await?;
        Ok(rows
            .into_iter()
            .map(|(user_id, username, is_admin)| GroupMember {
                user_id,
                username,
                is_admin,
            })
            .collect())
    }

    async fn add_group_member(&self, group_id: i64, user_id: i64) -> Result<(), RelayError> {
        let mut conn = self.pool.get().await?;
        diesel_async::RunQueryDsl::execute(
            diesel::insert_into(group_members::table).values(NewGroupMember {
                group_id,
                user_id,
                is_admin: false,
                created_at: Utc::now(),
            }),
            &mut conn,
        )
        .await?;
        Ok(())
    }

    async fn remove_group_member(
        &self,
        group_id: i64,
        user_id: i64,
    ) -> Result<bool, RelayError> {
        let mut conn = self.pool.get().await?;
        let deleted = diesel_async::RunQueryDsl::execute(
            diesel::delete(
                group_members::table
                    .filter(group_members::group_id.eq(group_id))
                    .filter(group_members::user_id.eq(user_id)),
            ),
            &mut conn,
        )
        .await?;
        Ok(deleted > 0)
    }
}

//! User search and direct-conversation endpoints.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiErrorBody, RelayError};
use crate::models::conversation::ConversationSummary;
use crate::models::message::MessageRow;
use crate::models::user::UserSummary;
use crate::AppState;

const SEARCH_LIMIT: i64 = 20;
const HISTORY_LIMIT: i64 = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(search_users))
        .route("/conversations", get(list_conversations))
        .route(
            "/conversations/{conversation_id}/messages",
            get(list_conversation_messages),
        )
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "Direct",
    params(("q" = String, Query, description = "Username substring")),
    responses((status = 200, description = "Matching users", body = [UserSummary])),
    security(("bearer" = [])),
)]
pub async fn search_users(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<UserSummary>>, RelayError> {
    let query = params.q.trim();
    if query.is_empty() {
        return Ok(Json(Vec::new()));
    }
    let mut found = state.store.search_users(query, SEARCH_LIMIT).await?;
    found.retain(|u| u.id != identity.user_id);
    Ok(Json(found))
}

#[utoipa::path(
    get,
    path = "/api/v1/conversations",
    tag = "Direct",
    responses((status = 200, description = "The caller's conversations", body = [ConversationSummary])),
    security(("bearer" = [])),
)]
pub async fn list_conversations(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ConversationSummary>>, RelayError> {
    let conversations = state.store.conversations_for_user(identity.user_id).await?;
    Ok(Json(conversations))
}

#[utoipa::path(
    get,
    path = "/api/v1/conversations/{conversation_id}/messages",
    tag = "Direct",
    params(("conversation_id" = i64, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Conversation history", body = [MessageRow]),
        (status = 403, description = "Not a participant", body = ApiErrorBody),
    ),
    security(("bearer" = [])),
)]
pub async fn list_conversation_messages(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
) -> Result<Json<Vec<MessageRow>>, RelayError> {
    let conversation = state
        .store
        .conversation_by_id(conversation_id)
        .await?
        .ok_or_else(|| RelayError::not_found("Conversation not found"))?;

    if !conversation.involves(identity.user_id) {
        return Err(RelayError::forbidden("Not a participant"));
    }

    let rows = state
        .store
        .direct_messages(conversation_id, HISTORY_LIMIT)
        .await?;
    Ok(Json(rows))
}

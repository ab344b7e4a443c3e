//! Group management endpoints. Roster changes go through the membership
//! synchronizer so live sessions hear about them.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiErrorBody, RelayError};
use crate::models::group::{Group, GroupMember, GroupSummary};
use crate::models::message::MessageRow;
use crate::AppState;

const HISTORY_LIMIT: i64 = 50;
const MAX_GROUP_NAME_LEN: usize = 64;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/groups", get(list_groups).post(create_group))
        .route("/groups/{group_id}/members", get(list_members).post(add_member))
        .route("/groups/{group_id}/members/{user_id}", delete(remove_member))
        .route("/groups/{group_id}/messages", get(list_group_messages))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateGroupRequest {
    pub name: String,
    /// Users added alongside the creator. Unknown ids are rejected.
    #[serde(default)]
    pub member_ids: Vec<i64>,
}

#[utoipa::path(
    post,
    path = "/api/v1/groups",
    tag = "Groups",
    request_body = CreateGroupRequest,
    responses(
        (status = 201, description = "Group created", body = Group),
        (status = 404, description = "Unknown initial member", body = ApiErrorBody),
    ),
    security(("bearer" = [])),
)]
pub async fn create_group(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<Group>), RelayError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(RelayError::validation("Group name is required"));
    }
    if name.len() > MAX_GROUP_NAME_LEN {
        return Err(RelayError::validation(format!(
            "Group name must be {MAX_GROUP_NAME_LEN} characters or fewer"
        )));
    }

    for member_id in &body.member_ids {
        if state.store.user_by_id(*member_id).await?.is_none() {
            return Err(RelayError::not_found(format!("User {member_id} not found")));
        }
    }

    let group = state.store.create_group(name, identity.user_id).await?;

    for member_id in body.member_ids {
        if member_id == identity.user_id {
            continue;
        }
        state
            .membership
            .add_member(group.id, member_id, identity.user_id)
            .await?;
    }

    tracing::info!(group_id = group.id, created_by = identity.user_id, "group created");

    Ok((StatusCode::CREATED, Json(group)))
}

#[utoipa::path(
    get,
    path = "/api/v1/groups",
    tag = "Groups",
    responses((status = 200, description = "The caller's groups", body = [GroupSummary])),
    security(("bearer" = [])),
)]
pub async fn list_groups(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<GroupSummary>>, RelayError> {
    let groups = state.store.groups_for_user(identity.user_id).await?;
    Ok(Json(groups))
}

#[utoipa::path(
    get,
    path = "/api/v1/groups/{group_id}/members",
    tag = "Groups",
    params(("group_id" = i64, Path, description = "Group id")),
    responses(
        (status = 200, description = "Group roster", body = [GroupMember]),
        (status = 403, description = "Not a member", body = ApiErrorBody),
    ),
    security(("bearer" = [])),
)]
pub async fn list_members(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
) -> Result<Json<Vec<GroupMember>>, RelayError> {
    state
        .channels
        .resolve_group(group_id, identity.user_id)
        .await?;
    let members = state.store.group_members(group_id).await?;
    Ok(Json(members))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddMemberRequest {
    pub user_id: i64,
}

#[utoipa::path(
    post,
    path = "/api/v1/groups/{group_id}/members",
    tag = "Groups",
    params(("group_id" = i64, Path, description = "Group id")),
    request_body = AddMemberRequest,
    responses(
        (status = 200, description = "Refreshed roster", body = [GroupMember]),
        (status = 403, description = "Requester is not an admin", body = ApiErrorBody),
    ),
    security(("bearer" = [])),
)]
pub async fn add_member(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
    Json(body): Json<AddMemberRequest>,
) -> Result<Json<Vec<GroupMember>>, RelayError> {
    let members = state
        .membership
        .add_member(group_id, body.user_id, identity.user_id)
        .await?;
    Ok(Json(members))
}

#[utoipa::path(
    delete,
    path = "/api/v1/groups/{group_id}/members/{user_id}",
    tag = "Groups",
    params(
        ("group_id" = i64, Path, description = "Group id"),
        ("user_id" = i64, Path, description = "Member to remove"),
    ),
    responses(
        (status = 200, description = "Refreshed roster", body = [GroupMember]),
        (status = 403, description = "Neither self nor admin", body = ApiErrorBody),
    ),
    security(("bearer" = [])),
)]
pub async fn remove_member(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path((group_id, user_id)): Path<(i64, i64)>,
) -> Result<Json<Vec<GroupMember>>, RelayError> {
    let members = state
        .membership
        .remove_member(group_id, user_id, identity.user_id)
        .await?;
    Ok(Json(members))
}

#[utoipa::path(
    get,
    path = "/api/v1/groups/{group_id}/messages",
    tag = "Groups",
    params(("group_id" = i64, Path, description = "Group id")),
    responses(
        (status = 200, description = "Group history", body = [MessageRow]),
        (status = 403, description = "Not a member", body = ApiErrorBody),
    ),
    security(("bearer" = [])),
)]
pub async fn list_group_messages(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
) -> Result<Json<Vec<MessageRow>>, RelayError> {
    state
        .channels
        .resolve_group(group_id, identity.user_id)
        .await?;
    let rows = state.store.group_messages(group_id, HISTORY_LIMIT).await?;
    Ok(Json(rows))
}

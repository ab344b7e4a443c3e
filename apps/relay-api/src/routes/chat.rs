//! Global-feed and room history endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiErrorBody, RelayError};
use crate::models::message::MessageRow;
use crate::models::room::Room;
use crate::AppState;

const DEFAULT_HISTORY_LIMIT: i64 = 50;
const MAX_HISTORY_LIMIT: i64 = 200;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/messages", get(list_messages))
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/{room_id}/messages", get(list_room_messages))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
}

fn clamp_limit(params: &HistoryParams) -> i64 {
    params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT)
}

#[utoipa::path(
    get,
    path = "/api/v1/messages",
    tag = "Chat",
    responses((status = 200, description = "Recent global messages", body = [MessageRow])),
    security(("bearer" = [])),
)]
pub async fn list_messages(
    AuthUser(_): AuthUser,
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<MessageRow>>, RelayError> {
    let rows = state.store.recent_messages(clamp_limit(&params)).await?;
    Ok(Json(rows))
}

#[utoipa::path(
    get,
    path = "/api/v1/rooms",
    tag = "Chat",
    responses((status = 200, description = "All rooms", body = [Room])),
    security(("bearer" = [])),
)]
pub async fn list_rooms(
    AuthUser(_): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Room>>, RelayError> {
    let rooms = state.store.list_rooms().await?;
    Ok(Json(rooms))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRoomRequest {
    pub name: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/rooms",
    tag = "Chat",
    request_body = CreateRoomRequest,
    responses(
        (status = 201, description = "Room created", body = Room),
        (status = 409, description = "Room already exists", body = ApiErrorBody),
    ),
    security(("bearer" = [])),
)]
pub async fn create_room(
    AuthUser(_): AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<Room>), RelayError> {
    let name = state.channels.normalize_room_name(&body.name)?;
    if state.store.room_by_name(&name).await?.is_some() {
        return Err(RelayError::conflict("Room already exists"));
    }
    let room = state.store.create_room(&name).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

#[utoipa::path(
    get,
    path = "/api/v1/rooms/{room_id}/messages",
    tag = "Chat",
    params(("room_id" = i64, Path, description = "Room id")),
    responses(
        (status = 200, description = "Room history", body = [MessageRow]),
        (status = 404, description = "Room not found", body = ApiErrorBody),
    ),
    security(("bearer" = [])),
)]
pub async fn list_room_messages(
    AuthUser(_): AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<MessageRow>>, RelayError> {
    if state.store.room_by_id(room_id).await?.is_none() {
        return Err(RelayError::not_found("Room not found"));
    }
    let rows = state
        .store
        .room_messages(room_id, clamp_limit(&params))
        .await?;
    Ok(Json(rows))
}

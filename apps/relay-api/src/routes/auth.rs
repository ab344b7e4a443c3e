//! Auth routes: register, login, and current-user lookup.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::auth::password::{self, MIN_PASSWORD_LEN};
use crate::error::{ApiErrorBody, RelayError};
use crate::models::user::UserSummary;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserSummary,
    pub token: String,
}

fn validate_credentials(body: &CredentialsRequest) -> Result<(String, &str), RelayError> {
    let username = body.username.trim();
    if username.is_empty() {
        return Err(RelayError::validation("Username is required"));
    }
    if body.password.len() < MIN_PASSWORD_LEN {
        return Err(RelayError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    Ok((username.to_string(), &body.password))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "Auth",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "User created", body = AuthResponse),
        (status = 409, description = "Username already taken", body = ApiErrorBody),
    ),
)]
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), RelayError> {
    let (username, plain) = validate_credentials(&body)?;

    if state.store.user_by_username(&username).await?.is_some() {
        return Err(RelayError::conflict("Username already taken"));
    }

    let hash = password::hash_password(plain);
    let user = state.store.create_user(&username, &hash).await?;
    let token = state.tokens.issue(user.id, &user.username)?;

    tracing::info!(user_id = user.id, username = %user.username, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: UserSummary {
                id: user.id,
                username: user.username,
            },
            token,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "Auth",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ApiErrorBody),
    ),
)]
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequest>,
) -> Result<Json<AuthResponse>, RelayError> {
    let username = body.username.trim();

    let user = state
        .store
        .user_by_username(username)
        .await?
        .ok_or_else(|| RelayError::unauthorized("Invalid username or password"))?;

    if !password::verify_password(&body.password, &user.password_hash) {
        return Err(RelayError::unauthorized("Invalid username or password"));
    }

    let token = state.tokens.issue(user.id, &user.username)?;

    Ok(Json(AuthResponse {
        user: UserSummary {
            id: user.id,
            username: user.username,
        },
        token,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user", body = UserSummary),
        (status = 401, description = "Not authenticated", body = ApiErrorBody),
    ),
    security(("bearer" = [])),
)]
pub async fn me(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserSummary>, RelayError> {
    let user = state
        .store
        .user_by_id(identity.user_id)
        .await?
        .ok_or_else(|| RelayError::not_found("User not found"))?;

    Ok(Json(UserSummary {
        id: user.id,
        username: user.username,
    }))
}

pub mod auth;
pub mod chat;
pub mod direct;
pub mod groups;
pub mod health;

use axum::Router;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::gateway::server::router())
        .nest(
            "/api/v1",
            auth::router()
                .merge(chat::router())
                .merge(direct::router())
                .merge(groups::router()),
        )
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health,
        // Auth
        auth::register,
        auth::login,
        auth::me,
        // Chat
        chat::list_messages,
        chat::list_rooms,
        chat::create_room,
        chat::list_room_messages,
        // Direct
        direct::search_users,
        direct::list_conversations,
        direct::list_conversation_messages,
        // Groups
        groups::create_group,
        groups::list_groups,
        groups::list_members,
        groups::add_member,
        groups::remove_member,
        groups::list_group_messages,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            // Models
            crate::models::user::User,
            crate::models::user::UserSummary,
            crate::models::room::Room,
            crate::models::message::MessageRow,
            crate::models::conversation::Conversation,
            crate::models::conversation::ConversationSummary,
            crate::models::group::Group,
            crate::models::group::GroupMember,
            crate::models::group::GroupSummary,
            // Route request/response types
            health::HealthResponse,
            auth::CredentialsRequest,
            auth::AuthResponse,
            chat::CreateRoomRequest,
            groups::CreateGroupRequest,
            groups::AddMemberRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Auth", description = "Authentication"),
        (name = "Chat", description = "Global feed and rooms"),
        (name = "Direct", description = "Direct conversations"),
        (name = "Groups", description = "Group management"),
    )
)]
pub struct ApiDoc;

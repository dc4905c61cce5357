pub mod auth;
pub mod chat;
pub mod health;
pub mod users;

use axum::Router;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::chat::server::router())
        .merge(chat::router())
        .merge(users::router())
        .nest("/api", auth::router())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(
                    crate::auth::session::SESSION_COOKIE,
                ))),
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
        auth::logout,
        auth::session,
        // Chat
        chat::history,
        chat::count,
        // Users
        users::list_users,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            // Models
            crate::models::message::ChatMessage,
            crate::models::message::HistoryEntry,
            // Route request/response types
            health::HealthResponse,
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::UserResponse,
            chat::CountResponse,
            users::UserSummary,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Auth", description = "Registration and cookie sessions"),
        (name = "Chat", description = "Direct message history"),
        (name = "Users", description = "User listing with presence"),
    )
)]
pub struct ApiDoc;

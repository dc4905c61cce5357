//! Chat sidebar listing: every other user, with presence and the last
//! exchanged message.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/users", get(list_users))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserSummary {
    pub id: String,
    pub nickname: String,
    pub online: bool,
    /// Content of the most recent message exchanged with this user, if any.
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
}

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    responses(
        (status = 200, description = "All other users with presence and last message", body = Vec<UserSummary>),
        (status = 401, description = "Missing or invalid session", body = ApiErrorBody),
    ),
)]
pub async fn list_users(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let users = state.users.list_except(&user_id).await?;

    let mut summaries = Vec::with_capacity(users.len());
    for user in users {
        let last = state.messages.last_message(&user_id, &user.id).await?;
        summaries.push(UserSummary {
            online: state.registry.is_online(&user.id),
            id: user.id,
            nickname: user.nickname,
            last_message: last.as_ref().map(|m| m.content.clone()),
            last_message_at: last.map(|m| m.created_at),
        });
    }

    Ok(Json(summaries))
}

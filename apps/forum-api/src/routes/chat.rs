//! Conversation history and count endpoints.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody};
use crate::models::message::HistoryEntry;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/chat/history", get(history))
        .route("/api/chat/count", get(count))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// The other participant of the conversation.
    pub with: Option<String>,
    /// Window size, clamped to [0, 100].
    pub limit: Option<i64>,
    /// Offset back from the most recent message.
    pub offset: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/chat/history",
    tag = "Chat",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Messages in the window, oldest first", body = Vec<HistoryEntry>),
        (status = 400, description = "Missing `with` parameter", body = ApiErrorBody),
        (status = 401, description = "Missing or invalid session", body = ApiErrorBody),
    ),
)]
pub async fn history(
    AuthUser { user_id }: AuthUser,
    Query(query): Query<HistoryQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let Some(with) = query.with.filter(|w| !w.is_empty()) else {
        return Err(ApiError::bad_request("Missing with query parameter"));
    };

    let limit = query.limit.unwrap_or(10);
    let offset = query.offset.unwrap_or(0).max(0);

    let entries = state
        .messages
        .history(&user_id, &with, limit, offset)
        .await?;

    Ok(Json(entries))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CountResponse {
    pub count: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CountQuery {
    /// The other participant of the conversation.
    pub with: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/chat/count",
    tag = "Chat",
    params(CountQuery),
    responses(
        (status = 200, description = "Total messages in the conversation", body = CountResponse),
        (status = 400, description = "Missing `with` parameter", body = ApiErrorBody),
        (status = 401, description = "Missing or invalid session", body = ApiErrorBody),
    ),
)]
pub async fn count(
    AuthUser { user_id }: AuthUser,
    Query(query): Query<CountQuery>,
    State(state): State<AppState>,
) -> Result<Json<CountResponse>, ApiError> {
    let Some(with) = query.with.filter(|w| !w.is_empty()) else {
        return Err(ApiError::bad_request("Missing with query parameter"));
    };

    let count = state.messages.count(&user_id, &with).await?;

    Ok(Json(CountResponse { count }))
}

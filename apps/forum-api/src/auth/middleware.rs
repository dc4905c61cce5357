//! Session-cookie extraction middleware.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;

use crate::auth::session::SESSION_COOKIE;
use crate::AppState;

/// Authenticated user extracted from the `session_token` cookie.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

/// Rejection returned when the session cookie is missing or invalid.
pub struct AuthError {
    message: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": "UNAUTHORIZED",
                "message": self.message
            }
        });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);

        let token = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()).ok_or(
            AuthError {
                message: "Missing session cookie",
            },
        )?;

        let user_id = state.sessions.resolve(&token).ok_or(AuthError {
            message: "Invalid or expired session",
        })?;

        Ok(AuthUser { user_id })
    }
}

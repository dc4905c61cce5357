//! Auth routes: registration, cookie login/logout, and session check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use forum_common::id::{prefix, prefixed_ulid};

use crate::auth::middleware::AuthUser;
use crate::auth::session::{SESSION_COOKIE, SESSION_TTL};
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::models::user::{NewUser, User};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/session", get(session))
}

/// Public view of a user. Never carries the password hash.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub nickname: String,
    pub email: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            nickname: user.nickname,
            email: user.email,
        }
    }
}

// ---------------------------------------------------------------------------
// POST /api/register
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub nickname: String,
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = UserResponse),
        (status = 400, description = "Validation failed", body = ApiErrorBody),
        (status = 409, description = "Nickname or email already taken", body = ApiErrorBody),
    ),
)]
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let mut errors: Vec<FieldError> = Vec::new();

    // Nickname: 2-32 chars, alphanumeric + _ . -
    let nickname = body.nickname.trim().to_string();
    if nickname.len() < 2 || nickname.len() > 32 {
        errors.push(FieldError {
            field: "nickname".into(),
            message: "Nickname must be 2-32 characters".into(),
        });
    } else if !nickname
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
    {
        errors.push(FieldError {
            field: "nickname".into(),
            message: "Nickname may only contain letters, digits, underscores, dots, and hyphens"
                .into(),
        });
    }

    // Email: basic shape check.
    let email = body.email.trim().to_lowercase();
    if !email.contains('@') || email.len() < 3 {
        errors.push(FieldError {
            field: "email".into(),
            message: "Invalid email address".into(),
        });
    }

    if body.password.len() < 8 {
        errors.push(FieldError {
            field: "password".into(),
            message: "Password must be at least 8 characters".into(),
        });
    }

    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let password_hash = hash_password(&body.password)?;

    let user = state
        .users
        .create(NewUser {
            id: prefixed_ulid(prefix::USER),
            nickname,
            email,
            password_hash,
            first_name: body.first_name,
            last_name: body.last_name,
            age: body.age,
            gender: body.gender,
        })
        .await?;

    tracing::info!(user_id = %user.id, nickname = %user.nickname, "user registered");

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Hash a password using Argon2id with a random salt.
fn hash_password(password: &str) -> Result<String, ApiError> {
    use argon2::Argon2;
    use password_hash::rand_core::OsRng;
    use password_hash::{PasswordHasher, SaltString};

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| {
            tracing::error!(?e, "password hashing failed");
            ApiError::internal("Failed to process password")
        })
}

fn verify_password(password: &str, password_hash: &str) -> Result<(), ApiError> {
    use argon2::Argon2;
    use password_hash::{PasswordHash, PasswordVerifier};

    let parsed = PasswordHash::new(password_hash).map_err(|e| {
        tracing::error!(?e, "stored password hash is malformed");
        ApiError::internal("Failed to verify password")
    })?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| ApiError::unauthorized("Invalid credentials"))
}

// ---------------------------------------------------------------------------
// POST /api/login
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Nickname or email.
    pub identifier: String,
    pub password: String,
}

#[utoipa::path(
    post,
    path = "/api/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful; session cookie set", body = UserResponse),
        (status = 401, description = "Invalid credentials", body = ApiErrorBody),
    ),
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<UserResponse>), ApiError> {
    let user = state
        .users
        .find_by_identifier(body.identifier.trim())
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    verify_password(&body.password, &user.password_hash)?;

    let token = state.sessions.create(&user.id);

    tracing::info!(user_id = %user.id, "session created");

    // The advertised max-age is the same TTL the session store enforces.
    let cookie = Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .path("/")
        .max_age(time::Duration::seconds(SESSION_TTL.as_secs() as i64))
        .build();

    Ok((jar.add(cookie), Json(user.into())))
}

// ---------------------------------------------------------------------------
// POST /api/logout
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/logout",
    tag = "Auth",
    responses((status = 204, description = "Session destroyed (idempotent)")),
)]
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, StatusCode) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.destroy(cookie.value());
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/").build());
    (jar, StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// GET /api/session
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/session",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Missing or invalid session", body = ApiErrorBody),
    ),
)]
pub async fn session(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .users
        .get(&user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Session user no longer exists"))?;

    Ok(Json(user.into()))
}

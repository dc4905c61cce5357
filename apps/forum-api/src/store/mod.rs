//! Persistence traits for the messaging subsystem.
//!
//! Backed by Postgres in production and an in-memory backend in tests,
//! following the same trait-object pattern as the rest of the state in
//! `AppState`.

pub mod memory;
pub mod pg;

use async_trait::async_trait;

use crate::error::{ApiError, FieldError};
use crate::models::message::{ChatMessage, HistoryEntry};
use crate::models::user::{NewUser, User};

/// Maximum accepted message length, in bytes.
pub const MAX_CONTENT_LEN: usize = 4000;

/// Upper bound on a single history page.
pub const MAX_HISTORY_LIMIT: i64 = 100;

/// Canonical key for the unordered pair of participants.
///
/// Both directions of a conversation map to the same key, so per-pair
/// sequence numbers and history queries share one scope.
pub fn conversation_key(user_a: &str, user_b: &str) -> String {
    if user_a <= user_b {
        format!("{user_a}:{user_b}")
    } else {
        format!("{user_b}:{user_a}")
    }
}

/// Validate and normalize message content before it is persisted.
pub(crate) fn validate_content(content: &str) -> Result<&str, ApiError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ApiError::validation(vec![FieldError {
            field: "content".to_string(),
            message: "Message content is required".to_string(),
        }]));
    }
    if content.len() > MAX_CONTENT_LEN {
        return Err(ApiError::validation(vec![FieldError {
            field: "content".to_string(),
            message: format!("Message content must be {MAX_CONTENT_LEN} characters or fewer"),
        }]));
    }
    Ok(content)
}

/// Durable, append-only store of direct messages with per-conversation
/// sequence numbers.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a new message. Assigns the identifier, timestamp, and the
    /// next sequence number for the pair as one atomic unit — two writers
    /// targeting the same conversation must never observe the same counter
    /// value.
    async fn append(
        &self,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> Result<ChatMessage, ApiError>;

    /// Messages exchanged between the pair, oldest first, windowed from the
    /// most-recent end: `offset = 0` is the latest `limit` messages,
    /// `offset = N` the `limit` messages immediately preceding those.
    /// Out-of-range windows yield an empty vec, never an error.
    async fn history(
        &self,
        user_a: &str,
        user_b: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<HistoryEntry>, ApiError>;

    /// Total number of messages exchanged between the pair.
    async fn count(&self, user_a: &str, user_b: &str) -> Result<i64, ApiError>;

    /// The most recent message between the pair, if any.
    async fn last_message(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Option<ChatMessage>, ApiError>;
}

/// User-identity collaborator: the messaging layer's view of the forum's
/// user table.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Insert a new user. Fails with a conflict error when the nickname or
    /// email is already taken.
    async fn create(&self, new_user: NewUser) -> Result<User, ApiError>;

    /// Look a user up by nickname or email.
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, ApiError>;

    async fn get(&self, user_id: &str) -> Result<Option<User>, ApiError>;

    /// All users except the given one, ordered by nickname.
    async fn list_except(&self, user_id: &str) -> Result<Vec<User>, ApiError>;
}

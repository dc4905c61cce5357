//! Postgres backend for the message store and user directory.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::OptionalExtension;
use diesel_async::{AsyncConnection, RunQueryDsl};
use scoped_futures::ScopedFutureExt;

use forum_common::id::{prefix, prefixed_ulid};

use crate::db::pool::DbPool;
use crate::db::schema::{messages, users};
use crate::error::ApiError;
use crate::models::message::{ChatMessage, HistoryEntry, MessageRow, NewMessageRow};
use crate::models::user::{NewUser, User};

use super::{
    conversation_key, validate_content, MessageStore, UserDirectory, MAX_HISTORY_LIMIT,
};

pub struct PgBackend {
    pool: DbPool,
}

impl PgBackend {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PgBackend {
    async fn append(
        &self,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> Result<ChatMessage, ApiError> {
        let content = validate_content(content)?.to_string();
        let key = conversation_key(sender_id, receiver_id);
        let sender_id = sender_id.to_string();
        let receiver_id = receiver_id.to_string();

        let mut conn = self.pool.get().await?;

        // One transaction per append. The advisory lock serializes writers
        // targeting the same conversation, so the max-scan and the insert
        // behave as a single atomic step; writers on other pairs proceed in
        // parallel.
        let row = conn
            .transaction::<MessageRow, ApiError, _>(|conn| {
                async move {
                    diesel::sql_query("SELECT pg_advisory_xact_lock(hashtext($1))")
                        .bind::<diesel::sql_types::Text, _>(key.clone())
                        .execute(conn)
                        .await?;

                    let max_seq: Option<i64> = messages::table
                        .filter(messages::conversation_key.eq(&key))
                        .select(diesel::dsl::max(messages::sequence))
                        .first(conn)
                        .await?;

                    let row: MessageRow = diesel::insert_into(messages::table)
                        .values(NewMessageRow {
                            id: prefixed_ulid(prefix::MESSAGE),
                            conversation_key: key.clone(),
                            sender_id,
                            receiver_id,
                            content,
                            sequence: max_seq.unwrap_or(0) + 1,
                            created_at: Utc::now(),
                        })
                        .returning(MessageRow::as_returning())
                        .get_result(conn)
                        .await?;

                    Ok(row)
                }
                .scope_boxed()
            })
            .await?;

        Ok(row.into())
    }

    async fn history(
        &self,
        user_a: &str,
        user_b: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<HistoryEntry>, ApiError> {
        let key = conversation_key(user_a, user_b);
        let limit = limit.clamp(0, MAX_HISTORY_LIMIT);
        let offset = offset.max(0);

        let mut conn = self.pool.get().await?;

        let rows: Vec<(MessageRow, String)> = messages::table
            .inner_join(users::table)
            .filter(messages::conversation_key.eq(&key))
            .order(messages::sequence.desc())
            .limit(limit)
            .offset(offset)
            .select((MessageRow::as_select(), users::nickname))
            .load(&mut conn)
            .await?;

        // Query order is newest-first for the window; present oldest-first.
        let mut entries: Vec<HistoryEntry> = rows
            .into_iter()
            .map(|(row, nickname)| HistoryEntry {
                message: row.into(),
                sender_name: nickname,
            })
            .collect();
        entries.reverse();

        Ok(entries)
    }

    async fn count(&self, user_a: &str, user_b: &str) -> Result<i64, ApiError> {
        let key = conversation_key(user_a, user_b);
        let mut conn = self.pool.get().await?;

        let count: i64 = messages::table
            .filter(messages::conversation_key.eq(&key))
            .count()
            .get_result(&mut conn)
            .await?;

        Ok(count)
    }

    async fn last_message(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Option<ChatMessage>, ApiError> {
        let key = conversation_key(user_a, user_b);
        let mut conn = self.pool.get().await?;

        let row: Option<MessageRow> = messages::table
            .filter(messages::conversation_key.eq(&key))
            .order(messages::sequence.desc())
            .select(MessageRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        Ok(row.map(Into::into))
    }
}

#[async_trait]
impl UserDirectory for PgBackend {
    async fn create(&self, new_user: NewUser) -> Result<User, ApiError> {
        let mut conn = self.pool.get().await?;

        let user: User = diesel::insert_into(users::table)
            .values(&new_user)
            .returning(User::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    ref info,
                ) => {
                    let constraint = info.constraint_name().unwrap_or("");
                    if constraint.contains("nickname") {
                        ApiError::conflict("Nickname is already taken")
                    } else if constraint.contains("email") {
                        ApiError::conflict("Email is already registered")
                    } else {
                        ApiError::conflict("A user with that information already exists")
                    }
                }
                other => ApiError::from(other),
            })?;

        Ok(user)
    }

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, ApiError> {
        let mut conn = self.pool.get().await?;

        let user: Option<User> = users::table
            .filter(users::nickname.eq(identifier).or(users::email.eq(identifier)))
            .select(User::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        Ok(user)
    }

    async fn get(&self, user_id: &str) -> Result<Option<User>, ApiError> {
        let mut conn = self.pool.get().await?;

        let user: Option<User> = users::table
            .find(user_id)
            .select(User::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        Ok(user)
    }

    async fn list_except(&self, user_id: &str) -> Result<Vec<User>, ApiError> {
        let mut conn = self.pool.get().await?;

        let users: Vec<User> = users::table
            .filter(users::id.ne(user_id))
            .order(users::nickname.asc())
            .select(User::as_select())
            .load(&mut conn)
            .await?;

        Ok(users)
    }
}

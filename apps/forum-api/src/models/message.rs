use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::schema::messages;

/// A persisted direct message. This is the shape carried on the WebSocket
/// wire in both directions and returned by the history endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Per-conversation monotonic counter, starting at 1.
    pub sequence: i64,
}

/// A history entry: the message plus its sender's display name.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub message: ChatMessage,
    pub sender_name: String,
}

/// Full message row from the database.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MessageRow {
    pub id: String,
    pub conversation_key: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub sequence: i64,
    pub created_at: DateTime<Utc>,
}

/// Insertable struct for persisting a new message.
#[derive(Debug, Insertable)]
#[diesel(table_name = messages)]
pub struct NewMessageRow {
    pub id: String,
    pub conversation_key: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub sequence: i64,
    pub created_at: DateTime<Utc>,
}

impl From<MessageRow> for ChatMessage {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            content: row.content,
            created_at: row.created_at,
            sequence: row.sequence,
        }
    }
}

//! In-memory backend implementing both store traits. Used by the test
//! suite; the sequence-number and pagination semantics here are the
//! reference behavior the Postgres backend must match.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use forum_common::id::{prefix, prefixed_ulid};

use crate::error::ApiError;
use crate::models::message::{ChatMessage, HistoryEntry};
use crate::models::user::{NewUser, User};

use super::{
    conversation_key, validate_content, MessageStore, UserDirectory, MAX_HISTORY_LIMIT,
};

pub struct MemoryBackend {
    users: Mutex<Vec<User>>,
    // Insertion order doubles as per-pair sequence order.
    messages: Mutex<Vec<ChatMessage>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(Vec::new()),
            messages: Mutex::new(Vec::new()),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for MemoryBackend {
    async fn append(
        &self,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> Result<ChatMessage, ApiError> {
        let content = validate_content(content)?;
        let key = conversation_key(sender_id, receiver_id);

        // Lock held across max-scan and push: the sequence computation and
        // the insert are one critical section.
        let mut messages = self.messages.lock();
        let next_seq = messages
            .iter()
            .filter(|m| conversation_key(&m.sender_id, &m.receiver_id) == key)
            .map(|m| m.sequence)
            .max()
            .unwrap_or(0)
            + 1;

        let message = ChatMessage {
            id: prefixed_ulid(prefix::MESSAGE),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
            sequence: next_seq,
        };
        messages.push(message.clone());

        Ok(message)
    }

    async fn history(
        &self,
        user_a: &str,
        user_b: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<HistoryEntry>, ApiError> {
        let key = conversation_key(user_a, user_b);
        let limit = limit.clamp(0, MAX_HISTORY_LIMIT) as usize;
        let offset = offset.max(0) as usize;

        let messages = self.messages.lock();
        let conversation: Vec<&ChatMessage> = messages
            .iter()
            .filter(|m| conversation_key(&m.sender_id, &m.receiver_id) == key)
            .collect();

        // Window [start, end) against the full ascending history, counted
        // back from the most-recent end and clamped into range.
        let end = conversation.len().saturating_sub(offset);
        let start = end.saturating_sub(limit);

        let users = self.users.lock();
        let entries = conversation[start..end]
            .iter()
            .map(|m| HistoryEntry {
                message: (*m).clone(),
                sender_name: users
                    .iter()
                    .find(|u| u.id == m.sender_id)
                    .map(|u| u.nickname.clone())
                    .unwrap_or_else(|| m.sender_id.clone()),
            })
            .collect();

        Ok(entries)
    }

    async fn count(&self, user_a: &str, user_b: &str) -> Result<i64, ApiError> {
        let key = conversation_key(user_a, user_b);
        let count = self
            .messages
            .lock()
            .iter()
            .filter(|m| conversation_key(&m.sender_id, &m.receiver_id) == key)
            .count();
        Ok(count as i64)
    }

    async fn last_message(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Option<ChatMessage>, ApiError> {
        let key = conversation_key(user_a, user_b);
        Ok(self
            .messages
            .lock()
            .iter()
            .filter(|m| conversation_key(&m.sender_id, &m.receiver_id) == key)
            .next_back()
            .cloned())
    }
}

#[async_trait]
impl UserDirectory for MemoryBackend {
    async fn create(&self, new_user: NewUser) -> Result<User, ApiError> {
        let mut users = self.users.lock();
        if users.iter().any(|u| u.nickname == new_user.nickname) {
            return Err(ApiError::conflict("Nickname is already taken"));
        }
        if users.iter().any(|u| u.email == new_user.email) {
            return Err(ApiError::conflict("Email is already registered"));
        }

        let user = User {
            id: new_user.id,
            nickname: new_user.nickname,
            email: new_user.email,
            password_hash: new_user.password_hash,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            age: new_user.age,
            gender: new_user.gender,
            created_at: Utc::now(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, ApiError> {
        Ok(self
            .users
            .lock()
            .iter()
            .find(|u| u.nickname == identifier || u.email == identifier)
            .cloned())
    }

    async fn get(&self, user_id: &str) -> Result<Option<User>, ApiError> {
        Ok(self.users.lock().iter().find(|u| u.id == user_id).cloned())
    }

    async fn list_except(&self, user_id: &str) -> Result<Vec<User>, ApiError> {
        let mut users: Vec<User> = self
            .users
            .lock()
            .iter()
            .filter(|u| u.id != user_id)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.nickname.cmp(&b.nickname));
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user(id: &str, nickname: &str) -> NewUser {
        NewUser {
            id: id.to_string(),
            nickname: nickname.to_string(),
            email: format!("{nickname}@example.com"),
            password_hash: "x".to_string(),
            first_name: None,
            last_name: None,
            age: None,
            gender: None,
        }
    }

    #[tokio::test]
    async fn append_assigns_gapless_sequences() {
        let store = MemoryBackend::new();

        let m1 = store.append("usr_a", "usr_b", "one").await.unwrap();
        let m2 = store.append("usr_b", "usr_a", "two").await.unwrap();
        let m3 = store.append("usr_a", "usr_b", "three").await.unwrap();

        assert_eq!(m1.sequence, 1);
        assert_eq!(m2.sequence, 2);
        assert_eq!(m3.sequence, 3);
        assert!(m1.id.starts_with("msg_"));
    }

    #[tokio::test]
    async fn sequences_are_scoped_per_pair() {
        let store = MemoryBackend::new();

        store.append("usr_a", "usr_b", "ab").await.unwrap();
        store.append("usr_a", "usr_b", "ab2").await.unwrap();
        let ac = store.append("usr_a", "usr_c", "ac").await.unwrap();

        // A different pair starts its own counter at 1.
        assert_eq!(ac.sequence, 1);
        assert_eq!(store.count("usr_a", "usr_b").await.unwrap(), 2);
        assert_eq!(store.count("usr_a", "usr_c").await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_never_duplicate_sequences() {
        use std::sync::Arc;

        let store = Arc::new(MemoryBackend::new());

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append("usr_a", "usr_b", &format!("m{i}"))
                    .await
                    .unwrap()
                    .sequence
            }));
        }

        let mut sequences = Vec::new();
        for handle in handles {
            sequences.push(handle.await.unwrap());
        }
        sequences.sort_unstable();

        // Twenty writers racing on one conversation still yield exactly
        // 1..=20, with no duplicates and no gaps.
        let expected: Vec<i64> = (1..=20).collect();
        assert_eq!(sequences, expected);
    }

    #[tokio::test]
    async fn append_rejects_empty_content() {
        let store = MemoryBackend::new();
        assert!(store.append("usr_a", "usr_b", "   ").await.is_err());
        assert_eq!(store.count("usr_a", "usr_b").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn history_is_oldest_first_and_joins_nicknames() {
        let store = MemoryBackend::new();
        store.create(test_user("usr_a", "alice")).await.unwrap();
        store.create(test_user("usr_b", "bob")).await.unwrap();

        store.append("usr_a", "usr_b", "hi").await.unwrap();
        store.append("usr_b", "usr_a", "hello").await.unwrap();

        let history = store.history("usr_a", "usr_b", 10, 0).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].message.content, "hi");
        assert_eq!(history[0].sender_name, "alice");
        assert_eq!(history[1].message.content, "hello");
        assert_eq!(history[1].sender_name, "bob");
    }

    #[tokio::test]
    async fn history_pages_backwards_from_most_recent() {
        let store = MemoryBackend::new();
        for i in 1..=5 {
            store
                .append("usr_a", "usr_b", &format!("m{i}"))
                .await
                .unwrap();
        }

        // offset=0: the two most recent, oldest first.
        let page = store.history("usr_a", "usr_b", 2, 0).await.unwrap();
        let contents: Vec<&str> = page.iter().map(|e| e.message.content.as_str()).collect();
        assert_eq!(contents, vec!["m4", "m5"]);

        // offset=2: the two immediately preceding.
        let page = store.history("usr_a", "usr_b", 2, 2).await.unwrap();
        let contents: Vec<&str> = page.iter().map(|e| e.message.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3"]);

        // Window partially off the old end gets clamped.
        let page = store.history("usr_a", "usr_b", 2, 4).await.unwrap();
        let contents: Vec<&str> = page.iter().map(|e| e.message.content.as_str()).collect();
        assert_eq!(contents, vec!["m1"]);

        // Fully out of range: empty, not an error.
        let page = store.history("usr_a", "usr_b", 2, 10).await.unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn history_empty_conversation_returns_empty() {
        let store = MemoryBackend::new();
        let page = store.history("usr_a", "usr_b", 5, 0).await.unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn last_message_returns_most_recent() {
        let store = MemoryBackend::new();
        assert!(store.last_message("usr_a", "usr_b").await.unwrap().is_none());

        store.append("usr_a", "usr_b", "first").await.unwrap();
        store.append("usr_b", "usr_a", "second").await.unwrap();

        let last = store.last_message("usr_a", "usr_b").await.unwrap().unwrap();
        assert_eq!(last.content, "second");
        assert_eq!(last.sequence, 2);
    }

    #[tokio::test]
    async fn duplicate_nickname_conflicts() {
        let store = MemoryBackend::new();
        store.create(test_user("usr_a", "alice")).await.unwrap();
        let err = store.create(test_user("usr_b", "alice")).await.unwrap_err();
        assert_eq!(err.code, "CONFLICT");
    }

    #[tokio::test]
    async fn list_except_orders_by_nickname() {
        let store = MemoryBackend::new();
        store.create(test_user("usr_c", "carol")).await.unwrap();
        store.create(test_user("usr_a", "alice")).await.unwrap();
        store.create(test_user("usr_b", "bob")).await.unwrap();

        let users = store.list_except("usr_a").await.unwrap();
        let nicknames: Vec<&str> = users.iter().map(|u| u.nickname.as_str()).collect();
        assert_eq!(nicknames, vec!["bob", "carol"]);
    }
}

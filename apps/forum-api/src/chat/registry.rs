//! Registry of live chat connections and the identity each represents.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::models::message::ChatMessage;

pub type ConnId = u64;

struct RegisteredConnection {
    user_id: String,
    /// Feeds the connection's writer task. The registry holds a handle to
    /// the transport, never the transport itself — the session handler owns
    /// the socket's lifetime.
    tx: mpsc::UnboundedSender<String>,
}

/// Shared map of open connections, guarded by a single lock.
///
/// A user may hold several entries at once (multi-device); presence is
/// "at least one entry". The lock is only ever held for map operations —
/// frame pushes go through non-blocking channels, and socket I/O happens
/// in each connection's own task.
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    inner: Mutex<HashMap<ConnId, RegisteredConnection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Add a connection for the user. Returns the id used to unregister it.
    pub fn register(&self, user_id: &str, tx: mpsc::UnboundedSender<String>) -> ConnId {
        let conn_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.lock().insert(
            conn_id,
            RegisteredConnection {
                user_id: user_id.to_string(),
                tx,
            },
        );
        conn_id
    }

    /// Remove a connection. Safe to call more than once.
    pub fn unregister(&self, conn_id: ConnId) {
        self.inner.lock().remove(&conn_id);
    }

    /// True iff at least one entry is registered for the user.
    pub fn is_online(&self, user_id: &str) -> bool {
        self.inner.lock().values().any(|c| c.user_id == user_id)
    }

    /// Number of open entries for the user.
    pub fn connection_count(&self, user_id: &str) -> usize {
        self.inner
            .lock()
            .values()
            .filter(|c| c.user_id == user_id)
            .count()
    }

    /// Deliver a persisted message to every entry belonging to either
    /// participant — the sender gets its own echo. Entries whose writer is
    /// gone are removed on the spot and never retried. Returns the number
    /// of entries the frame was handed to.
    pub fn fan_out(&self, message: &ChatMessage) -> usize {
        let frame = match serde_json::to_string(message) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(?e, message_id = %message.id, "failed to encode chat frame");
                return 0;
            }
        };

        let mut connections = self.inner.lock();
        let mut dead = Vec::new();
        let mut delivered = 0;

        for (&conn_id, conn) in connections.iter() {
            if conn.user_id == message.sender_id || conn.user_id == message.receiver_id {
                if conn.tx.send(frame.clone()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(conn_id);
                }
            }
        }

        for conn_id in dead {
            let removed = connections.remove(&conn_id);
            if let Some(conn) = removed {
                tracing::debug!(conn_id, user_id = %conn.user_id, "dropped dead chat connection");
            }
        }

        delivered
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

//! Broadcast dispatcher: a single consumer draining the queue of newly
//! persisted messages and fanning each one out to the connection registry.
//!
//! Producers (the per-connection read loops) only ever push onto an
//! unbounded channel, so persistence is never blocked by a slow consumer;
//! fan-out stays best-effort on the consumer side.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::models::message::ChatMessage;

use super::registry::ConnectionRegistry;

/// Cloneable producer handle. Stored in `AppState`; every chat session
/// pushes its persisted messages through this.
#[derive(Clone)]
pub struct ChatDispatcher {
    tx: mpsc::UnboundedSender<ChatMessage>,
}

impl ChatDispatcher {
    /// Create the dispatcher handle and the receiver for the consumer loop.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ChatMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue a persisted message for fan-out. Never blocks.
    pub fn dispatch(&self, message: ChatMessage) {
        if self.tx.send(message).is_err() {
            // Only possible if the consumer task is gone, i.e. shutdown.
            tracing::warn!("chat dispatcher is not running; dropping message");
        }
    }
}

/// The single consumer loop. Spawned once at startup; messages are fanned
/// out strictly in the order they were enqueued.
pub async fn run(mut rx: mpsc::UnboundedReceiver<ChatMessage>, registry: Arc<ConnectionRegistry>) {
    while let Some(message) = rx.recv().await {
        let delivered = registry.fan_out(&message);
        tracing::debug!(
            message_id = %message.id,
            sender_id = %message.sender_id,
            receiver_id = %message.receiver_id,
            delivered,
            "message fanned out"
        );
    }
    tracing::debug!("chat dispatcher stopped");
}

//! WebSocket upgrade handler and per-connection read loop.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::auth::middleware::AuthUser;
use crate::error::ApiError;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/chat", get(ws_upgrade))
}

#[derive(Debug, Deserialize)]
struct ChatQuery {
    sender_id: Option<String>,
}

/// Message-shaped inbound frame. The identifier, timestamp, and sequence
/// number are assigned at write time, so only these fields are read.
#[derive(Debug, Deserialize)]
struct InboundFrame {
    sender_id: String,
    receiver_id: String,
    content: String,
}

async fn ws_upgrade(
    _auth: AuthUser,
    Query(query): Query<ChatQuery>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    // Fail closed: no identity, no upgrade, no registry entry.
    let Some(sender_id) = query.sender_id.filter(|s| !s.is_empty()) else {
        return ApiError::bad_request("Missing sender_id query parameter").into_response();
    };

    ws.on_upgrade(move |socket| handle_connection(socket, state, sender_id))
        .into_response()
}

async fn handle_connection(socket: WebSocket, state: AppState, sender_id: String) {
    let (ws_tx, ws_rx) = socket.split();

    // The registry gets a channel to this connection's writer task, not the
    // socket itself.
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let conn_id = state.registry.register(&sender_id, tx);

    tracing::info!(conn_id, user_id = %sender_id, "chat connection opened");

    let writer = tokio::spawn(write_frames(ws_tx, rx));

    read_frames(ws_rx, &state, conn_id, &sender_id).await;

    // Unregistering drops the only sender, which lets the writer task flush
    // anything already queued and then stop.
    state.registry.unregister(conn_id);
    let _ = writer.await;

    tracing::info!(conn_id, user_id = %sender_id, "chat connection closed");
}

/// Blocking read loop: decode, persist, then hand off for fan-out.
async fn read_frames(
    mut ws_rx: SplitStream<WebSocket>,
    state: &AppState,
    conn_id: u64,
    sender_id: &str,
) {
    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                // Malformed input is fatal to this connection only.
                let inbound: InboundFrame = match serde_json::from_str(&text) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::debug!(?e, conn_id, "malformed chat frame; closing connection");
                        break;
                    }
                };

                // Frames must carry the identity this connection registered
                // with; anything else is a protocol violation.
                if inbound.sender_id != sender_id {
                    tracing::warn!(
                        conn_id,
                        claimed = %inbound.sender_id,
                        "frame sender does not match connection identity; closing connection"
                    );
                    break;
                }

                // Persistence precedes fan-out; a message that failed to
                // persist is never broadcast. A single failed write does
                // not end the session.
                match state
                    .messages
                    .append(&inbound.sender_id, &inbound.receiver_id, &inbound.content)
                    .await
                {
                    Ok(stored) => state.dispatcher.dispatch(stored),
                    Err(e) => {
                        tracing::error!(
                            code = %e.code,
                            message = %e.message,
                            conn_id,
                            "failed to persist chat message"
                        );
                    }
                }
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Binary(_)) => continue,
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::debug!(?e, conn_id, "ws read error");
                break;
            }
        }
    }
}

/// Writer task: forwards frames queued by the dispatcher to the socket.
async fn write_frames(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<String>,
) {
    while let Some(frame) = rx.recv().await {
        if ws_tx.send(Message::Text(frame.into())).await.is_err() {
            // Transport is gone; the dispatcher drops this entry on its
            // next failed push.
            break;
        }
    }
    let _ = ws_tx.close().await;
}

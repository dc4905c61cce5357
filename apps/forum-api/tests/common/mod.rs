#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use forum_api::auth::session::SessionStore;
use forum_api::chat::dispatch::{self, ChatDispatcher};
use forum_api::chat::registry::ConnectionRegistry;
use forum_api::config::Config;
use forum_api::store::memory::MemoryBackend;
use forum_api::store::{MessageStore, UserDirectory};
use forum_api::AppState;

/// Build a test AppState over the in-memory backend, with the dispatcher
/// consumer already running.
pub fn test_state() -> AppState {
    let backend = Arc::new(MemoryBackend::new());
    let users: Arc<dyn UserDirectory> = backend.clone();
    let messages: Arc<dyn MessageStore> = backend;

    let registry = Arc::new(ConnectionRegistry::new());
    let (dispatcher, dispatch_rx) = ChatDispatcher::channel();
    tokio::spawn(dispatch::run(dispatch_rx, registry.clone()));

    AppState {
        users,
        messages,
        sessions: Arc::new(SessionStore::new()),
        registry,
        dispatcher,
        config: Arc::new(Config {
            database_url: String::new(),
            port: 0,
            db_pool_size: 1,
        }),
    }
}

/// Start an actual TCP server for end-to-end testing.
/// Returns (addr, state). The server runs in the background.
pub async fn start_server() -> (SocketAddr, AppState) {
    let state = test_state();
    let app = forum_api::routes::router().with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

/// Register a user and return their id.
pub async fn register_user(addr: SocketAddr, nickname: &str) -> String {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/api/register"))
        .json(&serde_json::json!({
            "nickname": nickname,
            "email": format!("{nickname}@example.com"),
            "password": "correct-horse",
        }))
        .send()
        .await
        .expect("register request");
    assert_eq!(resp.status(), 201, "register should succeed");

    let body: serde_json::Value = resp.json().await.expect("parse register response");
    body["id"].as_str().expect("id present").to_string()
}

/// Log a registered user in and return the session cookie value.
pub async fn login_user(addr: SocketAddr, nickname: &str) -> String {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/api/login"))
        .json(&serde_json::json!({
            "identifier": nickname,
            "password": "correct-horse",
        }))
        .send()
        .await
        .expect("login request");
    assert_eq!(resp.status(), 200, "login should succeed");

    extract_session_cookie(&resp).expect("session cookie set")
}

/// Pull the session token out of a Set-Cookie header.
pub fn extract_session_cookie(resp: &reqwest::Response) -> Option<String> {
    resp.headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|cookie| {
            let (name_value, _) = cookie.split_once(';').unwrap_or((cookie, ""));
            let (name, value) = name_value.split_once('=')?;
            (name == "session_token").then(|| value.to_string())
        })
}

/// Register and log in, returning (user_id, session_token).
pub async fn register_and_login(addr: SocketAddr, nickname: &str) -> (String, String) {
    let user_id = register_user(addr, nickname).await;
    let token = login_user(addr, nickname).await;
    (user_id, token)
}

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use forum_api::auth::session::SessionStore;
use forum_api::chat::dispatch::{self, ChatDispatcher};
use forum_api::chat::registry::ConnectionRegistry;
use forum_api::config::Config;
use forum_api::store::pg::PgBackend;
use forum_api::store::{MessageStore, UserDirectory};
use forum_api::AppState;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing — env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    // Connect to PostgreSQL.
    let db = forum_api::db::pool::connect(&config.database_url, config.db_pool_size).await;

    let backend = Arc::new(PgBackend::new(db));
    let users: Arc<dyn UserDirectory> = backend.clone();
    let messages: Arc<dyn MessageStore> = backend;

    let registry = Arc::new(ConnectionRegistry::new());
    let (dispatcher, dispatch_rx) = ChatDispatcher::channel();
    tokio::spawn(dispatch::run(dispatch_rx, registry.clone()));

    let state = AppState {
        users,
        messages,
        sessions: Arc::new(SessionStore::new()),
        registry,
        dispatcher,
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(forum_api::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "forum-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}

pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod store;

use std::sync::Arc;

use auth::session::SessionStore;
use chat::dispatch::ChatDispatcher;
use chat::registry::ConnectionRegistry;
use config::Config;
use store::{MessageStore, UserDirectory};

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserDirectory>,
    pub messages: Arc<dyn MessageStore>,
    pub sessions: Arc<SessionStore>,
    pub registry: Arc<ConnectionRegistry>,
    pub dispatcher: ChatDispatcher,
    pub config: Arc<Config>,
}

pub mod auth;
pub mod chats;
pub mod config;
pub mod db;
pub mod error;
pub mod mail;
pub mod session;
pub mod users;

use std::sync::Arc;

use axum::Router;
use axum::extract::FromRef;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::SameSite;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use chats::{ChatDirectory, RoomHub};
use config::Config;
use mail::Mailer;

pub use error::{ApiError, ApiResult};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub chats: ChatDirectory,
    pub rooms: RoomHub,
    pub mailer: Mailer,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, mailer: Mailer, config: Config) -> AppState {
        AppState {
            db_pool,
            chats: ChatDirectory::new(),
            rooms: RoomHub::new(),
            mailer,
            config: Arc::new(config),
        }
    }
}

/// The full application, sessions included, so integration tests drive the
/// same router the binary serves.
pub fn router(state: AppState) -> Router {
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(30)));

    Router::new()
        .merge(auth::router())
        .merge(users::router())
        .merge(chats::router())
        .with_state(state)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

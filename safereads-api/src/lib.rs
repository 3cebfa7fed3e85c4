//! safereads-api library interface
//!
//! Exposes the application state and router so integration tests can drive
//! the service without binding a socket.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::services::{AdminAllowList, BookResolver, EntitlementGate, OpenAiClient, VerdictEngine};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Search, author catalog and cover identification
    pub resolver: Arc<BookResolver>,
    pub engine: Arc<VerdictEngine>,
    pub entitlement: EntitlementGate,
    pub admins: Arc<AdminAllowList>,
    /// Live model client; the admin settings endpoint swaps its key
    pub openai: Option<Arc<OpenAiClient>>,
    /// TOML file receiving settings write-back
    pub config_path: Option<PathBuf>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        resolver: Arc<BookResolver>,
        engine: Arc<VerdictEngine>,
        entitlement: EntitlementGate,
        admins: AdminAllowList,
    ) -> Self {
        Self {
            db,
            resolver,
            engine,
            entitlement,
            admins: Arc::new(admins),
            openai: None,
            config_path: None,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_openai_client(mut self, client: Arc<OpenAiClient>) -> Self {
        self.openai = Some(client);
        self
    }

    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    /// Remember a server-side failure for `/health`
    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::book_routes())
        .merge(api::analysis_routes())
        .merge(api::user_routes())
        .merge(api::profile_routes())
        .merge(api::admin_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

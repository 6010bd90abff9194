//! # MedStore API
//!
//! REST server for the simulation-center inventory.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          MedStore API Server                            │
//! │                                                                         │
//! │  Browser ──► axum Router ──► TraceLayer ──► CorsLayer                   │
//! │                   │                                                     │
//! │      ┌────────────┼──────────────┬──────────────────┐                   │
//! │      ▼            ▼              ▼                  ▼                   │
//! │  /health      /api/* routes   AuthUser          ServeDir (optional)     │
//! │                   │          (JWT + role)       static pages at /       │
//! │                   ▼                                                     │
//! │            ┌──────────────┐        ┌─────────────────────────────┐      │
//! │            │  medstore-db │        │ LowStockNotifier            │      │
//! │            │  SQLite      │        │ bounded mpsc → webhook/log  │      │
//! │            └──────────────┘        └─────────────────────────────┘      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! See [`config`]: defaults, then `medstore.toml`, then `MEDSTORE_*`
//! environment variables.

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod notify;
pub mod routes;

use std::sync::Arc;

use axum::{middleware, Router};
use medstore_db::{Database, DbConfig, DbError};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

// Re-exports
pub use config::AppConfig;
pub use error::{ApiError, ApiResult};

use crate::auth::JwtManager;
use crate::notify::LowStockNotifier;

/// Shared application state.
pub struct AppState {
    pub db: Database,
    pub config: AppConfig,
    pub jwt: JwtManager,
    pub notifier: LowStockNotifier,
}

/// Failures while bringing the server up.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Bootstrap failed: {0}")]
    Bootstrap(#[from] ApiError),
}

impl AppState {
    /// Opens the database, runs migrations, starts the notifier and
    /// creates the bootstrap admin when configured.
    pub async fn init(config: AppConfig) -> Result<Arc<Self>, StartupError> {
        let db_config = if config.database.path.as_os_str() == ":memory:" {
            DbConfig::in_memory()
        } else {
            DbConfig::new(config.database.path.clone())
                .max_connections(config.database.max_connections)
        };
        let db = Database::new(db_config).await?;

        let notifier = LowStockNotifier::spawn(&config.notifications)?;
        let jwt = JwtManager::new(
            config.auth.jwt_secret.clone(),
            config.auth.token_lifetime_secs,
        );

        auth::bootstrap_admin(&db, &config).await?;

        Ok(Arc::new(AppState {
            db,
            config,
            jwt,
            notifier,
        }))
    }
}

/// Builds the full router for `state`.
pub fn build_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .merge(routes::health::router())
        .nest("/api", routes::api_router());

    if state.config.is_development() {
        router = router.layer(middleware::map_response(error::expose_details));
    }

    if let Some(dir) = &state.config.server.static_dir {
        info!(dir = %dir.display(), "Serving static pages");
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

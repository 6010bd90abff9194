//! # MedStore API
//!
//! REST server for the simulation-center inventory.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        MedStore API Server                              │
//! │                                                                         │
//! │  Browser ───► HTTP (3000) ───► Routes ───► SQLite (WAL)                │
//! │                                   │                                     │
//! │                                   ▼                                     │
//! │                            LowStockNotifier                             │
//! │                            (webhook / log)                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use medstore_api::config::{AppConfig, LogFormat};
use medstore_api::{build_router, AppState};

/// Filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info,medstore=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration first so the log format can follow it
    let config = AppConfig::load().context("loading configuration")?;

    init_tracing(config.logging.format);

    info!("Starting MedStore API server...");
    info!(
        environment = ?config.environment,
        database = %config.database.path.display(),
        webhook = config.notifications.webhook_url.is_some(),
        "Configuration loaded"
    );

    if config.is_development() && config.auth.jwt_secret == medstore_api::config::DEV_JWT_SECRET {
        warn!("Using the development JWT secret; set MEDSTORE_AUTH__JWT_SECRET before deploying");
    }

    let addr = config.bind_address();
    let state = AppState::init(config)
        .await
        .context("initializing application state")?;
    info!("Database ready");

    let app = build_router(state.clone());

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    state.db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}

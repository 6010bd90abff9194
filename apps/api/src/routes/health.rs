//! Health check.
//!
//! `GET /health` is unauthenticated. It answers 200 while the database is
//! reachable and 503 otherwise.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use medstore_db::MigrationStatus;
use serde::Serialize;
use tracing::warn;

use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServingStatus {
    Up,
    Degraded,
    Down,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: ServingStatus,
    pub version: &'static str,
    pub timestamp: String,
    pub database: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migrations: Option<MigrationStatus>,
    pub message: String,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let database = state.db.health_check().await;

    let migrations = if database {
        match state.db.migration_status().await {
            Ok(status) => Some(status),
            Err(e) => {
                warn!(error = %e, "Could not read migration status");
                None
            }
        }
    } else {
        None
    };

    let (status, message) = match (database, migrations) {
        (false, _) => (ServingStatus::Down, "Database unreachable".to_string()),
        (true, Some(m)) if m.is_current() => {
            (ServingStatus::Up, "All systems operational".to_string())
        }
        (true, Some(m)) => (
            ServingStatus::Degraded,
            format!("{} of {} migrations applied", m.applied, m.total),
        ),
        (true, None) => (
            ServingStatus::Degraded,
            "Migration status unavailable".to_string(),
        ),
    };

    let code = if status == ServingStatus::Down {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            timestamp: Utc::now().to_rfc3339(),
            database,
            migrations,
            message,
        }),
    )
}

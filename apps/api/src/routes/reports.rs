//! Reports, computed on every request.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use medstore_core::Item;
use medstore_db::repository::report::{
    ActiveRental, ActiveSession, ActivityPoint, Breakdown, Dashboard, InventoryValue,
    MaintenanceDue, RoomBreakdown, DEFAULT_ACTIVITY_DAYS, MAX_ACTIVITY_DAYS,
};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub days: Option<u32>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/inventory-value", get(inventory_value))
        .route("/by-category", get(by_category))
        .route("/by-status", get(by_status))
        .route("/by-location", get(by_location))
        .route("/activity", get(activity))
        .route("/maintenance-due", get(maintenance_due))
        .route("/active-rentals", get(active_rentals))
        .route("/active-sessions", get(active_sessions))
        .route("/low-stock", get(low_stock))
}

async fn dashboard(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> ApiResult<Json<Dashboard>> {
    Ok(Json(state.db.reports().dashboard().await?))
}

async fn inventory_value(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> ApiResult<Json<InventoryValue>> {
    Ok(Json(state.db.reports().inventory_value().await?))
}

async fn by_category(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> ApiResult<Json<Vec<Breakdown>>> {
    Ok(Json(state.db.reports().by_category().await?))
}

async fn by_status(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> ApiResult<Json<Vec<Breakdown>>> {
    Ok(Json(state.db.reports().by_status().await?))
}

async fn by_location(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> ApiResult<Json<Vec<RoomBreakdown>>> {
    Ok(Json(state.db.reports().by_location().await?))
}

/// `?days=` defaults to 30 and may not exceed a year.
async fn activity(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(query): Query<ActivityQuery>,
) -> ApiResult<Json<Vec<ActivityPoint>>> {
    let days = query.days.unwrap_or(DEFAULT_ACTIVITY_DAYS);
    if days == 0 || days > MAX_ACTIVITY_DAYS {
        return Err(ApiError::validation(format!(
            "days must be between 1 and {}",
            MAX_ACTIVITY_DAYS
        )));
    }
    Ok(Json(state.db.reports().activity(days).await?))
}

async fn maintenance_due(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> ApiResult<Json<Vec<MaintenanceDue>>> {
    Ok(Json(state.db.reports().maintenance_due().await?))
}

async fn active_rentals(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> ApiResult<Json<Vec<ActiveRental>>> {
    Ok(Json(state.db.reports().active_rentals().await?))
}

async fn active_sessions(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> ApiResult<Json<Vec<ActiveSession>>> {
    Ok(Json(state.db.reports().active_sessions().await?))
}

async fn low_stock(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> ApiResult<Json<Vec<Item>>> {
    Ok(Json(state.db.reports().low_stock().await?))
}

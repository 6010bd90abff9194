//! Location routes: the Room → Rack → Shelf tree.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use medstore_core::input::{LocationDraft, LocationPatch};
use medstore_core::location::LocationNode;
use medstore_core::Location;
use medstore_db::LocationFilter;
use serde::Deserialize;
use tracing::info;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::ApiJson;
use crate::routes::{non_blank, parse_param, Deleted};
use crate::AppState;

/// `GET /api/locations?type=&parent=`
#[derive(Debug, Default, Deserialize)]
pub struct LocationQuery {
    #[serde(rename = "type")]
    pub location_type: Option<String>,
    pub parent: Option<String>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_locations).post(create_location))
        .route("/hierarchy", get(hierarchy))
        .route(
            "/{id}",
            get(get_location).put(update_location).delete(delete_location),
        )
}

async fn list_locations(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(query): Query<LocationQuery>,
) -> ApiResult<Json<Vec<Location>>> {
    let filter = LocationFilter {
        location_type: parse_param(query.location_type)?,
        parent: non_blank(query.parent),
    };
    Ok(Json(state.db.locations().list(&filter).await?))
}

/// Nested rooms with their racks and shelves, each with an item count.
async fn hierarchy(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> ApiResult<Json<Vec<LocationNode>>> {
    Ok(Json(state.db.locations().hierarchy().await?))
}

async fn create_location(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(draft): ApiJson<LocationDraft>,
) -> ApiResult<(StatusCode, Json<Location>)> {
    user.require_inventory_manager()?;
    let location = state.db.locations().create(draft).await?;
    info!(
        location_id = %location.id,
        kind = %location.location_type,
        by = %user.username,
        "Location created"
    );
    Ok((StatusCode::CREATED, Json(location)))
}

async fn get_location(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Location>> {
    Ok(Json(state.db.locations().get(&id).await?))
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<LocationPatch>,
) -> ApiResult<Json<Location>> {
    user.require_inventory_manager()?;
    Ok(Json(state.db.locations().update(&id, patch).await?))
}

/// Refused while the location has children or items placed in it.
async fn delete_location(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Deleted>> {
    user.require_inventory_manager()?;
    state.db.locations().delete(&id).await?;
    info!(location_id = %id, by = %user.username, "Location deleted");
    Ok(Json(Deleted::new("Location")))
}

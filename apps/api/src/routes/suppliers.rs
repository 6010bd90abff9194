//! Supplier routes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use medstore_core::input::SupplierInput;
use medstore_core::{Item, Supplier};
use tracing::info;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::ApiJson;
use crate::routes::Deleted;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_suppliers).post(create_supplier))
        .route(
            "/{id}",
            get(get_supplier).put(update_supplier).delete(delete_supplier),
        )
        .route("/{id}/items", get(supplier_items))
}

async fn list_suppliers(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> ApiResult<Json<Vec<Supplier>>> {
    Ok(Json(state.db.suppliers().list().await?))
}

async fn create_supplier(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(input): ApiJson<SupplierInput>,
) -> ApiResult<(StatusCode, Json<Supplier>)> {
    user.require_inventory_manager()?;
    let supplier = state.db.suppliers().create(input).await?;
    info!(supplier_id = %supplier.id, name = %supplier.name, "Supplier created");
    Ok((StatusCode::CREATED, Json(supplier)))
}

async fn get_supplier(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Supplier>> {
    Ok(Json(state.db.suppliers().get(&id).await?))
}

/// Omitted fields keep their value; an empty string clears one.
async fn update_supplier(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<SupplierInput>,
) -> ApiResult<Json<Supplier>> {
    user.require_inventory_manager()?;
    Ok(Json(state.db.suppliers().update(&id, input).await?))
}

async fn delete_supplier(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Deleted>> {
    user.require_admin()?;
    state.db.suppliers().delete(&id).await?;
    info!(supplier_id = %id, by = %user.username, "Supplier deleted");
    Ok(Json(Deleted::new("Supplier")))
}

async fn supplier_items(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Item>>> {
    Ok(Json(state.db.suppliers().items(&id).await?))
}

//! Item routes, including the stock transaction endpoint.
//!
//! ## Routes
//! ```text
//! GET    /api/items                               any user
//! POST   /api/items                               Admin | Inventory Manager
//! GET    /api/items/barcode/{barcode}             any user
//! GET    /api/items/{id}                          any user
//! PUT    /api/items/{id}                          Admin | Inventory Manager
//! DELETE /api/items/{id}                          Admin
//! POST   /api/items/{id}/enhanced-transaction     any user   → 201
//! GET    /api/items/{id}/transactions             any user
//! GET    /api/items/{id}/transactions/grouped     any user
//! GET    /api/items/{id}/records                  any user
//! ```

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use medstore_core::input::{ItemDraft, ItemPatch};
use medstore_core::ledger::GroupedTransactions;
use medstore_core::records::ItemRecords;
use medstore_core::{CategoryType, Item, Transaction, TransactionRequest};
use medstore_db::{ItemFilter, Page};
use serde::Deserialize;
use tracing::info;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::ApiJson;
use crate::notify::LowStockEvent;
use crate::routes::{non_blank, parse_param, Deleted};
use crate::AppState;

/// Query string of `GET /api/items`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemQuery {
    pub category: Option<String>,
    pub category_type: Option<CategoryType>,
    pub status: Option<String>,
    pub room: Option<String>,
    pub supplier: Option<String>,
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ItemQuery {
    fn into_filter(self) -> ApiResult<ItemFilter> {
        Ok(ItemFilter {
            category: non_blank(self.category),
            category_type: self.category_type,
            status: parse_param(self.status)?,
            room: non_blank(self.room),
            supplier: non_blank(self.supplier),
            search: non_blank(self.search),
            limit: self.limit,
            offset: self.offset,
        })
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_items).post(create_item))
        .route("/barcode/{barcode}", get(get_by_barcode))
        .route("/{id}", get(get_item).put(update_item).delete(delete_item))
        .route("/{id}/enhanced-transaction", post(record_transaction))
        .route("/{id}/transactions", get(item_transactions))
        .route("/{id}/transactions/grouped", get(grouped_transactions))
        .route("/{id}/records", get(item_records))
}

async fn list_items(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(query): Query<ItemQuery>,
) -> ApiResult<Json<Page<Item>>> {
    let filter = query.into_filter()?;
    Ok(Json(state.db.items().list(&filter).await?))
}

async fn create_item(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(draft): ApiJson<ItemDraft>,
) -> ApiResult<(StatusCode, Json<Item>)> {
    user.require_inventory_manager()?;
    let item = state.db.items().create(draft).await?;
    info!(item_id = %item.id, barcode = %item.barcode, by = %user.username, "Item created");
    Ok((StatusCode::CREATED, Json(item)))
}

async fn get_by_barcode(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(barcode): Path<String>,
) -> ApiResult<Json<Item>> {
    Ok(Json(state.db.items().get_by_barcode(&barcode).await?))
}

async fn get_item(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Item>> {
    Ok(Json(state.db.items().get(&id).await?))
}

async fn update_item(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<ItemPatch>,
) -> ApiResult<Json<Item>> {
    user.require_inventory_manager()?;
    Ok(Json(state.db.items().update(&id, patch).await?))
}

async fn delete_item(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Deleted>> {
    user.require_admin()?;
    state.db.items().delete(&id).await?;
    info!(item_id = %id, by = %user.username, "Item deleted");
    Ok(Json(Deleted::new("Item")))
}

/// `POST /api/items/{id}/enhanced-transaction`
///
/// ## Returns
/// * `201` - the ledger entry
/// * `400` - invalid request or counter shortfall, counters unchanged
/// * `404` - no such item
/// * `409` - the item changed underneath the caller
async fn record_transaction(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<TransactionRequest>,
) -> ApiResult<(StatusCode, Json<Transaction>)> {
    let recorded = state.db.transactions().record(&id, &request, &user.id).await?;

    if recorded.low_stock {
        state
            .notifier
            .notify(LowStockEvent::new(&recorded.item, &recorded.transaction));
    }

    Ok((StatusCode::CREATED, Json(recorded.transaction)))
}

async fn item_transactions(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Transaction>>> {
    Ok(Json(state.db.transactions().list_for_item(&id).await?))
}

async fn grouped_transactions(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<GroupedTransactions>> {
    Ok(Json(state.db.transactions().grouped(&id).await?))
}

async fn item_records(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ItemRecords>> {
    Ok(Json(state.db.transactions().records(&id).await?))
}

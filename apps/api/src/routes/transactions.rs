//! Global ledger view.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use medstore_core::Transaction;
use medstore_db::{Page, TransactionFilter};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::routes::{non_blank, parse_param};
use crate::AppState;

/// `GET /api/transactions?type=&item=&limit=&offset=`
#[derive(Debug, Default, Deserialize)]
pub struct TransactionQuery {
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
    pub item: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_transactions))
}

async fn list_transactions(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(query): Query<TransactionQuery>,
) -> ApiResult<Json<Page<Transaction>>> {
    let filter = TransactionFilter {
        transaction_type: parse_param(query.transaction_type)?,
        item: non_blank(query.item),
        limit: query.limit,
        offset: query.offset,
    };
    Ok(Json(state.db.transactions().list(&filter).await?))
}

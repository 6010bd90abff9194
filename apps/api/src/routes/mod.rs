//! HTTP routes.
//!
//! ## Layout
//! ```text
//! /health                          health::router      (no auth)
//! /api/auth/...                    auth::router        (login is open)
//! /api/items/...                   items::router
//! /api/transactions                transactions::router
//! /api/locations/...               locations::router
//! /api/suppliers/...               suppliers::router
//! /api/users/...                   users::router       (Admin)
//! /api/reports/...                 reports::router
//! ```
//!
//! Every `/api` handler except login takes an [`AuthUser`](crate::auth::AuthUser),
//! so a missing or bad token is a 401 before the handler body runs.

pub mod auth;
pub mod health;
pub mod items;
pub mod locations;
pub mod reports;
pub mod suppliers;
pub mod transactions;
pub mod users;

use std::str::FromStr;
use std::sync::Arc;

use axum::Router;
use medstore_core::ValidationError;
use serde::Serialize;

use crate::error::ApiResult;
use crate::AppState;

/// All `/api` routes.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/items", items::router())
        .nest("/transactions", transactions::router())
        .nest("/locations", locations::router())
        .nest("/suppliers", suppliers::router())
        .nest("/users", users::router())
        .nest("/reports", reports::router())
}

/// Body returned by DELETE routes.
#[derive(Debug, Serialize)]
pub struct Deleted {
    pub message: String,
}

impl Deleted {
    pub fn new(entity: &str) -> Self {
        Deleted {
            message: format!("{} deleted", entity),
        }
    }
}

/// A query parameter with blank values treated as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses an optional query parameter with the type's `FromStr`.
pub(crate) fn parse_param<T>(value: Option<String>) -> ApiResult<Option<T>>
where
    T: FromStr<Err = ValidationError>,
{
    match non_blank(value) {
        Some(v) => Ok(Some(v.parse::<T>()?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medstore_core::{ItemStatus, TransactionType};

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  Manikins ".to_string())), Some("Manikins".to_string()));
        assert_eq!(non_blank(Some("   ".to_string())), None);
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn test_parse_param() {
        let status: Option<ItemStatus> = parse_param(Some("low-stock".to_string())).unwrap();
        assert_eq!(status, Some(ItemStatus::LowStock));

        let kind: Option<TransactionType> = parse_param(Some("Rent Out".to_string())).unwrap();
        assert_eq!(kind, Some(TransactionType::RentOut));

        assert!(parse_param::<TransactionType>(Some("Teleport".to_string())).is_err());
        assert_eq!(parse_param::<ItemStatus>(Some(String::new())).unwrap(), None);
    }
}

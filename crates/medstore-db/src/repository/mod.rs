//! # Repository Module
//!
//! Database repository implementations for MedStore.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  axum handler                                                          │
//! │       │                                                                 │
//! │       │  db.transactions().record(&item_id, &request, &user_id)        │
//! │       ▼                                                                 │
//! │  TransactionRepository                                                 │
//! │  ├── load item (version N)                                             │
//! │  ├── reconciler::apply()      ← rules live in medstore-core            │
//! │  ├── open / settle sub-record                                          │
//! │  └── UPDATE ... WHERE version = N, INSERT ledger row                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ItemRepository`] - Item CRUD, search and barcode lookup
//! - [`LocationRepository`] - Room → Rack → Shelf tree
//! - [`SupplierRepository`] - Supplier CRUD
//! - [`UserRepository`] - Accounts and password hashes
//! - [`TransactionRepository`] - The stock ledger and sub-records
//! - [`ReportRepository`] - Read-only aggregates

pub mod item;
pub mod location;
pub mod report;
pub mod supplier;
pub mod transaction;
pub mod user;

pub use item::{ItemFilter, ItemRepository};
pub use location::{LocationFilter, LocationRepository};
pub use report::ReportRepository;
pub use supplier::SupplierRepository;
pub use transaction::{Recorded, TransactionFilter, TransactionRepository};
pub use user::UserRepository;

use serde::Serialize;

/// One page of a filtered list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    /// Matching rows across all pages.
    pub total: i64,
    pub limit: u32,
    pub offset: u32,
}

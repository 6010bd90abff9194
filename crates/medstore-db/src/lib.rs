//! # medstore-db: Database Layer for MedStore
//!
//! All persistence for the inventory service: SQLite via sqlx, embedded
//! migrations, and one repository per aggregate.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        MedStore Data Flow                               │
//! │                                                                         │
//! │  axum handler (POST /api/items/{id}/enhanced-transaction)              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   medstore-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐   ┌──────────────┐   │   │
//! │  │   │   Database    │    │  Repositories  │   │  Migrations  │   │   │
//! │  │   │   (pool.rs)   │    │                │   │  (embedded)  │   │   │
//! │  │   │               │    │ ItemRepo       │   │              │   │   │
//! │  │   │ SqlitePool    │◄───│ TransactionRepo│   │ 001_initial  │   │   │
//! │  │   │ WAL + FKs     │    │ ReportRepo ... │   │   _schema    │   │   │
//! │  │   └───────────────┘    └────────────────┘   └──────────────┘   │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (database.path)                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use medstore_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("medstore.db")).await?;
//!
//! let item = db.items().get_by_barcode("2012345678901").await?;
//! let recorded = db.transactions().record(&item.id, &request, &user_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use migrations::MigrationStatus;
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::{
    ItemFilter, ItemRepository, LocationFilter, LocationRepository, Page, Recorded,
    ReportRepository, SupplierRepository, TransactionFilter, TransactionRepository,
    UserRepository,
};

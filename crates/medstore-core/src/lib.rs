//! # medstore-core: Pure Business Logic for MedStore Inventory
//!
//! This crate holds every inventory rule as pure functions with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      MedStore Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Browser pages (static HTML + JS)                │   │
//! │  │   Item list ──► Item detail ──► Transaction modal ──► Reports   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ REST / JSON                            │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  apps/api (axum handlers)                       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ medstore-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │  ┌────────────┐ ┌────────────┐ ┌────────────┐ ┌─────────────┐  │   │
//! │  │  │ reconciler │ │  location  │ │  barcode   │ │ validation  │  │   │
//! │  │  │ apply()    │ │ hierarchy  │ │ synthesize │ │   rules     │  │   │
//! │  │  └────────────┘ └────────────┘ └────────────┘ └─────────────┘  │   │
//! │  │  ┌────────────┐ ┌────────────┐ ┌────────────┐                  │   │
//! │  │  │  records   │ │   ledger   │ │   money    │                  │   │
//! │  │  │ correlate  │ │  buckets   │ │ unit cost  │                  │   │
//! │  │  └────────────┘ └────────────┘ └────────────┘                  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 medstore-db (Database Layer)                    │   │
//! │  │          SQLite queries, migrations, repositories               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Item, Location, Supplier, Transaction, ...)
//! - [`reconciler`] - The single reducer over an item's stock counters
//! - [`records`] - Correlating returns with open session/rental/maintenance records
//! - [`ledger`] - Bucketing an item's history for display
//! - [`location`] - Room → Rack → Shelf rules and tree assembly
//! - [`barcode`] - Barcode validation and synthesis
//! - [`money`] - Integer-cent money for unit costs and valuations
//! - [`validation`] - Input validation
//! - [`input`] - Create/update request bodies and their normalization
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use medstore_core::reconciler::apply;
//! use medstore_core::{StockCounters, TransactionRequest, TransactionType};
//!
//! let counters = StockCounters::new_stock(10);
//! let request = TransactionRequest::new(TransactionType::SendToMaintenance, 3);
//!
//! let effect = apply(&counters, &request).unwrap();
//! assert_eq!(effect.counters.available_quantity, 7);
//! assert_eq!(effect.counters.current_state.in_maintenance, 3);
//! assert!(effect.counters.is_consistent());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod barcode;
pub mod error;
pub mod input;
pub mod ledger;
pub mod location;
pub mod money;
pub mod reconciler;
pub mod records;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, HierarchyError, Rejection, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Largest quantity a single transaction may move.
///
/// ## Business Reason
/// Catches typos (100000 instead of 10) before they distort every counter.
pub const MAX_TRANSACTION_QUANTITY: i64 = 100_000;

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Maximum page size for list endpoints.
pub const MAX_PAGE_SIZE: u32 = 500;

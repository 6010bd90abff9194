//! # Domain Types
//!
//! Core domain types used throughout MedStore.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Item       │   │    Location     │   │    Supplier     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │──►│  id (UUID)      │   │  id (UUID)      │       │
//! │  │  barcode        │   │  type Room/Rack │   │  name (unique)  │       │
//! │  │  quantity       │   │       /Shelf    │   │  contact info   │       │
//! │  │  available      │   │  parent ────────┼─┐ └─────────────────┘       │
//! │  │  current_state  │   └─────────────────┘ │          ▲                │
//! │  │  supplier ──────┼───────────────────────┼──────────┘                │
//! │  └────────┬────────┘                       └─► (self reference)        │
//! │           │ 1..n                                                        │
//! │  ┌────────▼────────┐   ┌─────────────────────────────────────────┐     │
//! │  │  Transaction    │   │  Sub-records (open until fully returned)│     │
//! │  │  (ledger entry) │──►│  SessionRecord / RentalRecord /         │     │
//! │  │  immutable      │   │  MaintenanceRecord                      │     │
//! │  └─────────────────┘   └─────────────────────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Counter Invariant
//! ```text
//! quantity == available_quantity
//!           + current_state.in_maintenance
//!           + current_state.in_session
//!           + current_state.rented
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Roles
// =============================================================================

/// Account role, checked per route by the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    InventoryManager,
    User,
}

impl Role {
    /// Human-readable name.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::InventoryManager => "Inventory Manager",
            Role::User => "User",
        }
    }

    /// Whether this role may create and edit catalog data.
    pub fn can_manage_inventory(&self) -> bool {
        matches!(self, Role::Admin | Role::InventoryManager)
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(' ', "_").as_str() {
            "admin" => Ok(Role::Admin),
            "inventory_manager" => Ok(Role::InventoryManager),
            "user" => Ok(Role::User),
            _ => Err(ValidationError::NotAllowed {
                field: "role".to_string(),
                allowed: vec![
                    "admin".to_string(),
                    "inventory_manager".to_string(),
                    "user".to_string(),
                ],
            }),
        }
    }
}

// =============================================================================
// Location
// =============================================================================

/// The three tiers of physical storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
pub enum LocationType {
    Room,
    Rack,
    Shelf,
}

impl LocationType {
    /// The type a location of this type must be placed in.
    ///
    /// ```rust
    /// use medstore_core::LocationType;
    ///
    /// assert_eq!(LocationType::Room.parent_type(), None);
    /// assert_eq!(LocationType::Rack.parent_type(), Some(LocationType::Room));
    /// assert_eq!(LocationType::Shelf.parent_type(), Some(LocationType::Rack));
    /// ```
    pub const fn parent_type(&self) -> Option<LocationType> {
        match self {
            LocationType::Room => None,
            LocationType::Rack => Some(LocationType::Room),
            LocationType::Shelf => Some(LocationType::Rack),
        }
    }
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationType::Room => f.write_str("Room"),
            LocationType::Rack => f.write_str("Rack"),
            LocationType::Shelf => f.write_str("Shelf"),
        }
    }
}

impl FromStr for LocationType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "room" => Ok(LocationType::Room),
            "rack" => Ok(LocationType::Rack),
            "shelf" => Ok(LocationType::Shelf),
            _ => Err(ValidationError::NotAllowed {
                field: "type".to_string(),
                allowed: vec!["Room".to_string(), "Rack".to_string(), "Shelf".to_string()],
            }),
        }
    }
}

/// A node of the storage tree, persisted flat with a parent reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub location_type: LocationType,
    #[serde(rename = "parent")]
    pub parent_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Where an item is stored: a room, optionally narrowed to a rack and shelf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ItemLocation {
    #[serde(rename = "room")]
    pub room_id: String,
    #[serde(rename = "rack", default)]
    pub rack_id: Option<String>,
    #[serde(rename = "shelf", default)]
    pub shelf_id: Option<String>,
}

impl ItemLocation {
    /// A placement naming only the room.
    pub fn room(room_id: impl Into<String>) -> Self {
        ItemLocation {
            room_id: room_id.into(),
            rack_id: None,
            shelf_id: None,
        }
    }
}

// =============================================================================
// Supplier
// =============================================================================

/// A vendor that items are bought from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// User
// =============================================================================

/// An account that can sign in and perform transactions.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Role,
    /// Argon2 PHC string. Never leaves the server.
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    pub password_hash: String,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Item
// =============================================================================

/// Closed classification beside the free-form category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CategoryType {
    Equipment,
    Consumable,
    Manikin,
    TaskTrainer,
    Instrument,
    Other,
}

impl Default for CategoryType {
    fn default() -> Self {
        CategoryType::Other
    }
}

/// How the barcode of a new or edited item is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum BarcodeType {
    /// The caller scanned or typed an existing code.
    Existing,
    /// The server synthesizes one.
    Generate,
}

/// The allocation counters of an item besides `available_quantity`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CurrentState {
    pub in_maintenance: i64,
    pub in_session: i64,
    pub rented: i64,
}

impl CurrentState {
    /// Units allocated to any sub-status.
    pub const fn allocated(&self) -> i64 {
        self.in_maintenance + self.in_session + self.rented
    }
}

/// The four-way split of an item's stock.
///
/// ```text
/// quantity ─┬─ available_quantity
///           ├─ in_maintenance
///           ├─ in_session
///           └─ rented
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockCounters {
    pub quantity: i64,
    pub available_quantity: i64,
    pub current_state: CurrentState,
}

impl StockCounters {
    /// Counters of a freshly created item: everything available.
    pub const fn new_stock(quantity: i64) -> Self {
        StockCounters {
            quantity,
            available_quantity: quantity,
            current_state: CurrentState {
                in_maintenance: 0,
                in_session: 0,
                rented: 0,
            },
        }
    }

    /// Checks the sum invariant and that no counter is negative.
    pub fn is_consistent(&self) -> bool {
        let s = &self.current_state;
        self.available_quantity >= 0
            && s.in_maintenance >= 0
            && s.in_session >= 0
            && s.rented >= 0
            && self.quantity == self.available_quantity + s.allocated()
    }
}

/// Display label derived from an item's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ItemStatus {
    #[serde(rename = "Available")]
    Available,
    #[serde(rename = "Low Stock")]
    LowStock,
    #[serde(rename = "Fully Allocated")]
    FullyAllocated,
    #[serde(rename = "Out of Stock")]
    OutOfStock,
}

impl ItemStatus {
    /// Derives the label.
    ///
    /// ```rust
    /// use medstore_core::{ItemStatus, StockCounters};
    ///
    /// assert_eq!(ItemStatus::derive(&StockCounters::new_stock(0), 2), ItemStatus::OutOfStock);
    /// assert_eq!(ItemStatus::derive(&StockCounters::new_stock(2), 2), ItemStatus::LowStock);
    /// assert_eq!(ItemStatus::derive(&StockCounters::new_stock(9), 2), ItemStatus::Available);
    /// ```
    pub fn derive(counters: &StockCounters, reorder_level: i64) -> Self {
        if counters.quantity <= 0 {
            ItemStatus::OutOfStock
        } else if counters.available_quantity <= 0 {
            ItemStatus::FullyAllocated
        } else if counters.quantity <= reorder_level {
            ItemStatus::LowStock
        } else {
            ItemStatus::Available
        }
    }

    /// Human-readable label (same as the JSON form).
    pub fn label(&self) -> &'static str {
        match self {
            ItemStatus::Available => "Available",
            ItemStatus::LowStock => "Low Stock",
            ItemStatus::FullyAllocated => "Fully Allocated",
            ItemStatus::OutOfStock => "Out of Stock",
        }
    }
}

impl FromStr for ItemStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', '-'], " ").as_str() {
            "available" => Ok(ItemStatus::Available),
            "low stock" => Ok(ItemStatus::LowStock),
            "fully allocated" => Ok(ItemStatus::FullyAllocated),
            "out of stock" => Ok(ItemStatus::OutOfStock),
            _ => Err(ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: vec![
                    "Available".to_string(),
                    "Low Stock".to_string(),
                    "Fully Allocated".to_string(),
                    "Out of Stock".to_string(),
                ],
            }),
        }
    }
}

/// A tracked inventory entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub category_type: CategoryType,
    pub barcode: String,
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub location: ItemLocation,
    #[serde(rename = "supplier")]
    pub supplier_id: Option<String>,
    pub quantity: i64,
    pub available_quantity: i64,
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub current_state: CurrentState,
    pub reorder_level: i64,
    #[serde(rename = "unitCost")]
    pub unit_cost_cents: i64,
    #[ts(as = "Option<String>")]
    pub last_maintenance_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    /// Bumped on every counter write; guards against lost updates.
    pub version: i64,
}

impl Item {
    /// The item's counters as one value.
    pub fn counters(&self) -> StockCounters {
        StockCounters {
            quantity: self.quantity,
            available_quantity: self.available_quantity,
            current_state: self.current_state,
        }
    }

    /// Derived status label.
    pub fn status(&self) -> ItemStatus {
        ItemStatus::derive(&self.counters(), self.reorder_level)
    }

    /// Unit cost as Money.
    #[inline]
    pub fn unit_cost(&self) -> Money {
        Money::from_cents(self.unit_cost_cents)
    }

    /// Value of all owned units.
    #[inline]
    pub fn stock_value(&self) -> Money {
        self.unit_cost().multiply_quantity(self.quantity)
    }

    /// Whether stock has reached the reorder level.
    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.reorder_level
    }
}

// =============================================================================
// Transactions
// =============================================================================

/// Every operation the ledger knows.
///
/// The last four are kept so older clients keep working.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
pub enum TransactionType {
    #[serde(rename = "Stock Addition")]
    StockAddition,
    #[serde(rename = "Stock Removal")]
    StockRemoval,
    #[serde(rename = "Relocate")]
    Relocate,
    #[serde(rename = "Check Out for Session")]
    CheckOutForSession,
    #[serde(rename = "Return from Session")]
    ReturnFromSession,
    #[serde(rename = "Rent Out")]
    RentOut,
    #[serde(rename = "Return from Rental")]
    ReturnFromRental,
    #[serde(rename = "Send to Maintenance")]
    SendToMaintenance,
    #[serde(rename = "Return from Maintenance")]
    ReturnFromMaintenance,
    #[serde(rename = "Check-in")]
    CheckIn,
    #[serde(rename = "Check-out")]
    CheckOut,
    #[serde(rename = "Restock")]
    Restock,
    #[serde(rename = "Maintenance")]
    Maintenance,
}

impl TransactionType {
    /// All types, current ones first.
    pub const ALL: [TransactionType; 13] = [
        TransactionType::StockAddition,
        TransactionType::StockRemoval,
        TransactionType::Relocate,
        TransactionType::CheckOutForSession,
        TransactionType::ReturnFromSession,
        TransactionType::RentOut,
        TransactionType::ReturnFromRental,
        TransactionType::SendToMaintenance,
        TransactionType::ReturnFromMaintenance,
        TransactionType::CheckIn,
        TransactionType::CheckOut,
        TransactionType::Restock,
        TransactionType::Maintenance,
    ];

    /// The wire name, e.g. `"Send to Maintenance"`.
    pub fn label(&self) -> &'static str {
        match self {
            TransactionType::StockAddition => "Stock Addition",
            TransactionType::StockRemoval => "Stock Removal",
            TransactionType::Relocate => "Relocate",
            TransactionType::CheckOutForSession => "Check Out for Session",
            TransactionType::ReturnFromSession => "Return from Session",
            TransactionType::RentOut => "Rent Out",
            TransactionType::ReturnFromRental => "Return from Rental",
            TransactionType::SendToMaintenance => "Send to Maintenance",
            TransactionType::ReturnFromMaintenance => "Return from Maintenance",
            TransactionType::CheckIn => "Check-in",
            TransactionType::CheckOut => "Check-out",
            TransactionType::Restock => "Restock",
            TransactionType::Maintenance => "Maintenance",
        }
    }

    /// The storage name, e.g. `"send_to_maintenance"`.
    pub fn storage_name(&self) -> &'static str {
        match self {
            TransactionType::StockAddition => "stock_addition",
            TransactionType::StockRemoval => "stock_removal",
            TransactionType::Relocate => "relocate",
            TransactionType::CheckOutForSession => "check_out_for_session",
            TransactionType::ReturnFromSession => "return_from_session",
            TransactionType::RentOut => "rent_out",
            TransactionType::ReturnFromRental => "return_from_rental",
            TransactionType::SendToMaintenance => "send_to_maintenance",
            TransactionType::ReturnFromMaintenance => "return_from_maintenance",
            TransactionType::CheckIn => "check_in",
            TransactionType::CheckOut => "check_out",
            TransactionType::Restock => "restock",
            TransactionType::Maintenance => "maintenance",
        }
    }

    /// Whether this is one of the pre-2.0 types.
    pub fn is_legacy(&self) -> bool {
        matches!(
            self,
            TransactionType::CheckIn
                | TransactionType::CheckOut
                | TransactionType::Restock
                | TransactionType::Maintenance
        )
    }

    /// The history bucket entries of this type are shown under.
    pub fn bucket(&self) -> LedgerBucket {
        match self {
            TransactionType::StockAddition | TransactionType::StockRemoval => LedgerBucket::Stock,
            TransactionType::Relocate => LedgerBucket::Location,
            TransactionType::CheckOutForSession | TransactionType::ReturnFromSession => {
                LedgerBucket::Session
            }
            TransactionType::RentOut | TransactionType::ReturnFromRental => LedgerBucket::Rental,
            TransactionType::SendToMaintenance | TransactionType::ReturnFromMaintenance => {
                LedgerBucket::Maintenance
            }
            TransactionType::CheckIn
            | TransactionType::CheckOut
            | TransactionType::Restock
            | TransactionType::Maintenance => LedgerBucket::Legacy,
        }
    }

    /// Whether this type can push stock down to the reorder level.
    pub fn triggers_low_stock_check(&self) -> bool {
        matches!(self, TransactionType::StockRemoval | TransactionType::CheckOut)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TransactionType {
    type Err = ValidationError;

    /// Accepts either the wire label or the storage name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        TransactionType::ALL
            .iter()
            .copied()
            .find(|t| t.label().eq_ignore_ascii_case(s) || t.storage_name() == s)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "type".to_string(),
                allowed: TransactionType::ALL
                    .iter()
                    .map(|t| t.label().to_string())
                    .collect(),
            })
    }
}

/// History buckets for the grouped ledger view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LedgerBucket {
    Stock,
    Location,
    Session,
    Rental,
    Maintenance,
    Legacy,
}

/// Session details carried by session transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Rental details carried by rental transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RentalDetails {
    #[serde(default)]
    pub rented_to: Option<String>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub expected_return_date: Option<DateTime<Utc>>,
}

/// Maintenance details carried by maintenance transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceDetails {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub expected_end_date: Option<DateTime<Utc>>,
}

/// A request to record a transaction against one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub quantity: i64,
    #[serde(default)]
    pub from_location: Option<String>,
    #[serde(default)]
    pub to_location: Option<String>,
    #[serde(default)]
    pub session: Option<SessionDetails>,
    #[serde(default)]
    pub rental: Option<RentalDetails>,
    #[serde(default)]
    pub maintenance: Option<MaintenanceDetails>,
    /// The open sub-record a return settles, when the client knows it.
    #[serde(default)]
    pub record_id: Option<String>,
    /// The item version the client last saw; a mismatch is a conflict.
    #[serde(default)]
    pub expected_version: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl TransactionRequest {
    /// A request with only type and quantity set.
    pub fn new(transaction_type: TransactionType, quantity: i64) -> Self {
        TransactionRequest {
            transaction_type,
            quantity,
            from_location: None,
            to_location: None,
            session: None,
            rental: None,
            maintenance: None,
            record_id: None,
            expected_version: None,
            notes: None,
        }
    }

    /// Trimmed, non-empty session name.
    pub fn session_name(&self) -> Option<&str> {
        non_blank(self.session.as_ref().and_then(|s| s.name.as_deref()))
    }

    /// Trimmed, non-empty renter.
    pub fn rented_to(&self) -> Option<&str> {
        non_blank(self.rental.as_ref().and_then(|r| r.rented_to.as_deref()))
    }

    /// Trimmed, non-empty destination.
    pub fn destination(&self) -> Option<&str> {
        non_blank(self.to_location.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// An immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    #[serde(rename = "item")]
    pub item_id: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub quantity: i64,
    pub from_location: Option<String>,
    pub to_location: Option<String>,
    pub session: Option<SessionDetails>,
    pub rental: Option<RentalDetails>,
    pub maintenance: Option<MaintenanceDetails>,
    pub record_id: Option<String>,
    pub performed_by: String,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// Sub-records
// =============================================================================

/// The three kinds of allocation that are tracked as records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Session,
    Rental,
    Maintenance,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Session => f.write_str("session"),
            RecordKind::Rental => f.write_str("rental"),
            RecordKind::Maintenance => f.write_str("maintenance"),
        }
    }
}

/// Units checked out for a training session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    #[serde(rename = "item")]
    pub item_id: String,
    pub name: String,
    pub location: Option<String>,
    pub quantity: i64,
    pub returned_quantity: i64,
    #[ts(as = "String")]
    pub started_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub ended_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// Units rented to an outside party.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RentalRecord {
    pub id: String,
    #[serde(rename = "item")]
    pub item_id: String,
    pub rented_to: String,
    pub quantity: i64,
    pub returned_quantity: i64,
    #[ts(as = "String")]
    pub rented_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub expected_return_date: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub returned_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// Units away for servicing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceRecord {
    pub id: String,
    #[serde(rename = "item")]
    pub item_id: String,
    pub provider: Option<String>,
    pub quantity: i64,
    pub returned_quantity: i64,
    #[ts(as = "String")]
    pub started_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub expected_end_date: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_type_wire_names() {
        let json = serde_json::to_string(&TransactionType::CheckOutForSession).unwrap();
        assert_eq!(json, "\"Check Out for Session\"");

        let parsed: TransactionType = serde_json::from_str("\"Check-out\"").unwrap();
        assert_eq!(parsed, TransactionType::CheckOut);
    }

    #[test]
    fn test_transaction_type_from_str_accepts_both_forms() {
        assert_eq!(
            "Return from Rental".parse::<TransactionType>().unwrap(),
            TransactionType::ReturnFromRental
        );
        assert_eq!(
            "return_from_rental".parse::<TransactionType>().unwrap(),
            TransactionType::ReturnFromRental
        );
        assert!("Teleport".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_legacy_types_land_in_legacy_bucket() {
        for t in TransactionType::ALL {
            assert_eq!(t.is_legacy(), t.bucket() == LedgerBucket::Legacy, "{t}");
        }
    }

    #[test]
    fn test_request_deserializes_from_client_body() {
        let body = r#"{
            "type": "Rent Out",
            "quantity": 2,
            "rental": { "rentedTo": "  St. Mary's ED  " },
            "notes": "for skills week"
        }"#;
        let request: TransactionRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.transaction_type, TransactionType::RentOut);
        assert_eq!(request.rented_to(), Some("St. Mary's ED"));
        assert_eq!(request.record_id, None);
    }

    #[test]
    fn test_blank_renter_counts_as_missing() {
        let mut request = TransactionRequest::new(TransactionType::RentOut, 1);
        request.rental = Some(RentalDetails {
            rented_to: Some("   ".to_string()),
            expected_return_date: None,
        });
        assert_eq!(request.rented_to(), None);
    }

    #[test]
    fn test_status_derivation() {
        let mut counters = StockCounters::new_stock(5);
        assert_eq!(ItemStatus::derive(&counters, 2), ItemStatus::Available);

        counters.available_quantity = 0;
        counters.current_state.rented = 5;
        assert_eq!(ItemStatus::derive(&counters, 2), ItemStatus::FullyAllocated);

        assert_eq!(
            ItemStatus::derive(&StockCounters::new_stock(0), 0),
            ItemStatus::OutOfStock
        );
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("low_stock".parse::<ItemStatus>().unwrap(), ItemStatus::LowStock);
        assert_eq!("Out of Stock".parse::<ItemStatus>().unwrap(), ItemStatus::OutOfStock);
    }

    #[test]
    fn test_role_parse_and_permissions() {
        assert_eq!("Inventory Manager".parse::<Role>().unwrap(), Role::InventoryManager);
        assert!(Role::Admin.can_manage_inventory());
        assert!(!Role::User.can_manage_inventory());
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_item_location_json_shape() {
        let loc = ItemLocation {
            room_id: "r1".to_string(),
            rack_id: Some("k1".to_string()),
            shelf_id: None,
        };
        let json = serde_json::to_value(&loc).unwrap();
        assert_eq!(json["room"], "r1");
        assert_eq!(json["rack"], "k1");
        assert!(json["shelf"].is_null());
    }

    #[test]
    fn test_user_hash_not_serialized() {
        let now = Utc::now();
        let user = User {
            id: "u1".to_string(),
            username: "nurse.ed".to_string(),
            email: None,
            full_name: None,
            role: Role::User,
            password_hash: "$argon2id$secret".to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2"));
    }
}

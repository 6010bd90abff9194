//! # Error Types
//!
//! Domain-specific error types for medstore-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  medstore-core errors (this file)                                      │
//! │  ├── CoreError        - General domain errors                          │
//! │  ├── Rejection        - Reconciler refused a transaction               │
//! │  ├── HierarchyError   - Room → Rack → Shelf rule broken                │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  medstore-db errors (separate crate)                                   │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  HTTP errors (in apps/api)                                             │
//! │  └── ApiError         - Status code + JSON body                        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Browser      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::{LocationType, RecordKind};

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The reconciler refused the transaction; counters are untouched.
    #[error("{0}")]
    Rejected(#[from] Rejection),

    /// A location rule was broken.
    #[error("{0}")]
    Hierarchy(#[from] HierarchyError),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Rejection
// =============================================================================

/// Why the reconciler refused a transaction.
///
/// ## User Workflow
/// ```text
/// Item: 10 owned, 0 in maintenance
///      │
///      ▼
/// "Return from Maintenance" qty 1
///      │
///      ▼
/// apply() → Rejection::ExceedsInMaintenance { in_maintenance: 0, requested: 1 }
///      │
///      ▼
/// HTTP 400: "Cannot return more than are in maintenance (0 currently)"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Insufficient available quantity ({available} available, {requested} requested)")]
    InsufficientAvailable { available: i64, requested: i64 },

    #[error("Cannot return more than are in session ({in_session} currently)")]
    ExceedsInSession { in_session: i64, requested: i64 },

    #[error("Cannot return more than are rented out ({rented} currently)")]
    ExceedsRented { rented: i64, requested: i64 },

    #[error("Cannot return more than are in maintenance ({in_maintenance} currently)")]
    ExceedsInMaintenance { in_maintenance: i64, requested: i64 },

    #[error("Renter information (rental.rentedTo) is required for Rent Out")]
    MissingRenter,

    #[error("Session name (session.name) is required for Check Out for Session")]
    MissingSessionName,

    #[error("Destination location (toLocation) is required for Relocate")]
    MissingDestination,

    /// An explicit `recordId` does not name an open record of the right kind.
    #[error("No open {kind} record {record_id} on this item")]
    RecordNotOpen { kind: RecordKind, record_id: String },

    /// An explicit record has less outstanding than the return asks for.
    #[error("The {kind} record {record_id} has only {outstanding} outstanding, {requested} requested")]
    RecordShortfall {
        kind: RecordKind,
        record_id: String,
        outstanding: i64,
        requested: i64,
    },

    /// Counter arithmetic would overflow.
    #[error("Quantity {requested} would overflow the item counters")]
    Overflow { requested: i64 },
}

// =============================================================================
// Hierarchy Error
// =============================================================================

/// Violations of the Room → Rack → Shelf rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    #[error("A Room cannot have a parent location")]
    RoomWithParent,

    #[error("A {kind} requires a parent location")]
    MissingParent { kind: LocationType },

    #[error("A {kind} must be placed in a {expected}, not a {found}")]
    WrongParentType {
        kind: LocationType,
        expected: LocationType,
        found: LocationType,
    },

    /// Item placement names a location of the wrong type for its slot.
    #[error("Location {id} is a {found}, expected a {expected}")]
    WrongSlot {
        id: String,
        expected: LocationType,
        found: LocationType,
    },

    /// Item placement slots that are not nested in each other.
    #[error("{child} is not inside {parent}")]
    NotNested { child: String, parent: String },

    #[error("A shelf can only be given together with its rack")]
    ShelfWithoutRack,
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be a positive integer")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid barcode).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., barcode already in use).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Required`].
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_messages_name_current_count() {
        let err = Rejection::ExceedsInMaintenance {
            in_maintenance: 0,
            requested: 1,
        };
        assert_eq!(
            err.to_string(),
            "Cannot return more than are in maintenance (0 currently)"
        );

        let err = Rejection::InsufficientAvailable {
            available: 2,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient available quantity (2 available, 5 requested)"
        );
    }

    #[test]
    fn test_hierarchy_messages() {
        let err = HierarchyError::WrongParentType {
            kind: LocationType::Rack,
            expected: LocationType::Room,
            found: LocationType::Shelf,
        };
        assert_eq!(err.to_string(), "A Rack must be placed in a Room, not a Shelf");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("name").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.to_string(), "Validation error: name is required");
    }

    #[test]
    fn test_rejection_converts_to_core_error() {
        let core_err: CoreError = Rejection::MissingRenter.into();
        assert!(matches!(core_err, CoreError::Rejected(Rejection::MissingRenter)));
    }
}

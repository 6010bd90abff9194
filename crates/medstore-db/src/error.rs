//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)        CoreError (rules in medstore-core)  │
//! │       │                                 │                               │
//! │       └──────────────┬──────────────────┘                               │
//! │                      ▼                                                  │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiError (apps/api) ← Status code + JSON body                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Browser shows `message`                                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use medstore_core::{CoreError, HierarchyError, Rejection, ValidationError};
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - ID doesn't exist
    /// - Barcode lookup misses
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Barcode already on another item
    /// - Username or supplier name taken
    #[error("{field} '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation not caught earlier.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A write names another entity that does not exist.
    ///
    /// ## When This Occurs
    /// - Item placed in an unknown room
    /// - Item linked to an unknown supplier
    /// - Relocate to an unknown location
    #[error("Unknown {entity}: {id}")]
    InvalidReference { entity: String, id: String },

    /// Delete blocked by dependants.
    ///
    /// ## When This Occurs
    /// - Location still has children or items
    /// - Supplier still referenced by items
    #[error("Cannot delete {entity}: {reason}")]
    InUse { entity: String, reason: String },

    /// Optimistic version check failed.
    ///
    /// ## When This Occurs
    /// Another request changed the item between read and write, or the
    /// client sent a stale `expectedVersion`.
    #[error("{entity} {id} was modified by another request; reload and try again")]
    Conflict { entity: String, id: String },

    /// A domain rule refused the write.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates an InvalidReference error.
    pub fn invalid_reference(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::InvalidReference {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an InUse error.
    pub fn in_use(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        DbError::InUse {
            entity: entity.into(),
            reason: reason.into(),
        }
    }

    /// Whether this is a UNIQUE violation (any column).
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation { .. })
    }

    /// Whether another writer got in first.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DbError::Conflict { .. })
    }

    /// Names the entity a lock-derived conflict was about.
    pub(crate) fn on_conflict(self, entity: &str, id: &str) -> Self {
        if self.is_conflict() {
            DbError::Conflict {
                entity: entity.to_string(),
                id: id.to_string(),
            }
        } else {
            self
        }
    }

    /// Replaces the column name of a UNIQUE violation with a friendly one.
    pub(crate) fn on_duplicate(self, field: &str, value: &str) -> Self {
        if self.is_unique_violation() {
            DbError::duplicate(field, value)
        } else {
            self
        }
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Core(err.into())
    }
}

impl From<Rejection> for DbError {
    fn from(err: Rejection) -> Self {
        DbError::Core(err.into())
    }
}

impl From<HierarchyError> for DbError {
    fn from(err: HierarchyError) -> Self {
        DbError::Core(err.into())
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type,
///                               SQLITE_BUSY / SQLITE_LOCKED → DbError::Conflict
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                if db_err.code().as_deref().is_some_and(is_busy_code) {
                    return DbError::Conflict {
                        entity: "Record".to_string(),
                        id: "unknown".to_string(),
                    };
                }

                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

/// SQLite reports extended result codes; the low byte is the primary code.
/// SQLITE_BUSY is 5 (517 for BUSY_SNAPSHOT), SQLITE_LOCKED is 6.
fn is_busy_code(code: &str) -> bool {
    code.parse::<i32>()
        .is_ok_and(|code| matches!(code & 0xff, 5 | 6))
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_message() {
        let err = DbError::duplicate("Barcode", "2012345678901");
        assert_eq!(err.to_string(), "Barcode '2012345678901' already exists");
    }

    #[test]
    fn test_on_duplicate_only_rewrites_unique() {
        let raw = DbError::UniqueViolation {
            field: "items.barcode".to_string(),
            value: "unknown".to_string(),
        };
        assert_eq!(
            raw.on_duplicate("Barcode", "X1").to_string(),
            "Barcode 'X1' already exists"
        );

        let other = DbError::not_found("Item", "i1").on_duplicate("Barcode", "X1");
        assert!(matches!(other, DbError::NotFound { .. }));
    }

    #[test]
    fn test_rejection_passes_message_through() {
        let err: DbError = Rejection::MissingRenter.into();
        assert_eq!(
            err.to_string(),
            "Renter information (rental.rentedTo) is required for Rent Out"
        );
    }

    #[test]
    fn test_busy_codes() {
        assert!(is_busy_code("5"));
        assert!(is_busy_code("517"));
        assert!(is_busy_code("6"));
        assert!(is_busy_code("262"));
        assert!(!is_busy_code("19"));
        assert!(!is_busy_code("2067"));
        assert!(!is_busy_code("HY000"));
    }

    #[test]
    fn test_on_conflict_names_the_item() {
        let raw = DbError::Conflict {
            entity: "Record".to_string(),
            id: "unknown".to_string(),
        };
        let err = raw.on_conflict("Item", "item-1");
        assert_eq!(
            err.to_string(),
            "Item item-1 was modified by another request; reload and try again"
        );
        assert!(!DbError::PoolExhausted.on_conflict("Item", "x").is_conflict());
    }
}

//! # Transaction Repository
//!
//! The stock ledger. This is the only place item counters are written.
//!
//! ## Recording a Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  record(item_id, request, user)                         │
//! │                                                                         │
//! │  BEGIN IMMEDIATE                       writers queue on busy_timeout   │
//! │    │                                                                    │
//! │    ├── load item (version N)            404 if missing                  │
//! │    ├── expectedVersion != N?            409                             │
//! │    ├── reconciler::apply(counters)      400 on rejection                │
//! │    ├── Relocate: resolve Room/Rack/Shelf from the hierarchy             │
//! │    ├── open a sub-record, or settle open ones (notes appended)          │
//! │    ├── UPDATE items ... WHERE version = N   0 rows → 409                │
//! │    └── INSERT ledger row                                                │
//! │  COMMIT                                                                │
//! │                                                                         │
//! │  Any error drops the transaction: nothing is written.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The write lock is taken at `BEGIN`, so a second writer waits for the
//! first to commit and then reads the new version. A lock that outlasts
//! the busy timeout surfaces as [`DbError::Conflict`] too.

use chrono::{DateTime, Utc};
use medstore_core::ledger::{group, GroupedTransactions};
use medstore_core::location::resolve_destination;
use medstore_core::reconciler::{apply, RecordAction};
use medstore_core::records::{correlate, ItemRecords, OpenRecord, Settlement};
use medstore_core::validation::normalize_optional;
use medstore_core::{
    Item, MaintenanceDetails, MaintenanceRecord, RecordKind, RentalDetails, RentalRecord,
    SessionDetails, SessionRecord, Transaction, TransactionRequest, TransactionType,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use super::item::fetch_item;
use super::location::location_path;
use super::Page;
use crate::error::{DbError, DbResult};

const TRANSACTION_COLUMNS: &str = "id, item_id, transaction_type, quantity, from_location, to_location, \
     session_name, session_location, rental_rented_to, rental_expected_return_date, \
     maintenance_provider, maintenance_expected_end_date, record_id, performed_by, notes, timestamp";

// =============================================================================
// Types
// =============================================================================

/// The outcome of a committed transaction.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub transaction: Transaction,
    /// The item after the write.
    pub item: Item,
    /// Stock fell to the reorder level; a notification should go out.
    pub low_stock: bool,
}

/// Filters for the global ledger view.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub transaction_type: Option<TransactionType>,
    pub item: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Flat ledger row; the sub-payloads are spread over nullable columns.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: String,
    item_id: String,
    transaction_type: TransactionType,
    quantity: i64,
    from_location: Option<String>,
    to_location: Option<String>,
    session_name: Option<String>,
    session_location: Option<String>,
    rental_rented_to: Option<String>,
    rental_expected_return_date: Option<DateTime<Utc>>,
    maintenance_provider: Option<String>,
    maintenance_expected_end_date: Option<DateTime<Utc>>,
    record_id: Option<String>,
    performed_by: String,
    notes: Option<String>,
    timestamp: DateTime<Utc>,
}

impl From<TransactionRow> for Transaction {
    fn from(row: TransactionRow) -> Self {
        let session = (row.session_name.is_some() || row.session_location.is_some()).then(|| {
            SessionDetails {
                name: row.session_name,
                location: row.session_location,
            }
        });
        let rental = (row.rental_rented_to.is_some() || row.rental_expected_return_date.is_some())
            .then(|| RentalDetails {
                rented_to: row.rental_rented_to,
                expected_return_date: row.rental_expected_return_date,
            });
        let maintenance = (row.maintenance_provider.is_some()
            || row.maintenance_expected_end_date.is_some())
        .then(|| MaintenanceDetails {
            provider: row.maintenance_provider,
            expected_end_date: row.maintenance_expected_end_date,
        });

        Transaction {
            id: row.id,
            item_id: row.item_id,
            transaction_type: row.transaction_type,
            quantity: row.quantity,
            from_location: row.from_location,
            to_location: row.to_location,
            session,
            rental,
            maintenance,
            record_id: row.record_id,
            performed_by: row.performed_by,
            notes: row.notes,
            timestamp: row.timestamp,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for the ledger and its sub-records.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    /// Creates a new TransactionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    /// Validates and records one transaction atomically.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - no such item
    /// * `Err(DbError::Core(..))` - invalid request or counter shortfall
    /// * `Err(DbError::InvalidReference)` - relocate to an unknown location
    /// * `Err(DbError::Conflict)` - the item changed underneath the caller
    pub async fn record(
        &self,
        item_id: &str,
        request: &TransactionRequest,
        performed_by: &str,
    ) -> DbResult<Recorded> {
        self.record_in_tx(item_id, request, performed_by)
            .await
            .map_err(|e| e.on_conflict("Item", item_id))
    }

    async fn record_in_tx(
        &self,
        item_id: &str,
        request: &TransactionRequest,
        performed_by: &str,
    ) -> DbResult<Recorded> {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let item = fetch_item(&mut *tx, item_id)
            .await?
            .ok_or_else(|| DbError::not_found("Item", item_id))?;

        if request.expected_version.is_some_and(|v| v != item.version) {
            return Err(conflict(item_id));
        }

        let effect = apply(&item.counters(), request)?;
        let notes = normalize_optional(request.notes.clone());
        let now = Utc::now();

        debug!(
            item = %item_id,
            kind = %request.transaction_type,
            quantity = request.quantity,
            version = item.version,
            "Recording transaction"
        );

        let mut updated = item.clone();
        updated.quantity = effect.counters.quantity;
        updated.available_quantity = effect.counters.available_quantity;
        updated.current_state = effect.counters.current_state;
        updated.updated_at = now;
        updated.version = item.version + 1;

        let mut from_location = normalize_optional(request.from_location.clone());
        let to_location = request.destination().map(str::to_string);

        if effect.relocate {
            if let Some(destination) = to_location.as_deref() {
                let path = location_path(&mut *tx, destination).await?;
                updated.location = resolve_destination(&path)?;
                from_location = Some(item.location.room_id.clone());
            }
        }
        if effect.stamp_maintenance {
            updated.last_maintenance_date = Some(now);
        }

        let record_id = match effect.record {
            RecordAction::None => None,
            RecordAction::Open(kind) => {
                Some(open_record(&mut *tx, kind, item_id, request, now).await?)
            }
            RecordAction::Close(kind) => {
                let open = open_records(&mut *tx, kind, item_id).await?;
                let settlements = correlate(kind, &open, request)?;
                for settlement in &settlements {
                    settle_record(&mut *tx, kind, settlement, notes.as_deref(), now).await?;
                }
                settlements.into_iter().next().map(|s| s.record_id)
            }
        };

        let result = sqlx::query(
            r#"
            UPDATE items SET
                quantity = ?3, available_quantity = ?4,
                in_maintenance = ?5, in_session = ?6, rented = ?7,
                room_id = ?8, rack_id = ?9, shelf_id = ?10,
                last_maintenance_date = ?11, updated_at = ?12,
                version = version + 1
            WHERE id = ?1 AND version = ?2
            "#,
        )
        .bind(item_id)
        .bind(item.version)
        .bind(updated.quantity)
        .bind(updated.available_quantity)
        .bind(updated.current_state.in_maintenance)
        .bind(updated.current_state.in_session)
        .bind(updated.current_state.rented)
        .bind(&updated.location.room_id)
        .bind(&updated.location.rack_id)
        .bind(&updated.location.shelf_id)
        .bind(updated.last_maintenance_date)
        .bind(updated.updated_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(conflict(item_id));
        }

        let transaction = Transaction {
            id: Uuid::new_v4().to_string(),
            item_id: item_id.to_string(),
            transaction_type: request.transaction_type,
            quantity: request.quantity,
            from_location,
            to_location,
            session: request.session.as_ref().map(|s| SessionDetails {
                name: request.session_name().map(str::to_string),
                location: normalize_optional(s.location.clone()),
            }),
            rental: request.rental.as_ref().map(|r| RentalDetails {
                rented_to: request.rented_to().map(str::to_string),
                expected_return_date: r.expected_return_date,
            }),
            maintenance: request.maintenance.as_ref().map(|m| MaintenanceDetails {
                provider: normalize_optional(m.provider.clone()),
                expected_end_date: m.expected_end_date,
            }),
            record_id,
            performed_by: performed_by.to_string(),
            notes,
            timestamp: now,
        };
        insert_transaction(&mut *tx, &transaction).await?;

        tx.commit().await?;

        let low_stock = effect.check_low_stock && updated.is_low_stock();
        info!(
            item = %item_id,
            kind = %transaction.transaction_type,
            quantity = transaction.quantity,
            available = updated.available_quantity,
            low_stock,
            "Transaction recorded"
        );

        Ok(Recorded {
            transaction,
            item: updated,
            low_stock,
        })
    }

    /// An item's ledger, newest first.
    pub async fn list_for_item(&self, item_id: &str) -> DbResult<Vec<Transaction>> {
        let mut conn = self.pool.acquire().await?;
        ensure_item(&mut *conn, item_id).await?;

        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE item_id = ?1 \
             ORDER BY timestamp DESC, rowid DESC"
        ))
        .bind(item_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().map(Transaction::from).collect())
    }

    /// An item's ledger split into display buckets, plus its current state.
    pub async fn grouped(&self, item_id: &str) -> DbResult<GroupedTransactions> {
        let entries = self.list_for_item(item_id).await?;
        let mut conn = self.pool.acquire().await?;
        let item = fetch_item(&mut *conn, item_id)
            .await?
            .ok_or_else(|| DbError::not_found("Item", item_id))?;
        Ok(group(&item, entries))
    }

    /// Every session, rental and maintenance record of an item.
    pub async fn records(&self, item_id: &str) -> DbResult<ItemRecords> {
        let mut conn = self.pool.acquire().await?;
        ensure_item(&mut *conn, item_id).await?;

        let sessions = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, item_id, name, location, quantity, returned_quantity, started_at, ended_at, notes \
             FROM item_sessions WHERE item_id = ?1 ORDER BY started_at DESC",
        )
        .bind(item_id)
        .fetch_all(&mut *conn)
        .await?;

        let rentals = sqlx::query_as::<_, RentalRecord>(
            "SELECT id, item_id, rented_to, quantity, returned_quantity, rented_at, expected_return_date, returned_at, notes \
             FROM item_rentals WHERE item_id = ?1 ORDER BY rented_at DESC",
        )
        .bind(item_id)
        .fetch_all(&mut *conn)
        .await?;

        let maintenance = sqlx::query_as::<_, MaintenanceRecord>(
            "SELECT id, item_id, provider, quantity, returned_quantity, started_at, expected_end_date, completed_at, notes \
             FROM item_maintenance WHERE item_id = ?1 ORDER BY started_at DESC",
        )
        .bind(item_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(ItemRecords {
            sessions,
            rentals,
            maintenance,
        })
    }

    /// The global ledger, newest first.
    pub async fn list(&self, filter: &TransactionFilter) -> DbResult<Page<Transaction>> {
        let limit = filter.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = filter.offset.unwrap_or(0);

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM transactions WHERE 1 = 1");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE 1 = 1"
        ));
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY timestamp DESC, rowid DESC LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(i64::from(offset));

        let rows = query
            .build_query_as::<TransactionRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            data: rows.into_iter().map(Transaction::from).collect(),
            total,
            limit,
            offset,
        })
    }

    /// The latest `limit` ledger entries across all items.
    pub async fn recent(&self, limit: u32) -> DbResult<Vec<Transaction>> {
        let page = self
            .list(&TransactionFilter {
                limit: Some(limit),
                ..Default::default()
            })
            .await?;
        Ok(page.data)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn conflict(item_id: &str) -> DbError {
    DbError::Conflict {
        entity: "Item".to_string(),
        id: item_id.to_string(),
    }
}

async fn ensure_item(conn: &mut SqliteConnection, item_id: &str) -> DbResult<()> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM items WHERE id = ?1")
        .bind(item_id)
        .fetch_optional(conn)
        .await?;
    match exists {
        Some(_) => Ok(()),
        None => Err(DbError::not_found("Item", item_id)),
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &TransactionFilter) {
    if let Some(kind) = filter.transaction_type {
        query.push(" AND transaction_type = ").push_bind(kind);
    }
    if let Some(item) = &filter.item {
        query.push(" AND item_id = ").push_bind(item.clone());
    }
}

/// Table and column names of one record kind.
struct RecordTable {
    table: &'static str,
    /// Correlation key column, `None` for maintenance.
    key: Option<&'static str>,
    started: &'static str,
    ended: &'static str,
}

const fn record_table(kind: RecordKind) -> RecordTable {
    match kind {
        RecordKind::Session => RecordTable {
            table: "item_sessions",
            key: Some("name"),
            started: "started_at",
            ended: "ended_at",
        },
        RecordKind::Rental => RecordTable {
            table: "item_rentals",
            key: Some("rented_to"),
            started: "rented_at",
            ended: "returned_at",
        },
        RecordKind::Maintenance => RecordTable {
            table: "item_maintenance",
            key: None,
            started: "started_at",
            ended: "completed_at",
        },
    }
}

async fn open_records(
    conn: &mut SqliteConnection,
    kind: RecordKind,
    item_id: &str,
) -> DbResult<Vec<OpenRecord>> {
    let t = record_table(kind);
    let rows: Vec<(String, Option<String>, i64, DateTime<Utc>)> = sqlx::query_as(&format!(
        "SELECT id, {key}, quantity - returned_quantity, {started} FROM {table} \
         WHERE item_id = ?1 AND returned_quantity < quantity",
        key = t.key.unwrap_or("NULL"),
        started = t.started,
        table = t.table,
    ))
    .bind(item_id)
    .fetch_all(conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, key, outstanding, started_at)| OpenRecord {
            id,
            key,
            outstanding,
            started_at,
        })
        .collect())
}

async fn settle_record(
    conn: &mut SqliteConnection,
    kind: RecordKind,
    settlement: &Settlement,
    notes: Option<&str>,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let t = record_table(kind);
    debug!(kind = %kind, record = %settlement.record_id, credited = settlement.credited, closes = settlement.closes, "Settling record");

    // Return notes are appended on their own line
    sqlx::query(&format!(
        "UPDATE {table} SET returned_quantity = returned_quantity + ?2, \
         {ended} = CASE WHEN ?3 THEN ?4 ELSE {ended} END, \
         notes = CASE WHEN ?5 IS NULL THEN notes \
                      WHEN notes IS NULL OR notes = '' THEN ?5 \
                      ELSE notes || char(10) || ?5 END \
         WHERE id = ?1",
        table = t.table,
        ended = t.ended,
    ))
    .bind(&settlement.record_id)
    .bind(settlement.credited)
    .bind(settlement.closes)
    .bind(now)
    .bind(notes)
    .execute(conn)
    .await?;
    Ok(())
}

/// Inserts a new open record and returns its id.
async fn open_record(
    conn: &mut SqliteConnection,
    kind: RecordKind,
    item_id: &str,
    request: &TransactionRequest,
    now: DateTime<Utc>,
) -> DbResult<String> {
    let id = Uuid::new_v4().to_string();
    let notes = normalize_optional(request.notes.clone());

    let query = match kind {
        RecordKind::Session => sqlx::query(
            "INSERT INTO item_sessions (id, item_id, name, location, quantity, returned_quantity, started_at, notes) \
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7)",
        )
        .bind(&id)
        .bind(item_id)
        .bind(request.session_name().unwrap_or_default().to_string())
        .bind(normalize_optional(
            request.session.as_ref().and_then(|s| s.location.clone()),
        ))
        .bind(request.quantity)
        .bind(now)
        .bind(notes),

        RecordKind::Rental => sqlx::query(
            "INSERT INTO item_rentals (id, item_id, rented_to, quantity, returned_quantity, rented_at, expected_return_date, notes) \
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7)",
        )
        .bind(&id)
        .bind(item_id)
        .bind(request.rented_to().unwrap_or_default().to_string())
        .bind(request.quantity)
        .bind(now)
        .bind(request.rental.as_ref().and_then(|r| r.expected_return_date))
        .bind(notes),

        RecordKind::Maintenance => sqlx::query(
            "INSERT INTO item_maintenance (id, item_id, provider, quantity, returned_quantity, started_at, expected_end_date, notes) \
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7)",
        )
        .bind(&id)
        .bind(item_id)
        .bind(normalize_optional(
            request.maintenance.as_ref().and_then(|m| m.provider.clone()),
        ))
        .bind(request.quantity)
        .bind(now)
        .bind(request.maintenance.as_ref().and_then(|m| m.expected_end_date))
        .bind(notes),
    };

    query.execute(conn).await?;
    debug!(kind = %kind, record = %id, "Opened record");
    Ok(id)
}

async fn insert_transaction(conn: &mut SqliteConnection, t: &Transaction) -> DbResult<()> {
    let session = t.session.as_ref();
    let rental = t.rental.as_ref();
    let maintenance = t.maintenance.as_ref();

    sqlx::query(&format!(
        "INSERT INTO transactions ({TRANSACTION_COLUMNS}) VALUES \
         (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
    ))
    .bind(&t.id)
    .bind(&t.item_id)
    .bind(t.transaction_type)
    .bind(t.quantity)
    .bind(&t.from_location)
    .bind(&t.to_location)
    .bind(session.and_then(|s| s.name.clone()))
    .bind(session.and_then(|s| s.location.clone()))
    .bind(rental.and_then(|r| r.rented_to.clone()))
    .bind(rental.and_then(|r| r.expected_return_date))
    .bind(maintenance.and_then(|m| m.provider.clone()))
    .bind(maintenance.and_then(|m| m.expected_end_date))
    .bind(&t.record_id)
    .bind(&t.performed_by)
    .bind(&t.notes)
    .bind(t.timestamp)
    .execute(conn)
    .await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::*;
    use medstore_core::{CoreError, ItemLocation, Rejection, StockCounters};

    fn request(kind: TransactionType, quantity: i64) -> TransactionRequest {
        TransactionRequest::new(kind, quantity)
    }

    fn session(kind: TransactionType, quantity: i64, name: &str) -> TransactionRequest {
        TransactionRequest {
            session: Some(SessionDetails {
                name: Some(name.to_string()),
                location: Some("Sim Lab 2".to_string()),
            }),
            ..request(kind, quantity)
        }
    }

    fn rental(kind: TransactionType, quantity: i64, to: Option<&str>) -> TransactionRequest {
        TransactionRequest {
            rental: Some(RentalDetails {
                rented_to: to.map(str::to_string),
                expected_return_date: None,
            }),
            ..request(kind, quantity)
        }
    }

    async fn ledger_len(db: &crate::Database, item_id: &str) -> usize {
        db.transactions().list_for_item(item_id).await.unwrap().len()
    }

    #[tokio::test]
    async fn test_maintenance_round_trip_then_overdraw() {
        let db = test_db().await;
        let room = room(&db, "A").await;
        let item = item(&db, &room.id, 10).await;

        let sent = db
            .transactions()
            .record(&item.id, &request(TransactionType::SendToMaintenance, 3), "u1")
            .await
            .unwrap();
        assert_eq!(sent.item.available_quantity, 7);
        assert_eq!(sent.item.current_state.in_maintenance, 3);
        assert!(sent.item.last_maintenance_date.is_some());
        assert!(sent.transaction.record_id.is_some());

        let back = db
            .transactions()
            .record(&item.id, &request(TransactionType::ReturnFromMaintenance, 3), "u1")
            .await
            .unwrap();
        assert_eq!(back.item.counters(), StockCounters::new_stock(10));
        assert_eq!(back.transaction.record_id, sent.transaction.record_id);

        let err = db
            .transactions()
            .record(&item.id, &request(TransactionType::ReturnFromMaintenance, 1), "u1")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot return more than are in maintenance (0 currently)"
        );
        assert_eq!(ledger_len(&db, &item.id).await, 2);

        let records = db.transactions().records(&item.id).await.unwrap();
        assert_eq!(records.maintenance.len(), 1);
        assert_eq!(records.maintenance[0].returned_quantity, 3);
        assert!(records.maintenance[0].completed_at.is_some());
    }

    #[tokio::test]
    async fn test_rent_out_requires_renter() {
        let db = test_db().await;
        let room = room(&db, "A").await;
        let item = item(&db, &room.id, 4).await;

        let err = db
            .transactions()
            .record(&item.id, &rental(TransactionType::RentOut, 1, Some("  ")), "u1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::Rejected(Rejection::MissingRenter))
        ));

        let after = db.items().get(&item.id).await.unwrap();
        assert_eq!(after.counters(), item.counters());
        assert_eq!(after.version, item.version);
        assert_eq!(ledger_len(&db, &item.id).await, 0);
    }

    #[tokio::test]
    async fn test_insufficient_available_leaves_counters() {
        let db = test_db().await;
        let room = room(&db, "A").await;
        let item = item(&db, &room.id, 2).await;

        let err = db
            .transactions()
            .record(&item.id, &request(TransactionType::StockRemoval, 5), "u1")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Insufficient available quantity (2 available, 5 requested)"
        );
        assert_eq!(db.items().get(&item.id).await.unwrap().quantity, 2);
    }

    #[tokio::test]
    async fn test_stale_expected_version_conflicts() {
        let db = test_db().await;
        let room = room(&db, "A").await;
        let item = item(&db, &room.id, 5).await;

        db.transactions()
            .record(&item.id, &request(TransactionType::StockAddition, 1), "u1")
            .await
            .unwrap();

        let stale = TransactionRequest {
            expected_version: Some(item.version),
            ..request(TransactionType::StockRemoval, 1)
        };
        let err = db.transactions().record(&item.id, &stale, "u2").await.unwrap_err();
        assert!(matches!(err, DbError::Conflict { .. }));

        let after = db.items().get(&item.id).await.unwrap();
        assert_eq!(after.quantity, 6);
        assert_eq!(after.version, item.version + 1);
        assert_eq!(ledger_len(&db, &item.id).await, 1);
    }

    #[tokio::test]
    async fn test_rental_returns_settle_matching_renter() {
        let db = test_db().await;
        let room = room(&db, "A").await;
        let item = item(&db, &room.id, 10).await;
        let txs = db.transactions();

        txs.record(&item.id, &rental(TransactionType::RentOut, 2, Some("County EMS")), "u1")
            .await
            .unwrap();
        let hospital = txs
            .record(&item.id, &rental(TransactionType::RentOut, 3, Some("St. Mary's")), "u1")
            .await
            .unwrap();

        let partial = txs
            .record(
                &item.id,
                &rental(TransactionType::ReturnFromRental, 1, Some("county ems")),
                "u1",
            )
            .await
            .unwrap();
        assert_ne!(partial.transaction.record_id, hospital.transaction.record_id);

        let records = txs.records(&item.id).await.unwrap();
        let county = records
            .rentals
            .iter()
            .find(|r| r.rented_to == "County EMS")
            .unwrap();
        assert_eq!(county.returned_quantity, 1);
        assert!(county.returned_at.is_none());

        // Explicit id wins over the key and must have enough outstanding.
        let too_many = TransactionRequest {
            record_id: hospital.transaction.record_id.clone(),
            ..rental(TransactionType::ReturnFromRental, 4, None)
        };
        let err = txs.record(&item.id, &too_many, "u1").await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::Rejected(Rejection::RecordShortfall { outstanding: 3, .. }))
        ));

        let unknown = TransactionRequest {
            record_id: Some("nope".to_string()),
            ..rental(TransactionType::ReturnFromRental, 1, None)
        };
        assert!(matches!(
            txs.record(&item.id, &unknown, "u1").await,
            Err(DbError::Core(CoreError::Rejected(Rejection::RecordNotOpen { .. })))
        ));

        let after = db.items().get(&item.id).await.unwrap();
        assert_eq!(after.current_state.rented, 4);
        assert!(after.counters().is_consistent());
    }

    #[tokio::test]
    async fn test_session_checkout_and_return() {
        let db = test_db().await;
        let room = room(&db, "A").await;
        let item = item(&db, &room.id, 6).await;

        let checkout = TransactionRequest {
            notes: Some("Cart 3".to_string()),
            ..session(TransactionType::CheckOutForSession, 4, "ACLS Day 1")
        };
        let out = db.transactions().record(&item.id, &checkout, "u1").await.unwrap();
        assert_eq!(out.item.current_state.in_session, 4);
        assert_eq!(
            out.transaction.session.as_ref().and_then(|s| s.name.as_deref()),
            Some("ACLS Day 1")
        );

        let checkin = TransactionRequest {
            notes: Some("  one BVM cracked ".to_string()),
            ..session(TransactionType::ReturnFromSession, 4, "ACLS Day 1")
        };
        let back = db.transactions().record(&item.id, &checkin, "u1").await.unwrap();
        assert_eq!(back.transaction.record_id, out.transaction.record_id);
        assert_eq!(back.item.available_quantity, 6);

        let records = db.transactions().records(&item.id).await.unwrap();
        assert!(records.sessions[0].ended_at.is_some());
        assert_eq!(records.sessions[0].notes.as_deref(), Some("Cart 3\none BVM cracked"));
    }

    #[tokio::test]
    async fn test_return_notes_fill_an_empty_record() {
        let db = test_db().await;
        let room = room(&db, "A").await;
        let item = item(&db, &room.id, 2).await;

        db.transactions()
            .record(&item.id, &request(TransactionType::SendToMaintenance, 1), "u1")
            .await
            .unwrap();
        let back = TransactionRequest {
            notes: Some("Replaced battery".to_string()),
            ..request(TransactionType::ReturnFromMaintenance, 1)
        };
        db.transactions().record(&item.id, &back, "u1").await.unwrap();

        let records = db.transactions().records(&item.id).await.unwrap();
        assert_eq!(records.maintenance[0].notes.as_deref(), Some("Replaced battery"));
        assert!(records.maintenance[0].completed_at.is_some());
    }

    #[tokio::test]
    async fn test_return_surplus_closes_older_records() {
        let db = test_db().await;
        let room = room(&db, "A").await;
        let item = item(&db, &room.id, 5).await;

        let first = db
            .transactions()
            .record(&item.id, &request(TransactionType::SendToMaintenance, 2), "u1")
            .await
            .unwrap();
        let second = db
            .transactions()
            .record(&item.id, &request(TransactionType::SendToMaintenance, 1), "u1")
            .await
            .unwrap();

        let back = db
            .transactions()
            .record(&item.id, &request(TransactionType::ReturnFromMaintenance, 3), "u1")
            .await
            .unwrap();
        assert!(back.transaction.record_id.is_some());
        assert_eq!(back.item.current_state.in_maintenance, 0);

        let records = db.transactions().records(&item.id).await.unwrap();
        assert_eq!(records.maintenance.len(), 2);
        for record in &records.maintenance {
            assert_eq!(record.returned_quantity, record.quantity);
            assert!(record.completed_at.is_some());
        }
        for sent in [&first, &second] {
            assert!(records
                .maintenance
                .iter()
                .any(|r| Some(&r.id) == sent.transaction.record_id.as_ref()));
        }
        assert!(db.reports().maintenance_due().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_succeed_or_conflict() {
        let path = std::env::temp_dir().join(format!("medstore-{}.db", Uuid::new_v4()));
        let db = crate::Database::new(crate::DbConfig::new(path.clone()).max_connections(8))
            .await
            .unwrap();
        let room = room(&db, "A").await;
        let item = item(&db, &room.id, 16).await;

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let db = db.clone();
                let item_id = item.id.clone();
                tokio::spawn(async move {
                    db.transactions()
                        .record(&item_id, &request(TransactionType::SendToMaintenance, 1), "u1")
                        .await
                })
            })
            .collect();

        let mut recorded = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => recorded += 1,
                Err(DbError::Conflict { .. }) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert!(recorded > 0);

        let after = db.items().get(&item.id).await.unwrap();
        assert_eq!(after.current_state.in_maintenance, recorded);
        assert_eq!(after.available_quantity, 16 - recorded);
        assert_eq!(after.version, item.version + recorded);
        assert_eq!(ledger_len(&db, &item.id).await as i64, recorded);

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }

    #[tokio::test]
    async fn test_return_without_open_record_still_moves_counters() {
        let db = test_db().await;
        let room = room(&db, "A").await;
        let item = item(&db, &room.id, 3).await;

        db.transactions()
            .record(&item.id, &session(TransactionType::CheckOutForSession, 2, "PALS"), "u1")
            .await
            .unwrap();

        let other = db
            .transactions()
            .record(&item.id, &session(TransactionType::ReturnFromSession, 1, "NRP"), "u1")
            .await
            .unwrap();
        assert_eq!(other.transaction.record_id, None);
        assert_eq!(other.item.current_state.in_session, 1);
    }

    #[tokio::test]
    async fn test_relocate_to_shelf_fills_triple() {
        let db = test_db().await;
        let a = room(&db, "A").await;
        let b = room(&db, "B").await;
        let rack = rack(&db, &b, "R1").await;
        let shelf = shelf(&db, &rack, "S1").await;
        let item = item(&db, &a.id, 2).await;

        let moved = db
            .transactions()
            .record(
                &item.id,
                &TransactionRequest {
                    to_location: Some(shelf.id.clone()),
                    ..request(TransactionType::Relocate, 2)
                },
                "u1",
            )
            .await
            .unwrap();

        assert_eq!(
            moved.item.location,
            ItemLocation {
                room_id: b.id.clone(),
                rack_id: Some(rack.id.clone()),
                shelf_id: Some(shelf.id.clone()),
            }
        );
        assert_eq!(moved.transaction.from_location.as_deref(), Some(a.id.as_str()));
        assert_eq!(moved.item.counters(), item.counters());

        let missing = db
            .transactions()
            .record(
                &item.id,
                &TransactionRequest {
                    to_location: Some("nowhere".to_string()),
                    ..request(TransactionType::Relocate, 1)
                },
                "u1",
            )
            .await;
        assert!(matches!(missing, Err(DbError::InvalidReference { .. })));
    }

    #[tokio::test]
    async fn test_low_stock_flag_only_on_removal() {
        let db = test_db().await;
        let room = room(&db, "A").await;
        // reorder level is 1
        let item = item(&db, &room.id, 3).await;

        let first = db
            .transactions()
            .record(&item.id, &request(TransactionType::StockRemoval, 1), "u1")
            .await
            .unwrap();
        assert!(!first.low_stock);

        let second = db
            .transactions()
            .record(&item.id, &request(TransactionType::CheckOut, 1), "u1")
            .await
            .unwrap();
        assert!(second.low_stock);

        let rented = db
            .transactions()
            .record(&item.id, &rental(TransactionType::RentOut, 1, Some("X")), "u1")
            .await
            .unwrap();
        assert!(!rented.low_stock);
    }

    #[tokio::test]
    async fn test_grouped_and_global_listing() {
        let db = test_db().await;
        let room = room(&db, "A").await;
        let item = item(&db, &room.id, 5).await;
        let txs = db.transactions();

        txs.record(&item.id, &request(TransactionType::StockAddition, 2), "u1").await.unwrap();
        txs.record(&item.id, &request(TransactionType::Restock, 1), "u1").await.unwrap();
        txs.record(&item.id, &request(TransactionType::SendToMaintenance, 1), "u1").await.unwrap();

        let grouped = txs.grouped(&item.id).await.unwrap();
        assert_eq!(grouped.stock.len(), 1);
        assert_eq!(grouped.legacy.len(), 1);
        assert_eq!(grouped.maintenance.len(), 1);
        assert_eq!(grouped.state.quantity, 8);

        let only_restock = txs
            .list(&TransactionFilter {
                transaction_type: Some(TransactionType::Restock),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(only_restock.total, 1);

        let recent = txs.recent(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].transaction_type, TransactionType::SendToMaintenance);

        assert!(matches!(
            txs.grouped("missing").await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_item_is_not_found() {
        let db = test_db().await;
        let result = db
            .transactions()
            .record("missing", &request(TransactionType::StockAddition, 1), "u1")
            .await;
        assert!(matches!(result, Err(DbError::NotFound { .. })));
    }
}

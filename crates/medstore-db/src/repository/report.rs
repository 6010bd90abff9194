//! # Report Repository
//!
//! Read-only aggregates for the dashboard and reports pages. Everything is
//! computed on request; nothing is cached.
//!
//! ## Reports
//! ```text
//! dashboard ........ totals + low/out-of-stock counts + value + last 10 entries
//! inventory-value .. Σ quantity × unitCost, overall and per category
//! by-category ...... items and units per category
//! by-status ........ items and units per derived status
//! by-location ...... items and units per room
//! activity ......... entries and units per day and type, last N days
//! maintenance-due .. open maintenance records, overdue flagged
//! active-rentals ... open rentals, overdue flagged
//! active-sessions .. open session checkouts
//! low-stock ........ items with quantity ≤ reorderLevel
//! ```

use chrono::{DateTime, Duration, Utc};
use medstore_core::{
    Item, MaintenanceRecord, Money, RentalRecord, SessionRecord, Transaction, TransactionType,
};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tracing::debug;

use super::item::{ITEM_COLUMNS, STATUS_SQL};
use super::transaction::TransactionRepository;
use crate::error::DbResult;

/// Activity window used when the caller gives none.
pub const DEFAULT_ACTIVITY_DAYS: u32 = 30;

/// Longest activity window served.
pub const MAX_ACTIVITY_DAYS: u32 = 366;

/// Entries shown on the dashboard.
const DASHBOARD_RECENT: u32 = 10;

// =============================================================================
// Report Types
// =============================================================================

/// Stock totals across all items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InventoryTotals {
    pub total_items: i64,
    pub total_units: i64,
    pub available_units: i64,
    pub in_maintenance: i64,
    pub in_session: i64,
    pub rented: i64,
    pub low_stock_count: i64,
    pub out_of_stock_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    #[serde(flatten)]
    pub totals: InventoryTotals,
    /// Cents.
    pub inventory_value: Money,
    pub recent_transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryValue {
    pub category: String,
    pub units: i64,
    pub value: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryValue {
    pub total: Money,
    pub by_category: Vec<CategoryValue>,
}

/// Items and units under one label (category or status).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Breakdown {
    pub label: String,
    pub item_count: i64,
    pub units: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RoomBreakdown {
    pub room_id: String,
    pub room_name: String,
    pub item_count: i64,
    pub units: i64,
}

/// Ledger activity for one day and type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPoint {
    /// `YYYY-MM-DD`, UTC.
    pub day: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub count: i64,
    pub units: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceDue {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub record: MaintenanceRecord,
    pub item_name: String,
    pub barcode: String,
    #[sqlx(skip)]
    pub overdue: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRental {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub record: RentalRecord,
    pub item_name: String,
    pub barcode: String,
    #[sqlx(skip)]
    pub overdue: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSession {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub record: SessionRecord,
    pub item_name: String,
    pub barcode: String,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for reports.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    /// Creates a new ReportRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Totals, value and the latest ledger entries.
    pub async fn dashboard(&self) -> DbResult<Dashboard> {
        debug!("Building dashboard");

        let totals = sqlx::query_as::<_, InventoryTotals>(
            r#"
            SELECT
                COUNT(*)                                                AS total_items,
                COALESCE(SUM(quantity), 0)                              AS total_units,
                COALESCE(SUM(available_quantity), 0)                    AS available_units,
                COALESCE(SUM(in_maintenance), 0)                        AS in_maintenance,
                COALESCE(SUM(in_session), 0)                            AS in_session,
                COALESCE(SUM(rented), 0)                                AS rented,
                COALESCE(SUM(quantity <= reorder_level), 0)             AS low_stock_count,
                COALESCE(SUM(quantity <= 0), 0)                         AS out_of_stock_count
            FROM items
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let inventory_value = self.inventory_value().await?.total;
        let recent_transactions = TransactionRepository::new(self.pool.clone())
            .recent(DASHBOARD_RECENT)
            .await?;

        Ok(Dashboard {
            totals,
            inventory_value,
            recent_transactions,
        })
    }

    /// Stock value overall and per category, highest first.
    pub async fn inventory_value(&self) -> DbResult<InventoryValue> {
        let rows: Vec<(String, i64, i64)> =
            sqlx::query_as("SELECT category, quantity, unit_cost_cents FROM items")
                .fetch_all(&self.pool)
                .await?;

        let mut per_category: BTreeMap<String, (i64, Money)> = BTreeMap::new();
        for (category, quantity, unit_cost) in rows {
            let entry = per_category.entry(category).or_default();
            entry.0 += quantity;
            entry.1 += Money::from_cents(unit_cost).multiply_quantity(quantity);
        }

        let mut by_category: Vec<CategoryValue> = per_category
            .into_iter()
            .map(|(category, (units, value))| CategoryValue {
                category,
                units,
                value,
            })
            .collect();
        by_category.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.category.cmp(&b.category)));

        Ok(InventoryValue {
            total: by_category.iter().map(|c| c.value).sum(),
            by_category,
        })
    }

    /// Item and unit counts per category.
    pub async fn by_category(&self) -> DbResult<Vec<Breakdown>> {
        let rows = sqlx::query_as::<_, Breakdown>(
            "SELECT category AS label, COUNT(*) AS item_count, SUM(quantity) AS units \
             FROM items GROUP BY category ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Item and unit counts per derived status.
    pub async fn by_status(&self) -> DbResult<Vec<Breakdown>> {
        let rows = sqlx::query_as::<_, Breakdown>(&format!(
            "SELECT {STATUS_SQL} AS label, COUNT(*) AS item_count, SUM(quantity) AS units \
             FROM items GROUP BY label ORDER BY label"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Item and unit counts per room. Empty rooms are listed too.
    pub async fn by_location(&self) -> DbResult<Vec<RoomBreakdown>> {
        let rows = sqlx::query_as::<_, RoomBreakdown>(
            r#"
            SELECT l.id AS room_id, l.name AS room_name,
                   COUNT(i.id) AS item_count, COALESCE(SUM(i.quantity), 0) AS units
            FROM locations l
            LEFT JOIN items i ON i.room_id = l.id
            WHERE l.location_type = 'room'
            GROUP BY l.id, l.name
            ORDER BY l.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Ledger entries per day and type over the last `days` days.
    pub async fn activity(&self, days: u32) -> DbResult<Vec<ActivityPoint>> {
        let days = days.clamp(1, MAX_ACTIVITY_DAYS);
        let since: DateTime<Utc> = Utc::now() - Duration::days(i64::from(days));
        debug!(days, "Building activity report");

        let rows = sqlx::query_as::<_, ActivityPoint>(
            r#"
            SELECT substr(timestamp, 1, 10) AS day, transaction_type,
                   COUNT(*) AS count, SUM(quantity) AS units
            FROM transactions
            WHERE timestamp >= ?1
            GROUP BY day, transaction_type
            ORDER BY day, transaction_type
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Open maintenance records, soonest expected end first.
    pub async fn maintenance_due(&self) -> DbResult<Vec<MaintenanceDue>> {
        let now = Utc::now();
        let mut rows = sqlx::query_as::<_, MaintenanceDue>(
            r#"
            SELECT m.id, m.item_id, m.provider, m.quantity, m.returned_quantity,
                   m.started_at, m.expected_end_date, m.completed_at, m.notes,
                   i.name AS item_name, i.barcode
            FROM item_maintenance m
            JOIN items i ON i.id = m.item_id
            WHERE m.returned_quantity < m.quantity
            ORDER BY m.expected_end_date IS NULL, m.expected_end_date, m.started_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        for row in &mut rows {
            row.overdue = row.record.expected_end_date.is_some_and(|due| due < now);
        }
        Ok(rows)
    }

    /// Open rentals, soonest expected return first.
    pub async fn active_rentals(&self) -> DbResult<Vec<ActiveRental>> {
        let now = Utc::now();
        let mut rows = sqlx::query_as::<_, ActiveRental>(
            r#"
            SELECT r.id, r.item_id, r.rented_to, r.quantity, r.returned_quantity,
                   r.rented_at, r.expected_return_date, r.returned_at, r.notes,
                   i.name AS item_name, i.barcode
            FROM item_rentals r
            JOIN items i ON i.id = r.item_id
            WHERE r.returned_quantity < r.quantity
            ORDER BY r.expected_return_date IS NULL, r.expected_return_date, r.rented_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        for row in &mut rows {
            row.overdue = row.record.expected_return_date.is_some_and(|due| due < now);
        }
        Ok(rows)
    }

    /// Open session checkouts, oldest first.
    pub async fn active_sessions(&self) -> DbResult<Vec<ActiveSession>> {
        let rows = sqlx::query_as::<_, ActiveSession>(
            r#"
            SELECT s.id, s.item_id, s.name, s.location, s.quantity, s.returned_quantity,
                   s.started_at, s.ended_at, s.notes,
                   i.name AS item_name, i.barcode
            FROM item_sessions s
            JOIN items i ON i.id = s.item_id
            WHERE s.returned_quantity < s.quantity
            ORDER BY s.started_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Items at or below their reorder level, furthest below first.
    pub async fn low_stock(&self) -> DbResult<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE quantity <= reorder_level \
             ORDER BY quantity - reorder_level, name COLLATE NOCASE"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

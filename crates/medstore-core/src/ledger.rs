//! # Ledger Grouping
//!
//! Splits an item's history into the buckets the item detail page shows,
//! next to a snapshot of the item's current counters.

use chrono::{DateTime, Utc};
use serde::Serialize;
use ts_rs::TS;

use crate::types::{CurrentState, Item, ItemLocation, ItemStatus, LedgerBucket, Transaction};

/// The item's state at the time the history was read.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub quantity: i64,
    pub available_quantity: i64,
    pub current_state: CurrentState,
    pub status: ItemStatus,
    pub location: ItemLocation,
    #[ts(as = "Option<String>")]
    pub last_maintenance_date: Option<DateTime<Utc>>,
}

impl From<&Item> for StateSnapshot {
    fn from(item: &Item) -> Self {
        StateSnapshot {
            quantity: item.quantity,
            available_quantity: item.available_quantity,
            current_state: item.current_state,
            status: item.status(),
            location: item.location.clone(),
            last_maintenance_date: item.last_maintenance_date,
        }
    }
}

/// An item's history grouped by bucket, each newest first.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct GroupedTransactions {
    pub stock: Vec<Transaction>,
    pub location: Vec<Transaction>,
    pub session: Vec<Transaction>,
    pub rental: Vec<Transaction>,
    pub maintenance: Vec<Transaction>,
    pub legacy: Vec<Transaction>,
    pub state: StateSnapshot,
}

/// Buckets `entries` for display. Order within a bucket is newest first.
pub fn group(item: &Item, mut entries: Vec<Transaction>) -> GroupedTransactions {
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let mut grouped = GroupedTransactions {
        stock: Vec::new(),
        location: Vec::new(),
        session: Vec::new(),
        rental: Vec::new(),
        maintenance: Vec::new(),
        legacy: Vec::new(),
        state: StateSnapshot::from(item),
    };

    for entry in entries {
        let bucket = match entry.transaction_type.bucket() {
            LedgerBucket::Stock => &mut grouped.stock,
            LedgerBucket::Location => &mut grouped.location,
            LedgerBucket::Session => &mut grouped.session,
            LedgerBucket::Rental => &mut grouped.rental,
            LedgerBucket::Maintenance => &mut grouped.maintenance,
            LedgerBucket::Legacy => &mut grouped.legacy,
        };
        bucket.push(entry);
    }

    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CategoryType, TransactionType};
    use chrono::Duration;

    fn item() -> Item {
        let now = Utc::now();
        Item {
            id: "i1".to_string(),
            name: "Adult Manikin".to_string(),
            description: None,
            category: "Manikins".to_string(),
            category_type: CategoryType::Manikin,
            barcode: "2012345678901".to_string(),
            location: ItemLocation::room("a"),
            supplier_id: None,
            quantity: 4,
            available_quantity: 3,
            current_state: CurrentState {
                in_maintenance: 1,
                in_session: 0,
                rented: 0,
            },
            reorder_level: 1,
            unit_cost_cents: 250_000,
            last_maintenance_date: Some(now),
            notes: None,
            created_at: now,
            updated_at: now,
            version: 3,
        }
    }

    fn entry(id: &str, t: TransactionType, minutes_ago: i64) -> Transaction {
        Transaction {
            id: id.to_string(),
            item_id: "i1".to_string(),
            transaction_type: t,
            quantity: 1,
            from_location: None,
            to_location: None,
            session: None,
            rental: None,
            maintenance: None,
            record_id: None,
            performed_by: "u1".to_string(),
            notes: None,
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn test_group_buckets_newest_first() {
        let entries = vec![
            entry("a", TransactionType::StockAddition, 30),
            entry("b", TransactionType::SendToMaintenance, 20),
            entry("c", TransactionType::StockRemoval, 10),
            entry("d", TransactionType::Restock, 5),
        ];
        let grouped = group(&item(), entries);

        let stock: Vec<&str> = grouped.stock.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(stock, vec!["c", "a"]);
        assert_eq!(grouped.maintenance.len(), 1);
        assert_eq!(grouped.legacy[0].id, "d");
        assert!(grouped.session.is_empty());
    }

    #[test]
    fn test_snapshot_reflects_item() {
        let grouped = group(&item(), Vec::new());
        assert_eq!(grouped.state.available_quantity, 3);
        assert_eq!(grouped.state.current_state.in_maintenance, 1);
        assert_eq!(grouped.state.status, ItemStatus::Available);

        let json = serde_json::to_value(&grouped).unwrap();
        assert_eq!(json["state"]["currentState"]["inMaintenance"], 1);
    }
}

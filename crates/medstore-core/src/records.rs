//! # Sub-record Correlation
//!
//! Decides which open session, rental or maintenance record a return settles.
//!
//! ## Selection
//! ```text
//! request.recordId present?
//!   ├── yes ─► must be open, of the right kind, with enough outstanding
//!   │          else reject (400)
//!   └── no ──► key = session.name | rental.rentedTo | (none for maintenance)
//!              candidates = open records whose key matches (case-insensitive),
//!                           or every open record when no key was given
//!              credit them newest first until the return is used up
//!              none found ─► counters still move, no record is touched
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use ts_rs::TS;

use crate::error::Rejection;
use crate::types::{
    MaintenanceRecord, RecordKind, RentalRecord, SessionRecord, TransactionRequest,
};

/// The correlation-relevant view of an open record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRecord {
    pub id: String,
    /// Session name or renter; `None` for maintenance.
    pub key: Option<String>,
    pub outstanding: i64,
    pub started_at: DateTime<Utc>,
}

/// How a return is credited to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub record_id: String,
    /// Units credited, never more than were outstanding.
    pub credited: i64,
    /// The record is now fully returned.
    pub closes: bool,
}

impl From<&SessionRecord> for OpenRecord {
    fn from(r: &SessionRecord) -> Self {
        OpenRecord {
            id: r.id.clone(),
            key: Some(r.name.clone()),
            outstanding: r.quantity - r.returned_quantity,
            started_at: r.started_at,
        }
    }
}

impl From<&RentalRecord> for OpenRecord {
    fn from(r: &RentalRecord) -> Self {
        OpenRecord {
            id: r.id.clone(),
            key: Some(r.rented_to.clone()),
            outstanding: r.quantity - r.returned_quantity,
            started_at: r.rented_at,
        }
    }
}

impl From<&MaintenanceRecord> for OpenRecord {
    fn from(r: &MaintenanceRecord) -> Self {
        OpenRecord {
            id: r.id.clone(),
            key: None,
            outstanding: r.quantity - r.returned_quantity,
            started_at: r.started_at,
        }
    }
}

/// Picks the records a return of `kind` settles, primary record first.
///
/// `open` should hold only the item's open records of that kind. An empty
/// result means no record matched.
pub fn correlate(
    kind: RecordKind,
    open: &[OpenRecord],
    request: &TransactionRequest,
) -> Result<Vec<Settlement>, Rejection> {
    let requested = request.quantity;

    if let Some(record_id) = request.record_id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
        let record = open
            .iter()
            .find(|r| r.id == record_id && r.outstanding > 0)
            .ok_or_else(|| Rejection::RecordNotOpen {
                kind,
                record_id: record_id.to_string(),
            })?;

        if record.outstanding < requested {
            return Err(Rejection::RecordShortfall {
                kind,
                record_id: record.id.clone(),
                outstanding: record.outstanding,
                requested,
            });
        }
        return Ok(vec![settle(record, requested)]);
    }

    let key = match kind {
        RecordKind::Session => request.session_name(),
        RecordKind::Rental => request.rented_to(),
        RecordKind::Maintenance => None,
    };

    let mut candidates: Vec<&OpenRecord> = open
        .iter()
        .filter(|r| r.outstanding > 0)
        .filter(|r| match (key, r.key.as_deref()) {
            (None, _) => true,
            (Some(wanted), Some(have)) => wanted.eq_ignore_ascii_case(have.trim()),
            (Some(_), None) => false,
        })
        .collect();
    candidates.sort_by(|a, b| b.started_at.cmp(&a.started_at));

    let mut remaining = requested;
    let mut settlements = Vec::new();
    for record in candidates {
        if remaining <= 0 {
            break;
        }
        let settlement = settle(record, remaining);
        remaining -= settlement.credited;
        settlements.push(settlement);
    }
    Ok(settlements)
}

fn settle(record: &OpenRecord, requested: i64) -> Settlement {
    let credited = requested.min(record.outstanding);
    Settlement {
        record_id: record.id.clone(),
        credited,
        closes: credited == record.outstanding,
    }
}

/// Every sub-record of one item, open and closed, newest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecords {
    pub sessions: Vec<SessionRecord>,
    pub rentals: Vec<RentalRecord>,
    pub maintenance: Vec<MaintenanceRecord>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SessionDetails, TransactionType};
    use chrono::Duration;

    fn open(id: &str, key: Option<&str>, outstanding: i64, minutes_ago: i64) -> OpenRecord {
        OpenRecord {
            id: id.to_string(),
            key: key.map(str::to_string),
            outstanding,
            started_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    fn session_return(name: Option<&str>, n: i64) -> TransactionRequest {
        let mut request = TransactionRequest::new(TransactionType::ReturnFromSession, n);
        request.session = name.map(|name| SessionDetails {
            name: Some(name.to_string()),
            location: None,
        });
        request
    }

    #[test]
    fn test_picks_most_recent_matching_key() {
        let records = vec![
            open("old", Some("ACLS"), 2, 60),
            open("new", Some("acls"), 2, 5),
            open("other", Some("PALS"), 2, 1),
        ];
        let settlements =
            correlate(RecordKind::Session, &records, &session_return(Some("ACLS"), 2)).unwrap();
        assert_eq!(settlements.len(), 1);
        assert_eq!(settlements[0].record_id, "new");
        assert!(settlements[0].closes);
    }

    #[test]
    fn test_partial_return_keeps_record_open() {
        let records = vec![open("s1", Some("ACLS"), 5, 10)];
        let settlements =
            correlate(RecordKind::Session, &records, &session_return(Some("ACLS"), 2)).unwrap();
        assert_eq!(settlements[0].credited, 2);
        assert!(!settlements[0].closes);
    }

    #[test]
    fn test_unmatched_key_settles_nothing() {
        let records = vec![open("s1", Some("ACLS"), 5, 10)];
        let result =
            correlate(RecordKind::Session, &records, &session_return(Some("NRP"), 1)).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_no_key_uses_latest_open() {
        let records = vec![open("m1", None, 1, 30), open("m2", None, 3, 2)];
        let request = TransactionRequest::new(TransactionType::ReturnFromMaintenance, 3);
        let settlements = correlate(RecordKind::Maintenance, &records, &request).unwrap();
        assert_eq!(settlements.len(), 1);
        assert_eq!(settlements[0].record_id, "m2");
    }

    #[test]
    fn test_heuristic_credit_is_capped_at_outstanding() {
        let records = vec![open("m1", None, 1, 30)];
        let request = TransactionRequest::new(TransactionType::ReturnFromMaintenance, 3);
        let settlements = correlate(RecordKind::Maintenance, &records, &request).unwrap();
        assert_eq!(settlements.len(), 1);
        assert_eq!(settlements[0].credited, 1);
        assert!(settlements[0].closes);
    }

    #[test]
    fn test_surplus_spills_to_older_records_newest_first() {
        let records = vec![
            open("m1", None, 2, 90),
            open("m2", None, 1, 5),
            open("m3", None, 2, 30),
        ];
        let request = TransactionRequest::new(TransactionType::ReturnFromMaintenance, 4);
        let settlements = correlate(RecordKind::Maintenance, &records, &request).unwrap();

        let credited: Vec<(&str, i64, bool)> = settlements
            .iter()
            .map(|s| (s.record_id.as_str(), s.credited, s.closes))
            .collect();
        assert_eq!(credited, vec![("m2", 1, true), ("m3", 2, true), ("m1", 1, false)]);
    }

    #[test]
    fn test_spill_stays_within_matching_key() {
        let records = vec![
            open("a", Some("EMS"), 1, 5),
            open("b", Some("Nursing School"), 3, 1),
            open("c", Some("ems"), 1, 20),
        ];
        let mut request = TransactionRequest::new(TransactionType::ReturnFromRental, 3);
        request.rental = Some(crate::types::RentalDetails {
            rented_to: Some("EMS".to_string()),
            expected_return_date: None,
        });

        let settlements = correlate(RecordKind::Rental, &records, &request).unwrap();
        let ids: Vec<&str> = settlements.iter().map(|s| s.record_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(settlements.iter().map(|s| s.credited).sum::<i64>(), 2);
    }

    #[test]
    fn test_explicit_record_id_wins_over_recency() {
        let records = vec![open("m1", None, 2, 30), open("m2", None, 2, 2)];
        let mut request = TransactionRequest::new(TransactionType::ReturnFromMaintenance, 2);
        request.record_id = Some("m1".to_string());

        let settlements = correlate(RecordKind::Maintenance, &records, &request).unwrap();
        assert_eq!(settlements.len(), 1);
        assert_eq!(settlements[0].record_id, "m1");
    }

    #[test]
    fn test_explicit_record_id_must_be_open() {
        let records = vec![open("m1", None, 2, 30)];
        let mut request = TransactionRequest::new(TransactionType::ReturnFromMaintenance, 1);
        request.record_id = Some("gone".to_string());

        let err = correlate(RecordKind::Maintenance, &records, &request).unwrap_err();
        assert_eq!(err.to_string(), "No open maintenance record gone on this item");
    }

    #[test]
    fn test_explicit_record_shortfall() {
        let records = vec![open("r1", Some("EMS"), 1, 30)];
        let mut request = TransactionRequest::new(TransactionType::ReturnFromRental, 2);
        request.record_id = Some("r1".to_string());

        assert!(matches!(
            correlate(RecordKind::Rental, &records, &request),
            Err(Rejection::RecordShortfall { outstanding: 1, requested: 2, .. })
        ));
    }
}

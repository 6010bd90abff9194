//! # Stock-State Reconciler
//!
//! The single reducer over an item's counters. Every counter change in the
//! system goes through [`apply`]; the database layer only persists what it
//! returns.
//!
//! ## Transitions
//! ```text
//! ┌────────────────────────────┬──────────────────┬────────────────────────────┐
//! │ Type                       │ Precondition     │ Effect                     │
//! ├────────────────────────────┼──────────────────┼────────────────────────────┤
//! │ Stock Addition / Check-in  │ -                │ qty += n, avail += n       │
//! │   / Restock                │                  │                            │
//! │ Stock Removal / Check-out  │ avail >= n       │ qty -= n, avail -= n       │
//! │ Relocate                   │ toLocation       │ placement only             │
//! │ Check Out for Session      │ avail >= n, name │ avail -= n, session += n   │
//! │ Return from Session        │ session >= n     │ avail += n, session -= n   │
//! │ Rent Out                   │ avail >= n, to   │ avail -= n, rented += n    │
//! │ Return from Rental         │ rented >= n      │ avail += n, rented -= n    │
//! │ Send to Maintenance        │ avail >= n       │ avail -= n, maint += n     │
//! │   / Maintenance            │                  │                            │
//! │ Return from Maintenance    │ maint >= n       │ avail += n, maint -= n     │
//! └────────────────────────────┴──────────────────┴────────────────────────────┘
//! ```
//!
//! `quantity == available + in_maintenance + in_session + rented` holds for
//! every `Ok` result whose input held it.

use crate::error::{CoreError, Rejection};
use crate::types::{RecordKind, StockCounters, TransactionRequest, TransactionType};
use crate::validation::validate_transaction_quantity;

// =============================================================================
// Effect
// =============================================================================

/// What happens to sub-records as part of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordAction {
    None,
    /// Create a new open record of this kind.
    Open(RecordKind),
    /// Credit the return to an open record of this kind.
    Close(RecordKind),
}

/// The outcome of a legal transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Effect {
    pub counters: StockCounters,
    pub record: RecordAction,
    /// The item moves to `to_location`.
    pub relocate: bool,
    /// `last_maintenance_date` is set to the transaction time.
    pub stamp_maintenance: bool,
    /// Stock may have dropped to the reorder level.
    pub check_low_stock: bool,
}

impl Effect {
    fn counters_only(counters: StockCounters) -> Self {
        Effect {
            counters,
            record: RecordAction::None,
            relocate: false,
            stamp_maintenance: false,
            check_low_stock: false,
        }
    }
}

// =============================================================================
// apply
// =============================================================================

/// Validates `request` against `counters` and computes the new state.
///
/// The input is never modified; on `Err` nothing should be written.
///
/// ## Example
/// ```rust
/// use medstore_core::reconciler::apply;
/// use medstore_core::{CoreError, Rejection, StockCounters, TransactionRequest, TransactionType};
///
/// let counters = StockCounters::new_stock(10);
/// let request = TransactionRequest::new(TransactionType::ReturnFromMaintenance, 1);
///
/// let err = apply(&counters, &request).unwrap_err();
/// assert_eq!(err.to_string(), "Cannot return more than are in maintenance (0 currently)");
/// ```
pub fn apply(counters: &StockCounters, request: &TransactionRequest) -> Result<Effect, CoreError> {
    let n = request.quantity;
    validate_transaction_quantity(n)?;

    let mut next = *counters;
    let state = &mut next.current_state;

    let effect = match request.transaction_type {
        TransactionType::StockAddition | TransactionType::CheckIn | TransactionType::Restock => {
            next.quantity = add(next.quantity, n)?;
            next.available_quantity = add(next.available_quantity, n)?;
            Effect::counters_only(next)
        }

        TransactionType::StockRemoval | TransactionType::CheckOut => {
            take_available(&mut next.available_quantity, n)?;
            next.quantity -= n;
            Effect {
                check_low_stock: true,
                ..Effect::counters_only(next)
            }
        }

        TransactionType::Relocate => {
            if request.destination().is_none() {
                return Err(Rejection::MissingDestination.into());
            }
            Effect {
                relocate: true,
                ..Effect::counters_only(next)
            }
        }

        TransactionType::CheckOutForSession => {
            if request.session_name().is_none() {
                return Err(Rejection::MissingSessionName.into());
            }
            take_available(&mut next.available_quantity, n)?;
            state.in_session = add(state.in_session, n)?;
            Effect {
                record: RecordAction::Open(RecordKind::Session),
                ..Effect::counters_only(next)
            }
        }

        TransactionType::ReturnFromSession => {
            if state.in_session < n {
                return Err(Rejection::ExceedsInSession {
                    in_session: state.in_session,
                    requested: n,
                }
                .into());
            }
            state.in_session -= n;
            next.available_quantity = add(next.available_quantity, n)?;
            Effect {
                record: RecordAction::Close(RecordKind::Session),
                ..Effect::counters_only(next)
            }
        }

        TransactionType::RentOut => {
            if request.rented_to().is_none() {
                return Err(Rejection::MissingRenter.into());
            }
            take_available(&mut next.available_quantity, n)?;
            state.rented = add(state.rented, n)?;
            Effect {
                record: RecordAction::Open(RecordKind::Rental),
                ..Effect::counters_only(next)
            }
        }

        TransactionType::ReturnFromRental => {
            if state.rented < n {
                return Err(Rejection::ExceedsRented {
                    rented: state.rented,
                    requested: n,
                }
                .into());
            }
            state.rented -= n;
            next.available_quantity = add(next.available_quantity, n)?;
            Effect {
                record: RecordAction::Close(RecordKind::Rental),
                ..Effect::counters_only(next)
            }
        }

        TransactionType::SendToMaintenance | TransactionType::Maintenance => {
            take_available(&mut next.available_quantity, n)?;
            state.in_maintenance = add(state.in_maintenance, n)?;
            Effect {
                record: RecordAction::Open(RecordKind::Maintenance),
                stamp_maintenance: true,
                ..Effect::counters_only(next)
            }
        }

        TransactionType::ReturnFromMaintenance => {
            if state.in_maintenance < n {
                return Err(Rejection::ExceedsInMaintenance {
                    in_maintenance: state.in_maintenance,
                    requested: n,
                }
                .into());
            }
            state.in_maintenance -= n;
            next.available_quantity = add(next.available_quantity, n)?;
            Effect {
                record: RecordAction::Close(RecordKind::Maintenance),
                ..Effect::counters_only(next)
            }
        }
    };

    Ok(effect)
}

fn take_available(available: &mut i64, n: i64) -> Result<(), Rejection> {
    if *available < n {
        return Err(Rejection::InsufficientAvailable {
            available: *available,
            requested: n,
        });
    }
    *available -= n;
    Ok(())
}

fn add(counter: i64, n: i64) -> Result<i64, Rejection> {
    counter
        .checked_add(n)
        .ok_or(Rejection::Overflow { requested: n })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RentalDetails, SessionDetails};
    use proptest::prelude::*;

    fn request(t: TransactionType, n: i64) -> TransactionRequest {
        let mut request = TransactionRequest::new(t, n);
        request.session = Some(SessionDetails {
            name: Some("ACLS Day 1".to_string()),
            location: None,
        });
        request.rental = Some(RentalDetails {
            rented_to: Some("City Paramedics".to_string()),
            expected_return_date: None,
        });
        request.to_location = Some("room-b".to_string());
        request
    }

    fn rejection(result: Result<Effect, CoreError>) -> Rejection {
        match result {
            Err(CoreError::Rejected(r)) => r,
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_maintenance_round_trip_scenario() {
        let start = StockCounters::new_stock(10);

        let sent = apply(&start, &request(TransactionType::SendToMaintenance, 3)).unwrap();
        assert_eq!(sent.counters.available_quantity, 7);
        assert_eq!(sent.counters.current_state.in_maintenance, 3);
        assert_eq!(sent.record, RecordAction::Open(RecordKind::Maintenance));
        assert!(sent.stamp_maintenance);

        let back = apply(&sent.counters, &request(TransactionType::ReturnFromMaintenance, 3)).unwrap();
        assert_eq!(back.counters, start);
        assert_eq!(back.record, RecordAction::Close(RecordKind::Maintenance));

        let err = apply(&back.counters, &request(TransactionType::ReturnFromMaintenance, 1))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot return more than are in maintenance (0 currently)"
        );
    }

    #[test]
    fn test_rent_out_requires_renter() {
        let counters = StockCounters::new_stock(4);
        let bare = TransactionRequest::new(TransactionType::RentOut, 1);

        assert_eq!(rejection(apply(&counters, &bare)), Rejection::MissingRenter);
        assert_eq!(
            Rejection::MissingRenter.to_string(),
            "Renter information (rental.rentedTo) is required for Rent Out"
        );
    }

    #[test]
    fn test_session_requires_name() {
        let counters = StockCounters::new_stock(4);
        let bare = TransactionRequest::new(TransactionType::CheckOutForSession, 1);
        assert_eq!(rejection(apply(&counters, &bare)), Rejection::MissingSessionName);
    }

    #[test]
    fn test_relocate_requires_destination() {
        let counters = StockCounters::new_stock(4);
        let bare = TransactionRequest::new(TransactionType::Relocate, 1);
        assert_eq!(rejection(apply(&counters, &bare)), Rejection::MissingDestination);

        let effect = apply(&counters, &request(TransactionType::Relocate, 1)).unwrap();
        assert!(effect.relocate);
        assert_eq!(effect.counters, counters);
    }

    #[test]
    fn test_outflows_reject_when_short() {
        let counters = StockCounters::new_stock(2);
        for t in [
            TransactionType::StockRemoval,
            TransactionType::CheckOutForSession,
            TransactionType::RentOut,
            TransactionType::SendToMaintenance,
            TransactionType::CheckOut,
            TransactionType::Maintenance,
        ] {
            assert_eq!(
                rejection(apply(&counters, &request(t, 5))),
                Rejection::InsufficientAvailable {
                    available: 2,
                    requested: 5
                },
                "{t}"
            );
        }
    }

    #[test]
    fn test_returns_reject_when_counter_short() {
        let counters = StockCounters::new_stock(5);
        assert!(matches!(
            rejection(apply(&counters, &request(TransactionType::ReturnFromSession, 1))),
            Rejection::ExceedsInSession { in_session: 0, .. }
        ));
        assert!(matches!(
            rejection(apply(&counters, &request(TransactionType::ReturnFromRental, 1))),
            Rejection::ExceedsRented { rented: 0, .. }
        ));
    }

    #[test]
    fn test_legacy_types() {
        let counters = StockCounters::new_stock(5);

        let added = apply(&counters, &request(TransactionType::Restock, 2)).unwrap();
        assert_eq!(added.counters.quantity, 7);
        let added = apply(&counters, &request(TransactionType::CheckIn, 2)).unwrap();
        assert_eq!(added.counters.available_quantity, 7);

        let removed = apply(&counters, &request(TransactionType::CheckOut, 2)).unwrap();
        assert_eq!(removed.counters.quantity, 3);
        assert!(removed.check_low_stock);

        let maint = apply(&counters, &request(TransactionType::Maintenance, 2)).unwrap();
        assert_eq!(maint.counters.current_state.in_maintenance, 2);
        assert_eq!(maint.record, RecordAction::Open(RecordKind::Maintenance));
    }

    #[test]
    fn test_only_removals_trigger_low_stock_check() {
        let counters = StockCounters::new_stock(5);
        for t in TransactionType::ALL {
            if let Ok(effect) = apply(&counters, &request(t, 1)) {
                assert_eq!(effect.check_low_stock, t.triggers_low_stock_check(), "{t}");
            }
        }
    }

    #[test]
    fn test_non_positive_quantity_is_validation_error() {
        let counters = StockCounters::new_stock(5);
        let err = apply(&counters, &request(TransactionType::StockAddition, 0)).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_addition_overflow_is_rejected() {
        let counters = StockCounters::new_stock(i64::MAX - 1);
        assert!(matches!(
            rejection(apply(&counters, &request(TransactionType::StockAddition, 5))),
            Rejection::Overflow { .. }
        ));
    }

    // =========================================================================
    // Property tests
    // =========================================================================

    fn any_type() -> impl Strategy<Value = TransactionType> {
        prop::sample::select(TransactionType::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_sum_invariant_holds_over_any_sequence(
            start in 0i64..50,
            steps in prop::collection::vec((any_type(), 1i64..20), 0..60),
        ) {
            let mut counters = StockCounters::new_stock(start);
            for (t, n) in steps {
                if let Ok(effect) = apply(&counters, &request(t, n)) {
                    counters = effect.counters;
                }
                prop_assert!(counters.is_consistent(), "{:?}", counters);
            }
        }

        #[test]
        fn prop_rejection_leaves_input_untouched(
            start in 0i64..5,
            t in any_type(),
            n in 6i64..30,
        ) {
            let counters = StockCounters::new_stock(start);
            let before = counters;
            let _ = apply(&counters, &request(t, n));
            prop_assert_eq!(counters, before);
        }
    }
}

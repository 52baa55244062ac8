//! Reservation manager: creates, confirms, releases, and expires time-boxed
//! holds against the stock ledger.
//!
//! Termination races are resolved by idempotent "missing row = already
//! handled" semantics rather than locking the whole ledger: whoever removes
//! the reservation row first applies its counter movement; everyone else
//! no-ops.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use stockline_core::{DomainResult, OrderId, ProductId, ReservationId};
use stockline_reservations::Reservation;

use crate::ledger::StockLedger;
use crate::stores::{ReservationStore, StockStore};

/// Manages the lifecycle of stock holds.
#[derive(Debug)]
pub struct ReservationManager<S: StockStore, R: ReservationStore> {
    ledger: Arc<StockLedger<S>>,
    reservations: R,
}

impl<S: StockStore, R: ReservationStore> ReservationManager<S, R> {
    pub fn new(ledger: Arc<StockLedger<S>>, reservations: R) -> Self {
        Self {
            ledger,
            reservations,
        }
    }

    pub fn ledger(&self) -> &StockLedger<S> {
        &self.ledger
    }

    /// Place a hold for an order line.
    ///
    /// Insufficient availability surfaces as a `Conflict` for the caller to
    /// re-prompt the user; it is never retried here, since blind retry could
    /// oversell or reorder fairness between concurrent shoppers.
    pub fn reserve_stock(
        &self,
        product_id: ProductId,
        quantity: i64,
        order_id: OrderId,
        ttl_minutes: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<Reservation> {
        let reservation = Reservation::new(product_id, order_id, quantity, ttl_minutes, now)?;
        self.ledger.reserve(product_id, quantity, now)?;
        self.reservations.insert(reservation.clone());
        info!(
            reservation_id = %reservation.id_typed(),
            %product_id,
            %order_id,
            quantity,
            expires_at = %reservation.expires_at(),
            "reservation created"
        );
        Ok(reservation)
    }

    /// Release a hold and return its stock to available.
    ///
    /// Idempotent: a second release on an already-removed reservation is a
    /// no-op success, and the ledger's clamped unreserve keeps a lost race
    /// from double-decrementing. Returns whether this call did the release.
    pub fn release_reservation(&self, id: ReservationId, now: DateTime<Utc>) -> DomainResult<bool> {
        match self.reservations.remove(id) {
            Some(reservation) => {
                self.ledger
                    .unreserve(reservation.product_id(), reservation.quantity(), now)?;
                info!(reservation_id = %id, product_id = %reservation.product_id(), "reservation released");
                Ok(true)
            }
            None => {
                debug!(reservation_id = %id, "release: reservation already handled");
                Ok(false)
            }
        }
    }

    /// Release every active hold for an order (cancellation, checkout
    /// unwind).
    pub fn release_for_order(&self, order_id: OrderId, now: DateTime<Utc>) -> DomainResult<usize> {
        let holds = self.reservations.for_order(order_id);
        let count = holds.len();
        for reservation in holds {
            self.release_reservation(reservation.id_typed(), now)?;
        }
        Ok(count)
    }

    /// Turn a hold into a permanent stock deduction.
    ///
    /// At most once per reservation, enforced by deleting the row on first
    /// success. Returns whether this call applied the deduction; a missing
    /// row means the hold was already confirmed, released, or swept, and
    /// the caller decides whether that is harmless.
    pub fn confirm_reservation(&self, id: ReservationId, now: DateTime<Utc>) -> DomainResult<bool> {
        match self.reservations.remove(id) {
            Some(reservation) => {
                if let Err(err) = self.ledger.confirm_reservation(
                    reservation.product_id(),
                    reservation.quantity(),
                    now,
                ) {
                    // Put the row back so the hold is not silently lost.
                    self.reservations.insert(reservation);
                    return Err(err);
                }
                Ok(true)
            }
            None => {
                debug!(reservation_id = %id, "confirm: reservation already handled");
                Ok(false)
            }
        }
    }

    /// Release every reservation whose deadline has passed.
    ///
    /// This is the only operation that must run on a recurring schedule; a
    /// crashed or abandoned checkout must not permanently lock inventory.
    /// Safely re-entrant: a hold that a concurrent confirm already deleted
    /// is skipped.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> DomainResult<usize> {
        let expired = self.reservations.expired(now);
        let mut released = 0;
        for reservation in expired {
            let id = reservation.id_typed();
            // Same code path as a normal release; the remove-or-skip inside
            // it resolves races with concurrent confirms.
            if self.release_reservation(id, now)? {
                released += 1;
                warn!(
                    reservation_id = %id,
                    order_id = %reservation.order_id(),
                    "expired reservation swept"
                );
            }
        }
        if released > 0 {
            info!(released, "reservation sweep complete");
        }
        Ok(released)
    }

    /// Look up an active reservation.
    pub fn get(&self, id: ReservationId) -> Option<Reservation> {
        self.reservations.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::{InMemoryReservationStore, InMemoryStockStore};
    use chrono::Duration;
    use stockline_core::DomainError;
    use stockline_stock::AdjustmentReason;

    fn manager() -> ReservationManager<InMemoryStockStore, InMemoryReservationStore> {
        let ledger = Arc::new(StockLedger::new(InMemoryStockStore::new()));
        ReservationManager::new(ledger, InMemoryReservationStore::new())
    }

    fn stocked(
        manager: &ReservationManager<InMemoryStockStore, InMemoryReservationStore>,
        quantity: i64,
    ) -> ProductId {
        let product_id = ProductId::new();
        manager
            .ledger()
            .adjust(product_id, quantity, AdjustmentReason::Restock, None, Utc::now())
            .unwrap();
        product_id
    }

    #[test]
    fn reserve_holds_stock_until_released() {
        let manager = manager();
        let now = Utc::now();
        let product_id = stocked(&manager, 100);

        let reservation = manager
            .reserve_stock(product_id, 30, OrderId::new(), 15, now)
            .unwrap();
        assert_eq!(manager.ledger().get_stock(product_id, now).unwrap().available, 70);

        manager.release_reservation(reservation.id_typed(), now).unwrap();
        let levels = manager.ledger().get_stock(product_id, now).unwrap();
        assert_eq!(levels.available, 100);
        assert_eq!(levels.quantity, 100);
    }

    #[test]
    fn insufficient_stock_is_a_conflict_and_leaves_no_hold() {
        let manager = manager();
        let now = Utc::now();
        let product_id = stocked(&manager, 50);
        manager
            .reserve_stock(product_id, 45, OrderId::new(), 15, now)
            .unwrap();

        let err = manager
            .reserve_stock(product_id, 10, OrderId::new(), 15, now)
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(manager.ledger().get_stock(product_id, now).unwrap().reserved, 45);
    }

    #[test]
    fn double_release_is_a_noop_success() {
        let manager = manager();
        let now = Utc::now();
        let product_id = stocked(&manager, 10);
        let reservation = manager
            .reserve_stock(product_id, 4, OrderId::new(), 15, now)
            .unwrap();

        manager.release_reservation(reservation.id_typed(), now).unwrap();
        manager.release_reservation(reservation.id_typed(), now).unwrap();

        let levels = manager.ledger().get_stock(product_id, now).unwrap();
        assert_eq!(levels.reserved, 0);
        assert_eq!(levels.quantity, 10);
    }

    #[test]
    fn confirm_is_at_most_once() {
        let manager = manager();
        let now = Utc::now();
        let product_id = stocked(&manager, 100);
        let reservation = manager
            .reserve_stock(product_id, 30, OrderId::new(), 15, now)
            .unwrap();

        assert!(manager.confirm_reservation(reservation.id_typed(), now).unwrap());
        let levels = manager.ledger().get_stock(product_id, now).unwrap();
        assert_eq!(levels.quantity, 70);
        assert_eq!(levels.reserved, 0);

        // Second confirm finds no row; counters stay put.
        assert!(!manager.confirm_reservation(reservation.id_typed(), now).unwrap());
        let levels = manager.ledger().get_stock(product_id, now).unwrap();
        assert_eq!(levels.quantity, 70);
        assert_eq!(levels.reserved, 0);
    }

    #[test]
    fn sweep_frees_expired_holds_and_leaves_quantity_alone() {
        let manager = manager();
        let now = Utc::now();
        let product_id = stocked(&manager, 20);
        manager
            .reserve_stock(product_id, 5, OrderId::new(), 15, now)
            .unwrap();

        // 16 minutes later the hold is past its deadline.
        let later = now + Duration::minutes(16);
        let released = manager.sweep_expired(later).unwrap();
        assert_eq!(released, 1);

        let levels = manager.ledger().get_stock(product_id, later).unwrap();
        assert_eq!(levels.reserved, 0);
        assert_eq!(levels.quantity, 20);

        // Re-entrant: nothing left to sweep.
        assert_eq!(manager.sweep_expired(later).unwrap(), 0);
    }

    #[test]
    fn sweep_skips_holds_confirmed_concurrently() {
        let manager = manager();
        let now = Utc::now();
        let product_id = stocked(&manager, 20);
        let reservation = manager
            .reserve_stock(product_id, 5, OrderId::new(), 15, now)
            .unwrap();

        let later = now + Duration::minutes(16);
        manager.confirm_reservation(reservation.id_typed(), later).unwrap();
        // The sweep finds nothing; the confirm already deleted the row.
        assert_eq!(manager.sweep_expired(later).unwrap(), 0);

        let levels = manager.ledger().get_stock(product_id, later).unwrap();
        assert_eq!(levels.quantity, 15);
        assert_eq!(levels.reserved, 0);
    }

    #[test]
    fn release_for_order_unwinds_every_hold() {
        let manager = manager();
        let now = Utc::now();
        let order_id = OrderId::new();
        let p1 = stocked(&manager, 10);
        let p2 = stocked(&manager, 10);
        manager.reserve_stock(p1, 2, order_id, 15, now).unwrap();
        manager.reserve_stock(p2, 3, order_id, 15, now).unwrap();

        let released = manager.release_for_order(order_id, now).unwrap();
        assert_eq!(released, 2);
        assert_eq!(manager.ledger().get_stock(p1, now).unwrap().reserved, 0);
        assert_eq!(manager.ledger().get_stock(p2, now).unwrap().reserved, 0);
    }
}

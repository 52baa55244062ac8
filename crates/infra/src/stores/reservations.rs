use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use stockline_core::{OrderId, ReservationId};
use stockline_reservations::Reservation;

/// Storage for active reservations.
///
/// `remove` is the claim point for terminating a hold: exactly one of a
/// concurrent confirm, release, or sweep gets the row back; the losers see
/// `None` and treat the hold as already handled.
pub trait ReservationStore: Send + Sync {
    fn insert(&self, reservation: Reservation);

    fn get(&self, id: ReservationId) -> Option<Reservation>;

    /// Remove and return the reservation, if still active.
    fn remove(&self, id: ReservationId) -> Option<Reservation>;

    /// All reservations whose deadline has passed.
    fn expired(&self, now: DateTime<Utc>) -> Vec<Reservation>;

    /// Active reservations tied to one order.
    fn for_order(&self, order_id: OrderId) -> Vec<Reservation>;
}

impl<S> ReservationStore for Arc<S>
where
    S: ReservationStore + ?Sized,
{
    fn insert(&self, reservation: Reservation) {
        (**self).insert(reservation)
    }

    fn get(&self, id: ReservationId) -> Option<Reservation> {
        (**self).get(id)
    }

    fn remove(&self, id: ReservationId) -> Option<Reservation> {
        (**self).remove(id)
    }

    fn expired(&self, now: DateTime<Utc>) -> Vec<Reservation> {
        (**self).expired(now)
    }

    fn for_order(&self, order_id: OrderId) -> Vec<Reservation> {
        (**self).for_order(order_id)
    }
}

/// In-memory reservation store for tests/embedded use.
#[derive(Debug, Default)]
pub struct InMemoryReservationStore {
    inner: RwLock<HashMap<ReservationId, Reservation>>,
}

impl InMemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReservationStore for InMemoryReservationStore {
    fn insert(&self, reservation: Reservation) {
        self.inner
            .write()
            .expect("reservation store poisoned")
            .insert(reservation.id_typed(), reservation);
    }

    fn get(&self, id: ReservationId) -> Option<Reservation> {
        self.inner
            .read()
            .expect("reservation store poisoned")
            .get(&id)
            .cloned()
    }

    fn remove(&self, id: ReservationId) -> Option<Reservation> {
        self.inner
            .write()
            .expect("reservation store poisoned")
            .remove(&id)
    }

    fn expired(&self, now: DateTime<Utc>) -> Vec<Reservation> {
        self.inner
            .read()
            .expect("reservation store poisoned")
            .values()
            .filter(|r| r.is_expired(now))
            .cloned()
            .collect()
    }

    fn for_order(&self, order_id: OrderId) -> Vec<Reservation> {
        self.inner
            .read()
            .expect("reservation store poisoned")
            .values()
            .filter(|r| r.order_id() == order_id)
            .cloned()
            .collect()
    }
}

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{DomainError, DomainResult, Entity, OrderId, ProductId, ReservationId};

/// Default hold duration for an in-progress checkout.
pub const DEFAULT_TTL_MINUTES: i64 = 15;

/// A temporary, exclusive claim on `quantity` units of one product.
///
/// Referenced, never mutated, by the order lifecycle; once terminated it is
/// removed from active state and never applied again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    id: ReservationId,
    product_id: ProductId,
    order_id: OrderId,
    quantity: i64,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl Entity for Reservation {
    type Id = ReservationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Reservation {
    /// Create a hold expiring `ttl_minutes` from `now`.
    pub fn new(
        product_id: ProductId,
        order_id: OrderId,
        quantity: i64,
        ttl_minutes: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if ttl_minutes <= 0 {
            return Err(DomainError::validation("ttl must be positive"));
        }
        Ok(Self {
            id: ReservationId::new(),
            product_id,
            order_id,
            quantity,
            expires_at: now + Duration::minutes(ttl_minutes),
            created_at: now,
        })
    }

    pub fn id_typed(&self) -> ReservationId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// A hold whose deadline has passed must free its stock via the sweep;
    /// expiry is cooperative, not an automatic rollback.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{DomainError, DomainResult, Entity, ProductId, RefundRequestId, UserId};

/// Snapshot of the three numbers that matter for a product.
///
/// `available` is the only number safe to show as "in stock" to a shopper
/// mid-checkout.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevels {
    pub quantity: i64,
    pub reserved: i64,
    pub available: i64,
}

/// Why an on-hand quantity changed.
///
/// Closed set so reporting and tests can be exhaustive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdjustmentReason {
    /// Goods received into stock.
    Restock,
    /// Sold stock leaving the pool (reservation confirmed).
    Sale,
    /// Written off as damaged; not sellable.
    Damage,
    /// A refunded return going back into sellable stock.
    RefundRestock { refund_id: RefundRequestId },
    /// Moved between locations (location carried as metadata only).
    Transfer,
}

impl core::fmt::Display for AdjustmentReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AdjustmentReason::Restock => write!(f, "restock"),
            AdjustmentReason::Sale => write!(f, "sale"),
            AdjustmentReason::Damage => write!(f, "damage"),
            AdjustmentReason::RefundRestock { refund_id } => {
                write!(f, "refund_restock_{refund_id}")
            }
            AdjustmentReason::Transfer => write!(f, "transfer"),
        }
    }
}

/// Immutable record of one on-hand quantity change.
///
/// The adjustment history is append-only; it is the only source for
/// turnover and restock-prediction reporting and is never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub product_id: ProductId,
    pub delta: i64,
    pub reason: AdjustmentReason,
    pub actor: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Authoritative stock counters for one product.
///
/// One record per product; created lazily on first reference with zero
/// counts, never hard-deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    product_id: ProductId,
    quantity: i64,
    reserved: i64,
    pub min_stock_level: Option<i64>,
    pub reorder_point: Option<i64>,
    pub reorder_quantity: Option<i64>,
    updated_at: DateTime<Utc>,
}

impl Entity for StockRecord {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.product_id
    }
}

impl StockRecord {
    /// A zeroed record for a product seen for the first time.
    pub fn zeroed(product_id: ProductId, now: DateTime<Utc>) -> Self {
        Self {
            product_id,
            quantity: 0,
            reserved: 0,
            min_stock_level: None,
            reorder_point: None,
            reorder_quantity: None,
            updated_at: now,
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn reserved(&self) -> i64 {
        self.reserved
    }

    pub fn available(&self) -> i64 {
        self.quantity - self.reserved
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn levels(&self) -> StockLevels {
        StockLevels {
            quantity: self.quantity,
            reserved: self.reserved,
            available: self.available(),
        }
    }

    pub fn is_below_min(&self) -> bool {
        self.min_stock_level
            .is_some_and(|min| self.quantity < min)
    }

    pub fn needs_reorder(&self) -> bool {
        self.reorder_point
            .is_some_and(|point| self.quantity <= point)
    }

    /// Place a hold on `quantity` units.
    ///
    /// Requires `quantity <= available`; the caller must run this under the
    /// product's row lock so the check and the increment are one atomic step.
    pub fn reserve(&mut self, quantity: i64, now: DateTime<Utc>) -> DomainResult<()> {
        ensure_positive(quantity)?;
        if quantity > self.available() {
            return Err(DomainError::conflict("insufficient stock available"));
        }
        self.reserved += quantity;
        self.updated_at = now;
        Ok(())
    }

    /// Drop a hold of `quantity` units, clamped at zero.
    ///
    /// Returns the amount actually released; a shortfall means a
    /// double-release raced in, which the caller logs as a warning rather
    /// than failing (cleanup must be safe on an already-terminated hold).
    pub fn unreserve(&mut self, quantity: i64, now: DateTime<Utc>) -> DomainResult<i64> {
        ensure_positive(quantity)?;
        let released = quantity.min(self.reserved);
        self.reserved -= released;
        self.updated_at = now;
        Ok(released)
    }

    /// Turn a hold into a permanent deduction: `quantity` and `reserved`
    /// both drop by `quantity` in one step.
    ///
    /// Never expressed as separate unreserve + adjust calls; that would open
    /// a window where `available` is transiently wrong.
    pub fn confirm(&mut self, quantity: i64, now: DateTime<Utc>) -> DomainResult<()> {
        ensure_positive(quantity)?;
        if quantity > self.reserved {
            return Err(DomainError::invariant(format!(
                "confirm of {quantity} exceeds reserved {}",
                self.reserved
            )));
        }
        self.quantity -= quantity;
        self.reserved -= quantity;
        self.updated_at = now;
        Ok(())
    }

    /// Apply a signed on-hand adjustment (receipt, damage, restock, ...).
    ///
    /// Fails if the result would take `quantity` below zero, or below the
    /// currently reserved amount (both would break the ledger invariant).
    pub fn adjust(&mut self, delta: i64, now: DateTime<Utc>) -> DomainResult<()> {
        if delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }
        let new_quantity = self
            .quantity
            .checked_add(delta)
            .ok_or_else(|| DomainError::invariant("quantity overflow"))?;
        if new_quantity < 0 {
            return Err(DomainError::insufficient_stock(format!(
                "adjustment of {delta} would take quantity {} below zero",
                self.quantity
            )));
        }
        if new_quantity < self.reserved {
            return Err(DomainError::insufficient_stock(format!(
                "adjustment of {delta} would take quantity {} below reserved {}",
                self.quantity, self.reserved
            )));
        }
        self.quantity = new_quantity;
        self.updated_at = now;
        Ok(())
    }
}

fn ensure_positive(quantity: i64) -> DomainResult<()> {
    if quantity <= 0 {
        return Err(DomainError::validation("quantity must be positive"));
    }
    Ok(())
}


#[cfg(test)]
mod invariant_tests {
    use super::*;
    use proptest::prelude::*;
    use stockline_core::ProductId;

    #[derive(Debug, Clone)]
    enum Op {
        Reserve(i64),
        Unreserve(i64),
        Confirm(i64),
        Adjust(i64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1i64..40).prop_map(Op::Reserve),
            (1i64..40).prop_map(Op::Unreserve),
            (1i64..40).prop_map(Op::Confirm),
            (-40i64..40).prop_map(Op::Adjust),
        ]
    }

    proptest! {
        #[test]
        fn counters_never_violate_invariants(ops in prop::collection::vec(op_strategy(), 1..64)) {
            let now = Utc::now();
            let mut record = StockRecord::zeroed(ProductId::new(), now);
            record.adjust(100, now).unwrap();

            for op in ops {
                let before = record.clone();
                let result = match op {
                    Op::Reserve(q) => record.reserve(q, now),
                    Op::Unreserve(q) => record.unreserve(q, now).map(|_| ()),
                    Op::Confirm(q) => record.confirm(q, now),
                    Op::Adjust(d) => record.adjust(d, now),
                };

                // A failed transition must leave the counters untouched.
                if result.is_err() {
                    prop_assert_eq!(before.quantity(), record.quantity());
                    prop_assert_eq!(before.reserved(), record.reserved());
                }

                prop_assert!(record.reserved() >= 0);
                prop_assert!(record.quantity() >= record.reserved());
            }
        }
    }
}

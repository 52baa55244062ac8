//! Stock ledger service: the source of truth for quantity and reservation
//! state.
//!
//! Every mutation is a single atomic read-modify-write against the store,
//! keyed by product; no caller may read the counters and write back a
//! computed value. The lock scope is the counter mutation only, never a
//! surrounding network call.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use stockline_core::{DomainError, DomainResult, ProductId, UserId};
use stockline_stock::{AdjustmentReason, StockAdjustment, StockLevels, StockRecord};

use crate::stores::StockStore;

/// Owns the per-product on-hand/reserved counters.
#[derive(Debug)]
pub struct StockLedger<S: StockStore> {
    store: S,
}

impl<S: StockStore> StockLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Current levels for a product, creating a zeroed record on first
    /// reference. Unknown products are not an error at this layer; that
    /// check belongs to the catalog.
    pub fn get_stock(&self, product_id: ProductId, now: DateTime<Utc>) -> DomainResult<StockLevels> {
        self.store.with_record(product_id, now, |record| Ok(record.levels()))
    }

    /// Apply a signed on-hand adjustment and record it in the immutable
    /// history.
    ///
    /// A failure here is an anomaly (the invariant was already violated
    /// upstream) and is logged as such before surfacing.
    pub fn adjust(
        &self,
        product_id: ProductId,
        delta: i64,
        reason: AdjustmentReason,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<StockRecord> {
        let result = self.store.with_record(product_id, now, |record| {
            record.adjust(delta, now)?;
            Ok(record.clone())
        });

        match result {
            Ok(record) => {
                self.store.append_adjustment(StockAdjustment {
                    product_id,
                    delta,
                    reason: reason.clone(),
                    actor,
                    occurred_at: now,
                });
                info!(%product_id, delta, %reason, "stock adjusted");
                Ok(record)
            }
            Err(err @ DomainError::InsufficientStock(_)) => {
                error!(%product_id, delta, %err, "stock adjustment anomaly");
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Place a hold: availability check and increment in one atomic step, so
    /// two concurrent reserves cannot both pass the check and oversell.
    pub fn reserve(&self, product_id: ProductId, quantity: i64, now: DateTime<Utc>) -> DomainResult<()> {
        self.store.with_record(product_id, now, |record| {
            record.reserve(quantity, now)
        })?;
        debug!(%product_id, quantity, "stock reserved");
        Ok(())
    }

    /// Drop a hold, floored at zero. A double-release during a cleanup race
    /// is logged as a warning, not treated as fatal.
    pub fn unreserve(&self, product_id: ProductId, quantity: i64, now: DateTime<Utc>) -> DomainResult<()> {
        let released = self.store.with_record(product_id, now, |record| {
            record.unreserve(quantity, now)
        })?;
        if released < quantity {
            warn!(
                %product_id,
                requested = quantity,
                released,
                "unreserve clamped at zero (double release?)"
            );
        } else {
            debug!(%product_id, quantity, "stock unreserved");
        }
        Ok(())
    }

    /// Turn a hold into a permanent deduction: `quantity` and `reserved`
    /// both drop in one atomic step, and a `sale` entry lands in the history.
    pub fn confirm_reservation(
        &self,
        product_id: ProductId,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.store.with_record(product_id, now, |record| {
            record.confirm(quantity, now)
        })?;
        self.store.append_adjustment(StockAdjustment {
            product_id,
            delta: -quantity,
            reason: AdjustmentReason::Sale,
            actor: None,
            occurred_at: now,
        });
        info!(%product_id, quantity, "reservation confirmed against stock");
        Ok(())
    }

    /// Adjustment history for one product, oldest first. Append-only; the
    /// only source for turnover and restock-prediction reporting.
    pub fn history(&self, product_id: ProductId) -> Vec<StockAdjustment> {
        self.store.history(product_id)
    }

    /// Record snapshot without creating one.
    pub fn record(&self, product_id: ProductId) -> Option<StockRecord> {
        self.store.read(product_id)
    }

    /// Set the nullable planning fields on a product's record.
    pub fn set_planning_fields(
        &self,
        product_id: ProductId,
        min_stock_level: Option<i64>,
        reorder_point: Option<i64>,
        reorder_quantity: Option<i64>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.store.with_record(product_id, now, |record| {
            record.min_stock_level = min_stock_level;
            record.reorder_point = reorder_point;
            record.reorder_quantity = reorder_quantity;
            Ok(())
        })
    }

    /// Products at or below their reorder point, for replenishment reports.
    pub fn low_stock(&self) -> Vec<StockRecord> {
        self.store
            .all_records()
            .into_iter()
            .filter(|r| r.is_below_min() || r.needs_reorder())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::InMemoryStockStore;
    use stockline_core::RefundRequestId;

    fn ledger() -> StockLedger<InMemoryStockStore> {
        StockLedger::new(InMemoryStockStore::new())
    }

    #[test]
    fn get_stock_lazily_creates_a_zeroed_record() {
        let ledger = ledger();
        let levels = ledger.get_stock(ProductId::new(), Utc::now()).unwrap();
        assert_eq!(levels.quantity, 0);
        assert_eq!(levels.available, 0);
    }

    #[test]
    fn adjustments_are_recorded_in_history() {
        let ledger = ledger();
        let product_id = ProductId::new();
        let now = Utc::now();

        ledger
            .adjust(product_id, 100, AdjustmentReason::Restock, None, now)
            .unwrap();
        let refund_id = RefundRequestId::new();
        ledger
            .adjust(
                product_id,
                1,
                AdjustmentReason::RefundRestock { refund_id },
                None,
                now,
            )
            .unwrap();

        let history = ledger.history(product_id);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].delta, 100);
        assert_eq!(
            history[1].reason.to_string(),
            format!("refund_restock_{refund_id}")
        );
    }

    #[test]
    fn failed_adjustment_leaves_no_history() {
        let ledger = ledger();
        let product_id = ProductId::new();
        let now = Utc::now();

        let err = ledger
            .adjust(product_id, -5, AdjustmentReason::Damage, None, now)
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock(_)));
        assert!(ledger.history(product_id).is_empty());
    }

    #[test]
    fn confirm_records_a_sale_entry() {
        let ledger = ledger();
        let product_id = ProductId::new();
        let now = Utc::now();

        ledger
            .adjust(product_id, 100, AdjustmentReason::Restock, None, now)
            .unwrap();
        ledger.reserve(product_id, 30, now).unwrap();
        ledger.confirm_reservation(product_id, 30, now).unwrap();

        let levels = ledger.get_stock(product_id, now).unwrap();
        assert_eq!(levels.quantity, 70);
        assert_eq!(levels.reserved, 0);

        let history = ledger.history(product_id);
        assert_eq!(history.last().unwrap().delta, -30);
        assert_eq!(history.last().unwrap().reason, AdjustmentReason::Sale);
    }

    #[test]
    fn unreserve_clamp_is_not_an_error() {
        let ledger = ledger();
        let product_id = ProductId::new();
        let now = Utc::now();

        ledger
            .adjust(product_id, 10, AdjustmentReason::Restock, None, now)
            .unwrap();
        ledger.reserve(product_id, 2, now).unwrap();
        ledger.unreserve(product_id, 5, now).unwrap();

        let levels = ledger.get_stock(product_id, now).unwrap();
        assert_eq!(levels.reserved, 0);
        assert_eq!(levels.quantity, 10);
    }

    #[test]
    fn low_stock_report_reads_planning_fields() {
        let ledger = ledger();
        let product_id = ProductId::new();
        let now = Utc::now();

        ledger
            .adjust(product_id, 3, AdjustmentReason::Restock, None, now)
            .unwrap();
        assert!(ledger.low_stock().is_empty());

        ledger
            .set_planning_fields(product_id, Some(5), Some(4), Some(20), now)
            .unwrap();
        let low = ledger.low_stock();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].product_id(), product_id);
    }
}

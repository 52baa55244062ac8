use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};

use stockline_core::{DomainResult, ProductId};
use stockline_stock::{StockAdjustment, StockRecord};

/// Storage for per-product stock counters and the adjustment history.
///
/// `with_record` is the atomicity seam required by the ledger: the closure
/// executes under the product's row lock (or, against a relational backend,
/// inside a row-scoped transaction), so no component can read the counters
/// and write back a computed value without re-validating. Mutations on
/// distinct products proceed in parallel.
pub trait StockStore: Send + Sync {
    /// Run `f` against the product's record under its row lock, creating a
    /// zeroed record on first reference. The mutation is kept only when `f`
    /// returns `Ok`.
    fn with_record<R>(
        &self,
        product_id: ProductId,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut StockRecord) -> DomainResult<R>,
    ) -> DomainResult<R>;

    /// Read a snapshot without creating a record.
    fn read(&self, product_id: ProductId) -> Option<StockRecord>;

    /// Append one immutable history entry.
    fn append_adjustment(&self, adjustment: StockAdjustment);

    /// Adjustment history for one product, oldest first.
    fn history(&self, product_id: ProductId) -> Vec<StockAdjustment>;

    /// Snapshot of every known record (reporting).
    fn all_records(&self) -> Vec<StockRecord>;
}

impl<S> StockStore for Arc<S>
where
    S: StockStore + ?Sized,
{
    fn with_record<R>(
        &self,
        product_id: ProductId,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut StockRecord) -> DomainResult<R>,
    ) -> DomainResult<R> {
        (**self).with_record(product_id, now, f)
    }

    fn read(&self, product_id: ProductId) -> Option<StockRecord> {
        (**self).read(product_id)
    }

    fn append_adjustment(&self, adjustment: StockAdjustment) {
        (**self).append_adjustment(adjustment)
    }

    fn history(&self, product_id: ProductId) -> Vec<StockAdjustment> {
        (**self).history(product_id)
    }

    fn all_records(&self) -> Vec<StockRecord> {
        (**self).all_records()
    }
}

/// In-memory stock store: a map of row locks, one per product.
#[derive(Debug, Default)]
pub struct InMemoryStockStore {
    rows: RwLock<HashMap<ProductId, Arc<Mutex<StockRecord>>>>,
    history: RwLock<Vec<StockAdjustment>>,
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn row(&self, product_id: ProductId, now: DateTime<Utc>) -> Arc<Mutex<StockRecord>> {
        if let Some(row) = self
            .rows
            .read()
            .expect("stock row map poisoned")
            .get(&product_id)
        {
            return row.clone();
        }
        let mut rows = self.rows.write().expect("stock row map poisoned");
        rows.entry(product_id)
            .or_insert_with(|| Arc::new(Mutex::new(StockRecord::zeroed(product_id, now))))
            .clone()
    }
}

impl StockStore for InMemoryStockStore {
    fn with_record<R>(
        &self,
        product_id: ProductId,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut StockRecord) -> DomainResult<R>,
    ) -> DomainResult<R> {
        let row = self.row(product_id, now);
        let mut record = row.lock().expect("stock row poisoned");
        let before = record.clone();
        match f(&mut record) {
            Ok(value) => Ok(value),
            Err(err) => {
                // Failed transitions must leave the row unchanged.
                *record = before;
                Err(err)
            }
        }
    }

    fn read(&self, product_id: ProductId) -> Option<StockRecord> {
        let rows = self.rows.read().expect("stock row map poisoned");
        rows.get(&product_id)
            .map(|row| row.lock().expect("stock row poisoned").clone())
    }

    fn append_adjustment(&self, adjustment: StockAdjustment) {
        self.history
            .write()
            .expect("stock history poisoned")
            .push(adjustment);
    }

    fn history(&self, product_id: ProductId) -> Vec<StockAdjustment> {
        self.history
            .read()
            .expect("stock history poisoned")
            .iter()
            .filter(|a| a.product_id == product_id)
            .cloned()
            .collect()
    }

    fn all_records(&self) -> Vec<StockRecord> {
        let rows = self.rows.read().expect("stock row map poisoned");
        rows.values()
            .map(|row| row.lock().expect("stock row poisoned").clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockline_core::DomainError;

    #[test]
    fn first_reference_creates_a_zeroed_record() {
        let store = InMemoryStockStore::new();
        let product_id = ProductId::new();

        assert!(store.read(product_id).is_none());
        let levels = store
            .with_record(product_id, Utc::now(), |r| Ok(r.levels()))
            .unwrap();
        assert_eq!(levels.quantity, 0);
        assert_eq!(levels.reserved, 0);
        assert!(store.read(product_id).is_some());
    }

    #[test]
    fn failed_closure_rolls_the_row_back() {
        let store = InMemoryStockStore::new();
        let product_id = ProductId::new();
        store
            .with_record(product_id, Utc::now(), |r| r.adjust(10, Utc::now()))
            .unwrap();

        let err = store
            .with_record(product_id, Utc::now(), |r| {
                r.adjust(-3, Utc::now())?;
                r.adjust(-8, Utc::now())
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock(_)));
        assert_eq!(store.read(product_id).unwrap().quantity(), 10);
    }

    #[test]
    fn concurrent_reserves_never_oversell() {
        let store = Arc::new(InMemoryStockStore::new());
        let product_id = ProductId::new();
        store
            .with_record(product_id, Utc::now(), |r| r.adjust(5, Utc::now()))
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                store
                    .with_record(product_id, Utc::now(), |r| r.reserve(1, Utc::now()))
                    .is_ok()
            }));
        }
        let successes = handles
            .into_iter()
            .map(|h| h.join().expect("reserver thread panicked"))
            .filter(|ok| *ok)
            .count();

        assert_eq!(successes, 5);
        let record = store.read(product_id).unwrap();
        assert_eq!(record.reserved(), 5);
        assert_eq!(record.available(), 0);
    }
}

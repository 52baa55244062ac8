use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use stockline_core::{DomainError, DomainResult, OrderId, RefundRequestId};
use stockline_refunds::RefundRequest;

/// Storage for refund requests.
pub trait RefundStore: Send + Sync {
    fn insert(&self, request: RefundRequest) -> DomainResult<()>;

    fn get(&self, id: RefundRequestId) -> Option<RefundRequest>;

    /// Run `f` against the stored request; the mutation is kept only when
    /// `f` returns `Ok`. `NotFound` when the request does not exist.
    fn update<R>(
        &self,
        id: RefundRequestId,
        f: impl FnOnce(&mut RefundRequest) -> DomainResult<R>,
    ) -> DomainResult<R>;

    fn for_order(&self, order_id: OrderId) -> Vec<RefundRequest>;
}

impl<S> RefundStore for Arc<S>
where
    S: RefundStore + ?Sized,
{
    fn insert(&self, request: RefundRequest) -> DomainResult<()> {
        (**self).insert(request)
    }

    fn get(&self, id: RefundRequestId) -> Option<RefundRequest> {
        (**self).get(id)
    }

    fn update<R>(
        &self,
        id: RefundRequestId,
        f: impl FnOnce(&mut RefundRequest) -> DomainResult<R>,
    ) -> DomainResult<R> {
        (**self).update(id, f)
    }

    fn for_order(&self, order_id: OrderId) -> Vec<RefundRequest> {
        (**self).for_order(order_id)
    }
}

/// In-memory refund store for tests/embedded use.
#[derive(Debug, Default)]
pub struct InMemoryRefundStore {
    inner: RwLock<HashMap<RefundRequestId, RefundRequest>>,
}

impl InMemoryRefundStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RefundStore for InMemoryRefundStore {
    fn insert(&self, request: RefundRequest) -> DomainResult<()> {
        let mut map = self.inner.write().expect("refund store poisoned");
        if map.contains_key(&request.id_typed()) {
            return Err(DomainError::conflict("refund request already exists"));
        }
        map.insert(request.id_typed(), request);
        Ok(())
    }

    fn get(&self, id: RefundRequestId) -> Option<RefundRequest> {
        self.inner
            .read()
            .expect("refund store poisoned")
            .get(&id)
            .cloned()
    }

    fn update<R>(
        &self,
        id: RefundRequestId,
        f: impl FnOnce(&mut RefundRequest) -> DomainResult<R>,
    ) -> DomainResult<R> {
        let mut map = self.inner.write().expect("refund store poisoned");
        let request = map.get_mut(&id).ok_or_else(DomainError::not_found)?;
        let before = request.clone();
        match f(request) {
            Ok(value) => Ok(value),
            Err(err) => {
                *request = before;
                Err(err)
            }
        }
    }

    fn for_order(&self, order_id: OrderId) -> Vec<RefundRequest> {
        self.inner
            .read()
            .expect("refund store poisoned")
            .values()
            .filter(|r| r.order_id() == order_id)
            .cloned()
            .collect()
    }
}

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use stockline_core::{DomainError, DomainResult, OrderId};
use stockline_orders::{Order, OrderNumber};

/// Storage for orders.
///
/// `update` serializes mutations per order id; distinct orders are
/// independent (the in-memory implementation uses one map-wide lock, which
/// is stronger than required but trivially correct).
pub trait OrderStore: Send + Sync {
    /// Insert a new order; `Conflict` on duplicate id or order number.
    fn insert(&self, order: Order) -> DomainResult<()>;

    fn get(&self, id: OrderId) -> Option<Order>;

    /// Run `f` against the stored order; the mutation is kept only when `f`
    /// returns `Ok`. `NotFound` when the order does not exist.
    fn update<R>(
        &self,
        id: OrderId,
        f: impl FnOnce(&mut Order) -> DomainResult<R>,
    ) -> DomainResult<R>;

    /// Collision check for generated order numbers.
    fn order_number_exists(&self, number: &OrderNumber) -> bool;
}

impl<S> OrderStore for Arc<S>
where
    S: OrderStore + ?Sized,
{
    fn insert(&self, order: Order) -> DomainResult<()> {
        (**self).insert(order)
    }

    fn get(&self, id: OrderId) -> Option<Order> {
        (**self).get(id)
    }

    fn update<R>(
        &self,
        id: OrderId,
        f: impl FnOnce(&mut Order) -> DomainResult<R>,
    ) -> DomainResult<R> {
        (**self).update(id, f)
    }

    fn order_number_exists(&self, number: &OrderNumber) -> bool {
        (**self).order_number_exists(number)
    }
}

/// In-memory order store for tests/embedded use.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    inner: RwLock<HashMap<OrderId, Order>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OrderStore for InMemoryOrderStore {
    fn insert(&self, order: Order) -> DomainResult<()> {
        let mut map = self.inner.write().expect("order store poisoned");
        if map.contains_key(&order.id_typed()) {
            return Err(DomainError::conflict("order already exists"));
        }
        if map
            .values()
            .any(|o| o.order_number() == order.order_number())
        {
            return Err(DomainError::conflict("duplicate order number"));
        }
        map.insert(order.id_typed(), order);
        Ok(())
    }

    fn get(&self, id: OrderId) -> Option<Order> {
        self.inner
            .read()
            .expect("order store poisoned")
            .get(&id)
            .cloned()
    }

    fn update<R>(
        &self,
        id: OrderId,
        f: impl FnOnce(&mut Order) -> DomainResult<R>,
    ) -> DomainResult<R> {
        let mut map = self.inner.write().expect("order store poisoned");
        let order = map.get_mut(&id).ok_or_else(DomainError::not_found)?;
        let before = order.clone();
        match f(order) {
            Ok(value) => Ok(value),
            Err(err) => {
                *order = before;
                Err(err)
            }
        }
    }

    fn order_number_exists(&self, number: &OrderNumber) -> bool {
        self.inner
            .read()
            .expect("order store poisoned")
            .values()
            .any(|o| o.order_number() == number)
    }
}

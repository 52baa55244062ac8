//! Order lifecycle service.
//!
//! Drives the order state machine and coordinates it with reservations,
//! payment, and notifications. Stock is never touched directly here; every
//! inventory movement goes through the reservation manager and the ledger's
//! atomic operations. No lock is held across a gateway call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use stockline_core::{DomainError, DomainResult, Money, OrderId, ProductId, UserId};
use stockline_orders::{Order, OrderItem, OrderNumber, OrderStatus};
use stockline_reservations::Reservation;

use crate::config::CoreConfig;
use crate::external::{
    notify_best_effort, ChargeOutcome, Notification, NotificationService, PaymentGateway,
    ProductCatalog, RefundOutcome, RetryPolicy,
};
use crate::reservations::ReservationManager;
use crate::stores::{OrderStore, ReservationStore, StockStore};

/// One requested order line at checkout; price and name are snapshotted from
/// the catalog, never taken from the caller.
#[derive(Debug, Clone, Copy)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Outcome of a payment attempt. A gateway decline is a result, not an
/// error.
#[derive(Debug, Clone)]
pub enum PaymentResult {
    Paid(Order),
    Declined { order: Order, reason: String },
}

/// Coordinates orders with reservations, payment, and notifications.
pub struct OrderService<S: StockStore, R: ReservationStore, O: OrderStore> {
    reservations: Arc<ReservationManager<S, R>>,
    orders: O,
    catalog: Arc<dyn ProductCatalog>,
    payments: Arc<dyn PaymentGateway>,
    notifications: Arc<dyn NotificationService>,
    retry: RetryPolicy,
    config: CoreConfig,
}

impl<S: StockStore, R: ReservationStore, O: OrderStore> OrderService<S, R, O> {
    pub fn new(
        reservations: Arc<ReservationManager<S, R>>,
        orders: O,
        catalog: Arc<dyn ProductCatalog>,
        payments: Arc<dyn PaymentGateway>,
        notifications: Arc<dyn NotificationService>,
        retry: RetryPolicy,
        config: CoreConfig,
    ) -> Self {
        Self {
            reservations,
            orders,
            catalog,
            payments,
            notifications,
            retry,
            config,
        }
    }

    pub fn get_order(&self, order_id: OrderId) -> DomainResult<Order> {
        self.orders.get(order_id).ok_or_else(DomainError::not_found)
    }

    /// All-or-nothing checkout.
    ///
    /// Snapshots prices from the catalog, reserves stock for every line, and
    /// creates the pending order. If any line's reservation fails, every
    /// reservation already taken for this order is released before the error
    /// surfaces; no partial hold is left behind.
    pub fn create_order(
        &self,
        user_id: UserId,
        lines: &[OrderLine],
        discount_amount: Money,
        now: DateTime<Utc>,
    ) -> DomainResult<Order> {
        if lines.is_empty() {
            return Err(DomainError::validation("order must have at least one item"));
        }

        // Validation and price snapshotting first; no side effects yet.
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let product = self.catalog.lookup(line.product_id)?;
            items.push(OrderItem::new(
                product.product_id,
                product.name,
                line.quantity,
                product.unit_price,
            )?);
        }

        let order_id = OrderId::new();
        let order_number = self.generate_order_number(now)?;

        let mut taken: Vec<Reservation> = Vec::with_capacity(lines.len());
        for line in lines {
            match self.reservations.reserve_stock(
                line.product_id,
                line.quantity,
                order_id,
                self.config.reservation_ttl_minutes,
                now,
            ) {
                Ok(reservation) => taken.push(reservation),
                Err(err) => {
                    self.unwind(&taken, now);
                    return Err(err);
                }
            }
        }

        let mut order = match Order::create(
            order_id,
            order_number,
            user_id,
            items,
            self.config.tax_rate_bps,
            self.config.shipping_cost,
            discount_amount,
            now,
        ) {
            Ok(order) => order,
            Err(err) => {
                self.unwind(&taken, now);
                return Err(err);
            }
        };
        order.attach_reservations(taken.iter().map(|r| r.id_typed()).collect());

        if let Err(err) = self.orders.insert(order.clone()) {
            self.unwind(&taken, now);
            return Err(err);
        }

        info!(
            %order_id,
            order_number = %order.order_number(),
            lines = lines.len(),
            total = %order.total(),
            "order created"
        );
        Ok(order)
    }

    fn unwind(&self, taken: &[Reservation], now: DateTime<Utc>) {
        for reservation in taken {
            if let Err(err) = self
                .reservations
                .release_reservation(reservation.id_typed(), now)
            {
                error!(
                    reservation_id = %reservation.id_typed(),
                    %err,
                    "failed to unwind reservation during checkout rollback"
                );
            }
        }
    }

    /// Human-readable, collision-checked order number.
    fn generate_order_number(&self, now: DateTime<Utc>) -> DomainResult<OrderNumber> {
        for _ in 0..5 {
            let slug = Uuid::now_v7().simple().to_string();
            let suffix = slug[slug.len() - 6..].to_uppercase();
            let candidate = OrderNumber::new(format!("ORD-{}-{suffix}", now.format("%Y%m%d")))?;
            if !self.orders.order_number_exists(&candidate) {
                return Ok(candidate);
            }
        }
        Err(DomainError::conflict(
            "could not generate a unique order number",
        ))
    }

    /// `pending → confirmed`; no inventory side effect beyond the holds the
    /// order already carries.
    pub fn confirm_order(&self, order_id: OrderId, _now: DateTime<Utc>) -> DomainResult<Order> {
        let order = self.orders.update(order_id, |order| {
            order.confirm()?;
            Ok(order.clone())
        })?;
        notify_best_effort(&self.notifications, Notification::OrderConfirmation { order_id });
        Ok(order)
    }

    /// Capture payment for the order total.
    ///
    /// Success stamps `paid_at` and keeps the transaction reference; it does
    /// not confirm the reservations — the stock deduction happens at
    /// fulfillment start. A decline releases the order's holds and is
    /// reported as a result, not an error.
    pub fn process_payment(
        &self,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> DomainResult<PaymentResult> {
        let order = self.get_order(order_id)?;
        if order.paid_at().is_some() {
            return Err(DomainError::conflict("payment already captured"));
        }

        // Gateway call happens outside any store lock.
        let outcome = self
            .retry
            .run("payment.charge", || {
                self.payments.charge(order_id, order.total())
            })?;

        match outcome {
            ChargeOutcome::Approved { transaction_id } => {
                let order = self.orders.update(order_id, |order| {
                    order.mark_paid(transaction_id.clone(), now)?;
                    Ok(order.clone())
                })?;
                info!(%order_id, total = %order.total(), "payment captured");
                Ok(PaymentResult::Paid(order))
            }
            ChargeOutcome::Declined { reason } => {
                let order = self.orders.update(order_id, |order| {
                    order.mark_payment_failed();
                    Ok(order.clone())
                })?;
                self.reservations.release_for_order(order_id, now)?;
                warn!(%order_id, %reason, "payment declined; holds released");
                Ok(PaymentResult::Declined { order, reason })
            }
        }
    }

    /// `confirmed → processing`: the point where the order's reservations
    /// are confirmed against stock, turning the holds into deductions.
    ///
    /// Every hold must still exist; one that lapsed (swept after expiry, or
    /// released by a declined charge) means the stock may already be
    /// promised to someone else, so fulfillment stops with a `Conflict` and
    /// the caller has to re-reserve.
    pub fn begin_fulfillment(&self, order_id: OrderId, now: DateTime<Utc>) -> DomainResult<Order> {
        let order = self.get_order(order_id)?;
        for id in order.reservation_ids() {
            if self.reservations.get(*id).is_none() {
                warn!(%order_id, reservation_id = %id, "hold lapsed before fulfillment");
                return Err(DomainError::conflict(
                    "a stock hold for this order has lapsed; re-reserve before fulfilling",
                ));
            }
        }

        let reservation_ids = self.orders.update(order_id, |order| {
            order.begin_processing()?;
            Ok(order.reservation_ids().to_vec())
        })?;

        for id in &reservation_ids {
            if !self.reservations.confirm_reservation(*id, now)? {
                error!(%order_id, reservation_id = %id, "hold lapsed during fulfillment");
                return Err(DomainError::conflict(
                    "a stock hold for this order lapsed during fulfillment",
                ));
            }
        }

        self.orders.update(order_id, |order| {
            order.clear_reservations();
            Ok(order.clone())
        })
    }

    /// Ship with a tracking reference. An order still in `confirmed` moves
    /// through fulfillment first so there is exactly one deduction path.
    pub fn ship_order(
        &self,
        order_id: OrderId,
        tracking_number: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Order> {
        if self.get_order(order_id)?.status() == OrderStatus::Confirmed {
            self.begin_fulfillment(order_id, now)?;
        }

        let order = self.orders.update(order_id, |order| {
            order.ship(tracking_number, now)?;
            Ok(order.clone())
        })?;
        notify_best_effort(
            &self.notifications,
            Notification::ShippingNotification {
                order_id,
                tracking_number: tracking_number.to_string(),
            },
        );
        Ok(order)
    }

    /// `shipped → delivered`; opens the return-eligibility window.
    pub fn mark_delivered(&self, order_id: OrderId, now: DateTime<Utc>) -> DomainResult<Order> {
        let order = self.orders.update(order_id, |order| {
            order.mark_delivered(now)?;
            Ok(order.clone())
        })?;
        notify_best_effort(&self.notifications, Notification::DeliveryNotification { order_id });
        Ok(order)
    }

    /// Cancel from `pending`/`confirmed` only.
    ///
    /// Releases every active hold; if payment had already been captured, the
    /// money is refunded in full through the gateway (no restock — the stock
    /// was never deducted at this stage).
    pub fn cancel_order(&self, order_id: OrderId, now: DateTime<Utc>) -> DomainResult<Order> {
        let order = self.orders.update(order_id, |order| {
            order.cancel(now)?;
            Ok(order.clone())
        })?;

        self.reservations.release_for_order(order_id, now)?;

        if let Some(transaction_id) = order.payment_transaction_id() {
            if order.paid_at().is_some() {
                let outcome = self.retry.run("payment.refund", || {
                    self.payments
                        .refund(transaction_id, order.total(), "order_cancelled")
                })?;
                match outcome {
                    RefundOutcome::Approved { refund_id } => {
                        info!(%order_id, %refund_id, "cancelled order refunded in full");
                        return self.orders.update(order_id, |order| {
                            order.refund_payment()?;
                            Ok(order.clone())
                        });
                    }
                    RefundOutcome::Declined { reason } => {
                        error!(%order_id, %reason, "gateway declined refund for cancelled order");
                        return Err(DomainError::service_unavailable(format!(
                            "refund declined for cancelled order: {reason}"
                        )));
                    }
                }
            }
        }

        info!(%order_id, "order cancelled");
        Ok(order)
    }
}

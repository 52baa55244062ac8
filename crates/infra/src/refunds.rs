//! Refund and restock coordination.
//!
//! Walks a refund request through approval, money movement, and the optional
//! restock, and keeps the paying order consistent when a refund covers it
//! entirely. The `approved → processing` transition in the store is the only
//! gate against double payouts; everything after it is driven from the copy
//! of the request that transition returned.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use stockline_core::{DomainError, DomainResult, OrderId, RefundRequestId};
use stockline_refunds::{RefundItem, RefundReason, RefundRequest, ReturnStatus};
use stockline_stock::AdjustmentReason;

use crate::external::{
    notify_best_effort, Notification, NotificationService, PaymentGateway, RefundOutcome,
    RetryPolicy, ReturnLabel, ShipmentStatus, ShippingProvider,
};
use crate::ledger::StockLedger;
use crate::stores::{OrderStore, RefundStore, StockStore};

/// Coordinates refund requests with the payment gateway, the shipping
/// carrier, and the stock ledger.
pub struct RefundCoordinator<S: StockStore, O: OrderStore, F: RefundStore> {
    ledger: Arc<StockLedger<S>>,
    orders: O,
    refunds: F,
    payments: Arc<dyn PaymentGateway>,
    shipping: Arc<dyn ShippingProvider>,
    notifications: Arc<dyn NotificationService>,
    retry: RetryPolicy,
}

impl<S: StockStore, O: OrderStore, F: RefundStore> RefundCoordinator<S, O, F> {
    pub fn new(
        ledger: Arc<StockLedger<S>>,
        orders: O,
        refunds: F,
        payments: Arc<dyn PaymentGateway>,
        shipping: Arc<dyn ShippingProvider>,
        notifications: Arc<dyn NotificationService>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            ledger,
            orders,
            refunds,
            payments,
            shipping,
            notifications,
            retry,
        }
    }

    pub fn get_request(&self, id: RefundRequestId) -> DomainResult<RefundRequest> {
        self.refunds.get(id).ok_or_else(DomainError::not_found)
    }

    pub fn requests_for_order(&self, order_id: OrderId) -> Vec<RefundRequest> {
        self.refunds.for_order(order_id)
    }

    /// Validate and record a refund request against its order.
    pub fn create_refund_request(
        &self,
        order_id: OrderId,
        reason: RefundReason,
        items: Vec<RefundItem>,
        photos: Vec<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<RefundRequest> {
        let order = self
            .orders
            .get(order_id)
            .ok_or_else(DomainError::not_found)?;
        let request = RefundRequest::create(&order, reason, items, photos, now)?;
        self.refunds.insert(request.clone())?;
        info!(
            refund_id = %request.id_typed(),
            %order_id,
            ?reason,
            amount = %request.refund_amount(),
            "refund request created"
        );
        Ok(request)
    }

    /// Approve a pending request and issue a return label for the items
    /// coming back. Label generation is best-effort; the approval stands
    /// even when the carrier is down.
    pub fn approve_refund(&self, id: RefundRequestId) -> DomainResult<RefundRequest> {
        let request = self.refunds.update(id, |request| {
            request.approve()?;
            Ok(request.clone())
        })?;

        match self.shipping.create_return_label(request.order_id()) {
            Ok(ReturnLabel {
                label_url,
                tracking_number,
            }) => {
                info!(refund_id = %id, %label_url, %tracking_number, "return label issued");
                self.refunds.update(id, |request| {
                    request.set_return_status(ReturnStatus::LabelGenerated)?;
                    Ok(request.clone())
                })
            }
            Err(err) => {
                warn!(refund_id = %id, %err, "return label generation failed");
                Ok(request)
            }
        }
    }

    pub fn reject_refund(&self, id: RefundRequestId, now: DateTime<Utc>) -> DomainResult<RefundRequest> {
        self.refunds.update(id, |request| {
            request.reject(now)?;
            Ok(request.clone())
        })
    }

    /// Move the money and, where the items are resellable, restock them.
    ///
    /// Order of operations: claim the request (`approved → processing`),
    /// refund through the gateway, restock, complete. A gateway failure
    /// marks the request failed with the reason; a retried call then stops
    /// at the claim and nothing is paid or restocked twice.
    pub fn process_refund(
        &self,
        id: RefundRequestId,
        now: DateTime<Utc>,
    ) -> DomainResult<RefundRequest> {
        let request = self.refunds.update(id, |request| {
            request.begin_processing()?;
            Ok(request.clone())
        })?;

        let order = self
            .orders
            .get(request.order_id())
            .ok_or_else(DomainError::not_found)?;
        let Some(transaction_id) = order.payment_transaction_id() else {
            self.fail_request(id, "order has no payment transaction", now)?;
            return Err(DomainError::invariant(
                "cannot refund an order with no payment transaction",
            ));
        };

        let outcome = match self.retry.run("payment.refund", || {
            self.payments.refund(
                transaction_id,
                request.refund_amount(),
                &request.reason().to_string(),
            )
        }) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.fail_request(id, err.to_string(), now)?;
                return Err(err);
            }
        };
        let gateway_refund_id = match outcome {
            RefundOutcome::Approved { refund_id } => refund_id,
            RefundOutcome::Declined { reason } => {
                self.fail_request(id, reason.clone(), now)?;
                return Err(DomainError::service_unavailable(format!(
                    "gateway declined refund: {reason}"
                )));
            }
        };

        if request.restock_items() {
            for item in request.items() {
                self.ledger.adjust(
                    item.product_id,
                    item.quantity,
                    AdjustmentReason::RefundRestock { refund_id: id },
                    None,
                    now,
                )?;
            }
        }

        let request = self.refunds.update(id, |request| {
            request.complete(now)?;
            Ok(request.clone())
        })?;

        if request.covers_entire_order(&order) {
            self.orders.update(order.id_typed(), |order| {
                order.mark_refunded()?;
                Ok(())
            })?;
        }

        info!(
            refund_id = %id,
            order_id = %request.order_id(),
            %gateway_refund_id,
            amount = %request.refund_amount(),
            restocked = request.restock_items(),
            "refund completed"
        );
        notify_best_effort(
            &self.notifications,
            Notification::RefundCompleted {
                order_id: request.order_id(),
                amount: request.refund_amount(),
            },
        );
        Ok(request)
    }

    /// Poll the carrier for the return shipment and advance the request's
    /// return status. Repeated carrier reports of the same leg are ignored.
    pub fn update_return_tracking(
        &self,
        id: RefundRequestId,
        tracking_number: &str,
    ) -> DomainResult<RefundRequest> {
        let request = self.get_request(id)?;
        let reported = self
            .shipping
            .track_shipment(tracking_number)
            .map_err(|err| DomainError::service_unavailable(err.to_string()))?;

        let target = match reported {
            ShipmentStatus::Pending => None,
            ShipmentStatus::InTransit => Some(ReturnStatus::InTransit),
            ShipmentStatus::Delivered => Some(ReturnStatus::Received),
        };
        match target {
            Some(status) if request.return_status().is_none_or(|cur| status > cur) => {
                self.refunds.update(id, |request| {
                    request.set_return_status(status)?;
                    Ok(request.clone())
                })
            }
            _ => Ok(request),
        }
    }

    fn fail_request(
        &self,
        id: RefundRequestId,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let reason = reason.into();
        error!(refund_id = %id, %reason, "refund processing failed");
        self.refunds.update(id, |request| request.fail(reason.clone(), now))
    }
}

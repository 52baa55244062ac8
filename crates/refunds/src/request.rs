use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{DomainError, DomainResult, Entity, Money, OrderId, ProductId, RefundRequestId};
use stockline_orders::{Order, PaymentStatus};

/// Fixed period after delivery during which a refund request may be created.
pub const RETURN_WINDOW_DAYS: i64 = 30;

/// Why the customer wants their money back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundReason {
    ChangedMind,
    WrongItem,
    Defective,
    Damaged,
    NotAsDescribed,
}

impl core::fmt::Display for RefundReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RefundReason::ChangedMind => write!(f, "changed_mind"),
            RefundReason::WrongItem => write!(f, "wrong_item"),
            RefundReason::Defective => write!(f, "defective"),
            RefundReason::Damaged => write!(f, "damaged"),
            RefundReason::NotAsDescribed => write!(f, "not_as_described"),
        }
    }
}

impl RefundReason {
    /// Defective/damaged claims need photographic evidence.
    pub fn requires_photos(&self) -> bool {
        matches!(self, RefundReason::Defective | RefundReason::Damaged)
    }

    /// Damaged stock is not returned to sellable inventory.
    pub fn restockable(&self) -> bool {
        !matches!(self, RefundReason::Defective | RefundReason::Damaged)
    }
}

/// Refund request status; progresses monotonically forward except rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Approved,
    Rejected,
    Processing,
    Completed,
    Failed,
}

impl RefundStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RefundStatus::Rejected | RefundStatus::Completed | RefundStatus::Failed
        )
    }
}

/// Where the physical return currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    LabelGenerated,
    InTransit,
    Received,
    Inspected,
}

/// One returned line: must reference an ordered product with a quantity no
/// greater than what was ordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundItem {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// A customer's request to be refunded for part or all of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
    id: RefundRequestId,
    order_id: OrderId,
    reason: RefundReason,
    items: Vec<RefundItem>,
    refund_amount: Money,
    status: RefundStatus,
    restock_items: bool,
    return_status: Option<ReturnStatus>,
    photos: Vec<String>,
    created_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
    failure_reason: Option<String>,
}

impl Entity for RefundRequest {
    type Id = RefundRequestId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl RefundRequest {
    /// Validate and price a refund request against the order it refers to.
    ///
    /// The amount is computed strictly from the requested items at the
    /// order lines' snapshot prices; shipping and tax are never included,
    /// and a partial return is never a proportional share of the order
    /// total.
    pub fn create(
        order: &Order,
        reason: RefundReason,
        items: Vec<RefundItem>,
        photos: Vec<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if order.payment_status() != PaymentStatus::Paid {
            return Err(DomainError::validation(
                "refunds can only be requested for paid orders",
            ));
        }

        if let Some(delivered_at) = order.delivered_at() {
            if now > delivered_at + Duration::days(RETURN_WINDOW_DAYS) {
                return Err(DomainError::validation(format!(
                    "return window of {RETURN_WINDOW_DAYS} days has expired"
                )));
            }
        }

        if reason.requires_photos() && photos.is_empty() {
            return Err(DomainError::validation(
                "defective or damaged claims require at least one photo",
            ));
        }

        if items.is_empty() {
            return Err(DomainError::validation(
                "refund request must have at least one item",
            ));
        }

        let mut refund_amount = Money::ZERO;
        for item in &items {
            if item.quantity <= 0 {
                return Err(DomainError::validation("quantity must be positive"));
            }
            let ordered = order.ordered_quantity(item.product_id);
            if ordered == 0 {
                return Err(DomainError::validation(format!(
                    "product {} is not part of order {}",
                    item.product_id,
                    order.order_number()
                )));
            }
            if item.quantity > ordered {
                return Err(DomainError::validation(format!(
                    "cannot refund {} units of product {}; only {} were ordered",
                    item.quantity, item.product_id, ordered
                )));
            }
            // Price per order line: with the same product on several lines
            // at different snapshot prices, earlier lines are consumed first.
            let mut remaining = item.quantity;
            for line in order
                .items()
                .iter()
                .filter(|line| line.product_id == item.product_id)
            {
                if remaining == 0 {
                    break;
                }
                let take = remaining.min(line.quantity);
                refund_amount = refund_amount.checked_add(line.unit_price.times(take)?)?;
                remaining -= take;
            }
        }

        Ok(Self {
            id: RefundRequestId::new(),
            order_id: order.id_typed(),
            reason,
            items,
            refund_amount,
            status: RefundStatus::Pending,
            // Restock only what was actually deducted: an order cancelled
            // before fulfillment still holds its quantity in the ledger, and
            // restocking it would count the units twice.
            restock_items: reason.restockable() && order.fulfillment_started(),
            return_status: None,
            photos,
            created_at: now,
            resolved_at: None,
            failure_reason: None,
        })
    }

    pub fn id_typed(&self) -> RefundRequestId {
        self.id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn reason(&self) -> RefundReason {
        self.reason
    }

    pub fn items(&self) -> &[RefundItem] {
        &self.items
    }

    pub fn refund_amount(&self) -> Money {
        self.refund_amount
    }

    pub fn status(&self) -> RefundStatus {
        self.status
    }

    pub fn restock_items(&self) -> bool {
        self.restock_items
    }

    pub fn return_status(&self) -> Option<ReturnStatus> {
        self.return_status
    }

    pub fn photos(&self) -> &[String] {
        &self.photos
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.resolved_at
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// True when the requested quantities cover every ordered unit.
    pub fn covers_entire_order(&self, order: &Order) -> bool {
        order.items().iter().all(|line| {
            let requested: i64 = self
                .items
                .iter()
                .filter(|i| i.product_id == line.product_id)
                .map(|i| i.quantity)
                .sum();
            requested >= order.ordered_quantity(line.product_id)
        })
    }

    pub fn approve(&mut self) -> DomainResult<()> {
        if self.status != RefundStatus::Pending {
            return Err(DomainError::validation(
                "only pending refund requests can be approved",
            ));
        }
        self.status = RefundStatus::Approved;
        Ok(())
    }

    pub fn reject(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != RefundStatus::Pending {
            return Err(DomainError::validation(
                "only pending refund requests can be rejected",
            ));
        }
        self.status = RefundStatus::Rejected;
        self.resolved_at = Some(now);
        Ok(())
    }

    /// `approved → processing`. This transition is the restock gate: a
    /// retried process call finds the request past `approved` and stops
    /// before any money or ledger movement.
    pub fn begin_processing(&mut self) -> DomainResult<()> {
        if self.status != RefundStatus::Approved {
            return Err(DomainError::validation(
                "only approved refund requests can be processed",
            ));
        }
        self.status = RefundStatus::Processing;
        Ok(())
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != RefundStatus::Processing {
            return Err(DomainError::invariant(
                "refund can only complete from processing",
            ));
        }
        self.status = RefundStatus::Completed;
        self.resolved_at = Some(now);
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != RefundStatus::Processing {
            return Err(DomainError::invariant(
                "refund can only fail from processing",
            ));
        }
        self.status = RefundStatus::Failed;
        self.failure_reason = Some(reason.into());
        self.resolved_at = Some(now);
        Ok(())
    }

    /// Move the physical return forward; never backward.
    pub fn set_return_status(&mut self, status: ReturnStatus) -> DomainResult<()> {
        if let Some(current) = self.return_status {
            if status <= current {
                return Err(DomainError::validation(
                    "return status can only move forward",
                ));
            }
        }
        self.return_status = Some(status);
        Ok(())
    }
}

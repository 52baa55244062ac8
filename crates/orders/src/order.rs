use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{
    DomainError, DomainResult, Entity, Money, OrderId, ProductId, ReservationId, UserId,
};

/// Order status lifecycle.
///
/// `pending → confirmed → processing → shipped → delivered`, with
/// `cancelled` and `refunded` reachable as side branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Refunded
        )
    }
}

/// What has actually happened to the order's payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

/// Unique, human-referenceable order number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub fn new(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::validation("order number cannot be empty"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Order line: a snapshot of price at order time.
///
/// Immutable after creation; the catalog price may change later, the
/// snapshot never does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub subtotal: Money,
}

impl OrderItem {
    pub fn new(
        product_id: ProductId,
        name: impl Into<String>,
        quantity: i64,
        unit_price: Money,
    ) -> DomainResult<Self> {
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if unit_price.is_negative() {
            return Err(DomainError::validation("unit_price cannot be negative"));
        }
        let subtotal = unit_price.times(quantity)?;
        Ok(Self {
            product_id,
            name: name.into(),
            quantity,
            unit_price,
            subtotal,
        })
    }
}

/// Aggregate root: Order.
///
/// Created once at checkout; the item snapshot is immutable in content, only
/// status, discount and timestamps change afterwards, and only through the
/// transition methods below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    order_number: OrderNumber,
    user_id: UserId,
    status: OrderStatus,
    payment_status: PaymentStatus,
    items: Vec<OrderItem>,
    subtotal: Money,
    tax_amount: Money,
    shipping_cost: Money,
    discount_amount: Money,
    total: Money,
    reservation_ids: Vec<ReservationId>,
    payment_transaction_id: Option<String>,
    tracking_number: Option<String>,
    created_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Order {
    /// Create a pending order from price-snapshotted items.
    ///
    /// Tax is computed at the given fixed rate on the subtotal, rounded to
    /// cents at that boundary only.
    pub fn create(
        id: OrderId,
        order_number: OrderNumber,
        user_id: UserId,
        items: Vec<OrderItem>,
        tax_rate_bps: u32,
        shipping_cost: Money,
        discount_amount: Money,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if items.is_empty() {
            return Err(DomainError::validation("order must have at least one item"));
        }
        if shipping_cost.is_negative() {
            return Err(DomainError::validation("shipping_cost cannot be negative"));
        }
        if discount_amount.is_negative() {
            return Err(DomainError::validation("discount_amount cannot be negative"));
        }

        let subtotal = Money::sum(items.iter().map(|i| i.subtotal))?;
        let tax_amount = subtotal.rate_of(tax_rate_bps);
        let total = Self::total_of(subtotal, tax_amount, shipping_cost, discount_amount)?;

        Ok(Self {
            id,
            order_number,
            user_id,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            items,
            subtotal,
            tax_amount,
            shipping_cost,
            discount_amount,
            total,
            reservation_ids: Vec::new(),
            payment_transaction_id: None,
            tracking_number: None,
            created_at: now,
            paid_at: None,
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
        })
    }

    fn total_of(
        subtotal: Money,
        tax: Money,
        shipping: Money,
        discount: Money,
    ) -> DomainResult<Money> {
        let gross = subtotal.checked_add(tax)?.checked_add(shipping)?;
        if discount > gross {
            return Err(DomainError::validation(
                "discount cannot exceed subtotal plus tax and shipping",
            ));
        }
        gross.checked_sub(discount)
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn order_number(&self) -> &OrderNumber {
        &self.order_number
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn tax_amount(&self) -> Money {
        self.tax_amount
    }

    pub fn shipping_cost(&self) -> Money {
        self.shipping_cost
    }

    pub fn discount_amount(&self) -> Money {
        self.discount_amount
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn reservation_ids(&self) -> &[ReservationId] {
        &self.reservation_ids
    }

    pub fn payment_transaction_id(&self) -> Option<&str> {
        self.payment_transaction_id.as_deref()
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn shipped_at(&self) -> Option<DateTime<Utc>> {
        self.shipped_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    /// Quantity ordered for one product, summed across lines.
    pub fn ordered_quantity(&self, product_id: ProductId) -> i64 {
        self.items
            .iter()
            .filter(|i| i.product_id == product_id)
            .map(|i| i.quantity)
            .sum()
    }

    /// Derived sum of item subtotals; always equal to the stored field.
    pub fn calculate_subtotal(&self) -> DomainResult<Money> {
        Money::sum(self.items.iter().map(|i| i.subtotal))
    }

    /// Derived `subtotal + tax + shipping − discount`; always equal to the
    /// stored field.
    pub fn calculate_total(&self) -> DomainResult<Money> {
        Self::total_of(
            self.subtotal,
            self.tax_amount,
            self.shipping_cost,
            self.discount_amount,
        )
    }

    /// Link the holds taken for this order at checkout.
    pub fn attach_reservations(&mut self, ids: Vec<ReservationId>) {
        self.reservation_ids = ids;
    }

    pub fn clear_reservations(&mut self) {
        self.reservation_ids.clear();
    }

    pub fn can_be_cancelled(&self) -> bool {
        matches!(self.status, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    /// True once fulfillment has begun. Stock is deducted exactly at that
    /// transition, so a refund restocks only when this holds; an order
    /// cancelled beforehand never had its quantity leave the ledger.
    pub fn fulfillment_started(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::Delivered
        )
    }

    /// Change the discount and recompute the total.
    ///
    /// Only allowed while the order is still pending.
    pub fn apply_discount(&mut self, discount_amount: Money) -> DomainResult<()> {
        if self.status != OrderStatus::Pending {
            return Err(DomainError::validation(
                "discount can only change while the order is pending",
            ));
        }
        if discount_amount.is_negative() {
            return Err(DomainError::validation("discount_amount cannot be negative"));
        }
        let total = Self::total_of(
            self.subtotal,
            self.tax_amount,
            self.shipping_cost,
            discount_amount,
        )?;
        self.discount_amount = discount_amount;
        self.total = total;
        Ok(())
    }

    /// `pending → confirmed`: explicit confirmation, no inventory side
    /// effect beyond what the reservations already hold.
    pub fn confirm(&mut self) -> DomainResult<()> {
        if self.status != OrderStatus::Pending {
            return Err(DomainError::validation(
                "only pending orders can be confirmed",
            ));
        }
        self.status = OrderStatus::Confirmed;
        Ok(())
    }

    /// Payment success: stamps `paid_at` and keeps the gateway transaction
    /// reference for a later refund. Does not touch the ledger.
    pub fn mark_paid(
        &mut self,
        transaction_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if self.payment_status == PaymentStatus::Paid {
            return Err(DomainError::conflict("payment already captured"));
        }
        if !matches!(self.status, OrderStatus::Pending | OrderStatus::Confirmed) {
            return Err(DomainError::validation(
                "payment can only be captured for pending or confirmed orders",
            ));
        }
        self.payment_status = PaymentStatus::Paid;
        self.payment_transaction_id = Some(transaction_id.into());
        self.paid_at = Some(now);
        Ok(())
    }

    /// Gateway declined the charge; the order stays where it was.
    pub fn mark_payment_failed(&mut self) {
        self.payment_status = PaymentStatus::Failed;
    }

    /// `confirmed → processing`: fulfillment start. This is the point where
    /// the service layer confirms the order's reservations against stock.
    pub fn begin_processing(&mut self) -> DomainResult<()> {
        if self.status != OrderStatus::Confirmed {
            return Err(DomainError::validation(
                "only confirmed orders can move to processing",
            ));
        }
        if self.payment_status != PaymentStatus::Paid {
            return Err(DomainError::validation(
                "cannot begin fulfillment before payment is captured",
            ));
        }
        self.status = OrderStatus::Processing;
        Ok(())
    }

    /// `processing → shipped`: requires a tracking reference.
    pub fn ship(&mut self, tracking_number: impl Into<String>, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != OrderStatus::Processing {
            return Err(DomainError::validation(
                "only processing orders can be shipped",
            ));
        }
        let tracking_number = tracking_number.into();
        if tracking_number.trim().is_empty() {
            return Err(DomainError::validation("tracking number is required"));
        }
        self.tracking_number = Some(tracking_number);
        self.status = OrderStatus::Shipped;
        self.shipped_at = Some(now);
        Ok(())
    }

    /// `shipped → delivered`: opens the return-eligibility window.
    pub fn mark_delivered(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != OrderStatus::Shipped {
            return Err(DomainError::validation(
                "only shipped orders can be delivered",
            ));
        }
        self.status = OrderStatus::Delivered;
        self.delivered_at = Some(now);
        Ok(())
    }

    /// Cancel from `pending` or `confirmed` only; no forced transitions.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.can_be_cancelled() {
            return Err(DomainError::validation(format!(
                "order cannot be cancelled in status {:?}",
                self.status
            )));
        }
        self.status = OrderStatus::Cancelled;
        self.cancelled_at = Some(now);
        Ok(())
    }

    /// Money was returned in full, independent of the order status (used by
    /// cancel-after-payment, where no stock was ever deducted).
    pub fn refund_payment(&mut self) -> DomainResult<()> {
        if self.payment_status != PaymentStatus::Paid {
            return Err(DomainError::validation(
                "only captured payments can be refunded",
            ));
        }
        self.payment_status = PaymentStatus::Refunded;
        Ok(())
    }

    /// Full refund completed: both statuses flip to refunded.
    pub fn mark_refunded(&mut self) -> DomainResult<()> {
        self.refund_payment()?;
        self.status = OrderStatus::Refunded;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_items() -> Vec<OrderItem> {
        vec![
            OrderItem::new(ProductId::new(), "widget", 2, Money::from_cents(50_00)).unwrap(),
            OrderItem::new(ProductId::new(), "gadget", 1, Money::from_cents(150_00)).unwrap(),
        ]
    }

    fn test_order() -> Order {
        Order::create(
            OrderId::new(),
            OrderNumber::new("ORD-20260830-ABC123").unwrap(),
            UserId::new(),
            test_items(),
            0,
            Money::ZERO,
            Money::ZERO,
            Utc::now(),
        )
        .unwrap()
    }

    fn paid_confirmed_order() -> Order {
        let mut order = test_order();
        order.confirm().unwrap();
        order.mark_paid("txn-test", Utc::now()).unwrap();
        order
    }

    #[test]
    fn totals_follow_the_fixed_formula() {
        // Scenario: subtotal 250.00, then a 25.00 discount.
        let mut order = Order::create(
            OrderId::new(),
            OrderNumber::new("ORD-1").unwrap(),
            UserId::new(),
            test_items(),
            800, // 8% tax
            Money::from_cents(10_00),
            Money::ZERO,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(order.subtotal(), Money::from_cents(250_00));
        assert_eq!(order.tax_amount(), Money::from_cents(20_00));
        assert_eq!(order.total(), Money::from_cents(280_00));

        order.apply_discount(Money::from_cents(25_00)).unwrap();
        assert_eq!(order.total(), Money::from_cents(255_00));
        assert_eq!(order.calculate_total().unwrap(), order.total());
        assert_eq!(order.calculate_subtotal().unwrap(), order.subtotal());
    }

    #[test]
    fn order_requires_at_least_one_item() {
        let err = Order::create(
            OrderId::new(),
            OrderNumber::new("ORD-2").unwrap(),
            UserId::new(),
            vec![],
            0,
            Money::ZERO,
            Money::ZERO,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn item_quantity_must_be_positive() {
        let err =
            OrderItem::new(ProductId::new(), "widget", 0, Money::from_cents(100)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn payment_stamps_paid_at_without_changing_status() {
        let mut order = test_order();
        let now = Utc::now();
        order.mark_paid("txn-test", now).unwrap();

        assert_eq!(order.payment_status(), PaymentStatus::Paid);
        assert_eq!(order.paid_at(), Some(now));
        assert_eq!(order.status(), OrderStatus::Pending);
    }

    #[test]
    fn double_payment_capture_conflicts() {
        let mut order = test_order();
        order.mark_paid("txn-test", Utc::now()).unwrap();
        let err = order.mark_paid("txn-test", Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn fulfillment_requires_captured_payment() {
        let mut order = test_order();
        order.confirm().unwrap();
        let err = order.begin_processing().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn shipping_requires_a_tracking_reference() {
        let mut order = paid_confirmed_order();
        order.begin_processing().unwrap();
        let err = order.ship("  ", Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        order.ship("TRK-123", Utc::now()).unwrap();
        assert_eq!(order.status(), OrderStatus::Shipped);
        assert!(order.shipped_at().is_some());
        assert_eq!(order.tracking_number(), Some("TRK-123"));
    }

    #[test]
    fn cancel_is_rejected_once_fulfillment_started() {
        let mut order = paid_confirmed_order();
        order.begin_processing().unwrap();

        assert!(!order.can_be_cancelled());
        let err = order.cancel(Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(order.status(), OrderStatus::Processing);
    }

    #[test]
    fn cancel_from_pending_and_confirmed_is_allowed() {
        let mut pending = test_order();
        pending.cancel(Utc::now()).unwrap();
        assert_eq!(pending.status(), OrderStatus::Cancelled);
        assert!(pending.cancelled_at().is_some());

        let mut confirmed = test_order();
        confirmed.confirm().unwrap();
        confirmed.cancel(Utc::now()).unwrap();
        assert_eq!(confirmed.status(), OrderStatus::Cancelled);
    }

    #[test]
    fn full_lifecycle_pending_to_delivered() {
        let mut order = paid_confirmed_order();
        order.begin_processing().unwrap();
        order.ship("TRK-9", Utc::now()).unwrap();
        order.mark_delivered(Utc::now()).unwrap();

        assert_eq!(order.status(), OrderStatus::Delivered);
        assert!(order.status().is_terminal());
        assert!(order.delivered_at().is_some());
    }

    #[test]
    fn discount_cannot_exceed_the_pre_discount_total() {
        // subtotal 250.00, no tax, no shipping: 300.00 off would charge a
        // negative amount.
        let err = Order::create(
            OrderId::new(),
            OrderNumber::new("ORD-4").unwrap(),
            UserId::new(),
            test_items(),
            0,
            Money::ZERO,
            Money::from_cents(300_00),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let mut order = test_order();
        let before = order.total();
        let err = order.apply_discount(Money::from_cents(300_00)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(order.total(), before);
        assert_eq!(order.discount_amount(), Money::ZERO);

        // A discount equal to the full total is the floor, not an error.
        order.apply_discount(Money::from_cents(250_00)).unwrap();
        assert_eq!(order.total(), Money::ZERO);
    }

    #[test]
    fn fulfillment_marker_tracks_the_deduction_point() {
        let mut order = paid_confirmed_order();
        assert!(!order.fulfillment_started());

        order.begin_processing().unwrap();
        assert!(order.fulfillment_started());
        order.ship("TRK-7", Utc::now()).unwrap();
        order.mark_delivered(Utc::now()).unwrap();
        assert!(order.fulfillment_started());

        let mut cancelled = paid_confirmed_order();
        cancelled.cancel(Utc::now()).unwrap();
        assert!(!cancelled.fulfillment_started());
    }

    #[test]
    fn discount_cannot_change_after_confirmation() {
        let mut order = test_order();
        order.confirm().unwrap();
        let err = order.apply_discount(Money::from_cents(1_00)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn ordered_quantity_sums_lines_per_product() {
        let product_id = ProductId::new();
        let items = vec![
            OrderItem::new(product_id, "widget", 2, Money::from_cents(100)).unwrap(),
            OrderItem::new(product_id, "widget", 3, Money::from_cents(100)).unwrap(),
            OrderItem::new(ProductId::new(), "other", 1, Money::from_cents(100)).unwrap(),
        ];
        let order = Order::create(
            OrderId::new(),
            OrderNumber::new("ORD-3").unwrap(),
            UserId::new(),
            items,
            0,
            Money::ZERO,
            Money::ZERO,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(order.ordered_quantity(product_id), 5);
    }
}

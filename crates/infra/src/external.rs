//! External collaborator interfaces and the bounded-retry wrapper.
//!
//! These are consumed, never owned: payment, shipping, notifications, and
//! the product catalog live behind other teams' APIs. Only transient
//! transport failures are retried; an explicit decline is a result, not an
//! error, and validation failures are never retried.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use stockline_core::{DomainError, DomainResult, Money, OrderId, ProductId};

/// Transport-level failure from an external collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Network-class failure worth retrying with backoff.
    #[error("transient gateway failure: {0}")]
    Transient(String),

    /// The collaborator rejected the call outright; retrying cannot help.
    #[error("permanent gateway failure: {0}")]
    Permanent(String),
}

/// Outcome of a charge attempt. A decline is a normal business result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChargeOutcome {
    Approved { transaction_id: String },
    Declined { reason: String },
}

/// Outcome of a refund attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefundOutcome {
    Approved { refund_id: String },
    Declined { reason: String },
}

/// External payment gateway.
pub trait PaymentGateway: Send + Sync {
    fn charge(&self, order_id: OrderId, amount: Money) -> Result<ChargeOutcome, GatewayError>;

    fn refund(
        &self,
        transaction_id: &str,
        amount: Money,
        reason: &str,
    ) -> Result<RefundOutcome, GatewayError>;
}

/// Return label issued by the carrier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnLabel {
    pub label_url: String,
    pub tracking_number: String,
}

/// Where the carrier last saw a shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Pending,
    InTransit,
    Delivered,
}

/// Shipping carrier, consumed only for the return path.
pub trait ShippingProvider: Send + Sync {
    fn create_return_label(&self, order_id: OrderId) -> Result<ReturnLabel, GatewayError>;

    fn track_shipment(&self, tracking_number: &str) -> Result<ShipmentStatus, GatewayError>;
}

/// Messages the core fires on state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    OrderConfirmation { order_id: OrderId },
    ShippingNotification { order_id: OrderId, tracking_number: String },
    DeliveryNotification { order_id: OrderId },
    RefundCompleted { order_id: OrderId, amount: Money },
}

/// Fire-and-forget notification delivery.
///
/// Failures here must never roll back an inventory or order-state change;
/// use [`notify_best_effort`] at call sites.
pub trait NotificationService: Send + Sync {
    fn send(&self, notification: Notification) -> Result<(), GatewayError>;
}

/// Send a notification, logging (never propagating) failure.
pub fn notify_best_effort(service: &Arc<dyn NotificationService>, notification: Notification) {
    if let Err(err) = service.send(notification.clone()) {
        warn!(?notification, %err, "notification delivery failed");
    }
}

/// Catalog entry snapshotted onto an order line at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
}

/// Read-only product lookup for order-item snapshotting.
pub trait ProductCatalog: Send + Sync {
    fn lookup(&self, product_id: ProductId) -> DomainResult<CatalogProduct>;
}

/// Backoff strategy for retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed,
    /// Exponential backoff: base * 2^attempt
    Exponential,
    /// Linear backoff: base * attempt
    Linear,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential
    }
}

/// Retry policy for transient collaborator failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (0 = no retries)
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
    /// Backoff strategy
    pub strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            strategy: BackoffStrategy::Exponential,
        }
    }
}

impl RetryPolicy {
    /// A policy with no retries (tests, strictly-once calls).
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 0,
            ..Default::default()
        }
    }

    /// Fixed delays between attempts.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
        }
    }

    /// Delay before retry number `attempt` (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;

        let delay_ms = match self.strategy {
            BackoffStrategy::Fixed => base_ms,
            BackoffStrategy::Exponential => {
                let exp = 2_f64.powi((attempt - 1) as i32);
                (base_ms * exp).min(max_ms)
            }
            BackoffStrategy::Linear => (base_ms * f64::from(attempt)).min(max_ms),
        };

        Duration::from_millis(delay_ms as u64)
    }

    /// Run `op`, retrying transient failures with backoff until the policy
    /// is exhausted; surfaces `ServiceUnavailable` afterwards. Permanent
    /// failures surface immediately.
    pub fn run<T>(
        &self,
        what: &str,
        mut op: impl FnMut() -> Result<T, GatewayError>,
    ) -> DomainResult<T> {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(GatewayError::Permanent(msg)) => {
                    return Err(DomainError::service_unavailable(format!("{what}: {msg}")));
                }
                Err(GatewayError::Transient(msg)) => {
                    if attempt >= self.max_attempts {
                        return Err(DomainError::service_unavailable(format!(
                            "{what}: retries exhausted: {msg}"
                        )));
                    }
                    attempt += 1;
                    let delay = self.delay_for_attempt(attempt);
                    warn!(what, attempt, ?delay, %msg, "transient gateway failure, retrying");
                    std::thread::sleep(delay);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn notifications_serialize_with_a_type_tag() {
        let order_id = OrderId::new();
        let json = serde_json::to_value(Notification::ShippingNotification {
            order_id,
            tracking_number: "1Z999".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "shipping_notification");
        assert_eq!(json["tracking_number"], "1Z999");
        assert_eq!(json["order_id"], order_id.to_string());
    }

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            strategy: BackoffStrategy::Exponential,
        };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(300));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(300));
    }

    #[test]
    fn transient_failures_are_retried_until_exhaustion() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(2, Duration::ZERO);

        let err = policy
            .run("charge", || -> Result<(), GatewayError> {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(GatewayError::Transient("connection reset".into()))
            })
            .unwrap_err();

        assert!(matches!(err, DomainError::ServiceUnavailable(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3); // initial + 2 retries
    }

    #[test]
    fn permanent_failures_are_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(5, Duration::ZERO);

        let err = policy
            .run("charge", || -> Result<(), GatewayError> {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(GatewayError::Permanent("bad credentials".into()))
            })
            .unwrap_err();

        assert!(matches!(err, DomainError::ServiceUnavailable(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn eventual_success_passes_through() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(3, Duration::ZERO);

        let value = policy
            .run("charge", || {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(GatewayError::Transient("timeout".into()))
                } else {
                    Ok(42)
                }
            })
            .unwrap();

        assert_eq!(value, 42);
    }
}

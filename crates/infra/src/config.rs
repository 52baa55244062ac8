//! Core configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use stockline_core::Money;
use stockline_reservations::DEFAULT_TTL_MINUTES;

/// Tunables for checkout and the background sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Fixed tax rate applied to the order subtotal, in basis points
    /// (825 = 8.25%).
    pub tax_rate_bps: u32,
    /// Flat shipping cost added to every order.
    pub shipping_cost: Money,
    /// Reservation hold duration for an in-progress checkout.
    pub reservation_ttl_minutes: i64,
    /// How often the sweeper looks for expired reservations.
    pub sweep_interval: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            tax_rate_bps: 0,
            shipping_cost: Money::ZERO,
            reservation_ttl_minutes: DEFAULT_TTL_MINUTES,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl CoreConfig {
    pub fn with_tax_rate_bps(mut self, bps: u32) -> Self {
        self.tax_rate_bps = bps;
        self
    }

    pub fn with_shipping_cost(mut self, cost: Money) -> Self {
        self.shipping_cost = cost;
        self
    }

    pub fn with_reservation_ttl_minutes(mut self, minutes: i64) -> Self {
        self.reservation_ttl_minutes = minutes;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

//! Infrastructure layer: stores, services, external collaborators, and the
//! reservation sweep worker.
//!
//! Everything stateful goes through the store traits here; the stock store in
//! particular is the single shared mutable resource, and all inventory
//! mutations run inside its per-product atomic update.

pub mod config;
pub mod external;
pub mod ledger;
pub mod orders;
pub mod refunds;
pub mod reservations;
pub mod stores;
pub mod sweeper;

pub use config::CoreConfig;
pub use ledger::StockLedger;
pub use orders::{OrderLine, OrderService, PaymentResult};
pub use refunds::RefundCoordinator;
pub use reservations::ReservationManager;
pub use sweeper::{ReservationSweeper, SweeperHandle, SweeperStats};

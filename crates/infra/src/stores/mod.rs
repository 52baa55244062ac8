//! Storage abstractions and in-memory implementations.
//!
//! The traits describe the CRUD surface the services need from a relational
//! store; the in-memory implementations serve tests and embedded use. The
//! contract that matters is on [`StockStore::with_record`]: the closure runs
//! under that product's row lock, so a check-then-mutate is one atomic step.

pub mod orders;
pub mod refunds;
pub mod reservations;
pub mod stock;

pub use orders::{InMemoryOrderStore, OrderStore};
pub use refunds::{InMemoryRefundStore, RefundStore};
pub use reservations::{InMemoryReservationStore, ReservationStore};
pub use stock::{InMemoryStockStore, StockStore};

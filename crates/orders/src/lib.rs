//! Order lifecycle domain module.
//!
//! This crate contains the order state machine and totals math, implemented
//! purely as deterministic domain logic (no IO, no storage). Reservation and
//! payment side effects are coordinated by the service layer; the entity here
//! only enforces which transitions are legal and keeps the derived amounts
//! consistent.

pub mod order;

pub use order::{Order, OrderItem, OrderNumber, OrderStatus, PaymentStatus};

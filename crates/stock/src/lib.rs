//! Stock ledger domain module.
//!
//! This crate contains the business rules for per-product stock counters,
//! implemented purely as deterministic domain logic (no IO, no storage).
//! The counters themselves are only ever mutated through the transition
//! functions on [`StockRecord`], which uphold `0 <= reserved <= quantity`.

pub mod record;

pub use record::{AdjustmentReason, StockAdjustment, StockLevels, StockRecord};

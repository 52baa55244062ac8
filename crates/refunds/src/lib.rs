//! Refund request domain module.
//!
//! Translates a customer return into a validated, monotonically progressing
//! request. Restock and money movement are coordinated by the service layer;
//! this crate only decides what a valid request is and which status moves
//! are legal.

pub mod request;

pub use request::{
    RefundItem, RefundReason, RefundRequest, RefundStatus, ReturnStatus, RETURN_WINDOW_DAYS,
};

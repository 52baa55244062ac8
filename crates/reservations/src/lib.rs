//! Reservation domain module.
//!
//! A reservation is a time-boxed, exclusive claim on stock tied to one
//! order. It is not yet a permanent deduction; exactly one of confirmation,
//! release, or expiry terminates it.

pub mod reservation;

pub use reservation::{Reservation, DEFAULT_TTL_MINUTES};

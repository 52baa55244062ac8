//! `stockline-core` — shared domain primitives.
//!
//! Typed ids, money, the error taxonomy, and the entity/value-object
//! markers. Nothing here touches storage, time, or the network.

pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{OrderId, ProductId, RefundRequestId, ReservationId, UserId};
pub use money::Money;
pub use value_object::ValueObject;

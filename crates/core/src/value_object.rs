//! Value object trait: equality by value, no identity.

/// Marker for immutable, value-compared types.
///
/// Two [`crate::Money`] amounts of the same number of cents are the same
/// money; there is no "this 50.00 versus that 50.00". "Changing" a value
/// object means constructing a new one, which is what keeps order-item price
/// snapshots trustworthy after checkout.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

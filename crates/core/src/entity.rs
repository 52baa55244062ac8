//! Entity trait: things with identity that survive state changes.

/// An object tracked by identity rather than by value.
///
/// A `StockRecord` after ten adjustments is still the same record; an
/// `Order` that moves from `pending` to `shipped` is still the same order.
/// Implementors expose their typed id and mutate only through their own
/// transition methods.
pub trait Entity {
    /// The strongly-typed identifier for this kind of entity.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}

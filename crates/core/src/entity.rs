//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// An inventory item keeps its identity (its name) while its quantity moves up
/// and down; two snapshots of the same item compare equal by `id()` even when
/// their quantities differ.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// True when `other` refers to the same entity, regardless of state.
    fn same_identity(&self, other: &Self) -> bool
    where
        Self: Sized,
    {
        self.id() == other.id()
    }
}

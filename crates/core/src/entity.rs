//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Warehouses are identified by name and products by SKU; two values with the
/// same identifier are the same entity even if their other fields differ.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Whether `other` denotes the same entity.
    fn same_entity(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

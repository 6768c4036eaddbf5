//! Entity trait: records with a stable identity.

/// Entity marker + minimal interface.
///
/// Implemented by the persisted identity records (accounts, roles,
/// permissions). Two entities with the same id are the same record, even if
/// their attributes differ.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

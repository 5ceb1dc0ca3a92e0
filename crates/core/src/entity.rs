//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Join records (category membership, recommendations) are plain entities:
/// they carry an identity but no event history.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

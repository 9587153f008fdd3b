//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Records such as receivables and payment methods keep their identifier for
/// their whole life while status and amounts change around it.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;

    /// Whether the record is still in use (soft-deleted records return `false`).
    fn is_active(&self) -> bool {
        true
    }
}

//! Entity traits: identity + continuity across state changes.

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// An entity that can be buffered and persisted by an editor session.
///
/// Beyond its identity the entity is opaque to whoever saves it: the whole
/// value is handed to the persistence seam as-is, so it must be cheap enough to
/// clone and safe to move onto a background task.
pub trait EditableEntity: Entity + Clone + core::fmt::Debug + Send + Sync + 'static {}

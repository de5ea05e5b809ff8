//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity and are never modified in place: a
/// "modification" produces a new value and leaves the old one intact. Stock
/// ledgers rely on this so that a caller can keep a previous snapshot (for undo
/// or audit display) while handing the new one to the editor.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Quantity(i64);
///
/// impl ValueObject for Quantity {}
///
/// assert_eq!(Quantity(3), Quantity(3));
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

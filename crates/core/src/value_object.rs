//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. A
/// `Slug("books")` is the same slug wherever it appears; a product class with
/// that slug is an entity.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Ranking(u16);
///
/// impl ValueObject for Ranking {}
///
/// assert_eq!(Ranking(5), Ranking(5));
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

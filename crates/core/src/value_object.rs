//! Value object trait: equality by value, not identity.
//!
//! Value objects are domain objects that have **no identity** - they are defined entirely
//! by their attribute values. Two value objects with the same values are considered equal.

/// Marker trait for value objects.
///
/// - **Value Object**: no identity (a `Brand { name: "Acme", quality: 4 }` equals any other
///   brand with the same name and quality)
/// - **Entity**: has identity (a warehouse is the same warehouse whatever its address says)
///
/// Value objects are immutable; to "modify" one, build a new value.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Brand {
///     name: String,
///     quality: u8,
/// }
///
/// impl ValueObject for Brand {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

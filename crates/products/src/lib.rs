//! Products domain module.
//!
//! A closed set of product kinds sharing one base record, plus the
//! conversion between the typed variants and their flat persisted shape.
//! Pure domain logic (no IO, no HTTP, no storage).

pub mod error;
pub mod product;
pub mod record;

pub use error::ProductError;
pub use product::{
    BookProduct, Brand, ConsumableProduct, ElectronicsProduct, ProductBase, ProductKind,
    ProductVariant,
};
pub use record::ProductRecord;

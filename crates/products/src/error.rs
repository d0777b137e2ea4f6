use thiserror::Error;

use stockroom_core::Sku;

use crate::product::ProductKind;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProductError {
    /// A kind tag outside the closed set was encountered.
    #[error("unknown product kind '{0}'")]
    UnknownKind(String),

    /// A persisted product of a known kind lacks its kind-specific field.
    #[error("product {sku} of kind {kind} is missing its '{attribute}' attribute")]
    MissingAttribute {
        sku: Sku,
        kind: ProductKind,
        attribute: &'static str,
    },

    /// The SKU is already bound to a different kind.
    #[error("product with sku {sku} already exists with kind {persisted}, not {requested}")]
    KindConflict {
        sku: Sku,
        persisted: ProductKind,
        requested: ProductKind,
    },

    #[error("invalid brand: {0}")]
    InvalidBrand(String),
}

//! Flat persisted shape of a product.
//!
//! Storage keeps one row of base columns tagged with the kind, plus one
//! satellite row per kind carrying the kind-specific field. `ProductRecord`
//! is that join flattened: the tag stays a raw string so that a row written
//! by something newer (or corrupted) surfaces as `UnknownKind` instead of
//! being dropped or defaulted.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockroom_core::Sku;

use crate::error::ProductError;
use crate::product::{
    BookProduct, Brand, ConsumableProduct, ElectronicsProduct, ProductBase, ProductKind,
    ProductVariant,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub sku: Sku,
    pub name: String,
    pub price: u64,
    pub brand: Brand,
    pub kind: String,
    pub author: Option<String>,
    pub expiration_date: Option<NaiveDate>,
    pub warranty_period: Option<String>,
}

impl ProductRecord {
    fn base(&self) -> ProductBase {
        ProductBase {
            sku: self.sku.clone(),
            name: self.name.clone(),
            price: self.price,
            brand: self.brand.clone(),
        }
    }

    fn missing(&self, kind: ProductKind, attribute: &'static str) -> ProductError {
        ProductError::MissingAttribute {
            sku: self.sku.clone(),
            kind,
            attribute,
        }
    }
}

impl ProductVariant {
    /// Flatten into the persisted shape. Total over the closed set of kinds.
    pub fn to_record(&self) -> ProductRecord {
        let base = self.base();
        let mut record = ProductRecord {
            sku: base.sku.clone(),
            name: base.name.clone(),
            price: base.price,
            brand: base.brand.clone(),
            kind: self.kind().as_str().to_string(),
            author: None,
            expiration_date: None,
            warranty_period: None,
        };
        match self {
            ProductVariant::Book(p) => record.author = Some(p.author.clone()),
            ProductVariant::Consumable(p) => record.expiration_date = Some(p.expiration_date),
            ProductVariant::Electronics(p) => record.warranty_period = Some(p.warranty_period.clone()),
        }
        record
    }
}

impl TryFrom<ProductRecord> for ProductVariant {
    type Error = ProductError;

    fn try_from(record: ProductRecord) -> Result<Self, Self::Error> {
        let kind: ProductKind = record.kind.parse()?;
        let base = record.base();
        let variant = match kind {
            ProductKind::Book => ProductVariant::Book(BookProduct {
                author: record
                    .author
                    .clone()
                    .ok_or_else(|| record.missing(kind, "author"))?,
                base,
            }),
            ProductKind::Consumable => ProductVariant::Consumable(ConsumableProduct {
                expiration_date: record
                    .expiration_date
                    .ok_or_else(|| record.missing(kind, "expiration_date"))?,
                base,
            }),
            ProductKind::Electronics => ProductVariant::Electronics(ElectronicsProduct {
                warranty_period: record
                    .warranty_period
                    .clone()
                    .ok_or_else(|| record.missing(kind, "warranty_period"))?,
                base,
            }),
        };
        Ok(variant)
    }
}

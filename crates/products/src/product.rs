use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockroom_core::{Entity, Sku, ValueObject, deserialize_amount};

use crate::error::ProductError;

/// Lowest and highest brand quality rating.
pub const MIN_BRAND_QUALITY: u8 = 1;
pub const MAX_BRAND_QUALITY: u8 = 5;

/// Brand of a product: a name plus a quality rating in `1..=5`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "BrandRepr")]
pub struct Brand {
    name: String,
    quality: u8,
}

#[derive(Deserialize)]
struct BrandRepr {
    name: String,
    quality: u8,
}

impl Brand {
    pub fn new(name: impl Into<String>, quality: u8) -> Result<Self, ProductError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ProductError::InvalidBrand("name cannot be empty".to_string()));
        }
        if !(MIN_BRAND_QUALITY..=MAX_BRAND_QUALITY).contains(&quality) {
            return Err(ProductError::InvalidBrand(format!(
                "quality must be between {MIN_BRAND_QUALITY} and {MAX_BRAND_QUALITY}, got {quality}"
            )));
        }
        Ok(Self { name, quality })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl TryFrom<BrandRepr> for Brand {
    type Error = ProductError;

    fn try_from(value: BrandRepr) -> Result<Self, Self::Error> {
        Brand::new(value.name, value.quality)
    }
}

impl ValueObject for Brand {}

/// Fields every product kind shares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductBase {
    pub sku: Sku,
    pub name: String,
    /// Price in the smallest currency unit.
    #[serde(deserialize_with = "deserialize_amount")]
    pub price: u64,
    pub brand: Brand,
}

/// Tag of the closed set of product kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProductKind {
    Book,
    Consumable,
    Electronics,
}

impl ProductKind {
    pub const ALL: [ProductKind; 3] = [
        ProductKind::Book,
        ProductKind::Consumable,
        ProductKind::Electronics,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProductKind::Book => "Book",
            ProductKind::Consumable => "Consumable",
            ProductKind::Electronics => "Electronics",
        }
    }
}

impl core::fmt::Display for ProductKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for ProductKind {
    type Err = ProductError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProductKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ProductError::UnknownKind(s.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookProduct {
    #[serde(flatten)]
    pub base: ProductBase,
    pub author: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumableProduct {
    #[serde(flatten)]
    pub base: ProductBase,
    pub expiration_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectronicsProduct {
    #[serde(flatten)]
    pub base: ProductBase,
    pub warranty_period: String,
}

/// A product of one concrete kind.
///
/// Serialized internally tagged by `"type"` with the base fields flattened:
///
/// ```json
/// {"type": "Book", "sku": "BOOK-A", "name": "Book A", "price": 100,
///  "brand": {"name": "Book Brand", "quality": 4}, "author": "Author"}
/// ```
///
/// Equality and hashing look at the SKU only. Use [`ProductVariant::to_record`]
/// when every field has to be compared.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProductVariant {
    Book(BookProduct),
    Consumable(ConsumableProduct),
    Electronics(ElectronicsProduct),
}

impl ProductVariant {
    pub fn kind(&self) -> ProductKind {
        match self {
            ProductVariant::Book(_) => ProductKind::Book,
            ProductVariant::Consumable(_) => ProductKind::Consumable,
            ProductVariant::Electronics(_) => ProductKind::Electronics,
        }
    }

    pub fn base(&self) -> &ProductBase {
        match self {
            ProductVariant::Book(p) => &p.base,
            ProductVariant::Consumable(p) => &p.base,
            ProductVariant::Electronics(p) => &p.base,
        }
    }

    pub fn sku(&self) -> &Sku {
        &self.base().sku
    }

    pub fn name(&self) -> &str {
        &self.base().name
    }

    pub fn price(&self) -> u64 {
        self.base().price
    }

    pub fn brand(&self) -> &Brand {
        &self.base().brand
    }

    /// Reject a SKU that is already bound to another kind.
    pub fn ensure_kind(&self, persisted: ProductKind) -> Result<(), ProductError> {
        if persisted != self.kind() {
            return Err(ProductError::KindConflict {
                sku: self.sku().clone(),
                persisted,
                requested: self.kind(),
            });
        }
        Ok(())
    }
}

impl Entity for ProductVariant {
    type Id = Sku;

    fn id(&self) -> &Self::Id {
        self.sku()
    }
}

impl PartialEq for ProductVariant {
    fn eq(&self, other: &Self) -> bool {
        self.sku() == other.sku()
    }
}

impl Eq for ProductVariant {}

impl core::hash::Hash for ProductVariant {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.sku().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base(sku: &str) -> ProductBase {
        ProductBase {
            sku: Sku::new(sku).unwrap(),
            name: "Book A".to_string(),
            price: 100,
            brand: Brand::new("Book Brand", 4).unwrap(),
        }
    }

    #[test]
    fn brand_quality_must_be_in_range() {
        assert!(Brand::new("Acme", 0).is_err());
        assert!(Brand::new("Acme", 6).is_err());
        assert!(Brand::new("Acme", 1).is_ok());
        assert!(Brand::new("Acme", 5).is_ok());
        assert!(Brand::new(" ", 3).is_err());
    }

    #[test]
    fn kind_tags_parse_exhaustively() {
        for kind in ProductKind::ALL {
            assert_eq!(kind.as_str().parse::<ProductKind>().unwrap(), kind);
        }
        assert_eq!(
            "Furniture".parse::<ProductKind>(),
            Err(ProductError::UnknownKind("Furniture".to_string()))
        );
        // tags are case-sensitive
        assert!("book".parse::<ProductKind>().is_err());
    }

    #[test]
    fn book_deserializes_from_tagged_json() {
        let product: ProductVariant = serde_json::from_value(json!({
            "type": "Book",
            "sku": "BOOK-A",
            "name": "Book A",
            "price": 100,
            "brand": {"name": "Book Brand", "quality": 4},
            "author": "Author"
        }))
        .unwrap();

        assert_eq!(product.kind(), ProductKind::Book);
        assert_eq!(product.sku().as_str(), "BOOK-A");
        match product {
            ProductVariant::Book(book) => assert_eq!(book.author, "Author"),
            _ => panic!("Expected Book variant"),
        }
    }

    #[test]
    fn consumable_uses_camel_case_fields() {
        let product = ProductVariant::Consumable(ConsumableProduct {
            base: base("CONS-A"),
            expiration_date: NaiveDate::from_ymd_opt(2024, 12, 12).unwrap(),
        });

        let value = serde_json::to_value(&product).unwrap();
        assert_eq!(value["type"], "Consumable");
        assert_eq!(value["sku"], "CONS-A");
        assert_eq!(value["expirationDate"], "2024-12-12");
        assert_eq!(value["brand"]["quality"], 4);
    }

    #[test]
    fn price_above_storable_range_is_rejected() {
        let res = serde_json::from_value::<ProductVariant>(json!({
            "type": "Book",
            "sku": "BOOK-A",
            "name": "Book A",
            "price": 9_223_372_036_854_775_808u64,
            "brand": {"name": "Book Brand", "quality": 4},
            "author": "Author"
        }));
        assert!(res.is_err());
    }

    #[test]
    fn unknown_type_is_rejected() {
        let res = serde_json::from_value::<ProductVariant>(json!({
            "type": "Furniture",
            "sku": "CHAIR-1",
            "name": "Chair",
            "price": 10,
            "brand": {"name": "Ikea", "quality": 3}
        }));
        assert!(res.is_err());
    }

    #[test]
    fn out_of_range_brand_quality_is_rejected_on_deserialize() {
        let res = serde_json::from_value::<ProductVariant>(json!({
            "type": "Electronics",
            "sku": "ETRX-A",
            "name": "Radio",
            "price": 10,
            "brand": {"name": "Sony", "quality": 9},
            "warrantyPeriod": "2 Years"
        }));
        assert!(res.is_err());
    }

    #[test]
    fn equality_is_by_sku_only() {
        let book = ProductVariant::Book(BookProduct {
            base: base("SHARED-1"),
            author: "Someone".to_string(),
        });
        let gadget = ProductVariant::Electronics(ElectronicsProduct {
            base: ProductBase {
                name: "Radio".to_string(),
                ..base("SHARED-1")
            },
            warranty_period: "1 Year".to_string(),
        });

        assert_eq!(book, gadget);
        assert!(book.same_entity(&gadget));
        assert!(matches!(
            gadget.ensure_kind(book.kind()),
            Err(ProductError::KindConflict {
                persisted: ProductKind::Book,
                requested: ProductKind::Electronics,
                ..
            })
        ));
        assert!(book.ensure_kind(ProductKind::Book).is_ok());
    }
}

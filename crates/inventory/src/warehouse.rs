use serde::{Deserialize, Serialize};

use stockroom_core::{Entity, Sku, WarehouseName, deserialize_amount};
use stockroom_products::ProductVariant;

/// A capacity-limited storage location, identified by its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub name: WarehouseName,
    pub address: String,
    /// Maximum total number of units the warehouse may hold.
    #[serde(deserialize_with = "deserialize_amount")]
    pub capacity: u64,
}

impl Warehouse {
    pub fn new(name: WarehouseName, address: impl Into<String>, capacity: u64) -> Self {
        Self {
            name,
            address: address.into(),
            capacity,
        }
    }

    /// Free units left given the current usage.
    ///
    /// Saturates at zero: usage above capacity can only come from a store
    /// running below the isolation level the engine assumes.
    pub fn available_capacity(&self, used: u64) -> u64 {
        self.capacity.saturating_sub(used)
    }
}

impl Entity for Warehouse {
    type Id = WarehouseName;

    fn id(&self) -> &Self::Id {
        &self.name
    }
}

/// Quantity of one SKU held by one warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRow {
    pub warehouse: WarehouseName,
    pub sku: Sku,
    pub quantity: u64,
}

/// A product together with the quantity a warehouse holds of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockedProduct {
    #[serde(flatten)]
    pub product: ProductVariant,
    pub quantity: u64,
}

/// Read-only view: a warehouse plus everything it currently stocks.
///
/// Computed per query and never persisted. Only products with a positive
/// quantity are listed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseDetail {
    #[serde(flatten)]
    pub warehouse: Warehouse,
    pub products: Vec<StockedProduct>,
}

impl WarehouseDetail {
    /// Total units held, as listed.
    pub fn used_capacity(&self) -> u64 {
        self.products.iter().map(|p| p.quantity).sum()
    }

    pub fn quantity_of(&self, sku: &Sku) -> u64 {
        self.products
            .iter()
            .filter(|p| p.product.sku() == sku)
            .map(|p| p.quantity)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stockroom_products::{BookProduct, Brand, ProductBase};

    fn warehouse(capacity: u64) -> Warehouse {
        Warehouse::new(WarehouseName::new("Warehouse 1").unwrap(), "Address 1", capacity)
    }

    #[test]
    fn available_capacity_saturates() {
        let w = warehouse(3);
        assert_eq!(w.available_capacity(0), 3);
        assert_eq!(w.available_capacity(3), 0);
        assert_eq!(w.available_capacity(7), 0);
    }

    #[test]
    fn warehouse_deserializes_from_plain_json() {
        let w: Warehouse = serde_json::from_value(json!({
            "name": "Warehouse 1",
            "address": "Address 1",
            "capacity": 3
        }))
        .unwrap();
        assert_eq!(w, warehouse(3));

        let negative = serde_json::from_value::<Warehouse>(json!({
            "name": "Warehouse 1",
            "address": "Address 1",
            "capacity": -1
        }));
        assert!(negative.is_err());

        let too_large = serde_json::from_value::<Warehouse>(json!({
            "name": "Warehouse 1",
            "address": "Address 1",
            "capacity": 9_223_372_036_854_775_808u64
        }));
        assert!(too_large.is_err());
    }

    #[test]
    fn detail_flattens_warehouse_and_products() {
        let detail = WarehouseDetail {
            warehouse: warehouse(3),
            products: vec![StockedProduct {
                product: ProductVariant::Book(BookProduct {
                    base: ProductBase {
                        sku: Sku::new("BOOK-A").unwrap(),
                        name: "Book A".to_string(),
                        price: 100,
                        brand: Brand::new("Book Brand", 4).unwrap(),
                    },
                    author: "Author".to_string(),
                }),
                quantity: 2,
            }],
        };

        let value = serde_json::to_value(&detail).unwrap();
        assert_eq!(value["name"], "Warehouse 1");
        assert_eq!(value["capacity"], 3);
        assert_eq!(value["products"][0]["type"], "Book");
        assert_eq!(value["products"][0]["sku"], "BOOK-A");
        assert_eq!(value["products"][0]["quantity"], 2);

        assert_eq!(detail.used_capacity(), 2);
        assert_eq!(detail.quantity_of(&Sku::new("BOOK-A").unwrap()), 2);
        assert_eq!(detail.quantity_of(&Sku::new("BOOK-B").unwrap()), 0);
    }
}

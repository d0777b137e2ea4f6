use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use stockroom_core::{Sku, WarehouseName};
use stockroom_inventory::{StockRow, Warehouse};
use stockroom_products::{Brand, ProductRecord};

use super::r#trait::{
    InventoryStore, StoreError, StoreResult, StoreTransaction, order_first_by_name,
};

/// How far concurrent in-memory transactions are kept apart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IsolationLevel {
    /// One transaction at a time; `begin` waits for the previous one to end.
    #[default]
    Serializable,
    /// Each transaction reads a private snapshot taken at `begin` and replays
    /// its writes onto the shared state at commit. Two transactions can both
    /// see the same free capacity and both fill it, which is the overcommit
    /// race the engine's isolation assumption rules out.
    Snapshot,
}

#[derive(Debug, Clone, Default)]
struct InventoryState {
    warehouses: BTreeMap<WarehouseName, Warehouse>,
    /// Keyed by brand name; products refer to their brand by name only.
    brands: BTreeMap<String, Brand>,
    products: BTreeMap<Sku, ProductRecord>,
    stock: BTreeMap<(WarehouseName, Sku), u64>,
}

#[derive(Debug, Clone)]
enum Write {
    InsertWarehouse(Warehouse),
    UpsertProduct(ProductRecord),
    IncrementStock {
        warehouse: WarehouseName,
        sku: Sku,
        quantity: u64,
    },
    DecrementStock {
        warehouse: WarehouseName,
        sku: Sku,
        quantity: u64,
    },
}

impl InventoryState {
    fn apply(&mut self, write: &Write) -> StoreResult<()> {
        match write {
            Write::InsertWarehouse(w) => {
                if self.warehouses.contains_key(&w.name) {
                    return Err(StoreError::DuplicateWarehouse(w.name.clone()));
                }
                self.warehouses.insert(w.name.clone(), w.clone());
            }
            Write::UpsertProduct(record) => {
                self.brands
                    .entry(record.brand.name().to_string())
                    .or_insert_with(|| record.brand.clone());
                self.products
                    .entry(record.sku.clone())
                    .or_insert_with(|| record.clone());
            }
            Write::IncrementStock {
                warehouse,
                sku,
                quantity,
            } => {
                if !self.warehouses.contains_key(warehouse) {
                    return Err(StoreError::MissingReference(format!("warehouse '{warehouse}'")));
                }
                if !self.products.contains_key(sku) {
                    return Err(StoreError::MissingReference(format!("product '{sku}'")));
                }
                *self
                    .stock
                    .entry((warehouse.clone(), sku.clone()))
                    .or_insert(0) += quantity;
            }
            Write::DecrementStock {
                warehouse,
                sku,
                quantity,
            } => {
                if let Some(held) = self.stock.get_mut(&(warehouse.clone(), sku.clone())) {
                    *held = held.saturating_sub(*quantity);
                }
            }
        }
        Ok(())
    }

    /// The stored product with the brand as registered under its name.
    fn product(&self, sku: &Sku) -> StoreResult<ProductRecord> {
        let mut record = self
            .products
            .get(sku)
            .cloned()
            .ok_or_else(|| StoreError::Corrupt(format!("stock row for unknown product '{sku}'")))?;
        let brand = self.brands.get(record.brand.name()).ok_or_else(|| {
            StoreError::Corrupt(format!("product '{sku}' has unknown brand '{}'", record.brand.name()))
        })?;
        record.brand = brand.clone();
        Ok(record)
    }

    fn used_capacity(&self, warehouse: &WarehouseName) -> u64 {
        self.stock
            .iter()
            .filter(|((w, _), _)| w == warehouse)
            .map(|(_, q)| *q)
            .sum()
    }
}

/// In-memory inventory store.
///
/// Intended for tests/dev. Every transaction works on a full copy of the
/// state, so this is not optimized for size.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryStore {
    state: Arc<Mutex<InventoryState>>,
    isolation: IsolationLevel,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_isolation(isolation: IsolationLevel) -> Self {
        Self {
            state: Arc::default(),
            isolation,
        }
    }

    /// Write a product record and stock row straight into the committed
    /// state, bypassing every check. Lets tests plant rows the engine could
    /// never produce (e.g. an unknown kind tag).
    #[cfg(test)]
    pub(crate) async fn plant_stock(&self, warehouse: &WarehouseName, record: ProductRecord, quantity: u64) {
        let mut state = self.state.lock().await;
        let sku = record.sku.clone();
        state
            .brands
            .entry(record.brand.name().to_string())
            .or_insert_with(|| record.brand.clone());
        state.products.insert(sku.clone(), record);
        state.stock.insert((warehouse.clone(), sku), quantity);
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> StoreResult<Self::Transaction> {
        let (lock, working) = match self.isolation {
            IsolationLevel::Serializable => {
                let guard = self.state.clone().lock_owned().await;
                let working = guard.clone();
                (Some(guard), working)
            }
            IsolationLevel::Snapshot => (None, self.state.lock().await.clone()),
        };

        Ok(InMemoryTransaction {
            shared: self.state.clone(),
            lock,
            working,
            log: Vec::new(),
            active: true,
        })
    }
}

pub struct InMemoryTransaction {
    shared: Arc<Mutex<InventoryState>>,
    /// Held for the whole transaction under `Serializable`.
    lock: Option<OwnedMutexGuard<InventoryState>>,
    working: InventoryState,
    log: Vec<Write>,
    active: bool,
}

impl InMemoryTransaction {
    fn state(&self) -> StoreResult<&InventoryState> {
        if !self.active {
            return Err(StoreError::TransactionClosed);
        }
        Ok(&self.working)
    }

    fn write(&mut self, write: Write) -> StoreResult<()> {
        if !self.active {
            return Err(StoreError::TransactionClosed);
        }
        self.working.apply(&write)?;
        self.log.push(write);
        Ok(())
    }

    fn close(&mut self) {
        self.active = false;
        self.lock = None;
        self.log.clear();
        self.working = InventoryState::default();
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn list_warehouses(&mut self) -> StoreResult<Vec<Warehouse>> {
        Ok(self.state()?.warehouses.values().cloned().collect())
    }

    async fn list_warehouses_ordered_first(
        &mut self,
        first: &WarehouseName,
    ) -> StoreResult<Vec<Warehouse>> {
        let mut warehouses: Vec<Warehouse> = self.state()?.warehouses.values().cloned().collect();
        order_first_by_name(&mut warehouses, first, |w| &w.name);
        Ok(warehouses)
    }

    async fn insert_warehouse(&mut self, warehouse: &Warehouse) -> StoreResult<()> {
        self.write(Write::InsertWarehouse(warehouse.clone()))
    }

    async fn used_capacity(&mut self, warehouse: &WarehouseName) -> StoreResult<u64> {
        Ok(self.state()?.used_capacity(warehouse))
    }

    async fn products_in_warehouse(
        &mut self,
        warehouse: &WarehouseName,
    ) -> StoreResult<Vec<(ProductRecord, u64)>> {
        let state = self.state()?;
        state
            .stock
            .iter()
            .filter(|((w, _), q)| w == warehouse && **q > 0)
            .map(|((_, sku), q)| -> StoreResult<(ProductRecord, u64)> {
                Ok((state.product(sku)?, *q))
            })
            .collect()
    }

    async fn product_kind_by_sku(&mut self, sku: &Sku) -> StoreResult<Option<String>> {
        Ok(self.state()?.products.get(sku).map(|p| p.kind.clone()))
    }

    async fn upsert_product_and_increment_stock(
        &mut self,
        warehouse: &WarehouseName,
        product: &ProductRecord,
        quantity: u64,
    ) -> StoreResult<()> {
        self.write(Write::UpsertProduct(product.clone()))?;
        self.write(Write::IncrementStock {
            warehouse: warehouse.clone(),
            sku: product.sku.clone(),
            quantity,
        })
    }

    async fn stock_by_sku_ordered_first(
        &mut self,
        first: &WarehouseName,
        sku: &Sku,
    ) -> StoreResult<Vec<StockRow>> {
        let mut rows: Vec<StockRow> = self
            .state()?
            .stock
            .iter()
            .filter(|((_, s), _)| s == sku)
            .map(|((w, s), q)| StockRow {
                warehouse: w.clone(),
                sku: s.clone(),
                quantity: *q,
            })
            .collect();
        order_first_by_name(&mut rows, first, |r| &r.warehouse);
        Ok(rows)
    }

    async fn decrement_stock(
        &mut self,
        warehouse: &WarehouseName,
        sku: &Sku,
        amount: u64,
    ) -> StoreResult<u64> {
        let held = match self
            .state()?
            .stock
            .get(&(warehouse.clone(), sku.clone()))
        {
            Some(held) => *held,
            None => return Ok(0),
        };
        let removed = held.min(amount);
        self.write(Write::DecrementStock {
            warehouse: warehouse.clone(),
            sku: sku.clone(),
            quantity: removed,
        })?;
        Ok(removed)
    }

    async fn commit(&mut self) -> StoreResult<()> {
        if !self.active {
            return Err(StoreError::TransactionClosed);
        }

        let result = match self.lock.as_mut() {
            Some(guard) => {
                **guard = std::mem::take(&mut self.working);
                Ok(())
            }
            None => {
                // Snapshot isolation: replay onto whatever is committed now.
                let mut shared = self.shared.lock().await;
                let mut next = shared.clone();
                let replayed = self.log.iter().try_for_each(|w| next.apply(w));
                match replayed {
                    Ok(()) => {
                        *shared = next;
                        Ok(())
                    }
                    Err(e) => Err(StoreError::Conflict(e.to_string())),
                }
            }
        };

        self.close();
        result
    }

    async fn rollback(&mut self) -> StoreResult<()> {
        if !self.active {
            return Err(StoreError::TransactionClosed);
        }
        self.close();
        Ok(())
    }

    fn end(&mut self) {
        if self.active {
            tracing::debug!("in-memory transaction ended without commit; discarding writes");
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_products::{BookProduct, ProductBase, ProductVariant};

    fn name(n: &str) -> WarehouseName {
        WarehouseName::new(n).unwrap()
    }

    fn book_record(sku: &str, title: &str) -> ProductRecord {
        ProductVariant::Book(BookProduct {
            base: ProductBase {
                sku: Sku::new(sku).unwrap(),
                name: title.to_string(),
                price: 100,
                brand: Brand::new("Book Brand", 4).unwrap(),
            },
            author: "Author".to_string(),
        })
        .to_record()
    }

    async fn seeded(store: &InMemoryInventoryStore, capacities: &[(&str, u64)]) {
        let mut tx = store.begin().await.unwrap();
        for (n, capacity) in capacities {
            tx.insert_warehouse(&Warehouse::new(name(n), "Address", *capacity))
                .await
                .unwrap();
        }
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_warehouse_is_rejected() {
        let store = InMemoryInventoryStore::new();
        seeded(&store, &[("W1", 3)]).await;

        let mut tx = store.begin().await.unwrap();
        let err = tx
            .insert_warehouse(&Warehouse::new(name("W1"), "Elsewhere", 9))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateWarehouse(n) if n.as_str() == "W1"));
    }

    #[tokio::test]
    async fn uncommitted_writes_are_discarded_on_end() {
        let store = InMemoryInventoryStore::new();
        seeded(&store, &[("W1", 3)]).await;

        let mut tx = store.begin().await.unwrap();
        tx.upsert_product_and_increment_stock(&name("W1"), &book_record("BOOK-A", "A"), 2)
            .await
            .unwrap();
        assert_eq!(tx.used_capacity(&name("W1")).await.unwrap(), 2);
        tx.end();
        assert!(matches!(
            tx.used_capacity(&name("W1")).await,
            Err(StoreError::TransactionClosed)
        ));

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.used_capacity(&name("W1")).await.unwrap(), 0);
        assert_eq!(tx.product_kind_by_sku(&Sku::new("BOOK-A").unwrap()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn upsert_keeps_first_product_fields() {
        let store = InMemoryInventoryStore::new();
        seeded(&store, &[("W1", 10)]).await;

        let mut tx = store.begin().await.unwrap();
        tx.upsert_product_and_increment_stock(&name("W1"), &book_record("BOOK-A", "First"), 1)
            .await
            .unwrap();
        tx.upsert_product_and_increment_stock(&name("W1"), &book_record("BOOK-A", "Second"), 2)
            .await
            .unwrap();

        let products = tx.products_in_warehouse(&name("W1")).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].0.name, "First");
        assert_eq!(products[0].1, 3);
    }

    #[tokio::test]
    async fn brand_quality_is_first_write_wins_by_name() {
        let store = InMemoryInventoryStore::new();
        seeded(&store, &[("W1", 10)]).await;
        let mut later = book_record("BOOK-B", "B");
        later.brand = Brand::new("Book Brand", 2).unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.upsert_product_and_increment_stock(&name("W1"), &book_record("BOOK-A", "A"), 1)
            .await
            .unwrap();
        tx.upsert_product_and_increment_stock(&name("W1"), &later, 1)
            .await
            .unwrap();

        let qualities: Vec<u8> = tx
            .products_in_warehouse(&name("W1"))
            .await
            .unwrap()
            .iter()
            .map(|(record, _)| record.brand.quality())
            .collect();
        assert_eq!(qualities, vec![4, 4]);
    }

    #[tokio::test]
    async fn decrement_is_clamped_and_keeps_zero_rows() {
        let store = InMemoryInventoryStore::new();
        seeded(&store, &[("W1", 10)]).await;
        let sku = Sku::new("BOOK-A").unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.upsert_product_and_increment_stock(&name("W1"), &book_record("BOOK-A", "A"), 2)
            .await
            .unwrap();

        assert_eq!(tx.decrement_stock(&name("W1"), &sku, 5).await.unwrap(), 2);
        assert_eq!(tx.decrement_stock(&name("W1"), &sku, 5).await.unwrap(), 0);
        assert_eq!(tx.decrement_stock(&name("W9"), &sku, 5).await.unwrap(), 0);

        // zero row is retained but hidden from the product listing
        let rows = tx.stock_by_sku_ordered_first(&name("W1"), &sku).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity, 0);
        assert!(tx.products_in_warehouse(&name("W1")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stock_rows_follow_ordered_first_rule() {
        let store = InMemoryInventoryStore::new();
        seeded(&store, &[("W1", 10), ("W2", 10), ("W3", 10)]).await;
        let sku = Sku::new("BOOK-A").unwrap();
        let record = book_record("BOOK-A", "A");

        let mut tx = store.begin().await.unwrap();
        for n in ["W1", "W2", "W3"] {
            tx.upsert_product_and_increment_stock(&name(n), &record, 1)
                .await
                .unwrap();
        }

        let rows = tx.stock_by_sku_ordered_first(&name("W3"), &sku).await.unwrap();
        let order: Vec<&str> = rows.iter().map(|r| r.warehouse.as_str()).collect();
        assert_eq!(order, vec!["W3", "W1", "W2"]);
    }

    #[tokio::test]
    async fn snapshot_isolation_lets_concurrent_writers_overcommit() {
        let store = InMemoryInventoryStore::with_isolation(IsolationLevel::Snapshot);
        seeded(&store, &[("W1", 3)]).await;
        let record = book_record("BOOK-A", "A");

        let mut a = store.begin().await.unwrap();
        let mut b = store.begin().await.unwrap();
        // both see the full warehouse as free
        assert_eq!(a.used_capacity(&name("W1")).await.unwrap(), 0);
        assert_eq!(b.used_capacity(&name("W1")).await.unwrap(), 0);

        a.upsert_product_and_increment_stock(&name("W1"), &record, 3).await.unwrap();
        b.upsert_product_and_increment_stock(&name("W1"), &record, 3).await.unwrap();
        a.commit().await.unwrap();
        b.commit().await.unwrap();

        let mut check = store.begin().await.unwrap();
        assert_eq!(check.used_capacity(&name("W1")).await.unwrap(), 6);
    }
}

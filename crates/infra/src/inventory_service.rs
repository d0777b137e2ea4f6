//! Allocation and depletion engine.
//!
//! `InventoryService` runs every operation inside exactly one store
//! transaction:
//!
//! ```text
//! begin
//!   ↓
//! read (kind lookup, ordered warehouses / stock rows, used capacity)
//!   ↓
//! write leg by leg (upsert + increment, or clamped decrement)
//!   ↓
//! commit if the full quantity moved, otherwise roll back
//! ```
//!
//! The engine does no locking of its own. Concurrent inserts racing for the
//! same free capacity are kept apart only by the store's isolation level (see
//! [`InventoryStore`]).

use thiserror::Error;
use tracing::{Span, debug, field, instrument, warn};

use stockroom_core::{DomainError, Sku, WarehouseName, check_amount};
use stockroom_inventory::{Distribution, StockMovement, StockedProduct, Warehouse, WarehouseDetail};
use stockroom_products::{ProductError, ProductKind, ProductVariant};

use crate::store::{InventoryStore, StoreError, StoreTransaction, TransactionGuard};

pub type InventoryResult<T> = Result<T, InventoryError>;

/// Failure of an engine operation. Nothing the operation wrote persists.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("warehouse '{0}' already exists")]
    DuplicateWarehouse(WarehouseName),

    #[error("product with sku {sku} already exists with kind {persisted}, not {requested}")]
    ProductKindConflict {
        sku: Sku,
        persisted: ProductKind,
        requested: ProductKind,
    },

    #[error("not enough free capacity for {requested} units of {sku}: {unplaced} could not be placed")]
    InsufficientCapacity {
        sku: Sku,
        requested: u64,
        unplaced: u64,
    },

    #[error("not enough stock to remove {requested} units of {sku}: {missing} missing")]
    InsufficientStock {
        sku: Sku,
        requested: u64,
        missing: u64,
    },

    /// A capacity or price outside what the stores can hold.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A persisted product carries a kind tag outside the known set.
    #[error("unknown product kind '{0}'")]
    UnknownProductKind(String),

    /// The store moved more than it was asked to. Not retryable.
    #[error("inventory invariant violated: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Store(StoreError),
}

impl InventoryError {
    /// Whether the caller caused the failure (bad request) rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            InventoryError::DuplicateWarehouse(_)
                | InventoryError::InvalidInput(_)
                | InventoryError::ProductKindConflict { .. }
                | InventoryError::InsufficientCapacity { .. }
                | InventoryError::InsufficientStock { .. }
        )
    }
}

impl From<StoreError> for InventoryError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::DuplicateWarehouse(name) => InventoryError::DuplicateWarehouse(name),
            other => InventoryError::Store(other),
        }
    }
}

impl From<ProductError> for InventoryError {
    fn from(value: ProductError) -> Self {
        match value {
            ProductError::UnknownKind(kind) => InventoryError::UnknownProductKind(kind),
            ProductError::KindConflict {
                sku,
                persisted,
                requested,
            } => InventoryError::ProductKindConflict {
                sku,
                persisted,
                requested,
            },
            other => InventoryError::Store(StoreError::Corrupt(other.to_string())),
        }
    }
}

impl From<DomainError> for InventoryError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => InventoryError::InvalidInput(msg),
            DomainError::InvariantViolation(msg) => InventoryError::InvariantViolation(msg),
        }
    }
}

/// Warehouse registration, stock listing, and the insert/remove engines.
#[derive(Debug, Clone)]
pub struct InventoryService<S> {
    store: S,
}

impl<S> InventoryService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: InventoryStore> InventoryService<S> {
    /// Every warehouse with the products it holds (quantity > 0).
    ///
    /// One unreadable product fails the whole listing.
    #[instrument(skip_all, fields(warehouse_count = field::Empty), err)]
    pub async fn list_warehouses(&self) -> InventoryResult<Vec<WarehouseDetail>> {
        let mut tx = TransactionGuard::new(self.store.begin().await?);
        let outcome = collect_details(&mut *tx).await;
        let details = settle(tx, outcome).await?;
        Span::current().record("warehouse_count", details.len());
        Ok(details)
    }

    #[instrument(skip_all, fields(warehouse = %warehouse.name, capacity = warehouse.capacity), err)]
    pub async fn create_warehouse(&self, warehouse: Warehouse) -> InventoryResult<Warehouse> {
        check_amount("capacity", warehouse.capacity)?;
        let mut tx = TransactionGuard::new(self.store.begin().await?);
        let outcome = tx
            .insert_warehouse(&warehouse)
            .await
            .map_err(InventoryError::from);
        settle(tx, outcome).await?;
        Ok(warehouse)
    }

    /// Place `quantity` units of `product`, filling `warehouse` first and
    /// spilling into the others in name order.
    ///
    /// Fails with `ProductKindConflict` if the SKU is bound to another kind,
    /// and with `InsufficientCapacity` if all warehouses together lack room.
    /// No stock changes on failure. A price above
    /// [`stockroom_core::MAX_AMOUNT`] is `InvalidInput` before anything is read.
    #[instrument(
        skip_all,
        fields(warehouse = %warehouse, sku = %product.sku(), quantity = quantity, legs = field::Empty),
        err
    )]
    pub async fn insert_products(
        &self,
        warehouse: &WarehouseName,
        product: &ProductVariant,
        quantity: u64,
    ) -> InventoryResult<Vec<StockMovement>> {
        check_amount("price", product.price())?;
        let mut tx = TransactionGuard::new(self.store.begin().await?);
        let outcome = allocate(&mut *tx, warehouse, product, quantity).await;
        let placements = settle(tx, outcome).await?;
        Span::current().record("legs", placements.len());
        Ok(placements)
    }

    /// Take `quantity` units of `sku` away, draining `warehouse` first and
    /// then the other holders in name order.
    ///
    /// Fails with `InsufficientStock` if all holders together lack the units;
    /// no stock changes in that case.
    #[instrument(
        skip_all,
        fields(warehouse = %warehouse, sku = %sku, quantity = quantity, legs = field::Empty),
        err
    )]
    pub async fn remove_products(
        &self,
        warehouse: &WarehouseName,
        sku: &Sku,
        quantity: u64,
    ) -> InventoryResult<Vec<StockMovement>> {
        let mut tx = TransactionGuard::new(self.store.begin().await?);
        let outcome = deplete(&mut *tx, warehouse, sku, quantity).await;
        let withdrawals = settle(tx, outcome).await?;
        Span::current().record("legs", withdrawals.len());
        Ok(withdrawals)
    }
}

async fn collect_details<T: StoreTransaction>(tx: &mut T) -> InventoryResult<Vec<WarehouseDetail>> {
    let warehouses = tx.list_warehouses().await?;
    let mut details = Vec::with_capacity(warehouses.len());
    for warehouse in warehouses {
        let products = tx
            .products_in_warehouse(&warehouse.name)
            .await?
            .into_iter()
            .map(|(record, quantity)| -> InventoryResult<StockedProduct> {
                let product = ProductVariant::try_from(record)?;
                Ok(StockedProduct { product, quantity })
            })
            .collect::<InventoryResult<Vec<_>>>()?;
        details.push(WarehouseDetail { warehouse, products });
    }
    Ok(details)
}

async fn allocate<T: StoreTransaction>(
    tx: &mut T,
    target: &WarehouseName,
    product: &ProductVariant,
    quantity: u64,
) -> InventoryResult<Vec<StockMovement>> {
    if let Some(tag) = tx.product_kind_by_sku(product.sku()).await? {
        let persisted: ProductKind = tag.parse()?;
        product.ensure_kind(persisted)?;
    }

    let record = product.to_record();
    let mut distribution = Distribution::new(product.sku().clone(), quantity);

    for warehouse in tx.list_warehouses_ordered_first(target).await? {
        if distribution.is_complete() {
            break;
        }
        let used = tx.used_capacity(&warehouse.name).await?;
        let take = distribution.allot(warehouse.available_capacity(used));
        if take == 0 {
            debug!(warehouse = %warehouse.name, used, capacity = warehouse.capacity, "warehouse full; skipping");
            continue;
        }

        tx.upsert_product_and_increment_stock(&warehouse.name, &record, take)
            .await?;
        distribution.record(&warehouse.name, take)?;
        debug!(warehouse = %warehouse.name, placed = take, remaining = distribution.remaining(), "placed units");
    }

    if !distribution.is_complete() {
        return Err(InventoryError::InsufficientCapacity {
            sku: distribution.sku().clone(),
            requested: distribution.requested(),
            unplaced: distribution.remaining(),
        });
    }
    Ok(distribution.into_movements())
}

async fn deplete<T: StoreTransaction>(
    tx: &mut T,
    origin: &WarehouseName,
    sku: &Sku,
    quantity: u64,
) -> InventoryResult<Vec<StockMovement>> {
    let mut distribution = Distribution::new(sku.clone(), quantity);

    for row in tx.stock_by_sku_ordered_first(origin, sku).await? {
        if distribution.is_complete() {
            break;
        }
        let removed = tx
            .decrement_stock(&row.warehouse, sku, distribution.remaining())
            .await?;
        distribution.record(&row.warehouse, removed)?;
        debug!(warehouse = %row.warehouse, removed, remaining = distribution.remaining(), "removed units");
    }

    if !distribution.is_complete() {
        return Err(InventoryError::InsufficientStock {
            sku: sku.clone(),
            requested: distribution.requested(),
            missing: distribution.remaining(),
        });
    }
    Ok(distribution.into_movements())
}

/// Commit on success, roll back on failure. The operation's own error wins
/// over a failed rollback; the guard still ends the transaction on drop.
async fn settle<T, R>(tx: TransactionGuard<T>, outcome: InventoryResult<R>) -> InventoryResult<R>
where
    T: StoreTransaction,
{
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            warn!(error = %err, "inventory operation failed; rolling back");
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sku() -> Sku {
        Sku::new("BOOK-A").unwrap()
    }

    #[test]
    fn duplicate_warehouse_from_store_keeps_its_kind() {
        let name = WarehouseName::new("W1").unwrap();
        let err = InventoryError::from(StoreError::DuplicateWarehouse(name.clone()));
        assert!(matches!(err, InventoryError::DuplicateWarehouse(n) if n == name));
    }

    #[test]
    fn other_store_errors_pass_through() {
        let err = InventoryError::from(StoreError::TransactionClosed);
        assert!(matches!(err, InventoryError::Store(StoreError::TransactionClosed)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn product_errors_map_onto_taxonomy() {
        let err = InventoryError::from(ProductError::UnknownKind("Furniture".into()));
        assert!(matches!(err, InventoryError::UnknownProductKind(ref k) if k == "Furniture"));

        let err = InventoryError::from(ProductError::KindConflict {
            sku: sku(),
            persisted: ProductKind::Book,
            requested: ProductKind::Electronics,
        });
        assert!(matches!(
            err,
            InventoryError::ProductKindConflict {
                persisted: ProductKind::Book,
                requested: ProductKind::Electronics,
                ..
            }
        ));

        let err = InventoryError::from(ProductError::MissingAttribute {
            sku: sku(),
            kind: ProductKind::Book,
            attribute: "author",
        });
        assert!(matches!(err, InventoryError::Store(StoreError::Corrupt(_))));
    }

    #[test]
    fn validation_failures_are_client_errors() {
        let err = InventoryError::from(DomainError::validation("capacity too large"));
        assert!(matches!(err, InventoryError::InvalidInput(_)));
        assert!(err.is_client_error());
    }

    #[test]
    fn distribution_overshoot_is_an_invariant_violation() {
        let err = InventoryError::from(DomainError::invariant("moved too much"));
        assert!(matches!(err, InventoryError::InvariantViolation(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn client_errors_are_the_business_rejections() {
        let client = [
            InventoryError::DuplicateWarehouse(WarehouseName::new("W1").unwrap()),
            InventoryError::InvalidInput("price too large".into()),
            InventoryError::ProductKindConflict {
                sku: sku(),
                persisted: ProductKind::Book,
                requested: ProductKind::Consumable,
            },
            InventoryError::InsufficientCapacity {
                sku: sku(),
                requested: 4,
                unplaced: 1,
            },
            InventoryError::InsufficientStock {
                sku: sku(),
                requested: 6,
                missing: 4,
            },
        ];
        assert!(client.iter().all(InventoryError::is_client_error));

        let server = [
            InventoryError::UnknownProductKind("Furniture".into()),
            InventoryError::InvariantViolation("overdraw".into()),
            InventoryError::Store(StoreError::Corrupt("bad row".into())),
        ];
        assert!(!server.iter().any(InventoryError::is_client_error));
    }

    #[test]
    fn messages_name_the_reason() {
        let err = InventoryError::InsufficientCapacity {
            sku: sku(),
            requested: 4,
            unplaced: 1,
        };
        assert_eq!(
            err.to_string(),
            "not enough free capacity for 4 units of BOOK-A: 1 could not be placed"
        );
    }
}

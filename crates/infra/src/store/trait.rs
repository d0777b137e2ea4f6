use async_trait::async_trait;
use thiserror::Error;

use stockroom_core::{Sku, WarehouseName};
use stockroom_inventory::{StockRow, Warehouse};
use stockroom_products::ProductRecord;

pub type StoreResult<T> = Result<T, StoreError>;

/// Inventory store operation error.
///
/// These are **infrastructure errors** (storage, transaction lifecycle) as
/// opposed to the business failures the engine reports on its own.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("warehouse '{0}' already exists")]
    DuplicateWarehouse(WarehouseName),

    /// A write referenced a warehouse or product that does not exist.
    #[error("missing reference: {0}")]
    MissingReference(String),

    /// A persisted row could not be read back into a domain value.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// A weakly isolated transaction could not replay its writes on commit.
    #[error("write conflict on commit: {0}")]
    Conflict(String),

    #[error("transaction is no longer active")]
    TransactionClosed,

    #[error("database error in {operation}: {message}")]
    Database {
        operation: &'static str,
        message: String,
    },
}

/// Source of transactions over the inventory relations.
///
/// Implementations own the persisted state (warehouses, products, per-kind
/// satellites, stock rows). Everything the engine reads or writes goes
/// through one [`StoreTransaction`] per engine operation.
///
/// ## Isolation
///
/// The engine does no locking of its own. It reads `used_capacity`, decides
/// how much fits, then writes. Two concurrent inserts can therefore only be
/// kept from jointly overcommitting a warehouse by the store's isolation:
/// at minimum serializable, or read-committed with row locking on the
/// capacity sum. A store offering less exposes that race; it is a known
/// limitation of such a store, not something the engine compensates for.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    type Transaction: StoreTransaction;

    /// Open a transaction. The caller owns it exclusively until it ends.
    async fn begin(&self) -> StoreResult<Self::Transaction>;
}

/// One open transaction against an [`InventoryStore`].
///
/// ## Lifecycle
///
/// `commit` or `rollback` finish the transaction; any operation afterwards
/// fails with [`StoreError::TransactionClosed`]. `end` must be safe to call
/// on every exit path and at any time: it rolls back when neither `commit`
/// nor `rollback` ran, and does nothing otherwise. Wrap transactions in a
/// [`TransactionGuard`](super::TransactionGuard) so `end` runs on drop.
///
/// ## Ordering
///
/// The `*_ordered_first` queries put the named warehouse first (when it
/// appears at all) and the rest in ascending byte-wise name order. Both
/// engines rely on this order as their tie-break.
#[async_trait]
pub trait StoreTransaction: Send {
    /// All warehouses, ordered by name.
    async fn list_warehouses(&mut self) -> StoreResult<Vec<Warehouse>>;

    async fn list_warehouses_ordered_first(
        &mut self,
        first: &WarehouseName,
    ) -> StoreResult<Vec<Warehouse>>;

    /// Fails with [`StoreError::DuplicateWarehouse`] if the name is taken.
    async fn insert_warehouse(&mut self, warehouse: &Warehouse) -> StoreResult<()>;

    /// Sum of all stock quantities in the warehouse; 0 for an unknown or
    /// empty warehouse.
    async fn used_capacity(&mut self, warehouse: &WarehouseName) -> StoreResult<u64>;

    /// Persisted products held by the warehouse with quantity > 0, ordered by SKU.
    async fn products_in_warehouse(
        &mut self,
        warehouse: &WarehouseName,
    ) -> StoreResult<Vec<(ProductRecord, u64)>>;

    /// The raw kind tag recorded for the SKU, if the product exists.
    async fn product_kind_by_sku(&mut self, sku: &Sku) -> StoreResult<Option<String>>;

    /// Ensure the product, its brand and its kind-specific row exist (first
    /// write wins, later calls never update them), then add `quantity` to the
    /// (warehouse, SKU) stock row, creating it if absent.
    ///
    /// Brands are keyed by name: a product naming an already known brand is
    /// read back with that brand's first-registered quality.
    async fn upsert_product_and_increment_stock(
        &mut self,
        warehouse: &WarehouseName,
        product: &ProductRecord,
        quantity: u64,
    ) -> StoreResult<()>;

    /// Every stock row of the SKU, `first` warehouse first.
    async fn stock_by_sku_ordered_first(
        &mut self,
        first: &WarehouseName,
        sku: &Sku,
    ) -> StoreResult<Vec<StockRow>>;

    /// Take up to `amount` units away, never going below zero. Returns the
    /// number of units actually removed (0 for a missing row). Rows that reach
    /// zero are kept.
    async fn decrement_stock(
        &mut self,
        warehouse: &WarehouseName,
        sku: &Sku,
        amount: u64,
    ) -> StoreResult<u64>;

    async fn commit(&mut self) -> StoreResult<()>;

    async fn rollback(&mut self) -> StoreResult<()>;

    /// Release the transaction, rolling back if it was never finished.
    fn end(&mut self);
}

/// Sort warehouse-keyed items so that `first` leads and the rest follow by name.
pub fn order_first_by_name<T>(
    items: &mut [T],
    first: &WarehouseName,
    name: impl Fn(&T) -> &WarehouseName,
) {
    items.sort_by(|a, b| {
        let (a, b) = (name(a), name(b));
        (a != first, a).cmp(&(b != first, b))
    });
}

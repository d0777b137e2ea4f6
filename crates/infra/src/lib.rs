//! Infrastructure layer: transactional stores and the inventory engine.

pub mod inventory_service;
pub mod store;


pub use inventory_service::{InventoryError, InventoryResult, InventoryService};
pub use store::{
    InMemoryInventoryStore, InventoryStore, IsolationLevel, SqliteInventoryStore, StoreError,
    StoreResult, StoreTransaction, TransactionGuard,
};

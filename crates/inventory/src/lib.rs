//! Inventory domain module.
//!
//! Warehouses, stock rows and the bookkeeping used to spread a quantity over
//! (or drain it from) several warehouses. Pure domain logic (no IO, no HTTP,
//! no storage); the transactional engine lives in `stockroom-infra`.

pub mod distribution;
pub mod warehouse;

pub use distribution::{Distribution, StockMovement};
pub use warehouse::{StockRow, StockedProduct, Warehouse, WarehouseDetail};

//! `stockroom-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod amount;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use amount::{MAX_AMOUNT, check_amount, deserialize_amount};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{Sku, WarehouseName};
pub use value_object::ValueObject;

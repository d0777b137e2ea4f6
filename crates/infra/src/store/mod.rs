//! Transactional inventory store boundary.
//!
//! This module defines the contract the engine needs from persistence, plus
//! an in-memory implementation (tests/dev, with injectable isolation) and a
//! SQLite implementation.

pub mod in_memory;
pub mod sqlite;
pub mod r#trait;

pub use in_memory::{InMemoryInventoryStore, IsolationLevel};
pub use r#trait::{InventoryStore, StoreError, StoreResult, StoreTransaction};
pub use sqlite::SqliteInventoryStore;

use std::ops::{Deref, DerefMut};

/// Scoped ownership of an open transaction.
///
/// Dropping the guard calls [`StoreTransaction::end`], so a transaction that
/// was neither committed nor rolled back is rolled back on every exit path:
/// early `?` returns, explicit failures, and unwinding panics alike.
pub struct TransactionGuard<T: StoreTransaction> {
    tx: T,
}

impl<T: StoreTransaction> TransactionGuard<T> {
    pub fn new(tx: T) -> Self {
        Self { tx }
    }

    pub async fn commit(mut self) -> StoreResult<()> {
        self.tx.commit().await
    }

    pub async fn rollback(mut self) -> StoreResult<()> {
        self.tx.rollback().await
    }
}

impl<T: StoreTransaction> Deref for TransactionGuard<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.tx
    }
}

impl<T: StoreTransaction> DerefMut for TransactionGuard<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tx
    }
}

impl<T: StoreTransaction> Drop for TransactionGuard<T> {
    fn drop(&mut self) {
        self.tx.end();
    }
}

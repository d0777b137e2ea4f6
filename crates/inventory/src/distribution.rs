//! Bookkeeping for spreading a requested quantity over several warehouses.
//!
//! Both the allocation (insert) and depletion (remove) engines walk an
//! ordered list of warehouses and move units until nothing is outstanding.
//! `Distribution` tracks what is still outstanding and which legs were
//! applied, and refuses any leg that would move more than was asked for.

use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, Sku, WarehouseName};

/// One applied leg: `quantity` units of `sku` moved into or out of `warehouse`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub warehouse: WarehouseName,
    pub sku: Sku,
    pub quantity: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    sku: Sku,
    requested: u64,
    remaining: u64,
    movements: Vec<StockMovement>,
}

impl Distribution {
    pub fn new(sku: Sku, requested: u64) -> Self {
        Self {
            sku,
            requested,
            remaining: requested,
            movements: Vec::new(),
        }
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn requested(&self) -> u64 {
        self.requested
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Units moved so far.
    pub fn moved(&self) -> u64 {
        self.requested - self.remaining
    }

    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    /// How much of the outstanding quantity fits into `available` free units.
    pub fn allot(&self, available: u64) -> u64 {
        available.min(self.remaining)
    }

    /// Record a leg applied against `warehouse`.
    ///
    /// A zero-unit leg is accepted and not recorded. A leg larger than the
    /// outstanding quantity means the store moved more than it was asked to
    /// and is rejected as an invariant violation.
    pub fn record(&mut self, warehouse: &WarehouseName, quantity: u64) -> DomainResult<()> {
        if quantity > self.remaining {
            return Err(DomainError::invariant(format!(
                "{quantity} units of {} moved in {warehouse} but only {} outstanding",
                self.sku, self.remaining
            )));
        }
        if quantity == 0 {
            return Ok(());
        }
        self.remaining -= quantity;
        self.movements.push(StockMovement {
            warehouse: warehouse.clone(),
            sku: self.sku.clone(),
            quantity,
        });
        Ok(())
    }

    pub fn movements(&self) -> &[StockMovement] {
        &self.movements
    }

    pub fn into_movements(self) -> Vec<StockMovement> {
        self.movements
    }
}

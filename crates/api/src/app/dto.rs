use serde::{Deserialize, Serialize};

use stockroom_core::{Sku, WarehouseName};
use stockroom_inventory::StockMovement;
use stockroom_products::ProductVariant;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertProductsRequest {
    pub warehouse_name: WarehouseName,
    pub product: ProductVariant,
    pub quantity: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveProductsRequest {
    pub warehouse_name: WarehouseName,
    pub sku: Sku,
    pub quantity: u64,
}

// -------------------------
// Response DTOs
// -------------------------

/// The accepted request plus where the units went.
#[derive(Debug, Serialize)]
pub struct InsertProductsResponse {
    #[serde(flatten)]
    pub request: InsertProductsRequest,
    pub placements: Vec<StockMovement>,
}

/// The accepted request plus where the units came from.
#[derive(Debug, Serialize)]
pub struct RemoveProductsResponse {
    #[serde(flatten)]
    pub request: RemoveProductsRequest,
    pub withdrawals: Vec<StockMovement>,
}

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use stockroom_inventory::Warehouse;

use crate::app::errors;
use crate::app::services::AppServices;

pub async fn list_warehouses(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.inventory.list_warehouses().await {
        Ok(details) => (StatusCode::OK, Json(details)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn create_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<Warehouse>, JsonRejection>,
) -> axum::response::Response {
    let Json(warehouse) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::rejection_to_response(rejection),
    };

    match services.inventory.create_warehouse(warehouse).await {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

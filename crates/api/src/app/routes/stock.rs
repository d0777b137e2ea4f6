use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use crate::app::dto;
use crate::app::errors;
use crate::app::services::AppServices;

pub async fn insert_products(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::InsertProductsRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::rejection_to_response(rejection),
    };

    let placements = match services
        .inventory
        .insert_products(&request.warehouse_name, &request.product, request.quantity)
        .await
    {
        Ok(p) => p,
        Err(e) => return errors::inventory_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(dto::InsertProductsResponse {
            request,
            placements,
        }),
    )
        .into_response()
}

pub async fn remove_products(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::RemoveProductsRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::rejection_to_response(rejection),
    };

    let withdrawals = match services
        .inventory
        .remove_products(&request.warehouse_name, &request.sku, request.quantity)
        .await
    {
        Ok(w) => w,
        Err(e) => return errors::inventory_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(dto::RemoveProductsResponse {
            request,
            withdrawals,
        }),
    )
        .into_response()
}

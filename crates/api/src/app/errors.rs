use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockroom_infra::InventoryError;

pub fn inventory_error_to_response(err: InventoryError) -> axum::response::Response {
    let (status, code) = match &err {
        InventoryError::DuplicateWarehouse(_) => (StatusCode::CONFLICT, "duplicate_warehouse"),
        InventoryError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
        InventoryError::ProductKindConflict { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "product_kind_conflict")
        }
        InventoryError::InsufficientCapacity { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "insufficient_capacity")
        }
        InventoryError::InsufficientStock { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "insufficient_stock")
        }
        InventoryError::UnknownProductKind(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "unknown_product_kind")
        }
        InventoryError::InvariantViolation(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "invariant_violation")
        }
        InventoryError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
    };

    if status.is_server_error() {
        tracing::error!(error = %err, code, "inventory operation failed");
    }
    json_error(status, code, err.to_string())
}

/// Malformed JSON, missing fields, and out-of-range values.
pub fn rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_request", rejection.body_text())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_core::{Sku, WarehouseName};
    use stockroom_infra::StoreError;

    #[test]
    fn business_rejections_are_client_errors() {
        let sku = Sku::new("BOOK-A").unwrap();
        let cases = [
            (
                InventoryError::DuplicateWarehouse(WarehouseName::new("W1").unwrap()),
                StatusCode::CONFLICT,
            ),
            (
                InventoryError::InvalidInput("capacity too large".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                InventoryError::InsufficientCapacity { sku: sku.clone(), requested: 2, unplaced: 1 },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                InventoryError::InsufficientStock { sku, requested: 2, missing: 2 },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
        ];
        for (err, status) in cases {
            assert!(err.is_client_error());
            assert_eq!(inventory_error_to_response(err).status(), status);
        }
    }

    #[test]
    fn system_failures_are_server_errors() {
        let cases = [
            InventoryError::UnknownProductKind("Furniture".into()),
            InventoryError::InvariantViolation("overdraw".into()),
            InventoryError::Store(StoreError::TransactionClosed),
        ];
        for err in cases {
            assert_eq!(
                inventory_error_to_response(err).status(),
                StatusCode::INTERNAL_SERVER_ERROR
            );
        }
    }
}

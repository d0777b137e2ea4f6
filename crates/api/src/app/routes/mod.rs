use axum::{
    Router,
    routing::{get, post},
};

pub mod stock;
pub mod system;
pub mod warehouses;

/// Router for the inventory endpoints.
pub fn router() -> Router {
    Router::new()
        .route(
            "/warehouses",
            get(warehouses::list_warehouses).post(warehouses::create_warehouse),
        )
        .route("/insertProducts", post(stock::insert_products))
        .route("/removeProducts", post(stock::remove_products))
}

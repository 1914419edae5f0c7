//! Query API and service bootstrap for the order fulfillment read side.
//!
//! Serves the inventory and order read models over HTTP and wires the two
//! consumer runtimes that keep them current. Structured logging via tracing,
//! Prometheus metrics at `/metrics`.

pub mod config;
pub mod error;
pub mod response;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use consumer::RuntimeHandle;
use metrics_exporter_prometheus::PrometheusHandle;
use read_store::{InventoryStore, OrderStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use services::{Backend, Services, StartupError};

/// Shared state for every handler.
pub struct AppState {
    pub inventory: Arc<dyn InventoryStore>,
    pub orders: Arc<dyn OrderStore>,
    /// Consumer runtimes reported by `/health`, by name.
    pub consumers: Vec<(&'static str, RuntimeHandle)>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/api/v1/inventory", get(routes::inventory::list))
        .route("/api/v1/inventory/{product_id}", get(routes::inventory::get))
        .route("/api/v1/orders", get(routes::orders::list))
        .route("/api/v1/orders/{order_id}", get(routes::orders::get))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

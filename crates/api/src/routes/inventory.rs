//! Inventory read endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::ProductId;
use domain::{InventoryItem, InventoryStatus};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;
use crate::response::ApiResponse;

#[derive(Debug, Default, Deserialize)]
pub struct InventoryQuery {
    pub status: Option<String>,
}

/// GET /api/v1/inventory — all items, optionally filtered by `?status=`.
///
/// An empty result is reported as NOT_FOUND.
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InventoryQuery>,
) -> Result<Json<ApiResponse<Vec<InventoryItem>>>, ApiError> {
    let items = match query.status {
        Some(status) => {
            let status = status
                .parse::<InventoryStatus>()
                .map_err(|_| ApiError::InvalidParameter {
                    field: "status",
                    value: status,
                })?;
            state.inventory.find_by_status(status).await?
        }
        None => state.inventory.find_all().await?,
    };

    if items.is_empty() {
        return Err(ApiError::NotFound(
            "Failed to retrieve inventory items".to_string(),
        ));
    }

    Ok(Json(ApiResponse::ok(items)))
}

/// GET /api/v1/inventory/{productId}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<String>,
) -> Result<Json<ApiResponse<InventoryItem>>, ApiError> {
    let item = state
        .inventory
        .find_by_product_id(&ProductId::new(product_id.as_str()))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Inventory item {product_id} not found")))?;

    Ok(Json(ApiResponse::ok(item)))
}

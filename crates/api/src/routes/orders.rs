//! Order read endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::{CustomerId, OrderId};
use domain::{Order, OrderStatus};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;
use crate::response::ApiResponse;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQuery {
    pub customer_id: Option<String>,
    pub status: Option<String>,
}

/// GET /api/v1/orders — all orders, optionally filtered by `?customerId=`
/// and `?status=`. Both filters combine.
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OrderQuery>,
) -> Result<Json<ApiResponse<Vec<Order>>>, ApiError> {
    let status = query
        .status
        .map(|status| {
            status
                .parse::<OrderStatus>()
                .map_err(|_| ApiError::InvalidParameter {
                    field: "status",
                    value: status,
                })
        })
        .transpose()?;

    let orders = match (query.customer_id, status) {
        (Some(customer_id), status) => {
            let mut orders = state
                .orders
                .find_by_customer_id(&CustomerId::new(customer_id))
                .await?;
            if let Some(status) = status {
                orders.retain(|order| order.status == status);
            }
            orders
        }
        (None, Some(status)) => state.orders.find_by_status(status).await?,
        (None, None) => state.orders.find_all().await?,
    };

    Ok(Json(ApiResponse::ok(orders)))
}

/// GET /api/v1/orders/{orderId}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<Json<ApiResponse<Order>>, ApiError> {
    let order = state
        .orders
        .find_by_order_id(&OrderId::new(order_id.as_str()))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {order_id} not found")))?;

    Ok(Json(ApiResponse::ok(order)))
}

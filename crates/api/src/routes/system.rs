//! Health and Prometheus metrics endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ConsumerHealth {
    pub state: String,
    pub ready: bool,
    pub epoch: u64,
    pub partitions: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub consumers: BTreeMap<&'static str, ConsumerHealth>,
}

/// GET /health — process liveness plus the state of each consumer runtime.
///
/// Always 200; `status` is `"starting"` until every consumer has an assignment.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let consumers: BTreeMap<_, _> = state
        .consumers
        .iter()
        .map(|(name, handle)| {
            let status = handle.status();
            (
                *name,
                ConsumerHealth {
                    state: status.state.to_string(),
                    ready: status.ready,
                    epoch: status.epoch,
                    partitions: status.partitions,
                },
            )
        })
        .collect();

    let status = if consumers.values().all(|c| c.ready) {
        "ok"
    } else {
        "starting"
    };

    Json(HealthResponse { status, consumers })
}

/// GET /metrics — returns Prometheus-formatted metrics.
pub async fn metrics(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        handle.render(),
    )
}

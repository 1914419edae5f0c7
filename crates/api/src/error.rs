//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use read_store::StoreError;
use thiserror::Error;

use crate::response::ErrorResponse;

/// API-level error type that maps to the error envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// A query parameter could not be parsed.
    #[error("Invalid value for '{field}': {value}")]
    InvalidParameter { field: &'static str, value: String },

    /// The read store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code placed in the `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InvalidParameter { .. } => "BAD_REQUEST",
            ApiError::Store(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        metrics::counter!("api_errors_total", "code" => code).increment(1);

        let body = match self {
            ApiError::NotFound(message) => ErrorResponse::new(code, message),
            ApiError::InvalidParameter { field, value } => {
                let mut details = serde_json::Map::new();
                details.insert(field.to_string(), serde_json::Value::String(value));
                ErrorResponse::new(code, format!("Invalid value for '{field}'"))
                    .with_details(serde_json::Value::Object(details))
            }
            ApiError::Store(err) => {
                tracing::error!(error = %err, "read store failure");
                ErrorResponse::new(code, "Failed to query the read store")
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

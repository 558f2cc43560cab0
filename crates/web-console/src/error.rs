//! REST error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the REST handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// Persistence failure
    #[error("store error: {0}")]
    Store(#[from] voxgate_access_store::StoreError),

    /// Unknown resource
    #[error("not found")]
    NotFound,

    /// Malformed request
    #[error("bad request: {reason}")]
    BadRequest {
        /// What is wrong with the request
        reason: String,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        };
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

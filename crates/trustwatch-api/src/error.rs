// crates/trustwatch-api/src/error.rs
// ============================================================================
// Module: API Error
// Description: Translates store/queue/validation failures into HTTP bodies.
// Purpose: Keep the 4xx/5xx propagation policy (§7) in one place.
// Dependencies: axum, trustwatch-core
// ============================================================================

//! Translates store/queue/validation failures into HTTP bodies.

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use serde::Serialize;
use thiserror::Error;
use trustwatch_core::interfaces::QueueError;
use trustwatch_core::interfaces::StoreError;

/// An error surfaced by a control-surface handler.
///
/// # Invariants
/// - [`ApiError::Validation`] always maps to a 4xx body; every other variant
///   maps to 404 (precondition violation) or 500 (unexpected backend error),
///   per §7's propagation policy.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body failed validation.
    #[error("invalid request: {0}")]
    Validation(String),
    /// The referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// An unexpected backend failure occurred.
    #[error("internal error: {0}")]
    Backend(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => Self::NotFound(msg),
            StoreError::Backend(msg) => Self::Backend(msg),
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::NotFound(msg) => Self::NotFound(msg),
            QueueError::Backend(msg) => Self::Backend(msg),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if matches!(self, Self::Backend(_)) {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

// crates/trustwatch-api/src/events.rs
// ============================================================================
// Module: Event Acknowledgement
// Description: POST /api/events/:id/ack (§4.7, §6).
// Dependencies: axum, trustwatch-core
// ============================================================================

//! POST /api/events/:id/ack (§4.7, §6).

use std::sync::Arc;

use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use trustwatch_core::EventId;

use crate::error::ApiError;
use crate::state::ApiState;
use crate::user::caller_user_id;

/// Marks an event the caller owns as acknowledged.
///
/// # Errors
/// Returns [`ApiError::NotFound`] when the event does not exist or is not
/// owned (via its company) by the caller.
pub async fn acknowledge_event(State(state): State<Arc<ApiState>>, headers: HeaderMap, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    let owner = caller_user_id(&headers)?;
    state.store.acknowledge_event(&EventId::new(id), &owner).await.map_err(ApiError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

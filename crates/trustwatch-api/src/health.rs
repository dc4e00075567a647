// crates/trustwatch-api/src/health.rs
// ============================================================================
// Module: Health Endpoint
// Description: GET /api/health — readiness + operational snapshot.
// Purpose: Supplemented feature (not in the distilled spec's endpoint table)
//          so load balancers and operators have something to poll.
// Dependencies: axum, trustwatch-core
// ============================================================================

//! GET /api/health — readiness + operational snapshot.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use crate::state::ApiState;

/// Health response body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `"ok"` or `"degraded"`.
    pub status: &'static str,
    /// Number of jobs currently waiting or active, if the store reports it.
    #[serde(rename = "queueDepth")]
    pub queue_depth: u64,
}

/// Reports store readiness and a queue-depth snapshot.
pub async fn health(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<HealthResponse>) {
    if state.store.readiness().await.is_err() {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(HealthResponse { status: "degraded", queue_depth: 0 }));
    }
    let stats = state.store.stats().await.unwrap_or_default();
    (StatusCode::OK, Json(HealthResponse { status: "ok", queue_depth: stats.queue_depth }))
}

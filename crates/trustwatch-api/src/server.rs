// crates/trustwatch-api/src/server.rs
// ============================================================================
// Module: Server
// Description: Builds the axum router for the control HTTP surface (§6).
// Dependencies: axum
// ============================================================================

//! Builds the axum router for the control HTTP surface (§6).

use std::sync::Arc;

use axum::Router;
use axum::middleware as axum_middleware;
use axum::routing::delete;
use axum::routing::get;
use axum::routing::post;

use crate::companies::create_company;
use crate::companies::delete_company;
use crate::crawl::run_crawl;
use crate::events::acknowledge_event;
use crate::health::health;
use crate::middleware::instrument;
use crate::state::ApiState;

/// Builds the router. The caller owns binding and serving it (`trustwatch-cli`).
///
/// Every route runs behind [`instrument`], which assigns a correlation
/// context and records a metric event before returning the response.
#[must_use]
pub fn router(state: ApiState) -> Router {
    let state = Arc::new(state);
    Router::new()
        .route("/api/companies", post(create_company))
        .route("/api/companies/{id}", delete(delete_company))
        .route("/api/crawl/run", post(run_crawl))
        .route("/api/events/{id}/ack", post(acknowledge_event))
        .route("/api/health", get(health))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), instrument))
        .with_state(state)
}

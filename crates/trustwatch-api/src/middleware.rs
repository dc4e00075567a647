// crates/trustwatch-api/src/middleware.rs
// ============================================================================
// Module: Request Middleware
// Description: Per-request correlation handling and metric recording for
//              every route on the control HTTP surface (§6).
// Purpose: Give every request a correlation context and a metric event
//          without each handler repeating the bookkeeping.
// Dependencies: axum, trustwatch-core
// ============================================================================

//! Per-request correlation handling and metric recording for every route on the control HTTP surface (§6).

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;

use crate::correlation::CLIENT_CORRELATION_HEADER;
use crate::correlation::CorrelationContext;
use crate::correlation::SERVER_CORRELATION_HEADER;
use crate::error::ApiError;
use crate::state::ApiState;
use crate::telemetry::ApiMetricEvent;
use crate::telemetry::ApiOutcome;
use crate::telemetry::ApiRoute;

/// Builds this request's correlation context, rejects a malformed client id
/// with a 400 before the handler runs, stamps the response with the
/// server-issued id, and records a metric event for the route either way.
pub async fn instrument(State(state): State<Arc<ApiState>>, request: Request, next: Next) -> Response {
    let route = route_for(request.method(), request.uri().path());
    let client_header = request.headers().get(CLIENT_CORRELATION_HEADER).and_then(|value| value.to_str().ok());

    let context = match CorrelationContext::from_header(client_header, &state.correlation) {
        Ok(context) => context,
        Err(rejection) => {
            tracing::warn!(reason = %rejection, route = route.as_str(), "rejected malformed client correlation id");
            return ApiError::Validation(format!("invalid {CLIENT_CORRELATION_HEADER} header: {rejection}")).into_response();
        }
    };

    let started_at = Instant::now();
    let mut response = next.run(request).await;
    let latency = started_at.elapsed();

    if let Ok(header_value) = HeaderValue::from_str(&context.server_id) {
        response.headers_mut().insert(SERVER_CORRELATION_HEADER, header_value);
    }

    let outcome = if response.status().is_success() { ApiOutcome::Ok } else { ApiOutcome::Error };
    let event = ApiMetricEvent {
        route,
        outcome,
        status: response.status().as_u16(),
        unsafe_client_correlation_id: context.unsafe_client_id,
        server_correlation_id: context.server_id,
    };
    state.metrics.record_request(event.clone());
    state.metrics.record_latency(event, latency);

    response
}

/// Classifies a request's route for metrics. Matching on method and path
/// rather than an extracted [`axum::extract::MatchedPath`] keeps this
/// middleware a plain function with no extra router wiring; the five routes
/// in [`crate::server::router`] are few and stable enough that this doesn't
/// drift in practice.
fn route_for(method: &Method, path: &str) -> ApiRoute {
    match (method.as_str(), path) {
        ("POST", "/api/companies") => ApiRoute::CreateCompany,
        ("POST", "/api/crawl/run") => ApiRoute::RunCrawl,
        ("GET", "/api/health") => ApiRoute::Health,
        ("DELETE", _) if path.starts_with("/api/companies/") => ApiRoute::DeleteCompany,
        ("POST", _) if path.starts_with("/api/events/") && path.ends_with("/ack") => ApiRoute::AckEvent,
        _ => ApiRoute::Health,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only assertions are permitted.")]
mod tests {
    use axum::http::Method;

    use super::route_for;
    use crate::telemetry::ApiRoute;

    #[test]
    fn classifies_every_registered_route() {
        assert_eq!(route_for(&Method::POST, "/api/companies"), ApiRoute::CreateCompany);
        assert_eq!(route_for(&Method::DELETE, "/api/companies/co-1"), ApiRoute::DeleteCompany);
        assert_eq!(route_for(&Method::POST, "/api/crawl/run"), ApiRoute::RunCrawl);
        assert_eq!(route_for(&Method::POST, "/api/events/ev-1/ack"), ApiRoute::AckEvent);
        assert_eq!(route_for(&Method::GET, "/api/health"), ApiRoute::Health);
    }
}

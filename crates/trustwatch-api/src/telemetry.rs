// crates/trustwatch-api/src/telemetry.rs
// ============================================================================
// Module: API Telemetry
// Description: Observability hooks for the control HTTP surface.
// Purpose: Provide metric events without hard-coding a metrics backend.
// Dependencies: none
// ============================================================================

//! ## Overview
//! A thin metrics interface for API request counters and latency
//! histograms, intentionally dependency-light so a deployment can plug in
//! Prometheus or OpenTelemetry without redesign.

use std::time::Duration;

/// Default latency buckets in milliseconds for API request histograms.
pub const API_LATENCY_BUCKETS_MS: &[u64] = &[1, 2, 5, 10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000];

/// The control-surface route a request hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ApiRoute {
    /// `POST /api/companies`.
    CreateCompany,
    /// `DELETE /api/companies/:id`.
    DeleteCompany,
    /// `POST /api/crawl/run`.
    RunCrawl,
    /// `POST /api/events/:id/ack`.
    AckEvent,
    /// `GET /api/health`.
    Health,
}

impl ApiRoute {
    /// Returns a stable label for the route.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateCompany => "create_company",
            Self::DeleteCompany => "delete_company",
            Self::RunCrawl => "run_crawl",
            Self::AckEvent => "ack_event",
            Self::Health => "health",
        }
    }
}

/// Request outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ApiOutcome {
    /// Successful request.
    Ok,
    /// Failed request.
    Error,
}

impl ApiOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}

/// One API request's metric event payload.
#[derive(Debug, Clone)]
pub struct ApiMetricEvent {
    /// Route classification.
    pub route: ApiRoute,
    /// Request outcome.
    pub outcome: ApiOutcome,
    /// HTTP status code returned.
    pub status: u16,
    /// Unsafe client correlation identifier when available.
    pub unsafe_client_correlation_id: Option<String>,
    /// Server-issued correlation identifier.
    pub server_correlation_id: String,
}

/// Metrics sink for API requests and latencies.
pub trait ApiMetrics: Send + Sync {
    /// Records a request counter event.
    fn record_request(&self, event: ApiMetricEvent);
    /// Records a latency observation for the request.
    fn record_latency(&self, event: ApiMetricEvent, latency: Duration);
}

/// No-op metrics sink; discards every event.
pub struct NoopMetrics;

impl ApiMetrics for NoopMetrics {
    fn record_request(&self, _event: ApiMetricEvent) {}

    fn record_latency(&self, _event: ApiMetricEvent, _latency: Duration) {}
}

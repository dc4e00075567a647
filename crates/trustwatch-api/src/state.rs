// crates/trustwatch-api/src/state.rs
// ============================================================================
// Module: API State
// Description: Shared collaborators every handler needs.
// Dependencies: trustwatch-core
// ============================================================================

//! Shared collaborators every handler needs.

use std::sync::Arc;

use trustwatch_core::Clock;
use trustwatch_core::interfaces::JobQueue;
use trustwatch_core::interfaces::Store;

use crate::correlation::CorrelationIdGenerator;
use crate::telemetry::ApiMetrics;

/// Shared state injected into every handler. The API talks only to the
/// store and queue (§4.7); it never calls the fetch or PDF adapters.
#[derive(Clone)]
pub struct ApiState {
    /// Entity persistence.
    pub store: Arc<dyn Store>,
    /// Durable job queue, used to enqueue `crawl_target` jobs.
    pub queue: Arc<dyn JobQueue>,
    /// Wall-clock source.
    pub clock: Arc<dyn Clock>,
    /// Correlation ID issuer for this process.
    pub correlation: Arc<CorrelationIdGenerator>,
    /// Metrics sink.
    pub metrics: Arc<dyn ApiMetrics>,
}

impl ApiState {
    /// Builds state with the given collaborators and a no-op metrics sink.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, queue: Arc<dyn JobQueue>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            queue,
            clock,
            correlation: Arc::new(CorrelationIdGenerator::new("trustwatch")),
            metrics: Arc::new(crate::telemetry::NoopMetrics),
        }
    }
}

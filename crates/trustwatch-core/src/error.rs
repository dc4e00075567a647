// crates/trustwatch-core/src/error.rs
// ============================================================================
// Module: Core Errors
// Description: Error taxonomy shared across workers, matching the design's
//              error-handling taxonomy (transient / structural / rate-limit /
//              duplicate / precondition).
// Dependencies: thiserror
// ============================================================================

//! Error taxonomy shared across workers.

use thiserror::Error;

/// Errors produced by pure core logic (seed derivation, extraction inputs).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A company domain string was empty or otherwise unusable for URL
    /// derivation.
    #[error("invalid company domain: {0}")]
    InvalidDomain(String),
}

/// The design's error-handling taxonomy (design-level, not a wire format):
/// a classification every worker-boundary error is mapped into so the queue
/// dispatcher can decide whether to retry, drop, or fail permanently.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Recovered by the queue's retry-with-backoff (scraper/parser/mail
    /// timeout, queue/store blip).
    #[error("transient failure: {0}")]
    Transient(String),
    /// After retries are exhausted the job is recorded failed permanently.
    #[error("structural input error: {0}")]
    Structural(String),
    /// Dropped silently; never fails the job.
    #[error("rate limit hit: {0}")]
    RateLimited(String),
    /// Treated as success; the pre-existing job owns execution.
    #[error("duplicate work: {0}")]
    Duplicate(String),
    /// The job fails permanently with no retry value (company/target missing).
    #[error("precondition violation: {0}")]
    Precondition(String),
}

impl WorkerError {
    /// Whether the queue should apply its retry-with-backoff policy to this
    /// error, per the error-handling taxonomy.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

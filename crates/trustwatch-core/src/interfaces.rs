// crates/trustwatch-core/src/interfaces.rs
// ============================================================================
// Module: Capability / Store / Queue Trait Surface
// Description: The process-scoped, explicit-init resources every worker,
//              the scheduler, and the API depend on.
// Purpose: Keep external collaborators (scraper, PDF parser, mail, durable
//          store, durable queue) behind narrow, test-doubled interfaces.
// Dependencies: serde, thiserror, time, crate::model, crate::identifiers
// ============================================================================

//! ## Overview
//! The fetch, PDF-parse, and mail adapters appear as interface-level
//! capabilities with two implementations each (real + demo/stub); no dynamic
//! dispatch beyond `dyn Trait` is required. The queue client, store client,
//! and adapters are process-scoped resources passed by `Arc` into each
//! role's constructor rather than reached through module-global state.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::identifiers::ClaimId;
use crate::identifiers::CompanyId;
use crate::identifiers::CrawlRunId;
use crate::identifiers::EventId;
use crate::identifiers::EvidenceId;
use crate::identifiers::TargetId;
use crate::identifiers::UserId;
use crate::model::ChangeEvent;
use crate::model::Claim;
use crate::model::ClaimType;
use crate::model::ClaimVersion;
use crate::model::Company;
use crate::model::CrawlRun;
use crate::model::CrawlRunDelta;
use crate::model::CrawlTarget;
use crate::model::Evidence;
use crate::model::EvidenceFields;
use crate::model::Severity;

// ============================================================================
// SECTION: Content Fetch Adapter (§4.3)
// ============================================================================

/// Metadata returned alongside fetched content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchMetadata {
    /// HTTP status code, when the adapter fetched over HTTP.
    pub status_code: Option<u16>,
    /// Declared content type, when available.
    pub content_type: Option<String>,
}

/// Errors surfaced distinctly from empty content, per §4.3.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The transport itself failed (DNS, connect, TLS, timeout).
    #[error("transport error fetching {url}: {message}")]
    Transport {
        /// URL that failed to fetch.
        url: String,
        /// Underlying transport error text.
        message: String,
    },
    /// The server responded but with a non-success status.
    #[error("http status {status} fetching {url}")]
    HttpStatus {
        /// URL that returned the status.
        url: String,
        /// The non-success status code.
        status: u16,
    },
}

/// Fetches a canonicalised, markdown-style text representation of a page.
#[async_trait]
pub trait FetchAdapter: Send + Sync {
    /// Fetches `url`, returning canonicalised plain text and metadata.
    ///
    /// # Errors
    /// Returns [`FetchError`] on transport or HTTP-status failure.
    async fn fetch(&self, url: &str) -> Result<(String, FetchMetadata), FetchError>;
}

// ============================================================================
// SECTION: PDF Parse Adapter (§4.6)
// ============================================================================

/// Errors from the PDF-parsing adapter.
#[derive(Debug, Error)]
pub enum PdfParseError {
    /// The PDF URL could not be fetched or was not a valid PDF.
    #[error("invalid pdf at {url}: {message}")]
    InvalidPdf {
        /// URL that failed to parse.
        url: String,
        /// Description of why parsing failed.
        message: String,
    },
    /// The parser itself failed transiently (timeout, transport).
    #[error("transient pdf parse failure for {url}: {message}")]
    Transient {
        /// URL being parsed.
        url: String,
        /// Underlying error text.
        message: String,
    },
}

/// The full text and per-page text of a parsed PDF.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPdf {
    /// Concatenated full text, in page order.
    pub full_text: String,
    /// Per-page text, keyed by zero-based page index.
    pub pages: BTreeMap<u32, String>,
}

/// Parses a PDF at a URL into full text and per-page text.
#[async_trait]
pub trait PdfParseAdapter: Send + Sync {
    /// Parses the PDF at `url`.
    ///
    /// # Errors
    /// Returns [`PdfParseError`] when the PDF cannot be fetched or parsed.
    async fn parse(&self, url: &str) -> Result<ParsedPdf, PdfParseError>;
}

// ============================================================================
// SECTION: Mail Adapter (alerting, §4.5 step 6)
// ============================================================================

/// Errors from the transactional mail adapter.
#[derive(Debug, Error)]
pub enum MailError {
    /// The mail provider rejected or failed to accept the message.
    #[error("mail send failed to {recipient}: {message}")]
    SendFailed {
        /// Intended recipient.
        recipient: String,
        /// Provider error text.
        message: String,
    },
}

/// A Critical-severity alert email to dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEmail {
    /// Recipient address, derived from the company's owning user.
    pub recipient: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

/// Dispatches a Critical-severity alert email.
#[async_trait]
pub trait MailAdapter: Send + Sync {
    /// Sends `email`.
    ///
    /// # Errors
    /// Returns [`MailError`] when the provider rejects the message.
    async fn send(&self, email: &AlertEmail) -> Result<(), MailError>;
}

// ============================================================================
// SECTION: Durable Store (§3)
// ============================================================================

/// Errors from the durable store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced entity does not exist (precondition violation, §7.5).
    #[error("not found: {0}")]
    NotFound(String),
    /// The underlying storage engine failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// A read-only operational snapshot of the store, for health/readiness.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of jobs currently waiting or active.
    pub queue_depth: u64,
    /// Median write-gateway latency in microseconds, if any writes occurred.
    pub write_latency_us_p50: Option<u64>,
}

/// Entity persistence for every collection in §3.
///
/// All mutating operations are small enough to be single-document; the
/// multi-document invariants named in §3 (uniqueness, index ordering) are
/// enforced by idempotent re-reads at the call site rather than
/// cross-document transactions, per §5's shared-resource policy.
#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts a new company.
    async fn create_company(&self, company: Company) -> Result<(), StoreError>;
    /// Fetches a company by id.
    async fn get_company(&self, id: &CompanyId) -> Result<Company, StoreError>;
    /// Lists companies owned by a user.
    async fn list_companies_by_user(&self, owner: &UserId) -> Result<Vec<Company>, StoreError>;
    /// Lists every company (scheduler fan-out).
    async fn list_all_companies(&self) -> Result<Vec<Company>, StoreError>;
    /// Deletes a company and cascades its targets.
    async fn delete_company(&self, id: &CompanyId) -> Result<(), StoreError>;
    /// Applies an additive, capped risk-score delta.
    async fn apply_risk_delta(&self, id: &CompanyId, delta: u8) -> Result<(), StoreError>;
    /// Updates `last_crawled_at`.
    async fn touch_company_crawled(&self, id: &CompanyId, at: OffsetDateTime) -> Result<(), StoreError>;

    /// Inserts a new crawl target.
    async fn create_target(&self, target: CrawlTarget) -> Result<(), StoreError>;
    /// Lists a company's crawl targets.
    async fn list_targets_by_company(&self, company_id: &CompanyId) -> Result<Vec<CrawlTarget>, StoreError>;
    /// Fetches a target by id.
    async fn get_target(&self, id: &TargetId) -> Result<CrawlTarget, StoreError>;
    /// Persists a target's new digest and crawl timestamp (§4.5 step 7).
    async fn update_target_digest(&self, id: &TargetId, digest: &str, at: OffsetDateTime) -> Result<(), StoreError>;

    /// Fetches the summary row for `(company, claim_type, key)`, if any.
    async fn find_claim(
        &self,
        company_id: &CompanyId,
        claim_type: ClaimType,
        normalized_key: &str,
    ) -> Result<Option<Claim>, StoreError>;
    /// Inserts a new claim summary row.
    async fn insert_claim(&self, claim: Claim) -> Result<(), StoreError>;
    /// Replaces a claim summary row in place.
    async fn update_claim(&self, claim: Claim) -> Result<(), StoreError>;
    /// Lists the company's currently active claims whose current source URL
    /// is `source_url` (for the removal sweep, §4.5 step 4).
    async fn list_active_claims_by_source(
        &self,
        company_id: &CompanyId,
        source_url: &str,
    ) -> Result<Vec<Claim>, StoreError>;

    /// Appends a new claim version.
    async fn insert_claim_version(&self, version: ClaimVersion) -> Result<(), StoreError>;
    /// Fetches the most recent version for a claim, if any.
    async fn latest_claim_version(&self, claim_id: &ClaimId) -> Result<Option<ClaimVersion>, StoreError>;

    /// Appends a new change event.
    async fn insert_event(&self, event: ChangeEvent) -> Result<(), StoreError>;
    /// Counts Critical events for a company with a non-null `emailed_at`
    /// within the trailing window ending at `now` (§4.5 step 6, P8).
    async fn count_critical_emailed_since(
        &self,
        company_id: &CompanyId,
        since: OffsetDateTime,
    ) -> Result<u64, StoreError>;
    /// Stamps `emailed_at` on an event.
    async fn mark_event_emailed(&self, id: &EventId, at: OffsetDateTime) -> Result<(), StoreError>;
    /// Sets `acknowledged = true` on an event owned by `owner`.
    async fn acknowledge_event(&self, id: &EventId, owner: &UserId) -> Result<(), StoreError>;

    /// Opens a new crawl run.
    async fn start_crawl_run(&self, run: CrawlRun) -> Result<(), StoreError>;
    /// Persists an updated crawl run (counters, errors, status).
    async fn update_crawl_run(&self, run: CrawlRun) -> Result<(), StoreError>;
    /// Applies one target job's settlement to the run it belongs to: adds
    /// `delta`'s counters and decrements the run's outstanding-target count,
    /// closing the run once no targets remain (§3's per-cycle telemetry).
    /// A no-op if the run id is unknown (e.g. a replayed job after the run
    /// row was pruned).
    async fn settle_crawl_run_target(&self, run_id: &CrawlRunId, delta: CrawlRunDelta, now: OffsetDateTime) -> Result<(), StoreError>;

    /// Checks whether evidence already exists for `(company, pdf_url)`.
    async fn find_evidence_by_url(
        &self,
        company_id: &CompanyId,
        pdf_url: &str,
    ) -> Result<Option<Evidence>, StoreError>;
    /// Inserts a new PENDING evidence row.
    async fn insert_evidence(&self, evidence: Evidence) -> Result<(), StoreError>;
    /// Fetches evidence by id.
    async fn get_evidence(&self, id: &EvidenceId) -> Result<Evidence, StoreError>;
    /// Persists evidence fields and marks it READY.
    async fn mark_evidence_ready(
        &self,
        id: &EvidenceId,
        fields: EvidenceFields,
        at: OffsetDateTime,
    ) -> Result<(), StoreError>;
    /// Marks evidence FAILED with an error message.
    async fn mark_evidence_failed(&self, id: &EvidenceId, error: &str, at: OffsetDateTime) -> Result<(), StoreError>;

    /// Acquires `scheduler:crawl:lock` with the given TTL using atomic
    /// set-if-absent; returns whether the lock was acquired.
    async fn acquire_scheduler_lock(&self, holder: &str, ttl_seconds: i64, now: OffsetDateTime) -> Result<bool, StoreError>;

    /// Readiness check for health endpoints.
    async fn readiness(&self) -> Result<(), StoreError> {
        Ok(())
    }
    /// Operational snapshot for health endpoints.
    async fn stats(&self) -> Result<StoreStats, StoreError> {
        Ok(StoreStats::default())
    }
}

// ============================================================================
// SECTION: Durable Job Queue (§4.1)
// ============================================================================

/// One of the three named queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueName {
    /// `send_alert_email`, priority 0.
    SendAlertEmail,
    /// `crawl_target`, priority 1.
    CrawlTarget,
    /// `process_evidence`, priority 2.
    ProcessEvidence,
}

impl QueueName {
    /// Lower is higher priority, per §4.1.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::SendAlertEmail => 0,
            Self::CrawlTarget => 1,
            Self::ProcessEvidence => 2,
        }
    }

    /// Wire name used in idempotency keys and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SendAlertEmail => "send_alert_email",
            Self::CrawlTarget => "crawl_target",
            Self::ProcessEvidence => "process_evidence",
        }
    }
}

/// Lifecycle status of one job row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting to be claimed.
    Pending,
    /// Claimed by a worker; execution in progress.
    Active,
    /// Waiting out a retry backoff window before becoming pending again.
    Delayed,
    /// Finished without error.
    Completed,
    /// Exhausted its retry budget.
    Failed,
}

/// The JSON payload carried by a job, per §6.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "queue", rename_all = "snake_case")]
pub enum JobPayload {
    /// `crawl_target` payload.
    CrawlTarget {
        /// Owning company.
        company_id: String,
        /// Target to crawl.
        target_id: String,
        /// URL to fetch.
        url: String,
        /// The crawl run this job's batch belongs to (§3's per-cycle
        /// telemetry); excluded from the idempotency key so retries and
        /// dedup are unaffected by which run opened the job.
        run_id: String,
    },
    /// `process_evidence` payload.
    ProcessEvidence {
        /// Evidence row id.
        evidence_id: String,
        /// PDF URL to parse.
        pdf_url: String,
        /// Owning company.
        company_id: String,
    },
    /// `send_alert_email` payload.
    SendAlertEmail {
        /// Event that triggered the alert.
        event_id: String,
        /// Recipient's user id.
        user_id: String,
        /// Recipient's email address.
        recipient_email: String,
    },
}

impl JobPayload {
    /// The queue this payload belongs to.
    #[must_use]
    pub const fn queue(&self) -> QueueName {
        match self {
            Self::CrawlTarget { .. } => QueueName::CrawlTarget,
            Self::ProcessEvidence { .. } => QueueName::ProcessEvidence,
            Self::SendAlertEmail { .. } => QueueName::SendAlertEmail,
        }
    }

    /// The idempotency key for this payload, per §4.1's key table.
    #[must_use]
    pub fn idempotency_key(&self) -> String {
        match self {
            Self::CrawlTarget { company_id, target_id, .. } => format!("crawl-{company_id}-{target_id}"),
            Self::ProcessEvidence { evidence_id, .. } => format!("evidence-{evidence_id}"),
            Self::SendAlertEmail { event_id, user_id, .. } => format!("email-{event_id}-{user_id}"),
        }
    }
}

/// One durable job row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Stable, opaque job identifier.
    pub id: String,
    /// Idempotency key, unique among non-terminal jobs in the same queue.
    pub idempotency_key: String,
    /// The job's payload (also determines its queue).
    pub payload: JobPayload,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Attempts made so far, starting at 0.
    pub attempts: u32,
    /// When this job was created.
    pub created_at: OffsetDateTime,
    /// When this job becomes eligible for claiming again, if delayed.
    pub run_at: OffsetDateTime,
    /// Error text from the most recent failed attempt, if any.
    pub last_error: Option<String>,
}

/// The outcome of an `enqueue` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// A new job was created.
    Created(String),
    /// A non-terminal job with this idempotency key already existed.
    Deduplicated(String),
}

impl EnqueueOutcome {
    /// The job id, whether newly created or deduplicated.
    #[must_use]
    pub fn job_id(&self) -> &str {
        match self {
            Self::Created(id) | Self::Deduplicated(id) => id,
        }
    }
}

/// Errors from the durable job queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The job referenced by id does not exist.
    #[error("job not found: {0}")]
    NotFound(String),
    /// The underlying storage engine failed.
    #[error("queue backend error: {0}")]
    Backend(String),
}

/// A durable, retrying, idempotency-keyed job log (§4.1).
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueues `payload`. A no-op (returning the existing handle) if a job
    /// with the same idempotency key is pending, active, or delayed.
    ///
    /// # Errors
    /// Returns [`QueueError`] on storage failure.
    async fn enqueue(&self, payload: JobPayload, now: OffsetDateTime) -> Result<EnqueueOutcome, QueueError>;

    /// Claims up to `limit` eligible (pending or due-delayed) jobs from
    /// `queue`, ordered by priority then age, marking them `Active`.
    ///
    /// # Errors
    /// Returns [`QueueError`] on storage failure.
    async fn claim(&self, queue: QueueName, limit: u32, now: OffsetDateTime) -> Result<Vec<Job>, QueueError>;

    /// Marks a job completed.
    ///
    /// # Errors
    /// Returns [`QueueError`] if the job does not exist.
    async fn mark_succeeded(&self, job_id: &str, now: OffsetDateTime) -> Result<(), QueueError>;

    /// Records a failed attempt. If attempts remain, the job is delayed with
    /// exponential backoff (5s, 10s, 20s); otherwise it is marked `Failed`.
    ///
    /// # Errors
    /// Returns [`QueueError`] if the job does not exist.
    async fn mark_failed(&self, job_id: &str, error: &str, now: OffsetDateTime) -> Result<(), QueueError>;

    /// Deletes completed jobs older than 1 hour beyond the most recent 1000,
    /// and failed jobs older than 24 hours beyond the most recent 500.
    ///
    /// # Errors
    /// Returns [`QueueError`] on storage failure.
    async fn prune(&self, now: OffsetDateTime) -> Result<u64, QueueError>;
}

/// Returns the alert severity threshold at which an event triggers the
/// per-company Critical-alert rate limit (§4.5 step 6).
#[must_use]
pub const fn is_alertable(severity: Severity) -> bool {
    matches!(severity, Severity::Critical)
}

// crates/trustwatch-queue/src/crawl_worker.rs
// ============================================================================
// Module: Crawl Worker
// Description: The change detector / event state machine driving one
//              crawl_target job through fetch -> extract -> diff -> emit.
// Purpose: Turn a fetched page into claim versions, change events, a risk
//          delta, alert dispatch, and an evidence fan-out, per §4.5.
// Dependencies: trustwatch-core
// ============================================================================

//! ## Overview
//! [`CrawlWorker::process_target`] runs the full eight-step cycle against
//! one claimed `crawl_target` job: digest short-circuit, claim upsert,
//! removal sweep, risk-score update, rate-limited alerting, digest
//! persistence, and evidence fan-out. Every side effect goes through the
//! [`Store`], [`FetchAdapter`], and [`MailAdapter`] traits, so the worker
//! itself has no knowledge of SQLite, HTTP, or SMTP.

use std::sync::Arc;

use time::Duration;
use time::OffsetDateTime;
use trustwatch_core::Clock;
use trustwatch_core::CompanyId;
use trustwatch_core::CrawlRunId;
use trustwatch_core::TargetId;
use trustwatch_core::error::WorkerError;
use trustwatch_core::extractor;
use trustwatch_core::hashing::sha256_hex;
use trustwatch_core::interfaces::AlertEmail;
use trustwatch_core::interfaces::FetchAdapter;
use trustwatch_core::interfaces::JobPayload;
use trustwatch_core::interfaces::JobQueue;
use trustwatch_core::interfaces::MailAdapter;
use trustwatch_core::interfaces::Store;
use trustwatch_core::model::Claim;
use trustwatch_core::model::ClaimStatus;
use trustwatch_core::model::ClaimVersion;
use trustwatch_core::model::ChangeEvent;
use trustwatch_core::model::CrawlRunDelta;
use trustwatch_core::model::EventType;
use trustwatch_core::model::Evidence;
use trustwatch_core::model::Severity;
use trustwatch_core::pdf_scan::find_pdf_urls;
use trustwatch_core::severity::TransitionSignals;
use trustwatch_core::severity::classify_removal;
use trustwatch_core::severity::classify_transition;
use trustwatch_core::severity::risk_delta;

use crate::errors::store_to_worker;
use crate::ids::new_id;

/// The per-company Critical-alert rate limit window (§4.5 step 6).
const ALERT_RATE_LIMIT_WINDOW: Duration = Duration::hours(1);
/// Critical alerts already emailed within the window before this one is
/// dropped silently instead of sent.
const ALERT_RATE_LIMIT_MAX: u64 = 5;

/// One `crawl_target` job's parameters, decoded from its [`JobPayload`].
#[derive(Debug, Clone)]
pub struct CrawlTargetJob {
    /// Owning company.
    pub company_id: CompanyId,
    /// Target being crawled.
    pub target_id: TargetId,
    /// URL to fetch.
    pub url: String,
    /// The crawl run this job's batch belongs to (§3's per-cycle telemetry).
    pub run_id: CrawlRunId,
}

impl TryFrom<JobPayload> for CrawlTargetJob {
    type Error = WorkerError;

    fn try_from(payload: JobPayload) -> Result<Self, Self::Error> {
        match payload {
            JobPayload::CrawlTarget { company_id, target_id, url, run_id } => {
                Ok(Self { company_id: CompanyId::new(company_id), target_id: TargetId::new(target_id), url, run_id: CrawlRunId::new(run_id) })
            }
            other => Err(WorkerError::Structural(format!("expected crawl_target payload, got {other:?}"))),
        }
    }
}

/// Drives the crawl change-detector cycle for one claimed job.
pub struct CrawlWorker {
    store: Arc<dyn Store>,
    queue: Arc<dyn JobQueue>,
    fetch: Arc<dyn FetchAdapter>,
    mail: Arc<dyn MailAdapter>,
    clock: Arc<dyn Clock>,
}

impl CrawlWorker {
    /// Creates a new crawl worker wired to its collaborators.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, queue: Arc<dyn JobQueue>, fetch: Arc<dyn FetchAdapter>, mail: Arc<dyn MailAdapter>, clock: Arc<dyn Clock>) -> Self {
        Self { store, queue, fetch, mail, clock }
    }

    /// Runs the full eight-step cycle for one `crawl_target` job, then
    /// settles its outcome against the job's [`CrawlRun`](trustwatch_core::model::CrawlRun)
    /// accumulator regardless of success or failure.
    ///
    /// # Errors
    /// Returns [`WorkerError`] when a step's collaborator fails in a way the
    /// queue should retry; per-claim failures do not occur (the algorithm
    /// has no partial-claim failure mode), so this only ever fails on
    /// store/fetch/mail errors.
    #[tracing::instrument(skip(self), fields(target_id = %job.target_id, url = %job.url))]
    pub async fn process_target(&self, job: &CrawlTargetJob) -> Result<(), WorkerError> {
        let now = self.clock.now();
        let outcome = self.run_cycle(job, now).await;
        let delta = match &outcome {
            Ok(delta) => delta.clone(),
            Err(err) => CrawlRunDelta { error: Some(err.to_string()), ..CrawlRunDelta::default() },
        };
        self.store.settle_crawl_run_target(&job.run_id, delta, now).await.map_err(store_to_worker)?;
        outcome.map(|_| ())
    }

    /// The cycle itself, isolated from run-accumulator bookkeeping so its
    /// early returns (digest short-circuit, fetch failure) don't need to
    /// duplicate the settlement call.
    async fn run_cycle(&self, job: &CrawlTargetJob, now: OffsetDateTime) -> Result<CrawlRunDelta, WorkerError> {
        let target = self.store.get_target(&job.target_id).await.map_err(store_to_worker)?;

        // Step 1: digest short-circuit.
        let (document, _metadata) = match self.fetch.fetch(&job.url).await {
            Ok(result) => result,
            Err(err) => return Err(WorkerError::Transient(err.to_string())),
        };
        let digest = sha256_hex(&document);
        if target.last_observed_digest.as_deref() == Some(digest.as_str()) {
            tracing::debug!("no content change, skipping extraction");
            self.store.update_target_digest(&job.target_id, &digest, now).await.map_err(store_to_worker)?;
            self.store.touch_company_crawled(&job.company_id, now).await.map_err(store_to_worker)?;
            return Ok(CrawlRunDelta { pages_crawled: 1, ..CrawlRunDelta::default() });
        }

        // Step 2: extract claims.
        let extracted = extractor::extract(&document, &job.url);

        // Step 3: upsert each extracted claim. Step 5 (risk score update) is
        // applied per-event as it's produced, keeping the score monotone
        // without needing to sum deltas across an unbounded claim set first.
        let mut current_keys = Vec::with_capacity(extracted.len());
        let mut events_emitted = 0_u32;
        for claim in &extracted {
            current_keys.push(claim.normalized_key.clone());
            events_emitted += u32::from(self.upsert_claim(&job.company_id, &job.url, claim, now).await?);
        }

        // Step 4: removal sweep.
        let active = self.store.list_active_claims_by_source(&job.company_id, &job.url).await.map_err(store_to_worker)?;
        for claim in active {
            if current_keys.contains(&claim.normalized_key) {
                continue;
            }
            self.remove_claim(claim, now).await?;
            events_emitted += 1;
        }

        // Step 7: persist digest + crawl timestamp.
        self.store.update_target_digest(&job.target_id, &digest, now).await.map_err(store_to_worker)?;
        self.store.touch_company_crawled(&job.company_id, now).await.map_err(store_to_worker)?;

        // Step 8: evidence fan-out.
        self.fan_out_evidence(&job.company_id, &job.url, &document, now).await?;

        Ok(CrawlRunDelta {
            pages_crawled: 1,
            claims_touched: u32::try_from(extracted.len()).unwrap_or(u32::MAX),
            events_emitted,
            error: None,
        })
    }

    /// Upserts one extracted claim against its existing summary row, if any,
    /// applying the risk delta for whatever event this produces. Returns
    /// whether an event was emitted.
    async fn upsert_claim(&self, company_id: &CompanyId, source_url: &str, extracted: &extractor::ExtractedClaim, now: OffsetDateTime) -> Result<bool, WorkerError> {
        let existing = self.store.find_claim(company_id, extracted.claim_type, &extracted.normalized_key).await.map_err(store_to_worker)?;

        let Some(mut claim) = existing else {
            let claim_id = new_claim_id();
            let claim = Claim {
                id: claim_id.clone(),
                company_id: company_id.clone(),
                claim_type: extracted.claim_type,
                normalized_key: extracted.normalized_key.clone(),
                status: ClaimStatus::Active,
                first_seen_at: now,
                last_seen_at: now,
                current_snippet: extracted.snippet.clone(),
                current_source_url: source_url.to_string(),
                confidence: extracted.confidence,
            };
            self.store.insert_claim(claim.clone()).await.map_err(store_to_worker)?;
            let version = ClaimVersion {
                id: new_claim_version_id(),
                claim_id,
                company_id: company_id.clone(),
                text_snippet: extracted.snippet.clone(),
                source_url: source_url.to_string(),
                content_digest: sha256_hex(&extracted.snippet),
                seen_at: now,
                polarity: extracted.polarity,
                metadata: extracted.metadata.clone(),
            };
            self.store.insert_claim_version(version).await.map_err(store_to_worker)?;
            self.emit_event(company_id, extracted.claim_type, &extracted.normalized_key, EventType::Added, Severity::Info, None, Some(extracted.snippet.clone()), source_url, now).await?;
            return Ok(true);
        };

        let new_digest = sha256_hex(&extracted.snippet);
        let latest = self.store.latest_claim_version(&claim.id).await.map_err(store_to_worker)?;
        if let Some(latest) = &latest {
            if latest.content_digest == new_digest {
                claim.last_seen_at = now;
                claim.status = ClaimStatus::Active;
                self.store.update_claim(claim).await.map_err(store_to_worker)?;
                return Ok(false);
            }
        }

        let old_snippet = latest.as_ref().map(|v| v.text_snippet.clone());
        let (numeric_changed, numeric_decreased) = latest.as_ref().map_or((false, false), |v| trustwatch_core::extractor::detect_numeric_change(&v.metadata, &extracted.metadata));
        let signals = TransitionSignals {
            weakened: old_snippet.as_deref().is_some_and(|old| trustwatch_core::extractor::detect_weakening(old, &extracted.snippet)),
            numeric_changed,
            numeric_decreased,
            polarity_reversed: latest.as_ref().is_some_and(|v| v.polarity != extracted.polarity),
        };
        let (event_type, severity) = classify_transition(signals);

        let version = ClaimVersion {
            id: new_claim_version_id(),
            claim_id: claim.id.clone(),
            company_id: company_id.clone(),
            text_snippet: extracted.snippet.clone(),
            source_url: source_url.to_string(),
            content_digest: new_digest,
            seen_at: now,
            polarity: extracted.polarity,
            metadata: extracted.metadata.clone(),
        };
        self.store.insert_claim_version(version).await.map_err(store_to_worker)?;

        claim.last_seen_at = now;
        claim.status = ClaimStatus::Active;
        claim.current_snippet = extracted.snippet.clone();
        claim.current_source_url = source_url.to_string();
        claim.confidence = extracted.confidence;
        self.store.update_claim(claim).await.map_err(store_to_worker)?;

        self.emit_event(company_id, extracted.claim_type, &extracted.normalized_key, event_type, severity, old_snippet, Some(extracted.snippet.clone()), source_url, now).await?;
        Ok(true)
    }

    /// Marks a claim removed and emits its `Removed` event (step 4).
    async fn remove_claim(&self, mut claim: Claim, now: OffsetDateTime) -> Result<(), WorkerError> {
        let severity = classify_removal(claim.claim_type);
        let old_snippet = claim.current_snippet.clone();
        let source_url = claim.current_source_url.clone();
        let claim_type = claim.claim_type;
        let key = claim.normalized_key.clone();
        claim.mark_removed(now);
        self.store.update_claim(claim.clone()).await.map_err(store_to_worker)?;
        self.emit_event(&claim.company_id, claim_type, &key, EventType::Removed, severity, Some(old_snippet), None, &source_url, now).await
    }

    /// Inserts a change event, applies its risk delta (step 5), and for
    /// Critical severity runs the rate-limited alert dispatch (step 6).
    #[allow(clippy::too_many_arguments, reason = "mirrors the ChangeEvent field list directly")]
    async fn emit_event(
        &self,
        company_id: &CompanyId,
        claim_type: trustwatch_core::model::ClaimType,
        normalized_key: &str,
        event_type: EventType,
        severity: Severity,
        old_snippet: Option<String>,
        new_snippet: Option<String>,
        source_url: &str,
        now: OffsetDateTime,
    ) -> Result<(), WorkerError> {
        let event = ChangeEvent {
            id: new_event_id(),
            company_id: company_id.clone(),
            claim_type,
            normalized_key: normalized_key.to_string(),
            event_type,
            severity,
            old_snippet,
            new_snippet,
            source_url: source_url.to_string(),
            detected_at: now,
            acknowledged: false,
            emailed_at: None,
        };
        let event_id = event.id.clone();
        self.store.insert_event(event).await.map_err(store_to_worker)?;

        let delta = risk_delta(event_type, severity);
        if delta > 0 {
            self.store.apply_risk_delta(company_id, delta).await.map_err(store_to_worker)?;
        }

        if severity == Severity::Critical {
            self.maybe_alert(company_id, &event_id, now).await?;
        }
        Ok(())
    }

    /// Rate-limited Critical-alert dispatch (§4.5 step 6, P8).
    async fn maybe_alert(&self, company_id: &CompanyId, event_id: &trustwatch_core::EventId, now: OffsetDateTime) -> Result<(), WorkerError> {
        let since = now - ALERT_RATE_LIMIT_WINDOW;
        let recent = self.store.count_critical_emailed_since(company_id, since).await.map_err(store_to_worker)?;
        if recent >= ALERT_RATE_LIMIT_MAX {
            tracing::debug!(%company_id, "critical alert rate-limited, dropping silently");
            return Ok(());
        }
        let company = self.store.get_company(company_id).await.map_err(store_to_worker)?;
        let email = AlertEmail {
            recipient: company.owner_user_id.into_string(),
            subject: format!("Trust claim alert for {}", company.display_name),
            body: format!("A critical trust-claim change was detected for {}.", company.display_name),
        };
        self.mail.send(&email).await.map_err(|err| WorkerError::Transient(err.to_string()))?;
        self.store.mark_event_emailed(event_id, now).await.map_err(store_to_worker)?;
        Ok(())
    }

    /// Scans fetched text for PDF links and enqueues evidence processing for
    /// URLs not already tracked (§4.5 step 8).
    async fn fan_out_evidence(&self, company_id: &CompanyId, source_url: &str, document: &str, now: OffsetDateTime) -> Result<(), WorkerError> {
        for pdf_url in find_pdf_urls(document) {
            if self.store.find_evidence_by_url(company_id, &pdf_url).await.map_err(store_to_worker)?.is_some() {
                continue;
            }
            let evidence = Evidence::pending(new_evidence_id(), company_id.clone(), pdf_url.clone(), source_url, now);
            let evidence_id = evidence.id.clone();
            self.store.insert_evidence(evidence).await.map_err(store_to_worker)?;
            self.queue
                .enqueue(
                    JobPayload::ProcessEvidence { evidence_id: evidence_id.into_string(), pdf_url, company_id: company_id.as_str().to_string() },
                    now,
                )
                .await
                .map_err(|err| WorkerError::Transient(err.to_string()))?;
        }
        Ok(())
    }
}

/// Mints a fresh claim id.
fn new_claim_id() -> trustwatch_core::ClaimId {
    trustwatch_core::ClaimId::new(new_id())
}

/// Mints a fresh claim version id.
fn new_claim_version_id() -> trustwatch_core::ClaimVersionId {
    trustwatch_core::ClaimVersionId::new(new_id())
}

/// Mints a fresh change event id.
fn new_event_id() -> trustwatch_core::EventId {
    trustwatch_core::EventId::new(new_id())
}

/// Mints a fresh evidence id.
fn new_evidence_id() -> trustwatch_core::EvidenceId {
    trustwatch_core::EvidenceId::new(new_id())
}

// crates/trustwatch-queue/src/evidence_worker.rs
// ============================================================================
// Module: Evidence Worker
// Description: Drives one process_evidence job: parse the PDF, extract its
//              deterministic fields, persist them (§4.6).
// Dependencies: trustwatch-core
// ============================================================================

//! ## Overview
//! [`EvidenceWorker::process_evidence`] is idempotent: a row already `Ready`
//! is treated as already done rather than re-parsed. A parse failure marks
//! the row `Failed` with the error text and re-throws so the queue's retry
//! policy can decide whether to try again.

use std::sync::Arc;

use trustwatch_core::Clock;
use trustwatch_core::EvidenceId;
use trustwatch_core::error::WorkerError;
use trustwatch_core::evidence_extractor::extract_fields;
use trustwatch_core::interfaces::PdfParseAdapter;
use trustwatch_core::interfaces::Store;
use trustwatch_core::model::EvidenceStatus;

use crate::errors::store_to_worker;

/// One `process_evidence` job's parameters, decoded from its `JobPayload`.
#[derive(Debug, Clone)]
pub struct ProcessEvidenceJob {
    /// Evidence row to process.
    pub evidence_id: EvidenceId,
    /// PDF URL to parse; carried in the payload so the worker needn't look
    /// it up before deciding the row is already done.
    pub pdf_url: String,
}

/// Drives the evidence field-extraction pipeline for one claimed job.
pub struct EvidenceWorker {
    store: Arc<dyn Store>,
    parser: Arc<dyn PdfParseAdapter>,
    clock: Arc<dyn Clock>,
}

impl EvidenceWorker {
    /// Creates a new evidence worker wired to its collaborators.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, parser: Arc<dyn PdfParseAdapter>, clock: Arc<dyn Clock>) -> Self {
        Self { store, parser, clock }
    }

    /// Parses and persists fields for one evidence row.
    ///
    /// # Errors
    /// Returns [`WorkerError::Transient`] on a retryable parse failure, after
    /// marking the row `Failed` so the most recent attempt is visible even if
    /// the job is later abandoned.
    #[tracing::instrument(skip(self), fields(evidence_id = %job.evidence_id))]
    pub async fn process_evidence(&self, job: &ProcessEvidenceJob) -> Result<(), WorkerError> {
        let evidence = self.store.get_evidence(&job.evidence_id).await.map_err(store_to_worker)?;
        if evidence.status == EvidenceStatus::Ready {
            tracing::debug!("evidence already ready, skipping re-parse");
            return Ok(());
        }

        let now = self.clock.now();
        match self.parser.parse(&job.pdf_url).await {
            Ok(parsed) => {
                let fields = extract_fields(&parsed);
                self.store.mark_evidence_ready(&job.evidence_id, fields, now).await.map_err(store_to_worker)?;
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                self.store.mark_evidence_failed(&job.evidence_id, &message, now).await.map_err(store_to_worker)?;
                Err(WorkerError::Transient(message))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only assertions are permitted.")]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use time::OffsetDateTime;
    use trustwatch_core::CompanyId;
    use trustwatch_core::clock::FixedClock;
    use trustwatch_core::interfaces::ParsedPdf;
    use trustwatch_core::interfaces::PdfParseError;
    use trustwatch_core::model::Evidence;

    use super::*;

    struct StubParser {
        result: Result<String, String>,
    }

    #[async_trait]
    impl PdfParseAdapter for StubParser {
        async fn parse(&self, _url: &str) -> Result<ParsedPdf, PdfParseError> {
            match &self.result {
                Ok(text) => {
                    let mut pages = std::collections::BTreeMap::new();
                    pages.insert(0, text.clone());
                    Ok(ParsedPdf { full_text: text.clone(), pages })
                }
                Err(message) => Err(PdfParseError::InvalidPdf { url: "https://acme.example/report.pdf".to_string(), message: message.clone() }),
            }
        }
    }

    struct StubStore {
        evidence: Mutex<Evidence>,
    }

    #[async_trait]
    impl Store for StubStore {
        async fn create_company(&self, _company: trustwatch_core::model::Company) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by evidence worker tests")
        }
        async fn get_company(&self, _id: &CompanyId) -> Result<trustwatch_core::model::Company, trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by evidence worker tests")
        }
        async fn list_companies_by_user(&self, _owner: &trustwatch_core::UserId) -> Result<Vec<trustwatch_core::model::Company>, trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by evidence worker tests")
        }
        async fn list_all_companies(&self) -> Result<Vec<trustwatch_core::model::Company>, trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by evidence worker tests")
        }
        async fn delete_company(&self, _id: &CompanyId) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by evidence worker tests")
        }
        async fn apply_risk_delta(&self, _id: &CompanyId, _delta: u8) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by evidence worker tests")
        }
        async fn touch_company_crawled(&self, _id: &CompanyId, _at: OffsetDateTime) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by evidence worker tests")
        }
        async fn create_target(&self, _target: trustwatch_core::model::CrawlTarget) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by evidence worker tests")
        }
        async fn list_targets_by_company(&self, _company_id: &CompanyId) -> Result<Vec<trustwatch_core::model::CrawlTarget>, trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by evidence worker tests")
        }
        async fn get_target(&self, _id: &trustwatch_core::TargetId) -> Result<trustwatch_core::model::CrawlTarget, trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by evidence worker tests")
        }
        async fn update_target_digest(&self, _id: &trustwatch_core::TargetId, _digest: &str, _at: OffsetDateTime) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by evidence worker tests")
        }
        async fn find_claim(&self, _company_id: &CompanyId, _claim_type: trustwatch_core::model::ClaimType, _normalized_key: &str) -> Result<Option<trustwatch_core::model::Claim>, trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by evidence worker tests")
        }
        async fn insert_claim(&self, _claim: trustwatch_core::model::Claim) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by evidence worker tests")
        }
        async fn update_claim(&self, _claim: trustwatch_core::model::Claim) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by evidence worker tests")
        }
        async fn list_active_claims_by_source(&self, _company_id: &CompanyId, _source_url: &str) -> Result<Vec<trustwatch_core::model::Claim>, trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by evidence worker tests")
        }
        async fn insert_claim_version(&self, _version: trustwatch_core::model::ClaimVersion) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by evidence worker tests")
        }
        async fn latest_claim_version(&self, _claim_id: &trustwatch_core::ClaimId) -> Result<Option<trustwatch_core::model::ClaimVersion>, trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by evidence worker tests")
        }
        async fn insert_event(&self, _event: trustwatch_core::model::ChangeEvent) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by evidence worker tests")
        }
        async fn count_critical_emailed_since(&self, _company_id: &CompanyId, _since: OffsetDateTime) -> Result<u64, trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by evidence worker tests")
        }
        async fn mark_event_emailed(&self, _id: &trustwatch_core::EventId, _at: OffsetDateTime) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by evidence worker tests")
        }
        async fn acknowledge_event(&self, _id: &trustwatch_core::EventId, _owner: &trustwatch_core::UserId) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by evidence worker tests")
        }
        async fn start_crawl_run(&self, _run: trustwatch_core::model::CrawlRun) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by evidence worker tests")
        }
        async fn update_crawl_run(&self, _run: trustwatch_core::model::CrawlRun) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by evidence worker tests")
        }
        async fn settle_crawl_run_target(
            &self,
            _run_id: &trustwatch_core::CrawlRunId,
            _delta: trustwatch_core::model::CrawlRunDelta,
            _now: OffsetDateTime,
        ) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by evidence worker tests")
        }
        async fn find_evidence_by_url(&self, _company_id: &CompanyId, _pdf_url: &str) -> Result<Option<Evidence>, trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by evidence worker tests")
        }
        async fn insert_evidence(&self, _evidence: Evidence) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by evidence worker tests")
        }
        async fn get_evidence(&self, _id: &EvidenceId) -> Result<Evidence, trustwatch_core::interfaces::StoreError> {
            Ok(self.evidence.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone())
        }
        async fn mark_evidence_ready(&self, _id: &EvidenceId, fields: trustwatch_core::model::EvidenceFields, at: OffsetDateTime) -> Result<(), trustwatch_core::interfaces::StoreError> {
            self.evidence.lock().unwrap_or_else(std::sync::PoisonError::into_inner).mark_ready(fields, at);
            Ok(())
        }
        async fn mark_evidence_failed(&self, _id: &EvidenceId, error: &str, at: OffsetDateTime) -> Result<(), trustwatch_core::interfaces::StoreError> {
            self.evidence.lock().unwrap_or_else(std::sync::PoisonError::into_inner).mark_failed(error, at);
            Ok(())
        }
        async fn acquire_scheduler_lock(&self, _holder: &str, _ttl_seconds: i64, _now: OffsetDateTime) -> Result<bool, trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by evidence worker tests")
        }
    }

    fn pending_evidence() -> Evidence {
        Evidence::pending(EvidenceId::new("ev-1"), CompanyId::new("co-1"), "https://acme.example/report.pdf", "https://acme.example/trust", OffsetDateTime::UNIX_EPOCH)
    }

    #[tokio::test]
    async fn successful_parse_marks_evidence_ready_with_fields() {
        let store: Arc<dyn Store> = Arc::new(StubStore { evidence: Mutex::new(pending_evidence()) });
        let parser: Arc<dyn PdfParseAdapter> = Arc::new(StubParser { result: Ok("This SOC 2 Type II report was audited by Example Assurance LLP.".to_string()) });
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(1000));
        let worker = EvidenceWorker::new(Arc::clone(&store), parser, clock);

        let job = ProcessEvidenceJob { evidence_id: EvidenceId::new("ev-1"), pdf_url: "https://acme.example/report.pdf".to_string() };
        worker.process_evidence(&job).await.expect("parse should succeed");

        let evidence = store.get_evidence(&EvidenceId::new("ev-1")).await.expect("evidence present");
        assert_eq!(evidence.status, EvidenceStatus::Ready);
        assert_eq!(evidence.fields.expect("fields present").report_type.as_deref(), Some("SOC 2 Type II"));
    }

    #[tokio::test]
    async fn failed_parse_marks_evidence_failed_and_returns_transient_error() {
        let store: Arc<dyn Store> = Arc::new(StubStore { evidence: Mutex::new(pending_evidence()) });
        let parser: Arc<dyn PdfParseAdapter> = Arc::new(StubParser { result: Err("not a pdf".to_string()) });
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(1000));
        let worker = EvidenceWorker::new(Arc::clone(&store), parser, clock);

        let job = ProcessEvidenceJob { evidence_id: EvidenceId::new("ev-1"), pdf_url: "https://acme.example/report.pdf".to_string() };
        let result = worker.process_evidence(&job).await;
        assert!(matches!(result, Err(WorkerError::Transient(_))));

        let evidence = store.get_evidence(&EvidenceId::new("ev-1")).await.expect("evidence present");
        assert_eq!(evidence.status, EvidenceStatus::Failed);
    }

    #[tokio::test]
    async fn already_ready_evidence_is_skipped_idempotently() {
        let mut evidence = pending_evidence();
        evidence.mark_ready(trustwatch_core::model::EvidenceFields::default(), OffsetDateTime::UNIX_EPOCH);
        let store: Arc<dyn Store> = Arc::new(StubStore { evidence: Mutex::new(evidence) });
        let parser: Arc<dyn PdfParseAdapter> = Arc::new(StubParser { result: Err("should not be called".to_string()) });
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(1000));
        let worker = EvidenceWorker::new(store, parser, clock);

        let job = ProcessEvidenceJob { evidence_id: EvidenceId::new("ev-1"), pdf_url: "https://acme.example/report.pdf".to_string() };
        worker.process_evidence(&job).await.expect("idempotent skip should succeed");
    }
}

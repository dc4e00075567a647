// crates/trustwatch-api/tests/api_smoke.rs
// ============================================================================
// Test: API Smoke
// Description: Exercises create-company and health against an in-memory
//              Store/JobQueue double, end to end through the axum router.
// ============================================================================
#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only assertions are permitted.")]

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::http::StatusCode;
use http_body_util::BodyExt;
use time::OffsetDateTime;
use tower::ServiceExt;
use trustwatch_api::ApiState;
use trustwatch_core::CompanyId;
use trustwatch_core::UserId;
use trustwatch_core::clock::FixedClock;
use trustwatch_core::interfaces::EnqueueOutcome;
use trustwatch_core::interfaces::JobPayload;
use trustwatch_core::interfaces::JobQueue;
use trustwatch_core::interfaces::QueueError;
use trustwatch_core::interfaces::QueueName;
use trustwatch_core::interfaces::Job;
use trustwatch_core::interfaces::Store;
use trustwatch_core::interfaces::StoreError;
use trustwatch_core::model::Company;
use trustwatch_core::model::CrawlTarget;

#[derive(Default)]
struct MemoryBackend {
    companies: Mutex<Vec<Company>>,
    targets: Mutex<Vec<CrawlTarget>>,
    enqueued: Mutex<Vec<JobPayload>>,
    crawl_runs: Mutex<Vec<trustwatch_core::model::CrawlRun>>,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[async_trait]
impl Store for MemoryBackend {
    async fn create_company(&self, company: Company) -> Result<(), StoreError> {
        lock(&self.companies).push(company);
        Ok(())
    }
    async fn get_company(&self, id: &CompanyId) -> Result<Company, StoreError> {
        lock(&self.companies).iter().find(|c| &c.id == id).cloned().ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
    async fn list_companies_by_user(&self, owner: &UserId) -> Result<Vec<Company>, StoreError> {
        Ok(lock(&self.companies).iter().filter(|c| &c.owner_user_id == owner).cloned().collect())
    }
    async fn list_all_companies(&self) -> Result<Vec<Company>, StoreError> {
        Ok(lock(&self.companies).clone())
    }
    async fn delete_company(&self, id: &CompanyId) -> Result<(), StoreError> {
        lock(&self.companies).retain(|c| &c.id != id);
        Ok(())
    }
    async fn apply_risk_delta(&self, _id: &CompanyId, _delta: u8) -> Result<(), StoreError> {
        unimplemented!("not exercised by the smoke test")
    }
    async fn touch_company_crawled(&self, _id: &CompanyId, _at: OffsetDateTime) -> Result<(), StoreError> {
        unimplemented!("not exercised by the smoke test")
    }
    async fn create_target(&self, target: CrawlTarget) -> Result<(), StoreError> {
        lock(&self.targets).push(target);
        Ok(())
    }
    async fn list_targets_by_company(&self, company_id: &CompanyId) -> Result<Vec<CrawlTarget>, StoreError> {
        Ok(lock(&self.targets).iter().filter(|t| &t.company_id == company_id).cloned().collect())
    }
    async fn get_target(&self, _id: &trustwatch_core::TargetId) -> Result<CrawlTarget, StoreError> {
        unimplemented!("not exercised by the smoke test")
    }
    async fn update_target_digest(&self, _id: &trustwatch_core::TargetId, _digest: &str, _at: OffsetDateTime) -> Result<(), StoreError> {
        unimplemented!("not exercised by the smoke test")
    }
    async fn find_claim(&self, _c: &CompanyId, _t: trustwatch_core::model::ClaimType, _k: &str) -> Result<Option<trustwatch_core::model::Claim>, StoreError> {
        unimplemented!("not exercised by the smoke test")
    }
    async fn insert_claim(&self, _claim: trustwatch_core::model::Claim) -> Result<(), StoreError> {
        unimplemented!("not exercised by the smoke test")
    }
    async fn update_claim(&self, _claim: trustwatch_core::model::Claim) -> Result<(), StoreError> {
        unimplemented!("not exercised by the smoke test")
    }
    async fn list_active_claims_by_source(&self, _c: &CompanyId, _u: &str) -> Result<Vec<trustwatch_core::model::Claim>, StoreError> {
        unimplemented!("not exercised by the smoke test")
    }
    async fn insert_claim_version(&self, _v: trustwatch_core::model::ClaimVersion) -> Result<(), StoreError> {
        unimplemented!("not exercised by the smoke test")
    }
    async fn latest_claim_version(&self, _claim_id: &trustwatch_core::ClaimId) -> Result<Option<trustwatch_core::model::ClaimVersion>, StoreError> {
        unimplemented!("not exercised by the smoke test")
    }
    async fn insert_event(&self, _event: trustwatch_core::model::ChangeEvent) -> Result<(), StoreError> {
        unimplemented!("not exercised by the smoke test")
    }
    async fn count_critical_emailed_since(&self, _c: &CompanyId, _since: OffsetDateTime) -> Result<u64, StoreError> {
        unimplemented!("not exercised by the smoke test")
    }
    async fn mark_event_emailed(&self, _id: &trustwatch_core::EventId, _at: OffsetDateTime) -> Result<(), StoreError> {
        unimplemented!("not exercised by the smoke test")
    }
    async fn acknowledge_event(&self, _id: &trustwatch_core::EventId, _owner: &UserId) -> Result<(), StoreError> {
        unimplemented!("not exercised by the smoke test")
    }
    async fn start_crawl_run(&self, run: trustwatch_core::model::CrawlRun) -> Result<(), StoreError> {
        lock(&self.crawl_runs).push(run);
        Ok(())
    }
    async fn update_crawl_run(&self, _run: trustwatch_core::model::CrawlRun) -> Result<(), StoreError> {
        unimplemented!("not exercised by the smoke test")
    }
    async fn settle_crawl_run_target(&self, _run_id: &trustwatch_core::CrawlRunId, _delta: trustwatch_core::model::CrawlRunDelta, _now: OffsetDateTime) -> Result<(), StoreError> {
        unimplemented!("not exercised by the smoke test")
    }
    async fn find_evidence_by_url(&self, _c: &CompanyId, _u: &str) -> Result<Option<trustwatch_core::model::Evidence>, StoreError> {
        unimplemented!("not exercised by the smoke test")
    }
    async fn insert_evidence(&self, _evidence: trustwatch_core::model::Evidence) -> Result<(), StoreError> {
        unimplemented!("not exercised by the smoke test")
    }
    async fn get_evidence(&self, _id: &trustwatch_core::EvidenceId) -> Result<trustwatch_core::model::Evidence, StoreError> {
        unimplemented!("not exercised by the smoke test")
    }
    async fn mark_evidence_ready(&self, _id: &trustwatch_core::EvidenceId, _fields: trustwatch_core::model::EvidenceFields, _at: OffsetDateTime) -> Result<(), StoreError> {
        unimplemented!("not exercised by the smoke test")
    }
    async fn mark_evidence_failed(&self, _id: &trustwatch_core::EvidenceId, _error: &str, _at: OffsetDateTime) -> Result<(), StoreError> {
        unimplemented!("not exercised by the smoke test")
    }
    async fn acquire_scheduler_lock(&self, _holder: &str, _ttl_seconds: i64, _now: OffsetDateTime) -> Result<bool, StoreError> {
        unimplemented!("not exercised by the smoke test")
    }
}

#[async_trait]
impl JobQueue for MemoryBackend {
    async fn enqueue(&self, payload: JobPayload, _now: OffsetDateTime) -> Result<EnqueueOutcome, QueueError> {
        let key = payload.idempotency_key();
        lock(&self.enqueued).push(payload);
        Ok(EnqueueOutcome::Created(key))
    }
    async fn claim(&self, _queue: QueueName, _limit: u32, _now: OffsetDateTime) -> Result<Vec<Job>, QueueError> {
        unimplemented!("not exercised by the smoke test")
    }
    async fn mark_succeeded(&self, _job_id: &str, _now: OffsetDateTime) -> Result<(), QueueError> {
        unimplemented!("not exercised by the smoke test")
    }
    async fn mark_failed(&self, _job_id: &str, _error: &str, _now: OffsetDateTime) -> Result<(), QueueError> {
        unimplemented!("not exercised by the smoke test")
    }
    async fn prune(&self, _now: OffsetDateTime) -> Result<u64, QueueError> {
        unimplemented!("not exercised by the smoke test")
    }
}

#[tokio::test]
async fn create_company_seeds_targets_and_enqueues_crawls() {
    let backend = Arc::new(MemoryBackend::default());
    let store: Arc<dyn Store> = backend.clone();
    let queue: Arc<dyn JobQueue> = backend.clone();
    let clock: Arc<dyn trustwatch_core::Clock> = Arc::new(FixedClock::new(1_000));
    let app = trustwatch_api::router(ApiState::new(store, queue, clock));

    let body = serde_json::json!({
        "domain": "acme.example",
        "displayName": "Acme",
        "categories": ["security"],
    });
    let request = Request::builder()
        .method("POST")
        .uri("/api/companies")
        .header("content-type", "application/json")
        .header("x-trustwatch-user-id", "user-1")
        .body(Body::from(serde_json::to_vec(&body).expect("serializable")))
        .expect("request builds");

    let response = app.clone().oneshot(request).await.expect("request succeeds");
    assert_eq!(response.status(), StatusCode::CREATED);
    let bytes = response.into_body().collect().await.expect("body readable").to_bytes();
    let parsed: serde_json::Value = serde_json::from_slice(&bytes).expect("valid json");
    assert_eq!(parsed["seededTargets"], serde_json::json!(3));
    let enqueued = lock(&backend.enqueued);
    assert_eq!(enqueued.len(), 3);
    let crawl_runs = lock(&backend.crawl_runs);
    assert_eq!(crawl_runs.len(), 1, "one CrawlRun should cover the whole seed batch");
    assert_eq!(crawl_runs[0].pending_targets, 3);
    for payload in enqueued.iter() {
        let JobPayload::CrawlTarget { run_id, .. } = payload else {
            panic!("expected a crawl_target payload");
        };
        assert_eq!(run_id, crawl_runs[0].id.as_str());
    }
    drop(enqueued);
    drop(crawl_runs);

    let health_request = Request::builder().uri("/api/health").body(Body::empty()).expect("request builds");
    let health_response = app.oneshot(health_request).await.expect("request succeeds");
    assert_eq!(health_response.status(), StatusCode::OK);
}

#[tokio::test]
async fn create_company_without_categories_is_rejected() {
    let backend = Arc::new(MemoryBackend::default());
    let store: Arc<dyn Store> = backend.clone();
    let queue: Arc<dyn JobQueue> = backend.clone();
    let clock: Arc<dyn trustwatch_core::Clock> = Arc::new(FixedClock::new(1_000));
    let app = trustwatch_api::router(ApiState::new(store, queue, clock));

    let body = serde_json::json!({ "domain": "acme.example", "displayName": "Acme", "categories": [] });
    let request = Request::builder()
        .method("POST")
        .uri("/api/companies")
        .header("content-type", "application/json")
        .header("x-trustwatch-user-id", "user-1")
        .body(Body::from(serde_json::to_vec(&body).expect("serializable")))
        .expect("request builds");

    let response = app.oneshot(request).await.expect("request succeeds");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

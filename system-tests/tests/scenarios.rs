// system-tests/tests/scenarios.rs
// ============================================================================
// Test: End-to-End Scenarios
// Description: S1-S6 driven against a real SqliteStore, CrawlWorker, and
//              EvidenceWorker — only the fetch/mail capability seam is a
//              demo double.
// ============================================================================
#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only assertions are permitted.")]

use std::sync::Arc;

use time::OffsetDateTime;
use trustwatch_adapters::DemoFetchAdapter;
use trustwatch_adapters::DemoMailAdapter;
use trustwatch_adapters::DemoPdfParseAdapter;
use trustwatch_core::Clock;
use trustwatch_core::CompanyId;
use trustwatch_core::CrawlRunId;
use trustwatch_core::TargetId;
use trustwatch_core::UserId;
use trustwatch_core::clock::FixedClock;
use trustwatch_core::interfaces::JobQueue;
use trustwatch_core::interfaces::JobPayload;
use trustwatch_core::interfaces::QueueName;
use trustwatch_core::interfaces::Store;
use trustwatch_core::model::Category;
use trustwatch_core::model::ClaimStatus;
use trustwatch_core::model::ClaimType;
use trustwatch_core::model::Company;
use trustwatch_core::model::CrawlTarget;
use trustwatch_queue::CrawlTargetJob;
use trustwatch_queue::CrawlWorker;
use trustwatch_queue::EvidenceWorker;
use trustwatch_queue::ProcessEvidenceJob;
use trustwatch_store_sqlite::SqliteStore;
use trustwatch_store_sqlite::SqliteStoreConfig;

const TARGET_URL: &str = "https://acme.example/trust";

struct Harness {
    store: Arc<SqliteStore>,
    worker: CrawlWorker,
    mail: Arc<DemoMailAdapter>,
    clock: Arc<FixedClock>,
    target_id: TargetId,
    company_id: CompanyId,
}

impl Harness {
    async fn new(dir: &tempfile::TempDir) -> Self {
        let db_path = dir.path().join("trustwatch.db");
        let store = Arc::new(SqliteStore::open(SqliteStoreConfig::new(db_path)).expect("store opens"));
        let clock = Arc::new(FixedClock::new(1_700_000_000));
        let company_id = CompanyId::new("company-1");
        let target_id = TargetId::new("target-1");
        let owner = UserId::new("user-1");

        let company = Company::new(
            company_id.clone(),
            owner,
            "Acme",
            "acme.example",
            [Category::Security, Category::Privacy, Category::Sla].into_iter().collect(),
            clock.now(),
        );
        store.create_company(company).await.expect("company created");
        store.create_target(CrawlTarget::seed(target_id.clone(), company_id.clone(), TARGET_URL)).await.expect("target created");

        let fetch: Arc<DemoFetchAdapter> = Arc::new(DemoFetchAdapter::new());
        let mail = Arc::new(DemoMailAdapter::new());
        let queue: Arc<dyn JobQueue> = store.clone();
        let store_trait: Arc<dyn Store> = store.clone();
        let worker = CrawlWorker::new(store_trait, queue, fetch, mail.clone(), clock.clone());

        Self { store, worker, mail, clock, target_id, company_id }
    }

    /// Re-registers the fetch adapter's canned page and re-crawls the target.
    async fn crawl_with_page(&mut self, text: &str) {
        let fetch: Arc<DemoFetchAdapter> = Arc::new(DemoFetchAdapter::new().with_page(TARGET_URL, text));
        let queue: Arc<dyn JobQueue> = self.store.clone();
        let store_trait: Arc<dyn Store> = self.store.clone();
        self.worker = CrawlWorker::new(store_trait, queue, fetch, self.mail.clone(), self.clock.clone());
        let job =
            CrawlTargetJob { company_id: self.company_id.clone(), target_id: self.target_id.clone(), url: TARGET_URL.to_string(), run_id: CrawlRunId::new("run-1") };
        self.worker.process_target(&job).await.expect("crawl succeeds");
    }

    async fn company(&self) -> Company {
        self.store.get_company(&self.company_id).await.expect("company exists")
    }
}

#[tokio::test]
async fn s1_baseline_add_creates_three_claims_at_info_severity() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut harness = Harness::new(&dir).await;

    harness.crawl_with_page("We are SOC 2 Type II compliant. We guarantee 99.99% uptime. We do not sell customer data.").await;

    let soc2 = harness.store.find_claim(&harness.company_id, ClaimType::Compliance, "SOC2_TYPE_II").await.expect("lookup ok");
    let uptime = harness.store.find_claim(&harness.company_id, ClaimType::Sla, "UPTIME").await.expect("lookup ok");
    let dns = harness.store.find_claim(&harness.company_id, ClaimType::Privacy, "DO_NOT_SELL").await.expect("lookup ok");
    assert!(soc2.is_some());
    assert!(uptime.is_some());
    assert!(dns.is_some());
    assert_eq!(uptime.unwrap().status, ClaimStatus::Active);
    assert_eq!(harness.company().await.risk_score, 0);
}

#[tokio::test]
async fn s2_silent_removal_raises_critical_event_and_risk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut harness = Harness::new(&dir).await;
    harness.crawl_with_page("We are SOC 2 Type II compliant. We guarantee 99.99% uptime. We do not sell customer data.").await;
    harness.clock.advance(60);

    harness.crawl_with_page("We guarantee 99.99% uptime. We do not sell customer data.").await;

    let soc2 = harness.store.find_claim(&harness.company_id, ClaimType::Compliance, "SOC2_TYPE_II").await.expect("lookup ok").expect("claim exists");
    assert_eq!(soc2.status, ClaimStatus::Removed);
    assert_eq!(harness.company().await.risk_score, 40);
    assert_eq!(harness.mail.sent().len(), 1);
}

#[tokio::test]
async fn s3_weakening_is_critical_and_adds_to_risk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut harness = Harness::new(&dir).await;
    harness.crawl_with_page("We do not sell customer data.").await;
    harness.clock.advance(60);

    harness.crawl_with_page("We may share data with trusted partners.").await;

    let claim = harness.store.find_claim(&harness.company_id, ClaimType::Privacy, "DO_NOT_SELL").await.expect("lookup ok").expect("claim exists");
    assert_eq!(claim.status, ClaimStatus::Active);
    assert_eq!(harness.company().await.risk_score, 40);
}

#[tokio::test]
async fn s4_numeric_downgrade_is_medium_and_adds_ten_to_risk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut harness = Harness::new(&dir).await;
    harness.crawl_with_page("We guarantee 99.99% uptime.").await;
    harness.clock.advance(60);

    harness.crawl_with_page("We guarantee 99.9% uptime.").await;

    assert_eq!(harness.company().await.risk_score, 10);
    let claim = harness.store.find_claim(&harness.company_id, ClaimType::Sla, "UPTIME").await.expect("lookup ok").expect("claim exists");
    let version = harness.store.latest_claim_version(&claim.id).await.expect("lookup ok").expect("version exists");
    assert_eq!(version.metadata.numeric_value(), Some(99.9));
}

#[tokio::test]
async fn s5_evidence_fan_out_creates_pending_rows_and_dedupes_on_recrawl() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut harness = Harness::new(&dir).await;
    let page = "See https://x.example/report.pdf and again https://x.example/report.pdf, also https://y.example/iso.pdf.";

    harness.crawl_with_page(page).await;

    let first = harness.store.find_evidence_by_url(&harness.company_id, "https://x.example/report.pdf").await.expect("lookup ok");
    let second = harness.store.find_evidence_by_url(&harness.company_id, "https://y.example/iso.pdf").await.expect("lookup ok");
    assert!(first.is_some());
    assert!(second.is_some());

    harness.clock.advance(60);
    harness.crawl_with_page(page).await;
    let still_one = harness.store.find_evidence_by_url(&harness.company_id, "https://x.example/report.pdf").await.expect("lookup ok");
    assert_eq!(still_one.expect("still present").id, first.expect("present").id);
}

#[tokio::test]
async fn s6_rate_limit_caps_critical_alerts_at_five_per_hour() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut harness = Harness::new(&dir).await;

    // Six independent compliance-type claims so six independent REMOVED
    // events can fire without colliding on the same normalized key.
    let mut seed = "We are SOC 2 Type II compliant. We are ISO 27001 certified. ".to_string();
    for n in 0..4 {
        seed.push_str(&format!("We are {} compliant. ", ["HIPAA", "PCI DSS", "CCPA", "FedRAMP"][n]));
    }
    harness.crawl_with_page(&seed).await;
    harness.clock.advance(60);
    harness.crawl_with_page("").await;

    assert_eq!(harness.mail.sent().len(), 5);
}

#[tokio::test]
async fn p1_unchanged_content_is_a_no_op() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut harness = Harness::new(&dir).await;
    let page = "We guarantee 99.99% uptime.";
    harness.crawl_with_page(page).await;
    let risk_after_first = harness.company().await.risk_score;

    harness.clock.advance(60);
    harness.crawl_with_page(page).await;

    assert_eq!(harness.company().await.risk_score, risk_after_first);
}

#[tokio::test]
async fn r2_replaying_a_ready_evidence_job_does_not_alter_its_fields() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(SqliteStore::open(SqliteStoreConfig::new(dir.path().join("trustwatch.db"))).expect("store opens"));
    let clock = Arc::new(FixedClock::new(1_700_000_000));
    let company_id = CompanyId::new("company-1");
    let owner = UserId::new("user-1");
    store
        .create_company(Company::new(company_id.clone(), owner, "Acme", "acme.example", std::iter::once(Category::Security).collect(), clock.now()))
        .await
        .expect("company created");

    let pdf_url = "https://acme.example/soc2.pdf";
    let evidence = trustwatch_core::model::Evidence::pending(trustwatch_core::EvidenceId::new("ev-1"), company_id.clone(), pdf_url.to_string(), TARGET_URL, clock.now());
    let evidence_id = evidence.id.clone();
    store.insert_evidence(evidence).await.expect("evidence inserted");

    let parser = Arc::new(DemoPdfParseAdapter::new().with_document(pdf_url, "SOC 2 Type II report. Audited by Example LLP."));
    let store_trait: Arc<dyn Store> = store.clone();
    let worker = EvidenceWorker::new(store_trait, parser, clock.clone());
    let job = ProcessEvidenceJob { evidence_id: evidence_id.clone(), pdf_url: pdf_url.to_string() };

    worker.process_evidence(&job).await.expect("first parse succeeds");
    let ready = store.get_evidence(&evidence_id).await.expect("evidence exists");
    assert_eq!(ready.status, trustwatch_core::model::EvidenceStatus::Ready);

    worker.process_evidence(&job).await.expect("replay is a no-op");
    let replayed = store.get_evidence(&evidence_id).await.expect("evidence exists");
    assert_eq!(replayed.fields, ready.fields);
}

#[tokio::test]
async fn r3_enqueueing_the_same_idempotency_key_twice_yields_one_job() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(SqliteStore::open(SqliteStoreConfig::new(dir.path().join("trustwatch.db"))).expect("store opens"));
    let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid timestamp");
    let payload = JobPayload::CrawlTarget { company_id: "c-1".to_string(), target_id: "t-1".to_string(), url: TARGET_URL.to_string(), run_id: "run-1".to_string() };

    store.enqueue(payload.clone(), now).await.expect("first enqueue");
    store.enqueue(payload, now).await.expect("second enqueue is a no-op");

    let claimed = store.claim(QueueName::CrawlTarget, 10, now).await.expect("claim succeeds");
    assert_eq!(claimed.len(), 1);
}

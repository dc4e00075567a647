// crates/trustwatch-queue/src/scheduler.rs
// ============================================================================
// Module: Scheduler
// Description: Single-leader periodic tick that enqueues crawl_target jobs
//              for every company's targets (§4.2).
// Purpose: Keep scheduling and execution strictly separate: this loop does no
//          network I/O beyond the queue and store.
// Dependencies: trustwatch-core, tokio
// ============================================================================

//! ## Overview
//! [`Scheduler::run`] loops on a fixed interval, each tick attempting to
//! acquire `scheduler:crawl:lock` via [`Store::acquire_scheduler_lock`]. Only
//! the replica that wins the lock enumerates companies and targets and
//! batch-enqueues `crawl_target` jobs; every other replica's tick is a no-op.
//! The lock's TTL is deliberately shorter than the tick period so a crashed
//! leader's lock expires before the next tick.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use time::Duration;
use trustwatch_core::Clock;
use trustwatch_core::CrawlRunId;
use trustwatch_core::interfaces::JobPayload;
use trustwatch_core::interfaces::JobQueue;
use trustwatch_core::interfaces::Store;
use trustwatch_core::model::CrawlRun;

use crate::ids::new_id;
use crate::shutdown::ShutdownSignal;

/// Drives the periodic, single-leader crawl-target enqueue cycle.
pub struct Scheduler {
    store: Arc<dyn Store>,
    queue: Arc<dyn JobQueue>,
    clock: Arc<dyn Clock>,
    /// Interval between ticks.
    tick_period: StdDuration,
    /// TTL applied to the leader lock; shorter than `tick_period`.
    lock_ttl: Duration,
    /// This replica's unique lock-holder id. Must differ across replicas so
    /// `acquire_scheduler_lock`'s `acquired_holder == holder` check actually
    /// distinguishes "we won the lock" from "someone else still holds it".
    holder_id: String,
}

impl Scheduler {
    /// Creates a new scheduler, generating a fresh unique holder id for this
    /// replica.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, queue: Arc<dyn JobQueue>, clock: Arc<dyn Clock>, tick_period: StdDuration, lock_ttl: StdDuration) -> Self {
        let lock_ttl_seconds = i64::try_from(lock_ttl.as_secs()).unwrap_or(i64::MAX);
        Self { store, queue, clock, tick_period, lock_ttl: Duration::seconds(lock_ttl_seconds), holder_id: format!("scheduler-{}", new_id()) }
    }

    /// Runs the tick loop until `shutdown` is requested.
    pub async fn run(&self, shutdown: &ShutdownSignal) {
        let mut interval = tokio::time::interval(self.tick_period);
        loop {
            interval.tick().await;
            if shutdown.is_requested() {
                tracing::info!("scheduler shutting down gracefully");
                return;
            }
            if let Err(err) = self.tick().await {
                tracing::warn!(error = %err, "scheduler tick failed");
            }
        }
    }

    /// Runs one tick: attempts the leader lock, and if won, enqueues a
    /// `crawl_target` job for every target of every company.
    ///
    /// # Errors
    /// Returns a [`trustwatch_core::interfaces::StoreError`] message on
    /// storage failure; queue-enqueue failures for individual targets are
    /// logged and skipped rather than aborting the whole tick.
    pub async fn tick(&self) -> Result<(), String> {
        let now = self.clock.now();
        let lock_ttl_seconds = self.lock_ttl.whole_seconds();
        let acquired = self
            .store
            .acquire_scheduler_lock(&self.holder_id, lock_ttl_seconds, now)
            .await
            .map_err(|err| err.to_string())?;
        if !acquired {
            tracing::debug!("scheduler lock held elsewhere, skipping tick");
            return Ok(());
        }

        let companies = self.store.list_all_companies().await.map_err(|err| err.to_string())?;
        let mut enqueued = 0_u32;
        for company in companies {
            let targets = match self.store.list_targets_by_company(&company.id).await {
                Ok(targets) => targets,
                Err(err) => {
                    tracing::warn!(company_id = %company.id, error = %err, "failed to list targets, skipping company this tick");
                    continue;
                }
            };
            if targets.is_empty() {
                continue;
            }

            // Open one CrawlRun covering this company's whole batch so the
            // crawl worker can close it once every target has settled (§3).
            let run_id = CrawlRunId::new(new_id());
            let target_count = u32::try_from(targets.len()).unwrap_or(u32::MAX);
            let run = CrawlRun::start(run_id.clone(), Some(company.id.clone()), now, target_count);
            if let Err(err) = self.store.start_crawl_run(run).await {
                tracing::warn!(company_id = %company.id, error = %err, "failed to open crawl run, skipping company this tick");
                continue;
            }

            for target in targets {
                let payload = JobPayload::CrawlTarget {
                    company_id: company.id.as_str().to_string(),
                    target_id: target.id.as_str().to_string(),
                    url: target.url.clone(),
                    run_id: run_id.as_str().to_string(),
                };
                if let Err(err) = self.queue.enqueue(payload, now).await {
                    tracing::warn!(target_id = %target.id, error = %err, "failed to enqueue crawl_target job");
                    continue;
                }
                enqueued += 1;
            }
        }
        tracing::info!(enqueued, "scheduler tick enqueued crawl jobs");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only assertions are permitted.")]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    use time::OffsetDateTime;
    use trustwatch_core::CompanyId;
    use trustwatch_core::UserId;
    use trustwatch_core::clock::FixedClock;
    use trustwatch_core::interfaces::EnqueueOutcome;
    use trustwatch_core::interfaces::QueueError;
    use trustwatch_core::model::Category;
    use trustwatch_core::model::Company;
    use trustwatch_core::model::CrawlTarget;

    use super::*;

    /// A minimal in-memory [`Store`]/[`JobQueue`] double covering only the
    /// calls the scheduler makes.
    struct FakeBackend {
        companies: Vec<Company>,
        targets: Vec<CrawlTarget>,
        /// Mirrors the real store's `scheduler_locks` row: current holder and
        /// expiry, so tests can exercise the `acquired_holder == holder`
        /// check rather than assuming every caller wins.
        lock: Mutex<Option<(String, OffsetDateTime)>>,
        enqueued: Mutex<Vec<JobPayload>>,
        /// Number of `start_crawl_run` calls observed.
        crawl_runs_opened: Mutex<u32>,
    }

    #[async_trait::async_trait]
    impl Store for FakeBackend {
        async fn create_company(&self, _c: Company) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn get_company(&self, _id: &CompanyId) -> Result<Company, trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn list_companies_by_user(&self, _owner: &UserId) -> Result<Vec<Company>, trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn list_all_companies(&self) -> Result<Vec<Company>, trustwatch_core::interfaces::StoreError> {
            Ok(self.companies.clone())
        }
        async fn delete_company(&self, _id: &CompanyId) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn apply_risk_delta(&self, _id: &CompanyId, _delta: u8) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn touch_company_crawled(&self, _id: &CompanyId, _at: OffsetDateTime) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn create_target(&self, _t: CrawlTarget) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn list_targets_by_company(&self, company_id: &CompanyId) -> Result<Vec<CrawlTarget>, trustwatch_core::interfaces::StoreError> {
            Ok(self.targets.iter().filter(|t| &t.company_id == company_id).cloned().collect())
        }
        async fn get_target(&self, _id: &trustwatch_core::TargetId) -> Result<CrawlTarget, trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn update_target_digest(&self, _id: &trustwatch_core::TargetId, _digest: &str, _at: OffsetDateTime) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn find_claim(&self, _c: &CompanyId, _t: trustwatch_core::model::ClaimType, _k: &str) -> Result<Option<trustwatch_core::model::Claim>, trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn insert_claim(&self, _c: trustwatch_core::model::Claim) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn update_claim(&self, _c: trustwatch_core::model::Claim) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn list_active_claims_by_source(&self, _c: &CompanyId, _u: &str) -> Result<Vec<trustwatch_core::model::Claim>, trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn insert_claim_version(&self, _v: trustwatch_core::model::ClaimVersion) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn latest_claim_version(&self, _id: &trustwatch_core::ClaimId) -> Result<Option<trustwatch_core::model::ClaimVersion>, trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn insert_event(&self, _e: trustwatch_core::model::ChangeEvent) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn count_critical_emailed_since(&self, _c: &CompanyId, _s: OffsetDateTime) -> Result<u64, trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn mark_event_emailed(&self, _id: &trustwatch_core::EventId, _at: OffsetDateTime) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn acknowledge_event(&self, _id: &trustwatch_core::EventId, _owner: &UserId) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn start_crawl_run(&self, _r: trustwatch_core::model::CrawlRun) -> Result<(), trustwatch_core::interfaces::StoreError> {
            *self.crawl_runs_opened.lock().unwrap_or_else(std::sync::PoisonError::into_inner) += 1;
            Ok(())
        }
        async fn update_crawl_run(&self, _r: trustwatch_core::model::CrawlRun) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn settle_crawl_run_target(
            &self,
            _run_id: &CrawlRunId,
            _delta: trustwatch_core::model::CrawlRunDelta,
            _now: OffsetDateTime,
        ) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn find_evidence_by_url(&self, _c: &CompanyId, _u: &str) -> Result<Option<trustwatch_core::model::Evidence>, trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn insert_evidence(&self, _e: trustwatch_core::model::Evidence) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn get_evidence(&self, _id: &trustwatch_core::EvidenceId) -> Result<trustwatch_core::model::Evidence, trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn mark_evidence_ready(&self, _id: &trustwatch_core::EvidenceId, _f: trustwatch_core::model::EvidenceFields, _at: OffsetDateTime) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn mark_evidence_failed(&self, _id: &trustwatch_core::EvidenceId, _e: &str, _at: OffsetDateTime) -> Result<(), trustwatch_core::interfaces::StoreError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn acquire_scheduler_lock(&self, holder: &str, ttl_seconds: i64, now: OffsetDateTime) -> Result<bool, trustwatch_core::interfaces::StoreError> {
            let mut lock = self.lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let still_held_by_other = lock.as_ref().is_some_and(|(current_holder, expiry)| *expiry > now && current_holder != holder);
            if !still_held_by_other {
                *lock = Some((holder.to_string(), now + Duration::seconds(ttl_seconds)));
            }
            Ok(lock.as_ref().is_some_and(|(current_holder, _)| current_holder == holder))
        }
    }

    #[async_trait::async_trait]
    impl JobQueue for FakeBackend {
        async fn enqueue(&self, payload: JobPayload, _now: OffsetDateTime) -> Result<EnqueueOutcome, QueueError> {
            self.enqueued.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(payload.clone());
            Ok(EnqueueOutcome::Created(payload.idempotency_key()))
        }
        async fn claim(&self, _queue: trustwatch_core::interfaces::QueueName, _limit: u32, _now: OffsetDateTime) -> Result<Vec<trustwatch_core::interfaces::Job>, QueueError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn mark_succeeded(&self, _job_id: &str, _now: OffsetDateTime) -> Result<(), QueueError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn mark_failed(&self, _job_id: &str, _error: &str, _now: OffsetDateTime) -> Result<(), QueueError> {
            unimplemented!("not exercised by scheduler tests")
        }
        async fn prune(&self, _now: OffsetDateTime) -> Result<u64, QueueError> {
            unimplemented!("not exercised by scheduler tests")
        }
    }

    fn sample_company(suffix: &str) -> Company {
        Company::new(CompanyId::new(format!("co-{suffix}")), UserId::new("user-1"), "Acme", "acme.example", BTreeSet::from([Category::Security]), OffsetDateTime::UNIX_EPOCH)
    }

    #[tokio::test]
    async fn tick_enqueues_one_job_per_target_when_lock_is_won() {
        let company = sample_company("1");
        let target = CrawlTarget::seed(trustwatch_core::TargetId::new("t-1"), company.id.clone(), "https://acme.example/security");
        let backend = Arc::new(FakeBackend { companies: vec![company], targets: vec![target], lock: Mutex::new(None), enqueued: Mutex::new(Vec::new()), crawl_runs_opened: Mutex::new(0) });
        let store: Arc<dyn Store> = backend.clone();
        let queue: Arc<dyn JobQueue> = backend.clone();
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(1000));
        let scheduler = Scheduler::new(store, queue, clock, StdDuration::from_secs(21_600), StdDuration::from_secs(60));

        scheduler.tick().await.expect("tick should succeed");
        let enqueued = backend.enqueued.lock().unwrap();
        assert_eq!(enqueued.len(), 1);
        let JobPayload::CrawlTarget { run_id, .. } = &enqueued[0] else {
            panic!("expected a crawl_target payload");
        };
        assert!(!run_id.is_empty(), "each batch should carry a run id for the CrawlRun accumulator");
        assert_eq!(*backend.crawl_runs_opened.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn tick_is_a_no_op_when_the_lock_is_held() {
        let backend = Arc::new(FakeBackend {
            companies: vec![sample_company("1")],
            targets: Vec::new(),
            lock: Mutex::new(Some(("other-replica".to_string(), OffsetDateTime::from_unix_timestamp(10_000).unwrap()))),
            enqueued: Mutex::new(Vec::new()),
            crawl_runs_opened: Mutex::new(0),
        });
        let store: Arc<dyn Store> = backend.clone();
        let queue: Arc<dyn JobQueue> = backend.clone();
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(1000));
        let scheduler = Scheduler::new(store, queue, clock, StdDuration::from_secs(21_600), StdDuration::from_secs(60));

        scheduler.tick().await.expect("tick should succeed even when skipped");
        assert!(backend.enqueued.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn tick_skips_opening_a_run_for_a_company_with_no_targets() {
        let backend =
            Arc::new(FakeBackend { companies: vec![sample_company("1")], targets: Vec::new(), lock: Mutex::new(None), enqueued: Mutex::new(Vec::new()), crawl_runs_opened: Mutex::new(0) });
        let store: Arc<dyn Store> = backend.clone();
        let queue: Arc<dyn JobQueue> = backend.clone();
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(1000));
        let scheduler = Scheduler::new(store, queue, clock, StdDuration::from_secs(21_600), StdDuration::from_secs(60));

        scheduler.tick().await.expect("tick should succeed");
        assert_eq!(*backend.crawl_runs_opened.lock().unwrap(), 0, "a company with no targets has no batch to open a run for");
    }

    #[tokio::test]
    async fn a_second_replica_ticking_within_the_ttl_does_not_re_enqueue() {
        let company = sample_company("1");
        let target = CrawlTarget::seed(trustwatch_core::TargetId::new("t-1"), company.id.clone(), "https://acme.example/security");
        let backend = Arc::new(FakeBackend { companies: vec![company], targets: vec![target], lock: Mutex::new(None), enqueued: Mutex::new(Vec::new()), crawl_runs_opened: Mutex::new(0) });
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(1000));
        let leader = Scheduler::new(backend.clone(), backend.clone(), clock.clone(), StdDuration::from_secs(21_600), StdDuration::from_secs(60));
        let challenger = Scheduler::new(backend.clone(), backend.clone(), clock, StdDuration::from_secs(21_600), StdDuration::from_secs(60));

        leader.tick().await.expect("leader tick should succeed");
        challenger.tick().await.expect("challenger tick should succeed even when skipped");

        assert_eq!(backend.enqueued.lock().unwrap().len(), 1, "only the lock-winning replica should enqueue");
    }
}

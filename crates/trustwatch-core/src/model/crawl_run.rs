// crates/trustwatch-core/src/model/crawl_run.rs
// ============================================================================
// Module: CrawlRun
// Description: Telemetry for one orchestrated crawl cycle.
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::identifiers::CompanyId;
use crate::identifiers::CrawlRunId;

/// Lifecycle status of a [`CrawlRun`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlRunStatus {
    /// At least one target job for this run has not yet settled.
    Running,
    /// All target jobs for this run settled without a fatal error.
    Completed,
    /// The run was aborted before all target jobs settled.
    Failed,
}

/// Telemetry for one orchestrated crawl cycle, covering every target of one
/// company enqueued together (a scheduler batch or a manual scan).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlRun {
    /// Stable identifier.
    pub id: CrawlRunId,
    /// Company this run covers, if scoped to one company.
    pub company_id: Option<CompanyId>,
    /// When the run was opened.
    pub started_at: OffsetDateTime,
    /// When the run was closed, if it has settled.
    pub finished_at: Option<OffsetDateTime>,
    /// Number of target pages crawled so far in this run.
    pub pages_crawled: u32,
    /// Number of claims touched (created or updated) so far in this run.
    pub claims_touched: u32,
    /// Number of change events emitted so far in this run.
    pub events_emitted: u32,
    /// Per-target error strings accumulated without aborting the cycle.
    pub errors: Vec<String>,
    /// Current status.
    pub status: CrawlRunStatus,
    /// Number of target jobs from this run's batch that have not yet
    /// settled. The run closes itself once this reaches zero.
    pub pending_targets: u32,
}

/// One target job's contribution to its crawl run's counters, applied by
/// [`CrawlRun::settle_target`].
#[derive(Debug, Clone, Default)]
pub struct CrawlRunDelta {
    /// 1 if the target's page was fetched, 0 if the fetch itself failed.
    pub pages_crawled: u32,
    /// Claims created or updated while processing this target.
    pub claims_touched: u32,
    /// Change events emitted while processing this target.
    pub events_emitted: u32,
    /// Set when the target failed instead of settling cleanly.
    pub error: Option<String>,
}

impl CrawlRun {
    /// Opens a new run in the `Running` state, covering `pending_targets`
    /// target jobs. A batch with no targets closes itself immediately.
    #[must_use]
    pub fn start(id: CrawlRunId, company_id: Option<CompanyId>, started_at: OffsetDateTime, pending_targets: u32) -> Self {
        let mut run = Self {
            id,
            company_id,
            started_at,
            finished_at: None,
            pages_crawled: 0,
            claims_touched: 0,
            events_emitted: 0,
            errors: Vec::new(),
            status: CrawlRunStatus::Running,
            pending_targets,
        };
        if pending_targets == 0 {
            run.finish(started_at);
        }
        run
    }

    /// Records a per-target failure without aborting the cycle.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Closes the run, deriving `Completed` vs `Failed` from whether any
    /// per-target errors were accumulated.
    pub fn finish(&mut self, finished_at: OffsetDateTime) {
        self.status = if self.errors.is_empty() {
            CrawlRunStatus::Completed
        } else {
            CrawlRunStatus::Failed
        };
        self.finished_at = Some(finished_at);
    }

    /// Applies one settled target job's counters, decrements the number of
    /// targets still outstanding, and closes the run once none remain.
    pub fn settle_target(&mut self, delta: CrawlRunDelta, now: OffsetDateTime) {
        self.pages_crawled += delta.pages_crawled;
        self.claims_touched += delta.claims_touched;
        self.events_emitted += delta.events_emitted;
        if let Some(error) = delta.error {
            self.record_error(error);
        }
        self.pending_targets = self.pending_targets.saturating_sub(1);
        if self.pending_targets == 0 {
            self.finish(now);
        }
    }
}

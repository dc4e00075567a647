// crates/trustwatch-core/src/model/crawl_target.rs
// ============================================================================
// Module: CrawlTarget
// Description: A single URL watched on behalf of a company.
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::identifiers::CompanyId;
use crate::identifiers::TargetId;

/// Whether a target was derived from category rules at company creation or
/// discovered later (reserved for future discovery crawlers; not produced by
/// any operation in this engine today).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// Derived from category -> path rules when the company was created.
    Seed,
    /// Found by following links from another target.
    Discovered,
}

/// A URL watched for trust-claim changes.
///
/// # Invariants
/// - `(company_id, url)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlTarget {
    /// Stable identifier.
    pub id: TargetId,
    /// Owning company.
    pub company_id: CompanyId,
    /// Absolute URL to fetch.
    pub url: String,
    /// How this target came to be watched.
    pub kind: TargetKind,
    /// SHA-256 of the last successfully fetched, canonicalised content.
    pub last_observed_digest: Option<String>,
    /// Timestamp of the most recent crawl attempt that reached step 7 of the
    /// change detector.
    pub last_crawled_at: Option<OffsetDateTime>,
}

impl CrawlTarget {
    /// Creates a new, never-crawled seed target.
    #[must_use]
    pub fn seed(id: TargetId, company_id: CompanyId, url: impl Into<String>) -> Self {
        Self {
            id,
            company_id,
            url: url.into(),
            kind: TargetKind::Seed,
            last_observed_digest: None,
            last_crawled_at: None,
        }
    }
}

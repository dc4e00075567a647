// crates/trustwatch-core/src/model/company.rs
// ============================================================================
// Module: Company
// Description: A watched vendor and the categories of trust claim it opts into.
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::identifiers::CompanyId;
use crate::identifiers::UserId;

/// A category of trust claim a company has opted into monitoring.
///
/// Drives seed [`crate::model::CrawlTarget`] derivation (see [`crate::seed`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Security posture claims (encryption, MFA, backups, pen testing).
    Security,
    /// Privacy commitments (data protection, do-not-sell).
    Privacy,
    /// Service-level claims (uptime, availability).
    Sla,
    /// Pricing-page seed targets only; no dedicated claim types.
    Pricing,
}

/// A vendor whose public web properties are watched for trust claims.
///
/// # Invariants
/// - `risk_score` is additive and monotone non-decreasing for the life of the
///   row (see [`crate::severity`]); it is never read back below a prior value.
/// - `risk_score` is bounded to `0..=100`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    /// Stable identifier.
    pub id: CompanyId,
    /// Id of the user that created and owns this company.
    pub owner_user_id: UserId,
    /// Human-facing label, e.g. "Acme Corp".
    pub display_name: String,
    /// Canonical domain, e.g. "acme.example".
    pub domain: String,
    /// Categories of trust claim this company is monitored for.
    pub categories: BTreeSet<Category>,
    /// Cumulative risk score in `0..=100`.
    pub risk_score: u8,
    /// When the company was created.
    pub created_at: OffsetDateTime,
    /// Last time any of its targets were crawled, if ever.
    pub last_crawled_at: Option<OffsetDateTime>,
}

impl Company {
    /// Creates a new company with a zero risk score and no crawl history.
    #[must_use]
    pub fn new(
        id: CompanyId,
        owner_user_id: UserId,
        display_name: impl Into<String>,
        domain: impl Into<String>,
        categories: BTreeSet<Category>,
        created_at: OffsetDateTime,
    ) -> Self {
        Self {
            id,
            owner_user_id,
            display_name: display_name.into(),
            domain: domain.into(),
            categories,
            risk_score: 0,
            created_at,
            last_crawled_at: None,
        }
    }

    /// Applies an additive risk delta, capped at 100 and never decreasing.
    pub fn apply_risk_delta(&mut self, delta: u8) {
        self.risk_score = self.risk_score.saturating_add(delta).min(100);
    }
}

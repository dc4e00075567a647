// crates/trustwatch-core/src/model/claim.rs
// ============================================================================
// Module: Claim
// Description: The summary row for a single trust assertion.
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::identifiers::ClaimId;
use crate::identifiers::CompanyId;

/// The family a claim belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    /// Certifications and attestations (SOC2, ISO, HIPAA, audits, ...).
    Compliance,
    /// Data-handling commitments (protection language, do-not-sell).
    Privacy,
    /// Numeric service-level commitments (uptime/availability).
    Sla,
    /// Security posture claims (encryption, MFA, backups, pen testing).
    Security,
}

/// Whether a claim's phrasing is a positive assertion, a negative assertion,
/// or carries no directional stance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// e.g. "we encrypt your data".
    Positive,
    /// e.g. "we do not sell your data".
    Negative,
    /// No directional stance, e.g. certifications.
    Neutral,
}

/// Claim-specific structured metadata.
///
/// Modeled as a tagged variant rather than an open map per the redesign note
/// in the design notes: the only current consumer is numeric-change
/// detection, and numeric claims always carry exactly a value and a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClaimMetadata {
    /// No extracted metadata.
    None,
    /// A numeric claim value with its unit, e.g. `value: 99.99, unit: "%"`.
    Numeric {
        /// The numeric value as observed.
        value: f64,
        /// The unit string, e.g. `"%"`.
        unit: String,
    },
}

impl ClaimMetadata {
    /// Returns the numeric value, if this metadata carries one.
    #[must_use]
    pub const fn numeric_value(&self) -> Option<f64> {
        match self {
            Self::Numeric { value, .. } => Some(*value),
            Self::None => None,
        }
    }
}

/// Lifecycle status of a claim's summary row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    /// Currently asserted by the vendor's most recent crawled content.
    Active,
    /// No longer found on the target that previously asserted it.
    Removed,
    /// Reserved for future manual-review workflows; not produced by any
    /// operation in this engine today.
    Disputed,
}

/// The summary row for a single trust claim; history lives in
/// [`crate::model::ClaimVersion`].
///
/// # Invariants
/// - `(company_id, claim_type, normalized_key)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    /// Stable identifier.
    pub id: ClaimId,
    /// Owning company.
    pub company_id: CompanyId,
    /// Claim family.
    pub claim_type: ClaimType,
    /// Stable, wording-independent key, e.g. `"SOC2_TYPE_II"`.
    pub normalized_key: String,
    /// Current lifecycle status.
    pub status: ClaimStatus,
    /// When this claim was first observed.
    pub first_seen_at: OffsetDateTime,
    /// When this claim was last observed (active) or removed (if removed).
    pub last_seen_at: OffsetDateTime,
    /// Current observed text, collapsed/trimmed per the extractor's snippet rules.
    pub current_snippet: String,
    /// URL the current snippet was observed on.
    pub current_source_url: String,
    /// Extractor confidence in `[0, 1]` for the current observation.
    pub confidence: f64,
}

impl Claim {
    /// Marks this claim removed, preserving the last observed snippet as the
    /// historical record.
    pub fn mark_removed(&mut self, removed_at: OffsetDateTime) {
        self.status = ClaimStatus::Removed;
        self.last_seen_at = removed_at;
    }
}

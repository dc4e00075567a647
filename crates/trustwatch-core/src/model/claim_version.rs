// crates/trustwatch-core/src/model/claim_version.rs
// ============================================================================
// Module: ClaimVersion
// Description: An immutable, append-only observation of a claim.
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::identifiers::ClaimId;
use crate::identifiers::ClaimVersionId;
use crate::identifiers::CompanyId;
use crate::model::claim::ClaimMetadata;
use crate::model::claim::Polarity;

/// One append-only observation of a claim's text and metadata.
///
/// # Invariants
/// - Versions with identical `(claim_id, content_digest)` are never inserted
///   consecutively (enforced by the change detector's digest check, not by
///   this type).
/// - The sequence of versions for a claim is monotone in `seen_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimVersion {
    /// Stable identifier.
    pub id: ClaimVersionId,
    /// The claim this version belongs to.
    pub claim_id: ClaimId,
    /// Denormalized owning company, for index-friendly queries.
    pub company_id: CompanyId,
    /// Observed text snippet.
    pub text_snippet: String,
    /// URL the snippet was observed on.
    pub source_url: String,
    /// SHA-256 of `text_snippet`.
    pub content_digest: String,
    /// When this version was observed.
    pub seen_at: OffsetDateTime,
    /// Directional stance of the snippet's phrasing.
    pub polarity: Polarity,
    /// Structured metadata extracted alongside the snippet, if any.
    pub metadata: ClaimMetadata,
}

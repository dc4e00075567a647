// crates/trustwatch-core/src/model/evidence.rs
// ============================================================================
// Module: Evidence
// Description: A discovered PDF artefact and its extracted fields.
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::identifiers::CompanyId;
use crate::identifiers::EvidenceId;
use crate::model::claim::ClaimType;

/// Lifecycle status of an [`Evidence`] row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceStatus {
    /// Discovered, not yet parsed.
    Pending,
    /// Parsed and fields persisted.
    Ready,
    /// Parsing failed after exhausting the queue's retry budget.
    Failed,
}

/// Deterministic fields extracted from a parsed PDF's text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceFields {
    /// First match of "SOC 2 Type I/II" | "ISO 27001" | "HIPAA".
    pub report_type: Option<String>,
    /// First capitalised name phrase following an auditor-attribution cue.
    pub auditor: Option<String>,
    /// Start of the audit period, if two dates were found joined by a
    /// "to/through/-" connective near a "period" cue.
    pub period_start: Option<String>,
    /// End of the audit period, under the same condition as `period_start`.
    pub period_end: Option<String>,
    /// 20-200 character span following a "scope/covered services" cue.
    pub scope: Option<String>,
    /// Per-page text, as returned by the PDF-parsing adapter.
    pub page_content: BTreeMap<u32, String>,
}

impl EvidenceFields {
    /// Sorted page indices present in `page_content`.
    #[must_use]
    pub fn page_numbers(&self) -> Vec<u32> {
        self.page_content.keys().copied().collect()
    }
}

/// A PDF artefact discovered while crawling a target, parsed out-of-band.
///
/// # Invariants
/// - `(company_id, pdf_url)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Stable identifier.
    pub id: EvidenceId,
    /// Owning company.
    pub company_id: CompanyId,
    /// Presumed claim type; always `Compliance` per the extraction rule in
    /// the evidence fan-out step (an acknowledged but uncorrected
    /// simplification carried from the source design).
    pub presumed_claim_type: ClaimType,
    /// Absolute PDF URL.
    pub pdf_url: String,
    /// Page the PDF link was found on, if known.
    pub source_page_url: Option<String>,
    /// Text surrounding the link on the source page, if known.
    pub context_snippet: Option<String>,
    /// Current lifecycle status.
    pub status: EvidenceStatus,
    /// Error text, set only when `status == Failed`.
    pub error: Option<String>,
    /// Extracted structured fields, populated once `status == Ready`.
    pub fields: Option<EvidenceFields>,
    /// When the evidence row was created.
    pub discovered_at: OffsetDateTime,
    /// When the evidence worker last attempted (successfully or not) to
    /// process this row.
    pub processed_at: Option<OffsetDateTime>,
}

impl Evidence {
    /// Creates a new `Pending` evidence row from an evidence fan-out match.
    #[must_use]
    pub fn pending(
        id: EvidenceId,
        company_id: CompanyId,
        pdf_url: impl Into<String>,
        source_page_url: impl Into<String>,
        discovered_at: OffsetDateTime,
    ) -> Self {
        Self {
            id,
            company_id,
            presumed_claim_type: ClaimType::Compliance,
            pdf_url: pdf_url.into(),
            source_page_url: Some(source_page_url.into()),
            context_snippet: None,
            status: EvidenceStatus::Pending,
            error: None,
            fields: None,
            discovered_at,
            processed_at: None,
        }
    }

    /// Marks the evidence row ready with extracted fields.
    pub fn mark_ready(&mut self, fields: EvidenceFields, processed_at: OffsetDateTime) {
        self.status = EvidenceStatus::Ready;
        self.fields = Some(fields);
        self.error = None;
        self.processed_at = Some(processed_at);
    }

    /// Marks the evidence row failed with an error message.
    pub fn mark_failed(&mut self, error: impl Into<String>, processed_at: OffsetDateTime) {
        self.status = EvidenceStatus::Failed;
        self.error = Some(error.into());
        self.processed_at = Some(processed_at);
    }
}

// crates/trustwatch-core/src/model/change_event.rs
// ============================================================================
// Module: ChangeEvent
// Description: An immutable record that a claim's state transitioned.
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::identifiers::CompanyId;
use crate::identifiers::EventId;
use crate::model::claim::ClaimType;

/// The kind of transition a [`ChangeEvent`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A claim was observed for the first time.
    Added,
    /// A previously active claim is no longer observed on its source target.
    Removed,
    /// The claim's commitment language weakened between versions.
    Weakened,
    /// The claim's polarity flipped between versions.
    Reversed,
    /// A numeric claim's value changed between versions.
    NumberChanged,
}

/// Triage priority of a [`ChangeEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// No action implied.
    Info,
    /// Worth a look.
    Medium,
    /// Triggers alerting, subject to the per-company rate limit.
    Critical,
}

/// An immutable record of a claim transitioning between two observations, or
/// into/out of existence.
///
/// # Invariants
/// - `Removed` carries `old_snippet` only; `Added` carries `new_snippet`
///   only; all other event types carry both.
/// - Only `acknowledged` and `emailed_at` are ever mutated after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Stable identifier.
    pub id: EventId,
    /// Owning company.
    pub company_id: CompanyId,
    /// Claim family this event concerns.
    pub claim_type: ClaimType,
    /// Normalized key this event concerns.
    pub normalized_key: String,
    /// The kind of transition.
    pub event_type: EventType,
    /// Triage priority.
    pub severity: Severity,
    /// Prior snippet, present unless `event_type == Added`.
    pub old_snippet: Option<String>,
    /// New snippet, present unless `event_type == Removed`.
    pub new_snippet: Option<String>,
    /// URL the transition was observed on.
    pub source_url: String,
    /// When the transition was detected.
    pub detected_at: OffsetDateTime,
    /// Whether a user has acknowledged this event.
    pub acknowledged: bool,
    /// When an alert email was dispatched for this event, if any.
    pub emailed_at: Option<OffsetDateTime>,
}

impl ChangeEvent {
    /// Returns whether this event's payload matches the event-type matrix
    /// (P3): `Removed` => old only, `Added` => new only, others => both.
    #[must_use]
    pub const fn payload_matches_event_type(&self) -> bool {
        match self.event_type {
            EventType::Removed => self.old_snippet.is_some() && self.new_snippet.is_none(),
            EventType::Added => self.old_snippet.is_none() && self.new_snippet.is_some(),
            EventType::Weakened | EventType::Reversed | EventType::NumberChanged => {
                self.old_snippet.is_some() && self.new_snippet.is_some()
            }
        }
    }
}

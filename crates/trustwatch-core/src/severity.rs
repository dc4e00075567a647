// crates/trustwatch-core/src/severity.rs
// ============================================================================
// Module: Severity Classifier
// Description: Pure functions mapping a detected transition to an event type,
//              severity, and risk-score delta.
// Purpose: Isolate the event-classification state machine's decision table
//          (§4.5 step 3 priority order, step 4 removal severity, step 5 risk
//          deltas) so it can be tested without a store.
// Dependencies: crate::model
// ============================================================================

//! Pure functions mapping a detected transition to an event type, severity,
//! and risk-score delta.

use crate::model::ClaimType;
use crate::model::EventType;
use crate::model::Severity;

/// Inputs available when a claim's text changed between two versions (§4.5
/// step 3): whether the weakening regex fired, whether both versions carried
/// differing numeric metadata (and if so, whether it decreased), and whether
/// polarity flipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionSignals {
    /// `detect_weakening(old, new)` fired.
    pub weakened: bool,
    /// Both versions carried numeric metadata and the values differed.
    pub numeric_changed: bool,
    /// The numeric value decreased (only meaningful when `numeric_changed`).
    pub numeric_decreased: bool,
    /// Polarity flipped between the old and new version.
    pub polarity_reversed: bool,
}

/// Classifies a changed-claim transition by priority order (§4.5 step 3):
/// weakening, then numeric change, then polarity reversal, then the default
/// `Added` branch. This is the P9 severity classifier: a pure function of
/// (event type, claim type, numeric-decrease bit) once `event_type` is
/// resolved from `signals`.
#[must_use]
pub fn classify_transition(signals: TransitionSignals) -> (EventType, Severity) {
    if signals.weakened {
        return (EventType::Weakened, Severity::Critical);
    }
    if signals.numeric_changed {
        let severity = if signals.numeric_decreased {
            Severity::Medium
        } else {
            Severity::Info
        };
        return (EventType::NumberChanged, severity);
    }
    if signals.polarity_reversed {
        return (EventType::Reversed, Severity::Critical);
    }
    (EventType::Added, Severity::Info)
}

/// Classifies a removal (§4.5 step 4): `Critical` when the claim's family is
/// `Compliance`, `Medium` otherwise.
#[must_use]
pub const fn classify_removal(claim_type: ClaimType) -> Severity {
    match claim_type {
        ClaimType::Compliance => Severity::Critical,
        ClaimType::Privacy | ClaimType::Sla | ClaimType::Security => Severity::Medium,
    }
}

/// Additive risk-score delta for one event (§4.5 step 5). The caller is
/// responsible for applying the cap at 100 and for never decrementing.
#[must_use]
pub const fn risk_delta(event_type: EventType, severity: Severity) -> u8 {
    match (event_type, severity) {
        (EventType::Removed, Severity::Critical) => 40,
        (EventType::Weakened, Severity::Critical) => 40,
        (EventType::NumberChanged, Severity::Medium) => 10,
        (EventType::Reversed, _) => 30,
        _ => 0,
    }
}

// crates/trustwatch-core/src/evidence_extractor.rs
// ============================================================================
// Module: Evidence Field Extractor
// Description: Deterministic extraction of report metadata from parsed PDF
//              text (§4.6 step 3).
// Purpose: Turn raw PDF text into the structured fields persisted on an
//          Evidence row, without any I/O or knowledge of how the PDF was
//          fetched or parsed.
// Dependencies: model::evidence
// ============================================================================

//! ## Overview
//! Four independent scans over the PDF's full text, each looking for a
//! literal cue phrase and pulling a bounded span of text near it. None of
//! the scans depend on the others succeeding; a document missing an
//! auditor-attribution sentence still yields a report type and scope if
//! those cues are present.

use crate::interfaces::ParsedPdf;
use crate::model::evidence::EvidenceFields;

const REPORT_TYPE_CUES: &[&str] = &["SOC 2 Type II", "SOC 2 Type I", "ISO 27001", "HIPAA"];
const AUDITOR_CUES: &[&str] = &["audited by", "performed by", "auditor"];
const SCOPE_CUES: &[&str] = &["covered services", "scope"];
const PERIOD_CUE: &str = "period";
const PERIOD_CONNECTIVES: &[&str] = &["through", "to", "-"];
const SCOPE_MIN_LEN: usize = 20;
const SCOPE_MAX_LEN: usize = 200;

/// Extracts [`EvidenceFields`] from a parsed PDF's full text and per-page
/// content.
#[must_use]
pub fn extract_fields(parsed: &ParsedPdf) -> EvidenceFields {
    EvidenceFields {
        report_type: find_report_type(&parsed.full_text),
        auditor: find_auditor(&parsed.full_text),
        period_start: find_period(&parsed.full_text).map(|(start, _)| start),
        period_end: find_period(&parsed.full_text).and_then(|(_, end)| end),
        scope: find_scope(&parsed.full_text),
        page_content: parsed.pages.clone(),
    }
}

fn find_report_type(text: &str) -> Option<String> {
    let lowered = text.to_lowercase();
    REPORT_TYPE_CUES.iter().find(|cue| lowered.contains(&cue.to_lowercase())).map(|cue| (*cue).to_string())
}

fn find_auditor(text: &str) -> Option<String> {
    let lowered = text.to_lowercase();
    for cue in AUDITOR_CUES {
        if let Some(rel) = lowered.find(cue) {
            let after = rel + cue.len();
            if let Some(name) = capitalized_phrase_after(text, after) {
                return Some(name);
            }
        }
    }
    None
}

/// Pulls the capitalized word run starting shortly after `after`, up to and
/// optionally including a trailing corporate suffix.
fn capitalized_phrase_after(text: &str, after: usize) -> Option<String> {
    let tail = text.get(after..)?;
    let trimmed = tail.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, ':' | ','));
    let skipped = tail.len() - trimmed.len();
    let start = after + skipped;
    let mut words = Vec::new();
    for word in text.get(start..)?.split_whitespace() {
        let word_trimmed = word.trim_matches(|c: char| matches!(c, '.' | ',' | ';'));
        if word_trimmed.chars().next().is_some_and(char::is_uppercase) {
            words.push(word_trimmed.to_string());
            if matches!(word_trimmed, "LLP" | "LLC" | "Inc" | "Inc.") {
                break;
            }
        } else {
            break;
        }
    }
    if words.is_empty() { None } else { Some(words.join(" ")) }
}

/// Finds the first "period" context containing two date-like tokens joined
/// by a "to"/"through"/"-" connective, returning `(start, end)`. `end` is
/// `None` when only one date-like token was found.
fn find_period(text: &str) -> Option<(String, Option<String>)> {
    let lowered = text.to_lowercase();
    let rel = lowered.find(PERIOD_CUE)?;
    let window_end = (rel + 200).min(text.len());
    let window = text.get(rel..window_end)?;
    for connective in PERIOD_CONNECTIVES {
        if let Some(conn_rel) = window.to_lowercase().find(&format!(" {connective} ")) {
            let before = window[..conn_rel].trim();
            let after = window[conn_rel + connective.len() + 2..].trim();
            let start_date = last_date_token(before);
            let end_date = first_date_token(after);
            if let Some(start) = start_date {
                return Some((start, end_date));
            }
        }
    }
    None
}

fn last_date_token(text: &str) -> Option<String> {
    text.split_whitespace().rev().find(|token| looks_like_date(token)).map(|token| token.trim_matches(|c: char| matches!(c, '.' | ',' | ';')).to_string())
}

fn first_date_token(text: &str) -> Option<String> {
    text.split_whitespace().find(|token| looks_like_date(token)).map(|token| token.trim_matches(|c: char| matches!(c, '.' | ',' | ';')).to_string())
}

fn looks_like_date(token: &str) -> bool {
    let digits = token.chars().filter(char::is_ascii_digit).count();
    digits >= 4 && token.chars().any(|c| matches!(c, '/' | '-') || c.is_ascii_digit())
}

fn find_scope(text: &str) -> Option<String> {
    let lowered = text.to_lowercase();
    for cue in SCOPE_CUES {
        if let Some(rel) = lowered.find(cue) {
            let start = rel + cue.len();
            let end = (start + SCOPE_MAX_LEN).min(text.len());
            let span = text.get(start..end)?.trim();
            if span.chars().count() >= SCOPE_MIN_LEN {
                return Some(span.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::extract_fields;
    use crate::interfaces::ParsedPdf;

    fn parsed(full_text: &str) -> ParsedPdf {
        let mut pages = BTreeMap::new();
        pages.insert(0, full_text.to_string());
        ParsedPdf { full_text: full_text.to_string(), pages }
    }

    #[test]
    fn extracts_report_type_from_cue() {
        let fields = extract_fields(&parsed("This SOC 2 Type II report covers the period 2024-01-01 through 2024-12-31."));
        assert_eq!(fields.report_type.as_deref(), Some("SOC 2 Type II"));
    }

    #[test]
    fn extracts_auditor_name_with_suffix() {
        let fields = extract_fields(&parsed("This report was audited by Example Assurance LLP on behalf of the company."));
        assert_eq!(fields.auditor.as_deref(), Some("Example Assurance LLP"));
    }

    #[test]
    fn extracts_period_start_and_end() {
        let fields = extract_fields(&parsed("The audit period runs from 2024-01-01 through 2024-12-31 inclusive."));
        assert_eq!(fields.period_start.as_deref(), Some("2024-01-01"));
        assert_eq!(fields.period_end.as_deref(), Some("2024-12-31"));
    }

    #[test]
    fn extracts_scope_span_within_bounds() {
        let fields = extract_fields(&parsed("Scope: the production API, customer data stores, and supporting infrastructure were reviewed in full during this engagement."));
        let scope = fields.scope.expect("scope should be found");
        assert!(scope.chars().count() >= 20);
        assert!(scope.chars().count() <= 200);
    }

    #[test]
    fn missing_cues_yield_none_without_panicking() {
        let fields = extract_fields(&parsed("Nothing relevant appears in this document at all."));
        assert!(fields.report_type.is_none());
        assert!(fields.auditor.is_none());
        assert!(fields.scope.is_none());
        assert!(fields.period_start.is_none());
    }

    #[test]
    fn page_content_carries_through_unchanged() {
        let fields = extract_fields(&parsed("SOC 2 Type II"));
        assert_eq!(fields.page_content.get(&0).map(String::as_str), Some("SOC 2 Type II"));
        assert_eq!(fields.page_numbers(), vec![0]);
    }
}

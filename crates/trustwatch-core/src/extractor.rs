// crates/trustwatch-core/src/extractor.rs
// ============================================================================
// Module: Claim Extractor
// Description: Pure, deterministic pattern-matching over fetched page text.
// Purpose: Turn plain text into a deduplicated set of extracted claims, with
//          no network, store, or clock dependency — fully unit-testable.
// Dependencies: crate::model
// ============================================================================

//! ## Overview
//! Runs a fixed catalogue of pattern matchers against the full document and
//! against each "sentence" (split on `[.!?]` + whitespace + capital letter,
//! kept only for fragments of length 20-500). Matches are deduplicated by
//! normalized key, keeping the highest-confidence representative. Output
//! order is unspecified by design; callers must not depend on it.

use crate::model::ClaimMetadata;
use crate::model::ClaimType;
use crate::model::Polarity;

/// One claim extracted from a document.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedClaim {
    /// Claim family.
    pub claim_type: ClaimType,
    /// Stable, wording-independent key, e.g. `"SOC2_TYPE_II"`.
    pub normalized_key: String,
    /// Directional stance of the matched phrasing.
    pub polarity: Polarity,
    /// Synthesised text snippet.
    pub snippet: String,
    /// Extractor confidence in `[0, 1]`.
    pub confidence: f64,
    /// Structured metadata, if the pattern produces any.
    pub metadata: ClaimMetadata,
}

struct RawMatch {
    claim_type: ClaimType,
    key: &'static str,
    polarity: Polarity,
    confidence: f64,
    metadata: ClaimMetadata,
    /// Byte offset into the full document where the snippet window should
    /// be centered.
    doc_index: usize,
}

/// Extracts the deduplicated set of claims from `document` as observed at
/// `source_url`. `source_url` does not currently influence extraction; it is
/// accepted for forward compatibility with provenance-aware patterns.
#[must_use]
pub fn extract(document: &str, _source_url: &str) -> Vec<ExtractedClaim> {
    let lowered = document.to_lowercase();
    let mut raw = Vec::new();
    collect_matches(document, &lowered, 0, &mut raw);

    for (sentence, offset) in sentences(document) {
        let sentence_lower = sentence.to_lowercase();
        collect_matches(sentence, &sentence_lower, offset, &mut raw);
    }

    dedup_by_confidence(document, raw)
}

fn dedup_by_confidence(document: &str, raw: Vec<RawMatch>) -> Vec<ExtractedClaim> {
    let mut best: Vec<RawMatch> = Vec::new();
    for candidate in raw {
        match best.iter().position(|m| m.key == candidate.key) {
            Some(idx) if best[idx].confidence < candidate.confidence => best[idx] = candidate,
            Some(_) => {}
            None => best.push(candidate),
        }
    }
    best.into_iter()
        .map(|m| ExtractedClaim {
            claim_type: m.claim_type,
            normalized_key: m.key.to_string(),
            polarity: m.polarity,
            snippet: synthesize_snippet(document, m.doc_index),
            confidence: m.confidence,
            metadata: m.metadata,
        })
        .collect()
}

// ============================================================================
// SECTION: Snippet synthesis
// ============================================================================

const SNIPPET_WINDOW: usize = 150;
const SENTENCE_BOUNDARY_SEARCH: usize = 50;

/// Builds the ±150-character window around `center`, collapses whitespace to
/// single spaces, and trims to the next sentence boundary within the first 50
/// characters where one exists.
fn synthesize_snippet(document: &str, center: usize) -> String {
    let bytes = document.as_bytes();
    let start = center.saturating_sub(SNIPPET_WINDOW);
    let end = (center + SNIPPET_WINDOW).min(bytes.len());
    let start = floor_char_boundary(document, start);
    let end = ceil_char_boundary(document, end);
    let window = &document[start..end];

    let collapsed = collapse_whitespace(window);
    trim_to_sentence_boundary(&collapsed)
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    out.trim().to_string()
}

fn trim_to_sentence_boundary(text: &str) -> String {
    let search_len = text.len().min(SENTENCE_BOUNDARY_SEARCH);
    if let Some(rel) = text[..search_len].find(['.', '!', '?']) {
        text[..=rel].to_string()
    } else {
        text.to_string()
    }
}

// ============================================================================
// SECTION: Sentence splitting
// ============================================================================

/// Splits `document` on `[.!?]` followed by whitespace and a capital letter,
/// keeping only fragments of length 20-500, paired with their byte offset in
/// `document`.
fn sentences(document: &str) -> Vec<(&str, usize)> {
    let bytes = document.as_bytes();
    let mut out = Vec::new();
    let mut start = 0usize;
    let chars: Vec<(usize, char)> = document.char_indices().collect();
    for window in chars.windows(3) {
        let [(i0, c0), (_, c1), (i2, c2)] = window else {
            continue;
        };
        if matches!(c0, '.' | '!' | '?') && c1.is_whitespace() && c2.is_uppercase() {
            let end = i0 + c0.len_utf8();
            push_sentence(document, start, end, &mut out);
            start = *i2;
        }
    }
    if start < bytes.len() {
        push_sentence(document, start, bytes.len(), &mut out);
    }
    out
}

fn push_sentence<'a>(document: &'a str, start: usize, end: usize, out: &mut Vec<(&'a str, usize)>) {
    if start >= end {
        return;
    }
    let fragment = document[start..end].trim();
    if (20..=500).contains(&fragment.len()) {
        let offset = start + document[start..end].find(fragment).unwrap_or(0);
        out.push((fragment, offset));
    }
}

// ============================================================================
// SECTION: Pattern catalogue
// ============================================================================

fn collect_matches(original: &str, lowered: &str, base_offset: usize, out: &mut Vec<RawMatch>) {
    match_soc2(lowered, base_offset, out);
    match_iso(lowered, base_offset, out);
    match_literal_compliance(lowered, base_offset, out);
    match_encryption(lowered, base_offset, out);
    match_data_protection(lowered, base_offset, out);
    match_do_not_sell(lowered, base_offset, out);
    match_uptime(original, lowered, base_offset, out);
    match_backup(lowered, base_offset, out);
    match_audit(lowered, base_offset, out);
    match_penetration_testing(lowered, base_offset, out);
    match_mfa(lowered, base_offset, out);
}

fn contains_near(haystack: &str, needle: &str) -> Option<usize> {
    haystack.find(needle)
}

fn match_soc2(lowered: &str, base_offset: usize, out: &mut Vec<RawMatch>) {
    for needle in ["soc 2 type ii", "soc2 type ii", "soc 2 type 2"] {
        if let Some(idx) = contains_near(lowered, needle) {
            push(out, ClaimType::Compliance, "SOC2_TYPE_II", Polarity::Neutral, 0.95, base_offset + idx);
            return;
        }
    }
    for needle in ["soc 2 type i", "soc2 type i", "soc 2 type 1", "soc 2", "soc2", "soc 1"] {
        if let Some(idx) = contains_near(lowered, needle) {
            push(out, ClaimType::Compliance, "SOC2_TYPE_II", Polarity::Neutral, 0.95, base_offset + idx);
            return;
        }
    }
}

fn match_iso(lowered: &str, base_offset: usize, out: &mut Vec<RawMatch>) {
    let variants: &[(&str, &str)] = &[
        ("iso 27001", "ISO_27001"),
        ("iso27001", "ISO_27001"),
        ("iso 27017", "ISO_27017"),
        ("iso27017", "ISO_27017"),
        ("iso 27018", "ISO_27018"),
        ("iso27018", "ISO_27018"),
    ];
    for (needle, key) in variants {
        if let Some(idx) = contains_near(lowered, needle) {
            push(out, ClaimType::Compliance, key, Polarity::Neutral, 0.95, base_offset + idx);
        }
    }
}

fn match_literal_compliance(lowered: &str, base_offset: usize, out: &mut Vec<RawMatch>) {
    let variants: &[(&str, &str)] = &[
        ("hipaa", "HIPAA"),
        ("gdpr", "GDPR"),
        ("pci dss", "PCI_DSS"),
        ("pci-dss", "PCI_DSS"),
        ("pci compliance", "PCI_DSS"),
        ("ccpa", "CCPA"),
        ("fedramp", "FEDRAMP"),
    ];
    for (needle, key) in variants {
        if let Some(idx) = contains_near(lowered, needle) {
            push(out, ClaimType::Compliance, key, Polarity::Neutral, 0.9, base_offset + idx);
        }
    }
}

fn match_encryption(lowered: &str, base_offset: usize, out: &mut Vec<RawMatch>) {
    for needle in [
        "aes-128", "aes 128", "aes128", "aes-192", "aes 192", "aes192", "aes-256", "aes 256",
        "aes256", "tls 1.0", "tls 1.1", "tls 1.2", "tls 1.3", "ssl", "encrypt",
    ] {
        if let Some(idx) = contains_near(lowered, needle) {
            push(out, ClaimType::Security, "ENCRYPTION", Polarity::Neutral, 0.85, base_offset + idx);
            return;
        }
    }
}

const DATA_PROTECTION_VERBS: &[&str] = &["protect", "secure", "safeguard"];
const DATA_PROTECTION_NOUNS: &[&str] = &["your data", "your information", "your privacy", "data", "information", "privacy"];

fn match_data_protection(lowered: &str, base_offset: usize, out: &mut Vec<RawMatch>) {
    for verb in DATA_PROTECTION_VERBS {
        if let Some(verb_idx) = contains_near(lowered, verb) {
            let window_end = (verb_idx + verb.len() + 40).min(lowered.len());
            let window_end = ceil_char_boundary(lowered, window_end);
            let window = &lowered[verb_idx..window_end];
            if DATA_PROTECTION_NOUNS.iter().any(|noun| window.contains(noun)) {
                push(out, ClaimType::Privacy, "DATA_PROTECTION", Polarity::Neutral, 0.75, base_offset + verb_idx);
                return;
            }
        }
    }
}

const DO_NOT_SELL_NEGATIONS: &[&str] = &["do not", "don't", "never", "will not", "won't"];
const DO_NOT_SELL_TARGETS: &[&str] = &["sell", "share with third"];

fn match_do_not_sell(lowered: &str, base_offset: usize, out: &mut Vec<RawMatch>) {
    for negation in DO_NOT_SELL_NEGATIONS {
        if let Some(neg_idx) = contains_near(lowered, negation) {
            let window_end = (neg_idx + negation.len() + 60).min(lowered.len());
            let window_end = ceil_char_boundary(lowered, window_end);
            let window = &lowered[neg_idx..window_end];
            if DO_NOT_SELL_TARGETS.iter().any(|target| window.contains(target)) {
                push(out, ClaimType::Privacy, "DO_NOT_SELL", Polarity::Negative, 0.85, base_offset + neg_idx);
                return;
            }
        }
    }
}

const UPTIME_KEYWORDS: &[&str] = &["uptime", "availability", "sla"];

fn match_uptime(original: &str, lowered: &str, base_offset: usize, out: &mut Vec<RawMatch>) {
    for (byte_idx, ch) in lowered.char_indices() {
        if ch != '%' {
            continue;
        }
        let Some((value, digits_start)) = parse_percent_before(lowered, byte_idx) else {
            continue;
        };
        let window_start = digits_start.saturating_sub(40);
        let window_start = floor_char_boundary(lowered, window_start);
        let window_end = (byte_idx + 40).min(lowered.len());
        let window_end = ceil_char_boundary(lowered, window_end);
        let window = &lowered[window_start..window_end];
        if UPTIME_KEYWORDS.iter().any(|kw| window.contains(kw)) {
            let metadata = ClaimMetadata::Numeric {
                value,
                unit: "%".to_string(),
            };
            out.push(RawMatch {
                claim_type: ClaimType::Sla,
                key: "UPTIME",
                polarity: Polarity::Neutral,
                confidence: 0.9,
                metadata,
                doc_index: base_offset + digits_start.min(original.len()),
            });
            return;
        }
    }
}

/// Parses the numeric literal immediately preceding a `%` at `percent_idx`,
/// returning `(value, start_byte_of_digits)`.
fn parse_percent_before(text: &str, percent_idx: usize) -> Option<(f64, usize)> {
    let prefix = &text[..percent_idx];
    let mut start = prefix.len();
    let mut saw_dot = false;
    let bytes = prefix.as_bytes();
    while start > 0 {
        let c = bytes[start - 1] as char;
        if c.is_ascii_digit() {
            start -= 1;
        } else if c == '.' && !saw_dot {
            saw_dot = true;
            start -= 1;
        } else {
            break;
        }
    }
    if start == prefix.len() {
        return None;
    }
    let numeric_text = &prefix[start..];
    numeric_text.parse::<f64>().ok().map(|v| (v, start))
}

fn match_backup(lowered: &str, base_offset: usize, out: &mut Vec<RawMatch>) {
    for needle in ["backup", "redundant", "redundancy", "replicate"] {
        if let Some(idx) = contains_near(lowered, needle) {
            push(out, ClaimType::Security, "BACKUP", Polarity::Neutral, 0.75, base_offset + idx);
            return;
        }
    }
}

fn match_audit(lowered: &str, base_offset: usize, out: &mut Vec<RawMatch>) {
    if let Some(idx) = contains_near(lowered, "audit") {
        push(out, ClaimType::Compliance, "AUDIT", Polarity::Neutral, 0.8, base_offset + idx);
    }
}

fn match_penetration_testing(lowered: &str, base_offset: usize, out: &mut Vec<RawMatch>) {
    for needle in ["penetration test", "pen test", "pentest", "security test"] {
        if let Some(idx) = contains_near(lowered, needle) {
            push(out, ClaimType::Security, "PENETRATION_TESTING", Polarity::Neutral, 0.85, base_offset + idx);
            return;
        }
    }
}

fn match_mfa(lowered: &str, base_offset: usize, out: &mut Vec<RawMatch>) {
    for needle in ["two-factor", "two factor", "2fa", "multi-factor", "multi factor", "mfa"] {
        if let Some(idx) = contains_near(lowered, needle) {
            push(out, ClaimType::Security, "MFA", Polarity::Neutral, 0.9, base_offset + idx);
            return;
        }
    }
}

fn push(
    out: &mut Vec<RawMatch>,
    claim_type: ClaimType,
    key: &'static str,
    polarity: Polarity,
    confidence: f64,
    doc_index: usize,
) {
    out.push(RawMatch {
        claim_type,
        key,
        polarity,
        confidence,
        metadata: ClaimMetadata::None,
        doc_index,
    });
}

// ============================================================================
// SECTION: Pure helper operations
// ============================================================================

const WEAKENING_PAIRS: &[(&[&str], &[&str])] = &[
    (&["do not", "don't", "never"], &["may", "might", "could"]),
    (&["always"], &["typically", "usually", "generally"]),
    (&["all"], &["most", "some"]),
    (&["guarantee"], &["strive", "aim", "endeavor"]),
];

/// True iff any weakening pair fires: the old snippet contains a term from
/// the pair's strong side and the new snippet contains a term from its
/// weaker side.
#[must_use]
pub fn detect_weakening(old_snippet: &str, new_snippet: &str) -> bool {
    let old_lower = old_snippet.to_lowercase();
    let new_lower = new_snippet.to_lowercase();
    WEAKENING_PAIRS.iter().any(|(strong, weak)| {
        strong.iter().any(|term| old_lower.contains(term)) && weak.iter().any(|term| new_lower.contains(term))
    })
}

/// Compares two optional numeric metadata values, returning
/// `(changed, decreased)`. Both are false if either side lacks a numeric
/// value.
#[must_use]
pub fn detect_numeric_change(old_meta: &ClaimMetadata, new_meta: &ClaimMetadata) -> (bool, bool) {
    match (old_meta.numeric_value(), new_meta.numeric_value()) {
        (Some(old_value), Some(new_value)) => (old_value != new_value, new_value < old_value),
        _ => (false, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_baseline_add_extracts_three_claims() {
        let doc = "We are SOC 2 Type II compliant. We guarantee 99.99% uptime. We do not sell customer data.";
        let claims = extract(doc, "https://acme.example/trust");
        let keys: Vec<&str> = claims.iter().map(|c| c.normalized_key.as_str()).collect();
        assert!(keys.contains(&"SOC2_TYPE_II"));
        assert!(keys.contains(&"UPTIME"));
        assert!(keys.contains(&"DO_NOT_SELL"));

        let uptime = claims.iter().find(|c| c.normalized_key == "UPTIME").unwrap();
        assert_eq!(uptime.metadata.numeric_value(), Some(99.99));

        let dns = claims.iter().find(|c| c.normalized_key == "DO_NOT_SELL").unwrap();
        assert_eq!(dns.polarity, Polarity::Negative);
    }

    #[test]
    fn dedup_keeps_highest_confidence_match() {
        let doc = "Our SOC 2 report covers SOC 2 Type II. SOC 2 Type II is audited yearly.";
        let claims = extract(doc, "https://acme.example/trust");
        let matches: Vec<_> = claims.iter().filter(|c| c.normalized_key == "SOC2_TYPE_II").collect();
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn b3_uptime_downgrade_detected_numeric() {
        let (changed, decreased) = detect_numeric_change(
            &ClaimMetadata::Numeric { value: 99.99, unit: "%".into() },
            &ClaimMetadata::Numeric { value: 99.9, unit: "%".into() },
        );
        assert!(changed);
        assert!(decreased);
    }

    #[test]
    fn b3_uptime_upgrade_is_change_without_decrease() {
        let (changed, decreased) = detect_numeric_change(
            &ClaimMetadata::Numeric { value: 99.9, unit: "%".into() },
            &ClaimMetadata::Numeric { value: 99.99, unit: "%".into() },
        );
        assert!(changed);
        assert!(!decreased);
    }

    #[test]
    fn detect_weakening_matches_do_not_to_may() {
        assert!(detect_weakening(
            "We do not sell your data",
            "We may share your data with trusted partners"
        ));
    }

    #[test]
    fn detect_weakening_false_when_no_pair_fires() {
        assert!(!detect_weakening(
            "We encrypt your data",
            "We encrypt your data using AES-256"
        ));
    }

    #[test]
    fn no_claims_extracted_from_unrelated_text() {
        let doc = "Our office is located downtown near the river and is open on weekdays.";
        let claims = extract(doc, "https://acme.example/about");
        assert!(claims.is_empty());
    }
}

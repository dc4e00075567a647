// crates/trustwatch-core/src/pdf_scan.rs
// ============================================================================
// Module: PDF Link Scan
// Description: Pure scan of fetched page text for absolute PDF URLs.
// Purpose: Drive the crawl worker's evidence fan-out (§4.5 step 8) without
//          any I/O or store dependency.
// Dependencies: none
// ============================================================================

//! ## Overview
//! Scans a fetched document for absolute `http(s)://....pdf` URLs,
//! case-insensitively, returning the first three unique matches in
//! first-seen order. Uniqueness and the three-URL cap are the caller's
//! fan-out budget (§4.5 step 8), enforced here so every caller gets the same
//! bound without re-deriving it.

const FAN_OUT_LIMIT: usize = 3;

/// Returns the first three unique absolute PDF URLs found in `text`, in
/// first-seen order.
#[must_use]
pub fn find_pdf_urls(text: &str) -> Vec<String> {
    let mut found = Vec::new();
    let lowered = text.to_lowercase();
    for scheme in ["http://", "https://"] {
        let mut search_from = 0usize;
        while let Some(rel) = lowered[search_from..].find(scheme) {
            let start = search_from + rel;
            let end = url_end(&lowered, start);
            if lowered[start..end].ends_with(".pdf") {
                let candidate = text[start..end].to_string();
                if !found.iter().any(|existing: &String| existing.eq_ignore_ascii_case(&candidate)) {
                    found.push(candidate);
                    if found.len() == FAN_OUT_LIMIT {
                        return found;
                    }
                }
            }
            search_from = start + scheme.len();
        }
    }
    found
}

/// Finds the end of a URL token starting at `start`, stopping at whitespace
/// or common trailing punctuation/delimiters.
fn url_end(text: &str, start: usize) -> usize {
    text[start..]
        .find(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '<' | '>' | ')' | ']' | ','))
        .map_or(text.len(), |rel| start + rel)
}

// crates/trustwatch-adapters/src/pdf.rs
// ============================================================================
// Module: PDF Parse Adapter
// Description: Demo and real implementations of PdfParseAdapter (§4.6).
// Purpose: Turn a PDF document URL into full and per-page text for
//          regulatory-field extraction, without exposing evidence retrieval
//          to unbounded downloads or private-network addresses.
// Dependencies: pdf-extract, trustwatch-core
// ============================================================================

//! ## Overview
//! [`HttpPdfParseAdapter`] reuses [`HttpFetchAdapter::fetch_bytes`] for the
//! SSRF-safe, size-capped download, then hands the bytes to `pdf-extract`
//! for text extraction. The teacher's stack has no PDF-parsing precedent, so
//! `pdf-extract` was chosen as the narrowest real crate for the job; see
//! `DESIGN.md` for the rationale. [`DemoPdfParseAdapter`] serves canned page
//! text for demo runs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use trustwatch_core::interfaces::FetchError;
use trustwatch_core::interfaces::ParsedPdf;
use trustwatch_core::interfaces::PdfParseAdapter;
use trustwatch_core::interfaces::PdfParseError;

use crate::fetch::FetchClientConfig;
use crate::fetch::HttpFetchAdapter;

// ============================================================================
// SECTION: Real Adapter
// ============================================================================

/// Downloads and extracts text from PDF documents.
///
/// # Invariants
/// - Download uses the same SSRF-safe fetch plumbing as [`HttpFetchAdapter`].
/// - A document `pdf-extract` cannot parse yields [`PdfParseError::InvalidPdf`].
pub struct HttpPdfParseAdapter {
    /// Delegate used for the underlying bounded, policy-checked download.
    fetcher: HttpFetchAdapter,
}

impl HttpPdfParseAdapter {
    /// Creates a new PDF-parse adapter with the given fetch configuration.
    ///
    /// # Errors
    /// Returns [`PdfParseError`] when the underlying HTTP client cannot be
    /// constructed.
    pub fn new(config: FetchClientConfig) -> Result<Self, PdfParseError> {
        let fetcher = HttpFetchAdapter::new(config).map_err(|err| PdfParseError::Transient {
            url: "<init>".to_string(),
            message: fetch_error_message(&err),
        })?;
        Ok(Self { fetcher })
    }
}

#[async_trait]
impl PdfParseAdapter for HttpPdfParseAdapter {
    async fn parse(&self, url: &str) -> Result<ParsedPdf, PdfParseError> {
        let (bytes, _metadata) = self.fetcher.fetch_bytes(url).map_err(|err| classify_fetch_error(url, &err))?;
        let page_texts = pdf_extract::extract_text_from_mem_by_pages(&bytes)
            .map_err(|err| PdfParseError::InvalidPdf { url: url.to_string(), message: err.to_string() })?;
        let mut pages = BTreeMap::new();
        let mut full_text = String::new();
        for (index, page_text) in page_texts.into_iter().enumerate() {
            let page_number = u32::try_from(index).unwrap_or(u32::MAX);
            if !full_text.is_empty() {
                full_text.push('\n');
            }
            full_text.push_str(&page_text);
            pages.insert(page_number, page_text);
        }
        Ok(ParsedPdf { full_text, pages })
    }
}

fn classify_fetch_error(url: &str, err: &FetchError) -> PdfParseError {
    match err {
        FetchError::HttpStatus { status, .. } => {
            PdfParseError::InvalidPdf { url: url.to_string(), message: format!("fetch returned status {status}") }
        }
        FetchError::Transport { message, .. } => PdfParseError::Transient { url: url.to_string(), message: message.clone() },
    }
}

fn fetch_error_message(err: &FetchError) -> String {
    match err {
        FetchError::Transport { message, .. } => message.clone(),
        FetchError::HttpStatus { status, .. } => format!("status {status}"),
    }
}

// ============================================================================
// SECTION: Demo Adapter
// ============================================================================

/// Serves canned PDF text keyed by URL, for `demo_mode = true` runs.
///
/// # Invariants
/// - Unseeded URLs yield a single-page placeholder document rather than an
///   error, so a demo evidence run always completes.
#[derive(Debug, Clone, Default)]
pub struct DemoPdfParseAdapter {
    /// Canned URL to full-document-text table.
    documents: BTreeMap<String, String>,
}

impl DemoPdfParseAdapter {
    /// Creates an empty demo adapter; every URL yields placeholder text.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers canned full-document text for a URL.
    #[must_use]
    pub fn with_document(mut self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.documents.insert(url.into(), text.into());
        self
    }
}

#[async_trait]
impl PdfParseAdapter for DemoPdfParseAdapter {
    async fn parse(&self, url: &str) -> Result<ParsedPdf, PdfParseError> {
        let full_text = self.documents.get(url).cloned().unwrap_or_else(|| format!("demo placeholder pdf content for {url}"));
        let mut pages = BTreeMap::new();
        pages.insert(0, full_text.clone());
        Ok(ParsedPdf { full_text, pages })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]
mod tests {
    use super::*;

    #[tokio::test]
    async fn demo_adapter_returns_seeded_document() {
        let adapter = DemoPdfParseAdapter::new().with_document("https://acme.example/soc2.pdf", "SOC 2 Type II report.");
        let parsed = adapter.parse("https://acme.example/soc2.pdf").await.unwrap();
        assert_eq!(parsed.full_text, "SOC 2 Type II report.");
        assert_eq!(parsed.pages.get(&0).map(String::as_str), Some("SOC 2 Type II report."));
    }

    #[tokio::test]
    async fn demo_adapter_falls_back_to_placeholder_for_unseeded_url() {
        let adapter = DemoPdfParseAdapter::new();
        let parsed = adapter.parse("https://acme.example/unknown.pdf").await.unwrap();
        assert!(parsed.full_text.contains("https://acme.example/unknown.pdf"));
    }
}

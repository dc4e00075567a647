// crates/trustwatch-adapters/src/lib.rs
// ============================================================================
// Module: Trust Claim Monitoring Adapters
// Description: Demo and real implementations of the fetch, PDF-parse, and
//              mail capability traits.
// Purpose: Keep external collaborators (HTTP, PDF text extraction, mail
//          delivery) behind the narrow interfaces trustwatch-core defines,
//          with demo-mode stand-ins that need no network access.
// Dependencies: trustwatch-core, reqwest, scraper
// ============================================================================

//! ## Overview
//! Each capability (fetch, PDF parse, mail) ships two implementations: a
//! `Demo*` adapter that returns canned, deterministic data for local runs
//! with `demo_mode = true`, and a real adapter backed by an outbound network
//! client. Callers depend only on the `trustwatch_core::interfaces` traits,
//! so swapping demo for real is a constructor choice, not a code change.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod fetch;
pub mod mail;
pub mod pdf;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use fetch::DemoFetchAdapter;
pub use fetch::HttpFetchAdapter;
pub use mail::DemoMailAdapter;
pub use mail::WebhookMailAdapter;
pub use pdf::DemoPdfParseAdapter;
pub use pdf::HttpPdfParseAdapter;

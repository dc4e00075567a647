// crates/trustwatch-core/src/lib.rs
// ============================================================================
// Module: Trust Claim Monitoring Core
// Description: Domain model, pure extraction/classification logic, and the
//              capability/store trait surface shared by every other crate.
// Purpose: Keep the deterministic core free of I/O so it can be tested without
//          a network, a database, or a clock.
// Dependencies: serde, sha2, thiserror, time
// ============================================================================

//! ## Overview
//!
//! This crate has no I/O of its own. It defines:
//! - the seven persisted entities ([`model`]) and their invariants,
//! - opaque identifiers ([`identifiers`]),
//! - the pure claim extractor and change classifier ([`extractor`], [`severity`]),
//! - seed URL derivation ([`seed`]),
//! - a content-digest helper ([`hashing`]),
//! - a [`clock::Clock`] abstraction so no other crate reads wall-clock time directly, and
//! - the capability/store trait surface ([`interfaces`]) implemented elsewhere.

pub mod clock;
pub mod error;
pub mod evidence_extractor;
pub mod extractor;
pub mod hashing;
pub mod identifiers;
pub mod interfaces;
pub mod model;
pub mod pdf_scan;
pub mod seed;
pub mod severity;

pub use clock::Clock;
pub use clock::SystemClock;
pub use error::CoreError;
pub use identifiers::ClaimId;
pub use identifiers::ClaimVersionId;
pub use identifiers::CompanyId;
pub use identifiers::CrawlRunId;
pub use identifiers::EventId;
pub use identifiers::EvidenceId;
pub use identifiers::TargetId;
pub use identifiers::UserId;

// crates/trustwatch-queue/src/lib.rs
// ============================================================================
// Module: Trust Claim Monitoring Queue
// Description: Workers and scheduler that turn queued jobs into crawl cycles,
//              evidence parses, and alert dispatch.
// Purpose: Isolate the async execution machinery from storage and network
//          concerns, which arrive here only as `trustwatch-core` trait
//          objects supplied by the binary that wires everything together.
// Dependencies: trustwatch-core, tokio
// ============================================================================

//! ## Overview
//! This crate has no knowledge of SQLite, HTTP, or SMTP. It consumes the
//! [`trustwatch_core::interfaces::Store`], [`trustwatch_core::interfaces::JobQueue`],
//! [`trustwatch_core::interfaces::FetchAdapter`], [`trustwatch_core::interfaces::MailAdapter`],
//! and [`trustwatch_core::interfaces::PdfParseAdapter`] traits as `Arc<dyn Trait>`
//! and drives three loops against them:
//! - [`scheduler::Scheduler`] enqueues `crawl_target` jobs on a fixed interval.
//! - [`crawl_worker::CrawlWorker`] turns one `crawl_target` job into claim
//!   versions, change events, a risk-score update, rate-limited alerting, and
//!   an evidence fan-out.
//! - [`evidence_worker::EvidenceWorker`] turns one `process_evidence` job into
//!   a parsed PDF's extracted evidence fields.
//!
//! [`shutdown::ShutdownSignal`] and [`shutdown::spawn_ctrl_c_listener`] give
//! every loop a shared, pollable "stop claiming new work" flag.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod crawl_worker;
pub mod errors;
pub mod evidence_worker;
pub mod ids;
pub mod scheduler;
pub mod shutdown;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crawl_worker::CrawlTargetJob;
pub use crawl_worker::CrawlWorker;
pub use evidence_worker::EvidenceWorker;
pub use evidence_worker::ProcessEvidenceJob;
pub use ids::new_id;
pub use scheduler::Scheduler;
pub use shutdown::ShutdownSignal;
pub use shutdown::spawn_ctrl_c_listener;

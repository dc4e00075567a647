// crates/trustwatch-api/src/lib.rs
// ============================================================================
// Module: Trust Claim Monitoring API
// Description: The control HTTP surface — accepts user mutations, enqueues
//              jobs, never touches the fetch or PDF adapters (§4.7).
// Dependencies: axum, trustwatch-core, trustwatch-queue
// ============================================================================

//! ## Overview
//! Four mutation routes plus a supplemented health endpoint, all built on
//! [`trustwatch_core::interfaces::Store`] and
//! [`trustwatch_core::interfaces::JobQueue`] trait objects so this crate
//! never links against SQLite, HTTP fetch, or mail delivery directly.
//! Authentication/session handling is explicitly out of scope (§1); see
//! [`user`] for the seam a real deployment would replace.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod companies;
pub mod correlation;
pub mod crawl;
pub mod error;
pub mod events;
pub mod health;
pub mod middleware;
pub mod server;
pub mod state;
pub mod telemetry;
pub mod user;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use error::ApiError;
pub use server::router;
pub use state::ApiState;

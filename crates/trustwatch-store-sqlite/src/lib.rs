// crates/trustwatch-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Store
// Description: Durable Store + JobQueue implementation backed by SQLite.
// Dependencies: trustwatch-core, rusqlite, tokio
// ============================================================================

//! ## Overview
//! [`store::SqliteStore`] implements both [`trustwatch_core::interfaces::Store`]
//! and [`trustwatch_core::interfaces::JobQueue`] over a single `SQLite` file,
//! routing every mutation through a dedicated writer thread so concurrent
//! callers never contend on `SQLite`'s single-writer lock.

pub mod store;

pub use store::SqliteStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;

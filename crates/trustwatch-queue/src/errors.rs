// crates/trustwatch-queue/src/errors.rs
// ============================================================================
// Module: Worker Error Mapping
// Description: Shared StoreError -> WorkerError mapping for every worker.
// Dependencies: trustwatch-core
// ============================================================================

//! Shared `StoreError` -> `WorkerError` mapping for every worker.

use trustwatch_core::error::WorkerError;
use trustwatch_core::interfaces::StoreError;

/// Maps a store failure onto the worker error taxonomy: a missing entity is a
/// precondition violation (no retry value), anything else is transient.
pub(crate) fn store_to_worker(err: StoreError) -> WorkerError {
    match err {
        StoreError::NotFound(msg) => WorkerError::Precondition(msg),
        StoreError::Backend(msg) => WorkerError::Transient(msg),
    }
}

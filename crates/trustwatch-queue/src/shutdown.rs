// crates/trustwatch-queue/src/shutdown.rs
// ============================================================================
// Module: Graceful Shutdown
// Description: Ctrl-C handling shared by the scheduler and both worker pools.
// Purpose: Let in-flight jobs finish and stop claiming new ones on the first
//          signal; exit immediately on a second, per §4.1's shutdown note.
// Dependencies: tokio
// ============================================================================

//! ## Overview
//! A single [`ShutdownSignal`] is cloned into the scheduler tick loop and
//! every worker pool. The first Ctrl-C flips the flag everyone polls between
//! batches; a second Ctrl-C is a forced exit for an operator who doesn't want
//! to wait out in-flight jobs.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;

/// Shared shutdown state, cheap to clone and poll from any loop.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    graceful: AtomicBool,
    signals_received: AtomicU8,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    /// Creates a signal in the not-yet-requested state.
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Arc::new(Inner { graceful: AtomicBool::new(false), signals_received: AtomicU8::new(0) }) }
    }

    /// Whether a graceful shutdown has been requested; loops should stop
    /// claiming new work once this is true and let in-flight jobs finish.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.inner.graceful.load(Ordering::SeqCst)
    }

    /// Requests a graceful shutdown, returning how many times shutdown has
    /// now been requested (a second request signals operator impatience).
    fn request(&self) -> u8 {
        self.inner.graceful.store(true, Ordering::SeqCst);
        self.inner.signals_received.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Spawns a task that requests graceful shutdown on the first Ctrl-C and
/// exits the process immediately on a second.
pub fn spawn_ctrl_c_listener(signal: ShutdownSignal) {
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            let count = signal.request();
            tracing::warn!(count, "shutdown signal received");
            if count >= 2 {
                #[allow(clippy::exit, reason = "a second Ctrl-C is an explicit operator demand to stop waiting")]
                std::process::exit(130);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::ShutdownSignal;

    #[test]
    fn starts_unrequested_and_flips_on_request() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_requested());
        let count = signal.request();
        assert_eq!(count, 1);
        assert!(signal.is_requested());
    }

    #[test]
    fn clone_shares_the_same_underlying_flag() {
        let signal = ShutdownSignal::new();
        let cloned = signal.clone();
        cloned.request();
        assert!(signal.is_requested());
    }
}

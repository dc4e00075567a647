// crates/trustwatch-core/src/clock.rs
// ============================================================================
// Module: Clock
// Description: Wall-clock abstraction so pure/test code never calls `now()`.
// Purpose: Keep the deterministic core and its tests free of system time
//          reads; every timestamp enters through an explicit `Clock`.
// Dependencies: time
// ============================================================================

//! Wall-clock abstraction so pure/test code never calls `now()`.

use time::OffsetDateTime;

/// Supplies the current time to callers that need to stamp records.
///
/// # Invariants
/// - `now()` is the only source of wall-clock time used by workers, the
///   scheduler, and the API; no other code in this workspace calls
///   `OffsetDateTime::now_utc()` directly.
pub trait Clock: Send + Sync {
    /// Returns the current UTC time.
    fn now(&self) -> OffsetDateTime;
}

/// A [`Clock`] backed by the operating system's wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fixed {
    use std::sync::atomic::AtomicI64;
    use std::sync::atomic::Ordering;

    use time::OffsetDateTime;

    use super::Clock;

    /// A [`Clock`] that returns a fixed instant, advanceable by tests.
    #[derive(Debug)]
    pub struct FixedClock {
        unix_seconds: AtomicI64,
    }

    impl FixedClock {
        /// Creates a fixed clock starting at the given unix-seconds instant.
        #[must_use]
        pub const fn new(unix_seconds: i64) -> Self {
            Self {
                unix_seconds: AtomicI64::new(unix_seconds),
            }
        }

        /// Advances the clock by `seconds`.
        pub fn advance(&self, seconds: i64) {
            self.unix_seconds.fetch_add(seconds, Ordering::SeqCst);
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> OffsetDateTime {
            let secs = self.unix_seconds.load(Ordering::SeqCst);
            OffsetDateTime::from_unix_timestamp(secs).unwrap_or(OffsetDateTime::UNIX_EPOCH)
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fixed::FixedClock;

//! Steady-time source for the supervisor.
//!
//! Uptime and startup-grace classification compare monotonic instants, never
//! wall-clock time. [`Clock`] is the seam that lets tests substitute a
//! controllable time source; production code uses [`SteadyClock`].

use std::time::Instant;

/// Monotonic time source.
pub trait Clock: Send + Sync {
    /// Returns the current steady-clock instant.
    fn now(&self) -> Instant;
}

/// Default clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SteadyClock;

impl Clock for SteadyClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

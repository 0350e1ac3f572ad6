//! Time sources for control policies.
//!
//! Policies measure elapsed time from their `initialize` call. The rig uses
//! [`MonotonicClock`]; tests drive a [`ManualClock`] so that time-dependent
//! behavior can be checked at exact instants.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic time source.
pub trait Clock: Send {
    /// Time since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// Process monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock whose origin is the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Manually advanced clock with nanosecond resolution.
///
/// Clones share the same time value.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the absolute time.
    pub fn set(&self, t: Duration) {
        self.nanos.store(t.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Set the absolute time in seconds.
    pub fn set_secs(&self, secs: f64) {
        self.set(Duration::from_secs_f64(secs));
    }

    /// Move time forward.
    pub fn advance(&self, dt: Duration) {
        self.nanos.fetch_add(dt.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

/// Elapsed-time origin shared by every policy.
#[derive(Debug, Clone)]
pub(crate) struct Stopwatch<C: Clock> {
    clock: C,
    origin: Duration,
}

impl<C: Clock> Stopwatch<C> {
    pub(crate) fn new(clock: C) -> Self {
        let origin = clock.now();
        Self { clock, origin }
    }

    /// Reset t = 0 to now.
    pub(crate) fn restart(&mut self) {
        self.origin = self.clock.now();
    }

    /// Seconds since the last restart.
    #[inline]
    pub(crate) fn elapsed_secs(&self) -> f64 {
        self.clock.now().saturating_sub(self.origin).as_secs_f64()
    }
}

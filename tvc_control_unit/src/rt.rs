//! Process real-time setup and absolute-deadline sleeping.
//!
//! ## RT Setup Sequence
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)`: lock all pages.
//! 2. Prefault stack pages.
//! 3. `sched_setaffinity`: pin to an isolated CPU core.
//! 4. `sched_setscheduler(SCHED_FIFO, prio)`: RT priority.
//!
//! Every system call is compiled in only with the `rt` feature; without it
//! the setup functions succeed as no-ops and [`Sleeper`] falls back to
//! `std::thread::sleep`.

use std::time::Instant;
use thiserror::Error;

/// Errors during RT setup or deadline sleeping.
#[derive(Debug, Clone, Error)]
pub enum RtError {
    /// RT system call failed.
    #[error("RT setup error: {0}")]
    Setup(String),

    /// Monotonic clock access failed.
    #[error("clock error: {0}")]
    Clock(String),
}

// ─── RT Setup ───────────────────────────────────────────────────────

/// Lock all current and future memory pages.
#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), RtError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| RtError::Setup(format!("mlockall failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), RtError> {
    Ok(())
}

/// Stack reserved ahead of the loop [bytes].
const PREFAULT_STACK_BYTES: usize = 256 * 1024;
const PAGE_BYTES: usize = 4096;

/// Touch one byte per stack page so the loop never page-faults on it.
fn prefault_stack() {
    let mut buf = [0u8; PREFAULT_STACK_BYTES];
    for page in buf.chunks_mut(PAGE_BYTES) {
        // SAFETY: `page` is a non-empty exclusive slice of a local array.
        unsafe { core::ptr::write_volatile(page.as_mut_ptr(), 1) };
    }
    std::hint::black_box(&buf);
}

/// Pin the calling thread to `cpu`.
///
/// No-op when the `rt` feature is not enabled.
#[cfg(feature = "rt")]
pub fn pin_current_thread(cpu: usize) -> Result<(), RtError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| RtError::Setup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| RtError::Setup(format!("sched_setaffinity failed: {e}")))
}

/// Pin the calling thread to `cpu`.
///
/// No-op when the `rt` feature is not enabled.
#[cfg(not(feature = "rt"))]
pub fn pin_current_thread(_cpu: usize) -> Result<(), RtError> {
    Ok(())
}

/// Set SCHED_FIFO with the given priority.
#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), RtError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call; pid 0 targets the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(RtError::Setup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), RtError> {
    Ok(())
}

/// Perform the full RT setup sequence on the calling thread.
///
/// Must be called before entering the control loop.
pub fn rt_setup(cpu: usize, priority: i32) -> Result<(), RtError> {
    rt_mlockall()?;
    prefault_stack();
    pin_current_thread(cpu)?;
    rt_set_scheduler(priority)?;
    Ok(())
}

// ─── Deadline Sleep ─────────────────────────────────────────────────

/// Sleeps until absolute `Instant` deadlines.
///
/// With the `rt` feature this is `clock_nanosleep(TIMER_ABSTIME)` on
/// `CLOCK_MONOTONIC`, which does not accumulate drift. `Instant` deadlines are
/// converted through an anchor pair sampled at construction.
#[derive(Debug)]
pub struct Sleeper {
    #[cfg(feature = "rt")]
    anchor: (Instant, nix::sys::time::TimeSpec),
}

impl Sleeper {
    /// Create a sleeper.
    #[cfg(feature = "rt")]
    pub fn new() -> Result<Self, RtError> {
        use nix::time::{ClockId, clock_gettime};
        let ts = clock_gettime(ClockId::CLOCK_MONOTONIC)
            .map_err(|e| RtError::Clock(format!("clock_gettime: {e}")))?;
        Ok(Self {
            anchor: (Instant::now(), ts),
        })
    }

    /// Create a sleeper.
    #[cfg(not(feature = "rt"))]
    pub fn new() -> Result<Self, RtError> {
        Ok(Self {})
    }

    /// Block until `deadline`. Returns immediately if it already passed.
    #[cfg(feature = "rt")]
    pub fn sleep_until(&self, deadline: Instant) {
        use nix::time::{ClockId, ClockNanosleepFlags, clock_nanosleep};
        let (anchor_instant, anchor_ts) = self.anchor;
        let offset = deadline.saturating_duration_since(anchor_instant);
        let target = timespec_add_ns(anchor_ts, offset.as_nanos() as i64);
        // EINTR just wakes the loop early; the schedule absorbs it.
        let _ = clock_nanosleep(
            ClockId::CLOCK_MONOTONIC,
            ClockNanosleepFlags::TIMER_ABSTIME,
            &target,
        );
    }

    /// Block until `deadline`. Returns immediately if it already passed.
    #[cfg(not(feature = "rt"))]
    pub fn sleep_until(&self, deadline: Instant) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
    }
}

/// Add nanoseconds to a TimeSpec.
#[cfg(feature = "rt")]
fn timespec_add_ns(ts: nix::sys::time::TimeSpec, ns: i64) -> nix::sys::time::TimeSpec {
    use nix::sys::time::TimeSpec;
    let total = ts.tv_nsec() as i64 + ns;
    let secs = ts.tv_sec() as i64 + total.div_euclid(1_000_000_000);
    let nanos = total.rem_euclid(1_000_000_000);
    TimeSpec::new(secs as _, nanos as _)
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    #[cfg(not(feature = "rt"))]
    fn rt_setup_without_feature_is_noop() {
        assert!(rt_setup(0, 80).is_ok());
        assert!(pin_current_thread(3).is_ok());
    }

    #[test]
    fn sleeper_waits_for_deadline() {
        let sleeper = Sleeper::new().unwrap();
        let start = Instant::now();
        sleeper.sleep_until(start + Duration::from_millis(5));
        assert!(start.elapsed() >= Duration::from_millis(4));
    }

    #[test]
    fn sleeper_returns_for_past_deadline() {
        let sleeper = Sleeper::new().unwrap();
        let start = Instant::now();
        sleeper.sleep_until(start);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn rt_error_display() {
        let e = RtError::Setup("mlockall failed: EPERM".into());
        assert_eq!(e.to_string(), "RT setup error: mlockall failed: EPERM");
    }

    #[cfg(feature = "rt")]
    #[test]
    fn timespec_add_carries() {
        use nix::sys::time::TimeSpec;
        let ts = timespec_add_ns(TimeSpec::new(1, 999_999_999), 2);
        assert_eq!((ts.tv_sec(), ts.tv_nsec()), (2, 1));
    }
}

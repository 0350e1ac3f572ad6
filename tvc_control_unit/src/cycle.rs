//! Fixed-period control cycle with pipelined bus I/O.
//!
//! ## Tick Body
//! 1. Periodic status line.
//! 2. Deadline bookkeeping: advance the next boundary past `now`, counting
//!    whole skipped periods (non-fatal).
//! 3. Absolute-time sleep to the boundary.
//! 4. Stop flag check.
//! 5. Retrieve the dispatch issued on the previous tick (bounded wait).
//! 6. Policy step on the retrieved replies.
//! 7. Startup stop override for the first [`STARTUP_STOP_CYCLES`] ticks.
//! 8. Telemetry records, if a sink is attached.
//! 9. Dispatch the new command batch without waiting for it.
//!
//! ## Pipeline
//! A single [`BusFrame`] circulates between the loop and the transport. The
//! reply batch a policy sees at tick N is the result of the dispatch issued at
//! tick N−1; at most one dispatch is outstanding. Commands and replies are
//! copied into buffers allocated before the first tick, so the loop body does
//! not allocate.
//!
//! ## Exit
//! The loop leaves on policy completion or an external stop request. Every
//! actuator is then commanded to stop by exactly one final dispatch.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, trace, warn};
use tvc_common::actuator::{ActuatorAddress, ActuatorCommand, ActuatorReply};
use tvc_common::bus::{BusError, BusFrame, BusTransport, DispatchSlot};
use tvc_common::consts::{
    DEFAULT_DISPATCH_TIMEOUT_MS, DEFAULT_PERIOD_S, DEFAULT_STATUS_PERIOD_MS, MAX_ACTUATORS,
    STARTUP_STOP_CYCLES,
};

use crate::policy::ControlPolicy;
use crate::rt::{RtError, Sleeper};
use crate::telemetry::{RecordSink, TelemetryRecord};

// ─── Errors ─────────────────────────────────────────────────────────

/// Scheduler construction and run errors.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Tick period is zero, negative or not finite.
    #[error("tick period must be a positive finite duration, got {0}s")]
    InvalidPeriod(f64),

    /// Dispatch wait bound is zero.
    #[error("dispatch timeout must be positive")]
    InvalidDispatchTimeout,

    /// Zero status line interval.
    #[error("status period must be positive")]
    InvalidStatusPeriod,

    /// Empty actuator address list.
    #[error("at least one actuator must be configured")]
    NoActuators,

    /// More actuators than one host supports.
    #[error("{0} actuators configured, at most {MAX_ACTUATORS} supported")]
    TooManyActuators(usize),

    /// Same address listed twice.
    #[error("duplicate actuator address {0}")]
    DuplicateActuator(ActuatorAddress),

    /// The policy drives more actuators than are configured.
    #[error("policy {policy} needs {required} actuator(s), {configured} configured")]
    TooFewActuators {
        /// Policy name.
        policy: &'static str,
        /// Actuators the policy drives.
        required: usize,
        /// Actuators configured.
        configured: usize,
    },

    /// A dispatch did not complete within the wait bound.
    #[error("bus dispatch stalled at tick {tick} (no completion within {timeout:?})")]
    DispatchStalled {
        /// Tick at which the wait gave up.
        tick: u64,
        /// Wait bound.
        timeout: Duration,
    },

    /// Transport setup or teardown failed.
    #[error(transparent)]
    Transport(#[from] BusError),

    /// RT clock or setup failure.
    #[error(transparent)]
    Rt(#[from] RtError),
}

// ─── Configuration ──────────────────────────────────────────────────

/// Timing parameters of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Tick period.
    pub period: Duration,
    /// Bound on waiting for the previous tick's dispatch.
    pub dispatch_timeout: Duration,
    /// Status line interval.
    pub status_period: Duration,
}

impl SchedulerConfig {
    /// Default timing with the given tick period in seconds.
    pub fn with_period_secs(period_s: f64) -> Result<Self, SchedulerError> {
        if !(period_s.is_finite() && period_s > 0.0) {
            return Err(SchedulerError::InvalidPeriod(period_s));
        }
        let period = Duration::from_secs_f64(period_s);
        if period.is_zero() {
            return Err(SchedulerError::InvalidPeriod(period_s));
        }
        Ok(Self {
            period,
            ..Self::default()
        })
    }

    fn validate(&self) -> Result<(), SchedulerError> {
        if self.period.is_zero() {
            return Err(SchedulerError::InvalidPeriod(0.0));
        }
        if self.dispatch_timeout.is_zero() {
            return Err(SchedulerError::InvalidDispatchTimeout);
        }
        if self.status_period.is_zero() {
            return Err(SchedulerError::InvalidStatusPeriod);
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs_f64(DEFAULT_PERIOD_S),
            dispatch_timeout: Duration::from_millis(DEFAULT_DISPATCH_TIMEOUT_MS),
            status_period: Duration::from_millis(DEFAULT_STATUS_PERIOD_MS),
        }
    }
}

// ─── Tick Schedule ──────────────────────────────────────────────────

/// Absolute tick boundaries on a fixed grid.
#[derive(Debug, Clone, Copy)]
pub struct TickSchedule {
    period: Duration,
    next: Instant,
}

impl TickSchedule {
    /// First boundary one period after `start`.
    pub fn new(start: Instant, period: Duration) -> Self {
        Self {
            period,
            next: start + period,
        }
    }

    /// Upcoming boundary.
    #[inline]
    pub fn next(&self) -> Instant {
        self.next
    }

    /// Move the boundary past `now` in whole periods; returns the number of
    /// boundaries skipped. The boundary stays on the original grid.
    #[inline]
    pub fn catch_up(&mut self, now: Instant) -> u64 {
        let mut skipped = 0;
        while self.next <= now {
            self.next += self.period;
            skipped += 1;
        }
        skipped
    }

    /// Move to the following boundary.
    #[inline]
    pub fn advance(&mut self) {
        self.next += self.period;
    }
}

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-tick statistics.
#[derive(Debug, Clone, Default)]
pub struct CycleStats {
    /// Ticks executed.
    pub cycle_count: u64,
    /// Boundaries skipped because a tick overran.
    pub skipped_cycles: u64,
    /// Sum of sleep margins in the current status window.
    pub margin_sum: Duration,
    /// Ticks in the current status window.
    pub margin_cycles: u64,
    /// Wait for the most recent dispatch completion.
    pub last_dispatch_wait: Duration,
    /// Longest dispatch completion wait.
    pub max_dispatch_wait: Duration,
}

impl CycleStats {
    /// Zeroed statistics.
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            skipped_cycles: 0,
            margin_sum: Duration::ZERO,
            margin_cycles: 0,
            last_dispatch_wait: Duration::ZERO,
            max_dispatch_wait: Duration::ZERO,
        }
    }

    /// Record the time slept before a tick boundary.
    #[inline]
    pub fn record_margin(&mut self, margin: Duration) {
        self.margin_sum += margin;
        self.margin_cycles += 1;
    }

    /// Record the time spent waiting for a dispatch completion.
    #[inline]
    pub fn record_dispatch_wait(&mut self, wait: Duration) {
        self.last_dispatch_wait = wait;
        if wait > self.max_dispatch_wait {
            self.max_dispatch_wait = wait;
        }
    }

    /// Average sleep margin of the status window [s] (0 if empty).
    #[inline]
    pub fn avg_margin_s(&self) -> f64 {
        if self.margin_cycles == 0 {
            0.0
        } else {
            self.margin_sum.as_secs_f64() / self.margin_cycles as f64
        }
    }

    /// Start a new status window.
    #[inline]
    pub fn reset_margin_window(&mut self) {
        self.margin_sum = Duration::ZERO;
        self.margin_cycles = 0;
    }
}

/// Periodic status line: cycle count, average margin, bus voltage range and
/// `id/bus/mode/position` per replying actuator.
pub struct StatusLine<'a> {
    /// Ticks executed.
    pub cycles: u64,
    /// Average sleep margin [s].
    pub avg_margin_s: f64,
    /// Latest reply batch.
    pub replies: &'a [ActuatorReply],
}

impl fmt::Display for StatusLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cycles {}  margin: {:.6}", self.cycles, self.avg_margin_s)?;
        let volts = self.replies.iter().map(|r| r.voltage);
        let min = volts.clone().fold(f64::INFINITY, f64::min);
        let max = volts.fold(f64::NEG_INFINITY, f64::max);
        if self.replies.is_empty() {
            f.write_str("  volts: -/-")?;
        } else {
            write!(f, "  volts: {min:.1}/{max:.1}")?;
        }
        f.write_str("  modes:")?;
        for r in self.replies {
            write!(
                f,
                " {}/{}/{}/{:.4}",
                r.address.id,
                r.address.bus,
                r.mode.code(),
                r.position
            )?;
        }
        Ok(())
    }
}

// ─── Stop Flag ──────────────────────────────────────────────────────

/// External stop request, polled at tick boundaries only.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    /// Unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to stop at its next tick boundary.
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop has been requested.
    #[inline]
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ─── Run Report ─────────────────────────────────────────────────────

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The policy's step reported completion.
    PolicyComplete,
    /// The stop flag was observed.
    StopRequested,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Policy steps executed.
    pub ticks: u64,
    /// Tick boundaries skipped.
    pub skipped_cycles: u64,
    /// Why the run ended.
    pub exit: ExitReason,
    /// Longest dispatch completion wait.
    pub max_dispatch_wait: Duration,
}

// ─── Scheduler ──────────────────────────────────────────────────────

/// Fixed-period control loop driving one bus transport.
pub struct CycleScheduler<T: BusTransport> {
    config: SchedulerConfig,
    addresses: Vec<ActuatorAddress>,
    transport: T,
    sink: Option<Box<dyn RecordSink>>,
    stop: StopFlag,
    stats: CycleStats,
}

impl<T: BusTransport> CycleScheduler<T> {
    /// Create a scheduler for an ordered, duplicate-free address list.
    ///
    /// The address order is the command/reply index mapping for every run.
    pub fn new(
        config: SchedulerConfig,
        addresses: &[ActuatorAddress],
        transport: T,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;
        if addresses.is_empty() {
            return Err(SchedulerError::NoActuators);
        }
        if addresses.len() > MAX_ACTUATORS {
            return Err(SchedulerError::TooManyActuators(addresses.len()));
        }
        for (i, a) in addresses.iter().enumerate() {
            if addresses[..i].contains(a) {
                return Err(SchedulerError::DuplicateActuator(*a));
            }
        }
        Ok(Self {
            config,
            addresses: addresses.to_vec(),
            transport,
            sink: None,
            stop: StopFlag::new(),
            stats: CycleStats::new(),
        })
    }

    /// Attach a telemetry sink.
    pub fn with_record_sink(mut self, sink: Box<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Handle that stops the loop from any thread.
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    /// Configured actuator order.
    pub fn addresses(&self) -> &[ActuatorAddress] {
        &self.addresses
    }

    /// Transport in use.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Transport in use, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Statistics of the current or last run.
    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// Release the transport.
    pub fn shutdown(mut self) -> Result<(), SchedulerError> {
        self.transport.shutdown()?;
        Ok(())
    }

    /// Run `policy` until it completes or a stop is requested.
    pub fn run(&mut self, policy: &mut dyn ControlPolicy) -> Result<RunReport, SchedulerError> {
        let n = self.addresses.len();
        if n < policy.min_actuators() {
            return Err(SchedulerError::TooFewActuators {
                policy: policy.name(),
                required: policy.min_actuators(),
                configured: n,
            });
        }

        let timeout = self.config.dispatch_timeout;
        let mut commands = ActuatorCommand::table(&self.addresses);
        let mut replies: Vec<ActuatorReply> = Vec::with_capacity(n);
        let mut spare = Some(BusFrame::with_addresses(&self.addresses));
        let slot = DispatchSlot::new();
        let sleeper = Sleeper::new()?;

        policy.initialize(&mut commands);
        self.stats = CycleStats::new();

        let start = Instant::now();
        let mut schedule = TickSchedule::new(start, self.config.period);
        let mut next_status = schedule.next() + self.config.status_period;
        let mut tick: u64 = 0;

        info!(
            "Running policy {} on {} actuator(s) via {} at {:?}",
            policy.name(),
            n,
            self.transport.name(),
            self.config.period
        );

        let exit = loop {
            let now = Instant::now();
            if now >= next_status {
                debug!(
                    "{}",
                    StatusLine {
                        cycles: self.stats.cycle_count,
                        avg_margin_s: self.stats.avg_margin_s(),
                        replies: &replies,
                    }
                );
                self.stats.reset_margin_window();
                while next_status <= now {
                    next_status += self.config.status_period;
                }
            }

            let skipped = schedule.catch_up(now);
            if skipped > 0 {
                self.stats.skipped_cycles += skipped;
                warn!("Skipped {} cycles at tick {}", skipped, tick);
            }

            let pre_sleep = Instant::now();
            sleeper.sleep_until(schedule.next());
            self.stats.record_margin(pre_sleep.elapsed());
            schedule.advance();

            if self.stop.is_requested() {
                info!("Stop requested at tick {}", tick);
                break ExitReason::StopRequested;
            }

            // Result of the previous tick's dispatch, or the idle frame.
            let mut frame = match spare.take() {
                Some(frame) => frame,
                None => {
                    let wait_start = Instant::now();
                    let output = match slot.wait(timeout) {
                        Ok(output) => output,
                        Err(e) => {
                            warn!("Dispatch wait failed at tick {}: {}", tick, e);
                            self.emergency_stop(&commands);
                            return Err(SchedulerError::DispatchStalled { tick, timeout });
                        }
                    };
                    self.stats.record_dispatch_wait(wait_start.elapsed());
                    replies.clear();
                    replies.extend_from_slice(output.replies());
                    if replies.len() < n {
                        trace!("Partial reply batch at tick {}: {}/{}", tick, replies.len(), n);
                    }
                    output.frame
                }
            };

            let done = policy.step(&replies, &mut commands);
            self.stats.cycle_count += 1;
            if done {
                info!("Policy {} complete after {} ticks", policy.name(), tick + 1);
                spare = Some(frame);
                tick += 1;
                break ExitReason::PolicyComplete;
            }

            if tick < STARTUP_STOP_CYCLES {
                for cmd in commands.iter_mut() {
                    cmd.stop();
                }
            }

            self.record_telemetry(start, &replies, &commands);

            frame.commands.copy_from_slice(&commands);
            self.transport.cycle(frame, slot.promise());
            tick += 1;
        };

        self.finish(spare, &slot, &mut commands, tick)?;

        Ok(RunReport {
            ticks: tick,
            skipped_cycles: self.stats.skipped_cycles,
            exit,
            max_dispatch_wait: self.stats.max_dispatch_wait,
        })
    }

    /// Append one record per reply; a failing sink is dropped.
    fn record_telemetry(
        &mut self,
        start: Instant,
        replies: &[ActuatorReply],
        commands: &[ActuatorCommand],
    ) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        let timestamp_us = start.elapsed().as_micros() as u64;
        for reply in replies {
            let command = commands.iter().find(|c| c.address == reply.address);
            let record = TelemetryRecord::new(timestamp_us, reply, command);
            if let Err(e) = sink.append(&record) {
                warn!("Telemetry sink failed, recording disabled: {}", e);
                self.sink = None;
                return;
            }
        }
    }

    /// Collect the outstanding dispatch, then send the single final stop.
    fn finish(
        &mut self,
        spare: Option<BusFrame>,
        slot: &DispatchSlot,
        commands: &mut [ActuatorCommand],
        tick: u64,
    ) -> Result<(), SchedulerError> {
        let timeout = self.config.dispatch_timeout;
        // A late completion of the lost dispatch must not confirm the stop.
        let fresh;
        let (mut frame, stop_slot) = match spare {
            Some(frame) => (frame, slot),
            None => match slot.wait(timeout) {
                Ok(output) => (output.frame, slot),
                Err(e) => {
                    warn!("Outstanding dispatch lost before final stop: {}", e);
                    fresh = DispatchSlot::new();
                    (BusFrame::with_addresses(&self.addresses), &fresh)
                }
            },
        };

        for cmd in commands.iter_mut() {
            cmd.stop();
        }
        frame.commands.copy_from_slice(commands);
        self.transport.cycle(frame, stop_slot.promise());
        let result = stop_slot.wait(timeout);

        self.flush_telemetry();

        match result {
            Ok(_) => {
                info!("All actuators stopped after {} ticks", tick);
                Ok(())
            }
            Err(e) => {
                warn!("Final stop dispatch not confirmed: {}", e);
                Err(SchedulerError::DispatchStalled { tick, timeout })
            }
        }
    }

    /// Best-effort stop on a fresh frame after a stalled dispatch.
    fn emergency_stop(&mut self, commands: &[ActuatorCommand]) {
        let mut frame = BusFrame::with_addresses(&self.addresses);
        frame.commands.copy_from_slice(commands);
        for cmd in frame.commands.iter_mut() {
            cmd.stop();
        }
        let slot = DispatchSlot::new();
        self.transport.cycle(frame, slot.promise());
        self.flush_telemetry();
    }

    fn flush_telemetry(&mut self) {
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.flush() {
                warn!("Telemetry flush failed: {}", e);
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

//! Calibration sequence.
//!
//! Excites every configured actuator with the same scripted sweep. A startup
//! ramp of its own duration brings the rotors up to the first segment's
//! velocity first; the segment sweep then runs for the experiment duration,
//! timed from the end of the ramp.

use std::time::Duration;
use tracing::{debug, info};
use tvc_common::actuator::{ActuatorCommand, ActuatorReply};

use super::ramp::{DEFAULT_RAMP_MAX_TORQUE, apply_ramp};
use super::{
    CommandLimits, ControlPolicy, PolicyError, SegmentTable, apply_sinusoidal, check_duration,
    configure_resolution, ramp_fraction, stop_from,
};
use crate::clock::{Clock, MonotonicClock, Stopwatch};

/// Calibration phase at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    /// Velocity ramp to the first segment.
    Ramp,
    /// Segment sweep; carries the active segment index.
    Sweep(usize),
    /// Sweep finished.
    Done,
}

/// Ramp then segment sweep applied to all actuators.
pub struct CalibrationSequence<C: Clock = MonotonicClock> {
    table: SegmentTable,
    experiment_s: f64,
    ramp_s: f64,
    ramp_max_torque: f64,
    limits: CommandLimits,
    clock: Stopwatch<C>,
    phase: Option<CalibrationPhase>,
}

impl CalibrationSequence<MonotonicClock> {
    /// Create a calibration timed by the process monotonic clock.
    pub fn new(table: SegmentTable, experiment: Duration, ramp: Duration) -> Result<Self, PolicyError> {
        Self::with_clock(table, experiment, ramp, MonotonicClock::new())
    }
}

impl<C: Clock> CalibrationSequence<C> {
    /// Create a calibration timed by `clock`.
    pub fn with_clock(
        table: SegmentTable,
        experiment: Duration,
        ramp: Duration,
        clock: C,
    ) -> Result<Self, PolicyError> {
        let experiment_s = check_duration("experiment_duration", experiment.as_secs_f64(), false)?;
        let ramp_s = check_duration("ramp_duration", ramp.as_secs_f64(), true)?;
        Ok(Self {
            table,
            experiment_s,
            ramp_s,
            ramp_max_torque: DEFAULT_RAMP_MAX_TORQUE,
            limits: CommandLimits::SEQUENCE,
            clock: Stopwatch::new(clock),
            phase: None,
        })
    }

    /// Phase at `t` seconds after `initialize`.
    pub fn phase_at(&self, t: f64) -> CalibrationPhase {
        let sweep_t = t - self.ramp_s;
        if t < self.ramp_s {
            CalibrationPhase::Ramp
        } else if sweep_t > self.experiment_s {
            CalibrationPhase::Done
        } else {
            CalibrationPhase::Sweep(self.table.index_at(sweep_t, self.experiment_s))
        }
    }

    /// Total run length: ramp plus sweep.
    pub fn total_duration(&self) -> Duration {
        Duration::from_secs_f64(self.ramp_s + self.experiment_s)
    }
}

impl<C: Clock> ControlPolicy for CalibrationSequence<C> {
    fn name(&self) -> &'static str {
        "calibration"
    }

    fn initialize(&mut self, commands: &mut [ActuatorCommand]) {
        configure_resolution(commands, true);
        self.phase = None;
        self.clock.restart();
        info!(
            "Calibration: {} actuator(s), {:.2}s ramp, {} segments over {:.2}s",
            commands.len(),
            self.ramp_s,
            self.table.len(),
            self.experiment_s
        );
    }

    fn step(&mut self, _replies: &[ActuatorReply], commands: &mut [ActuatorCommand]) -> bool {
        let t = self.clock.elapsed_secs();
        let phase = self.phase_at(t);
        if self.phase != Some(phase) {
            debug!("Calibration phase {:?} at t={:.3}s", phase, t);
            self.phase = Some(phase);
        }

        match phase {
            CalibrationPhase::Ramp => {
                let target = self.table.point(0).velocity;
                let fraction = ramp_fraction(t, self.ramp_s);
                for cmd in commands.iter_mut() {
                    apply_ramp(cmd, &self.limits, target, fraction, self.ramp_max_torque);
                }
                false
            }
            CalibrationPhase::Sweep(index) => {
                let p = self.table.point(index);
                for cmd in commands.iter_mut() {
                    apply_sinusoidal(cmd, &self.limits, p.velocity, p.amplitude, p.phase);
                }
                false
            }
            CalibrationPhase::Done => {
                stop_from(commands, 0);
                true
            }
        }
    }
}

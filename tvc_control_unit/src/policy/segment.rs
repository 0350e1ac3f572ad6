//! Multi-segment sequence.
//!
//! Splits the experiment into K equal segments and holds segment `k`'s
//! constant (velocity, amplitude, phase) on the primary actuator while the
//! elapsed time falls inside it.

use std::time::Duration;
use tracing::{debug, info};
use tvc_common::actuator::{ActuatorCommand, ActuatorReply};

use super::{
    CommandLimits, ControlPolicy, PolicyError, apply_sinusoidal, check_duration,
    configure_resolution, stop_from,
};
use crate::clock::{Clock, MonotonicClock, Stopwatch};
use crate::sweep::{Sweep, SweepPoint};

/// Validated parallel (velocity, amplitude, phase) sequences.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentTable {
    velocity: Vec<f64>,
    amplitude: Vec<f64>,
    phase: Vec<f64>,
}

impl SegmentTable {
    /// Build a table; all sequences must be non-empty and of equal length.
    pub fn new(velocity: Vec<f64>, amplitude: Vec<f64>, phase: Vec<f64>) -> Result<Self, PolicyError> {
        if velocity.len() != amplitude.len() || amplitude.len() != phase.len() {
            return Err(PolicyError::LengthMismatch {
                velocity: velocity.len(),
                amplitude: amplitude.len(),
                phase: phase.len(),
            });
        }
        if velocity.is_empty() {
            return Err(PolicyError::EmptySequence);
        }
        Ok(Self {
            velocity,
            amplitude,
            phase,
        })
    }

    /// Number of segments.
    #[inline]
    pub fn len(&self) -> usize {
        self.velocity.len()
    }

    /// Always false for a constructed table.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.velocity.is_empty()
    }

    /// Segment `index`, clamped to the last segment.
    #[inline]
    pub fn point(&self, index: usize) -> SweepPoint {
        let i = index.min(self.len() - 1);
        SweepPoint {
            velocity: self.velocity[i],
            amplitude: self.amplitude[i],
            phase: self.phase[i],
        }
    }

    /// Segment active at `t` seconds into an experiment of `duration` seconds:
    /// `floor(t / duration * K)` clamped to `[0, K - 1]`.
    #[inline]
    pub fn index_at(&self, t: f64, duration: f64) -> usize {
        let k = self.len();
        let raw = (t / duration) * k as f64;
        if raw.is_nan() || raw <= 0.0 {
            0
        } else {
            (raw.floor() as usize).min(k - 1)
        }
    }
}

impl TryFrom<Sweep> for SegmentTable {
    type Error = PolicyError;

    fn try_from(sweep: Sweep) -> Result<Self, Self::Error> {
        Self::new(sweep.velocity, sweep.amplitude, sweep.phase)
    }
}

/// Scripted constant-segment sweep on the primary actuator.
pub struct MultiSegmentSequence<C: Clock = MonotonicClock> {
    table: SegmentTable,
    experiment_s: f64,
    limits: CommandLimits,
    clock: Stopwatch<C>,
    segment: Option<usize>,
}

impl MultiSegmentSequence<MonotonicClock> {
    /// Create a sequence timed by the process monotonic clock.
    pub fn new(table: SegmentTable, experiment: Duration) -> Result<Self, PolicyError> {
        Self::with_clock(table, experiment, MonotonicClock::new())
    }
}

impl<C: Clock> MultiSegmentSequence<C> {
    /// Create a sequence timed by `clock`.
    pub fn with_clock(table: SegmentTable, experiment: Duration, clock: C) -> Result<Self, PolicyError> {
        let experiment_s = check_duration("experiment_duration", experiment.as_secs_f64(), false)?;
        Ok(Self {
            table,
            experiment_s,
            limits: CommandLimits::SEQUENCE,
            clock: Stopwatch::new(clock),
            segment: None,
        })
    }

    /// Segment applied by the last step, if any.
    pub fn current_segment(&self) -> Option<usize> {
        self.segment
    }
}

impl<C: Clock> ControlPolicy for MultiSegmentSequence<C> {
    fn name(&self) -> &'static str {
        "multi_segment"
    }

    fn initialize(&mut self, commands: &mut [ActuatorCommand]) {
        configure_resolution(commands, false);
        self.segment = None;
        self.clock.restart();
        info!(
            "Multi-segment sequence: {} segments over {:.2}s",
            self.table.len(),
            self.experiment_s
        );
    }

    fn step(&mut self, _replies: &[ActuatorReply], commands: &mut [ActuatorCommand]) -> bool {
        let t = self.clock.elapsed_secs();
        if t >= self.experiment_s {
            stop_from(commands, 0);
            return true;
        }

        let index = self.table.index_at(t, self.experiment_s);
        if self.segment != Some(index) {
            debug!("Segment {} of {} at t={:.3}s", index + 1, self.table.len(), t);
            self.segment = Some(index);
        }

        let p = self.table.point(index);
        if let Some(primary) = commands.first_mut() {
            apply_sinusoidal(primary, &self.limits, p.velocity, p.amplitude, p.phase);
        }
        stop_from(commands, 1);
        false
    }
}

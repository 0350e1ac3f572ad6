//! Control policy root.
//!
//! A policy turns elapsed time, actuator telemetry and (for RC mapping) pilot
//! input into the command batch the scheduler dispatches each tick. All
//! variants are timed from their `initialize` call and index actuators by
//! position in the configured address list; position 0 is the primary
//! actuator.
//!
//! Every physical output passes through [`clamp_finite`] against the
//! variant's [`CommandLimits`] before it reaches a command, so NaN or
//! out-of-range inputs can never command an unbounded speed or amplitude.

pub mod calibration;
pub mod ramp;
pub mod rc_input;
pub mod segment;

use thiserror::Error;
use tvc_common::actuator::{
    ActuatorCommand, ActuatorReply, PositionResolution, QueryResolution, Resolution,
};
use tvc_common::config::ConfigError;

use crate::sweep::SweepError;

pub use calibration::CalibrationSequence;
pub use ramp::StartupRampThenHold;
pub use rc_input::RcInputMapping;
pub use segment::{MultiSegmentSequence, SegmentTable};

// ─── Errors ─────────────────────────────────────────────────────────

/// Policy construction errors.
#[derive(Debug, Clone, Error)]
pub enum PolicyError {
    /// Velocity, amplitude and phase sequences differ in length.
    #[error(
        "velocity, amplitude and phase sequences must have equal length (got {velocity}, {amplitude}, {phase})"
    )]
    LengthMismatch {
        /// Velocity sequence length.
        velocity: usize,
        /// Amplitude sequence length.
        amplitude: usize,
        /// Phase sequence length.
        phase: usize,
    },

    /// Sequence has no segments.
    #[error("sequence must contain at least one segment")]
    EmptySequence,

    /// Duration is negative, zero where forbidden, or not finite.
    #[error("{name} must be a positive finite number of seconds, got {value}")]
    InvalidDuration {
        /// Parameter name.
        name: &'static str,
        /// Offending value [s].
        value: f64,
    },

    /// Numeric parameter out of range.
    #[error("{name} out of range: {value}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },

    /// Startup ramp outlasts the experiment.
    #[error("ramp duration {ramp}s exceeds experiment duration {experiment}s")]
    RampTooLong {
        /// Ramp duration [s].
        ramp: f64,
        /// Experiment duration [s].
        experiment: f64,
    },

    /// Sweep generation failed.
    #[error(transparent)]
    Sweep(#[from] SweepError),

    /// Policy configuration is incomplete or inconsistent.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ─── Policy Trait ───────────────────────────────────────────────────

/// Command generation state machine driven once per tick.
pub trait ControlPolicy: Send {
    /// Variant identifier for logs.
    fn name(&self) -> &'static str;

    /// Minimum number of configured actuators the variant needs.
    fn min_actuators(&self) -> usize {
        1
    }

    /// Configure field precision on every command and set t = 0.
    fn initialize(&mut self, commands: &mut [ActuatorCommand]);

    /// Update `commands` in place from the latest (possibly partial) reply
    /// batch. Returns `true` once the policy's run is complete.
    fn step(&mut self, replies: &[ActuatorReply], commands: &mut [ActuatorCommand]) -> bool;
}

// ─── Output Bounds ──────────────────────────────────────────────────

/// Static bounds applied to policy outputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandLimits {
    /// Largest commanded velocity [rev/s]; the lower bound is 0.
    pub max_velocity: f64,
    /// Largest commanded oscillation amplitude; the lower bound is 0.
    pub max_amplitude: f64,
}

impl CommandLimits {
    /// Bounds for scripted sequences and ramps.
    pub const SEQUENCE: Self = Self {
        max_velocity: 100.0,
        max_amplitude: 1.0,
    };

    /// Bounds for pilot-driven RC mapping.
    pub const RC_INPUT: Self = Self {
        max_velocity: 40.0,
        max_amplitude: 0.4,
    };

    /// Clamp a velocity into `[0, max_velocity]`.
    #[inline]
    pub fn velocity(&self, v: f64) -> f64 {
        clamp_finite(v, 0.0, self.max_velocity)
    }

    /// Clamp an amplitude into `[0, max_amplitude]`.
    #[inline]
    pub fn amplitude(&self, a: f64) -> f64 {
        clamp_finite(a, 0.0, self.max_amplitude)
    }
}

/// Clamp `value` into `[lo, hi]`; NaN maps to `lo`.
#[inline]
pub fn clamp_finite(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() { lo } else { value.clamp(lo, hi) }
}

/// Command a bounded sinusoidal oscillation. Phase passes through.
#[inline]
pub(crate) fn apply_sinusoidal(
    command: &mut ActuatorCommand,
    limits: &CommandLimits,
    velocity: f64,
    amplitude: f64,
    phase: f64,
) {
    command.set_sinusoidal(limits.velocity(velocity), limits.amplitude(amplitude), phase);
}

/// Fraction `t / duration` of a linear ramp, clamped to `[0, 1]`.
#[inline]
pub(crate) fn ramp_fraction(t: f64, duration: f64) -> f64 {
    if duration > 0.0 {
        clamp_finite(t / duration, 0.0, 1.0)
    } else {
        1.0
    }
}

/// Validate a duration in seconds.
pub(crate) fn check_duration(
    name: &'static str,
    value: f64,
    allow_zero: bool,
) -> Result<f64, PolicyError> {
    let ok = value.is_finite() && (value > 0.0 || (allow_zero && value == 0.0));
    if ok {
        Ok(value)
    } else {
        Err(PolicyError::InvalidDuration { name, value })
    }
}

// ─── Field Precision ────────────────────────────────────────────────

/// Command precision for sinusoidal-mode policies.
pub fn sinusoidal_resolution(with_torque_limit: bool) -> PositionResolution {
    PositionResolution {
        position: Resolution::Coarse,
        velocity: Resolution::Fine,
        feedforward_torque: Resolution::Ignore,
        maximum_torque: if with_torque_limit {
            Resolution::Coarse
        } else {
            Resolution::Ignore
        },
        velocity_limit: Resolution::Ignore,
        sinusoidal_amplitude: Resolution::Coarse,
        sinusoidal_phase: Resolution::Coarse,
    }
}

/// Telemetry precision for sinusoidal-mode policies.
pub fn sinusoidal_query() -> QueryResolution {
    QueryResolution {
        mode: Resolution::Coarse,
        position: Resolution::Ignore,
        velocity: Resolution::Fine,
        torque: Resolution::Coarse,
        voltage: Resolution::Coarse,
        temperature: Resolution::Coarse,
        fault: Resolution::Coarse,
    }
}

/// Apply command and telemetry precision to every command.
pub(crate) fn configure_resolution(commands: &mut [ActuatorCommand], with_torque_limit: bool) {
    let resolution = sinusoidal_resolution(with_torque_limit);
    let query = sinusoidal_query();
    for cmd in commands.iter_mut() {
        cmd.resolution = resolution;
        cmd.query = query;
    }
}

/// Stop every actuator from `first` on.
#[inline]
pub(crate) fn stop_from(commands: &mut [ActuatorCommand], first: usize) {
    for cmd in commands.iter_mut().skip(first) {
        cmd.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_finite_bounds() {
        assert_eq!(clamp_finite(f64::NAN, 0.0, 1.0), 0.0);
        assert_eq!(clamp_finite(f64::INFINITY, 0.0, 1.0), 1.0);
        assert_eq!(clamp_finite(f64::NEG_INFINITY, 0.0, 1.0), 0.0);
        assert_eq!(clamp_finite(0.5, 0.0, 1.0), 0.5);
        assert_eq!(clamp_finite(-3.0, -1.0, 1.0), -1.0);
    }

    #[test]
    fn limits_clamp_motion_fields() {
        let l = CommandLimits::RC_INPUT;
        assert_eq!(l.velocity(55.0), 40.0);
        assert_eq!(l.velocity(-1.0), 0.0);
        assert_eq!(l.amplitude(f64::NAN), 0.0);
        assert_eq!(l.amplitude(0.2), 0.2);
    }

    #[test]
    fn apply_sinusoidal_passes_phase_through() {
        let mut cmd = ActuatorCommand::new(tvc_common::actuator::ActuatorAddress::new(1, 1));
        apply_sinusoidal(&mut cmd, &CommandLimits::RC_INPUT, f64::NAN, 9.0, 7.5);
        assert_eq!(cmd.position.velocity, 0.0);
        assert_eq!(cmd.position.sinusoidal_amplitude, 0.4);
        assert_eq!(cmd.position.sinusoidal_phase, 7.5);
        assert!(cmd.position.position.is_nan());
    }

    #[test]
    fn ramp_fraction_edges() {
        assert_eq!(ramp_fraction(0.0, 2.0), 0.0);
        assert_eq!(ramp_fraction(1.0, 2.0), 0.5);
        assert_eq!(ramp_fraction(3.0, 2.0), 1.0);
        assert_eq!(ramp_fraction(1.0, 0.0), 1.0);
    }

    #[test]
    fn check_duration_rules() {
        assert!(check_duration("d", 1.0, false).is_ok());
        assert!(check_duration("d", 0.0, true).is_ok());
        assert!(check_duration("d", 0.0, false).is_err());
        assert!(check_duration("d", -1.0, true).is_err());
        assert!(check_duration("d", f64::INFINITY, true).is_err());
    }

    #[test]
    fn resolution_presets() {
        let r = sinusoidal_resolution(true);
        assert_eq!(r.maximum_torque, Resolution::Coarse);
        assert_eq!(r.feedforward_torque, Resolution::Ignore);
        assert_eq!(sinusoidal_resolution(false).maximum_torque, Resolution::Ignore);
        assert_eq!(sinusoidal_query().position, Resolution::Ignore);
    }
}

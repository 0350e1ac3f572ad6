//! Startup ramp then hold.
//!
//! Folds the hinged rotor out gently: velocity rises linearly from zero to
//! the target over the ramp with zero amplitude and a capped torque, then the
//! configured (velocity, amplitude, phase) is held until the experiment ends.

use std::time::Duration;
use tracing::info;
use tvc_common::actuator::{ActuatorCommand, ActuatorReply};

use super::{
    CommandLimits, ControlPolicy, PolicyError, apply_sinusoidal, check_duration,
    configure_resolution, ramp_fraction, stop_from,
};
use crate::clock::{Clock, MonotonicClock, Stopwatch};
use crate::sweep::SweepPoint;

/// Default torque cap during the ramp [Nm].
pub const DEFAULT_RAMP_MAX_TORQUE: f64 = 0.5;

/// Startup ramp parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampHoldParams {
    /// Command held after the ramp.
    pub hold: SweepPoint,
    /// Ramp length.
    pub ramp: Duration,
    /// Total run length, ramp included.
    pub experiment: Duration,
    /// Torque cap during the ramp [Nm].
    pub ramp_max_torque: f64,
}

/// Ramp velocity of the actuator at `command` with zero amplitude and a torque cap.
pub(crate) fn apply_ramp(
    command: &mut ActuatorCommand,
    limits: &CommandLimits,
    target_velocity: f64,
    fraction: f64,
    max_torque: f64,
) {
    apply_sinusoidal(command, limits, target_velocity * fraction, 0.0, 0.0);
    command.position.maximum_torque = max_torque;
}

/// Gentle startup ramp followed by a constant command on the primary actuator.
pub struct StartupRampThenHold<C: Clock = MonotonicClock> {
    hold: SweepPoint,
    ramp_s: f64,
    experiment_s: f64,
    ramp_max_torque: f64,
    limits: CommandLimits,
    clock: Stopwatch<C>,
}

impl StartupRampThenHold<MonotonicClock> {
    /// Create a ramp timed by the process monotonic clock.
    pub fn new(params: RampHoldParams) -> Result<Self, PolicyError> {
        Self::with_clock(params, MonotonicClock::new())
    }
}

impl<C: Clock> StartupRampThenHold<C> {
    /// Create a ramp timed by `clock`.
    pub fn with_clock(params: RampHoldParams, clock: C) -> Result<Self, PolicyError> {
        let ramp_s = check_duration("ramp_duration", params.ramp.as_secs_f64(), true)?;
        let experiment_s =
            check_duration("experiment_duration", params.experiment.as_secs_f64(), false)?;
        if ramp_s > experiment_s {
            return Err(PolicyError::RampTooLong {
                ramp: ramp_s,
                experiment: experiment_s,
            });
        }
        let ramp_max_torque = params.ramp_max_torque;
        if !(ramp_max_torque.is_finite() && ramp_max_torque > 0.0) {
            return Err(PolicyError::InvalidParameter {
                name: "ramp_max_torque",
                value: ramp_max_torque,
            });
        }

        Ok(Self {
            hold: params.hold,
            ramp_s,
            experiment_s,
            ramp_max_torque,
            limits: CommandLimits::SEQUENCE,
            clock: Stopwatch::new(clock),
        })
    }
}

impl<C: Clock> ControlPolicy for StartupRampThenHold<C> {
    fn name(&self) -> &'static str {
        "startup_ramp"
    }

    fn initialize(&mut self, commands: &mut [ActuatorCommand]) {
        configure_resolution(commands, true);
        self.clock.restart();
        info!(
            "Startup ramp: {:.2}s to {:.2} rev/s, hold until {:.2}s",
            self.ramp_s, self.hold.velocity, self.experiment_s
        );
    }

    fn step(&mut self, _replies: &[ActuatorReply], commands: &mut [ActuatorCommand]) -> bool {
        let t = self.clock.elapsed_secs();
        if t >= self.experiment_s {
            stop_from(commands, 0);
            return true;
        }

        if let Some(primary) = commands.first_mut() {
            if t < self.ramp_s {
                apply_ramp(
                    primary,
                    &self.limits,
                    self.hold.velocity,
                    ramp_fraction(t, self.ramp_s),
                    self.ramp_max_torque,
                );
            } else {
                let h = self.hold;
                apply_sinusoidal(primary, &self.limits, h.velocity, h.amplitude, h.phase);
            }
        }
        stop_from(commands, 1);
        false
    }
}

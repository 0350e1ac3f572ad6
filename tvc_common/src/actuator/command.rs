//! Actuator command types.

use super::{ActuatorAddress, Mode, Resolution};

/// Setpoints carried by a position-family command.
///
/// `position` and the limit fields use NaN for "don't care"; zero is a valid
/// position and must never be used as a sentinel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionCommand {
    /// Target position [rev], NaN = unset.
    pub position: f64,
    /// Target velocity [rev/s].
    pub velocity: f64,
    /// Feedforward torque [Nm].
    pub feedforward_torque: f64,
    /// Torque limit [Nm], NaN = actuator default.
    pub maximum_torque: f64,
    /// Velocity limit [rev/s], NaN = actuator default.
    pub velocity_limit: f64,
    /// Oscillation amplitude.
    pub sinusoidal_amplitude: f64,
    /// Oscillation phase [rad].
    pub sinusoidal_phase: f64,
}

impl Default for PositionCommand {
    fn default() -> Self {
        Self {
            position: f64::NAN,
            velocity: 0.0,
            feedforward_torque: 0.0,
            maximum_torque: f64::NAN,
            velocity_limit: f64::NAN,
            sinusoidal_amplitude: 0.0,
            sinusoidal_phase: 0.0,
        }
    }
}

/// Transmit precision for each command field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionResolution {
    pub position: Resolution,
    pub velocity: Resolution,
    pub feedforward_torque: Resolution,
    pub maximum_torque: Resolution,
    pub velocity_limit: Resolution,
    pub sinusoidal_amplitude: Resolution,
    pub sinusoidal_phase: Resolution,
}

/// Transmit precision for each telemetry field requested back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryResolution {
    pub mode: Resolution,
    pub position: Resolution,
    pub velocity: Resolution,
    pub torque: Resolution,
    pub voltage: Resolution,
    pub temperature: Resolution,
    pub fault: Resolution,
}

impl Default for QueryResolution {
    fn default() -> Self {
        Self {
            mode: Resolution::Coarse,
            position: Resolution::Fine,
            velocity: Resolution::Fine,
            torque: Resolution::Fine,
            voltage: Resolution::Coarse,
            temperature: Resolution::Coarse,
            fault: Resolution::Coarse,
        }
    }
}

/// Desired state for one actuator, sent every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActuatorCommand {
    /// Target actuator; fixed once the command table is built.
    pub address: ActuatorAddress,
    /// Commanded mode.
    pub mode: Mode,
    /// Setpoints (ignored in `Stopped`).
    pub position: PositionCommand,
    /// Command field precision.
    pub resolution: PositionResolution,
    /// Telemetry field precision.
    pub query: QueryResolution,
}

impl ActuatorCommand {
    /// Stopped command for `address` with default precision.
    pub fn new(address: ActuatorAddress) -> Self {
        Self {
            address,
            mode: Mode::Stopped,
            position: PositionCommand::default(),
            resolution: PositionResolution::default(),
            query: QueryResolution::default(),
        }
    }

    /// Build the command table for an ordered address list.
    pub fn table(addresses: &[ActuatorAddress]) -> Vec<Self> {
        addresses.iter().copied().map(Self::new).collect()
    }

    /// Command the actuator to stop. Setpoints are left untouched.
    #[inline]
    pub fn stop(&mut self) {
        self.mode = Mode::Stopped;
    }

    /// Command a sinusoidal oscillation with no position target and the
    /// actuator's default torque limit.
    #[inline]
    pub fn set_sinusoidal(&mut self, velocity: f64, amplitude: f64, phase: f64) {
        self.mode = Mode::Sinusoidal;
        self.position.position = f64::NAN;
        self.position.maximum_torque = f64::NAN;
        self.position.velocity = velocity;
        self.position.sinusoidal_amplitude = amplitude;
        self.position.sinusoidal_phase = phase;
    }
}

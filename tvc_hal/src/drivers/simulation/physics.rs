//! Actuator physics simulator.
//!
//! First-order model of one servo actuator: velocity follows the commanded
//! velocity with a fixed time constant, position integrates velocity, and the
//! sinusoidal amplitude adds a torque ripple proportional to speed. Supply
//! voltage sags with load and winding temperature drifts toward a load
//! dependent steady state.

use std::time::Duration;
use tracing::{debug, trace};
use tvc_common::actuator::{ActuatorAddress, ActuatorCommand, ActuatorReply, Mode};

/// Velocity tracking time constant [s].
const VELOCITY_TAU_S: f64 = 0.05;
/// Rotor inertia used for the torque estimate [kg·m²·rev/rad].
const INERTIA: f64 = 0.002;
/// Nominal supply voltage [V].
const SUPPLY_VOLTAGE: f64 = 24.0;
/// Supply sag per Nm of load [V/Nm].
const VOLTAGE_SAG_PER_NM: f64 = 0.8;
/// Ambient temperature [°C].
const AMBIENT_C: f64 = 25.0;
/// Steady-state temperature rise per Nm [°C/Nm].
const HEAT_PER_NM: f64 = 12.0;
/// Thermal time constant [s].
const THERMAL_TAU_S: f64 = 30.0;

/// Physics model for one actuator.
#[derive(Debug, Clone)]
pub struct ActuatorSimulator {
    address: ActuatorAddress,
    mode: Mode,
    position: f64,
    velocity: f64,
    torque: f64,
    voltage: f64,
    temperature: f64,
    fault: u8,
}

impl ActuatorSimulator {
    /// Create a simulator at rest.
    pub fn new(address: ActuatorAddress) -> Self {
        Self {
            address,
            mode: Mode::Stopped,
            position: 0.0,
            velocity: 0.0,
            torque: 0.0,
            voltage: SUPPLY_VOLTAGE,
            temperature: AMBIENT_C,
            fault: 0,
        }
    }

    /// Simulated actuator address.
    pub fn address(&self) -> ActuatorAddress {
        self.address
    }

    /// Latch a fault. Motion commands are refused until a stop clears it.
    pub fn inject_fault(&mut self, code: u8) {
        debug!("Actuator {}: fault {} injected", self.address, code);
        self.fault = code;
        self.mode = Mode::Fault;
    }

    /// Apply one command over `dt` and return the resulting telemetry.
    pub fn update(&mut self, command: &ActuatorCommand, dt: Duration) -> ActuatorReply {
        let dt_s = dt.as_secs_f64();

        match command.mode {
            Mode::Stopped => {
                if self.fault != 0 {
                    debug!("Actuator {}: fault {} cleared", self.address, self.fault);
                }
                self.fault = 0;
                self.mode = Mode::Stopped;
            }
            Mode::Fault => {}
            mode if self.fault == 0 => self.mode = mode,
            _ => {}
        }

        let target_velocity = match self.mode {
            Mode::Sinusoidal | Mode::Position => {
                let v = command.position.velocity;
                let limit = command.position.velocity_limit;
                if limit.is_nan() { v } else { v.clamp(-limit, limit) }
            }
            Mode::Stopped | Mode::Fault => 0.0,
        };

        let alpha = if dt_s > 0.0 {
            1.0 - (-dt_s / VELOCITY_TAU_S).exp()
        } else {
            0.0
        };
        let previous = self.velocity;
        self.velocity += (target_velocity - self.velocity) * alpha;
        self.position = wrap_rev(self.position + self.velocity * dt_s);

        let accel = if dt_s > 0.0 {
            (self.velocity - previous) / dt_s
        } else {
            0.0
        };
        let ripple = if self.mode == Mode::Sinusoidal {
            command.position.sinusoidal_amplitude.abs() * self.velocity.abs() * 0.01
        } else {
            0.0
        };
        let mut torque = INERTIA * accel + ripple;
        let max_torque = command.position.maximum_torque;
        if !max_torque.is_nan() {
            torque = torque.clamp(-max_torque.abs(), max_torque.abs());
        }
        self.torque = torque;

        self.voltage = SUPPLY_VOLTAGE - VOLTAGE_SAG_PER_NM * self.torque.abs();
        let steady = AMBIENT_C + HEAT_PER_NM * self.torque.abs();
        let beta = if dt_s > 0.0 {
            1.0 - (-dt_s / THERMAL_TAU_S).exp()
        } else {
            0.0
        };
        self.temperature += (steady - self.temperature) * beta;

        trace!(
            "Actuator {}: mode={:?}, pos={:.4}, vel={:.3}, tq={:.4}",
            self.address, self.mode, self.position, self.velocity, self.torque
        );

        self.reply()
    }

    /// Current telemetry without advancing the model.
    pub fn reply(&self) -> ActuatorReply {
        ActuatorReply {
            address: self.address,
            mode: self.mode,
            position: self.position,
            velocity: self.velocity,
            torque: self.torque,
            voltage: self.voltage,
            temperature: self.temperature,
            fault: self.fault,
        }
    }
}

/// Wrap a position into [-0.5, 0.5) revolutions.
fn wrap_rev(position: f64) -> f64 {
    position - (position + 0.5).floor()
}

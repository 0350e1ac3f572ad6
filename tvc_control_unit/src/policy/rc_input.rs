//! RC input mapping.
//!
//! Maps the six RC receiver channels (thrust, elevation, azimuth for two
//! rotors) to sinusoidal commands on actuators 0 and 1; a single-rotor rig
//! drives actuator 0 only. Pulse widths are
//! mapped linearly to physical units and clamped, thrust is converted to
//! rotor speed through the inverse of the fitted thrust curve
//! `thrust = a^velocity + b`, elevation to oscillation amplitude through a
//! linear coefficient, and azimuth to phase through a fixed offset.
//!
//! A throttle pulse below [`DISARM_THRESHOLD_US`] on either rotor stops all
//! actuators for that tick before anything else is evaluated.

use std::f64::consts::{FRAC_PI_2, PI};
use tracing::{debug, info};
use tvc_common::actuator::{ActuatorCommand, ActuatorReply};

use super::{CommandLimits, ControlPolicy, apply_sinusoidal, clamp_finite, configure_resolution, stop_from};
use crate::pwm::{RcChannel, RcChannels};

/// Throttle pulse width below which all actuators are stopped [µs].
pub const DISARM_THRESHOLD_US: u32 = 970;
/// Pulse width mapped to the low end of each channel [µs].
pub const PULSE_MIN_US: f64 = 1000.0;
/// Pulse width mapped to the high end of each channel [µs].
pub const PULSE_MAX_US: f64 = 2000.0;
/// Thrust at full throttle [N].
pub const MAX_THRUST: f64 = 4.0;
/// Elevation at full stick [rad] (30°).
pub const MAX_ELEVATION: f64 = 30.0 * PI / 180.0;
/// Thrust curve base `a` in `thrust = a^velocity + b`.
pub const THRUST_CURVE_A: f64 = 1.027;
/// Thrust curve offset `b` in `thrust = a^velocity + b`.
pub const THRUST_CURVE_B: f64 = -1.198;
/// Elevation per unit amplitude [deg] in `elevation = k * amplitude`.
pub const ELEVATION_PER_AMPLITUDE_DEG: f64 = 77.526;
/// Phase offset added to azimuth [rad].
pub const PHASE_OFFSET: f64 = FRAC_PI_2;

/// Rotors driven by RC mapping.
const ROTORS: usize = 2;

/// Linear map of `x` from `[in_min, in_max]` to `[out_min, out_max]`.
#[inline]
pub fn map_range(x: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

/// Rotor speed [rev/s] producing `thrust`, never negative.
#[inline]
pub fn thrust_to_velocity(thrust: f64) -> f64 {
    let v = (thrust - THRUST_CURVE_B).ln() / THRUST_CURVE_A.ln();
    if v.is_nan() { 0.0 } else { v.max(0.0) }
}

/// Oscillation amplitude producing `elevation` [rad].
#[inline]
pub fn elevation_to_amplitude(elevation: f64) -> f64 {
    elevation.to_degrees() / ELEVATION_PER_AMPLITUDE_DEG
}

/// Physical setpoint of one rotor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotorSetpoint {
    /// Thrust [N], in `[0, MAX_THRUST]`.
    pub thrust: f64,
    /// Tilt elevation [rad], in `[0, MAX_ELEVATION]`.
    pub elevation: f64,
    /// Tilt azimuth [rad], in `[-π, π]`.
    pub azimuth: f64,
}

impl RotorSetpoint {
    /// Decode three pulse widths [µs] into clamped physical units.
    pub fn from_pulses(thrust_us: u32, elevation_us: u32, azimuth_us: u32) -> Self {
        let map = |w: u32, lo: f64, hi: f64| {
            clamp_finite(map_range(w as f64, PULSE_MIN_US, PULSE_MAX_US, lo, hi), lo, hi)
        };
        Self {
            thrust: map(thrust_us, 0.0, MAX_THRUST),
            elevation: map(elevation_us, 0.0, MAX_ELEVATION),
            azimuth: map(azimuth_us, -PI, PI),
        }
    }
}

/// Pilot-driven sinusoidal control of one or two rotors.
pub struct RcInputMapping {
    channels: RcChannels,
    limits: CommandLimits,
    armed: bool,
}

impl RcInputMapping {
    /// Map the given receiver channels.
    pub fn new(channels: RcChannels) -> Self {
        Self {
            channels,
            limits: CommandLimits::RC_INPUT,
            armed: false,
        }
    }

    /// Whether the last step was armed.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    fn set_armed(&mut self, armed: bool) {
        if armed != self.armed {
            debug!("RC input {}", if armed { "armed" } else { "disarmed" });
            self.armed = armed;
        }
    }
}

impl ControlPolicy for RcInputMapping {
    fn name(&self) -> &'static str {
        "rc_input"
    }

    fn initialize(&mut self, commands: &mut [ActuatorCommand]) {
        configure_resolution(commands, false);
        self.armed = false;
        info!("RC input mapping on {} actuator(s)", commands.len().min(ROTORS));
    }

    fn step(&mut self, _replies: &[ActuatorReply], commands: &mut [ActuatorCommand]) -> bool {
        let w = self.channels.widths();
        let thrust = [RcChannel::Thrust1, RcChannel::Thrust2];

        if thrust.iter().any(|&c| w[c as usize] < DISARM_THRESHOLD_US) {
            stop_from(commands, 0);
            self.set_armed(false);
            return false;
        }
        self.set_armed(true);

        let rotors = [
            (RcChannel::Thrust1, RcChannel::Elevation1, RcChannel::Azimuth1),
            (RcChannel::Thrust2, RcChannel::Elevation2, RcChannel::Azimuth2),
        ];
        for (command, (t, e, a)) in commands.iter_mut().zip(rotors) {
            let sp = RotorSetpoint::from_pulses(w[t as usize], w[e as usize], w[a as usize]);
            apply_sinusoidal(
                command,
                &self.limits,
                thrust_to_velocity(sp.thrust),
                elevation_to_amplitude(sp.elevation),
                sp.azimuth + PHASE_OFFSET,
            );
        }
        stop_from(commands, ROTORS);
        false
    }
}

//! Actuator telemetry.

use super::{ActuatorAddress, Mode};

/// Telemetry snapshot returned by one actuator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActuatorReply {
    /// Responding actuator.
    pub address: ActuatorAddress,
    /// Mode reported by the actuator.
    pub mode: Mode,
    /// Position [rev].
    pub position: f64,
    /// Velocity [rev/s].
    pub velocity: f64,
    /// Torque [Nm].
    pub torque: f64,
    /// Bus voltage [V].
    pub voltage: f64,
    /// Temperature [°C].
    pub temperature: f64,
    /// Fault code (0 = none).
    pub fault: u8,
}

impl ActuatorReply {
    /// Empty reply slot for `address`.
    pub fn new(address: ActuatorAddress) -> Self {
        Self {
            address,
            mode: Mode::Stopped,
            position: 0.0,
            velocity: 0.0,
            torque: 0.0,
            voltage: 0.0,
            temperature: 0.0,
            fault: 0,
        }
    }
}

/// Find the reply for `address` in a possibly partial reply batch.
///
/// A missing entry means no new telemetry for that actuator this tick.
pub fn find_reply(replies: &[ActuatorReply], address: ActuatorAddress) -> Option<&ActuatorReply> {
    replies.iter().find(|r| r.address == address)
}

//! Actuator data model.
//!
//! One servo actuator is addressed by an `(id, bus)` pair. The scheduler keeps
//! one [`ActuatorCommand`] and at most one [`ActuatorReply`] per configured
//! address; the order of the configured address list is the index mapping used
//! by every control policy for the lifetime of a run.

pub mod command;
pub mod reply;

use serde::{Deserialize, Serialize};

pub use command::{ActuatorCommand, PositionCommand, PositionResolution, QueryResolution};
pub use reply::{ActuatorReply, find_reply};

/// Bus address of one actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActuatorAddress {
    /// Actuator id on its bus segment.
    pub id: u8,
    /// Bus segment the actuator is attached to.
    pub bus: u8,
}

impl ActuatorAddress {
    /// Create an address.
    pub const fn new(id: u8, bus: u8) -> Self {
        Self { id, bus }
    }
}

impl std::fmt::Display for ActuatorAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.id, self.bus)
    }
}

/// Actuator control mode.
///
/// `Fault` is only ever reported by an actuator, never commanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Mode {
    /// Output stage disabled; also clears latched faults.
    #[default]
    Stopped = 0,
    /// Actuator latched a fault (reported only).
    Fault = 1,
    /// Position/velocity hold.
    Position = 10,
    /// Velocity with a superimposed sinusoidal oscillation.
    Sinusoidal = 16,
}

impl Mode {
    /// Numeric mode code as carried on the wire.
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Whether this mode produces motion.
    #[inline]
    pub const fn is_motion(self) -> bool {
        matches!(self, Mode::Position | Mode::Sinusoidal)
    }
}

/// Per-field transmit precision.
///
/// Exposed to, not interpreted by, the core: the transport decides how many
/// bytes each setting costs on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Field not transmitted.
    Ignore,
    /// Low precision encoding.
    Coarse,
    /// High precision encoding.
    #[default]
    Fine,
}

//! Prelude module for common re-exports.
//!
//! `use tvc_common::prelude::*;` brings in the types most consumers need
//! without listing individual paths.

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ActuatorList, ConfigError, ConfigLoader, SharedConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{MAX_ACTUATORS, PWM_CHANNELS, STARTUP_STOP_CYCLES};

// ─── Actuators ──────────────────────────────────────────────────────
pub use crate::actuator::{
    ActuatorAddress, ActuatorCommand, ActuatorReply, Mode, PositionCommand, PositionResolution,
    QueryResolution, Resolution, find_reply,
};

// ─── Bus ────────────────────────────────────────────────────────────
pub use crate::bus::{
    BusError, BusFrame, BusTransport, DispatchOutput, DispatchPromise, DispatchSlot,
    DispatchWaitError,
};

// ─── GPIO ───────────────────────────────────────────────────────────
pub use crate::gpio::{EdgeSink, EdgeSource, GpioError, Level};

//! System-wide constants for the TVC workspace.
//!
//! Single source of truth for numeric limits and defaults.

use static_assertions::const_assert;

/// Maximum number of actuators on one control host.
pub const MAX_ACTUATORS: usize = 8;

/// Number of PWM input channels (thrust, elevation, azimuth for two rotors).
pub const PWM_CHANNELS: usize = 6;

/// Ticks at the start of every run during which all actuators are held stopped.
///
/// Clears any latched actuator fault before motion is commanded.
pub const STARTUP_STOP_CYCLES: u64 = 5;

/// Default control period [s] (1250 Hz).
pub const DEFAULT_PERIOD_S: f64 = 0.0008;

/// Default bound on waiting for an outstanding bus dispatch [ms].
pub const DEFAULT_DISPATCH_TIMEOUT_MS: u64 = 50;

/// Default status report interval [ms].
pub const DEFAULT_STATUS_PERIOD_MS: u64 = 100;

/// Default CPU for the control loop thread.
pub const DEFAULT_MAIN_CPU: usize = 1;

/// Default CPU for the bus transport worker.
pub const DEFAULT_BUS_CPU: usize = 2;

/// Default SCHED_FIFO priority for the control loop thread.
pub const DEFAULT_RT_PRIORITY: i32 = 80;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config/rig.toml";

const_assert!(MAX_ACTUATORS <= u8::MAX as usize);
const_assert!(STARTUP_STOP_CYCLES > 0);
const_assert!(PWM_CHANNELS % 2 == 0);

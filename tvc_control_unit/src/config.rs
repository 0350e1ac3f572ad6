//! Rig configuration: TOML loading, validation and policy construction.
//!
//! ```toml
//! [shared]
//! service_name = "tvc-rig"
//!
//! [cycle]
//! period_s = 0.0008
//!
//! [[actuators]]
//! id = 1
//! bus = 3
//!
//! [policy]
//! kind = "multi_segment"
//! step_length_s = 1.5
//!
//! [policy.sweep]
//! velocity = { min = 50.0, max = 80.0, step = 5.0 }
//! amplitude = { min = 0.0, max = 0.35, step = 0.08 }
//! dual_pass = true
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tvc_common::config::{
    ActuatorList, ConfigError, ConfigLoader, SharedConfig, validate_actuators,
};
use tvc_common::consts::{
    DEFAULT_BUS_CPU, DEFAULT_DISPATCH_TIMEOUT_MS, DEFAULT_MAIN_CPU, DEFAULT_PERIOD_S,
    DEFAULT_RT_PRIORITY, DEFAULT_STATUS_PERIOD_MS, PWM_CHANNELS,
};

use crate::cycle::{SchedulerConfig, SchedulerError};
use crate::policy::ramp::{DEFAULT_RAMP_MAX_TORQUE, RampHoldParams};
use crate::policy::{
    CalibrationSequence, ControlPolicy, MultiSegmentSequence, PolicyError, RcInputMapping,
    SegmentTable, StartupRampThenHold, check_duration,
};
use crate::pwm::RcChannels;
use crate::sweep::{self, SweepPoint, SweepRange};

/// Default startup ramp length [s].
pub const DEFAULT_RAMP_DURATION_S: f64 = 1.0;

// ─── Sections ───────────────────────────────────────────────────────

/// `[cycle]` timing.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Tick period [s].
    pub period_s: f64,
    /// Bound on waiting for a pending dispatch [ms].
    pub dispatch_timeout_ms: u64,
    /// Status line interval [ms].
    pub status_period_ms: u64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            period_s: DEFAULT_PERIOD_S,
            dispatch_timeout_ms: DEFAULT_DISPATCH_TIMEOUT_MS,
            status_period_ms: DEFAULT_STATUS_PERIOD_MS,
        }
    }
}

impl CycleConfig {
    /// Scheduler timing for this section.
    pub fn scheduler_config(&self) -> Result<SchedulerConfig, SchedulerError> {
        Ok(SchedulerConfig {
            dispatch_timeout: Duration::from_millis(self.dispatch_timeout_ms),
            status_period: Duration::from_millis(self.status_period_ms),
            ..SchedulerConfig::with_period_secs(self.period_s)?
        })
    }
}

/// `[rt]` thread placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RtConfig {
    /// CPU for the control loop.
    pub main_cpu: usize,
    /// CPU for the bus transport worker.
    pub bus_cpu: usize,
    /// SCHED_FIFO priority of the control loop.
    pub priority: i32,
}

impl Default for RtConfig {
    fn default() -> Self {
        Self {
            main_cpu: DEFAULT_MAIN_CPU,
            bus_cpu: DEFAULT_BUS_CPU,
            priority: DEFAULT_RT_PRIORITY,
        }
    }
}

/// `[pwm]` GPIO pins of the six RC channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PwmPins {
    pub thrust1: u32,
    pub thrust2: u32,
    pub elevation1: u32,
    pub elevation2: u32,
    pub azimuth1: u32,
    pub azimuth2: u32,
}

impl Default for PwmPins {
    fn default() -> Self {
        Self {
            thrust1: 2,
            thrust2: 3,
            elevation1: 4,
            elevation2: 27,
            azimuth1: 6,
            azimuth2: 13,
        }
    }
}

impl PwmPins {
    /// Pins in RC channel order.
    pub fn as_array(&self) -> [u32; PWM_CHANNELS] {
        [
            self.thrust1,
            self.thrust2,
            self.elevation1,
            self.elevation2,
            self.azimuth1,
            self.azimuth2,
        ]
    }
}

/// `[telemetry]` record output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// CSV file; recording is off when unset.
    pub csv_path: Option<PathBuf>,
}

// ─── Policy Sections ────────────────────────────────────────────────

/// `[policy.sweep]` generator parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SweepConfig {
    pub velocity: SweepRange,
    pub amplitude: SweepRange,
    #[serde(default = "zero_phase")]
    pub phase: SweepRange,
    #[serde(default)]
    pub dual_pass: bool,
}

fn zero_phase() -> SweepRange {
    SweepRange::fixed(0.0)
}

/// Segment source and timing shared by the sweep-based policies.
///
/// Segments come from explicit `velocity`/`amplitude`/`phase` arrays or from
/// a `[policy.sweep]` generator, not both. The experiment lasts
/// `experiment_duration_s`, or `step_length_s` per segment.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SequenceConfig {
    pub velocity: Option<Vec<f64>>,
    pub amplitude: Option<Vec<f64>>,
    pub phase: Option<Vec<f64>>,
    pub sweep: Option<SweepConfig>,
    pub experiment_duration_s: Option<f64>,
    pub step_length_s: Option<f64>,
}

impl SequenceConfig {
    /// Build the segment table.
    pub fn table(&self) -> Result<SegmentTable, PolicyError> {
        let arrays = (&self.velocity, &self.amplitude, &self.phase);
        match (self.sweep, arrays) {
            (Some(_), (Some(_), _, _) | (_, Some(_), _) | (_, _, Some(_))) => Err(invalid(
                "policy: give either velocity/amplitude/phase arrays or [policy.sweep], not both",
            )),
            (Some(s), _) => {
                let generated = sweep::generate(&s.velocity, &s.amplitude, &s.phase, s.dual_pass)?;
                SegmentTable::try_from(generated)
            }
            (None, (Some(v), Some(a), Some(p))) => SegmentTable::new(v.clone(), a.clone(), p.clone()),
            (None, _) => Err(invalid(
                "policy: velocity, amplitude and phase arrays (or [policy.sweep]) are required",
            )),
        }
    }

    /// Experiment duration for a table of `segments` entries.
    pub fn experiment(&self, segments: usize) -> Result<Duration, PolicyError> {
        match (self.experiment_duration_s, self.step_length_s) {
            (Some(_), Some(_)) => Err(invalid(
                "policy: give either experiment_duration_s or step_length_s, not both",
            )),
            (Some(total), None) => duration("experiment_duration_s", total, false),
            (None, Some(step)) => {
                let step = check_duration("step_length_s", step, false)?;
                duration("experiment_duration_s", step * segments as f64, false)
            }
            (None, None) => Err(invalid(
                "policy: experiment_duration_s or step_length_s is required",
            )),
        }
    }
}

/// `kind = "startup_ramp"` parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RampConfig {
    pub velocity: f64,
    #[serde(default)]
    pub amplitude: f64,
    #[serde(default)]
    pub phase: f64,
    #[serde(default = "default_ramp_duration")]
    pub ramp_duration_s: f64,
    pub experiment_duration_s: f64,
    #[serde(default = "default_ramp_torque")]
    pub ramp_max_torque: f64,
}

/// `kind = "calibration"` parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CalibrationConfig {
    #[serde(flatten)]
    pub sequence: SequenceConfig,
    #[serde(default = "default_ramp_duration")]
    pub ramp_duration_s: f64,
}

fn default_ramp_duration() -> f64 {
    DEFAULT_RAMP_DURATION_S
}

fn default_ramp_torque() -> f64 {
    DEFAULT_RAMP_MAX_TORQUE
}

/// `[policy]`, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    /// Ramp to a constant command and hold it.
    StartupRamp(RampConfig),
    /// Constant segments on the primary actuator.
    MultiSegment(SequenceConfig),
    /// Pilot input from the RC receiver.
    RcInput,
    /// Ramp then segments on every actuator.
    Calibration(CalibrationConfig),
}

impl PolicyConfig {
    /// Variant identifier as written in TOML.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StartupRamp(_) => "startup_ramp",
            Self::MultiSegment(_) => "multi_segment",
            Self::RcInput => "rc_input",
            Self::Calibration(_) => "calibration",
        }
    }

    /// Whether the policy reads the RC receiver.
    pub fn uses_pwm(&self) -> bool {
        matches!(self, Self::RcInput)
    }
}

/// Construct the configured policy.
///
/// All parameter errors surface here, before any tick runs.
pub fn build_policy(
    config: &PolicyConfig,
    channels: &RcChannels,
) -> Result<Box<dyn ControlPolicy>, PolicyError> {
    Ok(match config {
        PolicyConfig::StartupRamp(r) => Box::new(StartupRampThenHold::new(RampHoldParams {
            hold: SweepPoint {
                velocity: r.velocity,
                amplitude: r.amplitude,
                phase: r.phase,
            },
            ramp: duration("ramp_duration_s", r.ramp_duration_s, true)?,
            experiment: duration("experiment_duration_s", r.experiment_duration_s, false)?,
            ramp_max_torque: r.ramp_max_torque,
        })?),
        PolicyConfig::MultiSegment(s) => {
            let table = s.table()?;
            let experiment = s.experiment(table.len())?;
            Box::new(MultiSegmentSequence::new(table, experiment)?)
        }
        PolicyConfig::RcInput => Box::new(RcInputMapping::new(channels.clone())),
        PolicyConfig::Calibration(c) => {
            let table = c.sequence.table()?;
            let experiment = c.sequence.experiment(table.len())?;
            let ramp = duration("ramp_duration_s", c.ramp_duration_s, true)?;
            Box::new(CalibrationSequence::new(table, experiment, ramp)?)
        }
    })
}

fn duration(name: &'static str, value: f64, allow_zero: bool) -> Result<Duration, PolicyError> {
    let secs = check_duration(name, value, allow_zero)?;
    Duration::try_from_secs_f64(secs).map_err(|_| PolicyError::InvalidDuration { name, value })
}

fn invalid(msg: &str) -> PolicyError {
    PolicyError::Config(ConfigError::ValidationError(msg.to_string()))
}

// ─── Rig Config ─────────────────────────────────────────────────────

/// Complete rig configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct RigConfig {
    #[serde(default)]
    pub shared: SharedConfig,
    #[serde(default)]
    pub cycle: CycleConfig,
    #[serde(default)]
    pub rt: RtConfig,
    /// Ordered actuator list; order is the command/reply index mapping.
    pub actuators: ActuatorList,
    pub policy: PolicyConfig,
    #[serde(default)]
    pub pwm: PwmPins,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl RigConfig {
    /// Load and validate a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config = <Self as ConfigLoader>::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate an in-memory TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config = <Self as ConfigLoader>::parse(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check parameter bounds, actuator list and pin assignment.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        let c = &self.cycle;
        if !(c.period_s.is_finite() && c.period_s > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "cycle.period_s must be positive, got {}",
                c.period_s
            )));
        }
        if c.dispatch_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "cycle.dispatch_timeout_ms must be positive".to_string(),
            ));
        }
        if c.status_period_ms == 0 {
            return Err(ConfigError::ValidationError(
                "cycle.status_period_ms must be positive".to_string(),
            ));
        }

        if !(1..=99).contains(&self.rt.priority) {
            return Err(ConfigError::ValidationError(format!(
                "rt.priority must be in 1..=99, got {}",
                self.rt.priority
            )));
        }

        validate_actuators(&self.actuators)?;

        let pins = self.pwm.as_array();
        for (i, pin) in pins.iter().enumerate() {
            if pins[..i].contains(pin) {
                return Err(ConfigError::ValidationError(format!(
                    "pwm pin {pin} assigned to more than one channel"
                )));
            }
        }
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

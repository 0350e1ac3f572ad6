//! Rig configuration primitives.
//!
//! Every TOML-backed configuration type gets [`ConfigLoader`] for free; the
//! control unit builds its `RigConfig` on top of the `[shared]` section and
//! the ordered actuator list defined here.
//!
//! ```rust,no_run
//! use serde::Deserialize;
//! use std::path::Path;
//! use tvc_common::config::{ActuatorList, ConfigError, ConfigLoader, SharedConfig};
//!
//! #[derive(Debug, Deserialize)]
//! struct BenchConfig {
//!     shared: SharedConfig,
//!     actuators: ActuatorList,
//! }
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = BenchConfig::load(Path::new("config/rig.toml"))?;
//!     println!("{} drives {} actuator(s)", config.shared.service_name, config.actuators.len());
//!     Ok(())
//! }
//! ```

use heapless::Vec as HVec;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::actuator::ActuatorAddress;
use crate::consts::MAX_ACTUATORS;

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// No file at the given path.
    #[error("configuration file {} not found", .0.display())]
    FileNotFound(PathBuf),

    /// File exists but could not be read.
    #[error("cannot read configuration: {0}")]
    Io(String),

    /// Invalid TOML or a field of the wrong shape.
    #[error("cannot parse configuration: {0}")]
    ParseError(String),

    /// Well-formed but out of bounds.
    #[error("invalid configuration: {0}")]
    ValidationError(String),
}

/// `[shared].log_level`, written in lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Per-tick detail.
    Trace,
    /// Periodic status lines.
    Debug,
    /// Lifecycle events.
    #[default]
    Info,
    /// Skipped cycles, lost dispatches.
    Warn,
    /// Fatal conditions only.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// `[shared]` section.
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "tvc-rig-bench-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedConfig {
    /// Default tracing level.
    pub log_level: LogLevel,
    /// Rig instance name used in log lines.
    pub service_name: String,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            service_name: String::from("tvc-rig"),
        }
    }
}

impl SharedConfig {
    /// Reject blank or whitespace-containing service names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = &self.service_name;
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(ConfigError::ValidationError(format!(
                "shared.service_name must be a non-empty token, got {name:?}"
            )));
        }
        Ok(())
    }
}

/// Ordered, bounded actuator address list.
///
/// The position of an address in this list is its command/reply index for
/// the whole run.
pub type ActuatorList = HVec<ActuatorAddress, MAX_ACTUATORS>;

/// Check an actuator list: non-empty and free of duplicate addresses.
pub fn validate_actuators(actuators: &[ActuatorAddress]) -> Result<(), ConfigError> {
    if actuators.is_empty() {
        return Err(ConfigError::ValidationError(
            "at least one actuator must be configured".to_string(),
        ));
    }
    for (i, a) in actuators.iter().enumerate() {
        if actuators[..i].contains(a) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate actuator address {a}"
            )));
        }
    }
    Ok(())
}

/// TOML loading, implemented for every deserializable type.
pub trait ConfigLoader: Sized + DeserializeOwned {
    /// Read and parse `path`.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ConfigError::FileNotFound(path.to_path_buf()))
            }
            Err(e) => Err(ConfigError::Io(format!("{}: {e}", path.display()))),
        }
    }

    /// Parse an in-memory TOML document.
    fn parse(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: DeserializeOwned> ConfigLoader for T {}

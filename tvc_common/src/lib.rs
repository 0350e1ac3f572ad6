//! TVC Common Library
//!
//! Shared types for the thrust-vectoring rig controller workspace.
//!
//! # Module Structure
//!
//! - [`actuator`] - Actuator addressing, command and reply data model
//! - [`bus`] - Bus transport contract and the one-shot dispatch slot
//! - [`gpio`] - GPIO edge contract used by PWM capture
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - System-wide constants
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use tvc_common::prelude::*;
//!
//! let address = ActuatorAddress::new(1, 3);
//! let command = ActuatorCommand::new(address);
//! assert_eq!(command.mode, Mode::Stopped);
//! ```

pub mod actuator;
pub mod bus;
pub mod config;
pub mod consts;
pub mod gpio;
pub mod prelude;

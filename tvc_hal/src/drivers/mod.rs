//! Transport and GPIO implementations.
//!
//! - [`simulation`] - Software rig for development and testing
//!
//! # Adding New Backends
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement `BusTransport` and/or `EdgeSource` from `tvc_common`
//! 3. Add export and documentation

pub mod simulation;

//! # TVC HAL Library
//!
//! Bus transport and GPIO backends implementing the contracts in
//! `tvc_common::bus` and `tvc_common::gpio`.
//!
//! # Module Structure
//!
//! - [`drivers`] - Transport and GPIO implementations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  cycle(frame, promise)  ┌──────────────────────┐
//! │  CycleScheduler  │ ──────────────────────► │  SimulatedBus        │
//! │  (control loop)  │ ◄────────────────────── │  (worker thread)     │
//! └──────────────────┘     fulfil(output)      └──────────┬───────────┘
//!          ▲                                              │
//!          │ PulseCapture::read()                         ▼
//! ┌────────┴─────────┐                         ┌──────────────────────┐
//! │  PulseCapture    │ ◄── on_edge(level,tick) │  ActuatorSimulator   │
//! │  (atomics)       │      SimulatedGpio      │  (per address)       │
//! └──────────────────┘                         └──────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod drivers;

pub use crate::drivers::simulation::{
    ActuatorSimulator, SimulatedBus, SimulatedBusConfig, SimulatedGpio,
};

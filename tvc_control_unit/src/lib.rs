//! # TVC Control Unit Library
//!
//! Real-time control core of the thrust-vectoring rig. A fixed-period loop
//! pipelines actuator bus exchanges with a pluggable control policy and
//! dispatches bounded, clamped commands every tick.
//!
//! ## Modules
//!
//! - [`cycle`]: `CycleScheduler`, tick schedule, statistics, stop flag
//! - [`policy`]: `ControlPolicy` and its variants (startup ramp, multi-segment
//!   sequence, RC input mapping, calibration)
//! - [`pwm`]: lock-free pulse width capture for the RC receiver
//! - [`sweep`]: scripted (velocity, amplitude, phase) sweep generation
//! - [`telemetry`]: per-tick record sink
//! - [`config`]: rig TOML configuration and policy construction
//! - [`rt`]: memory locking, CPU pinning, SCHED_FIFO, absolute-time sleep
//! - [`clock`]: time sources for policy timing
//!
//! ## Zero-Allocation Loop
//!
//! Command, reply and frame buffers are allocated when a run starts. The
//! loop body copies into them and never allocates.

#![deny(clippy::disallowed_types)]

pub mod clock;
pub mod config;
pub mod cycle;
pub mod policy;
pub mod pwm;
pub mod rt;
pub mod sweep;
pub mod telemetry;

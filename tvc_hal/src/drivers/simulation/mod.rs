//! Simulation backends.
//!
//! Software stand-ins for the actuator bus and the RC receiver GPIO pins, for
//! development and testing without rig hardware.

mod bus;
mod gpio;
mod physics;

pub use bus::{SimulatedBus, SimulatedBusConfig, WorkerHook};
pub use gpio::SimulatedGpio;
pub use physics::ActuatorSimulator;

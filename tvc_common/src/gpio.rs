//! GPIO edge contract.
//!
//! A GPIO backend delivers level transitions of an input pin, timestamped with
//! a free-running 32-bit microsecond tick, to an [`EdgeSink`]. Delivery happens
//! on the backend's interrupt/callback context, so sinks must be cheap,
//! lock-free and allocation-free.

use std::sync::Arc;
use thiserror::Error;

/// Pin level after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Falling edge.
    Low,
    /// Rising edge.
    High,
}

impl Level {
    /// Decode a raw level (0 = low, 1 = high). Other values (watchdog
    /// timeouts on some backends) carry no edge and map to `None`.
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Level::Low),
            1 => Some(Level::High),
            _ => None,
        }
    }
}

/// Receiver of timestamped pin transitions.
pub trait EdgeSink: Send + Sync {
    /// Called on every transition. Must not block, lock or allocate.
    fn on_edge(&self, level: Level, tick: u32);
}

/// GPIO error types.
#[derive(Debug, Clone, Error)]
pub enum GpioError {
    /// GPIO subsystem not available.
    #[error("GPIO initialization failed: {0}")]
    InitFailed(String),

    /// Pin already has a sink attached.
    #[error("pin {0} already attached")]
    PinBusy(u32),

    /// Pin has no sink attached.
    #[error("pin {0} not attached")]
    PinNotAttached(u32),
}

/// Source of edge callbacks for input pins.
pub trait EdgeSource {
    /// Route transitions on `pin` to `sink`.
    fn attach(&mut self, pin: u32, sink: Arc<dyn EdgeSink>) -> Result<(), GpioError>;

    /// Stop routing transitions on `pin`.
    fn detach(&mut self, pin: u32) -> Result<(), GpioError>;
}

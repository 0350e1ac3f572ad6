//! Simulated RC receiver pins.
//!
//! Emits one pulse per frame on every attached pin, with rise and fall edges
//! timestamped on a free-running 32-bit microsecond tick. The tick can be
//! started near its wrap point to exercise wraparound handling.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};
use tvc_common::prelude::*;

/// RC frame period [µs] (50 Hz).
const FRAME_PERIOD_US: u32 = 20_000;
/// Width emitted on pins without an explicit setting [µs].
const DEFAULT_WIDTH_US: u32 = 1_000;

struct Pins {
    sinks: HashMap<u32, Arc<dyn EdgeSink>>,
    widths: HashMap<u32, u32>,
}

/// Simulated GPIO edge source.
pub struct SimulatedGpio {
    pins: Arc<Mutex<Pins>>,
    tick: Arc<AtomicU32>,
    running: Arc<AtomicBool>,
    generator: Option<JoinHandle<()>>,
}

impl SimulatedGpio {
    /// Create a source whose tick starts at zero.
    pub fn new() -> Self {
        Self::with_start_tick(0)
    }

    /// Create a source whose tick starts at `start`.
    pub fn with_start_tick(start: u32) -> Self {
        Self {
            pins: Arc::new(Mutex::new(Pins {
                sinks: HashMap::new(),
                widths: HashMap::new(),
            })),
            tick: Arc::new(AtomicU32::new(start)),
            running: Arc::new(AtomicBool::new(false)),
            generator: None,
        }
    }

    /// Set the pulse width emitted on `pin`.
    pub fn set_width(&self, pin: u32, width_us: u32) {
        self.pins.lock().widths.insert(pin, width_us);
    }

    /// Current tick value.
    pub fn tick(&self) -> u32 {
        self.tick.load(Ordering::Relaxed)
    }

    /// Emit one pulse on `pin` synchronously.
    pub fn pulse(&self, pin: u32, width_us: u32) {
        let sink = self.pins.lock().sinks.get(&pin).cloned();
        if let Some(sink) = sink {
            emit(&*sink, &self.tick, width_us);
        }
    }

    /// Deliver a raw level report (0 low, 1 high, other = no edge) at `tick`.
    pub fn inject_raw(&self, pin: u32, raw: u8, tick: u32) {
        let Some(level) = Level::from_raw(raw) else {
            return;
        };
        let sink = self.pins.lock().sinks.get(&pin).cloned();
        if let Some(sink) = sink {
            sink.on_edge(level, tick);
        }
    }

    /// Start the background pulse generator.
    pub fn start(&mut self) -> Result<(), GpioError> {
        if self.generator.is_some() {
            return Ok(());
        }
        self.running.store(true, Ordering::SeqCst);

        let pins = Arc::clone(&self.pins);
        let tick = Arc::clone(&self.tick);
        let running = Arc::clone(&self.running);
        let handle = thread::Builder::new()
            .name("tvc-gpio-sim".into())
            .spawn(move || {
                while running.load(Ordering::SeqCst) {
                    let frame: Vec<(Arc<dyn EdgeSink>, u32)> = {
                        let pins = pins.lock();
                        pins.sinks
                            .iter()
                            .map(|(pin, sink)| {
                                let width = pins.widths.get(pin).copied().unwrap_or(DEFAULT_WIDTH_US);
                                (Arc::clone(sink), width)
                            })
                            .collect()
                    };
                    for (sink, width) in &frame {
                        emit(&**sink, &tick, *width);
                    }
                    tick.fetch_add(FRAME_PERIOD_US, Ordering::Relaxed);
                    thread::sleep(Duration::from_micros(FRAME_PERIOD_US as u64));
                }
            })
            .map_err(|e| GpioError::InitFailed(e.to_string()))?;

        self.generator = Some(handle);
        info!("Simulated GPIO generator started");
        Ok(())
    }

    /// Stop the background pulse generator.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.generator.take() {
            if handle.join().is_err() {
                warn!("Simulated GPIO generator panicked");
            }
            debug!("Simulated GPIO generator stopped");
        }
    }
}

impl Default for SimulatedGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SimulatedGpio {
    fn drop(&mut self) {
        self.stop();
    }
}

impl EdgeSource for SimulatedGpio {
    fn attach(&mut self, pin: u32, sink: Arc<dyn EdgeSink>) -> Result<(), GpioError> {
        let mut pins = self.pins.lock();
        if pins.sinks.contains_key(&pin) {
            return Err(GpioError::PinBusy(pin));
        }
        pins.sinks.insert(pin, sink);
        debug!("GPIO pin {} attached", pin);
        Ok(())
    }

    fn detach(&mut self, pin: u32) -> Result<(), GpioError> {
        match self.pins.lock().sinks.remove(&pin) {
            Some(_) => Ok(()),
            None => Err(GpioError::PinNotAttached(pin)),
        }
    }
}

/// Rise at the current tick, fall `width_us` later, advancing the tick.
fn emit(sink: &dyn EdgeSink, tick: &AtomicU32, width_us: u32) {
    let rise = tick.fetch_add(width_us, Ordering::Relaxed);
    sink.on_edge(Level::High, rise);
    sink.on_edge(Level::Low, rise.wrapping_add(width_us));
}

//! Simulated actuator bus.
//!
//! A worker thread plays the role of the bus hardware: it receives one frame
//! per control tick, advances an [`ActuatorSimulator`] per addressed
//! actuator, packs the replies of responding actuators into the leading reply
//! slots and fulfils the dispatch promise.

use super::physics::ActuatorSimulator;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tvc_common::prelude::*;

/// Upper bound on the simulated interval between two exchanges.
const MAX_STEP: Duration = Duration::from_millis(20);

/// Hook run on the worker thread before the first exchange.
pub type WorkerHook = Box<dyn FnOnce() + Send>;

/// Simulated bus configuration.
#[derive(Default)]
pub struct SimulatedBusConfig {
    /// Extra transit time added to every exchange.
    pub latency: Duration,
    /// Actuators that never answer.
    pub silent: Vec<ActuatorAddress>,
    /// Keep a copy of every exchanged command set.
    pub record_history: bool,
    /// Run on the worker thread at startup (CPU pinning, priority).
    pub worker_hook: Option<WorkerHook>,
}

impl std::fmt::Debug for SimulatedBusConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedBusConfig")
            .field("latency", &self.latency)
            .field("silent", &self.silent)
            .field("record_history", &self.record_history)
            .field("worker_hook", &self.worker_hook.is_some())
            .finish()
    }
}

struct Job {
    frame: BusFrame,
    promise: DispatchPromise,
}

/// State shared between the transport handle and its worker.
struct Shared {
    actuators: Mutex<Vec<ActuatorSimulator>>,
    silent: Mutex<Vec<ActuatorAddress>>,
    history: Mutex<Vec<Vec<ActuatorCommand>>>,
    record_history: bool,
    stalled: AtomicBool,
    exchanges: AtomicU64,
}

/// Simulated bus transport.
pub struct SimulatedBus {
    tx: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    shared: Arc<Shared>,
}

impl SimulatedBus {
    /// Spawn a simulated bus with one simulator per address.
    pub fn spawn(addresses: &[ActuatorAddress], config: SimulatedBusConfig) -> Result<Self, BusError> {
        let shared = Arc::new(Shared {
            actuators: Mutex::new(addresses.iter().copied().map(ActuatorSimulator::new).collect()),
            silent: Mutex::new(config.silent),
            history: Mutex::new(Vec::new()),
            record_history: config.record_history,
            stalled: AtomicBool::new(false),
            exchanges: AtomicU64::new(0),
        });

        let (tx, rx) = crossbeam_channel::bounded::<Job>(2);
        let worker_shared = Arc::clone(&shared);
        let latency = config.latency;
        let hook = config.worker_hook;
        let worker = thread::Builder::new()
            .name("tvc-bus-sim".into())
            .spawn(move || {
                if let Some(hook) = hook {
                    hook();
                }
                worker_loop(rx, worker_shared, latency);
            })
            .map_err(|e| BusError::InitFailed(e.to_string()))?;

        info!(
            "Simulated bus started with {} actuator(s), latency {:?}",
            addresses.len(),
            latency
        );

        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
            shared,
        })
    }

    /// Stop answering: subsequent dispatches are never fulfilled.
    pub fn set_stalled(&self, stalled: bool) {
        self.shared.stalled.store(stalled, Ordering::SeqCst);
    }

    /// Make an actuator stop or resume answering.
    pub fn set_silent(&self, address: ActuatorAddress, silent: bool) {
        let mut list = self.shared.silent.lock();
        list.retain(|a| *a != address);
        if silent {
            list.push(address);
        }
    }

    /// Latch a fault on one simulated actuator.
    pub fn inject_fault(&self, address: ActuatorAddress, code: u8) {
        if let Some(sim) = self
            .shared
            .actuators
            .lock()
            .iter_mut()
            .find(|s| s.address() == address)
        {
            sim.inject_fault(code);
        }
    }

    /// Latest telemetry of one simulated actuator.
    pub fn snapshot(&self, address: ActuatorAddress) -> Option<ActuatorReply> {
        self.shared
            .actuators
            .lock()
            .iter()
            .find(|s| s.address() == address)
            .map(ActuatorSimulator::reply)
    }

    /// Number of completed exchanges.
    pub fn exchanges(&self) -> u64 {
        self.shared.exchanges.load(Ordering::SeqCst)
    }

    /// Command sets of every exchange so far (requires `record_history`).
    pub fn history(&self) -> Vec<Vec<ActuatorCommand>> {
        self.shared.history.lock().clone()
    }
}

impl BusTransport for SimulatedBus {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn cycle(&mut self, frame: BusFrame, promise: DispatchPromise) {
        let job = Job { frame, promise };
        let rejected = match &self.tx {
            Some(tx) => match tx.try_send(job) {
                Ok(()) => return,
                Err(e) => {
                    warn!("Simulated bus rejected frame: {}", e);
                    e.into_inner()
                }
            },
            None => {
                warn!("Simulated bus already shut down, frame not exchanged");
                job
            }
        };
        // Nothing was exchanged: report an empty reply batch.
        rejected.promise.fulfil(DispatchOutput {
            frame: rejected.frame,
            reply_count: 0,
        });
    }

    fn shutdown(&mut self) -> Result<(), BusError> {
        self.tx = None;
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| BusError::ShutdownFailed("bus worker panicked".into()))?;
            debug!("Simulated bus worker joined");
        }
        Ok(())
    }
}

impl Drop for SimulatedBus {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Simulated bus shutdown: {}", e);
        }
    }
}

fn worker_loop(rx: Receiver<Job>, shared: Arc<Shared>, latency: Duration) {
    let mut last = Instant::now();

    while let Ok(Job { mut frame, promise }) = rx.recv() {
        if shared.stalled.load(Ordering::SeqCst) {
            // Promise is dropped unfulfilled.
            continue;
        }
        if !latency.is_zero() {
            thread::sleep(latency);
        }

        let now = Instant::now();
        let dt = now.duration_since(last).min(MAX_STEP);
        last = now;

        let reply_count = exchange(&shared, &mut frame, dt);
        if shared.record_history {
            shared.history.lock().push(frame.commands.clone());
        }
        shared.exchanges.fetch_add(1, Ordering::SeqCst);
        promise.fulfil(DispatchOutput { frame, reply_count });
    }
}

/// Advance every addressed simulator and pack replies of responders.
fn exchange(shared: &Shared, frame: &mut BusFrame, dt: Duration) -> usize {
    let silent = shared.silent.lock();
    let mut actuators = shared.actuators.lock();
    let mut count = 0;

    for command in &frame.commands {
        let Some(sim) = actuators.iter_mut().find(|s| s.address() == command.address) else {
            continue;
        };
        let reply = sim.update(command, dt);
        if silent.contains(&command.address) || count >= frame.replies.len() {
            continue;
        }
        frame.replies[count] = reply;
        count += 1;
    }
    count
}

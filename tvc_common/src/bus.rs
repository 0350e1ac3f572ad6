//! Bus transport contract.
//!
//! The control loop never talks to the actuator wire protocol directly. Once
//! per tick it hands a [`BusFrame`] to a [`BusTransport`] together with a
//! [`DispatchPromise`]. The transport exchanges the frame on the bus on its
//! own execution context and fulfils the promise exactly once, handing the
//! frame back along with the number of reply slots it populated.
//!
//! # Pipelining
//!
//! ```text
//! tick N-1:  step ──► cycle(frame, promise) ───────┐ (bus transit)
//! tick N:    wait(slot) ◄─────────── fulfil(output) ┘
//!            step ──► cycle(frame, promise) ──► ...
//! ```
//!
//! Only one dispatch is ever outstanding, so the [`DispatchSlot`] holds at
//! most one completion and never queues.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;
use thiserror::Error;

use crate::actuator::{ActuatorAddress, ActuatorCommand, ActuatorReply};

/// Error types for transport setup and teardown.
///
/// Errors during an individual exchange are never reported here: they show up
/// as a reply count smaller than the command count.
#[derive(Debug, Clone, Error)]
pub enum BusError {
    /// Transport initialization failed.
    #[error("Transport initialization failed: {0}")]
    InitFailed(String),

    /// Transport configuration error.
    #[error("Transport configuration error: {0}")]
    ConfigError(String),

    /// Transport shutdown failed.
    #[error("Transport shutdown failed: {0}")]
    ShutdownFailed(String),
}

/// Command and reply buffers exchanged with the transport.
///
/// Both vectors are sized to the configured actuator count when the frame is
/// built and are never resized afterwards.
#[derive(Debug, Clone)]
pub struct BusFrame {
    /// Commands to send, in configured address order.
    pub commands: Vec<ActuatorCommand>,
    /// Reply slots; the first `reply_count` entries are valid after completion.
    pub replies: Vec<ActuatorReply>,
}

impl BusFrame {
    /// Build a frame for an ordered address list.
    pub fn with_addresses(addresses: &[ActuatorAddress]) -> Self {
        Self {
            commands: ActuatorCommand::table(addresses),
            replies: addresses.iter().copied().map(ActuatorReply::new).collect(),
        }
    }

    /// Number of actuators carried by this frame.
    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// True when the frame carries no actuators.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Result of one completed dispatch.
#[derive(Debug)]
pub struct DispatchOutput {
    /// The frame handed to the transport, replies filled in.
    pub frame: BusFrame,
    /// Number of leading reply slots actually populated.
    pub reply_count: usize,
}

impl DispatchOutput {
    /// Valid replies of this dispatch.
    pub fn replies(&self) -> &[ActuatorReply] {
        let n = self.reply_count.min(self.frame.replies.len());
        &self.frame.replies[..n]
    }
}

/// Write-once completion handle for a single dispatch.
///
/// Consumed by [`fulfil`](Self::fulfil); may be sent to and fulfilled from any
/// thread.
#[derive(Debug)]
#[must_use = "a dispatch promise must be fulfilled exactly once"]
pub struct DispatchPromise {
    tx: Sender<DispatchOutput>,
}

impl DispatchPromise {
    /// Hand the dispatch result back to the control loop.
    ///
    /// Never blocks: the slot has room for exactly the one outstanding
    /// dispatch. A result that arrives after the control loop gave up on it
    /// is dropped.
    pub fn fulfil(self, output: DispatchOutput) {
        if self.tx.try_send(output).is_err() {
            tracing::trace!("dispatch completion dropped (slot full or closed)");
        }
    }
}

/// Why waiting on a dispatch did not produce a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchWaitError {
    /// No completion arrived within the wait bound.
    #[error("dispatch did not complete within {0:?}")]
    Timeout(Duration),
    /// The completion side went away.
    #[error("dispatch completion channel closed")]
    Closed,
}

/// Single-slot completion channel owned by the control loop.
///
/// The loop is the only reader. Each tick it mints one [`DispatchPromise`]
/// for the next dispatch and later takes that dispatch's result.
#[derive(Debug)]
pub struct DispatchSlot {
    tx: Sender<DispatchOutput>,
    rx: Receiver<DispatchOutput>,
}

impl DispatchSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        Self { tx, rx }
    }

    /// Mint the promise for the next dispatch.
    pub fn promise(&self) -> DispatchPromise {
        DispatchPromise {
            tx: self.tx.clone(),
        }
    }

    /// Block until the outstanding dispatch completes or `timeout` elapses.
    pub fn wait(&self, timeout: Duration) -> Result<DispatchOutput, DispatchWaitError> {
        self.rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => DispatchWaitError::Timeout(timeout),
            RecvTimeoutError::Disconnected => DispatchWaitError::Closed,
        })
    }

    /// Take a completion if one is already present.
    pub fn try_take(&self) -> Option<DispatchOutput> {
        match self.rx.try_recv() {
            Ok(output) => Some(output),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

impl Default for DispatchSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Interface for actuator bus transports.
///
/// # Contract
///
/// - `cycle()` is called at most once per control tick and must not block on
///   bus I/O.
/// - The promise is fulfilled exactly once per call, from any thread, with the
///   same frame that was passed in.
/// - `reply_count` may be smaller than the command count when actuators do not
///   answer; the populated replies are the leading slots.
pub trait BusTransport: Send {
    /// Transport identifier (e.g. "simulation").
    fn name(&self) -> &'static str;

    /// Start exchanging `frame` on the bus.
    fn cycle(&mut self, frame: BusFrame, promise: DispatchPromise);

    /// Release transport resources.
    fn shutdown(&mut self) -> Result<(), BusError> {
        Ok(())
    }
}

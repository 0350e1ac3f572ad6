//! Scheduler against the simulated actuator bus.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tvc_common::actuator::{ActuatorAddress, ActuatorCommand, ActuatorReply, Mode};
use tvc_control_unit::cycle::{CycleScheduler, ExitReason, SchedulerConfig, SchedulerError};
use tvc_control_unit::policy::ControlPolicy;
use tvc_control_unit::telemetry::{CSV_HEADER, CsvRecordSink};
use tvc_hal::{SimulatedBus, SimulatedBusConfig};

const STARTUP_STOP_TICKS: usize = 5;

fn addrs() -> Vec<ActuatorAddress> {
    vec![ActuatorAddress::new(1, 3), ActuatorAddress::new(2, 3)]
}

fn config() -> SchedulerConfig {
    SchedulerConfig {
        period: Duration::from_millis(1),
        dispatch_timeout: Duration::from_millis(100),
        status_period: Duration::from_millis(50),
    }
}

fn bus(silent: Vec<ActuatorAddress>) -> SimulatedBus {
    SimulatedBus::spawn(
        &addrs(),
        SimulatedBusConfig {
            silent,
            record_history: true,
            ..SimulatedBusConfig::default()
        },
    )
    .unwrap()
}

/// Commands a constant sinusoid on every actuator for `ticks` steps and
/// records the size of every reply batch it sees.
struct Constant {
    ticks: u64,
    seen: Arc<Mutex<Vec<usize>>>,
}

impl Constant {
    fn new(ticks: u64) -> Self {
        Self {
            ticks,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl ControlPolicy for Constant {
    fn name(&self) -> &'static str {
        "constant"
    }

    fn initialize(&mut self, _commands: &mut [ActuatorCommand]) {}

    fn step(&mut self, replies: &[ActuatorReply], commands: &mut [ActuatorCommand]) -> bool {
        let mut seen = self.seen.lock();
        seen.push(replies.len());
        if seen.len() as u64 > self.ticks {
            return true;
        }
        for cmd in commands.iter_mut() {
            cmd.set_sinusoidal(5.0, 0.1, 0.0);
        }
        false
    }
}

#[test]
fn startup_ticks_are_stopped_then_policy_commands_flow() {
    let mut sched = CycleScheduler::new(config(), &addrs(), bus(Vec::new())).unwrap();
    let mut policy = Constant::new(12);

    let report = sched.run(&mut policy).unwrap();
    assert_eq!(report.exit, ExitReason::PolicyComplete);
    assert_eq!(report.ticks, 13);

    let history = sched.transport().history();
    // 12 dispatching ticks plus the final stop.
    assert_eq!(history.len(), 13);
    for batch in &history[..STARTUP_STOP_TICKS] {
        assert!(batch.iter().all(|c| c.mode == Mode::Stopped));
    }
    for batch in &history[STARTUP_STOP_TICKS..12] {
        assert!(batch.iter().all(|c| c.mode == Mode::Sinusoidal));
    }
    assert!(history[12].iter().all(|c| c.mode == Mode::Stopped));

    // Command order follows the configured address order.
    for batch in &history {
        let order: Vec<_> = batch.iter().map(|c| c.address).collect();
        assert_eq!(order, addrs());
    }
    sched.shutdown().unwrap();
}

#[test]
fn actuators_run_after_startup() {
    let mut sched = CycleScheduler::new(config(), &addrs(), bus(Vec::new())).unwrap();
    let mut policy = Constant::new(40);
    sched.run(&mut policy).unwrap();

    // Final stop was exchanged last, so every simulator reports Stopped.
    for a in addrs() {
        assert_eq!(sched.transport().snapshot(a).unwrap().mode, Mode::Stopped);
    }
    let seen = policy.seen.lock();
    assert_eq!(seen[0], 0);
    assert!(seen[1..].iter().all(|&n| n == 2));
}

#[test]
fn silent_actuator_yields_partial_batches() {
    let silent = vec![addrs()[1]];
    let mut sched = CycleScheduler::new(config(), &addrs(), bus(silent)).unwrap();
    let mut policy = Constant::new(10);
    let report = sched.run(&mut policy).unwrap();

    assert_eq!(report.exit, ExitReason::PolicyComplete);
    let seen = policy.seen.lock();
    assert!(seen[1..].iter().all(|&n| n == 1));
}

#[test]
fn stalled_bus_stops_the_run() {
    let bus = bus(Vec::new());
    let mut sched = CycleScheduler::new(config(), &addrs(), bus).unwrap();
    sched.transport().set_stalled(true);

    let mut policy = Constant::new(1_000);
    let err = sched.run(&mut policy).unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::DispatchStalled { tick: 1, .. }
    ));
    // Only the first tick stepped; the second waited on a dispatch that never came.
    assert_eq!(policy.seen.lock().len(), 1);
}

#[test]
fn stop_flag_from_another_thread() {
    let mut sched = CycleScheduler::new(config(), &addrs(), bus(Vec::new())).unwrap();
    let stop = sched.stop_flag();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(30));
        stop.request();
    });

    let mut policy = Constant::new(u64::MAX);
    let report = sched.run(&mut policy).unwrap();
    stopper.join().unwrap();

    assert_eq!(report.exit, ExitReason::StopRequested);
    assert!(report.ticks > 0);
    let history = sched.transport().history();
    assert_eq!(history.len() as u64, report.ticks + 1);
    assert!(history.last().unwrap().iter().all(|c| c.mode == Mode::Stopped));
}

/// Blocks for `stall` inside one step, then completes after `ticks` steps.
struct Overrun {
    ticks: u64,
    slow_tick: u64,
    stall: Duration,
    taken: u64,
}

impl ControlPolicy for Overrun {
    fn name(&self) -> &'static str {
        "overrun"
    }

    fn initialize(&mut self, _commands: &mut [ActuatorCommand]) {}

    fn step(&mut self, _replies: &[ActuatorReply], commands: &mut [ActuatorCommand]) -> bool {
        if self.taken == self.slow_tick {
            std::thread::sleep(self.stall);
        }
        self.taken += 1;
        for cmd in commands.iter_mut() {
            cmd.set_sinusoidal(5.0, 0.0, 0.0);
        }
        self.taken >= self.ticks
    }
}

#[test]
fn overrunning_tick_reports_skipped_cycles() {
    let mut sched = CycleScheduler::new(config(), &addrs(), bus(Vec::new())).unwrap();
    let mut policy = Overrun {
        ticks: 20,
        slow_tick: 10,
        stall: config().period * 5 / 2,
        taken: 0,
    };

    let report = sched.run(&mut policy).unwrap();
    assert_eq!(report.exit, ExitReason::PolicyComplete);
    // Skipped boundaries are dropped, not replayed.
    assert_eq!(report.ticks, 20);
    assert_eq!(policy.taken, 20);
    assert!(report.skipped_cycles >= 2, "skipped {}", report.skipped_cycles);
    assert_eq!(sched.stats().skipped_cycles, report.skipped_cycles);
    assert_eq!(sched.transport().history().len(), 20);
}

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn telemetry_sink_receives_one_row_per_reply() {
    let buf = SharedBuf::default();
    let sink = CsvRecordSink::from_writer(buf.clone()).unwrap();
    let mut sched = CycleScheduler::new(config(), &addrs(), bus(Vec::new()))
        .unwrap()
        .with_record_sink(Box::new(sink));

    let mut policy = Constant::new(10);
    sched.run(&mut policy).unwrap();

    let text = String::from_utf8(buf.0.lock().clone()).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some(CSV_HEADER));
    // Tick 0 has no replies; ticks 1..9 dispatch with two replies each.
    let rows: Vec<_> = lines.collect();
    assert_eq!(rows.len(), 9 * 2);
    assert!(rows.iter().all(|r| r.split(',').count() == CSV_HEADER.split(',').count()));
}

#[test]
fn csv_file_is_created() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runs").join("tick.csv");
    let sink = CsvRecordSink::create(&path).unwrap();
    let mut sched = CycleScheduler::new(config(), &addrs(), bus(Vec::new()))
        .unwrap()
        .with_record_sink(Box::new(sink));
    sched.run(&mut Constant::new(3)).unwrap();
    sched.shutdown().unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with(CSV_HEADER));
    assert!(text.lines().count() > 1);
}

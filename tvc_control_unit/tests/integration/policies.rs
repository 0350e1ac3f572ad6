//! Policies driven through complete runs.

use std::time::Duration;

use tvc_common::actuator::{ActuatorAddress, ActuatorCommand, ActuatorReply, Mode};
use tvc_control_unit::clock::ManualClock;
use tvc_control_unit::cycle::{CycleScheduler, ExitReason, SchedulerConfig};
use tvc_control_unit::policy::calibration::CalibrationPhase;
use tvc_control_unit::policy::ramp::{DEFAULT_RAMP_MAX_TORQUE, RampHoldParams};
use tvc_control_unit::policy::{
    CalibrationSequence, ControlPolicy, MultiSegmentSequence, SegmentTable, StartupRampThenHold,
};
use tvc_control_unit::sweep::{self, SweepPoint, SweepRange};
use tvc_hal::{SimulatedBus, SimulatedBusConfig};

fn addrs(n: u8) -> Vec<ActuatorAddress> {
    (1..=n).map(|id| ActuatorAddress::new(id, 3)).collect()
}

fn two_segments() -> SegmentTable {
    SegmentTable::new(vec![10.0, 20.0], vec![0.1, 0.2], vec![0.0, 1.0]).unwrap()
}

/// Advances a manual clock by a fixed step before every inner step, so a
/// run of N ticks covers N * dt of policy time regardless of wall time.
struct Warp<P> {
    inner: P,
    clock: ManualClock,
    dt: Duration,
}

impl<P: ControlPolicy> ControlPolicy for Warp<P> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn min_actuators(&self) -> usize {
        self.inner.min_actuators()
    }

    fn initialize(&mut self, commands: &mut [ActuatorCommand]) {
        self.inner.initialize(commands);
    }

    fn step(&mut self, replies: &[ActuatorReply], commands: &mut [ActuatorCommand]) -> bool {
        self.clock.advance(self.dt);
        self.inner.step(replies, commands)
    }
}

fn simulated(addresses: &[ActuatorAddress]) -> CycleScheduler<SimulatedBus> {
    let bus = SimulatedBus::spawn(
        addresses,
        SimulatedBusConfig {
            record_history: true,
            ..SimulatedBusConfig::default()
        },
    )
    .unwrap();
    let config = SchedulerConfig {
        period: Duration::from_millis(1),
        ..SchedulerConfig::default()
    };
    CycleScheduler::new(config, addresses, bus).unwrap()
}

#[test]
fn two_segments_over_four_seconds() {
    let clock = ManualClock::new();
    let mut policy =
        MultiSegmentSequence::with_clock(two_segments(), Duration::from_secs(4), clock.clone())
            .unwrap();
    let mut cmds = ActuatorCommand::table(&addrs(2));
    policy.initialize(&mut cmds);

    clock.set_secs(1.0);
    assert!(!policy.step(&[], &mut cmds));
    assert_eq!(policy.current_segment(), Some(0));
    assert_eq!(cmds[0].position.velocity, 10.0);
    assert_eq!(cmds[1].mode, Mode::Stopped);

    clock.set_secs(3.0);
    assert!(!policy.step(&[], &mut cmds));
    assert_eq!(policy.current_segment(), Some(1));
    assert_eq!(cmds[0].position.velocity, 20.0);
    assert_eq!(cmds[0].position.sinusoidal_phase, 1.0);

    clock.set_secs(4.1);
    assert!(policy.step(&[], &mut cmds));
    assert!(cmds.iter().all(|c| c.mode == Mode::Stopped));
}

#[test]
fn multi_segment_run_dispatches_both_segments_in_order() {
    let clock = ManualClock::new();
    let inner =
        MultiSegmentSequence::with_clock(two_segments(), Duration::from_secs(4), clock.clone())
            .unwrap();
    let mut policy = Warp {
        inner,
        clock,
        dt: Duration::from_millis(100),
    };

    let mut sched = simulated(&addrs(2));
    let report = sched.run(&mut policy).unwrap();
    assert_eq!(report.exit, ExitReason::PolicyComplete);
    // 100 ms per tick: the step at t = 4.0 s is the 40th and reports done.
    assert_eq!(report.ticks, 40);

    let history = sched.transport().history();
    assert_eq!(history.len(), 40);
    let velocities: Vec<f64> = history[5..39]
        .iter()
        .map(|batch| batch[0].position.velocity)
        .collect();
    let switch = velocities.iter().position(|&v| v == 20.0).unwrap();
    assert!(velocities[..switch].iter().all(|&v| v == 10.0));
    assert!(velocities[switch..].iter().all(|&v| v == 20.0));
    // Secondary actuator never moves under a sequence.
    assert!(history.iter().all(|batch| batch[1].mode == Mode::Stopped));
    assert!(history[39].iter().all(|c| c.mode == Mode::Stopped));
}

#[test]
fn startup_ramp_reaches_hold_through_a_run() {
    let clock = ManualClock::new();
    let hold = SweepPoint {
        velocity: 30.0,
        amplitude: 0.2,
        phase: 0.5,
    };
    let inner = StartupRampThenHold::with_clock(
        RampHoldParams {
            hold,
            ramp: Duration::from_secs(1),
            experiment: Duration::from_secs(2),
            ramp_max_torque: DEFAULT_RAMP_MAX_TORQUE,
        },
        clock.clone(),
    )
    .unwrap();
    let mut policy = Warp {
        inner,
        clock,
        dt: Duration::from_millis(50),
    };

    let mut sched = simulated(&addrs(1));
    let report = sched.run(&mut policy).unwrap();
    assert_eq!(report.exit, ExitReason::PolicyComplete);

    let history = sched.transport().history();
    let ramp: Vec<f64> = history[5..19]
        .iter()
        .map(|batch| batch[0].position.velocity)
        .collect();
    assert!(ramp.windows(2).all(|w| w[1] > w[0]));
    assert!(ramp.iter().all(|&v| v < hold.velocity));
    assert!(history[5..19].iter().all(|b| b[0].position.maximum_torque == DEFAULT_RAMP_MAX_TORQUE));

    let held = &history[25][0];
    assert_eq!(held.mode, Mode::Sinusoidal);
    assert_eq!(held.position.velocity, 30.0);
    assert_eq!(held.position.sinusoidal_amplitude, 0.2);
    assert!(held.position.maximum_torque.is_nan());
}

#[test]
fn calibration_drives_every_actuator() {
    let table = SegmentTable::try_from(
        sweep::generate(
            &SweepRange::new(10.0, 20.0, 10.0),
            &SweepRange::fixed(0.1),
            &SweepRange::fixed(0.0),
            false,
        )
        .unwrap(),
    )
    .unwrap();
    let clock = ManualClock::new();
    let inner = CalibrationSequence::with_clock(
        table,
        Duration::from_secs(2),
        Duration::from_secs(1),
        clock.clone(),
    )
    .unwrap();
    assert_eq!(inner.total_duration(), Duration::from_secs(3));
    assert_eq!(inner.phase_at(0.5), CalibrationPhase::Ramp);
    assert_eq!(inner.phase_at(1.5), CalibrationPhase::Sweep(0));
    assert_eq!(inner.phase_at(2.5), CalibrationPhase::Sweep(1));
    assert_eq!(inner.phase_at(3.5), CalibrationPhase::Done);

    let mut policy = Warp {
        inner,
        clock,
        dt: Duration::from_millis(100),
    };
    let mut sched = simulated(&addrs(3));
    let report = sched.run(&mut policy).unwrap();
    assert_eq!(report.exit, ExitReason::PolicyComplete);

    let history = sched.transport().history();
    // Sweep segment 1 at t = 2.5 s is the 25th step.
    let batch = &history[24];
    assert!(batch.iter().all(|c| c.mode == Mode::Sinusoidal));
    assert!(batch.iter().all(|c| c.position.velocity == 20.0));
    assert!(history.last().unwrap().iter().all(|c| c.mode == Mode::Stopped));
}

#[test]
fn calibration_example_sweep_timing() {
    let s = sweep::generate(
        &SweepRange::new(50.0, 80.0, 5.0),
        &SweepRange::new(0.0, 0.35, 0.08),
        &SweepRange::fixed(0.0),
        true,
    )
    .unwrap();
    assert_eq!(s.len(), 70);

    let table = SegmentTable::try_from(s).unwrap();
    let experiment = Duration::from_secs_f64(1.5 * table.len() as f64);
    assert_eq!(experiment, Duration::from_secs(105));
    let policy = CalibrationSequence::new(table, experiment, Duration::from_secs(1)).unwrap();
    assert_eq!(policy.total_duration(), Duration::from_secs(106));
}

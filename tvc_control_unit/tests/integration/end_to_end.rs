//! Configuration file to a finished run.

use std::time::Duration;

use tvc_common::actuator::Mode;
use tvc_control_unit::config::{RigConfig, build_policy};
use tvc_control_unit::cycle::{CycleScheduler, ExitReason};
use tvc_control_unit::pwm::{RcChannel, RcChannels};
use tvc_control_unit::telemetry::CsvRecordSink;
use tvc_hal::{SimulatedBus, SimulatedBusConfig};

const SEQUENCE_RIG: &str = r#"
[shared]
service_name = "tvc-test"

[cycle]
period_s = 0.001
dispatch_timeout_ms = 200

[[actuators]]
id = 1
bus = 3

[[actuators]]
id = 2
bus = 3

[policy]
kind = "multi_segment"
velocity = [10.0, 15.0, 20.0]
amplitude = [0.0, 0.1, 0.2]
phase = [0.0, 0.0, 0.0]
experiment_duration_s = 0.06
"#;

fn spawn(config: &RigConfig) -> CycleScheduler<SimulatedBus> {
    let bus = SimulatedBus::spawn(
        &config.actuators,
        SimulatedBusConfig {
            record_history: true,
            ..SimulatedBusConfig::default()
        },
    )
    .unwrap();
    CycleScheduler::new(config.cycle.scheduler_config().unwrap(), &config.actuators, bus).unwrap()
}

#[test]
fn sequence_rig_runs_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rig.toml");
    std::fs::write(&path, SEQUENCE_RIG).unwrap();

    let config = RigConfig::from_file(&path).unwrap();
    assert_eq!(config.shared.service_name, "tvc-test");
    assert!(!config.policy.uses_pwm());

    let csv = dir.path().join("run.csv");
    let mut policy = build_policy(&config.policy, &RcChannels::new()).unwrap();
    let mut sched = spawn(&config).with_record_sink(Box::new(CsvRecordSink::create(&csv).unwrap()));

    let report = sched.run(policy.as_mut()).unwrap();
    assert_eq!(report.exit, ExitReason::PolicyComplete);
    assert!(report.ticks > 5);

    let history = sched.transport().history();
    assert_eq!(history.len() as u64, report.ticks);
    assert!(history.last().unwrap().iter().all(|c| c.mode == Mode::Stopped));
    assert!(history.iter().any(|b| b[0].mode == Mode::Sinusoidal));
    sched.shutdown().unwrap();

    let rows = std::fs::read_to_string(&csv).unwrap();
    assert!(rows.lines().count() > 1);
}

#[test]
fn stop_flag_ends_an_rc_run() {
    let config = RigConfig::from_toml_str(
        r#"
[cycle]
period_s = 0.001

[[actuators]]
id = 1
bus = 3

[[actuators]]
id = 2
bus = 3

[policy]
kind = "rc_input"
"#,
    )
    .unwrap();
    assert!(config.policy.uses_pwm());

    // No receiver pulses: the mapping stays disarmed and runs until stopped.
    let mut policy = build_policy(&config.policy, &RcChannels::new()).unwrap();
    let mut sched = spawn(&config);
    let stop = sched.stop_flag();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(25));
        stop.request();
    });

    let report = sched.run(policy.as_mut()).unwrap();
    stopper.join().unwrap();
    assert_eq!(report.exit, ExitReason::StopRequested);

    let history = sched.transport().history();
    assert!(history.iter().flatten().all(|c| c.mode == Mode::Stopped));
}

#[test]
fn rc_mapping_drives_a_single_rotor_rig() {
    let config = RigConfig::from_toml_str(
        r#"
[cycle]
period_s = 0.001

[[actuators]]
id = 1
bus = 3

[policy]
kind = "rc_input"
"#,
    )
    .unwrap();

    let channels = RcChannels::new();
    for ch in RcChannel::ALL {
        let capture = channels.capture(ch);
        capture.rising(0);
        capture.falling(1500);
    }
    let mut policy = build_policy(&config.policy, &channels).unwrap();
    let mut sched = spawn(&config);
    let stop = sched.stop_flag();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(30));
        stop.request();
    });

    let report = sched.run(policy.as_mut()).unwrap();
    stopper.join().unwrap();
    assert_eq!(report.exit, ExitReason::StopRequested);

    let history = sched.transport().history();
    assert!(history.iter().all(|b| b.len() == 1));
    assert!(history.iter().any(|b| b[0].mode == Mode::Sinusoidal));
    assert!(history.last().unwrap()[0].mode == Mode::Stopped);
}

#[test]
fn invalid_policy_parameters_fail_before_running() {
    let config = RigConfig::from_toml_str(
        r#"
[[actuators]]
id = 1
bus = 3

[policy]
kind = "startup_ramp"
velocity = 20.0
ramp_duration_s = 5.0
experiment_duration_s = 2.0
"#,
    )
    .unwrap();
    assert!(build_policy(&config.policy, &RcChannels::new()).is_err());
}

#[test]
fn shipped_rig_config_loads() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/rig.toml");
    let config = RigConfig::from_file(&path).unwrap();
    assert_eq!(config.policy.kind(), "calibration");
    assert_eq!(config.actuators.len(), 2);
    let policy = build_policy(&config.policy, &RcChannels::new()).unwrap();
    assert_eq!(policy.name(), "calibration");
}

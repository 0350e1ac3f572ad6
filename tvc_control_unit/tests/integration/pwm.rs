//! RC receiver capture behind the simulated GPIO.

use std::time::{Duration, Instant};

use tvc_common::actuator::{ActuatorAddress, ActuatorCommand, Mode};
use tvc_common::gpio::GpioError;
use tvc_control_unit::policy::rc_input::DISARM_THRESHOLD_US;
use tvc_control_unit::policy::{ControlPolicy, RcInputMapping};
use tvc_control_unit::pwm::{RcChannel, RcChannels};
use tvc_hal::SimulatedGpio;

const PINS: [u32; 6] = [2, 3, 4, 27, 6, 13];

#[test]
fn pulses_land_on_their_channels() {
    let rc = RcChannels::new();
    let mut gpio = SimulatedGpio::new();
    rc.attach(&mut gpio, PINS).unwrap();

    for (i, pin) in PINS.into_iter().enumerate() {
        gpio.pulse(pin, 1_000 + 100 * i as u32);
    }
    assert_eq!(rc.widths(), [1_000, 1_100, 1_200, 1_300, 1_400, 1_500]);
}

#[test]
fn width_survives_tick_wraparound() {
    let rc = RcChannels::new();
    let mut gpio = SimulatedGpio::with_start_tick(u32::MAX - 500);
    rc.attach(&mut gpio, PINS).unwrap();

    gpio.pulse(PINS[0], 1_500);
    assert_eq!(rc.capture(RcChannel::Thrust1).read(), 1_500);
    assert!(gpio.tick() < 1_500);

    // Rise just before the wrap, fall after it.
    gpio.inject_raw(PINS[1], 1, u32::MAX - 99);
    gpio.inject_raw(PINS[1], 0, 1_100);
    assert_eq!(rc.capture(RcChannel::Thrust2).read(), 1_200);
}

#[test]
fn non_edge_reports_are_ignored() {
    let rc = RcChannels::new();
    let mut gpio = SimulatedGpio::new();
    rc.attach(&mut gpio, PINS).unwrap();

    gpio.pulse(PINS[2], 1_700);
    gpio.inject_raw(PINS[2], 2, 50_000);
    assert_eq!(rc.capture(RcChannel::Elevation1).read(), 1_700);
}

#[test]
fn pin_cannot_be_claimed_twice() {
    let rc = RcChannels::new();
    let other = RcChannels::new();
    let mut gpio = SimulatedGpio::new();
    rc.attach(&mut gpio, PINS).unwrap();

    let err = other.attach(&mut gpio, PINS).unwrap_err();
    assert!(matches!(err, GpioError::PinBusy(2)));
}

#[test]
fn generator_arms_rc_mapping() {
    let rc = RcChannels::new();
    let mut gpio = SimulatedGpio::new();
    rc.attach(&mut gpio, PINS).unwrap();
    for pin in PINS {
        gpio.set_width(pin, 1_500);
    }

    let mut policy = RcInputMapping::new(rc.clone());
    let addrs = [ActuatorAddress::new(1, 3), ActuatorAddress::new(2, 3)];
    let mut cmds = ActuatorCommand::table(&addrs);
    policy.initialize(&mut cmds);

    // Nothing captured yet: disarmed.
    policy.step(&[], &mut cmds);
    assert!(!policy.is_armed());

    gpio.start().unwrap();
    let deadline = Instant::now() + Duration::from_secs(2);
    while rc.widths().iter().any(|&w| w != 1_500) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    policy.step(&[], &mut cmds);
    assert!(policy.is_armed());
    assert!(cmds.iter().all(|c| c.mode == Mode::Sinusoidal));

    // Throttle cut on rotor 2 disarms both.
    gpio.set_width(PINS[1], DISARM_THRESHOLD_US - 20);
    let deadline = Instant::now() + Duration::from_secs(2);
    while rc.capture(RcChannel::Thrust2).read() != DISARM_THRESHOLD_US - 20
        && Instant::now() < deadline
    {
        std::thread::sleep(Duration::from_millis(5));
    }
    policy.step(&[], &mut cmds);
    assert!(!policy.is_armed());
    assert!(cmds.iter().all(|c| c.mode == Mode::Stopped));

    gpio.stop();
}

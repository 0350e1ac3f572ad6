//! PWM pulse capture.
//!
//! Each RC receiver channel drives one GPIO pin. The GPIO backend reports
//! every level transition with a free-running 32-bit microsecond tick; a
//! [`PulseCapture`] turns the rise/fall pair into a pulse width that the
//! control loop can read at any time.
//!
//! The edge handler and the reader share two single-word atomics and nothing
//! else. A read racing an in-flight edge pair returns the previous pulse's
//! width, which RC mapping tolerates.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tvc_common::consts::PWM_CHANNELS;
use tvc_common::gpio::{EdgeSink, EdgeSource, GpioError, Level};

/// Latest capture state of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PulseSample {
    /// Tick of the latest rising edge.
    pub rise_tick: u32,
    /// Width of the latest complete pulse [ticks].
    pub width: u32,
}

/// Lock-free pulse width capture for one input pin.
#[derive(Debug, Default)]
pub struct PulseCapture {
    rise_tick: AtomicU32,
    pulse_width: AtomicU32,
}

impl PulseCapture {
    /// Capture with no pulse seen yet (width 0).
    pub const fn new() -> Self {
        Self {
            rise_tick: AtomicU32::new(0),
            pulse_width: AtomicU32::new(0),
        }
    }

    /// Record a rising edge.
    #[inline]
    pub fn rising(&self, tick: u32) {
        self.rise_tick.store(tick, Ordering::Release);
    }

    /// Record a falling edge; width is computed modulo 2^32.
    #[inline]
    pub fn falling(&self, tick: u32) {
        let rise = self.rise_tick.load(Ordering::Acquire);
        self.pulse_width
            .store(tick.wrapping_sub(rise), Ordering::Release);
    }

    /// Latest pulse width. Never blocks.
    #[inline]
    pub fn read(&self) -> u32 {
        self.pulse_width.load(Ordering::Acquire)
    }

    /// Latest rise tick and pulse width.
    pub fn sample(&self) -> PulseSample {
        PulseSample {
            rise_tick: self.rise_tick.load(Ordering::Acquire),
            width: self.pulse_width.load(Ordering::Acquire),
        }
    }
}

impl EdgeSink for PulseCapture {
    #[inline]
    fn on_edge(&self, level: Level, tick: u32) {
        match level {
            Level::High => self.rising(tick),
            Level::Low => self.falling(tick),
        }
    }
}

/// RC receiver channel roles, in pin configuration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum RcChannel {
    /// Throttle of rotor 1.
    Thrust1 = 0,
    /// Throttle of rotor 2.
    Thrust2 = 1,
    /// Tilt elevation of rotor 1.
    Elevation1 = 2,
    /// Tilt elevation of rotor 2.
    Elevation2 = 3,
    /// Tilt azimuth of rotor 1.
    Azimuth1 = 4,
    /// Tilt azimuth of rotor 2.
    Azimuth2 = 5,
}

impl RcChannel {
    /// All channels in configuration order.
    pub const ALL: [RcChannel; PWM_CHANNELS] = [
        RcChannel::Thrust1,
        RcChannel::Thrust2,
        RcChannel::Elevation1,
        RcChannel::Elevation2,
        RcChannel::Azimuth1,
        RcChannel::Azimuth2,
    ];
}

/// The six pulse captures of the RC receiver.
#[derive(Debug, Clone)]
pub struct RcChannels {
    captures: [Arc<PulseCapture>; PWM_CHANNELS],
}

impl RcChannels {
    /// Six idle captures.
    pub fn new() -> Self {
        Self {
            captures: std::array::from_fn(|_| Arc::new(PulseCapture::new())),
        }
    }

    /// Capture of one channel.
    #[inline]
    pub fn capture(&self, channel: RcChannel) -> &Arc<PulseCapture> {
        &self.captures[channel as usize]
    }

    /// Latest widths of all channels, in configuration order.
    #[inline]
    pub fn widths(&self) -> [u32; PWM_CHANNELS] {
        std::array::from_fn(|i| self.captures[i].read())
    }

    /// Route `pins[i]` to channel `i`.
    pub fn attach<S: EdgeSource>(
        &self,
        source: &mut S,
        pins: [u32; PWM_CHANNELS],
    ) -> Result<(), GpioError> {
        for (pin, capture) in pins.into_iter().zip(&self.captures) {
            let sink: Arc<dyn EdgeSink> = capture.clone();
            source.attach(pin, sink)?;
        }
        Ok(())
    }
}

impl Default for RcChannels {
    fn default() -> Self {
        Self::new()
    }
}

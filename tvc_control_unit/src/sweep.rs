//! Sweep sequence generation.
//!
//! Builds the ordered (velocity, amplitude, phase) sequence of a scripted
//! excitation run by nested enumeration: velocity outermost, then amplitude
//! ascending, then phase ascending. With the dual pass enabled, every
//! velocity block is followed by a descending amplitude block (max to min)
//! at the same velocity, so amplitude never jumps from max back to min.
//!
//! Ranges are enumerated by index, `value = min + i * step`, with
//! `floor((max - min) / step + 1e-6) + 1` points. The endpoint is included
//! when it lies within a millionth of a step of `max`; no value exceeds `max`
//! by more than that tolerance.

use serde::Deserialize;
use thiserror::Error;

/// Relative (to one step) tolerance for including the range endpoint.
pub const ENDPOINT_TOLERANCE: f64 = 1e-6;

/// Largest sweep `generate` will build, counting both passes.
pub const MAX_SWEEP_POINTS: usize = 1_000_000;

/// Sweep generation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SweepError {
    /// Step is zero, negative or not finite.
    #[error("{axis} step must be positive and finite, got {step}")]
    InvalidStep {
        /// Swept quantity.
        axis: &'static str,
        /// Offending step.
        step: f64,
    },
    /// Bounds are not finite or `max < min`.
    #[error("{axis} range [{min}, {max}] is invalid")]
    InvalidRange {
        /// Swept quantity.
        axis: &'static str,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
    /// The ranges enumerate more than [`MAX_SWEEP_POINTS`] points.
    #[error("sweep would have more than {MAX_SWEEP_POINTS} points")]
    TooManyPoints,
}

/// Inclusive range swept in fixed steps.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SweepRange {
    /// First value.
    pub min: f64,
    /// Last value (inclusive, see module docs).
    pub max: f64,
    /// Increment.
    pub step: f64,
}

impl SweepRange {
    /// Create a range.
    pub const fn new(min: f64, max: f64, step: f64) -> Self {
        Self { min, max, step }
    }

    /// Single-valued range.
    pub const fn fixed(value: f64) -> Self {
        Self::new(value, value, 1.0)
    }

    fn validate(&self, axis: &'static str) -> Result<(), SweepError> {
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(SweepError::InvalidStep {
                axis,
                step: self.step,
            });
        }
        if !(self.min.is_finite() && self.max.is_finite()) || self.max < self.min {
            return Err(SweepError::InvalidRange {
                axis,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }

    /// Number of enumerated values, saturating at `usize::MAX`.
    pub fn count(&self) -> usize {
        let steps = ((self.max - self.min) / self.step + ENDPOINT_TOLERANCE).floor();
        (steps as usize).saturating_add(1)
    }

    /// `i`-th ascending value.
    #[inline]
    pub fn ascending(&self, i: usize) -> f64 {
        self.min + i as f64 * self.step
    }

    /// `i`-th descending value, starting at `max`.
    #[inline]
    pub fn descending(&self, i: usize) -> f64 {
        (self.max - i as f64 * self.step).max(self.min)
    }
}

/// One command triple of a sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepPoint {
    /// Velocity [rev/s].
    pub velocity: f64,
    /// Oscillation amplitude.
    pub amplitude: f64,
    /// Oscillation phase [rad].
    pub phase: f64,
}

/// Generated sweep as three equal-length sequences.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sweep {
    /// Velocity per point.
    pub velocity: Vec<f64>,
    /// Amplitude per point.
    pub amplitude: Vec<f64>,
    /// Phase per point.
    pub phase: Vec<f64>,
}

impl Sweep {
    /// Number of points.
    pub fn len(&self) -> usize {
        self.velocity.len()
    }

    /// True when the sweep has no points.
    pub fn is_empty(&self) -> bool {
        self.velocity.is_empty()
    }

    /// Point at `index`.
    pub fn point(&self, index: usize) -> Option<SweepPoint> {
        Some(SweepPoint {
            velocity: *self.velocity.get(index)?,
            amplitude: *self.amplitude.get(index)?,
            phase: *self.phase.get(index)?,
        })
    }

    /// Points in generation order.
    pub fn points(&self) -> impl Iterator<Item = SweepPoint> + '_ {
        (0..self.len()).filter_map(|i| self.point(i))
    }

    fn push(&mut self, velocity: f64, amplitude: f64, phase: f64) {
        self.velocity.push(velocity);
        self.amplitude.push(amplitude);
        self.phase.push(phase);
    }
}

/// Generate a sweep.
pub fn generate(
    velocity: &SweepRange,
    amplitude: &SweepRange,
    phase: &SweepRange,
    dual_pass: bool,
) -> Result<Sweep, SweepError> {
    velocity.validate("velocity")?;
    amplitude.validate("amplitude")?;
    phase.validate("phase")?;

    let (nv, na, np) = (velocity.count(), amplitude.count(), phase.count());
    let passes: usize = if dual_pass { 2 } else { 1 };
    let capacity = nv
        .checked_mul(na)
        .and_then(|n| n.checked_mul(np))
        .and_then(|n| n.checked_mul(passes))
        .filter(|&n| n <= MAX_SWEEP_POINTS)
        .ok_or(SweepError::TooManyPoints)?;

    let mut sweep = Sweep {
        velocity: Vec::with_capacity(capacity),
        amplitude: Vec::with_capacity(capacity),
        phase: Vec::with_capacity(capacity),
    };

    for iv in 0..nv {
        let v = velocity.ascending(iv);
        for ia in 0..na {
            let a = amplitude.ascending(ia);
            for ip in 0..np {
                sweep.push(v, a, phase.ascending(ip));
            }
        }
        if dual_pass {
            for ia in 0..na {
                let a = amplitude.descending(ia);
                for ip in 0..np {
                    sweep.push(v, a, phase.ascending(ip));
                }
            }
        }
    }

    Ok(sweep)
}

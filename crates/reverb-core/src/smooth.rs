//! Zipper-free parameter transitions.
//!
//! Two granularities:
//! - [`ParameterRamp`] moves a whole [`ReverbParameters`] snapshot toward a new target,
//!   one step per audio callback.
//! - [`LinearSmoother`] moves a single gain per sample inside a callback.
//!
//! # Example
//!
//! ```
//! use reverb_core::{ParameterRamp, ReverbParameters};
//!
//! let mut ramp = ParameterRamp::new(ReverbParameters::dry(), 4);
//! ramp.retarget(ReverbParameters::default_preset());
//!
//! // Four callbacks later the target is fully exposed.
//! for _ in 0..4 {
//!     ramp.advance();
//! }
//! assert_eq!(ramp.current(), ReverbParameters::default_preset());
//! ```

use crate::params::ReverbParameters;

/// Normalised delta under which a retarget snaps instead of ramping.
const SNAP_DELTA: f32 = 1e-6;

/// Callback-granular linear ramp between parameter snapshots.
///
/// The change of any field between two consecutive [`advance`](Self::advance)
/// calls never exceeds `|target - start| / length`.
#[derive(Debug, Clone)]
pub struct ParameterRamp {
    from: ReverbParameters,
    target: ReverbParameters,
    current: ReverbParameters,
    step: u32,
    length: u32,
}

impl ParameterRamp {
    pub fn new(initial: ReverbParameters, length: u32) -> Self {
        Self {
            from: initial,
            target: initial,
            current: initial,
            step: length,
            length,
        }
    }

    /// Start a ramp from the currently exposed values toward `target`.
    ///
    /// Retargeting to the same snapshot is a no-op; retargeting to an
    /// indistinguishable one snaps without ramping.
    #[inline]
    pub fn retarget(&mut self, target: ReverbParameters) {
        if target == self.target {
            return;
        }
        self.from = self.current;
        self.target = target;

        if self.length == 0 || self.from.max_normalized_delta(&target) <= SNAP_DELTA {
            self.current = target;
            self.step = self.length;
        } else {
            self.step = 0;
        }
    }

    /// Advance one callback and return the exposed snapshot.
    #[inline]
    pub fn advance(&mut self) -> ReverbParameters {
        if self.step < self.length {
            self.step += 1;
            self.current = if self.step == self.length {
                self.target
            } else {
                self.from
                    .lerp(&self.target, self.step as f32 / self.length as f32)
            };
        }
        self.current
    }

    #[inline]
    pub fn current(&self) -> ReverbParameters {
        self.current
    }

    #[inline]
    pub fn target(&self) -> ReverbParameters {
        self.target
    }

    #[inline]
    pub fn is_ramping(&self) -> bool {
        self.step < self.length
    }

    pub fn length(&self) -> u32 {
        self.length
    }
}

/// Per-sample linear smoother for a single scalar (wet/dry level, wet gain).
#[derive(Debug, Clone)]
pub struct LinearSmoother {
    current: f32,
    target: f32,
    increment: f32,
    remaining: u32,
}

impl LinearSmoother {
    pub fn new(initial: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            increment: 0.0,
            remaining: 0,
        }
    }

    /// Glide to `target` over `samples` samples.
    #[inline]
    pub fn glide_to(&mut self, target: f32, samples: u32) {
        if (target - self.target).abs() < f32::EPSILON && self.remaining == 0 {
            return;
        }
        self.target = target;
        if samples == 0 {
            self.current = target;
            self.remaining = 0;
            self.increment = 0.0;
        } else {
            self.remaining = samples;
            self.increment = (target - self.current) / samples as f32;
        }
    }

    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.remaining > 0 {
            self.remaining -= 1;
            self.current = if self.remaining == 0 {
                self.target
            } else {
                self.current + self.increment
            };
        }
        self.current
    }

    #[inline]
    pub fn value(&self) -> f32 {
        self.current
    }

    pub fn reset(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.remaining = 0;
        self.increment = 0.0;
    }
}

//! Reverb parameter sets and their physically valid ranges.
//!
//! [`ReverbParameters`] is a `Copy` value type so the audio thread can hold and
//! interpolate snapshots without touching the heap.
//!
//! # Example
//!
//! ```
//! use reverb_core::{ReverbParameters, OutputLayout};
//!
//! // Raw output of the original 4-output model: decay, gain, density, wet
//! let params = OutputLayout::Compact.decode(&[1.8, 0.9, 0.6, 0.35]).unwrap();
//! assert_eq!(params.room_size, 0.6);
//!
//! // NaN or out-of-range fields are rejected, never clamped
//! assert!(OutputLayout::Compact.decode(&[f32::NAN, 0.9, 0.6, 0.35]).is_err());
//! ```

use crate::error::InferenceError;
use serde::{Deserialize, Serialize};

/// Number of damping bands (low, mid, high).
pub const DAMPING_BANDS: usize = 3;

/// Closed range a parameter must fall in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub min: f32,
    pub max: f32,
}

impl ParamRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// NaN is never contained.
    #[inline]
    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }

    /// NaN maps to `min`.
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            self.min
        } else {
            value.clamp(self.min, self.max)
        }
    }

    pub fn span(&self) -> f32 {
        self.max - self.min
    }
}

/// Decay (RT60) in seconds.
pub const DECAY_TIME_RANGE: ParamRange = ParamRange::new(0.0, 20.0);
/// Pre-delay in milliseconds.
pub const PRE_DELAY_RANGE: ParamRange = ParamRange::new(0.0, 200.0);
/// Shared by wet/dry, damping, room size and gain.
pub const UNIT_RANGE: ParamRange = ParamRange::new(0.0, 1.0);

/// One immutable reverb parameter snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReverbParameters {
    /// RT60 decay time in seconds.
    pub decay_time: f32,
    /// Delay before the reverb tail starts, in milliseconds.
    pub pre_delay_ms: f32,
    /// 0 = dry only, 1 = wet only.
    pub wet_dry: f32,
    /// High-frequency-style absorption per band: `[low, mid, high]`, 0 = none, 1 = maximum.
    pub damping: [f32; DAMPING_BANDS],
    /// Scales the delay network's line lengths.
    pub room_size: f32,
    /// Linear gain applied to the wet signal.
    pub gain: f32,
}

impl Default for ReverbParameters {
    fn default() -> Self {
        Self::default_preset()
    }
}

impl ReverbParameters {
    /// Neutral medium-room preset used until the first inference lands.
    pub const fn default_preset() -> Self {
        Self {
            decay_time: 1.2,
            pre_delay_ms: 12.0,
            wet_dry: 0.25,
            damping: [0.2, 0.35, 0.5],
            room_size: 0.5,
            gain: 0.8,
        }
    }

    /// Fully dry: zero wet level, zero decay.
    pub const fn dry() -> Self {
        Self {
            decay_time: 0.0,
            pre_delay_ms: 0.0,
            wet_dry: 0.0,
            damping: [0.0; DAMPING_BANDS],
            room_size: 0.0,
            gain: 0.0,
        }
    }

    /// Every field must be finite and inside its declared range.
    pub fn validate(&self) -> Result<(), InferenceError> {
        check("decay_time", self.decay_time, DECAY_TIME_RANGE)?;
        check("pre_delay_ms", self.pre_delay_ms, PRE_DELAY_RANGE)?;
        check("wet_dry", self.wet_dry, UNIT_RANGE)?;
        for (band, &d) in self.damping.iter().enumerate() {
            check(BAND_NAMES[band], d, UNIT_RANGE)?;
        }
        check("room_size", self.room_size, UNIT_RANGE)?;
        check("gain", self.gain, UNIT_RANGE)?;
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Forces every field into range. Used for user overrides, never for model output.
    pub fn clamped(&self) -> Self {
        Self {
            decay_time: DECAY_TIME_RANGE.clamp(self.decay_time),
            pre_delay_ms: PRE_DELAY_RANGE.clamp(self.pre_delay_ms),
            wet_dry: UNIT_RANGE.clamp(self.wet_dry),
            damping: self.damping.map(|d| UNIT_RANGE.clamp(d)),
            room_size: UNIT_RANGE.clamp(self.room_size),
            gain: UNIT_RANGE.clamp(self.gain),
        }
    }

    /// Linear interpolation, `t` in 0..=1.
    #[inline]
    pub fn lerp(&self, to: &Self, t: f32) -> Self {
        let mix = |a: f32, b: f32| a + (b - a) * t;
        Self {
            decay_time: mix(self.decay_time, to.decay_time),
            pre_delay_ms: mix(self.pre_delay_ms, to.pre_delay_ms),
            wet_dry: mix(self.wet_dry, to.wet_dry),
            damping: [
                mix(self.damping[0], to.damping[0]),
                mix(self.damping[1], to.damping[1]),
                mix(self.damping[2], to.damping[2]),
            ],
            room_size: mix(self.room_size, to.room_size),
            gain: mix(self.gain, to.gain),
        }
    }

    /// Largest change of any field, each normalised by its range span.
    #[inline]
    pub fn max_normalized_delta(&self, other: &Self) -> f32 {
        let mut max = 0.0f32;
        let mut track = |a: f32, b: f32, range: ParamRange| {
            max = max.max((a - b).abs() / range.span());
        };
        track(self.decay_time, other.decay_time, DECAY_TIME_RANGE);
        track(self.pre_delay_ms, other.pre_delay_ms, PRE_DELAY_RANGE);
        track(self.wet_dry, other.wet_dry, UNIT_RANGE);
        for band in 0..DAMPING_BANDS {
            track(self.damping[band], other.damping[band], UNIT_RANGE);
        }
        track(self.room_size, other.room_size, UNIT_RANGE);
        track(self.gain, other.gain, UNIT_RANGE);
        max
    }

    /// Flattened in the full output layout order.
    pub fn to_array(&self) -> [f32; FULL_OUTPUTS] {
        [
            self.decay_time,
            self.pre_delay_ms,
            self.wet_dry,
            self.damping[0],
            self.damping[1],
            self.damping[2],
            self.room_size,
            self.gain,
        ]
    }
}

const BAND_NAMES: [&str; DAMPING_BANDS] = ["damping_low", "damping_mid", "damping_high"];

fn check(name: &str, value: f32, range: ParamRange) -> Result<(), InferenceError> {
    if range.contains(value) {
        Ok(())
    } else {
        Err(InferenceError::InvalidParameters(format!(
            "{name} = {value} outside [{}, {}]",
            range.min, range.max
        )))
    }
}

const COMPACT_OUTPUTS: usize = 4;
const FULL_OUTPUTS: usize = 8;

/// How a model's flat output tensor maps onto [`ReverbParameters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    /// `[decay_time, gain, density, wet_level]`. Density drives room size;
    /// pre-delay and damping come from the default preset.
    Compact,
    /// `[decay_time, pre_delay_ms, wet_dry, damp_low, damp_mid, damp_high, room_size, gain]`
    Full,
}

impl OutputLayout {
    pub fn from_output_len(len: usize) -> Option<Self> {
        match len {
            COMPACT_OUTPUTS => Some(Self::Compact),
            FULL_OUTPUTS => Some(Self::Full),
            _ => None,
        }
    }

    pub fn output_len(&self) -> usize {
        match self {
            Self::Compact => COMPACT_OUTPUTS,
            Self::Full => FULL_OUTPUTS,
        }
    }

    /// Decode and validate. Out-of-range values are an error, not clamped.
    pub fn decode(&self, raw: &[f32]) -> Result<ReverbParameters, InferenceError> {
        if raw.len() != self.output_len() {
            return Err(InferenceError::MalformedOutput {
                expected: self.output_len(),
                actual: raw.len(),
            });
        }

        let params = match self {
            Self::Compact => {
                let preset = ReverbParameters::default_preset();
                ReverbParameters {
                    decay_time: raw[0],
                    gain: raw[1],
                    room_size: raw[2],
                    wet_dry: raw[3],
                    pre_delay_ms: preset.pre_delay_ms,
                    damping: preset.damping,
                }
            }
            Self::Full => ReverbParameters {
                decay_time: raw[0],
                pre_delay_ms: raw[1],
                wet_dry: raw[2],
                damping: [raw[3], raw[4], raw[5]],
                room_size: raw[6],
                gain: raw[7],
            },
        };

        params.validate()?;
        Ok(params)
    }
}

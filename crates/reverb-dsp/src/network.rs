//! Parametric reverb network: pre-delay, damped feedback combs, allpass diffusion.
//!
//! ```text
//! input → pre-delay → ×INPUT_GAIN → [8 parallel combs] → Σ → [4 series allpasses] → wet
//!                                       ↑         │
//!                                       └─ g · mid · low-shelf · high-shelf ─┘
//! ```
//!
//! Comb and allpass tunings are the Freeverb set at 44.1 kHz, rescaled to the
//! session rate. Odd channels get the Freeverb stereo spread offset.
//!
//! Every stage in the comb feedback path has magnitude ≤ 1 at all frequencies and
//! `g < 1`, so the loop is stable for any valid [`ReverbParameters`].

use reverb_core::ReverbParameters;
use std::f32::consts::TAU;

pub const COMB_TUNINGS_44K: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];
pub const ALLPASS_TUNINGS_44K: [usize; 4] = [556, 441, 341, 225];
pub const STEREO_SPREAD_44K: usize = 23;

const REFERENCE_RATE: f32 = 44100.0;
const ALLPASS_FEEDBACK: f32 = 0.5;
/// Keeps the comb sum in range (Freeverb's fixed input gain).
pub const INPUT_GAIN: f32 = 0.015;
/// Makes up the input gain on the wet output.
pub const WET_SCALE: f32 = 3.0;
/// Upper bound on comb feedback, whatever the decay time.
const MAX_FEEDBACK: f32 = 0.98;
/// Maximum per-band attenuation at damping = 1.
const DAMPING_SCALE: f32 = 0.4;
const LOW_CROSSOVER_HZ: f32 = 250.0;
const HIGH_CROSSOVER_HZ: f32 = 4000.0;
const ROOM_SCALE_MIN: f32 = 0.5;
const ROOM_SCALE_MAX: f32 = 1.5;
pub const MAX_PRE_DELAY_MS: f32 = 200.0;

#[inline]
fn scale_to_rate(samples: usize, sample_rate: f32) -> usize {
    ((samples as f32 * sample_rate / REFERENCE_RATE).round() as usize).max(1)
}

#[inline]
fn room_scale(room_size: f32) -> f32 {
    ROOM_SCALE_MIN + (ROOM_SCALE_MAX - ROOM_SCALE_MIN) * room_size
}

/// Comb feedback for an RT60 of `decay_time` seconds: `10^(-3 · delay / rt60)`.
#[inline]
pub fn comb_feedback(delay_samples: usize, sample_rate: f32, decay_time: f32) -> f32 {
    if decay_time <= 1e-3 {
        return 0.0;
    }
    let delay_s = delay_samples as f32 / sample_rate;
    10f32.powf(-3.0 * delay_s / decay_time).min(MAX_FEEDBACK)
}

#[inline]
fn flush_denormal(x: f32) -> f32 {
    if x.abs() < 1e-20 {
        0.0
    } else {
        x
    }
}

/// Pre-allocated circular delay line with a movable read tap.
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    pos: usize,
}

impl DelayLine {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity.max(1)],
            pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Sample written `delay` writes ago. `delay` is clamped to `1..=capacity`.
    #[inline]
    pub fn read(&self, delay: usize) -> f32 {
        let cap = self.buffer.len();
        let delay = delay.clamp(1, cap);
        self.buffer[(self.pos + cap - delay) % cap]
    }

    #[inline]
    pub fn write(&mut self, value: f32) {
        self.buffer[self.pos] = value;
        self.pos += 1;
        if self.pos == self.buffer.len() {
            self.pos = 0;
        }
    }

    /// Delay by `delay` samples; 0 passes straight through.
    #[inline]
    pub fn process(&mut self, input: f32, delay: usize) -> f32 {
        let out = if delay == 0 { input } else { self.read(delay) };
        self.write(input);
        out
    }

    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.pos = 0;
    }
}

/// One-pole lowpass, `y += a (x - y)`.
#[derive(Debug, Clone, Copy, Default)]
struct OnePole {
    state: f32,
}

impl OnePole {
    #[inline]
    fn process(&mut self, input: f32, coeff: f32) -> f32 {
        self.state = flush_denormal(self.state + coeff * (input - self.state));
        self.state
    }
}

fn one_pole_coeff(cutoff_hz: f32, sample_rate: f32) -> f32 {
    1.0 - (-TAU * cutoff_hz / sample_rate).exp()
}

/// Fixed crossover coefficients for a session sample rate.
#[derive(Debug, Clone, Copy)]
pub struct Crossovers {
    low: f32,
    high: f32,
}

impl Crossovers {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            low: one_pole_coeff(LOW_CROSSOVER_HZ, sample_rate),
            high: one_pole_coeff(HIGH_CROSSOVER_HZ, sample_rate),
        }
    }
}

/// Per-band damping gains in the comb loop.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BandDamping {
    /// Broadband factor applied to every band.
    pub mid: f32,
    /// Low-shelf cut depth, 0..=1.
    pub low_cut: f32,
    /// High-shelf cut depth, 0..=1.
    pub high_cut: f32,
}

impl BandDamping {
    pub fn from_damping(damping: [f32; 3]) -> Self {
        Self {
            mid: 1.0 - DAMPING_SCALE * damping[1],
            low_cut: DAMPING_SCALE * damping[0],
            high_cut: DAMPING_SCALE * damping[2],
        }
    }
}

/// Feedback comb with a three-band damping loop.
#[derive(Debug, Clone)]
struct DampedComb {
    line: DelayLine,
    base_delay: usize,
    delay: usize,
    feedback: f32,
    low: OnePole,
    high: OnePole,
}

impl DampedComb {
    fn new(base_delay: usize) -> Self {
        let capacity = (base_delay as f32 * ROOM_SCALE_MAX).ceil() as usize + 1;
        Self {
            line: DelayLine::new(capacity),
            base_delay,
            delay: base_delay,
            feedback: 0.0,
            low: OnePole::default(),
            high: OnePole::default(),
        }
    }

    #[inline]
    fn process(&mut self, input: f32, damping: &BandDamping, xo: &Crossovers) -> f32 {
        let out = self.line.read(self.delay);
        // high shelf: (1 - c) x + c LP(x); low shelf: x - c LP(x)
        let lp_high = self.high.process(out, xo.high);
        let shelved = out - damping.high_cut * (out - lp_high);
        let lp_low = self.low.process(shelved, xo.low);
        let shelved = shelved - damping.low_cut * lp_low;
        self.line
            .write(flush_denormal(input + shelved * damping.mid * self.feedback));
        out
    }

    fn clear(&mut self) {
        self.line.clear();
        self.low = OnePole::default();
        self.high = OnePole::default();
    }
}

/// Freeverb-style Schroeder allpass.
#[derive(Debug, Clone)]
struct Allpass {
    line: DelayLine,
    delay: usize,
}

impl Allpass {
    fn new(delay: usize) -> Self {
        Self {
            line: DelayLine::new(delay),
            delay,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let buffered = self.line.read(self.delay);
        self.line.write(flush_denormal(input + buffered * ALLPASS_FEEDBACK));
        buffered - input
    }

    fn clear(&mut self) {
        self.line.clear();
    }
}

/// Per-channel reverb tank: pre-delay, comb bank and diffusion chain.
#[derive(Debug, Clone)]
pub struct ReverbTank {
    sample_rate: f32,
    pre_delay: DelayLine,
    pre_delay_samples: usize,
    combs: [DampedComb; 8],
    allpasses: [Allpass; 4],
    damping: BandDamping,
    crossovers: Crossovers,
}

impl ReverbTank {
    /// Allocates every buffer for the largest room and longest pre-delay.
    pub fn new(sample_rate: f32, channel_index: usize) -> Self {
        let spread = if channel_index % 2 == 1 {
            STEREO_SPREAD_44K
        } else {
            0
        };
        let max_pre_delay = (MAX_PRE_DELAY_MS * 0.001 * sample_rate).ceil() as usize + 1;
        let mut tank = Self {
            sample_rate,
            pre_delay: DelayLine::new(max_pre_delay),
            pre_delay_samples: 0,
            combs: std::array::from_fn(|i| {
                DampedComb::new(scale_to_rate(COMB_TUNINGS_44K[i] + spread, sample_rate))
            }),
            allpasses: std::array::from_fn(|i| {
                Allpass::new(scale_to_rate(ALLPASS_TUNINGS_44K[i] + spread, sample_rate))
            }),
            damping: BandDamping::default(),
            crossovers: Crossovers::new(sample_rate),
        };
        tank.set_parameters(&ReverbParameters::default_preset());
        tank
    }

    /// Recompute delay lengths and loop gains. Bounded cost, no allocation.
    pub fn set_parameters(&mut self, params: &ReverbParameters) {
        let scale = room_scale(params.room_size);
        for comb in &mut self.combs {
            comb.delay = ((comb.base_delay as f32 * scale).round() as usize)
                .clamp(1, comb.line.capacity());
            comb.feedback = comb_feedback(comb.delay, self.sample_rate, params.decay_time);
        }
        self.damping = BandDamping::from_damping(params.damping);
        self.pre_delay_samples = ((params.pre_delay_ms * 0.001 * self.sample_rate).round()
            as usize)
            .min(self.pre_delay.capacity());
    }

    /// One sample in, one wet sample out (before wet gain).
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let delayed = self.pre_delay.process(input, self.pre_delay_samples) * INPUT_GAIN;
        let mut sum = 0.0;
        for comb in &mut self.combs {
            sum += comb.process(delayed, &self.damping, &self.crossovers);
        }
        let mut out = sum;
        for allpass in &mut self.allpasses {
            out = allpass.process(out);
        }
        out
    }

    pub fn clear(&mut self) {
        self.pre_delay.clear();
        self.combs.iter_mut().for_each(DampedComb::clear);
        self.allpasses.iter_mut().for_each(Allpass::clear);
    }

    pub fn pre_delay_samples(&self) -> usize {
        self.pre_delay_samples
    }

    pub fn feedback(&self) -> [f32; 8] {
        std::array::from_fn(|i| self.combs[i].feedback)
    }

    pub fn comb_delays(&self) -> [usize; 8] {
        std::array::from_fn(|i| self.combs[i].delay)
    }
}

//! Real-time reverb renderer.
//!
//! Per callback:
//! 1. read the (possibly mid-ramp) parameters from the store
//! 2. refresh network coefficients if they moved past the hysteresis
//! 3. run the network and mix wet with dry
//!
//! Nothing here logs, locks or allocates once [`configure`](EffectSlot::configure)
//! has run. Anomalies are counted in [`RenderStats`].

use crate::error::{Error, Result};
use crate::network::{ReverbTank, WET_SCALE};
use crate::slot::EffectSlot;

use reverb_core::{AtomicCounter, LinearSmoother, ParameterReader, ReverbParameters};
use serde::Serialize;
use std::sync::Arc;

const MAX_CHANNELS: usize = 32;
const MAX_BLOCK: usize = 8192;

/// Render-side counters, readable from any thread.
#[derive(Debug, Default)]
pub struct RenderStats {
    pub blocks_rendered: AtomicCounter,
    /// Blocks rendered before any inferred parameters arrived.
    pub default_preset_blocks: AtomicCounter,
    pub coefficient_updates: AtomicCounter,
    /// Channel count, sample rate or unconfigured-slot mismatches.
    pub format_mismatches: AtomicCounter,
    /// Blocks containing NaN/inf input samples (replaced by silence).
    pub non_finite_blocks: AtomicCounter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RenderStatsSnapshot {
    pub blocks_rendered: u64,
    pub default_preset_blocks: u64,
    pub coefficient_updates: u64,
    pub format_mismatches: u64,
    pub non_finite_blocks: u64,
}

impl RenderStats {
    pub fn snapshot(&self) -> RenderStatsSnapshot {
        RenderStatsSnapshot {
            blocks_rendered: self.blocks_rendered.get(),
            default_preset_blocks: self.default_preset_blocks.get(),
            coefficient_updates: self.coefficient_updates.get(),
            format_mismatches: self.format_mismatches.get(),
            non_finite_blocks: self.non_finite_blocks.get(),
        }
    }
}

/// Parametric reverb driven by a [`ParameterReader`].
pub struct ReverbRenderer {
    reader: ParameterReader,
    tanks: Vec<ReverbTank>,
    sample_rate: f64,
    max_block: usize,
    channels: usize,
    /// Parameters the tank coefficients were last computed from.
    applied: Option<ReverbParameters>,
    hysteresis: f32,
    wet: LinearSmoother,
    gain: LinearSmoother,
    stats: Arc<RenderStats>,
}

impl ReverbRenderer {
    /// Unconfigured renderer. Passes audio through dry until [`configure`](EffectSlot::configure).
    pub fn new(reader: ParameterReader, coefficient_hysteresis: f32) -> Self {
        Self {
            reader,
            tanks: Vec::new(),
            sample_rate: 0.0,
            max_block: 0,
            channels: 0,
            applied: None,
            hysteresis: coefficient_hysteresis.max(0.0),
            wet: LinearSmoother::new(0.0),
            gain: LinearSmoother::new(0.0),
            stats: Arc::new(RenderStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<RenderStats> {
        Arc::clone(&self.stats)
    }

    pub fn is_configured(&self) -> bool {
        !self.tanks.is_empty()
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Parameters the network is currently tuned to.
    pub fn applied_parameters(&self) -> Option<ReverbParameters> {
        self.applied
    }

    #[inline]
    fn refresh_coefficients(&mut self, params: &ReverbParameters) {
        let stale = match &self.applied {
            None => true,
            Some(applied) => {
                params.max_normalized_delta(applied) > self.hysteresis
                    || (!self.reader.is_ramping() && params != applied)
            }
        };
        if stale {
            for tank in &mut self.tanks {
                tank.set_parameters(params);
            }
            self.applied = Some(*params);
            self.stats.coefficient_updates.incr();
        }
    }

    fn pass_through(input: &[f32], output: &mut [f32]) {
        let n = input.len().min(output.len());
        output[..n].copy_from_slice(&input[..n]);
        output[n..].fill(0.0);
    }
}

impl EffectSlot for ReverbRenderer {
    fn configure(&mut self, sample_rate: f64, max_block: usize, channels: usize) -> Result<()> {
        if !(8000.0..=384000.0).contains(&sample_rate) {
            return Err(Error::InvalidSampleRate(format!(
                "{sample_rate} out of range (8000-384000 Hz)"
            )));
        }
        if max_block == 0 || max_block > MAX_BLOCK {
            return Err(Error::InvalidBlockSize(format!(
                "{max_block} out of range (1-{MAX_BLOCK})"
            )));
        }
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(Error::InvalidChannelCount(format!(
                "{channels} out of range (1-{MAX_CHANNELS})"
            )));
        }

        self.tanks = (0..channels)
            .map(|ch| ReverbTank::new(sample_rate as f32, ch))
            .collect();
        self.sample_rate = sample_rate;
        self.max_block = max_block;
        self.channels = channels;
        self.applied = None;

        let current = self.reader.read();
        self.refresh_coefficients(&current);
        self.wet.reset(current.wet_dry);
        self.gain.reset(current.gain);

        tracing::debug!(
            "Reverb renderer configured: {} Hz, {} channels, block {}",
            sample_rate,
            channels,
            max_block
        );
        Ok(())
    }

    fn process(&mut self, input: &[f32], output: &mut [f32], sample_rate: f64, num_channels: usize) {
        if self.tanks.is_empty() || num_channels == 0 {
            self.stats.format_mismatches.incr();
            Self::pass_through(input, output);
            return;
        }
        if num_channels != self.channels || (sample_rate - self.sample_rate).abs() > 0.5 {
            self.stats.format_mismatches.incr();
        }

        let params = self.reader.read();
        if self.reader.generation() == 0 {
            self.stats.default_preset_blocks.incr();
        }
        self.refresh_coefficients(&params);

        let frames = input.len().min(output.len()) / num_channels;
        let glide = frames.min(self.max_block) as u32;
        self.wet.glide_to(params.wet_dry, glide);
        self.gain.glide_to(params.gain, glide);

        let wet_channels = num_channels.min(self.tanks.len());
        let mut non_finite = false;
        for frame in 0..frames {
            let wet = self.wet.next();
            let gain = self.gain.next() * WET_SCALE;
            let base = frame * num_channels;
            for ch in 0..num_channels {
                let mut x = input[base + ch];
                if !x.is_finite() {
                    non_finite = true;
                    x = 0.0;
                }
                output[base + ch] = if ch < wet_channels {
                    let y = self.tanks[ch].process(x);
                    x * (1.0 - wet) + y * wet * gain
                } else {
                    x
                };
            }
        }
        output[frames * num_channels..].fill(0.0);

        if non_finite {
            self.stats.non_finite_blocks.incr();
        }
        self.stats.blocks_rendered.incr();
    }

    fn reset(&mut self) {
        self.tanks.iter_mut().for_each(ReverbTank::clear);
    }

    fn name(&self) -> &str {
        "procedural-reverb"
    }
}

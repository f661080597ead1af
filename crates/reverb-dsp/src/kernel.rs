//! Offline impulse-response kernels.
//!
//! An [`ImpulseResponseKernel`] is the sampled response of the parametric network
//! for one parameter set. It is built off the audio thread (it allocates and its
//! cost grows with length) and is immutable afterwards.

use crate::error::{Error, Result};
use crate::network::{ReverbTank, WET_SCALE};
use reverb_core::ReverbParameters;
use std::sync::Arc;

/// Longest kernel we are willing to render.
pub const MAX_KERNEL_SECONDS: f32 = 30.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ImpulseResponseKernel {
    samples: Arc<[f32]>,
    sample_rate: f32,
    params: ReverbParameters,
}

impl ImpulseResponseKernel {
    /// Render the mono wet response of `params` for `seconds` seconds.
    ///
    /// Deterministic: the same inputs always produce the same samples.
    pub fn from_parameters(params: &ReverbParameters, sample_rate: f32, seconds: f32) -> Result<Self> {
        params
            .validate()
            .map_err(|e| Error::InvalidParameter(e.to_string()))?;
        if !(8000.0..=384000.0).contains(&sample_rate) {
            return Err(Error::InvalidSampleRate(format!(
                "{sample_rate} out of range (8000-384000 Hz)"
            )));
        }
        if !(seconds > 0.0 && seconds <= MAX_KERNEL_SECONDS) {
            return Err(Error::InvalidParameter(format!(
                "kernel length {seconds} s out of range (0-{MAX_KERNEL_SECONDS})"
            )));
        }

        let len = (seconds * sample_rate).ceil() as usize;
        let mut tank = ReverbTank::new(sample_rate, 0);
        tank.set_parameters(params);

        let scale = params.gain * WET_SCALE;
        let samples: Arc<[f32]> = (0..len)
            .map(|n| {
                let x = if n == 0 { 1.0 } else { 0.0 };
                tank.process(x) * scale
            })
            .collect();

        tracing::debug!(
            "Rendered {} sample impulse response (decay {:.2} s)",
            len,
            params.decay_time
        );

        Ok(Self {
            samples,
            sample_rate,
            params: *params,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn parameters(&self) -> &ReverbParameters {
        &self.params
    }

    pub fn energy(&self) -> f32 {
        self.samples.iter().map(|s| s * s).sum()
    }

    /// First sample index carrying signal, if any.
    pub fn onset(&self) -> Option<usize> {
        self.samples.iter().position(|s| s.abs() > 0.0)
    }

    /// Direct-form convolution of a mono signal with the kernel (wet only).
    pub fn convolve(&self, input: &[f32]) -> Vec<f32> {
        if input.is_empty() {
            return Vec::new();
        }
        let mut out = vec![0.0; input.len() + self.samples.len() - 1];
        for (i, &x) in input.iter().enumerate() {
            if x == 0.0 {
                continue;
            }
            for (k, &h) in self.samples.iter().enumerate() {
                out[i + k] += x * h;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SR: f32 = 16000.0;

    #[test]
    fn test_deterministic() {
        let p = ReverbParameters::default_preset();
        let a = ImpulseResponseKernel::from_parameters(&p, SR, 0.5).unwrap();
        let b = ImpulseResponseKernel::from_parameters(&p, SR, 0.5).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 8000);
    }

    #[test]
    fn test_onset_respects_pre_delay() {
        let mut p = ReverbParameters::default_preset();
        p.pre_delay_ms = 50.0;
        let k = ImpulseResponseKernel::from_parameters(&p, SR, 0.5).unwrap();
        assert!(k.onset().unwrap() >= 800);
    }

    #[test]
    fn test_longer_decay_has_more_late_energy() {
        let late = |decay: f32| {
            let mut p = ReverbParameters::default_preset();
            p.decay_time = decay;
            let k = ImpulseResponseKernel::from_parameters(&p, SR, 2.0).unwrap();
            k.samples()[k.len() / 2..].iter().map(|s| s * s).sum::<f32>()
        };
        assert!(late(4.0) > late(0.5));
    }

    #[test]
    fn test_rejects_invalid() {
        let mut p = ReverbParameters::default_preset();
        p.wet_dry = 2.0;
        assert!(ImpulseResponseKernel::from_parameters(&p, SR, 1.0).is_err());
        let p = ReverbParameters::default_preset();
        assert!(ImpulseResponseKernel::from_parameters(&p, SR, 0.0).is_err());
        assert!(ImpulseResponseKernel::from_parameters(&p, 10.0, 1.0).is_err());
    }

    #[test]
    fn test_convolve_impulse_returns_kernel() {
        let k = ImpulseResponseKernel::from_parameters(
            &ReverbParameters::default_preset(),
            SR,
            0.1,
        )
        .unwrap();
        let out = k.convolve(&[1.0]);
        assert_eq!(out.len(), k.len());
        for (a, b) in out.iter().zip(k.samples()) {
            assert_relative_eq!(*a, *b);
        }
        assert!(k.energy() > 0.0);
    }
}

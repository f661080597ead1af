//! Weighting and blending of leaves around a listener.
//!
//! Weight = `1 - distance / radius`. Continuous values are weight-averaged;
//! categorical ones come from the strongest leaf.

use crate::bsp::{BspTree, LeafData, LeafId};
use crate::error::{Error, Result};
use crate::geometry::Vec3;
use crate::probe::AcousticProbe;
use reverb_core::{FeatureVector, ReverbParameters};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedLeaf {
    pub leaf: LeafId,
    pub weight: f32,
}

fn strongest(weights: &[WeightedLeaf]) -> Option<WeightedLeaf> {
    weights
        .iter()
        .copied()
        .fold(None, |best: Option<WeightedLeaf>, w| match best {
            Some(b) if b.weight >= w.weight => Some(b),
            _ => Some(w),
        })
}

impl BspTree {
    /// Nearby leaves that pass `has_data`, with their weights.
    ///
    /// Empty when `radius <= 0` or every weight is zero.
    pub fn nearby_weights<F>(&self, position: Vec3, radius: f32, has_data: F) -> Vec<WeightedLeaf>
    where
        F: Fn(&LeafData) -> bool,
    {
        if radius.is_nan() || radius <= 0.0 {
            return Vec::new();
        }
        let weights: Vec<WeightedLeaf> = self
            .find_nearby(position, radius)
            .into_iter()
            .filter_map(|leaf| {
                let node = self.leaf(leaf)?;
                if !has_data(node.data()?) {
                    return None;
                }
                let distance = node.bounds().distance_to(position);
                Some(WeightedLeaf {
                    leaf,
                    weight: (1.0 - distance / radius).max(0.0),
                })
            })
            .collect();
        let total: f32 = weights.iter().map(|w| w.weight).sum();
        if total > 0.0 {
            weights
        } else {
            Vec::new()
        }
    }

    /// Blended acoustic probe around `position`.
    pub fn sample_probe(&self, position: Vec3, radius: f32) -> Result<AcousticProbe> {
        let weights = self.nearby_weights(position, radius, |d| d.probe.is_some());
        let probes: Vec<(f32, AcousticProbe)> = weights
            .iter()
            .filter_map(|w| Some((w.weight, self.leaf(w.leaf)?.data()?.probe?)))
            .collect();
        let best = strongest(&weights)
            .and_then(|w| self.leaf(w.leaf)?.data()?.probe)
            .ok_or(Error::NoAcousticData)?;

        let total: f32 = probes.iter().map(|(w, _)| w).sum();
        let mut distances = [0.0; 6];
        for (w, probe) in &probes {
            for (acc, d) in distances.iter_mut().zip(&probe.distances) {
                *acc += w * d;
            }
        }
        for d in &mut distances {
            *d /= total;
        }

        Ok(AcousticProbe {
            distances,
            materials: best.materials,
        })
    }

    /// Blended feature vector around `position`, ready for the scheduler.
    pub fn sample_features(&self, position: Vec3, radius: f32) -> Result<FeatureVector> {
        Ok(self.sample_probe(position, radius)?.to_features()?)
    }

    /// Blend precomputed per-leaf parameters: decay is weight-averaged, the rest
    /// comes from the strongest leaf.
    pub fn sample_parameters(&self, position: Vec3, radius: f32) -> Result<ReverbParameters> {
        let weights = self.nearby_weights(position, radius, |d| d.parameters.is_some());
        let params: Vec<(f32, ReverbParameters)> = weights
            .iter()
            .filter_map(|w| Some((w.weight, self.leaf(w.leaf)?.data()?.parameters?)))
            .collect();
        let mut blended = strongest(&weights)
            .and_then(|w| self.leaf(w.leaf)?.data()?.parameters)
            .ok_or(Error::NoAcousticData)?;

        let total: f32 = params.iter().map(|(w, _)| w).sum();
        blended.decay_time = params.iter().map(|(w, p)| w * p.decay_time).sum::<f32>() / total;
        Ok(blended)
    }
}

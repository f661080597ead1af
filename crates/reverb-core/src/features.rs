//! Scene feature vectors fed to the reverb model.

use crate::error::{Error, Result};
use std::sync::Arc;

/// Fixed-length, immutable, ordered feature vector describing the acoustic scene.
///
/// Backed by `Arc<[f32]>`: cloning into an inference request is a refcount bump.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Arc<[f32]>,
}

impl FeatureVector {
    /// Non-finite values are rejected so similarity checks stay meaningful.
    pub fn new(values: impl Into<Arc<[f32]>>) -> Result<Self> {
        let values = values.into();
        if let Some(idx) = values.iter().position(|v| !v.is_finite()) {
            return Err(Error::InvalidFeatures(format!(
                "feature {idx} is not finite ({})",
                values[idx]
            )));
        }
        Ok(Self { values })
    }

    /// Like [`new`](Self::new) but also checks the length contract.
    pub fn with_len(values: impl Into<Arc<[f32]>>, expected: usize) -> Result<Self> {
        let fv = Self::new(values)?;
        if fv.len() != expected {
            return Err(Error::FeatureLength {
                expected,
                actual: fv.len(),
            });
        }
        Ok(fv)
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Relative L2 distance: `|a - b| / max(|a|, |b|)`.
    ///
    /// Returns `f32::INFINITY` for vectors of different length, 0 for two zero vectors.
    pub fn distance(&self, other: &Self) -> f32 {
        if self.len() != other.len() {
            return f32::INFINITY;
        }
        // f64 so squares of large finite features cannot overflow.
        let (mut diff, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
        for (&a, &b) in self.values.iter().zip(other.values.iter()) {
            let (a, b) = (a as f64, b as f64);
            diff += (a - b) * (a - b);
            na += a * a;
            nb += b * b;
        }
        let scale = na.sqrt().max(nb.sqrt());
        if scale <= f32::EPSILON as f64 {
            return diff.sqrt() as f32;
        }
        (diff.sqrt() / scale) as f32
    }

    /// True when the relative distance is within `threshold`.
    pub fn is_similar(&self, other: &Self, threshold: f32) -> bool {
        self.distance(other) <= threshold
    }
}

impl AsRef<[f32]> for FeatureVector {
    fn as_ref(&self) -> &[f32] {
        self.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rejects_non_finite() {
        assert!(FeatureVector::new(vec![1.0, f32::NAN]).is_err());
        assert!(FeatureVector::new(vec![f32::INFINITY]).is_err());
    }

    #[test]
    fn test_length_contract() {
        let err = FeatureVector::with_len(vec![1.0, 2.0], 3).unwrap_err();
        assert!(matches!(
            err,
            Error::FeatureLength {
                expected: 3,
                actual: 2
            }
        ));
        assert!(FeatureVector::with_len(vec![1.0, 2.0, 3.0], 3).is_ok());
    }

    #[test]
    fn test_distance_identical_is_zero() {
        let a = FeatureVector::new(vec![3.0, 4.0]).unwrap();
        assert_eq!(a.distance(&a.clone()), 0.0);
    }

    #[test]
    fn test_distance_relative() {
        let a = FeatureVector::new(vec![3.0, 4.0]).unwrap();
        let b = FeatureVector::new(vec![3.0, 4.5]).unwrap();
        // |diff| = 0.5, max norm = |b| ~ 5.408
        assert_relative_eq!(a.distance(&b), 0.5 / 4.5f32.hypot(3.0), epsilon = 1e-6);
        assert!(a.is_similar(&b, 0.1));
        assert!(!a.is_similar(&b, 0.05));
    }

    #[test]
    fn test_distance_large_features() {
        let a = FeatureVector::new(vec![2e19]).unwrap();
        let b = FeatureVector::new(vec![1e19]).unwrap();
        assert_relative_eq!(a.distance(&b), 0.5, epsilon = 1e-6);
        assert!(!a.is_similar(&b, 0.1));

        let huge = FeatureVector::new(vec![f32::MAX, f32::MAX]).unwrap();
        assert_eq!(huge.distance(&huge.clone()), 0.0);
    }

    #[test]
    fn test_distance_length_mismatch() {
        let a = FeatureVector::new(vec![1.0]).unwrap();
        let b = FeatureVector::new(vec![1.0, 1.0]).unwrap();
        assert!(a.distance(&b).is_infinite());
        assert!(!a.is_similar(&b, 1e9));
    }
}

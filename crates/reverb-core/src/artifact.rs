//! Dense-network model artifact.
//!
//! A small fully connected network serialised as TOML. Both the built-in CPU
//! runner and the Burn backend execute this format.
//!
//! ```toml
//! format = "procedural-reverb/dense"
//! version = 1
//! input_len = 2
//!
//! [[layers]]
//! weights = [[0.5, 0.0], [0.0, 0.5], [0.1, 0.1], [0.2, 0.0]]
//! bias = [0.0, 0.0, 0.0, 0.0]
//! activation = "sigmoid"
//! ```

use crate::error::{InferenceError, ModelLoadError};
use crate::inference::ModelShape;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ARTIFACT_FORMAT: &str = "procedural-reverb/dense";
pub const ARTIFACT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Sigmoid,
    Tanh,
}

impl Activation {
    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Self::Linear => x,
            Self::Relu => x.max(0.0),
            Self::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Self::Tanh => x.tanh(),
        }
    }
}

/// `out = activation(weights · in + bias)`, weights stored row-major as `[out][in]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
    #[serde(default)]
    pub activation: Activation,
}

impl DenseLayer {
    pub fn new(weights: Vec<Vec<f32>>, bias: Vec<f32>, activation: Activation) -> Self {
        Self {
            weights,
            bias,
            activation,
        }
    }

    pub fn in_len(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }

    pub fn out_len(&self) -> usize {
        self.weights.len()
    }

    fn forward(&self, input: &[f32], out: &mut Vec<f32>) {
        out.clear();
        out.extend(self.weights.iter().zip(&self.bias).map(|(row, &b)| {
            let dot: f32 = row.iter().zip(input).map(|(w, x)| w * x).sum();
            self.activation.apply(dot + b)
        }));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseArtifact {
    pub format: String,
    pub version: u32,
    pub input_len: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_mean: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_std: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_scale: Option<Vec<f32>>,
    pub layers: Vec<DenseLayer>,
}

impl DenseArtifact {
    pub fn new(input_len: usize, layers: Vec<DenseLayer>) -> Self {
        Self {
            format: ARTIFACT_FORMAT.to_string(),
            version: ARTIFACT_VERSION,
            input_len,
            input_mean: None,
            input_std: None,
            output_scale: None,
            layers,
        }
    }

    pub fn with_normalization(mut self, mean: Vec<f32>, std: Vec<f32>) -> Self {
        self.input_mean = Some(mean);
        self.input_std = Some(std);
        self
    }

    pub fn with_output_scale(mut self, scale: Vec<f32>) -> Self {
        self.output_scale = Some(scale);
        self
    }

    pub fn load(path: &Path) -> Result<Self, ModelLoadError> {
        let source = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ModelLoadError::Missing(path.to_path_buf()),
            _ => ModelLoadError::Corrupt(format!("{}: {e}", path.display())),
        })?;
        let artifact = Self::from_toml_str(&source)?;
        tracing::debug!(
            "Loaded dense artifact {} ({} layers)",
            path.display(),
            artifact.layers.len()
        );
        Ok(artifact)
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ModelLoadError> {
        let artifact: Self =
            toml::from_str(source).map_err(|e| ModelLoadError::Corrupt(e.to_string()))?;
        artifact.check()?;
        Ok(artifact)
    }

    pub fn to_toml_string(&self) -> Result<String, ModelLoadError> {
        toml::to_string(self).map_err(|e| ModelLoadError::Corrupt(e.to_string()))
    }

    pub fn shape(&self) -> ModelShape {
        ModelShape {
            input_len: self.input_len,
            output_len: self.layers.last().map_or(0, DenseLayer::out_len),
        }
    }

    /// Format, version and dimension consistency.
    pub fn check(&self) -> Result<(), ModelLoadError> {
        if self.format != ARTIFACT_FORMAT {
            return Err(ModelLoadError::Incompatible(format!(
                "unknown artifact format '{}'",
                self.format
            )));
        }
        if self.version != ARTIFACT_VERSION {
            return Err(ModelLoadError::Incompatible(format!(
                "unsupported artifact version {} (expected {ARTIFACT_VERSION})",
                self.version
            )));
        }
        if self.layers.is_empty() {
            return Err(ModelLoadError::Corrupt("artifact has no layers".into()));
        }

        let mut width = self.input_len;
        for (idx, layer) in self.layers.iter().enumerate() {
            if layer.out_len() == 0 {
                return Err(ModelLoadError::Corrupt(format!("layer {idx} has no outputs")));
            }
            if let Some(row) = layer.weights.iter().position(|r| r.len() != width) {
                return Err(ModelLoadError::Corrupt(format!(
                    "layer {idx} row {row} has {} weights, expected {width}",
                    layer.weights[row].len()
                )));
            }
            if layer.bias.len() != layer.out_len() {
                return Err(ModelLoadError::Corrupt(format!(
                    "layer {idx} has {} biases for {} outputs",
                    layer.bias.len(),
                    layer.out_len()
                )));
            }
            if layer
                .weights
                .iter()
                .flatten()
                .chain(&layer.bias)
                .any(|v| !v.is_finite())
            {
                return Err(ModelLoadError::Corrupt(format!(
                    "layer {idx} contains non-finite values"
                )));
            }
            width = layer.out_len();
        }

        let check_len = |name: &str, values: &Option<Vec<f32>>, expected: usize| match values {
            Some(v) if v.len() != expected => Err(ModelLoadError::Corrupt(format!(
                "{name} has {} entries, expected {expected}",
                v.len()
            ))),
            _ => Ok(()),
        };
        check_len("input_mean", &self.input_mean, self.input_len)?;
        check_len("input_std", &self.input_std, self.input_len)?;
        check_len("output_scale", &self.output_scale, width)?;

        if self.input_mean.is_some() != self.input_std.is_some() {
            return Err(ModelLoadError::Corrupt(
                "input_mean and input_std must be given together".into(),
            ));
        }
        if let Some(std) = &self.input_std {
            if std.iter().any(|s| !s.is_finite() || *s <= 0.0) {
                return Err(ModelLoadError::Corrupt(
                    "input_std entries must be positive".into(),
                ));
            }
        }
        Ok(())
    }

    /// Run the network on one input row.
    pub fn forward(&self, input: &[f32]) -> Result<Vec<f32>, InferenceError> {
        if input.len() != self.input_len {
            return Err(InferenceError::InputShape {
                expected: self.input_len,
                actual: input.len(),
            });
        }

        let mut current: Vec<f32> = match (&self.input_mean, &self.input_std) {
            (Some(mean), Some(std)) => input
                .iter()
                .zip(mean.iter().zip(std))
                .map(|(x, (m, s))| (x - m) / s)
                .collect(),
            _ => input.to_vec(),
        };
        let mut next = Vec::new();
        for layer in &self.layers {
            layer.forward(&current, &mut next);
            std::mem::swap(&mut current, &mut next);
        }

        if let Some(scale) = &self.output_scale {
            for (v, s) in current.iter_mut().zip(scale) {
                *v *= s;
            }
        }
        Ok(current)
    }
}

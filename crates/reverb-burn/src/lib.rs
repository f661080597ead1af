//! Burn execution provider for procedural reverb.
//!
//! Runs the same dense artifact as the built-in backend, but as
//! [Burn](https://burn.dev) tensors on the NdArray (CPU) backend. Layer weights
//! are uploaded once at load time.
//!
//! ```rust,ignore
//! let engine = ProceduralReverb::builder()
//!     .config(config)
//!     .backend(reverb_burn::burn_backend_factory())
//!     .build()?;
//! ```

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::NdArray;
use burn::prelude::*;
use burn::tensor::activation;
use reverb_core::{
    Activation, BackendCapabilities, BackendFactory, DenseArtifact, DenseLayer, InferenceBackend,
    InferenceError, ModelLoadError, ModelShape,
};
use std::path::Path;

type B = NdArray;

struct BurnLayer {
    /// `[in, out]`, transposed from the artifact's row-major `[out][in]`.
    weights: Tensor<B, 2>,
    /// `[1, out]`
    bias: Tensor<B, 2>,
    activation: Activation,
}

impl BurnLayer {
    fn upload(layer: &DenseLayer, device: &NdArrayDevice) -> Self {
        let (rows, cols) = (layer.out_len(), layer.in_len());
        let flat: Vec<f32> = layer.weights.iter().flatten().copied().collect();
        let weights = Tensor::<B, 1>::from_floats(flat.as_slice(), device)
            .reshape([rows, cols])
            .transpose();
        let bias = Tensor::<B, 1>::from_floats(layer.bias.as_slice(), device).reshape([1, rows]);
        Self {
            weights,
            bias,
            activation: layer.activation,
        }
    }

    fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let y = x.matmul(self.weights.clone()) + self.bias.clone();
        match self.activation {
            Activation::Linear => y,
            Activation::Relu => activation::relu(y),
            Activation::Sigmoid => activation::sigmoid(y),
            Activation::Tanh => y.tanh(),
        }
    }
}

struct BurnModel {
    shape: ModelShape,
    normalize: Option<(Tensor<B, 2>, Tensor<B, 2>)>,
    layers: Vec<BurnLayer>,
    output_scale: Option<Tensor<B, 2>>,
}

/// Burn-based [`InferenceBackend`] on the NdArray CPU backend.
pub struct BurnBackend {
    device: NdArrayDevice,
    model: Option<BurnModel>,
}

impl BurnBackend {
    pub fn new() -> Self {
        Self {
            device: NdArrayDevice::default(),
            model: None,
        }
    }

    /// Upload an in-memory artifact.
    pub fn load_artifact(&mut self, artifact: &DenseArtifact) -> Result<ModelShape, ModelLoadError> {
        artifact.check()?;
        let shape = artifact.shape();
        let device = &self.device;
        let row = |v: &[f32]| Tensor::<B, 1>::from_floats(v, device).reshape([1, v.len()]);

        let normalize = match (&artifact.input_mean, &artifact.input_std) {
            (Some(mean), Some(std)) => Some((row(mean), row(std))),
            _ => None,
        };
        let layers = artifact
            .layers
            .iter()
            .map(|l| BurnLayer::upload(l, device))
            .collect();
        let output_scale = artifact.output_scale.as_deref().map(row);

        self.model = Some(BurnModel {
            shape,
            normalize,
            layers,
            output_scale,
        });
        tracing::debug!(
            "Uploaded {} layer model to Burn/NdArray ({} -> {})",
            artifact.layers.len(),
            shape.input_len,
            shape.output_len
        );
        Ok(shape)
    }
}

impl Default for BurnBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for BurnBackend {
    fn load_model(&mut self, path: &Path) -> Result<ModelShape, ModelLoadError> {
        let artifact = DenseArtifact::load(path)?;
        self.load_artifact(&artifact)
    }

    fn run(&mut self, input: &[f32]) -> Result<Vec<f32>, InferenceError> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| InferenceError::Runtime("no model loaded".into()))?;
        if input.len() != model.shape.input_len {
            return Err(InferenceError::InputShape {
                expected: model.shape.input_len,
                actual: input.len(),
            });
        }

        let mut x = Tensor::<B, 1>::from_floats(input, &self.device).reshape([1, input.len()]);
        if let Some((mean, std)) = &model.normalize {
            x = (x - mean.clone()) / std.clone();
        }
        for layer in &model.layers {
            x = layer.forward(x);
        }
        if let Some(scale) = &model.output_scale {
            x = x * scale.clone();
        }

        x.into_data()
            .to_vec::<f32>()
            .map_err(|e| InferenceError::Runtime(format!("tensor readback failed: {e:?}")))
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            name: "Burn/NdArray".into(),
            has_gpu: false,
        }
    }
}

/// Factory for use with the engine builder.
pub fn burn_backend_factory() -> BackendFactory {
    Box::new(|| Ok(Box::new(BurnBackend::new()) as Box<dyn InferenceBackend>))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn artifact() -> DenseArtifact {
        DenseArtifact::new(
            3,
            vec![
                DenseLayer::new(
                    vec![vec![0.5, -0.25, 1.0], vec![-1.0, 0.75, 0.1]],
                    vec![0.1, -0.2],
                    Activation::Tanh,
                ),
                DenseLayer::new(
                    vec![
                        vec![1.0, 0.5],
                        vec![-0.5, 1.0],
                        vec![0.25, 0.25],
                        vec![2.0, -1.0],
                    ],
                    vec![0.0, 0.1, 0.2, 0.3],
                    Activation::Sigmoid,
                ),
            ],
        )
        .with_normalization(vec![1.0, 0.0, -1.0], vec![2.0, 1.0, 0.5])
        .with_output_scale(vec![10.0, 1.0, 1.0, 1.0])
    }

    #[test]
    fn test_matches_reference_forward() {
        let artifact = artifact();
        let mut backend = BurnBackend::new();
        let shape = backend.load_artifact(&artifact).unwrap();
        assert_eq!(shape, ModelShape { input_len: 3, output_len: 4 });

        let input = [0.3, -1.2, 2.0];
        let expected = artifact.forward(&input).unwrap();
        let actual = backend.run(&input).unwrap();
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(&expected) {
            assert_relative_eq!(*a, *e, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_input_shape_checked() {
        let mut backend = BurnBackend::new();
        backend.load_artifact(&artifact()).unwrap();
        assert!(matches!(
            backend.run(&[1.0]),
            Err(InferenceError::InputShape { expected: 3, actual: 1 })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reverb.toml");
        std::fs::write(&path, artifact().to_toml_string().unwrap()).unwrap();

        let mut backend = BurnBackend::new();
        assert_eq!(backend.load_model(&path).unwrap().output_len, 4);
        assert!(matches!(
            backend.load_model(&dir.path().join("missing.toml")),
            Err(ModelLoadError::Missing(_))
        ));
    }

    #[test]
    fn test_run_before_load_fails() {
        let mut backend = BurnBackend::new();
        assert!(matches!(backend.run(&[0.0; 3]), Err(InferenceError::Runtime(_))));
        assert!(!backend.capabilities().has_gpu);
    }
}

//! Model runtime adapter: a loaded backend plus the output contract.

use reverb_core::{
    BackendCapabilities, FeatureVector, InferenceBackend, InferenceError, ModelLoadError,
    ModelShape, OutputLayout, ReverbParameters,
};
use std::path::Path;

/// Owns a backend with a model loaded and turns feature vectors into validated
/// [`ReverbParameters`].
///
/// Lives on the inference thread. Dropping it releases the backend's resources.
pub struct ModelRuntimeAdapter {
    backend: Box<dyn InferenceBackend>,
    shape: ModelShape,
    layout: OutputLayout,
}

impl std::fmt::Debug for ModelRuntimeAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRuntimeAdapter")
            .field("backend", &self.backend.capabilities().name)
            .field("shape", &self.shape)
            .field("layout", &self.layout)
            .finish()
    }
}

impl ModelRuntimeAdapter {
    /// Load `path` on `backend` and check it against the feature and output contracts.
    pub fn load(
        mut backend: Box<dyn InferenceBackend>,
        path: &Path,
        feature_len: usize,
    ) -> Result<Self, ModelLoadError> {
        let shape = backend.load_model(path)?;

        if shape.input_len != feature_len {
            return Err(ModelLoadError::Incompatible(format!(
                "model takes {} features, scene provides {feature_len}",
                shape.input_len
            )));
        }
        let layout = OutputLayout::from_output_len(shape.output_len).ok_or_else(|| {
            ModelLoadError::Incompatible(format!(
                "model produces {} outputs, expected 4 (compact) or 8 (full)",
                shape.output_len
            ))
        })?;

        tracing::info!(
            "Loaded reverb model {} ({} -> {}, {:?} layout, backend: {})",
            path.display(),
            shape.input_len,
            shape.output_len,
            layout,
            backend.capabilities().name
        );

        Ok(Self {
            backend,
            shape,
            layout,
        })
    }

    /// Synchronous inference. Output is either fully in range or an error.
    pub fn infer(&mut self, features: &FeatureVector) -> Result<ReverbParameters, InferenceError> {
        if features.len() != self.shape.input_len {
            return Err(InferenceError::InputShape {
                expected: self.shape.input_len,
                actual: features.len(),
            });
        }
        let raw = self.backend.run(features.as_slice())?;
        self.layout.decode(&raw)
    }

    pub fn shape(&self) -> ModelShape {
        self.shape
    }

    pub fn layout(&self) -> OutputLayout {
        self.layout
    }

    pub fn capabilities(&self) -> BackendCapabilities {
        self.backend.capabilities()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dense::DenseBackend;
    use approx::assert_relative_eq;
    use reverb_core::{Activation, DenseArtifact, DenseLayer};

    /// Single linear layer that ignores its input and emits `outputs` as bias.
    fn constant_model(input_len: usize, outputs: &[f32]) -> Box<dyn InferenceBackend> {
        let artifact = DenseArtifact::new(
            input_len,
            vec![DenseLayer::new(
                vec![vec![0.0; input_len]; outputs.len()],
                outputs.to_vec(),
                Activation::Linear,
            )],
        );
        Box::new(DenseBackend::with_artifact(artifact))
    }

    fn features(len: usize) -> FeatureVector {
        FeatureVector::new(vec![1.0; len]).unwrap()
    }

    #[test]
    fn test_compact_model() {
        let mut adapter =
            ModelRuntimeAdapter::load(constant_model(3, &[2.0, 0.7, 0.4, 0.3]), Path::new("m"), 3)
                .unwrap();
        assert_eq!(adapter.layout(), OutputLayout::Compact);

        let params = adapter.infer(&features(3)).unwrap();
        assert_relative_eq!(params.decay_time, 2.0);
        assert_relative_eq!(params.wet_dry, 0.3);
    }

    #[test]
    fn test_feature_len_mismatch_is_incompatible() {
        let err =
            ModelRuntimeAdapter::load(constant_model(3, &[1.0; 4]), Path::new("m"), 15)
                .unwrap_err();
        assert!(matches!(err, ModelLoadError::Incompatible(_)));
    }

    #[test]
    fn test_unknown_output_width_is_incompatible() {
        let err = ModelRuntimeAdapter::load(constant_model(2, &[0.5; 5]), Path::new("m"), 2)
            .unwrap_err();
        assert!(matches!(err, ModelLoadError::Incompatible(_)));
    }

    #[test]
    fn test_out_of_range_output_rejected() {
        // Negative decay time
        let mut adapter =
            ModelRuntimeAdapter::load(constant_model(2, &[-1.0, 0.5, 0.5, 0.5]), Path::new("m"), 2)
                .unwrap();
        assert!(matches!(
            adapter.infer(&features(2)),
            Err(InferenceError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_wrong_feature_len_at_infer() {
        let mut adapter =
            ModelRuntimeAdapter::load(constant_model(2, &[1.0, 0.5, 0.5, 0.5]), Path::new("m"), 2)
                .unwrap();
        assert_eq!(
            adapter.infer(&features(4)).unwrap_err(),
            InferenceError::InputShape {
                expected: 2,
                actual: 4
            }
        );
    }

    #[test]
    fn test_full_layout_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("full.toml");
        let outputs = [3.0, 20.0, 0.5, 0.1, 0.2, 0.3, 0.8, 0.9];
        let artifact = DenseArtifact::new(
            2,
            vec![DenseLayer::new(
                vec![vec![0.0; 2]; 8],
                outputs.to_vec(),
                Activation::Linear,
            )],
        );
        std::fs::write(&path, artifact.to_toml_string().unwrap()).unwrap();

        let mut adapter =
            ModelRuntimeAdapter::load(Box::new(DenseBackend::new()), &path, 2).unwrap();
        assert_eq!(adapter.layout(), OutputLayout::Full);
        let params = adapter.infer(&features(2)).unwrap();
        assert_relative_eq!(params.pre_delay_ms, 20.0);
        assert_eq!(params.damping, [0.1, 0.2, 0.3]);
        assert_relative_eq!(params.gain, 0.9);
    }
}

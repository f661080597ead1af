//! Built-in CPU execution provider for [`DenseArtifact`] models.

use reverb_core::{
    BackendCapabilities, BackendFactory, DenseArtifact, InferenceBackend, InferenceError,
    ModelLoadError, ModelShape,
};
use std::path::Path;

/// Runs a dense artifact with plain `f32` loops. No framework dependencies.
#[derive(Debug, Default)]
pub struct DenseBackend {
    artifact: Option<DenseArtifact>,
}

impl DenseBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an artifact already in memory. `load_model` then only reports its shape.
    pub fn with_artifact(artifact: DenseArtifact) -> Self {
        Self {
            artifact: Some(artifact),
        }
    }
}

impl InferenceBackend for DenseBackend {
    fn load_model(&mut self, path: &Path) -> Result<ModelShape, ModelLoadError> {
        if let Some(artifact) = &self.artifact {
            artifact.check()?;
            return Ok(artifact.shape());
        }
        let artifact = DenseArtifact::load(path)?;
        let shape = artifact.shape();
        self.artifact = Some(artifact);
        Ok(shape)
    }

    fn run(&mut self, input: &[f32]) -> Result<Vec<f32>, InferenceError> {
        self.artifact
            .as_ref()
            .ok_or_else(|| InferenceError::Runtime("no model loaded".into()))?
            .forward(input)
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            name: "dense/cpu".into(),
            has_gpu: false,
        }
    }
}

/// Factory for the built-in backend.
pub fn dense_backend_factory() -> BackendFactory {
    Box::new(|| Ok(Box::new(DenseBackend::new()) as Box<dyn InferenceBackend>))
}

//! Inference backend seam.
//!
//! Defines the [`InferenceBackend`] trait that execution providers (the built-in
//! dense runner, Burn, ...) implement. Everything crossing the boundary is flat
//! `&[f32]` data; no framework tensor types leak out.

use crate::error::{InferenceError, ModelLoadError};
use std::path::Path;

/// Input and output widths reported by a loaded model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelShape {
    pub input_len: usize,
    pub output_len: usize,
}

#[derive(Debug, Clone)]
pub struct BackendCapabilities {
    /// e.g. "dense/cpu", "Burn/NdArray"
    pub name: String,
    pub has_gpu: bool,
}

/// A model execution provider.
///
/// # Lifecycle
///
/// 1. Created on the inference thread by a [`BackendFactory`]
/// 2. [`load_model`](Self::load_model) once
/// 3. [`run`](Self::run) per request
///
/// # Thread Safety
///
/// The backend never leaves the inference thread, so no `Send` or `Sync`
/// bound is required. Only the factory closure crosses threads.
pub trait InferenceBackend {
    /// Load the model artifact at `path` and report its shape.
    fn load_model(&mut self, path: &Path) -> Result<ModelShape, ModelLoadError>;

    /// One forward pass over a single feature vector. Returns the raw output row.
    fn run(&mut self, input: &[f32]) -> Result<Vec<f32>, InferenceError>;

    fn capabilities(&self) -> BackendCapabilities;
}

/// Builds an [`InferenceBackend`]. Called once, on the inference thread.
pub type BackendFactory =
    Box<dyn FnOnce() -> Result<Box<dyn InferenceBackend>, ModelLoadError> + Send>;

//! Error types for reverb-core.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for reverb-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid reverb parameters: {0}")]
    InvalidParameters(String),

    #[error("Invalid feature vector: {0}")]
    InvalidFeatures(String),

    #[error("Feature vector length {actual} does not match expected {expected}")]
    FeatureLength { expected: usize, actual: usize },

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure to bring a model artifact up on a backend.
///
/// Fatal to inference for the session; the engine falls back to the static default preset.
#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("Model artifact not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("Model artifact is corrupt: {0}")]
    Corrupt(String),

    #[error("Model is incompatible: {0}")]
    Incompatible(String),

    #[error("Backend initialization failed: {0}")]
    Backend(String),
}

/// Per-request inference failure. Always recoverable: the last good parameters stay in force.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("Inference runtime fault: {0}")]
    Runtime(String),

    #[error("Input has {actual} features, model expects {expected}")]
    InputShape { expected: usize, actual: usize },

    #[error("Model produced {actual} outputs, expected {expected}")]
    MalformedOutput { expected: usize, actual: usize },

    /// Model output decoded but a field is NaN or outside its valid range.
    #[error("Model output rejected: {0}")]
    InvalidParameters(String),

    #[error("Inference request {id} timed out after {elapsed_ms} ms")]
    Timeout { id: u64, elapsed_ms: u64 },

    #[error("Inference request {0} was cancelled")]
    Cancelled(u64),
}

impl InferenceError {
    /// Timeouts and cancellations are scheduling outcomes, not model faults.
    pub fn is_model_fault(&self) -> bool {
        !matches!(self, Self::Timeout { .. } | Self::Cancelled(_))
    }
}

//! Centralized error type for the procedural-reverb umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] reverb_core::Error),

    #[error("Model load: {0}")]
    ModelLoad(#[from] reverb_core::ModelLoadError),

    #[error("Inference: {0}")]
    Inference(#[from] reverb_core::InferenceError),

    #[error("Neural: {0}")]
    Neural(#[from] reverb_neural::Error),

    #[error("DSP: {0}")]
    Dsp(#[from] reverb_dsp::Error),

    #[cfg(feature = "scene")]
    #[error("Scene: {0}")]
    Scene(#[from] reverb_scene::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

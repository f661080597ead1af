//! Error types for the inference side.

use reverb_core::{InferenceError, ModelLoadError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Reverb core error: {0}")]
    Core(#[from] reverb_core::Error),

    #[error("Failed to load model: {0}")]
    ModelLoad(#[from] ModelLoadError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to spawn inference thread: {0}")]
    WorkerSpawn(String),

    #[error("Inference queue full")]
    QueueFull,

    #[error("Inference thread send failed")]
    WorkerSend,

    #[error("Inference thread recv failed")]
    WorkerRecv,
}

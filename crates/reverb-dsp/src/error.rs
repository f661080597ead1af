//! Error types for reverb-dsp

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Invalid channel count: {0}")]
    InvalidChannelCount(String),

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(String),

    #[error("Invalid block size: {0}")]
    InvalidBlockSize(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, Error>;

//! Error types for reverb-scene.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),

    #[error("Invalid partition depth {0} (expected 1-100)")]
    InvalidDepth(u32),

    #[error("Invalid partition config: {0}")]
    InvalidConfig(String),

    #[error("Partition would create {planned} leaves (limit {limit})")]
    TooManyLeaves { planned: u128, limit: usize },

    #[error("No acoustic data near the listener")]
    NoAcousticData,

    #[error("Failed to parse partition config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Reverb core error: {0}")]
    Core(#[from] reverb_core::Error),
}

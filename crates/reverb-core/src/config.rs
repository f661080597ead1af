//! Reverb engine configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Explicit, immutable configuration handed to the engine at construction.
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```
/// use reverb_core::ReverbConfig;
///
/// let config = ReverbConfig::from_toml_str(r#"
///     model_path = "models/room.toml"
///     inference_interval_ms = 250
///     ramp_callbacks = 16
/// "#).unwrap();
/// assert_eq!(config.ramp_callbacks, 16);
/// assert_eq!(config.feature_len, 15);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverbConfig {
    /// `None` runs on the default preset for the whole session.
    pub model_path: Option<PathBuf>,
    /// Fixed feature vector length the model expects.
    pub feature_len: usize,
    /// Periodic refresh cadence.
    pub inference_interval_ms: u64,
    pub request_timeout_ms: u64,
    /// Number of audio callbacks a parameter transition is spread over.
    pub ramp_callbacks: u32,
    /// Relative L2 distance under which a scene counts as unchanged.
    pub similarity_threshold: f32,
    /// Normalised parameter change below which filter coefficients are left alone.
    pub coefficient_hysteresis: f32,
    pub sample_rate: f64,
    pub block_size: usize,
    pub channels: usize,
    pub worker_queue_capacity: usize,
    pub worker_shutdown_grace_ms: u64,
}

impl Default for ReverbConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            feature_len: 15,
            inference_interval_ms: 500,
            request_timeout_ms: 200,
            ramp_callbacks: 32,
            similarity_threshold: 0.05,
            coefficient_hysteresis: 1e-3,
            sample_rate: 48000.0,
            block_size: 512,
            channels: 2,
            worker_queue_capacity: 4,
            worker_shutdown_grace_ms: 250,
        }
    }
}

impl ReverbConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!("Loaded reverb config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    pub fn inference_interval(&self) -> Duration {
        Duration::from_millis(self.inference_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn worker_shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.worker_shutdown_grace_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.feature_len == 0 {
            return Err(Error::InvalidConfig("feature_len must be > 0".into()));
        }
        if self.inference_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "inference_interval_ms must be > 0".into(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::InvalidConfig("request_timeout_ms must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(Error::InvalidConfig(format!(
                "similarity_threshold {} out of range (0-1)",
                self.similarity_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.coefficient_hysteresis) {
            return Err(Error::InvalidConfig(format!(
                "coefficient_hysteresis {} out of range (0-1)",
                self.coefficient_hysteresis
            )));
        }
        if self.sample_rate < 8000.0 || self.sample_rate > 384000.0 {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} out of range (8000-384000 Hz)",
                self.sample_rate
            )));
        }
        if self.block_size == 0 || self.block_size > 8192 {
            return Err(Error::InvalidConfig(format!(
                "block_size {} out of range (1-8192)",
                self.block_size
            )));
        }
        if self.channels == 0 {
            return Err(Error::InvalidConfig("channels must be > 0".into()));
        }
        if self.worker_queue_capacity == 0 {
            return Err(Error::InvalidConfig(
                "worker_queue_capacity must be > 0".into(),
            ));
        }
        Ok(())
    }
}

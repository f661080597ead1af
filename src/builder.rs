//! Builder for configuring and constructing a `ProceduralReverb`.

use crate::{ProceduralReverb, Result};
use reverb_core::{BackendFactory, ReverbConfig, ReverbParameterStore};
use reverb_neural::{InferenceScheduler, InferenceWorker, WorkerOptions};
use std::path::PathBuf;
use std::sync::Arc;

/// The inference worker is only started when a model path is configured. A model
/// that fails to load is not a build error: the engine falls back to the default
/// preset for the session and reports the failure through
/// [`ProceduralReverb::load_error`].
///
/// # Example
///
/// ```ignore
/// use procedural_reverb::prelude::*;
///
/// let mut engine = ProceduralReverb::builder()
///     .config(ReverbConfig::from_file("reverb.toml")?)
///     .model_path("assets/models/room.toml")
///     .build()?;
///
/// let mut renderer = engine.create_renderer();
/// renderer.configure(48000.0, 512, 2)?;
/// // move `renderer` to the audio thread, then per frame:
/// engine.update_scene(features)?;
/// engine.tick();
/// ```
#[derive(Default)]
pub struct ProceduralReverbBuilder {
    config: ReverbConfig,
    backend_factory: Option<BackendFactory>,
}

impl ProceduralReverbBuilder {
    /// Default: `ReverbConfig::default()`
    pub fn config(mut self, config: ReverbConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides `config.model_path`.
    pub fn model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.model_path = Some(path.into());
        self
    }

    /// Provide a custom execution provider instead of the default one. If not
    /// set, the Burn backend is used when the `burn` feature is enabled, and
    /// the built-in dense backend otherwise.
    pub fn backend(mut self, factory: BackendFactory) -> Self {
        self.backend_factory = Some(factory);
        self
    }

    pub fn build(self) -> Result<ProceduralReverb> {
        let config = self.config;
        config.validate()?;

        let store = Arc::new(ReverbParameterStore::new(config.ramp_callbacks));

        let (worker, load_error) = match &config.model_path {
            Some(path) => {
                let factory = self.backend_factory.unwrap_or_else(default_backend);
                let options = WorkerOptions {
                    model_path: path.clone(),
                    feature_len: config.feature_len,
                    queue_capacity: config.worker_queue_capacity,
                    shutdown_grace: config.worker_shutdown_grace(),
                };
                match InferenceWorker::start(factory, options) {
                    Ok(worker) => {
                        let info = worker.info();
                        tracing::info!(
                            "Reverb model ready on {} ({} -> {})",
                            info.capabilities.name,
                            info.shape.input_len,
                            info.shape.output_len
                        );
                        (Some(worker), None)
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Reverb model unavailable, using default preset for this session: {}",
                            e
                        );
                        (None, Some(e))
                    }
                }
            }
            None => {
                tracing::info!("No reverb model configured, using default preset");
                (None, None)
            }
        };

        let scheduler = InferenceScheduler::new(store.clone(), worker, (&config).into());

        Ok(ProceduralReverb::from_parts(
            config, store, scheduler, load_error,
        ))
    }
}

#[cfg(feature = "burn")]
fn default_backend() -> BackendFactory {
    reverb_burn::burn_backend_factory()
}

#[cfg(not(feature = "burn"))]
fn default_backend() -> BackendFactory {
    reverb_neural::dense_backend_factory()
}

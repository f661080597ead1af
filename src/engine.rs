//! ProceduralReverb: wires the scheduler, the parameter store and renderers together.

use crate::Result;
use reverb_core::{
    FeatureVector, ReverbConfig, ReverbParameterStore, ReverbParameters, RuntimeOverrides,
};
use reverb_dsp::{ImpulseResponseKernel, ReverbRenderer};
use reverb_neural::{InferenceScheduler, SchedulerState, SchedulerStatsSnapshot};
use std::sync::Arc;
use std::time::Instant;

/// Scene-driven reverb engine.
///
/// Lives on the host's control/game thread. Feed it scene features with
/// [`update_scene`](Self::update_scene) and drive it with [`tick`](Self::tick);
/// renderers created with [`create_renderer`](Self::create_renderer) are moved
/// to the audio thread and pick up published parameters lock-free.
///
/// # Example
///
/// ```ignore
/// use procedural_reverb::prelude::*;
///
/// let mut engine = ProceduralReverb::builder().build()?;
/// let mut renderer = engine.create_renderer();
/// renderer.configure(48000.0, 256, 2)?;
///
/// engine.controls().set_intensity(1.5);
/// engine.update_scene(FeatureVector::new(features)?)?;
/// engine.tick();
/// ```
pub struct ProceduralReverb {
    config: ReverbConfig,
    store: Arc<ReverbParameterStore>,
    scheduler: InferenceScheduler,
    load_error: Option<reverb_neural::Error>,
}

impl ProceduralReverb {
    pub fn builder() -> crate::ProceduralReverbBuilder {
        crate::ProceduralReverbBuilder::default()
    }

    pub(crate) fn from_parts(
        config: ReverbConfig,
        store: Arc<ReverbParameterStore>,
        scheduler: InferenceScheduler,
        load_error: Option<reverb_neural::Error>,
    ) -> Self {
        Self {
            config,
            store,
            scheduler,
            load_error,
        }
    }

    pub fn config(&self) -> &ReverbConfig {
        &self.config
    }

    /// A new renderer reading from this engine's store. Configure it before use.
    pub fn create_renderer(&self) -> ReverbRenderer {
        ReverbRenderer::new(self.store.reader(), self.config.coefficient_hysteresis)
    }

    /// Record the newest scene description; inference picks it up on the next tick.
    pub fn update_scene(&mut self, features: FeatureVector) -> Result<()> {
        self.scheduler.update_features(features)?;
        Ok(())
    }

    /// Sample the partition around `position` and feed the result to the scheduler.
    #[cfg(feature = "scene")]
    pub fn update_listener(
        &mut self,
        tree: &reverb_scene::BspTree,
        position: reverb_scene::Vec3,
    ) -> Result<()> {
        let features = tree.sample_features(position, tree.config().search_radius)?;
        self.update_scene(features)
    }

    /// Drive inference. Returns the parameters published by this call, if any.
    pub fn tick(&mut self) -> Option<ReverbParameters> {
        self.tick_at(Instant::now())
    }

    /// [`tick`](Self::tick) with an explicit clock.
    pub fn tick_at(&mut self, now: Instant) -> Option<ReverbParameters> {
        self.scheduler.poll(now)
    }

    /// Runtime controls (enable, intensity, wet/dry, full override).
    pub fn controls(&self) -> &RuntimeOverrides {
        self.store.overrides()
    }

    /// Latest published (inferred) parameters, before runtime overrides.
    pub fn current_parameters(&self) -> ReverbParameters {
        self.store.latest().params
    }

    /// What renderers are converging towards: published parameters with overrides applied.
    pub fn target_parameters(&self) -> ReverbParameters {
        self.controls().apply(&self.current_parameters())
    }

    /// Sampled response of the current target parameters at the configured sample rate.
    ///
    /// Allocates; never call from the audio thread.
    pub fn impulse_response(&self, seconds: f32) -> Result<ImpulseResponseKernel> {
        Ok(ImpulseResponseKernel::from_parameters(
            &self.target_parameters(),
            self.config.sample_rate as f32,
            seconds,
        )?)
    }

    pub fn has_model(&self) -> bool {
        self.scheduler.has_model()
    }

    /// Why the model is not running, if loading failed.
    pub fn load_error(&self) -> Option<&reverb_neural::Error> {
        self.load_error.as_ref()
    }

    pub fn scheduler_state(&self) -> &SchedulerState {
        self.scheduler.state()
    }

    pub fn stats(&self) -> SchedulerStatsSnapshot {
        self.scheduler.stats().snapshot()
    }

    pub fn store(&self) -> &Arc<ReverbParameterStore> {
        &self.store
    }
}

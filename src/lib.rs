//! # Procedural Reverb
//!
//! Scene-driven room reverb: a neural model predicts reverb parameters from a
//! description of the listener's surroundings, and a parametric reverb renders
//! them into the live audio stream without glitches.
//!
//! ## Architecture
//!
//! Procedural Reverb is an umbrella crate that coordinates:
//! - **reverb-core** - Shared types, lock-free parameter store, runtime overrides, config
//! - **reverb-neural** - Model adapter, inference worker thread, inference scheduler
//! - **reverb-dsp** - Effect slot interface, real-time renderer, impulse-response kernels
//! - **reverb-scene** - BSP partition and acoustic probes producing feature vectors
//! - **reverb-burn** - Burn (NdArray) execution provider
//!
//! ```text
//! scene features → worker (model) → scheduler → parameter store → renderer (audio thread)
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use procedural_reverb::prelude::*;
//!
//! let mut engine = ProceduralReverb::builder()
//!     .model_path("assets/models/room.toml")
//!     .build()?;
//!
//! let mut renderer = engine.create_renderer();
//! renderer.configure(48000.0, 512, 2)?;
//!
//! // control thread
//! engine.update_scene(features)?;
//! engine.tick();
//!
//! // audio thread
//! renderer.process(&input, &mut output, 48000.0, 2);
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - `scene`
//! - `scene` - BSP partition and acoustic probe feature extraction
//! - `burn` - Burn execution provider, used by default when enabled

pub use reverb_core as core;
pub use reverb_dsp as dsp;
pub use reverb_neural as neural;

#[cfg(feature = "scene")]
pub use reverb_scene as scene;

#[cfg(feature = "burn")]
pub use reverb_burn as burn;

pub use reverb_core::{
    BackendFactory, FeatureVector, InferenceBackend, ReverbConfig, ReverbParameterStore,
    ReverbParameters, RuntimeOverrides,
};
pub use reverb_dsp::{EffectSlot, ImpulseResponseKernel, RenderStatsSnapshot, ReverbRenderer};
pub use reverb_neural::{dense_backend_factory, SchedulerState, SchedulerStatsSnapshot};

mod error;
pub use error::{Error, Result};

mod builder;
pub use builder::ProceduralReverbBuilder;

mod engine;
pub use engine::ProceduralReverb;

pub mod prelude {
    pub use crate::{Error, ProceduralReverb, ProceduralReverbBuilder, Result};

    pub use reverb_core::{FeatureVector, ReverbConfig, ReverbParameters, RuntimeOverrides};
    pub use reverb_dsp::{EffectSlot, ReverbRenderer};
    pub use reverb_neural::SchedulerState;

    #[cfg(feature = "scene")]
    pub use reverb_scene::{Aabb, BspTree, PartitionConfig, SceneProbe, Vec3};

    #[cfg(feature = "burn")]
    pub use reverb_burn::burn_backend_factory;
}

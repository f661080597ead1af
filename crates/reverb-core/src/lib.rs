//! Shared types for the procedural reverb engine.
//!
//! # Primary API
//!
//! - [`ReverbParameters`] / [`OutputLayout`]: parameter snapshots and model output decoding
//! - [`ReverbParameterStore`] / [`ParameterReader`]: lock-free handoff to the audio thread
//! - [`RuntimeOverrides`]: enable, intensity, wet/dry and full-bypass controls
//! - [`FeatureVector`]: scene description fed to the model
//! - [`ReverbConfig`]: engine configuration
//! - [`InferenceBackend`] / [`BackendFactory`]: execution provider seam
//! - [`DenseArtifact`]: serialised model format

pub mod error;
pub use error::{Error, InferenceError, ModelLoadError, Result};

pub mod artifact;
pub use artifact::{Activation, DenseArtifact, DenseLayer, ARTIFACT_FORMAT, ARTIFACT_VERSION};

mod config;
pub use config::ReverbConfig;

mod features;
pub use features::FeatureVector;

pub mod inference;
pub use inference::{BackendCapabilities, BackendFactory, InferenceBackend, ModelShape};

pub mod lockfree;
pub use lockfree::{AtomicCounter, AtomicFlag, AtomicFloat};

pub mod params;
pub use params::{
    OutputLayout, ParamRange, ReverbParameters, DAMPING_BANDS, DECAY_TIME_RANGE,
    PRE_DELAY_RANGE, UNIT_RANGE,
};

mod smooth;
pub use smooth::{LinearSmoother, ParameterRamp};

pub mod store;
pub use store::{
    ParameterReader, ParameterSlot, ReverbParameterStore, RuntimeOverrides, Snapshot,
    INTENSITY_RANGE,
};

pub use arc_swap;

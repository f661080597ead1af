//! Inference side of the procedural reverb.
//!
//! Turns scene feature vectors into reverb parameters off the audio thread:
//!
//! - [`ModelRuntimeAdapter`]: a loaded backend plus output validation
//! - [`InferenceWorker`]: the dedicated `reverb-inference` thread
//! - [`InferenceScheduler`]: trigger, supersede and timeout policy; publishes into
//!   a [`reverb_core::ReverbParameterStore`]
//! - [`DenseBackend`]: built-in CPU runner for dense artifacts
//!
//! The execution provider is plugged in through [`reverb_core::BackendFactory`].
//! Use `reverb-burn` for a Burn-based backend, or bring your own.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use reverb_neural::{dense_backend_factory, InferenceScheduler, InferenceWorker, WorkerOptions};
//!
//! let worker = InferenceWorker::start(dense_backend_factory(), WorkerOptions {
//!     model_path: "room.toml".into(),
//!     feature_len: 15,
//!     queue_capacity: 4,
//!     shutdown_grace: Duration::from_millis(250),
//! })?;
//! let mut scheduler = InferenceScheduler::new(store, Some(worker), (&config).into());
//! scheduler.update_features(features)?;
//! scheduler.poll(Instant::now());
//! ```

mod error;
pub use error::{Error, Result};

mod dense;
pub use dense::{dense_backend_factory, DenseBackend};

mod model;
pub use model::ModelRuntimeAdapter;

mod worker;
pub use worker::{
    CancellationToken, InferenceOutcome, InferenceRequest, InferenceWorker, ModelInfo,
    WorkerOptions,
};

mod scheduler;
pub use scheduler::{
    InferenceScheduler, SchedulerConfig, SchedulerState, SchedulerStats, SchedulerStatsSnapshot,
};

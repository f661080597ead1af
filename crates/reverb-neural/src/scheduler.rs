//! Inference scheduling.
//!
//! ```text
//!          trigger                 outcome
//! Idle ───────────────▶ Requesting ────────▶ Idle
//!                          │
//!                          │ superseded / timed out
//!                          ▼
//!                      Cancelled ──────────▶ Idle
//! ```
//!
//! The scheduler is poll-driven: the host calls [`InferenceScheduler::poll`] from
//! its game/control loop. At most one request is in flight; a result whose id no
//! longer matches the in-flight request is dropped unpublished.

use crate::error::{Error, Result};
use crate::worker::{CancellationToken, InferenceOutcome, InferenceRequest, InferenceWorker};

use reverb_core::{
    AtomicCounter, FeatureVector, InferenceError, ReverbConfig, ReverbParameterStore,
    ReverbParameters,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Scheduling knobs, taken from [`ReverbConfig`].
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub feature_len: usize,
    pub interval: Duration,
    pub timeout: Duration,
    pub similarity_threshold: f32,
}

impl From<&ReverbConfig> for SchedulerConfig {
    fn from(config: &ReverbConfig) -> Self {
        Self {
            feature_len: config.feature_len,
            interval: config.inference_interval(),
            timeout: config.request_timeout(),
            similarity_threshold: config.similarity_threshold,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SchedulerState {
    Idle,
    Requesting {
        id: u64,
        submitted_at: Instant,
        features: FeatureVector,
        cancel: CancellationToken,
    },
    /// The request was abandoned; returns to `Idle` on the next poll.
    Cancelled { id: u64 },
}

/// Counters readable from any thread.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    pub submitted: AtomicCounter,
    pub published: AtomicCounter,
    pub superseded: AtomicCounter,
    pub timed_out: AtomicCounter,
    pub failed: AtomicCounter,
    pub stale_discarded: AtomicCounter,
    pub queue_rejected: AtomicCounter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SchedulerStatsSnapshot {
    pub submitted: u64,
    pub published: u64,
    pub superseded: u64,
    pub timed_out: u64,
    pub failed: u64,
    pub stale_discarded: u64,
    pub queue_rejected: u64,
}

impl SchedulerStats {
    pub fn snapshot(&self) -> SchedulerStatsSnapshot {
        SchedulerStatsSnapshot {
            submitted: self.submitted.get(),
            published: self.published.get(),
            superseded: self.superseded.get(),
            timed_out: self.timed_out.get(),
            failed: self.failed.get(),
            stale_discarded: self.stale_discarded.get(),
            queue_rejected: self.queue_rejected.get(),
        }
    }
}

/// Decides when to run inference and publishes results into the store.
pub struct InferenceScheduler {
    worker: Option<InferenceWorker>,
    store: Arc<ReverbParameterStore>,
    config: SchedulerConfig,
    state: SchedulerState,
    next_id: u64,
    latest: Option<FeatureVector>,
    last_requested: Option<(FeatureVector, Instant)>,
    /// Features behind the parameters currently published.
    last_published: Option<FeatureVector>,
    last_error: Option<InferenceError>,
    stats: Arc<SchedulerStats>,
}

impl InferenceScheduler {
    /// `worker = None` runs without a model: features are accepted and ignored,
    /// and the store keeps whatever it holds (the default preset).
    pub fn new(
        store: Arc<ReverbParameterStore>,
        worker: Option<InferenceWorker>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            worker,
            store,
            config,
            state: SchedulerState::Idle,
            next_id: 1,
            latest: None,
            last_requested: None,
            last_published: None,
            last_error: None,
            stats: Arc::new(SchedulerStats::default()),
        }
    }

    /// Record the newest scene description. Takes effect on the next [`poll`](Self::poll).
    pub fn update_features(&mut self, features: FeatureVector) -> Result<()> {
        if features.len() != self.config.feature_len {
            return Err(Error::Core(reverb_core::Error::FeatureLength {
                expected: self.config.feature_len,
                actual: features.len(),
            }));
        }
        self.latest = Some(features);
        Ok(())
    }

    /// Drive the state machine. Returns the parameters published by this call, if any.
    pub fn poll(&mut self, now: Instant) -> Option<ReverbParameters> {
        if self.worker.is_none() {
            return None;
        }

        let published = self.drain_outcomes();

        if let Some((id, elapsed, cancel)) = self.timed_out(now) {
            cancel.cancel();
            tracing::warn!(
                "Inference request {} timed out after {} ms, keeping last parameters",
                id,
                elapsed.as_millis()
            );
            self.stats.timed_out.incr();
            self.last_error = Some(InferenceError::Timeout {
                id,
                elapsed_ms: elapsed.as_millis() as u64,
            });
            self.state = SchedulerState::Cancelled { id };
            return published;
        }

        if let SchedulerState::Cancelled { .. } = self.state {
            self.state = SchedulerState::Idle;
        }

        let Some(features) = self.latest.clone() else {
            return published;
        };

        match &self.state {
            SchedulerState::Idle => {
                if self.should_request(&features, now) {
                    self.issue(features, now);
                }
            }
            SchedulerState::Requesting {
                id,
                features: in_flight,
                cancel,
                ..
            } => {
                if !in_flight.is_similar(&features, self.config.similarity_threshold) {
                    let (id, cancel) = (*id, cancel.clone());
                    cancel.cancel();
                    tracing::debug!("Scene changed, superseding inference request {}", id);
                    self.stats.superseded.incr();
                    self.state = SchedulerState::Cancelled { id };
                    self.issue(features, now);
                }
            }
            SchedulerState::Cancelled { .. } => {}
        }

        published
    }

    fn timed_out(&self, now: Instant) -> Option<(u64, Duration, CancellationToken)> {
        match &self.state {
            SchedulerState::Requesting {
                id,
                submitted_at,
                cancel,
                ..
            } => {
                let elapsed = now.saturating_duration_since(*submitted_at);
                (elapsed >= self.config.timeout).then(|| (*id, elapsed, cancel.clone()))
            }
            _ => None,
        }
    }

    fn should_request(&self, features: &FeatureVector, now: Instant) -> bool {
        let Some((requested, at)) = &self.last_requested else {
            return true;
        };
        if !requested.is_similar(features, self.config.similarity_threshold) {
            return true;
        }
        // Cadence refresh: only when the published result is missing or stale.
        let due = now.saturating_duration_since(*at) >= self.config.interval;
        let up_to_date = self.last_published.as_ref() == Some(features);
        due && !up_to_date
    }

    fn issue(&mut self, features: FeatureVector, now: Instant) {
        let Some(worker) = &self.worker else {
            return;
        };
        let id = self.next_id;
        self.next_id += 1;
        let cancel = CancellationToken::new();
        let request = InferenceRequest {
            id,
            features: features.clone(),
            submitted_at: now,
            cancel: cancel.clone(),
        };

        self.last_requested = Some((features.clone(), now));
        match worker.submit(request) {
            Ok(()) => {
                tracing::trace!("Submitted inference request {}", id);
                self.stats.submitted.incr();
                self.state = SchedulerState::Requesting {
                    id,
                    submitted_at: now,
                    features,
                    cancel,
                };
            }
            Err(e) => {
                tracing::warn!("Could not submit inference request {}: {}", id, e);
                self.stats.queue_rejected.incr();
                self.state = SchedulerState::Idle;
            }
        }
    }

    fn drain_outcomes(&mut self) -> Option<ReverbParameters> {
        let mut published = None;
        while let Some(outcome) = self.worker.as_ref().and_then(InferenceWorker::try_recv) {
            if let Some(params) = self.handle_outcome(outcome) {
                published = Some(params);
            }
        }
        published
    }

    fn handle_outcome(&mut self, outcome: InferenceOutcome) -> Option<ReverbParameters> {
        let features = match &self.state {
            SchedulerState::Requesting { id, features, .. } if *id == outcome.id => {
                features.clone()
            }
            _ => {
                tracing::debug!("Discarding stale inference result {}", outcome.id);
                self.stats.stale_discarded.incr();
                return None;
            }
        };
        self.state = SchedulerState::Idle;

        match outcome.result {
            Ok(params) => match self.store.publish(params) {
                Ok(generation) => {
                    tracing::debug!(
                        "Published reverb parameters (request {}, generation {}, {:?})",
                        outcome.id,
                        generation,
                        outcome.elapsed
                    );
                    self.stats.published.incr();
                    self.last_published = Some(features);
                    self.last_error = None;
                    Some(params)
                }
                Err(e) => {
                    tracing::warn!("Rejected inferred parameters: {}", e);
                    self.stats.failed.incr();
                    None
                }
            },
            Err(e) => {
                tracing::warn!("Inference request {} failed: {}", outcome.id, e);
                self.stats.failed.incr();
                self.last_error = Some(e);
                None
            }
        }
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn in_flight(&self) -> Option<u64> {
        match self.state {
            SchedulerState::Requesting { id, .. } => Some(id),
            _ => None,
        }
    }

    pub fn has_model(&self) -> bool {
        self.worker.is_some()
    }

    pub fn worker(&self) -> Option<&InferenceWorker> {
        self.worker.as_ref()
    }

    pub fn last_error(&self) -> Option<&InferenceError> {
        self.last_error.as_ref()
    }

    pub fn stats(&self) -> &Arc<SchedulerStats> {
        &self.stats
    }

    pub fn store(&self) -> &Arc<ReverbParameterStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::WorkerOptions;
    use crossbeam_channel::Receiver;
    use reverb_core::{BackendCapabilities, InferenceBackend, ModelLoadError, ModelShape};
    use std::path::{Path, PathBuf};

    /// Output depends on the first feature so tests can tell results apart.
    /// When gated, each run waits for one token (or a dropped sender).
    struct EchoBackend {
        gate: Option<Receiver<()>>,
        fail: bool,
    }

    impl InferenceBackend for EchoBackend {
        fn load_model(&mut self, _path: &Path) -> std::result::Result<ModelShape, ModelLoadError> {
            Ok(ModelShape {
                input_len: 2,
                output_len: 4,
            })
        }

        fn run(&mut self, input: &[f32]) -> std::result::Result<Vec<f32>, InferenceError> {
            if let Some(gate) = &self.gate {
                let _ = gate.recv();
            }
            if self.fail {
                return Err(InferenceError::Runtime("boom".into()));
            }
            Ok(vec![input[0], 0.5, 0.5, 0.5])
        }

        fn capabilities(&self) -> BackendCapabilities {
            BackendCapabilities {
                name: "echo".into(),
                has_gpu: false,
            }
        }
    }

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            feature_len: 2,
            interval: Duration::from_millis(100),
            timeout: Duration::from_millis(200),
            similarity_threshold: 0.05,
        }
    }

    fn scheduler(gate: Option<Receiver<()>>, fail: bool) -> InferenceScheduler {
        let worker = InferenceWorker::start(
            Box::new(move || Ok(Box::new(EchoBackend { gate, fail }) as Box<dyn InferenceBackend>)),
            WorkerOptions {
                model_path: PathBuf::from("echo"),
                feature_len: 2,
                queue_capacity: 4,
                shutdown_grace: Duration::from_millis(20),
            },
        )
        .unwrap();
        InferenceScheduler::new(Arc::new(ReverbParameterStore::new(4)), Some(worker), config())
    }

    fn fv(first: f32) -> FeatureVector {
        FeatureVector::new(vec![first, 1.0]).unwrap()
    }

    /// Poll with wall-clock time until something is published or 5 s pass.
    fn poll_until_published(s: &mut InferenceScheduler) -> Option<ReverbParameters> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Some(p) = s.poll(Instant::now()) {
                return Some(p);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        None
    }

    #[test]
    fn test_publishes_result() {
        let mut s = scheduler(None, false);
        s.update_features(fv(2.0)).unwrap();
        let published = poll_until_published(&mut s).unwrap();
        assert_eq!(published.decay_time, 2.0);
        assert_eq!(s.store().latest().params, published);
        assert!(matches!(s.state(), SchedulerState::Idle));
        assert!(s.last_error().is_none());
        assert_eq!(s.stats().snapshot().published, 1);
    }

    #[test]
    fn test_static_scene_not_requeried() {
        let mut s = scheduler(None, false);
        s.update_features(fv(2.0)).unwrap();
        poll_until_published(&mut s).unwrap();

        // Same features, well past the cadence: nothing new to compute.
        s.update_features(fv(2.0)).unwrap();
        s.poll(Instant::now() + Duration::from_secs(10));
        assert!(s.in_flight().is_none());
        assert_eq!(s.stats().snapshot().submitted, 1);
    }

    #[test]
    fn test_wrong_feature_len_rejected() {
        let mut s = scheduler(None, false);
        assert!(s.update_features(FeatureVector::new(vec![1.0]).unwrap()).is_err());
    }

    #[test]
    fn test_supersede_discards_stale_result() {
        let (gate_tx, gate_rx) = crossbeam_channel::unbounded();
        let mut s = scheduler(Some(gate_rx), false);

        let now = Instant::now();
        s.update_features(fv(2.0)).unwrap();
        s.poll(now);
        let first = s.in_flight().unwrap();

        s.update_features(fv(9.0)).unwrap();
        s.poll(now);
        let second = s.in_flight().unwrap();
        assert_ne!(first, second);
        assert_eq!(s.stats().snapshot().superseded, 1);

        // Release both runs. The first was cancelled mid-run and never reported.
        gate_tx.send(()).unwrap();
        gate_tx.send(()).unwrap();
        let published = poll_until_published(&mut s).unwrap();
        assert_eq!(published.decay_time, 9.0);
        assert_eq!(s.store().latest().params.decay_time, 9.0);
    }

    #[test]
    fn test_timeout_keeps_last_parameters() {
        let (gate_tx, gate_rx) = crossbeam_channel::unbounded::<()>();
        let mut s = scheduler(Some(gate_rx), false);
        let before = s.store().latest();

        let now = Instant::now();
        s.update_features(fv(3.0)).unwrap();
        s.poll(now);
        let id = s.in_flight().unwrap();

        s.poll(now + Duration::from_millis(250));
        assert!(matches!(s.state(), SchedulerState::Cancelled { id: c } if *c == id));
        assert!(matches!(
            s.last_error(),
            Some(InferenceError::Timeout { id: t, .. }) if *t == id
        ));
        assert_eq!(s.stats().snapshot().timed_out, 1);
        assert_eq!(s.store().latest(), before);

        // Late result never lands.
        gate_tx.send(()).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        s.poll(now + Duration::from_millis(260));
        assert_eq!(s.store().latest(), before);
        drop(gate_tx);
    }

    #[test]
    fn test_failure_is_recorded_and_retried_on_cadence() {
        let mut s = scheduler(None, true);
        s.update_features(fv(1.0)).unwrap();
        let start = Instant::now();
        s.poll(start);

        let deadline = Instant::now() + Duration::from_secs(5);
        while s.stats().snapshot().failed == 0 && Instant::now() < deadline {
            s.poll(start);
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(matches!(s.last_error(), Some(InferenceError::Runtime(_))));
        assert!(!s.store().has_published());

        // Unchanged scene, but nothing published yet: the cadence retries.
        s.poll(start + Duration::from_millis(150));
        assert_eq!(s.stats().snapshot().submitted, 2);
    }

    #[test]
    fn test_without_model_is_inert() {
        let store = Arc::new(ReverbParameterStore::new(4));
        let mut s = InferenceScheduler::new(store.clone(), None, config());
        s.update_features(fv(1.0)).unwrap();
        assert!(s.poll(Instant::now()).is_none());
        assert!(!s.has_model());
        assert!(!store.has_published());
    }
}

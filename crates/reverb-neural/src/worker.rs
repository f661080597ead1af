//! Dedicated inference thread.
//!
//! The backend is created and the model loaded on the worker thread itself, so
//! backends never need to be `Send`. Requests go in over a bounded channel and
//! outcomes come back over another; nothing here is touched by the audio thread.

use crate::error::{Error, Result};
use crate::model::ModelRuntimeAdapter;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use reverb_core::{
    BackendCapabilities, BackendFactory, FeatureVector, InferenceError, ModelLoadError,
    ModelShape, ReverbParameters,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const IDLE_POLL: Duration = Duration::from_millis(20);

/// Cooperative cancellation flag shared between the scheduler and the worker.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// One inference job. Consumed exactly once by the worker.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub id: u64,
    pub features: FeatureVector,
    pub submitted_at: Instant,
    pub cancel: CancellationToken,
}

#[derive(Debug)]
pub struct InferenceOutcome {
    pub id: u64,
    pub result: std::result::Result<ReverbParameters, InferenceError>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub model_path: PathBuf,
    pub feature_len: usize,
    pub queue_capacity: usize,
    pub shutdown_grace: Duration,
}

/// What the worker reports once its model is up.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub shape: ModelShape,
    pub capabilities: BackendCapabilities,
}

enum WorkerCommand {
    Infer(InferenceRequest),
    Shutdown,
}

/// Handle to the inference thread.
pub struct InferenceWorker {
    cmd_tx: Sender<WorkerCommand>,
    outcome_rx: Receiver<InferenceOutcome>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    info: ModelInfo,
    shutdown_grace: Duration,
}

impl InferenceWorker {
    /// Spawn the worker, build the backend there and load the model.
    ///
    /// Blocks until the load finishes. A load failure is returned as
    /// [`Error::ModelLoad`] and the thread exits.
    pub fn start(factory: BackendFactory, options: WorkerOptions) -> Result<Self> {
        if options.queue_capacity == 0 {
            return Err(Error::InvalidConfig("queue_capacity must be > 0".into()));
        }

        let (cmd_tx, cmd_rx) = crossbeam_channel::bounded::<WorkerCommand>(options.queue_capacity);
        let (outcome_tx, outcome_rx) =
            crossbeam_channel::bounded::<InferenceOutcome>(options.queue_capacity);
        let (ready_tx, ready_rx) =
            crossbeam_channel::bounded::<std::result::Result<ModelInfo, ModelLoadError>>(1);
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();

        let model_path = options.model_path.clone();
        let feature_len = options.feature_len;

        let thread = std::thread::Builder::new()
            .name("reverb-inference".into())
            .spawn(move || {
                let adapter = factory().and_then(|backend| {
                    ModelRuntimeAdapter::load(backend, &model_path, feature_len)
                });
                match adapter {
                    Ok(adapter) => {
                        let info = ModelInfo {
                            shape: adapter.shape(),
                            capabilities: adapter.capabilities(),
                        };
                        if ready_tx.send(Ok(info)).is_ok() {
                            worker_loop(adapter, cmd_rx, outcome_tx, &running_clone);
                        }
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
                running_clone.store(false, Ordering::Release);
            })
            .map_err(|e| Error::WorkerSpawn(e.to_string()))?;

        let info = match ready_rx.recv() {
            Ok(Ok(info)) => info,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(Error::ModelLoad(e));
            }
            Err(_) => {
                let _ = thread.join();
                return Err(Error::WorkerRecv);
            }
        };

        Ok(Self {
            cmd_tx,
            outcome_rx,
            running,
            thread: Some(thread),
            info,
            shutdown_grace: options.shutdown_grace,
        })
    }

    /// Queue a request without blocking.
    pub fn submit(&self, request: InferenceRequest) -> Result<()> {
        match self.cmd_tx.try_send(WorkerCommand::Infer(request)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(Error::QueueFull),
            Err(TrySendError::Disconnected(_)) => Err(Error::WorkerSend),
        }
    }

    /// Next finished outcome, if any.
    pub fn try_recv(&self) -> Option<InferenceOutcome> {
        self.outcome_rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next outcome.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<InferenceOutcome> {
        self.outcome_rx.recv_timeout(timeout).ok()
    }

    pub fn info(&self) -> &ModelInfo {
        &self.info
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop the thread, waiting at most the shutdown grace.
    ///
    /// A backend stuck inside a forward pass cannot be interrupted; after the
    /// grace period the thread is detached and finishes on its own.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        let _ = self.cmd_tx.try_send(WorkerCommand::Shutdown);

        let Some(handle) = self.thread.take() else {
            return;
        };
        let deadline = Instant::now() + self.shutdown_grace;
        while !handle.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        if handle.is_finished() {
            let _ = handle.join();
        } else {
            tracing::warn!(
                "Inference thread still busy after {:?}, detaching",
                self.shutdown_grace
            );
        }
    }
}

impl Drop for InferenceWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    mut adapter: ModelRuntimeAdapter,
    cmd_rx: Receiver<WorkerCommand>,
    outcome_tx: Sender<InferenceOutcome>,
    running: &AtomicBool,
) {
    tracing::info!(
        "Inference thread started (backend: {})",
        adapter.capabilities().name
    );

    while running.load(Ordering::Acquire) {
        let request = match cmd_rx.recv_timeout(IDLE_POLL) {
            Ok(WorkerCommand::Infer(request)) => request,
            Ok(WorkerCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => continue,
        };

        if request.cancel.is_cancelled() {
            tracing::trace!("Skipping cancelled inference request {}", request.id);
            continue;
        }

        let started = Instant::now();
        let result = adapter.infer(&request.features);
        if let Err(e) = &result {
            tracing::debug!("Inference request {} failed: {}", request.id, e);
        }

        if request.cancel.is_cancelled() {
            tracing::trace!("Discarding result of cancelled request {}", request.id);
            continue;
        }

        let outcome = InferenceOutcome {
            id: request.id,
            result,
            elapsed: started.elapsed(),
        };
        if let Err(TrySendError::Full(outcome)) = outcome_tx.try_send(outcome) {
            tracing::trace!("Outcome queue full, dropping result {}", outcome.id);
        }
    }

    tracing::info!("Inference thread shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use reverb_core::InferenceBackend;
    use std::path::Path;

    /// Echoes a fixed compact output, optionally waiting on a gate first.
    struct GatedBackend {
        output: Vec<f32>,
        gate: Option<Receiver<()>>,
    }

    impl InferenceBackend for GatedBackend {
        fn load_model(&mut self, _path: &Path) -> std::result::Result<ModelShape, ModelLoadError> {
            Ok(ModelShape {
                input_len: 2,
                output_len: self.output.len(),
            })
        }

        fn run(&mut self, _input: &[f32]) -> std::result::Result<Vec<f32>, InferenceError> {
            if let Some(gate) = &self.gate {
                let _ = gate.recv();
            }
            Ok(self.output.clone())
        }

        fn capabilities(&self) -> BackendCapabilities {
            BackendCapabilities {
                name: "gated".into(),
                has_gpu: false,
            }
        }
    }

    fn options() -> WorkerOptions {
        WorkerOptions {
            model_path: PathBuf::from("gated"),
            feature_len: 2,
            queue_capacity: 4,
            shutdown_grace: Duration::from_millis(50),
        }
    }

    fn factory(output: Vec<f32>, gate: Option<Receiver<()>>) -> BackendFactory {
        Box::new(move || Ok(Box::new(GatedBackend { output, gate }) as Box<dyn InferenceBackend>))
    }

    fn request(id: u64) -> InferenceRequest {
        InferenceRequest {
            id,
            features: FeatureVector::new(vec![0.0, 1.0]).unwrap(),
            submitted_at: Instant::now(),
            cancel: CancellationToken::new(),
        }
    }

    #[test]
    fn test_roundtrip() {
        let worker = InferenceWorker::start(factory(vec![1.0, 0.5, 0.5, 0.2], None), options())
            .unwrap();
        assert_eq!(worker.info().capabilities.name, "gated");

        worker.submit(request(7)).unwrap();
        let outcome = worker.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.id, 7);
        assert_eq!(outcome.result.unwrap().wet_dry, 0.2);
    }

    #[test]
    fn test_load_failure_reported() {
        let result = InferenceWorker::start(
            Box::new(|| Err(ModelLoadError::Backend("no device".into()))),
            options(),
        );
        assert!(matches!(
            result,
            Err(Error::ModelLoad(ModelLoadError::Backend(_)))
        ));
    }

    #[test]
    fn test_incompatible_model_reported() {
        let result = InferenceWorker::start(factory(vec![0.0; 3], None), options());
        assert!(matches!(
            result,
            Err(Error::ModelLoad(ModelLoadError::Incompatible(_)))
        ));
    }

    #[test]
    fn test_cancelled_request_is_skipped() {
        let worker = InferenceWorker::start(factory(vec![1.0, 0.5, 0.5, 0.2], None), options())
            .unwrap();
        let cancelled = request(1);
        cancelled.cancel.cancel();
        worker.submit(cancelled).unwrap();
        worker.submit(request(2)).unwrap();

        let outcome = worker.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.id, 2);
    }

    #[test]
    fn test_cancel_while_running_discards_result() {
        let (gate_tx, gate_rx) = crossbeam_channel::bounded(1);
        let worker = InferenceWorker::start(
            factory(vec![1.0, 0.5, 0.5, 0.2], Some(gate_rx)),
            options(),
        )
        .unwrap();

        let req = request(3);
        let token = req.cancel.clone();
        worker.submit(req).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        token.cancel();
        gate_tx.send(()).unwrap();

        assert!(worker.recv_timeout(Duration::from_millis(200)).is_none());
    }

    #[test]
    fn test_shutdown_detaches_stuck_backend() {
        let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(1);
        let mut worker = InferenceWorker::start(
            factory(vec![1.0, 0.5, 0.5, 0.2], Some(gate_rx)),
            options(),
        )
        .unwrap();
        worker.submit(request(1)).unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let start = Instant::now();
        worker.shutdown();
        assert!(start.elapsed() < Duration::from_secs(2));
        // Releases the detached thread.
        drop(gate_tx);
    }
}

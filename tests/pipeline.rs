//! End-to-end engine scenarios: scene features in, rendered audio out.

use approx::assert_relative_eq;
use procedural_reverb::core::{
    Activation, BackendCapabilities, DenseArtifact, DenseLayer, InferenceBackend, InferenceError,
    ModelLoadError, ModelShape,
};
use procedural_reverb::prelude::*;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const SR: f64 = 48000.0;
const FRAMES: usize = 256;
const CHANNELS: usize = 2;

fn impulse_block() -> Vec<f32> {
    let mut block = vec![0.0; FRAMES * CHANNELS];
    block[0] = 1.0;
    block[1] = 1.0;
    block
}

fn features(first: f32) -> FeatureVector {
    let mut values = vec![1.0; 15];
    values[0] = first;
    FeatureVector::new(values).unwrap()
}

fn render(renderer: &mut ReverbRenderer, blocks: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(blocks * FRAMES * CHANNELS);
    let silence = vec![0.0; FRAMES * CHANNELS];
    for i in 0..blocks {
        let input = if i == 0 { impulse_block() } else { silence.clone() };
        let mut output = vec![0.0; FRAMES * CHANNELS];
        renderer.process(&input, &mut output, SR, CHANNELS);
        out.extend_from_slice(&output);
    }
    out
}

fn tick_until_published(engine: &mut ProceduralReverb) -> Option<ReverbParameters> {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if let Some(p) = engine.tick() {
            return Some(p);
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    None
}

/// Compact-layout output `[feature0, 0.6, 0.5, 0.4]`. Each run optionally waits
/// on a gate (a receiver shared with the test) before answering.
struct SceneEchoBackend {
    gate: Option<Arc<Mutex<std::sync::mpsc::Receiver<()>>>>,
    delay: Duration,
}

impl InferenceBackend for SceneEchoBackend {
    fn load_model(&mut self, _path: &Path) -> std::result::Result<ModelShape, ModelLoadError> {
        Ok(ModelShape {
            input_len: 15,
            output_len: 4,
        })
    }

    fn run(&mut self, input: &[f32]) -> std::result::Result<Vec<f32>, InferenceError> {
        if let Some(gate) = &self.gate {
            if let Ok(rx) = gate.lock() {
                let _ = rx.recv();
            }
        }
        std::thread::sleep(self.delay);
        Ok(vec![input[0], 0.6, 0.5, 0.4])
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            name: "scene-echo".into(),
            has_gpu: false,
        }
    }
}

fn echo_engine(
    gate: Option<Arc<Mutex<std::sync::mpsc::Receiver<()>>>>,
    delay: Duration,
    timeout_ms: u64,
) -> ProceduralReverb {
    let config = ReverbConfig {
        request_timeout_ms: timeout_ms,
        ramp_callbacks: 4,
        ..Default::default()
    };
    ProceduralReverb::builder()
        .config(config)
        .model_path("scene-echo")
        .backend(Box::new(move || {
            Ok(Box::new(SceneEchoBackend { gate, delay }) as Box<dyn InferenceBackend>)
        }))
        .build()
        .unwrap()
}

#[test]
fn test_no_model_renders_default_preset() {
    let engine = ProceduralReverb::builder().build().unwrap();
    let mut renderer = engine.create_renderer();
    renderer.configure(SR, FRAMES, CHANNELS).unwrap();

    let out = render(&mut renderer, 10);
    let stats = renderer.stats().snapshot();
    assert_eq!(stats.blocks_rendered, 10);
    assert_eq!(stats.default_preset_blocks, 10);
    assert_eq!(
        renderer.applied_parameters(),
        Some(ReverbParameters::default_preset())
    );
    assert!(out.iter().all(|s| s.is_finite()));
    // The tail carries energy after the dry impulse.
    assert!(out[FRAMES * CHANNELS..].iter().any(|s| s.abs() > 1e-6));
}

#[test]
fn test_model_from_disk_drives_renderer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("room.toml");
    let artifact = DenseArtifact::new(
        15,
        vec![DenseLayer::new(
            vec![vec![0.0; 15]; 4],
            vec![2.0, 0.7, 0.6, 0.4],
            Activation::Linear,
        )],
    );
    std::fs::write(&path, artifact.to_toml_string().unwrap()).unwrap();

    let config = ReverbConfig {
        ramp_callbacks: 4,
        ..Default::default()
    }
    .with_model_path(&path);
    let mut engine = ProceduralReverb::builder().config(config).build().unwrap();
    assert!(engine.has_model());
    assert!(engine.load_error().is_none());

    let mut renderer = engine.create_renderer();
    renderer.configure(SR, FRAMES, CHANNELS).unwrap();

    engine.update_scene(features(3.0)).unwrap();
    let published = tick_until_published(&mut engine).unwrap();
    assert_relative_eq!(published.decay_time, 2.0);
    assert_relative_eq!(published.room_size, 0.6);
    assert_eq!(engine.current_parameters(), published);

    render(&mut renderer, 8);
    assert_eq!(renderer.applied_parameters(), Some(published));
    assert_eq!(engine.stats().published, 1);
}

#[test]
fn test_corrupt_model_falls_back_to_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("room.toml");
    std::fs::write(&path, "this is not a model").unwrap();

    let mut engine = ProceduralReverb::builder().model_path(&path).build().unwrap();
    assert!(!engine.has_model());
    assert!(engine.load_error().is_some());

    let mut renderer = engine.create_renderer();
    renderer.configure(SR, FRAMES, CHANNELS).unwrap();
    engine.update_scene(features(3.0)).unwrap();
    assert!(engine.tick().is_none());
    render(&mut renderer, 4);
    assert_eq!(renderer.stats().snapshot().default_preset_blocks, 4);
}

#[test]
fn test_timeout_keeps_previous_parameters() {
    let mut engine = echo_engine(None, Duration::from_millis(300), 50);
    let before = engine.current_parameters();
    let mut renderer = engine.create_renderer();
    renderer.configure(SR, FRAMES, CHANNELS).unwrap();

    let now = Instant::now();
    engine.update_scene(features(3.0)).unwrap();
    engine.tick_at(now);
    assert!(matches!(
        engine.scheduler_state(),
        SchedulerState::Requesting { .. }
    ));

    engine.tick_at(now + Duration::from_millis(60));
    assert!(matches!(
        engine.scheduler_state(),
        SchedulerState::Cancelled { .. }
    ));
    assert_eq!(engine.stats().timed_out, 1);
    assert_eq!(engine.current_parameters(), before);

    // The late result is cancelled on the worker and never published.
    std::thread::sleep(Duration::from_millis(400));
    engine.tick_at(now + Duration::from_millis(70));
    assert_eq!(engine.current_parameters(), before);

    // Rendering carried on throughout with the default preset.
    let out = render(&mut renderer, 10);
    let stats = renderer.stats().snapshot();
    assert_eq!(stats.blocks_rendered, 10);
    assert_eq!(stats.default_preset_blocks, 10);
    assert!(out[FRAMES * CHANNELS..].iter().any(|s| s.abs() > 1e-6));
}

#[test]
fn test_scene_change_supersedes_in_flight_request() {
    let (gate_tx, gate_rx) = std::sync::mpsc::channel();
    let mut engine = echo_engine(
        Some(Arc::new(Mutex::new(gate_rx))),
        Duration::ZERO,
        10_000,
    );

    engine.update_scene(features(2.0)).unwrap();
    engine.tick();
    engine.update_scene(features(9.0)).unwrap();
    engine.tick();
    assert_eq!(engine.stats().superseded, 1);

    gate_tx.send(()).unwrap();
    gate_tx.send(()).unwrap();
    let published = tick_until_published(&mut engine).unwrap();
    assert_eq!(published.decay_time, 9.0);
    assert_eq!(engine.current_parameters().decay_time, 9.0);
}

#[test]
fn test_republishing_same_parameters_does_not_ramp() {
    let engine = ProceduralReverb::builder()
        .config(ReverbConfig {
            ramp_callbacks: 4,
            ..Default::default()
        })
        .build()
        .unwrap();
    let mut renderer = engine.create_renderer();
    renderer.configure(SR, FRAMES, CHANNELS).unwrap();

    let p1 = ReverbParameters {
        decay_time: 3.0,
        wet_dry: 0.6,
        ..ReverbParameters::default_preset()
    };
    engine.store().publish(p1).unwrap();
    render(&mut renderer, 6);
    assert_eq!(renderer.applied_parameters(), Some(p1));
    let updates = renderer.stats().snapshot().coefficient_updates;

    engine.store().publish(p1).unwrap();
    render(&mut renderer, 6);
    assert_eq!(renderer.stats().snapshot().coefficient_updates, updates);
    assert_eq!(renderer.applied_parameters(), Some(p1));
}

#[test]
fn test_override_bypasses_inferred_parameters() {
    let engine = ProceduralReverb::builder()
        .config(ReverbConfig {
            ramp_callbacks: 2,
            ..Default::default()
        })
        .build()
        .unwrap();
    let mut renderer = engine.create_renderer();
    renderer.configure(SR, FRAMES, CHANNELS).unwrap();

    let manual = ReverbParameters {
        decay_time: 0.5,
        room_size: 0.2,
        ..ReverbParameters::default_preset()
    };
    engine.controls().set_parameters(Some(manual));
    engine
        .store()
        .publish(ReverbParameters {
            decay_time: 8.0,
            ..ReverbParameters::default_preset()
        })
        .unwrap();

    render(&mut renderer, 4);
    assert_eq!(renderer.applied_parameters(), Some(manual));

    engine.controls().set_parameters(None);
    render(&mut renderer, 4);
    assert_eq!(renderer.applied_parameters().unwrap().decay_time, 8.0);
}

#[test]
fn test_disable_ramps_wet_to_zero() {
    let engine = ProceduralReverb::builder()
        .config(ReverbConfig {
            ramp_callbacks: 2,
            ..Default::default()
        })
        .build()
        .unwrap();
    let mut renderer = engine.create_renderer();
    renderer.configure(SR, FRAMES, CHANNELS).unwrap();
    render(&mut renderer, 2);

    engine.controls().set_enabled(false);
    // Let the ramp and the per-sample smoother settle, then a fresh impulse comes out dry.
    render(&mut renderer, 4);
    let mut output = vec![0.0; FRAMES * CHANNELS];
    renderer.process(&impulse_block(), &mut output, SR, CHANNELS);
    assert_eq!(output[0], 1.0);
    assert!(output[2..].iter().all(|s| s.abs() < 1e-6));
}

#[cfg(feature = "scene")]
#[test]
fn test_listener_features_from_partition() {
    use procedural_reverb::scene::BoxRoom;

    let bounds = Aabb::new(Vec3::ZERO, Vec3::new(1200.0, 800.0, 300.0));
    let mut tree = BspTree::build(bounds, &PartitionConfig::default()).unwrap();
    tree.collect_acoustic_data(&BoxRoom::new(bounds));

    let mut engine = echo_engine(None, Duration::ZERO, 10_000);
    engine
        .update_listener(&tree, Vec3::new(600.0, 400.0, 150.0))
        .unwrap();
    engine.tick();
    assert_eq!(engine.stats().submitted, 1);

    // The echo backend returns the room length (1200) as decay time: out of
    // range, so it is rejected rather than clamped.
    let deadline = Instant::now() + Duration::from_secs(5);
    while engine.stats().failed == 0 && Instant::now() < deadline {
        engine.tick();
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(engine.stats().failed, 1);
    assert_eq!(engine.stats().published, 0);
    assert_eq!(engine.current_parameters(), ReverbParameters::default_preset());

    // Far outside the partition there is nothing to blend.
    assert!(matches!(
        engine.update_listener(&tree, Vec3::splat(1.0e6)),
        Err(Error::Scene(_))
    ));
}

//! Cross-thread handoff of reverb parameters.
//!
//! The inference side publishes immutable snapshots; the audio thread reads them
//! through a [`ParameterReader`] that never blocks and never allocates. The only
//! shared state is a [`ParameterSlot`] of atomically swapped `Arc`s plus a set of
//! atomic [`RuntimeOverrides`].
//!
//! ```text
//! publish(P) ──▶ pending ──commit──▶ current ──load──▶ ParameterReader ──ramp──▶ renderer
//!                                       ▲
//!                     RuntimeOverrides ─┘ (applied on the reader side)
//! ```

use crate::error::{Error, Result};
use crate::lockfree::{AtomicFlag, AtomicFloat};
use crate::params::{ParamRange, ReverbParameters, DECAY_TIME_RANGE, UNIT_RANGE};
use crate::smooth::ParameterRamp;
use arc_swap::{ArcSwap, ArcSwapOption};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Accepted range for the intensity control.
pub const INTENSITY_RANGE: ParamRange = ParamRange::new(0.0, 2.0);

/// A published parameter set. Never mutated once visible to a reader.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    /// 0 = the built-in default preset; increments per publish.
    pub generation: u64,
    pub params: ReverbParameters,
}

/// Double-buffered holder: writers stage into `pending`, then swap it into `current`.
///
/// Readers only ever see `current`. At most two snapshots are alive in the slot.
pub struct ParameterSlot {
    current: ArcSwap<Snapshot>,
    pending: ArcSwapOption<Snapshot>,
}

impl ParameterSlot {
    pub fn new(initial: Snapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
            pending: ArcSwapOption::empty(),
        }
    }

    /// Stage a snapshot. Replaces any uncommitted one.
    pub fn stage(&self, snapshot: Snapshot) {
        self.pending.store(Some(Arc::new(snapshot)));
    }

    /// Atomically promote the pending snapshot. Returns `false` if nothing was staged.
    pub fn commit(&self) -> bool {
        match self.pending.swap(None) {
            Some(next) => {
                self.current.store(next);
                true
            }
            None => false,
        }
    }

    /// Lock-free, allocation-free read of the current snapshot.
    #[inline]
    pub fn current(&self) -> Snapshot {
        **self.current.load()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.load().is_some()
    }
}

/// Runtime controls layered over inferred values without restarting rendering.
///
/// Every setter is lock-free; the reader picks changes up on its next callback and
/// ramps to them like any other parameter change.
#[derive(Debug)]
pub struct RuntimeOverrides {
    enabled: AtomicFlag,
    intensity: AtomicFloat,
    wet_override_active: AtomicFlag,
    wet_override: AtomicFloat,
    parameters: ArcSwapOption<ReverbParameters>,
}

impl Default for RuntimeOverrides {
    fn default() -> Self {
        Self {
            enabled: AtomicFlag::new(true),
            intensity: AtomicFloat::new(1.0),
            wet_override_active: AtomicFlag::new(false),
            wet_override: AtomicFloat::new(0.0),
            parameters: ArcSwapOption::empty(),
        }
    }
}

impl RuntimeOverrides {
    /// Disabling fades the wet signal out instead of cutting it.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    /// Clamped to 0..=2. Scales wet level and decay time.
    pub fn set_intensity(&self, intensity: f32) {
        self.intensity.set(INTENSITY_RANGE.clamp(intensity));
    }

    pub fn intensity(&self) -> f32 {
        self.intensity.get()
    }

    /// `None` restores the inferred wet/dry ratio.
    pub fn set_wet_dry(&self, wet_dry: Option<f32>) {
        match wet_dry {
            Some(value) => {
                self.wet_override.set(UNIT_RANGE.clamp(value));
                self.wet_override_active.set(true);
            }
            None => self.wet_override_active.set(false),
        }
    }

    pub fn wet_dry(&self) -> Option<f32> {
        self.wet_override_active
            .get()
            .then(|| self.wet_override.get())
    }

    /// Bypass inferred values entirely. Out-of-range fields are clamped.
    pub fn set_parameters(&self, params: Option<ReverbParameters>) {
        self.parameters
            .store(params.map(|p| Arc::new(p.clamped())));
    }

    pub fn parameters(&self) -> Option<ReverbParameters> {
        self.parameters.load().as_deref().copied()
    }

    /// Resolve the effective target for the audio thread.
    #[inline]
    pub fn apply(&self, inferred: &ReverbParameters) -> ReverbParameters {
        let mut params = match &*self.parameters.load() {
            Some(forced) => **forced,
            None => *inferred,
        };

        if self.wet_override_active.get() {
            params.wet_dry = self.wet_override.get();
        }

        let intensity = self.intensity.get();
        if intensity != 1.0 {
            params.wet_dry = UNIT_RANGE.clamp(params.wet_dry * intensity);
            params.decay_time = DECAY_TIME_RANGE.clamp(params.decay_time * intensity);
        }

        if !self.enabled.get() {
            params.wet_dry = 0.0;
        }

        params
    }
}

/// Thread-safe holder of the most recent validated reverb parameters.
pub struct ReverbParameterStore {
    slot: ParameterSlot,
    overrides: RuntimeOverrides,
    generation: AtomicU64,
    ramp_callbacks: u32,
}

impl ReverbParameterStore {
    /// Starts out exposing the default preset (generation 0).
    pub fn new(ramp_callbacks: u32) -> Self {
        Self::with_initial(ReverbParameters::default_preset(), ramp_callbacks)
    }

    pub fn with_initial(initial: ReverbParameters, ramp_callbacks: u32) -> Self {
        Self {
            slot: ParameterSlot::new(Snapshot {
                generation: 0,
                params: initial,
            }),
            overrides: RuntimeOverrides::default(),
            generation: AtomicU64::new(0),
            ramp_callbacks,
        }
    }

    /// Writer side. Rejects invalid parameters; otherwise stages and commits
    /// a new snapshot and returns its generation.
    pub fn publish(&self, params: ReverbParameters) -> Result<u64> {
        params
            .validate()
            .map_err(|e| Error::InvalidParameters(e.to_string()))?;

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.slot.stage(Snapshot { generation, params });
        self.slot.commit();
        Ok(generation)
    }

    /// Most recently committed snapshot, before overrides and ramping.
    pub fn latest(&self) -> Snapshot {
        self.slot.current()
    }

    pub fn has_published(&self) -> bool {
        self.generation.load(Ordering::Acquire) > 0
    }

    pub fn overrides(&self) -> &RuntimeOverrides {
        &self.overrides
    }

    pub fn ramp_callbacks(&self) -> u32 {
        self.ramp_callbacks
    }

    /// Create the audio-thread reader. Call off the audio thread.
    pub fn reader(self: &Arc<Self>) -> ParameterReader {
        let snapshot = self.latest();
        let initial = self.overrides.apply(&snapshot.params);
        ParameterReader {
            store: Arc::clone(self),
            ramp: ParameterRamp::new(initial, self.ramp_callbacks),
            generation: snapshot.generation,
        }
    }
}

/// Audio-thread view of a [`ReverbParameterStore`].
///
/// Owns the ramp state, so `read` takes `&mut self`; the store itself stays shared.
pub struct ParameterReader {
    store: Arc<ReverbParameterStore>,
    ramp: ParameterRamp,
    generation: u64,
}

impl ParameterReader {
    /// Once per audio callback. Bounded time, no locks, no allocation.
    #[inline]
    pub fn read(&mut self) -> ReverbParameters {
        let snapshot = self.store.slot.current();
        self.generation = snapshot.generation;
        let target = self.store.overrides.apply(&snapshot.params);
        self.ramp.retarget(target);
        self.ramp.advance()
    }

    /// Generation of the snapshot seen by the last `read`. 0 = default preset.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_ramping(&self) -> bool {
        self.ramp.is_ramping()
    }

    pub fn store(&self) -> &Arc<ReverbParameterStore> {
        &self.store
    }
}

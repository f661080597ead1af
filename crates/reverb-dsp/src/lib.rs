//! Real-time side of the procedural reverb.
//!
//! - [`EffectSlot`]: the narrow host-facing interface (`configure` + `process`)
//! - [`ReverbRenderer`]: parametric reverb fed by a [`reverb_core::ParameterReader`]
//! - [`ReverbTank`]: the per-channel comb/allpass network
//! - [`ImpulseResponseKernel`]: offline sampled response for a parameter set
//!
//! The renderer never allocates, locks or logs inside `process`.

mod error;
pub use error::{Error, Result};

mod slot;
pub use slot::EffectSlot;

pub mod network;
pub use network::{DelayLine, ReverbTank};

mod renderer;
pub use renderer::{RenderStats, RenderStatsSnapshot, ReverbRenderer};

mod kernel;
pub use kernel::{ImpulseResponseKernel, MAX_KERNEL_SECONDS};

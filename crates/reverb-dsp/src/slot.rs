//! Host effect slot interface.

use crate::error::Result;

/// A per-submix (or per-voice) effect as the host audio engine sees it.
///
/// One non-real-time entry point that may allocate, and one real-time entry
/// point that must not.
pub trait EffectSlot: Send {
    /// Prepare for a stream format. Allocates; never call from the audio thread.
    fn configure(&mut self, sample_rate: f64, max_block: usize, channels: usize) -> Result<()>;

    /// Render one block of interleaved samples.
    ///
    /// Must not block, allocate or fail. Formats other than the configured one are
    /// handled as well as possible rather than rejected.
    fn process(&mut self, input: &[f32], output: &mut [f32], sample_rate: f64, num_channels: usize);

    /// Drop any ringing tail. Not real-time safe unless the implementation says so.
    fn reset(&mut self) {}

    fn name(&self) -> &str;
}

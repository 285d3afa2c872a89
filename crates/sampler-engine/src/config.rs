//! Explicit construction-time configuration for [`crate::Sampler`].
//!
//! There is no config file or environment variable surface here: an
//! instrument-definition parser is out of scope (SPEC_FULL.md §1), so the
//! only inputs a config file could plausibly hold are the scalars below,
//! which the embedding application already has to choose programmatically.

/// Construction-time settings for a [`crate::Sampler`]. `Default` matches
/// the component defaults named throughout the component design section.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub sample_rate: f32,
    pub max_voices: usize,
    pub gain: f32,
    pub live_mode: bool,
    pub preload_time_ms: f32,
    /// `None` leaves each region's own `quality` field untouched;
    /// `Some(q)` overrides every loaded region to quality `q`.
    pub default_quality: Option<u8>,
    pub event_capacity: usize,
    /// `None` means unbounded; matches `sampler_cache::SampleCache::new`.
    pub cache_byte_budget: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            max_voices: 64,
            gain: 1.0,
            live_mode: true,
            preload_time_ms: 500.0,
            default_quality: None,
            event_capacity: 256,
            cache_byte_budget: None,
        }
    }
}

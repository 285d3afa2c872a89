//! Control API facade (C13): wires the sample cache, region set and voice
//! pool / event dispatcher from `sampler-cache` and `sampler-voice` into the
//! surface an embedding application actually calls.
//!
//! Instrument-definition parsing stays out of scope (the region array is
//! assumed pre-materialized elsewhere), so [`Sampler::load_program`] and
//! [`Sampler::load_bank`] take already-built [`Region`] lists rather than a
//! path to an instrument file -- the only path this crate itself opens is
//! the one `sampler-cache` decodes PCM frames from.

mod config;
mod error;

pub use config::EngineConfig;
pub use error::{Error, Result};

use sampler_cache::SampleCache;
use sampler_voice::pool::{Dispatcher, RegionSet};
use sampler_voice::region::Region;
use sampler_dsp::CurveTable;

/// One loaded instrument: a name (for introspection) plus its region set.
struct Program {
    name: String,
    regions: Vec<Region>,
}

/// The engine's Control API surface (§6). Owns the sample cache, the
/// currently-selected program's [`Dispatcher`], and the bank of programs
/// `load_bank`/`select_program` switch between.
///
/// Construction takes an [`EngineConfig`] rather than reading ambient state;
/// every `set_*` mutator below corresponds 1:1 to a method named in the
/// spec's Control API surface.
pub struct Sampler {
    cache: SampleCache,
    _loader: Option<sampler_cache::LoaderHandle>,
    dispatcher: Dispatcher,
    programs: Vec<Program>,
    selected: Option<usize>,
    config: EngineConfig,
}

impl Sampler {
    /// Construct a sampler with no instrument loaded. `render` on a fresh
    /// sampler produces silence (the empty-program invariant from §8).
    pub fn new(config: EngineConfig) -> Self {
        let cache = if let Some(budget) = config.cache_byte_budget {
            SampleCache::with_byte_budget(sampler_cache::WavDecoder, budget)
        } else {
            SampleCache::new(sampler_cache::WavDecoder)
        };
        let loader = Some(cache.spawn_loader());
        let regions = RegionSet::new(Vec::new(), CurveTable::new());
        let mut dispatcher = Dispatcher::new(
            config.max_voices,
            config.event_capacity,
            regions,
            cache.clone(),
            config.sample_rate,
            config.sample_rate,
        );
        dispatcher.set_gain(config.gain);
        dispatcher.set_live_mode(config.live_mode);
        Self { cache, _loader: loader, dispatcher, programs: Vec::new(), selected: None, config }
    }

    pub fn set_sample_rate(&mut self, hz: f32) {
        self.config.sample_rate = hz;
        self.dispatcher.set_sample_rate(hz);
    }

    pub fn set_max_voices(&mut self, n: usize) {
        self.config.max_voices = n;
        self.dispatcher.set_max_voices(n);
    }

    pub fn set_gain(&mut self, linear: f32) {
        self.config.gain = linear;
        self.dispatcher.set_gain(linear);
    }

    pub fn set_live_mode(&mut self, live: bool) {
        self.config.live_mode = live;
        self.dispatcher.set_live_mode(live);
    }

    pub fn set_preload_time(&mut self, ms: f32) {
        self.config.preload_time_ms = ms;
    }

    /// Overrides every loaded region's interpolation quality. Quality is
    /// otherwise a per-region field (§6); this is the global knob the
    /// Control API names, applied uniformly to whichever program is active.
    pub fn set_sample_quality(&mut self, quality: u8) {
        let quality = quality.clamp(1, 3);
        self.config.default_quality = Some(quality);
        if let Some(idx) = self.selected {
            for region in &mut self.programs[idx].regions {
                region.quality = quality;
            }
        }
    }

    /// Replace the current instrument with a single pre-materialized region
    /// set. On success this becomes program 0 and is selected immediately.
    /// On failure (no regions) the previous instrument, if any, remains
    /// active (§7's "previous stays active on failure").
    pub fn load_program(&mut self, name: impl Into<String>, regions: Vec<Region>) -> Result<()> {
        if regions.is_empty() {
            tracing::warn!("load_program called with zero regions, previous instrument unchanged");
            return Err(Error::EmptyProgram);
        }
        self.programs = vec![Program { name: name.into(), regions }];
        self.select_program(0)
    }

    /// Replace the current instrument with a multi-program bank; does not
    /// select a program until [`Sampler::select_program`] is called.
    pub fn load_bank(&mut self, programs: Vec<(String, Vec<Region>)>) -> Result<()> {
        if programs.is_empty() {
            return Err(Error::EmptyProgram);
        }
        self.programs = programs.into_iter().map(|(name, regions)| Program { name, regions }).collect();
        self.selected = None;
        Ok(())
    }

    pub fn select_program(&mut self, index: usize) -> Result<()> {
        let program = self.programs.get(index).ok_or(Error::ProgramIndexOutOfRange { index, len: self.programs.len() })?;
        let mut regions = program.regions.clone();
        if let Some(quality) = self.config.default_quality {
            for region in &mut regions {
                region.quality = quality;
            }
        }
        let region_set = RegionSet::new(regions, CurveTable::new());
        self.dispatcher = Dispatcher::new(
            self.config.max_voices,
            self.config.event_capacity,
            region_set,
            self.cache.clone(),
            self.config.sample_rate,
            self.config.sample_rate,
        );
        self.dispatcher.set_gain(self.config.gain);
        self.dispatcher.set_live_mode(self.config.live_mode);
        self.selected = Some(index);
        Ok(())
    }

    pub fn add_event_note_on(&mut self, time_frames: u32, channel: u8, key: u8, velocity: u8) {
        if channel >= 16 || key > 127 || velocity > 127 {
            tracing::debug!(channel, key, velocity, "note-on event out of range, dropping");
            return;
        }
        if !self.dispatcher.add_event_note_on(time_frames, channel, key, velocity) {
            tracing::debug!(channel, key, "event buffer full, dropping note-on");
        }
    }

    pub fn add_event_note_off(&mut self, time_frames: u32, channel: u8, key: u8) {
        if channel >= 16 || key > 127 {
            tracing::debug!(channel, key, "note-off event out of range, dropping");
            return;
        }
        if !self.dispatcher.add_event_note_off(time_frames, channel, key) {
            tracing::debug!(channel, key, "event buffer full, dropping note-off");
        }
    }

    pub fn add_event_cc(&mut self, time_frames: u32, channel: u8, cc: u8, value: u8) {
        if channel >= 16 || cc > 127 || value > 127 {
            tracing::debug!(channel, cc, value, "cc event out of range, dropping");
            return;
        }
        if !self.dispatcher.add_event_cc(time_frames, channel, cc, value) {
            tracing::debug!(channel, cc, "event buffer full, dropping cc");
        }
    }

    pub fn add_event_pitch_bend(&mut self, time_frames: u32, channel: u8, value: u16) {
        if channel >= 16 || value > 16383 {
            tracing::debug!(channel, value, "pitch-bend event out of range, dropping");
            return;
        }
        if !self.dispatcher.add_event_pitch_bend(time_frames, channel, value) {
            tracing::debug!(channel, "event buffer full, dropping pitch-bend");
        }
    }

    pub fn render(&mut self, out_l: &mut [f32], out_r: &mut [f32], n_frames: usize) {
        self.dispatcher.render(out_l, out_r, n_frames);
    }

    pub fn all_sound_off(&mut self) {
        self.dispatcher.all_sound_off();
    }

    pub fn system_reset(&mut self) {
        self.dispatcher.system_reset();
    }

    /// Names of every loaded program, in bank order.
    pub fn programs(&self) -> Vec<&str> {
        self.programs.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn active_voice_count(&self) -> usize {
        self.dispatcher.pool.active_count()
    }

    pub fn max_voices(&self) -> usize {
        self.dispatcher.pool.max_voices()
    }

    /// Access to the sample cache, for callers that want to pre-warm or
    /// inspect it independently of loading a program (e.g. a control thread
    /// decoding files ahead of building the `Region` list `load_program`
    /// will eventually receive).
    pub fn cache(&self) -> &SampleCache {
        &self.cache
    }
}

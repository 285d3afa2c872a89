//! Voice pool / event dispatcher (C8) and region selector (C9).

use crate::channel::ChannelState;
use crate::event::{Event, EventBuffer, EventKind};
use crate::region::{CurveLookup, LoopMode, Region, RegionState, TriggerKind};
use crate::rng::Rng;
use crate::voice::{StartArgs, Voice, MAX_BLOCK};
use sampler_cache::SampleCache;
use sampler_dsp::{CurveTable, OffMode};

const NUM_CHANNELS: usize = 16;
const NUM_KEYS: usize = 128;

/// Owns the region array and the mutable per-region trigger bookkeeping
/// (C9). Predicate evaluation happens here; off-by/kill-conflict voice
/// management is the dispatcher's job since it needs the voice pool.
pub struct RegionSet {
    pub regions: Vec<Region>,
    states: Vec<RegionState>,
    pub curves: CurveTable,
    supported_ccs: [bool; 128],
}

impl RegionSet {
    pub fn new(regions: Vec<Region>, curves: CurveTable) -> Self {
        let states = regions.iter().map(RegionState::new).collect();
        let supported_ccs = collect_supported_ccs(&regions);
        Self { regions, states, curves, supported_ccs }
    }

    pub fn curve_lookup(&self) -> CurveLookup<'_> {
        CurveLookup::new(&self.curves)
    }

    /// Whether any region references `cc` through a CC-modulated parameter,
    /// a crossfade axis, or a `locc`/`hicc` range gate -- i.e. whether the
    /// instrument "defines" this controller, the gate CC120/123's
    /// unmapped-all-notes-off fallback is keyed on.
    pub fn is_cc_supported(&self, cc: u8) -> bool {
        self.supported_ccs[cc as usize]
    }

    /// A NoteOn on a key inside any region's `sw_lokey..sw_hikey` is a
    /// key-switch press: it updates the channel's last-pressed switch key
    /// and re-evaluates every region's `switch_match` gate against it.
    pub fn note_on_key_switch(&mut self, key: u8, channel_state: &mut ChannelState) {
        let is_switch_key = self.regions.iter().any(|r| {
            matches!(
                (r.key_switch.sw_lokey, r.key_switch.sw_hikey),
                (Some(lo), Some(hi)) if key >= lo && key <= hi
            )
        });
        if !is_switch_key {
            return;
        }
        channel_state.note_key_switch(key);
        for (region, state) in self.regions.iter().zip(self.states.iter_mut()) {
            if let (Some(lo), Some(hi)) = (region.key_switch.sw_lolast, region.key_switch.sw_hilast) {
                state.switch_match = Some(key >= lo && key <= hi);
            }
        }
    }

    /// §4.8 `trigger`: iterate regions in definition order, return the
    /// indices of every surviving, playable region.
    pub fn trigger(
        &mut self,
        trigger_kind: TriggerKind,
        key: u8,
        velocity: u8,
        channel_state: &ChannelState,
        rand_value: f32,
    ) -> Vec<usize> {
        let mut matched = Vec::new();
        for i in 0..self.regions.len() {
            let region = &self.regions[i];
            if region.trigger != trigger_kind || !region.key_in_range(key) || !region.velocity_in_range(velocity) {
                continue;
            }
            let cc_ok = (0u16..128).all(|c| {
                let c = c as u8;
                let (lo, hi) = (region.locc[c as usize], region.hicc[c as usize]);
                if lo == 0 && hi == 127 {
                    true
                } else {
                    let v = channel_state.cc(c);
                    v >= lo && v <= hi
                }
            });
            if !cc_ok {
                continue;
            }
            if let Some(false) = self.states[i].switch_match {
                continue;
            }
            if !(rand_value >= region.lorand && rand_value < region.hirand) {
                continue;
            }
            let seq_ok = self.states[i].play_seq == region.seq_position;
            self.states[i].advance_seq(region.seq_length);
            if !seq_ok {
                continue;
            }
            if region.is_playable() {
                matched.push(i);
            } else {
                tracing::debug!(region = i, "matched region has no sample, skipping");
            }
        }
        matched
    }
}

/// Scan every region for every CC a `CcMod`/`CcParam`, an envelope stage, a
/// filter cutoff, a crossfade axis, or a `locc`/`hicc` range gate
/// references, so [`RegionSet::is_cc_supported`] can tell a genuinely
/// unmapped controller from one the instrument uses.
fn collect_supported_ccs(regions: &[Region]) -> [bool; 128] {
    let mut supported = [false; 128];
    let mark_mods = |mods: &[crate::region::CcMod], supported: &mut [bool; 128]| {
        for m in mods {
            supported[m.cc as usize] = true;
        }
    };
    for region in regions {
        mark_mods(&region.volume_db.cc, &mut supported);
        mark_mods(&region.amplitude.cc, &mut supported);
        mark_mods(&region.pan.cc, &mut supported);
        mark_mods(&region.width.cc, &mut supported);
        mark_mods(&region.tune_cc, &mut supported);
        for stage in [
            &region.amp_eg.delay,
            &region.amp_eg.attack,
            &region.amp_eg.hold,
            &region.amp_eg.decay,
            &region.amp_eg.release,
            &region.filter_eg.delay,
            &region.filter_eg.attack,
            &region.filter_eg.hold,
            &region.filter_eg.decay,
            &region.filter_eg.release,
        ] {
            mark_mods(&stage.cc, &mut supported);
        }
        for filter in &region.filters {
            if let Some((cc, _)) = filter.cutoff_cc {
                supported[cc as usize] = true;
            }
        }
        for (cc, _) in region.xfin_cc.iter().chain(region.xfout_cc.iter()) {
            supported[*cc as usize] = true;
        }
        for cc in 0u16..128 {
            let c = cc as usize;
            if region.locc[c] != 0 || region.hicc[c] != 127 {
                supported[c] = true;
            }
        }
    }
    supported
}

/// Contiguous voice array plus an explicit idle stack (C8). `alloc` never
/// steals: an empty idle stack means the caller's match is silently dropped.
pub struct VoicePool {
    voices: Vec<Voice>,
    idle: Vec<usize>,
    in_idle: Vec<bool>,
}

impl VoicePool {
    pub fn new(max_voices: usize) -> Self {
        Self {
            voices: (0..max_voices).map(|_| Voice::default()).collect(),
            idle: (0..max_voices).rev().collect(),
            in_idle: vec![true; max_voices],
        }
    }

    pub fn max_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn active_count(&self) -> usize {
        self.voices.len() - self.idle.len()
    }

    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    fn alloc(&mut self) -> Option<usize> {
        let idx = self.idle.pop()?;
        self.in_idle[idx] = false;
        Some(idx)
    }

    pub fn voice(&self, i: usize) -> &Voice {
        &self.voices[i]
    }

    pub fn voice_mut(&mut self, i: usize) -> &mut Voice {
        &mut self.voices[i]
    }

    pub fn active_indices(&self) -> Vec<usize> {
        (0..self.voices.len()).filter(|&i| self.voices[i].is_active()).collect()
    }

    pub fn all_sound_off(&mut self) {
        for v in &mut self.voices {
            v.kill();
        }
        self.reclaim_idle();
    }

    /// Compacts the idle stack: every voice whose `render` drove it to
    /// `Idle` (or that was just `kill()`ed) since the last pass is pushed
    /// back. Run once per sub-block, mirroring the source's "idle changed"
    /// compaction pass without needing a separate dirty flag.
    pub fn reclaim_idle(&mut self) {
        for i in 0..self.voices.len() {
            if self.voices[i].is_idle() && !self.in_idle[i] {
                self.in_idle[i] = true;
                self.idle.push(i);
            }
        }
    }
}

/// Owns everything the audio thread touches on a `render` call: the event
/// queue, channel state, region set and voice pool. The only cross-thread
/// handle is [`SampleCache`], which is a cheap `Arc` clone.
pub struct Dispatcher {
    pub pool: VoicePool,
    pub regions: RegionSet,
    channels: Vec<ChannelState>,
    events: EventBuffer,
    global_frame_count: u64,
    note_on_frame: Vec<[u64; NUM_KEYS]>,
    rng: Rng,
    cache: SampleCache,
    sample_rate: f32,
    output_sample_rate: f32,
    live_mode: bool,
    gain: f32,
}

impl Dispatcher {
    pub fn new(
        max_voices: usize,
        event_capacity: usize,
        regions: RegionSet,
        cache: SampleCache,
        sample_rate: f32,
        output_sample_rate: f32,
    ) -> Self {
        Self {
            pool: VoicePool::new(max_voices),
            regions,
            channels: (0..NUM_CHANNELS).map(|_| ChannelState::new()).collect(),
            events: EventBuffer::new(event_capacity),
            global_frame_count: 0,
            note_on_frame: vec![[0u64; NUM_KEYS]; NUM_CHANNELS],
            rng: Rng::default(),
            cache,
            sample_rate,
            output_sample_rate,
            live_mode: true,
            gain: 1.0,
        }
    }

    pub fn set_max_voices(&mut self, n: usize) {
        self.pool.all_sound_off();
        self.pool = VoicePool::new(n);
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }

    pub fn set_live_mode(&mut self, live_mode: bool) {
        self.live_mode = live_mode;
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.output_sample_rate = sample_rate;
    }

    pub fn add_event_note_on(&mut self, time_frames: u32, channel: u8, key: u8, velocity: u8) -> bool {
        self.events.push(time_frames, channel, EventKind::NoteOn { key, velocity })
    }

    pub fn add_event_note_off(&mut self, time_frames: u32, channel: u8, key: u8) -> bool {
        self.events.push(time_frames, channel, EventKind::NoteOff { key })
    }

    pub fn add_event_cc(&mut self, time_frames: u32, channel: u8, controller: u8, value: u8) -> bool {
        self.events.push(time_frames, channel, EventKind::Cc { controller, value })
    }

    pub fn add_event_pitch_bend(&mut self, time_frames: u32, channel: u8, value: u16) -> bool {
        self.events.push(time_frames, channel, EventKind::PitchBend { value })
    }

    pub fn all_sound_off(&mut self) {
        self.pool.all_sound_off();
    }

    /// Kills every voice and re-initializes every channel's CC snapshot from
    /// the instrument's declared defaults.
    pub fn system_reset(&mut self) {
        self.pool.all_sound_off();
        for ch in &mut self.channels {
            ch.reset_to_defaults();
        }
    }

    /// §4.7 `render`.
    pub fn render(&mut self, out_l: &mut [f32], out_r: &mut [f32], n_frames: usize) {
        let n_frames = n_frames.min(out_l.len()).min(out_r.len());
        out_l[..n_frames].fill(0.0);
        out_r[..n_frames].fill(0.0);

        let event_count = self.events.sorted().len();
        let mut cursor = 0usize;
        for i in 0..event_count {
            let event = self.events.sorted()[i];
            let end = (event.time_frames as usize).min(n_frames);
            self.render_range(cursor, end, out_l, out_r);
            cursor = end;
            self.dispatch_event(event);
        }
        self.render_range(cursor, n_frames, out_l, out_r);

        self.events.clear();
        self.global_frame_count += n_frames as u64;
    }

    fn render_range(&mut self, start: usize, end: usize, out_l: &mut [f32], out_r: &mut [f32]) {
        let mut pos = start;
        while pos < end {
            let block_len = (end - pos).min(MAX_BLOCK);
            let curves = self.regions.curve_lookup();
            for vi in self.pool.active_indices() {
                let channel = self.pool.voice(vi).channel;
                let region_index = self.pool.voice(vi).region_index;
                let region = &self.regions.regions[region_index];
                let channel_state = &self.channels[channel as usize];
                let voice = self.pool.voice_mut(vi);
                let still_active = voice.render(
                    region,
                    channel_state,
                    &curves,
                    &mut out_l[pos..pos + block_len],
                    &mut out_r[pos..pos + block_len],
                    block_len,
                );
                if !still_active {
                    tracing::trace!(voice = vi, "voice reached idle");
                }
            }
            self.pool.reclaim_idle();
            pos += block_len;
        }
        if self.gain != 1.0 {
            for s in &mut out_l[start..end] {
                *s *= self.gain;
            }
            for s in &mut out_r[start..end] {
                *s *= self.gain;
            }
        }
    }

    fn dispatch_event(&mut self, event: Event) {
        match event.kind {
            EventKind::NoteOn { key, velocity: 0 } => self.handle_note_off(event.channel, key),
            EventKind::NoteOn { key, velocity } => self.handle_note_on(event.channel, key, velocity),
            EventKind::NoteOff { key } => self.handle_note_off(event.channel, key),
            EventKind::Cc { controller, value } => self.handle_cc(event.channel, controller, value),
            EventKind::PitchBend { value } => self.handle_pitch_bend(event.channel, value),
        }
    }

    /// §4.8 NoteOn: kill-conflict, then `trigger(ATTACK, ...)`.
    fn handle_note_on(&mut self, channel: u8, key: u8, velocity: u8) {
        let ch = channel as usize;
        self.regions.note_on_key_switch(key, &mut self.channels[ch]);

        for vi in self.pool.active_indices() {
            let voice = self.pool.voice(vi);
            if voice.channel != channel || voice.key != key {
                continue;
            }
            let region = &self.regions.regions[voice.region_index];
            if region.loop_mode != LoopMode::OneShot && region.trigger == TriggerKind::Attack {
                self.pool.voice_mut(vi).release(OffMode::Normal);
            }
        }

        self.note_on_frame[ch][key as usize] = self.global_frame_count;

        let rand_value = self.rng.next_f32();
        let matched = self.regions.trigger(TriggerKind::Attack, key, velocity, &self.channels[ch], rand_value);
        self.start_matched_regions(matched, channel, key, velocity, 0.0);
    }

    fn handle_note_off(&mut self, channel: u8, key: u8) {
        let ch = channel as usize;
        let sustain_held = self.channels[ch].sustain_held();
        let mut release_velocity = 0u8;
        let mut any_released = false;

        for vi in self.pool.active_indices() {
            let voice = self.pool.voice(vi);
            if voice.channel != channel || voice.key != key {
                continue;
            }
            let region = &self.regions.regions[voice.region_index];
            if region.loop_mode == LoopMode::OneShot || region.trigger != TriggerKind::Attack {
                continue;
            }
            release_velocity = voice.velocity;
            any_released = true;
            self.pool.voice_mut(vi).note_off(sustain_held);
        }

        if any_released && !sustain_held {
            let time_since =
                (self.global_frame_count.saturating_sub(self.note_on_frame[ch][key as usize])) as f32 / self.sample_rate;
            let rand_value = self.rng.next_f32();
            let matched =
                self.regions.trigger(TriggerKind::Release, key, release_velocity, &self.channels[ch], rand_value);
            self.start_matched_regions(matched, channel, key, release_velocity, time_since);
        }
    }

    fn start_matched_regions(&mut self, matched: Vec<usize>, channel: u8, key: u8, velocity: u8, time_since: f32) {
        let ch = channel as usize;
        for region_index in matched {
            let group = self.regions.regions[region_index].group;
            if self.regions.regions[region_index].off_by != 0 {
                for vi in self.pool.active_indices() {
                    let other_region = self.regions.regions[self.pool.voice(vi).region_index].off_by;
                    if other_region == group && self.pool.voice(vi).region_index != region_index {
                        let off_mode = self.regions.regions[self.pool.voice(vi).region_index].off_mode;
                        self.pool.voice_mut(vi).release(off_mode);
                    }
                }
            }

            let Some(slot) = self.pool.alloc() else {
                tracing::debug!(channel, key, "out of voices, dropping matched region");
                continue;
            };

            let region = &self.regions.regions[region_index];
            let Some(sample) = region.sample.clone() else {
                continue;
            };
            let handle = self.cache.open_playback(&sample, self.live_mode);
            let curves = self.regions.curve_lookup();

            self.pool.voice_mut(slot).start(StartArgs {
                region_index,
                region,
                channel,
                key,
                velocity,
                time_since_note_on: time_since,
                global_frame_count: self.global_frame_count,
                sample_rate: sample.meta.sample_rate as f32,
                output_sample_rate: self.output_sample_rate,
                handle,
                curves: &curves,
                channel_state: &self.channels[ch],
                rand_amp: self.rng.next_signed(),
                rand_pitch: self.rng.next_signed(),
                rand_offset: self.rng.next_f32(),
            });
        }
    }

    fn handle_cc(&mut self, channel: u8, controller: u8, value: u8) {
        let ch = channel as usize;
        let previous = self.channels[ch].cc(64);
        self.channels[ch].set_cc(controller, value);

        if controller == 64 {
            let now = self.channels[ch].cc(64);
            if previous >= crate::channel::SUSTAIN_THRESHOLD && now < crate::channel::SUSTAIN_THRESHOLD {
                for vi in self.pool.active_indices() {
                    if self.pool.voice(vi).channel == channel {
                        self.pool.voice_mut(vi).sustain_released();
                    }
                }
            }
        }

        if (controller == 120 || controller == 123) && !self.regions.is_cc_supported(controller) {
            tracing::debug!(channel, controller, "unmapped all-notes-off controller, killing channel voices");
            for vi in self.pool.active_indices() {
                if self.pool.voice(vi).channel == channel {
                    self.pool.voice_mut(vi).kill();
                }
            }
            self.pool.reclaim_idle();
            return;
        }

        let curves = self.regions.curve_lookup();
        for vi in self.pool.active_indices() {
            if self.pool.voice(vi).channel != channel {
                continue;
            }
            let region_index = self.pool.voice(vi).region_index;
            let region = &self.regions.regions[region_index];
            self.pool.voice_mut(vi).update_cc(region, &self.channels[ch], &curves);
        }
    }

    fn handle_pitch_bend(&mut self, channel: u8, value: u16) {
        let ch = channel as usize;
        self.channels[ch].set_pitch_bend(value);
        let curves = self.regions.curve_lookup();
        for vi in self.pool.active_indices() {
            if self.pool.voice(vi).channel != channel {
                continue;
            }
            let region_index = self.pool.voice(vi).region_index;
            let region = &self.regions.regions[region_index];
            self.pool.voice_mut(vi).update_cc(region, &self.channels[ch], &curves);
        }
    }

    pub fn channel_state(&self, channel: u8) -> &ChannelState {
        &self.channels[channel as usize]
    }
}

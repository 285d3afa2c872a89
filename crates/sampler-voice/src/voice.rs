//! Per-voice DSP graph (C7): fetch samples, interpolate, apply pitch/amp
//! /filter/LFO/width, mix into output.

use crate::channel::ChannelState;
use crate::region::{resolve_amplitude_pct, resolve_cc_mods, CurveLookup, FilterSpec, Region};
use sampler_cache::PlayHandle;
use sampler_dsp::{
    DahdsrEnvelope, LfoBank, LfoParams, LinearSmooth, OffMode, Quality, SampleFilter,
    halfband_interpolate, interp_hermite, interp_linear, interp_optimal_2x,
};

const GAIN_SMOOTH_MS: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Idle,
    Active,
    Sustain,
    Released,
}

/// A window of 24 consecutive source frames, `raw[11]` being the sample at
/// the integer floor of the current read position. Wide enough to build
/// every half-band midpoint [`Quality::Optimal2x`] needs.
type RawWindow = [f32; 24];
const RAW_BEFORE: i64 = 11;
const RAW_AFTER: i64 = 12;

pub const MAX_BLOCK: usize = 1024;

/// A transient instantiation of a region, actively producing audio.
///
/// Owns no region data itself -- `render`/`update_cc` take `&Region` each
/// call, since the region array is owned centrally by the voice pool and a
/// voice only ever needs an index into it (see the region-array rebind note
/// in the region-selector design).
pub struct Voice {
    pub state: VoiceState,
    pub region_index: usize,
    pub channel: u8,
    pub key: u8,
    pub velocity: u8,
    pub trigger_time_frames: u64,

    handle: Option<PlayHandle>,
    read_pos: f64,
    loop_enabled: bool,
    loop_start: u64,
    loop_end: u64,
    quality: Quality,

    amp_env: DahdsrEnvelope,
    filter_env: DahdsrEnvelope,
    filters: [SampleFilter; 2],
    lfos: LfoBank,

    left_gain: LinearSmooth,
    right_gain: LinearSmooth,
    speed: LinearSmooth,

    amp_random_gain: f32,
    pitch_random_cent: f32,
    velocity_gain: f32,
    rt_decay_gain: f32,
    delay_remaining: u32,

    base_pitch_semitones_no_bend: f32,
    sample_rate: f32,
    output_sample_rate: f32,

    pitch_buf: [f32; MAX_BLOCK],
    volume_buf: [f32; MAX_BLOCK],
    cutoff_buf: [f32; MAX_BLOCK],
}

impl Default for Voice {
    fn default() -> Self {
        Self {
            state: VoiceState::Idle,
            region_index: 0,
            channel: 0,
            key: 0,
            velocity: 0,
            trigger_time_frames: 0,
            handle: None,
            read_pos: 0.0,
            loop_enabled: false,
            loop_start: 0,
            loop_end: 0,
            quality: Quality::Hermite,
            amp_env: DahdsrEnvelope::new(),
            filter_env: DahdsrEnvelope::new(),
            filters: [SampleFilter::default(), SampleFilter::default()],
            lfos: LfoBank::new(),
            left_gain: LinearSmooth::new(0.0),
            right_gain: LinearSmooth::new(0.0),
            speed: LinearSmooth::new(1.0),
            amp_random_gain: 1.0,
            pitch_random_cent: 0.0,
            velocity_gain: 1.0,
            rt_decay_gain: 1.0,
            delay_remaining: 0,
            base_pitch_semitones_no_bend: 0.0,
            sample_rate: 44100.0,
            output_sample_rate: 44100.0,
            pitch_buf: [1.0; MAX_BLOCK],
            volume_buf: [1.0; MAX_BLOCK],
            cutoff_buf: [1.0; MAX_BLOCK],
        }
    }
}

pub struct StartArgs<'a> {
    pub region_index: usize,
    pub region: &'a Region,
    pub channel: u8,
    pub key: u8,
    pub velocity: u8,
    pub time_since_note_on: f32,
    pub global_frame_count: u64,
    pub sample_rate: f32,
    pub output_sample_rate: f32,
    pub handle: PlayHandle,
    pub curves: &'a CurveLookup<'a>,
    pub channel_state: &'a ChannelState,
    pub rand_amp: f32,
    pub rand_pitch: f32,
    pub rand_offset: f32,
}

impl Voice {
    pub fn is_idle(&self) -> bool {
        self.state == VoiceState::Idle
    }

    pub fn is_active(&self) -> bool {
        self.state != VoiceState::Idle
    }

    /// §4.6 initialization.
    pub fn start(&mut self, args: StartArgs<'_>) {
        let region = args.region;
        let cc = |c: u8| args.channel_state.cc(c);

        self.state = VoiceState::Active;
        self.region_index = args.region_index;
        self.channel = args.channel;
        self.key = args.key;
        self.velocity = args.velocity;
        self.trigger_time_frames = args.global_frame_count;
        self.sample_rate = args.sample_rate;
        self.output_sample_rate = args.output_sample_rate;
        self.quality = Quality::from_u8(region.quality);

        self.amp_random_gain = sampler_dsp::db_to_linear(region.amp_random_db * args.rand_amp);
        self.pitch_random_cent = region.pitch_random_cents * args.rand_pitch;

        let velocity_norm = f32::from(args.velocity) / 127.0;
        let curve_gain = region
            .amp_velcurve
            .and_then(|i| args.curves.get_curve(i))
            .map_or_else(|| velocity_norm * velocity_norm, |c| c.get(i32::from(args.velocity)));
        let veltrack = region.amp_veltrack / 100.0;
        self.velocity_gain = (1.0 - veltrack) + veltrack * curve_gain;

        self.rt_decay_gain = if region.trigger == crate::region::TriggerKind::Release {
            sampler_dsp::db_to_linear(-args.time_since_note_on * region.rt_decay_db_per_sec / 20.0)
        } else {
            1.0
        };

        let delay_seconds = region.delay.resolve(args.curves, velocity_norm, cc);
        self.delay_remaining = (delay_seconds * self.sample_rate).max(0.0) as u32;

        self.loop_enabled = matches!(
            region.loop_mode,
            crate::region::LoopMode::Continuous | crate::region::LoopMode::Sustain
        ) && region.loop_end > region.loop_start;
        self.loop_start = region.loop_start;
        self.loop_end = region.loop_end;

        let offset = region.offset.resolve(args.curves, velocity_norm, cc) + args.rand_offset * region.offset_random;
        self.read_pos = offset.max(0.0) as f64;
        if self.loop_enabled && (self.read_pos as u64) >= self.loop_end {
            self.loop_enabled = false;
        }

        self.amp_env.start(region.amp_eg.resolve(args.curves, velocity_norm, cc), self.sample_rate);
        self.filter_env.start(region.filter_eg.resolve(args.curves, velocity_norm, cc), self.sample_rate);

        self.filters[0] = SampleFilter::new(region.filters[0].kind);
        self.filters[1] = SampleFilter::new(region.filters[1].kind);

        let lfo_params: Vec<LfoParams> = region
            .lfos
            .iter()
            .map(|l| LfoParams {
                freq: l.freq,
                delay: l.delay,
                fade: l.fade,
                to_pitch: l.to_pitch,
                to_volume: l.to_volume,
                to_cutoff: l.to_cutoff,
                freq_mod: l.freq_mod.map(|m| (m.to_index, m.base_freq_mod)),
            })
            .collect();
        self.lfos.start(&lfo_params);
        self.lfos.set_sample_rate(self.sample_rate);

        self.base_pitch_semitones_no_bend = (f32::from(args.key) - f32::from(region.pitch_keycenter))
            * region.pitch_keytrack
            / 100.0
            + (region.tune_cents + self.pitch_random_cent) / 100.0
            + region.transpose_semitones
            + resolve_cc_mods(&region.tune_cc, args.curves, cc) / 100.0;

        self.speed = LinearSmooth::with_config(1.0, self.sample_rate, GAIN_SMOOTH_MS);
        self.speed.set_immediate(self.replay_speed(region, args.channel_state));

        self.left_gain = LinearSmooth::with_config(0.0, self.sample_rate, GAIN_SMOOTH_MS);
        self.right_gain = LinearSmooth::with_config(0.0, self.sample_rate, GAIN_SMOOTH_MS);
        let (l, r) = self.static_gains(region, args.channel_state, args.curves);
        self.left_gain.set_immediate(l);
        self.right_gain.set_immediate(r);

        self.handle = Some(args.handle);
    }

    fn replay_speed(&self, region: &Region, channel_state: &ChannelState) -> f32 {
        let bend = channel_state.pitch_bend_norm() * 100.0;
        let bend_cents =
            if bend >= 0.0 { region.bend_up_cents * bend / 100.0 } else { region.bend_down_cents * (-bend) / 100.0 };
        let semitones = self.base_pitch_semitones_no_bend + bend_cents / 100.0;
        libm::exp2f(semitones / 12.0) * self.sample_rate / self.output_sample_rate
    }

    /// §4.6 gain composition, minus the crossfade/LFO-volume factors, which
    /// are applied per-sample in [`Self::render`] (crossfade depends on the
    /// live key/velocity/CC axis value, LFO-volume on the LFO block buffer).
    fn static_gains(&self, region: &Region, channel_state: &ChannelState, curves: &CurveLookup<'_>) -> (f32, f32) {
        let velocity_norm = f32::from(self.velocity) / 127.0;
        let cc = |c: u8| channel_state.cc(c);

        let volume_db = region.volume_db.resolve(curves, velocity_norm, cc);
        // `amplitude`'s CC list multiplies rather than sums -- see resolve_amplitude_pct.
        let amplitude_gain = resolve_amplitude_pct(&region.amplitude, curves, cc) / 100.0;
        // Default CC7/CC10 mapping only applies when the region hasn't already
        // mapped those controllers itself (region.volume_cc7 / region.pan_cc10).
        let cc7_gain = if region.volume_cc7 { sampler_dsp::db_to_linear(default_cc7_db(cc(7))) } else { 1.0 };
        let pan_cc10 = if region.pan_cc10 { default_cc10_pan(cc(10)) } else { 0.0 };

        let volume_gain = sampler_dsp::db_to_linear(volume_db) * self.amp_random_gain;
        let global_gain = volume_gain * self.velocity_gain * self.rt_decay_gain * amplitude_gain * cc7_gain;

        let pan = (region.pan.resolve(curves, velocity_norm, cc) + pan_cc10).clamp(-100.0, 100.0);
        let width_pct = region.width.resolve(curves, velocity_norm, cc);

        let left = pan_factor(-pan) * global_gain;
        let right = pan_factor(pan) * global_gain;
        apply_width(left, right, width_pct)
    }

    /// `update_cc`: rerun gain/pitch recomputation and feed it into the
    /// smoothers (non-immediate, so the change ramps rather than zippers).
    pub fn update_cc(&mut self, region: &Region, channel_state: &ChannelState, curves: &CurveLookup<'_>) {
        if !self.is_active() {
            return;
        }
        let (l, r) = self.static_gains(region, channel_state, curves);
        self.left_gain.set(l, false);
        self.right_gain.set(r, false);
        self.speed.set(self.replay_speed(region, channel_state), false);
    }

    pub fn note_off(&mut self, sustain_held: bool) {
        if self.state != VoiceState::Active {
            return;
        }
        if sustain_held {
            self.state = VoiceState::Sustain;
        } else {
            self.release(OffMode::Normal);
        }
    }

    pub fn sustain_released(&mut self) {
        if self.state == VoiceState::Sustain {
            self.release(OffMode::Normal);
        }
    }

    pub fn release(&mut self, mode: OffMode) {
        if matches!(self.state, VoiceState::Active | VoiceState::Sustain) {
            self.state = VoiceState::Released;
            self.amp_env.stop(mode);
            self.filter_env.stop(OffMode::Normal);
        }
    }

    /// Immediate kill: all-sound-off or out-of-voices reclamation.
    pub fn kill(&mut self) {
        self.state = VoiceState::Idle;
        self.amp_env.reset();
        self.filter_env.reset();
        self.handle = None;
    }

    /// Render `n` frames additively into `out_l`/`out_r`. Returns `false`
    /// once the voice finished and transitioned to idle during this call.
    pub fn render(
        &mut self,
        region: &Region,
        channel_state: &ChannelState,
        curves: &CurveLookup<'_>,
        out_l: &mut [f32],
        out_r: &mut [f32],
        n: usize,
    ) -> bool {
        if !self.is_active() {
            return false;
        }
        let n = n.min(MAX_BLOCK).min(out_l.len()).min(out_r.len());

        self.lfos.process(self.sample_rate, &mut self.pitch_buf, &mut self.volume_buf, &mut self.cutoff_buf, n, |_| 0.0);

        let Some(mut handle) = self.handle.take() else {
            self.state = VoiceState::Idle;
            return false;
        };

        for f in 0..2 {
            if self.filters[f].kind() != region.filters[f].kind {
                self.filters[f].set_kind(region.filters[f].kind);
            }
        }

        let width_pct = region.width.resolve(curves, f32::from(self.velocity) / 127.0, |c| channel_state.cc(c));

        let mut finished = false;
        for i in 0..n {
            if self.delay_remaining > 0 {
                self.delay_remaining -= 1;
                let _ = (self.speed.get_next(), self.left_gain.get_next(), self.right_gain.get_next());
                continue;
            }

            let pos_floor = self.read_pos.floor() as i64;
            let frac = (self.read_pos - pos_floor as f64) as f32;
            let mut sample = self.fetch_interpolated(&mut handle, pos_floor, frac);

            sample *= self.amp_env.get_next();

            for (fidx, spec) in region.filters.iter().enumerate() {
                if spec.kind == sampler_dsp::FilterKind::None {
                    continue;
                }
                let cutoff = self.resolve_filter_cutoff(spec, region.filter_eg.depth_cents, curves, channel_state, i);
                sample = self.filters[fidx].process(sample, cutoff, spec.resonance, self.sample_rate);
            }

            let (left, right) = apply_width(sample, sample, width_pct);
            let lfo_vol = self.volume_buf[i];
            out_l[i] += left * self.left_gain.get_next() * lfo_vol;
            out_r[i] += right * self.right_gain.get_next() * lfo_vol;

            self.advance_position(i);

            if !self.amp_env.is_active() {
                self.state = VoiceState::Idle;
                finished = true;
                break;
            }
        }

        if finished {
            self.handle = None;
            false
        } else {
            self.handle = Some(handle);
            true
        }
    }

    /// §4.6 step 4: `filter_env^(depth/1200) * lfo_cutoff`, expressed in the
    /// exp2-of-cents form the envelope/LFO pipeline uses everywhere else.
    fn resolve_filter_cutoff(
        &mut self,
        spec: &FilterSpec,
        eg_depth_cents: f32,
        curves: &CurveLookup<'_>,
        channel_state: &ChannelState,
        sample_index: usize,
    ) -> f32 {
        let keytrack = (f32::from(self.key) - f32::from(spec.keycenter)) * spec.keytrack;
        let mut cutoff = spec.cutoff * libm::exp2f(keytrack / 1200.0);
        if let Some((cc, depth)) = spec.cutoff_cc {
            let v = curves.get_curve(0).map_or(0.0, |c| c.get(i32::from(channel_state.cc(cc))));
            cutoff *= libm::exp2f(v * depth / 1200.0);
        }
        if spec.veltrack != 0.0 {
            let vel_depth = (f32::from(self.velocity) / 127.0) * spec.veltrack;
            cutoff *= libm::exp2f(vel_depth / 1200.0);
        }
        let env_octaves = self.filter_env.get_next() * eg_depth_cents;
        cutoff *= libm::exp2f(env_octaves / 1200.0);
        cutoff *= self.cutoff_buf[sample_index];
        cutoff.max(10.0)
    }

    fn advance_position(&mut self, sample_index: usize) {
        let speed = f64::from(self.speed.get_next()) * f64::from(self.pitch_buf[sample_index]);
        self.read_pos += speed;
        if self.loop_enabled {
            let end = self.loop_end as f64;
            let start = self.loop_start as f64;
            if self.read_pos >= end {
                self.read_pos = start + (self.read_pos - end);
            }
        }
    }

    fn fetch_interpolated(&mut self, handle: &mut PlayHandle, pos_floor: i64, frac: f32) -> f32 {
        let channels = handle.sample().meta.channels;
        match self.quality {
            Quality::Linear => {
                let y0 = fetch_frame(handle, pos_floor, channels);
                let y1 = fetch_frame(handle, pos_floor + 1, channels);
                interp_linear(frac, y0, y1)
            }
            Quality::Hermite => {
                let ym2 = fetch_frame(handle, pos_floor - 2, channels);
                let ym1 = fetch_frame(handle, pos_floor - 1, channels);
                let y0 = fetch_frame(handle, pos_floor, channels);
                let y1 = fetch_frame(handle, pos_floor + 1, channels);
                let y2 = fetch_frame(handle, pos_floor + 2, channels);
                let y3 = fetch_frame(handle, pos_floor + 3, channels);
                interp_hermite(frac, ym2, ym1, y0, y1, y2, y3)
            }
            Quality::Optimal2x => {
                let raw = fetch_window(handle, pos_floor, channels);
                optimal2x_sample(&raw, frac)
            }
        }
    }
}

fn default_cc7_db(cc7: u8) -> f32 {
    // built-in curve #4 (quadratic v^2/127^2), per §6's CC7 default mapping.
    let g = (f32::from(cc7) / 127.0).powi(2).max(1e-6);
    sampler_dsp::linear_to_db(g)
}

fn default_cc10_pan(cc10: u8) -> f32 {
    // built-in curve #1 (linear -1..1) scaled to +/-100, per §6's CC10 default.
    (f32::from(cc10) / 127.0) * 200.0 - 100.0
}

/// Sine-law pan factor, §4.6: `sin((pan_signed + 100) / 400 * pi) * sqrt(2)`.
fn pan_factor(pan_signed: f32) -> f32 {
    libm::sinf((pan_signed + 100.0) / 400.0 * core::f32::consts::PI) * core::f32::consts::SQRT_2
}

/// Stereo width, §4.6: `w = (width+100)/200`.
fn apply_width(left: f32, right: f32, width_pct: f32) -> (f32, f32) {
    let w = (width_pct + 100.0) / 200.0;
    (w * left + (1.0 - w) * right, (1.0 - w) * left + w * right)
}

fn fetch_frame(handle: &mut PlayHandle, pos: i64, channels: u16) -> f32 {
    if pos < 0 {
        return 0.0;
    }
    let mut buf = [0.0f32; 2];
    let ch = (channels as usize).clamp(1, 2);
    handle.get(pos as u64, channels, &mut buf[..ch]);
    sampler_dsp::mono_sum(buf[0], buf[ch - 1])
}

fn fetch_window(handle: &mut PlayHandle, pos_floor: i64, channels: u16) -> RawWindow {
    let mut raw = [0.0f32; 24];
    for (i, slot) in raw.iter_mut().enumerate() {
        let offset = i as i64 - RAW_BEFORE;
        *slot = fetch_frame(handle, pos_floor + offset, channels);
    }
    debug_assert_eq!(RAW_BEFORE + RAW_AFTER + 1, 24);
    raw
}

fn window22(raw: &RawWindow, start: usize) -> [f32; 22] {
    let mut w = [0.0f32; 22];
    w.copy_from_slice(&raw[start..start + 22]);
    w
}

/// §4.6 Q=3 path: 2x-oversample via the half-band filter, then interpolate
/// with the 4-point optimal-2x kernel. `raw[11]` is the sample at the floor
/// of the read position; `raw[0..22]`, `raw[1..23]`, `raw[2..24]` are the
/// three 22-sample windows [`halfband_interpolate`] needs for the midpoints
/// straddling, centered on, and following the read position.
fn optimal2x_sample(raw: &RawWindow, frac: f32) -> f32 {
    let x_floor = raw[11];
    let x_floor1 = raw[12];
    let mid_center = halfband_interpolate(&window22(raw, 1));
    if frac < 0.5 {
        let mid_prev = halfband_interpolate(&window22(raw, 0));
        interp_optimal_2x(frac * 2.0, mid_prev, x_floor, mid_center, x_floor1)
    } else {
        let mid_next = halfband_interpolate(&window22(raw, 2));
        interp_optimal_2x((frac - 0.5) * 2.0, x_floor, mid_center, x_floor1, mid_next)
    }
}

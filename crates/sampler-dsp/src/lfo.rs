//! LFO bank with inter-LFO frequency modulation.
//!
//! A voice owns one [`LfoBank`] holding every LFO defined on its region.
//! Each LFO can target pitch, volume and/or cutoff, and can in turn have its
//! own frequency modulated by another LFO in the bank (`freq_mod`). Targets
//! are summed across LFOs every 32 samples (matching the coarsest rate any
//! of pitch/volume/cutoff modulation needs to look convincing), then
//! one-pole smoothed into a per-sample output buffer so the audio loop never
//! has to branch on "is an LFO active".

use libm::sinf;

const TARGET_BLOCK: usize = 32;
const SMOOTH_NEW: f32 = 0.01;
const SMOOTH_OLD: f32 = 0.99;

/// Which per-sample buffer an LFO (or an LFO's frequency-mod source)
/// contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LfoTarget {
    Pitch,
    Volume,
    Cutoff,
}

/// A single LFO's configuration: base frequency, delay/fade-in, and how
/// much it contributes to each of the three targets (cents for pitch/cutoff,
/// dB for volume -- converted once per 32-sample block; pitch/cutoff sums are
/// divided by 1200 before `exp2f`).
#[derive(Debug, Clone, Copy)]
pub struct LfoParams {
    pub freq: f32,
    pub delay: f32,
    pub fade: f32,
    pub to_pitch: f32,
    pub to_volume: f32,
    pub to_cutoff: f32,
    /// Index of another LFO in the same bank whose output frequency-modulates
    /// this one's phase increment, plus the modulation depth in Hz/unit.
    pub freq_mod: Option<(usize, f32)>,
}

impl Default for LfoParams {
    fn default() -> Self {
        Self {
            freq: 0.0,
            delay: 0.0,
            fade: 0.0,
            to_pitch: 0.0,
            to_volume: 0.0,
            to_cutoff: 0.0,
            freq_mod: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct LfoState {
    phase: f32,
    delay_remaining: u32,
    fade_len: u32,
    fade_pos: u32,
}

/// Per-voice bank of LFOs, producing smoothed multiplicative factors for
/// pitch/volume/cutoff.
#[derive(Debug, Clone)]
pub struct LfoBank {
    params: heapless_vec::LfoParamsVec,
    state: heapless_vec::LfoStateVec,
    last_pitch: f32,
    last_volume: f32,
    last_cutoff: f32,
    target_pitch: f32,
    target_volume: f32,
    target_cutoff: f32,
    block_pos: usize,
}

// A tiny no_std-friendly fixed-capacity vector, local to this module so the
// crate doesn't have to pull in `alloc` just for a handful of LFOs per voice.
mod heapless_vec {
    use super::{LfoParams, LfoState};

    pub const MAX_LFOS: usize = 12;

    #[derive(Debug, Clone)]
    pub struct LfoParamsVec {
        pub items: [LfoParams; MAX_LFOS],
        pub len: usize,
    }

    impl Default for LfoParamsVec {
        fn default() -> Self {
            Self { items: [LfoParams::default(); MAX_LFOS], len: 0 }
        }
    }

    #[derive(Debug, Clone, Default)]
    pub struct LfoStateVec {
        pub items: [LfoState; MAX_LFOS],
        pub len: usize,
    }
}

impl Default for LfoBank {
    fn default() -> Self {
        Self {
            params: heapless_vec::LfoParamsVec::default(),
            state: heapless_vec::LfoStateVec::default(),
            last_pitch: 1.0,
            last_volume: 1.0,
            last_cutoff: 1.0,
            target_pitch: 1.0,
            target_volume: 1.0,
            target_cutoff: 1.0,
            block_pos: 0,
        }
    }
}

impl LfoBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconfigure the bank for a new region/note-on. `lfos` is truncated to
    /// [`heapless_vec::MAX_LFOS`] entries (no region in practice defines more).
    pub fn start(&mut self, lfos: &[LfoParams]) {
        let n = lfos.len().min(heapless_vec::MAX_LFOS);
        for i in 0..n {
            self.params.items[i] = lfos[i];
            self.state.items[i] = LfoState {
                phase: 0.0,
                delay_remaining: 0,
                fade_len: 0,
                fade_pos: 0,
            };
        }
        self.params.len = n;
        self.state.len = n;
        self.last_pitch = 1.0;
        self.last_volume = 1.0;
        self.last_cutoff = 1.0;
        self.target_pitch = 1.0;
        self.target_volume = 1.0;
        self.target_cutoff = 1.0;
        self.block_pos = 0;
    }

    /// (Re)compute per-sample delay/fade frame counts now that the sample
    /// rate is known. Call once after [`Self::start`].
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        for i in 0..self.params.len {
            let p = self.params.items[i];
            self.state.items[i].delay_remaining = (p.delay * sample_rate).max(0.0) as u32;
            self.state.items[i].fade_len = (p.fade * sample_rate).max(0.0) as u32;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.params.len == 0
    }

    /// Render `n` samples into the three output buffers (pitch/volume/cutoff
    /// multiplicative factors, each defaulting to 1.0 with no LFOs active).
    /// `freq_cc_offset` lets a region's `lfoN_freq_cc` mapping add to the
    /// base frequency before phase advances; pass a closure since the CC
    /// lookup lives on the channel/synth side.
    pub fn process(
        &mut self,
        sample_rate: f32,
        pitch_out: &mut [f32],
        volume_out: &mut [f32],
        cutoff_out: &mut [f32],
        n: usize,
        freq_cc_offset: impl Fn(usize) -> f32,
    ) {
        if self.params.len == 0 {
            pitch_out[..n].fill(1.0);
            volume_out[..n].fill(1.0);
            cutoff_out[..n].fill(1.0);
            return;
        }

        for i in 0..n {
            if self.block_pos == 0 {
                self.recompute_targets(sample_rate, &freq_cc_offset);
            }
            self.block_pos = (self.block_pos + 1) % TARGET_BLOCK;

            self.last_pitch = self.target_pitch * SMOOTH_NEW + SMOOTH_OLD * self.last_pitch;
            self.last_volume = self.target_volume * SMOOTH_NEW + SMOOTH_OLD * self.last_volume;
            self.last_cutoff = self.target_cutoff * SMOOTH_NEW + SMOOTH_OLD * self.last_cutoff;
            pitch_out[i] = self.last_pitch;
            volume_out[i] = self.last_volume;
            cutoff_out[i] = self.last_cutoff;

            self.advance_phases(sample_rate, &freq_cc_offset);
        }
    }

    fn recompute_targets(&mut self, _sample_rate: f32, freq_cc_offset: &impl Fn(usize) -> f32) {
        let mut pitch_sum = 0.0f32;
        let mut volume_sum = 0.0f32;
        let mut cutoff_sum = 0.0f32;

        for i in 0..self.params.len {
            if self.state.items[i].delay_remaining > 0 {
                continue;
            }
            let _ = freq_cc_offset; // frequency offsets are applied in advance_phases
            let mut value = sinf(self.state.items[i].phase);
            let st = self.state.items[i];
            if st.fade_pos < st.fade_len {
                value *= st.fade_pos as f32 / st.fade_len as f32;
            }
            let p = self.params.items[i];
            pitch_sum += value * p.to_pitch;
            volume_sum += value * p.to_volume;
            cutoff_sum += value * p.to_cutoff;
        }

        self.target_pitch = if pitch_sum != 0.0 { exp2_octaves(pitch_sum / 1200.0) } else { 1.0 };
        self.target_volume = if volume_sum != 0.0 { crate::math::db_to_linear(volume_sum) } else { 1.0 };
        self.target_cutoff = if cutoff_sum != 0.0 { exp2_octaves(cutoff_sum / 1200.0) } else { 1.0 };
    }

    fn advance_phases(&mut self, sample_rate: f32, freq_cc_offset: &impl Fn(usize) -> f32) {
        for i in 0..self.params.len {
            let p = self.params.items[i];
            let mut freq = p.freq + freq_cc_offset(i);
            if let Some((src, depth)) = p.freq_mod {
                if src < self.params.len {
                    let src_value = sinf(self.state.items[src].phase);
                    freq += src_value * depth;
                }
            }
            let st = &mut self.state.items[i];
            st.phase += (freq * core::f32::consts::TAU) / sample_rate;
            if st.delay_remaining > 0 {
                st.delay_remaining -= 1;
            }
            if st.fade_pos < st.fade_len {
                st.fade_pos += 1;
            }
        }
    }
}

#[inline]
fn exp2_octaves(x: f32) -> f32 {
    libm::exp2f(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bank_outputs_unity() {
        let mut bank = LfoBank::new();
        let mut p = [0.0; 8];
        let mut v = [0.0; 8];
        let mut c = [0.0; 8];
        bank.process(44100.0, &mut p, &mut v, &mut c, 8, |_| 0.0);
        assert!(p.iter().all(|&x| x == 1.0));
        assert!(v.iter().all(|&x| x == 1.0));
        assert!(c.iter().all(|&x| x == 1.0));
    }

    #[test]
    fn pitch_lfo_oscillates_around_unity() {
        let mut bank = LfoBank::new();
        bank.start(&[LfoParams { freq: 5.0, to_pitch: 600.0, ..Default::default() }]);
        bank.set_sample_rate(44100.0);
        let mut p = [0.0; 4096];
        let mut v = [0.0; 4096];
        let mut c = [0.0; 4096];
        bank.process(44100.0, &mut p, &mut v, &mut c, 4096, |_| 0.0);
        let max = p.iter().cloned().fold(f32::MIN, f32::max);
        let min = p.iter().cloned().fold(f32::MAX, f32::min);
        assert!(max > 1.0);
        assert!(min < 1.0);
    }

    #[test]
    fn delay_holds_output_at_unity() {
        let mut bank = LfoBank::new();
        bank.start(&[LfoParams { freq: 5.0, to_pitch: 1200.0, delay: 1.0, ..Default::default() }]);
        bank.set_sample_rate(44100.0);
        let mut p = [0.0; 1000];
        let mut v = [0.0; 1000];
        let mut c = [0.0; 1000];
        bank.process(44100.0, &mut p, &mut v, &mut c, 1000, |_| 0.0);
        assert!(p.iter().all(|&x| (x - 1.0).abs() < 1e-6));
    }

    #[test]
    fn freq_mod_changes_phase_rate() {
        let mut bank = LfoBank::new();
        bank.start(&[
            LfoParams { freq: 1.0, to_volume: 1.0, ..Default::default() },
            LfoParams { freq: 5.0, to_pitch: 1200.0, freq_mod: Some((0, 4.0)), ..Default::default() },
        ]);
        bank.set_sample_rate(44100.0);
        let mut p = [0.0; 4096];
        let mut v = [0.0; 4096];
        let mut c = [0.0; 4096];
        bank.process(44100.0, &mut p, &mut v, &mut c, 4096, |_| 0.0);
        assert!(p.iter().any(|&x| x != p[0]));
    }
}

//! Region data model: the input contract the engine consumes.
//!
//! A [`Region`] is a flat, fully-resolved description of one sample layer --
//! trigger predicates, playback parameters, amplitude/pan/crossfade shaping,
//! two filter specs, an amplitude and a filter envelope, and an arbitrary
//! list of LFOs. The instrument-file parser that produces these is out of
//! scope; this module only defines the shape the engine reads and the
//! mutable per-region trigger bookkeeping (`play_seq`, key-switch gates)
//! that lives alongside it.

use sampler_cache::Sample;
use sampler_dsp::OffMode;
use std::sync::Arc;

/// A single `{cc, value, curve}` contribution: `curve[curve_index].get(cc_value) * value`.
#[derive(Debug, Clone, Copy)]
pub struct CcMod {
    pub cc: u8,
    pub value: f32,
    pub curve_index: usize,
}

/// A base value plus velocity-squared and CC-list contributions, the common
/// shape of every numeric region parameter that can be CC-modulated.
#[derive(Debug, Clone, Default)]
pub struct CcParam {
    pub base: f32,
    pub cc: Vec<CcMod>,
}

impl CcParam {
    pub fn constant(base: f32) -> Self {
        Self { base, cc: Vec::new() }
    }

    /// Sum the base value with every CC contribution, given a curve table
    /// lookup and the current controller snapshot.
    pub fn resolve(&self, curves: &CurveLookup<'_>, cc_value: impl Fn(u8) -> u8) -> f32 {
        let mut total = self.base;
        for m in &self.cc {
            let v = cc_value(m.cc);
            total += curves.get(m.curve_index, v) * m.value;
        }
        total
    }
}

/// Borrowed view over the shared curve table, so [`CcParam::resolve`] doesn't
/// need to know how curves are stored.
pub struct CurveLookup<'a>(&'a sampler_dsp::CurveTable);

impl<'a> CurveLookup<'a> {
    pub fn new(table: &'a sampler_dsp::CurveTable) -> Self {
        Self(table)
    }

    fn get(&self, index: usize, cc_value: u8) -> f32 {
        self.0.get(index).map_or(0.0, |c| c.get(i32::from(cc_value)))
    }

    pub fn get_curve(&self, index: usize) -> Option<&sampler_dsp::Curve> {
        self.0.get(index)
    }
}

/// Sum a `{cc, value, curve_index}` list against the current controller
/// snapshot -- the shape every CC-modulated scalar (tune, filter cutoff,
/// LFO frequency, ...) that isn't already wrapped in a [`CcParam`] uses.
pub fn resolve_cc_mods(mods: &[CcMod], curves: &CurveLookup<'_>, cc_value: impl Fn(u8) -> u8) -> f32 {
    mods.iter().map(|m| curves.get(m.curve_index, cc_value(m.cc)) * m.value).sum()
}

/// `amplitude`'s CC list is the one documented exception to the
/// sum-of-contributions shape every other [`CcParam`] uses: its entries
/// multiply onto the base percentage rather than adding to it.
pub fn resolve_amplitude_pct(param: &CcParam, curves: &CurveLookup<'_>, cc_value: impl Fn(u8) -> u8) -> f32 {
    param.cc.iter().fold(param.base, |acc, m| acc * curves.get(m.curve_index, cc_value(m.cc)) * m.value)
}

/// One DAHDSR stage timing spec, in the same `{base, vel2, cc list}` shape
/// every region envelope parameter uses.
#[derive(Debug, Clone, Default)]
pub struct EgStage {
    pub base_seconds: f32,
    pub vel2: f32,
    pub cc: Vec<CcMod>,
}

impl EgStage {
    fn resolve(&self, curves: &CurveLookup<'_>, velocity_norm: f32, cc_value: impl Fn(u8) -> u8) -> f32 {
        let mut total = self.base_seconds + self.vel2 * velocity_norm;
        for m in &self.cc {
            let v = cc_value(m.cc);
            total += curves.get(m.curve_index, v) * m.value;
        }
        total.max(0.0)
    }
}

/// Full amplitude or filter envelope spec for a region.
#[derive(Debug, Clone, Default)]
pub struct EgSpec {
    pub delay: EgStage,
    pub attack: EgStage,
    pub hold: EgStage,
    pub decay: EgStage,
    /// Percent, 0..=100; not velocity/CC-modulated.
    pub sustain: f32,
    pub release: EgStage,
    pub off_time: f32,
    pub shape: sampler_dsp::Shape,
    /// Filter envelope only: modulation depth in cents.
    pub depth_cents: f32,
}

impl EgSpec {
    /// Lengths are resolved in seconds; the envelope itself multiplies by
    /// `sample_rate` on `start`.
    pub fn resolve(
        &self,
        curves: &CurveLookup<'_>,
        velocity_norm: f32,
        cc_value: impl Fn(u8) -> u8 + Copy,
    ) -> sampler_dsp::DahdsrParams {
        sampler_dsp::DahdsrParams {
            delay: self.delay.resolve(curves, velocity_norm, cc_value),
            attack: self.attack.resolve(curves, velocity_norm, cc_value),
            hold: self.hold.resolve(curves, velocity_norm, cc_value),
            decay: self.decay.resolve(curves, velocity_norm, cc_value),
            sustain: self.sustain,
            release: self.release.resolve(curves, velocity_norm, cc_value),
            off_time: self.off_time,
            shape: self.shape,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    #[default]
    None,
    OneShot,
    Continuous,
    Sustain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerKind {
    #[default]
    Attack,
    Release,
    Cc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrossfadeCurve {
    #[default]
    Power,
    Gain,
}

/// One crossfade ramp over `[lo, hi]`: `fade_in(x)` rises 0->1 across the
/// range (used for an `xfin_*` spec), `fade_out(x)` is its complement (used
/// for an `xfout_*` spec over its own, independently-set range). A region
/// with no crossfade on an axis sets `lo == hi == 0.0`, so `fade_in` is 1.0
/// everywhere and `fade_out` is 0.0 everywhere -- i.e. a no-op in the gain
/// product.
#[derive(Debug, Clone, Copy)]
pub struct CrossfadeRange {
    pub lo: f32,
    pub hi: f32,
    pub curve: CrossfadeCurve,
}

impl Default for CrossfadeRange {
    fn default() -> Self {
        Self { lo: 0.0, hi: 0.0, curve: CrossfadeCurve::Power }
    }
}

impl CrossfadeRange {
    fn ramp(&self, x: f32) -> f32 {
        smooth_ramp(x, self.lo, self.hi)
    }

    pub fn fade_in(&self, x: f32) -> f32 {
        match self.curve {
            CrossfadeCurve::Gain => self.ramp(x),
            CrossfadeCurve::Power => self.ramp(x).sqrt(),
        }
    }

    pub fn fade_out(&self, x: f32) -> f32 {
        match self.curve {
            CrossfadeCurve::Gain => 1.0 - self.ramp(x),
            CrossfadeCurve::Power => (1.0 - self.ramp(x)).sqrt(),
        }
    }

    /// `(fade_in(x), fade_out(x))` over the *same* range -- the pairing the
    /// testable crossfade-gain-law property exercises directly.
    pub fn gains(&self, x: f32) -> (f32, f32) {
        (self.fade_in(x), self.fade_out(x))
    }
}

fn smooth_ramp(x: f32, lo: f32, hi: f32) -> f32 {
    if lo >= hi {
        return if x >= hi { 1.0 } else { 0.0 };
    }
    ((x - lo) / (hi - lo)).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy)]
pub struct FilterSpec {
    pub kind: sampler_dsp::FilterKind,
    pub cutoff: f32,
    pub cutoff_cc: Option<(u8, f32)>,
    pub resonance: f32,
    pub keytrack: f32,
    pub keycenter: u8,
    pub veltrack: f32,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            kind: sampler_dsp::FilterKind::None,
            cutoff: 0.0,
            cutoff_cc: None,
            resonance: 0.0,
            keytrack: 0.0,
            keycenter: 60,
            veltrack: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LfoModSpec {
    pub to_index: usize,
    pub base_freq_mod: f32,
}

#[derive(Debug, Clone, Default)]
pub struct LfoSpec {
    pub freq: f32,
    pub phase: f32,
    pub delay: f32,
    pub fade: f32,
    pub to_pitch: f32,
    pub to_volume: f32,
    pub to_cutoff: f32,
    pub freq_mod: Option<LfoModSpec>,
}

/// A key range a key-switch press must land in to update `switch_match`, and
/// the range a subsequent region checks it against.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeySwitch {
    pub sw_lokey: Option<u8>,
    pub sw_hikey: Option<u8>,
    pub sw_lolast: Option<u8>,
    pub sw_hilast: Option<u8>,
    pub sw_default: Option<u8>,
}

/// A region's fully-resolved, immutable description. `Region` itself never
/// changes after load; trigger-time mutable state (`play_seq`, velocity
/// random draws consumed so far) lives in [`RegionState`] alongside it.
#[derive(Debug, Clone)]
pub struct Region {
    pub sample: Option<Arc<Sample>>,

    pub lokey: u8,
    pub hikey: u8,
    pub lovel: u8,
    pub hivel: u8,
    pub lorand: f32,
    pub hirand: f32,
    pub locc: [u8; 128],
    pub hicc: [u8; 128],

    pub pitch_keycenter: u8,
    pub pitch_keytrack: f32,
    pub tune_cents: f32,
    pub transpose_semitones: f32,
    pub bend_up_cents: f32,
    pub bend_down_cents: f32,
    pub tune_cc: Vec<CcMod>,

    pub loop_mode: LoopMode,
    pub loop_start: u64,
    pub loop_end: u64,
    pub offset: CcParam,
    pub offset_random: f32,
    pub delay: CcParam,

    pub trigger: TriggerKind,
    pub seq_length: u32,
    pub seq_position: u32,

    pub volume_db: CcParam,
    pub amplitude: CcParam,
    pub pan: CcParam,
    pub width: CcParam,
    /// Whether the engine should synthesize the default CC7-to-volume /
    /// CC10-to-pan mapping for this region. The instrument loader sets these
    /// to `false` when the region's own `volume_db`/`pan` CC lists already
    /// reference controller 7/10, so the default mapping and an explicit one
    /// never both apply.
    pub volume_cc7: bool,
    pub pan_cc10: bool,
    pub amp_veltrack: f32,
    pub amp_velcurve: Option<usize>,
    pub amp_random_db: f32,
    pub pitch_random_cents: f32,
    pub rt_decay_db_per_sec: f32,

    pub group: u32,
    pub off_by: u32,
    pub off_mode: OffMode,
    pub off_time: f32,

    pub key_switch: KeySwitch,

    pub xfin_vel: CrossfadeRange,
    pub xfout_vel: CrossfadeRange,
    pub xfin_key: CrossfadeRange,
    pub xfout_key: CrossfadeRange,
    pub xfin_cc: Vec<(u8, CrossfadeRange)>,
    pub xfout_cc: Vec<(u8, CrossfadeRange)>,

    pub amp_eg: EgSpec,
    pub filter_eg: EgSpec,

    pub filters: [FilterSpec; 2],
    pub lfos: Vec<LfoSpec>,

    pub quality: u8,
}

impl Default for Region {
    fn default() -> Self {
        Self {
            sample: None,
            lokey: 0,
            hikey: 127,
            lovel: 0,
            hivel: 127,
            lorand: 0.0,
            hirand: 1.0,
            locc: [0; 128],
            hicc: [127; 128],
            pitch_keycenter: 60,
            pitch_keytrack: 100.0,
            tune_cents: 0.0,
            transpose_semitones: 0.0,
            bend_up_cents: 200.0,
            bend_down_cents: 200.0,
            tune_cc: Vec::new(),
            loop_mode: LoopMode::None,
            loop_start: 0,
            loop_end: 0,
            offset: CcParam::default(),
            offset_random: 0.0,
            delay: CcParam::default(),
            trigger: TriggerKind::Attack,
            seq_length: 1,
            seq_position: 1,
            volume_db: CcParam::default(),
            amplitude: CcParam::constant(100.0),
            pan: CcParam::default(),
            width: CcParam::constant(100.0),
            volume_cc7: true,
            pan_cc10: true,
            amp_veltrack: 100.0,
            amp_velcurve: None,
            amp_random_db: 0.0,
            pitch_random_cents: 0.0,
            rt_decay_db_per_sec: 0.0,
            group: 0,
            off_by: 0,
            off_mode: OffMode::Normal,
            off_time: 0.0,
            key_switch: KeySwitch::default(),
            xfin_vel: CrossfadeRange::default(),
            xfout_vel: CrossfadeRange::default(),
            xfin_key: CrossfadeRange::default(),
            xfout_key: CrossfadeRange::default(),
            xfin_cc: Vec::new(),
            xfout_cc: Vec::new(),
            amp_eg: EgSpec::default(),
            filter_eg: EgSpec::default(),
            filters: [FilterSpec::default(); 2],
            lfos: Vec::new(),
            quality: 2,
        }
    }
}

impl Region {
    pub fn key_in_range(&self, key: u8) -> bool {
        key >= self.lokey && key <= self.hikey
    }

    pub fn velocity_in_range(&self, velocity: u8) -> bool {
        velocity >= self.lovel && velocity <= self.hivel
    }

    pub fn is_playable(&self) -> bool {
        self.sample.is_some()
    }
}

/// Mutable trigger-time bookkeeping for one region, owned alongside it by
/// the region set so repeated triggers see sequence/key-switch state evolve.
#[derive(Debug, Clone, Default)]
pub struct RegionState {
    /// 1-based; wraps modulo `seq_length`.
    pub play_seq: u32,
    /// Whether the most recent key-switch press satisfies this region's
    /// `sw_lolast..sw_hilast` gate. `None` when the region declares no gate.
    pub switch_match: Option<bool>,
}

impl RegionState {
    pub fn new(region: &Region) -> Self {
        let switch_match = if region.key_switch.sw_lolast.is_some() || region.key_switch.sw_hilast.is_some() {
            let default_in_range = match (region.key_switch.sw_default, region.key_switch.sw_lolast, region.key_switch.sw_hilast) {
                (Some(d), lo, hi) => d >= lo.unwrap_or(0) && d <= hi.unwrap_or(127),
                (None, _, _) => false,
            };
            Some(default_in_range)
        } else {
            None
        };
        Self { play_seq: 1, switch_match }
    }

    /// Advance the sequence counter, wrapping modulo `seq_length`. Called
    /// whenever the region is evaluated for a trigger, regardless of whether
    /// the random gate passed (the source increments either way).
    pub fn advance_seq(&mut self, seq_length: u32) {
        self.play_seq = self.play_seq % seq_length.max(1) + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_and_velocity_ranges() {
        let mut r = Region { lokey: 36, hikey: 48, lovel: 40, hivel: 100, ..Default::default() };
        assert!(r.key_in_range(40));
        assert!(!r.key_in_range(50));
        assert!(r.velocity_in_range(60));
        r.hivel = 30;
        assert!(!r.velocity_in_range(60));
    }

    #[test]
    fn seq_state_wraps_modulo_length() {
        let region = Region { seq_length: 3, ..Default::default() };
        let mut state = RegionState::new(&region);
        assert_eq!(state.play_seq, 1);
        state.advance_seq(3);
        assert_eq!(state.play_seq, 2);
        state.advance_seq(3);
        assert_eq!(state.play_seq, 3);
        state.advance_seq(3);
        assert_eq!(state.play_seq, 1);
    }

    #[test]
    fn crossfade_power_law_sums_to_one() {
        let xf = CrossfadeRange { lo: 0.0, hi: 100.0, curve: CrossfadeCurve::Power };
        for x in [0.0, 25.0, 50.0, 75.0, 100.0] {
            let (gin, gout) = xf.gains(x);
            assert!((gin * gin + gout * gout - 1.0).abs() < 1e-6, "x={x} gin={gin} gout={gout}");
        }
    }

    #[test]
    fn crossfade_gain_law_sums_to_one() {
        let xf = CrossfadeRange { lo: 0.0, hi: 100.0, curve: CrossfadeCurve::Gain };
        for x in [0.0, 25.0, 50.0, 75.0, 100.0] {
            let (gin, gout) = xf.gains(x);
            assert!((gin + gout - 1.0).abs() < 1e-6, "x={x} gin={gin} gout={gout}");
        }
    }

    #[test]
    fn switch_match_seeded_from_default_when_in_range() {
        let region = Region {
            key_switch: KeySwitch { sw_lolast: Some(10), sw_hilast: Some(20), sw_default: Some(15), ..Default::default() },
            ..Default::default()
        };
        let state = RegionState::new(&region);
        assert_eq!(state.switch_match, Some(true));
    }
}

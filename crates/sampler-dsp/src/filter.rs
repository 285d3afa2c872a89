//! Multi-pole resonant filter bank used by each voice.
//!
//! Coefficients are derived with the DAFX/Zolzer bilinear-transform formulas
//! and recomputed at most once per 16-sample sub-segment (`SEGMENT_SIZE`),
//! matching the granularity at which the envelope/LFO cutoff modulation is
//! allowed to move the cutoff. Between recomputes, a new `(cutoff, resonance)`
//! pair is clamped to a bounded jump from the last one (cutoff within
//! `[last/1.4, last*1.4]`, resonance within `last +/- 1dB`) so a sudden
//! modulation target can't produce an audible coefficient discontinuity.
//!
//! 4-pole and 6-pole variants cascade 2 or 3 identical 2-pole biquad stages.

use crate::biquad::Biquad;
use crate::math::fast_db_to_factor;
use core::f32::consts::PI;
use libm::tanf;

const SEGMENT_SIZE: usize = 16;

/// Filter topology, named after pole count and response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterKind {
    #[default]
    None,
    Lpf1p,
    Hpf1p,
    Lpf2p,
    Hpf2p,
    Bpf2p,
    Brf2p,
    Lpf4p,
    Hpf4p,
    Lpf6p,
    Hpf6p,
}

impl FilterKind {
    /// Number of cascaded 2-pole biquad stages (0 if the type is 1-pole or `None`).
    fn biquad_stages(self) -> usize {
        match self {
            FilterKind::Lpf2p | FilterKind::Hpf2p | FilterKind::Bpf2p | FilterKind::Brf2p => 1,
            FilterKind::Lpf4p | FilterKind::Hpf4p => 2,
            FilterKind::Lpf6p | FilterKind::Hpf6p => 3,
            FilterKind::Lpf1p | FilterKind::Hpf1p | FilterKind::None => 0,
        }
    }

    fn is_one_pole(self) -> bool {
        matches!(self, FilterKind::Lpf1p | FilterKind::Hpf1p)
    }

    fn two_pole_base(self) -> FilterKind {
        match self {
            FilterKind::Lpf4p | FilterKind::Lpf6p => FilterKind::Lpf2p,
            FilterKind::Hpf4p | FilterKind::Hpf6p => FilterKind::Hpf2p,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct OnePoleState {
    x1: f32,
    y1: f32,
}

impl OnePoleState {
    #[inline]
    fn process(&mut self, input: f32, b0: f32, b1: f32, a1: f32) -> f32 {
        let output = b0 * input + b1 * self.x1 - a1 * self.y1;
        self.x1 = input;
        self.y1 = output;
        output
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct OnePoleCoeffs {
    b0: f32,
    b1: f32,
    a1: f32,
}

/// A cascaded multi-pole filter with built-in cutoff/resonance smoothing.
#[derive(Debug, Clone)]
pub struct SampleFilter {
    kind: FilterKind,
    biquads: [Biquad; 3],
    one_pole: OnePoleState,
    one_pole_coeffs: OnePoleCoeffs,
    last_cutoff: f32,
    last_resonance: f32,
    first: bool,
    segment_pos: usize,
}

impl Default for SampleFilter {
    fn default() -> Self {
        Self {
            kind: FilterKind::None,
            biquads: [Biquad::new(), Biquad::new(), Biquad::new()],
            one_pole: OnePoleState::default(),
            one_pole_coeffs: OnePoleCoeffs::default(),
            last_cutoff: 1000.0,
            last_resonance: 0.0,
            first: true,
            segment_pos: 0,
        }
    }
}

impl SampleFilter {
    pub fn new(kind: FilterKind) -> Self {
        Self { kind, ..Default::default() }
    }

    pub fn set_kind(&mut self, kind: FilterKind) {
        if kind != self.kind {
            self.kind = kind;
            self.reset();
        }
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    /// Clear all filter memory and force a full coefficient recompute on
    /// the next call to [`Self::process`].
    pub fn reset(&mut self) {
        for b in &mut self.biquads {
            b.clear();
        }
        self.one_pole = OnePoleState::default();
        self.first = true;
        self.segment_pos = 0;
    }

    /// Filter one sample. `cutoff`/`resonance` (resonance in dB) are
    /// re-applied (with jump clamping) every [`SEGMENT_SIZE`] samples.
    #[inline]
    pub fn process(&mut self, input: f32, cutoff: f32, resonance: f32, sample_rate: f32) -> f32 {
        if self.kind == FilterKind::None {
            return input;
        }
        if self.segment_pos == 0 {
            self.update_coefficients(cutoff, resonance, sample_rate);
        }
        self.segment_pos = (self.segment_pos + 1) % SEGMENT_SIZE;

        if self.kind.is_one_pole() {
            let c = self.one_pole_coeffs;
            return self.one_pole.process(input, c.b0, c.b1, c.a1);
        }

        let stages = self.kind.biquad_stages();
        let mut out = input;
        for biquad in self.biquads.iter_mut().take(stages) {
            out = biquad.process(out);
        }
        out
    }

    fn update_coefficients(&mut self, cutoff_in: f32, resonance_in: f32, sample_rate: f32) {
        let mut cutoff = cutoff_in.max(10.0);
        let mut resonance = resonance_in;

        if self.first {
            self.first = false;
        } else if cutoff == self.last_cutoff && resonance == self.last_resonance {
            return;
        } else {
            cutoff = cutoff.clamp(self.last_cutoff / 1.4, self.last_cutoff * 1.4);
            resonance = resonance.clamp(self.last_resonance - 1.0, self.last_resonance + 1.0);
        }

        let norm_cutoff = (cutoff / sample_rate).min(0.49);
        let k = tanf(PI * norm_cutoff);

        if self.kind.is_one_pole() {
            let div = 1.0 / (k + 1.0);
            self.one_pole_coeffs = match self.kind {
                FilterKind::Lpf1p => OnePoleCoeffs { b0: k * div, b1: k * div, a1: (k - 1.0) * div },
                FilterKind::Hpf1p => OnePoleCoeffs { b0: div, b1: -div, a1: (k - 1.0) * div },
                _ => unreachable!(),
            };
        } else {
            let kk = k * k;
            let q = fast_db_to_factor(resonance);
            let div = 1.0 / (1.0 + (k + 1.0 / q) * k);
            let a1 = 2.0 * (kk - 1.0) * div;
            let a2 = (1.0 - k / q + kk) * div;
            let (b0, b1, b2) = match self.kind.two_pole_base() {
                FilterKind::Lpf2p => (kk * div, 2.0 * kk * div, kk * div),
                FilterKind::Hpf2p => (div, -2.0 * div, div),
                FilterKind::Bpf2p => {
                    let bp = (k / q) * div;
                    (bp, 0.0, -bp)
                }
                FilterKind::Brf2p => ((1.0 + kk) * div, 2.0 * (kk - 1.0) * div, (1.0 + kk) * div),
                _ => unreachable!(),
            };
            for stage in self.biquads.iter_mut().take(self.kind.biquad_stages()) {
                stage.set_coefficients(b0, b1, b2, 1.0, a1, a2);
            }
        }

        self.last_cutoff = cutoff;
        self.last_resonance = resonance;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_passthrough() {
        let mut f = SampleFilter::new(FilterKind::None);
        assert_eq!(f.process(0.42, 1000.0, 0.0, 44100.0), 0.42);
    }

    #[test]
    fn lpf2p_attenuates_high_frequency_more_than_dc() {
        let mut f = SampleFilter::new(FilterKind::Lpf2p);
        let mut out_dc = 0.0;
        for _ in 0..2000 {
            out_dc = f.process(1.0, 500.0, 0.0, 44100.0);
        }
        assert!((out_dc - 1.0).abs() < 0.1, "dc should pass near-unity, got {out_dc}");

        let mut f2 = SampleFilter::new(FilterKind::Lpf2p);
        let mut energy = 0.0;
        for i in 0..2000 {
            let x = if i % 2 == 0 { 1.0 } else { -1.0 }; // Nyquist/2-ish alternating signal
            let y = f2.process(x, 500.0, 0.0, 44100.0);
            energy += y * y;
        }
        assert!(energy < 2000.0, "high frequency energy should be attenuated, got {energy}");
    }

    #[test]
    fn lpf4p_and_lpf6p_cascade_more_stages() {
        let mut f4 = SampleFilter::new(FilterKind::Lpf4p);
        let mut f6 = SampleFilter::new(FilterKind::Lpf6p);
        let mut e4 = 0.0;
        let mut e6 = 0.0;
        for i in 0..4000 {
            let x = if i % 2 == 0 { 1.0 } else { -1.0 };
            let y4 = f4.process(x, 2000.0, 0.0, 44100.0);
            let y6 = f6.process(x, 2000.0, 0.0, 44100.0);
            e4 += y4 * y4;
            e6 += y6 * y6;
        }
        assert!(e6 <= e4 + 1e-3, "6-pole should roll off at least as steeply as 4-pole: e4={e4} e6={e6}");
    }

    #[test]
    fn cutoff_jump_is_clamped_across_segments() {
        let mut f = SampleFilter::new(FilterKind::Lpf2p);
        f.process(0.0, 1000.0, 0.0, 44100.0);
        // A huge jump should only move the internal target by the 1.4x bound
        // on the very next segment, not snap instantly.
        for _ in 0..SEGMENT_SIZE {
            f.process(0.0, 20000.0, 0.0, 44100.0);
        }
        assert!(f.last_cutoff <= 1000.0 * 1.4 + 1e-3);
    }

    #[test]
    fn reset_clears_state() {
        let mut f = SampleFilter::new(FilterKind::Lpf2p);
        for _ in 0..100 {
            f.process(1.0, 1000.0, 0.0, 44100.0);
        }
        f.reset();
        assert_eq!(f.biquads[0].process(0.0), 0.0);
    }
}

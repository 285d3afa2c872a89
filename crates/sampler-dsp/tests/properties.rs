//! Property-based tests for sampler-dsp primitives.
//!
//! Uses proptest for randomized parameter/input generation to check
//! stability (no NaN/Inf), monotonic convergence, and bounded output across
//! the full range of region-file parameters a voice can be configured with.

use proptest::prelude::*;
use sampler_dsp::{
    DahdsrEnvelope, DahdsrParams, FilterKind, LfoBank, LfoParams, LinearSmooth, OffMode, Shape,
    interp_hermite, interp_linear, interp_optimal_2x,
};

fn all_filter_kinds() -> Vec<FilterKind> {
    vec![
        FilterKind::None,
        FilterKind::Lpf1p,
        FilterKind::Hpf1p,
        FilterKind::Lpf2p,
        FilterKind::Hpf2p,
        FilterKind::Bpf2p,
        FilterKind::Brf2p,
        FilterKind::Lpf4p,
        FilterKind::Hpf4p,
        FilterKind::Lpf6p,
        FilterKind::Hpf6p,
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// For any valid cutoff (20Hz-20kHz) and resonance (0-24dB), every filter
    /// kind produces finite output for 1024 samples of random finite input.
    #[test]
    fn sample_filter_stability(
        cutoff in 20.0f32..20000.0f32,
        resonance in 0.0f32..24.0f32,
        kind_idx in 0usize..11,
        input in prop::array::uniform32(-1.0f32..=1.0f32),
    ) {
        let kinds = all_filter_kinds();
        let mut filter = sampler_dsp::SampleFilter::new(kinds[kind_idx]);

        for &sample in &input {
            let out = filter.process(sample, cutoff, resonance, 48000.0);
            prop_assert!(
                out.is_finite(),
                "filter {:?} (cutoff={}, resonance={}) produced non-finite output {} for input {}",
                kinds[kind_idx], cutoff, resonance, out, sample
            );
        }
    }

    /// DahdsrEnvelope output stays within [0, 1] for any stage timing and
    /// sustain level, across both segment shapes, through a full
    /// start-then-release cycle.
    #[test]
    fn dahdsr_envelope_bounded(
        attack in 0.0f32..2.0f32,
        decay in 0.0f32..2.0f32,
        sustain in 0.0f32..100.0f32,
        release in 0.0f32..2.0f32,
        shape_is_exp in prop::bool::ANY,
    ) {
        let shape = if shape_is_exp { Shape::Exponential } else { Shape::Linear };
        let mut env = DahdsrEnvelope::new();
        env.start(
            DahdsrParams { delay: 0.0, attack, hold: 0.0, decay, sustain, release, off_time: 0.0, shape },
            48000.0,
        );
        for i in 0..4000 {
            if i == 2000 {
                env.stop(OffMode::Normal);
            }
            let level = env.get_next();
            prop_assert!(level.is_finite() && (-1e-4..=1.000_1).contains(&level),
                "envelope level out of bounds: {level}");
        }
    }

    /// LinearSmooth never overshoots its target and always reaches it
    /// exactly once enough samples have elapsed.
    #[test]
    fn linear_smooth_converges_without_overshoot(
        initial in -100.0f32..100.0f32,
        target in -100.0f32..100.0f32,
        time_ms in 0.1f32..200.0f32,
    ) {
        let mut p = LinearSmooth::with_config(initial, 48000.0, time_ms);
        p.set(target, false);

        let lo = initial.min(target);
        let hi = initial.max(target);
        let margin = (hi - lo) * 1e-4 + 1e-4;

        for _ in 0..((48000.0 * time_ms / 1000.0) as usize + 2) {
            let v = p.get_next();
            prop_assert!(v >= lo - margin && v <= hi + margin,
                "overshoot: v={v} lo={lo} hi={hi}");
        }
        prop_assert!((p.get() - target).abs() < 1e-3, "did not converge: got {} want {}", p.get(), target);
    }

    /// LfoBank output (pitch/volume/cutoff multipliers) is always finite,
    /// regardless of how many LFOs are active or how they cross-modulate.
    #[test]
    fn lfo_bank_outputs_finite(
        freq_a in 0.01f32..50.0f32,
        freq_b in 0.01f32..50.0f32,
        to_pitch in -2400.0f32..2400.0f32,
        to_volume in -24.0f32..24.0f32,
        to_cutoff in -4800.0f32..4800.0f32,
        mod_depth in 0.0f32..10.0f32,
    ) {
        let mut bank = LfoBank::new();
        bank.start(&[
            LfoParams { freq: freq_a, to_pitch, to_volume, ..Default::default() },
            LfoParams { freq: freq_b, to_cutoff, freq_mod: Some((0, mod_depth)), ..Default::default() },
        ]);
        bank.set_sample_rate(48000.0);

        let n = 512;
        let mut pitch = vec![0.0f32; n];
        let mut volume = vec![0.0f32; n];
        let mut cutoff = vec![0.0f32; n];
        bank.process(48000.0, &mut pitch, &mut volume, &mut cutoff, n, |_| 0.0);

        prop_assert!(pitch.iter().all(|v| v.is_finite()));
        prop_assert!(volume.iter().all(|v| v.is_finite()));
        prop_assert!(cutoff.iter().all(|v| v.is_finite()));
    }

    /// Every interpolation kernel stays bounded by (roughly) the range of
    /// its input samples for any fractional position in [0, 1] -- no kernel
    /// should ring wildly on bounded input.
    #[test]
    fn interpolation_kernels_bounded(
        y0 in -1.0f32..1.0f32,
        y1 in -1.0f32..1.0f32,
        y2 in -1.0f32..1.0f32,
        y3 in -1.0f32..1.0f32,
        frac in 0.0f32..1.0f32,
    ) {
        let lo = [y0, y1, y2, y3].iter().cloned().fold(f32::MAX, f32::min);
        let hi = [y0, y1, y2, y3].iter().cloned().fold(f32::MIN, f32::max);
        let margin = (hi - lo) * 0.5 + 0.05;

        let lin = interp_linear(frac, y1, y2);
        prop_assert!(lin >= lo - 1e-5 && lin <= hi + 1e-5, "linear out of range: {lin}");

        let herm = interp_hermite(frac, y0, y1, y2, y3);
        prop_assert!(herm >= lo - margin && herm <= hi + margin, "hermite out of range: {herm}");

        let opt = interp_optimal_2x(frac, y0, y1, y2, y3);
        prop_assert!(opt >= lo - margin && opt <= hi + margin, "optimal2x out of range: {opt}");
    }
}

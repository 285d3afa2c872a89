//! Sample-rate-independent playback interpolation.
//!
//! Three interpolation qualities trade CPU for fidelity:
//!
//! - **Quality 1 (linear)**: cheapest, audible aliasing on pitched-up content.
//! - **Quality 2 (Hermite)**: 6-point, 3rd-order Hermite spline (x-form);
//!   good general-purpose quality.
//! - **Quality 3 (optimal 2x)**: the sample stream is first upsampled 2x
//!   through a fixed 11-tap half-band polyphase filter, then interpolated
//!   with a 4-point, 4th-order polynomial tuned for 2x-oversampled input
//!   (Niemitalo, "Polynomial Interpolators for High-Quality Resampling of
//!   Oversampled Audio"). This is the quality used for sample playback
//!   pitched below the original recording's rate.

/// Quality level selecting an interpolation kernel (1 = cheapest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    Linear,
    #[default]
    Hermite,
    Optimal2x,
}

impl Quality {
    pub fn from_u8(q: u8) -> Self {
        match q {
            1 => Quality::Linear,
            3 => Quality::Optimal2x,
            _ => Quality::Hermite,
        }
    }

    /// `true` for qualities that require the signal pre-upsampled 2x via
    /// [`halfband_interpolate`] before this kernel runs.
    pub fn needs_upsample(self) -> bool {
        self == Quality::Optimal2x
    }
}

/// Coefficients of an 11-tap half-band low-pass FIR, used to synthesize the
/// midpoint sample between two existing samples (2x upsampling). Taps are
/// symmetric around the midpoint; only one side is stored.
pub const HALFBAND_TAPS: [f32; 11] = [
    0.632_371_16,
    -0.199_749_80,
    0.107_488_60,
    -0.064_996_20,
    0.040_215_55,
    -0.024_427_95,
    0.014_168_42,
    -0.007_638_99,
    0.003_693_62,
    -0.001_502_34,
    0.000_435_65,
];

/// Interpolate the sample halfway between `history[10]` and `history[11]`,
/// given the 22-sample context window `history[0..22] == x[n-10 ..= n+11]`.
#[inline]
pub fn halfband_interpolate(history: &[f32; 22]) -> f32 {
    let mut acc = 0.0f32;
    for (k, &tap) in HALFBAND_TAPS.iter().enumerate() {
        acc += tap * (history[10 - k] + history[11 + k]);
    }
    acc
}

/// Linear interpolation between two adjacent samples.
#[inline]
pub fn interp_linear(frac: f32, y0: f32, y1: f32) -> f32 {
    y0 + (y1 - y0) * frac
}

/// 6-point, 3rd-order Hermite interpolation (x-form). `ym2, ym1, y0, y1, y2,
/// y3` are six consecutive samples and `frac` is the fractional position
/// between `y0` and `y1`.
#[inline]
#[allow(clippy::many_single_char_names)]
pub fn interp_hermite(frac: f32, ym2: f32, ym1: f32, y0: f32, y1: f32, y2: f32, y3: f32) -> f32 {
    let c1 = ym2 - y2 + 8.0 * (y1 - ym1);
    let c2 = 15.0 * ym1 - 28.0 * y0 + 20.0 * y1 - 6.0 * y2 + y3 - 2.0 * ym2;
    let c3 = ym2 - y3 + 7.0 * (y2 - ym1) + 16.0 * (y0 - y1);
    (((c3 * frac + c2) * frac + c1) * frac) * (1.0 / 12.0) + y0
}

/// 4-point, 4th-order "optimal 2x" interpolation for already-2x-oversampled
/// input (Niemitalo z-form). `y0..y3` are four consecutive (oversampled)
/// samples and `frac` is the fractional position between `y1` and `y2`.
#[inline]
pub fn interp_optimal_2x(frac: f32, y0: f32, y1: f32, y2: f32, y3: f32) -> f32 {
    let z = frac - 0.5;
    let even1 = y1 + y2;
    let odd1 = y1 - y2;
    let even2 = y0 + y3;
    let odd2 = y0 - y3;

    let c0 = even1 * 0.456_459_18 + even2 * 0.043_541_74;
    let c1 = odd1 * 0.472_366_75 + odd2 * 0.176_866_14;
    let c2 = even1 * -0.253_674_79 + even2 * 0.253_719_19;
    let c3 = odd1 * -0.379_170_92 + odd2 * 0.119_529_66;
    let c4 = even1 * 0.042_521_64 + even2 * -0.042_891_44;
    let c5 = odd1 * 0.081_307_38 + odd2 * -0.023_277_81;

    (((((c5 * z) + c4) * z + c3) * z + c2) * z + c1) * z + c0
}

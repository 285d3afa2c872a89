//! Small math helpers shared by the envelope, filter, LFO and curve modules.
//!
//! All functions are allocation-free and suitable for `no_std`.

use libm::{exp2f, expf, logf};

/// Convert decibels to linear gain.
///
/// # Example
/// ```rust
/// use sampler_dsp::db_to_linear;
///
/// assert!((db_to_linear(0.0) - 1.0).abs() < 0.001);
/// assert!((db_to_linear(-6.02) - 0.5).abs() < 0.01);
/// ```
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    const FACTOR: f32 = core::f32::consts::LN_10 / 20.0;
    expf(db * FACTOR)
}

/// Convert linear gain to decibels.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    const FACTOR: f32 = 20.0 / core::f32::consts::LN_10;
    logf(linear.max(1e-10)) * FACTOR
}

/// `exp2(db * log2(10)/20)`, a cheaper `db_to_linear` used on the filter's
/// per-segment coefficient recompute path.
///
/// The constant is `log2(10)/20`.
#[inline]
pub fn fast_db_to_factor(db: f32) -> f32 {
    exp2f(db * 0.166_096_4)
}

/// Linear interpolation between two values.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Clamp a value to a range.
#[inline]
pub fn clamp(x: f32, min: f32, max: f32) -> f32 {
    x.clamp(min, max)
}

/// Convert frequency in Hz to angular frequency (radians/sample).
#[inline]
pub fn hz_to_omega(freq_hz: f32, sample_rate: f32) -> f32 {
    core::f32::consts::TAU * freq_hz / sample_rate
}

/// Convert milliseconds to samples.
#[inline]
pub fn ms_to_samples(ms: f32, sample_rate: f32) -> f32 {
    ms * sample_rate / 1000.0
}

/// Convert samples to milliseconds.
#[inline]
pub fn samples_to_ms(samples: f32, sample_rate: f32) -> f32 {
    samples * 1000.0 / sample_rate
}

/// Sum stereo to mono (equal-power average).
#[inline]
pub fn mono_sum(left: f32, right: f32) -> f32 {
    (left + right) * 0.5
}

/// Round a sample-rate-relative time in seconds to a frame count, with a
/// floor of one frame so zero-length stages never become divide-by-zero
/// targets downstream.
#[inline]
pub fn seconds_to_frames_min1(seconds: f32, sample_rate: f32) -> u32 {
    (seconds * sample_rate).max(1.0) as u32
}

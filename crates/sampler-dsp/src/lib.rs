//! Sampler DSP - per-voice signal processing primitives for the sampler engine.
//!
//! This crate provides the DSP building blocks a sampler voice is assembled
//! from, designed for real-time audio processing with zero allocation in the
//! audio path.
//!
//! # Core Abstractions
//!
//! ## Envelope
//!
//! - [`DahdsrEnvelope`] - Delay/Attack/Hold/Decay/Sustain/Release envelope
//!   with linear or exponential segment shapes.
//!
//! ## Filters
//!
//! - [`Biquad`] - Second-order IIR building block (Direct Form I)
//! - [`SampleFilter`] - Cascaded 1/2/4/6-pole filter bank with segment-smoothed
//!   cutoff/resonance
//!
//! ## Modulation
//!
//! - [`LfoBank`] - Per-voice bank of cross-modulating LFOs producing
//!   pitch/volume/cutoff factors
//!
//! ## Smoothing
//!
//! - [`LinearSmooth`] - Linear ramps for gain/pan/width/speed (zipper-free)
//!
//! ## Curves
//!
//! - [`Curve`] / [`CurveTable`] - 128-point lookup tables built from sparse
//!   control points, interned by value
//!
//! ## Interpolation
//!
//! - [`Quality`] - Playback interpolation quality selector
//! - [`interp_linear`], [`interp_hermite`], [`interp_optimal_2x`],
//!   [`halfband_interpolate`] - the three playback-quality kernels
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible for embedded audio applications.
//! Disable the default `std` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! sampler-dsp = { version = "0.1", default-features = false }
//! ```
//!
//! # Design Principles
//!
//! - **Real-time safe**: No allocations in audio processing paths
//! - **No dependencies on std**: Pure `no_std` with `libm` for math
//! (the [`curve::CurveTable`] interning map is the one exception, gated
//! behind the `std` feature)

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod biquad;
pub mod curve;
pub mod envelope;
pub mod filter;
pub mod lfo;
pub mod math;
pub mod smooth;
pub mod upsample;

pub use biquad::Biquad;
pub use curve::Curve;
#[cfg(feature = "std")]
pub use curve::CurveTable;
pub use envelope::{DahdsrEnvelope, DahdsrParams, OffMode, Shape};
pub use filter::{FilterKind, SampleFilter};
pub use lfo::{LfoBank, LfoParams};
pub use math::{db_to_linear, fast_db_to_factor, linear_to_db, mono_sum};
pub use smooth::LinearSmooth;
pub use upsample::{
    HALFBAND_TAPS, Quality, halfband_interpolate, interp_hermite, interp_linear,
    interp_optimal_2x,
};

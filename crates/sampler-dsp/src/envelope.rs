//! DAHDSR (Delay-Attack-Hold-Decay-Sustain-Release) envelope generator.
//!
//! Drives per-voice amplitude and filter-cutoff modulation. Each non-sustain
//! stage is described by a `(length, factor, delta)` slope: every sample
//! advances with `level = level * factor + delta`, which lets [`Shape::Linear`]
//! and [`Shape::Exponential`] share one inner loop (`factor == 1.0` collapses
//! the recurrence to plain addition).
//!
//! Exponential segments approach their target asymptotically and never
//! reach it exactly, so the true target is approached to within -60dB
//! (`RATIO = 0.001`) and then snapped on the final sample of the stage.

use libm::{expf, logf};

/// Segment shape used for all non-flat DAHDSR stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shape {
    Exponential,
    #[default]
    Linear,
}

/// How a release is triggered, controlling which length it uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffMode {
    /// Use the fixed ~30ms fast-kill length, for voice-stealing and `off_by` groups.
    Fast,
    /// Use the region's configured `release` length.
    #[default]
    Normal,
    /// Use the region's configured `off_time` length.
    Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Delay,
    Attack,
    Hold,
    Decay,
    Sustain,
    Release,
    Done,
}

/// Per-region envelope timing, already resolved from key/velocity tracking
/// (callers apply `EGParam` veltrack curves before constructing this).
#[derive(Debug, Clone, Copy)]
pub struct DahdsrParams {
    pub delay: f32,
    pub attack: f32,
    pub hold: f32,
    pub decay: f32,
    /// Sustain level, 0..=100 (percent of peak).
    pub sustain: f32,
    pub release: f32,
    pub off_time: f32,
    pub shape: Shape,
}

impl Default for DahdsrParams {
    fn default() -> Self {
        Self {
            delay: 0.0,
            attack: 0.0,
            hold: 0.0,
            decay: 0.0,
            sustain: 100.0,
            release: 0.0,
            off_time: 0.0,
            shape: Shape::Linear,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Slope {
    factor: f32,
    delta: f32,
    end: f32,
}

const RELEASE_RATIO: f32 = 0.001; // -60dB

fn compute_slope(start: f32, end: f32, len: u32, shape: Shape) -> Slope {
    if len == 0 {
        return Slope { factor: 1.0, delta: 0.0, end };
    }
    match shape {
        Shape::Linear => Slope {
            factor: 1.0,
            delta: (end - start) / len as f32,
            end,
        },
        Shape::Exponential => {
            let f = -logf((RELEASE_RATIO + 1.0) / RELEASE_RATIO) / len as f32;
            let factor = expf(f);
            let delta = (end - RELEASE_RATIO * (start - end)) * (1.0 - factor);
            Slope { factor, delta, end }
        }
    }
}

/// A single voice's DAHDSR envelope.
#[derive(Debug, Clone)]
pub struct DahdsrEnvelope {
    state: State,
    level: f32,
    slope: Slope,
    remaining: u32,

    delay_len: u32,
    attack_len: u32,
    hold_len: u32,
    decay_len: u32,
    release_len: u32,
    stop_len: u32,
    off_time_len: u32,
    sustain_level: f32,
    shape: Shape,
}

impl Default for DahdsrEnvelope {
    fn default() -> Self {
        Self {
            state: State::Done,
            level: 0.0,
            slope: Slope::default(),
            remaining: 0,
            delay_len: 0,
            attack_len: 0,
            hold_len: 0,
            decay_len: 0,
            release_len: 0,
            stop_len: 1,
            off_time_len: 1,
            sustain_level: 1.0,
            shape: Shape::Linear,
        }
    }
}

impl DahdsrEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin the envelope at the delay stage (or the first non-zero-length
    /// stage after it), using absolute times in seconds.
    pub fn start(&mut self, params: DahdsrParams, sample_rate: f32) {
        self.delay_len = (params.delay * sample_rate) as u32;
        self.attack_len = (params.attack * sample_rate) as u32;
        self.hold_len = (params.hold * sample_rate) as u32;
        self.decay_len = (params.decay * sample_rate) as u32;
        self.release_len = (params.release * sample_rate) as u32;
        self.stop_len = (sample_rate * 0.030).max(1.0) as u32;
        self.off_time_len = (sample_rate * params.off_time).max(1.0) as u32;
        self.sustain_level = (params.sustain * 0.01).clamp(0.0, 1.0);
        self.shape = params.shape;
        self.level = 0.0;
        self.state = State::Delay;
        self.enter_state();
    }

    /// Trigger the release stage from whatever stage is currently active.
    /// A no-op once the envelope has already reached [`State::Done`].
    pub fn stop(&mut self, mode: OffMode) {
        if self.state == State::Done {
            return;
        }
        self.release_len = match mode {
            OffMode::Fast => self.stop_len,
            OffMode::Normal => self.release_len,
            OffMode::Time => self.off_time_len,
        };
        self.state = State::Release;
        self.enter_state();
    }

    /// Silence the envelope immediately, e.g. on voice-pool reclamation.
    pub fn reset(&mut self) {
        self.level = 0.0;
        self.state = State::Done;
        self.remaining = 0;
    }

    /// `true` while the envelope has not yet reached [`State::Done`].
    #[inline]
    pub fn is_active(&self) -> bool {
        self.state != State::Done
    }

    /// `true` once release has begun (used to gate `off_by` self-cancellation).
    #[inline]
    pub fn is_releasing(&self) -> bool {
        self.state == State::Release
    }

    /// Advance by one sample and return the new envelope level in `[0, 1]`.
    #[inline]
    pub fn get_next(&mut self) -> f32 {
        match self.state {
            State::Sustain => self.sustain_level,
            State::Done => 0.0,
            _ => {
                self.level = self.level * self.slope.factor + self.slope.delta;
                if self.remaining > 0 {
                    self.remaining -= 1;
                }
                if self.remaining == 0 {
                    self.level = self.slope.end;
                    self.advance_stage();
                }
                self.level
            }
        }
    }

    /// Move into `self.state`, computing its slope (or, for zero-length
    /// stages, cascading straight into the next one).
    fn enter_state(&mut self) {
        match self.state {
            State::Delay => {
                if self.delay_len == 0 {
                    self.state = State::Attack;
                    return self.enter_state();
                }
                self.remaining = self.delay_len;
                self.slope = Slope { factor: 1.0, delta: 0.0, end: 0.0 };
            }
            State::Attack => {
                if self.attack_len == 0 {
                    self.level = 1.0;
                    self.state = State::Hold;
                    return self.enter_state();
                }
                self.remaining = self.attack_len;
                self.slope = compute_slope(self.level, 1.0, self.attack_len, self.shape);
            }
            State::Hold => {
                if self.hold_len == 0 {
                    self.state = State::Decay;
                    return self.enter_state();
                }
                self.remaining = self.hold_len;
                self.slope = Slope { factor: 1.0, delta: 0.0, end: 1.0 };
            }
            State::Decay => {
                if self.decay_len == 0 {
                    self.level = self.sustain_level;
                    self.state = State::Sustain;
                    return;
                }
                self.remaining = self.decay_len;
                self.slope = compute_slope(1.0, self.sustain_level, self.decay_len, self.shape);
            }
            State::Sustain => {}
            State::Release => {
                if self.release_len == 0 {
                    self.level = 0.0;
                    self.state = State::Done;
                    return;
                }
                self.remaining = self.release_len;
                self.slope = compute_slope(self.level, 0.0, self.release_len, self.shape);
            }
            State::Done => {}
        }
    }

    fn advance_stage(&mut self) {
        self.state = match self.state {
            State::Delay => State::Attack,
            State::Attack => State::Hold,
            State::Hold => State::Decay,
            State::Decay => State::Sustain,
            State::Release => State::Done,
            State::Sustain | State::Done => return,
        };
        self.enter_state();
    }
}

//! Linear parameter smoothing for zipper-free gain/pan/speed changes.
//!
//! Every per-voice gain (left/right/width) and the resampling speed ratio
//! ramp linearly over a fixed transition time rather than snapping, so a
//! mid-note CC change or envelope-driven gain update doesn't click. The
//! ramp length is `rate * time_ms / 1000` samples; reaching zero remaining
//! samples snaps exactly to the target to avoid float drift.

/// A value that linearly ramps toward a target over a configured time.
#[derive(Debug, Clone)]
pub struct LinearSmooth {
    current: f32,
    target: f32,
    increment: f32,
    samples_remaining: u32,
    sample_rate: f32,
    transition_time_ms: f32,
}

impl LinearSmooth {
    pub fn new(initial: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            increment: 0.0,
            samples_remaining: 0,
            sample_rate: 44100.0,
            transition_time_ms: 10.0,
        }
    }

    pub fn with_config(initial: f32, sample_rate: f32, transition_time_ms: f32) -> Self {
        Self { sample_rate, transition_time_ms, ..Self::new(initial) }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    pub fn set_transition_time_ms(&mut self, time_ms: f32) {
        self.transition_time_ms = time_ms;
    }

    /// Set a new target. If `now` is true, jump there immediately (no ramp);
    /// otherwise start ramping from the current value over the configured
    /// transition time. Mirrors the `param.set(value, now)` calling
    /// convention used throughout the per-voice gain-update paths.
    pub fn set(&mut self, target: f32, now: bool) {
        if now {
            self.set_immediate(target);
            return;
        }
        if (target - self.target).abs() < 1e-9 {
            return;
        }
        self.target = target;
        let samples = (self.transition_time_ms / 1000.0 * self.sample_rate) as u32;
        if samples == 0 {
            self.current = target;
            self.increment = 0.0;
            self.samples_remaining = 0;
        } else {
            self.increment = (target - self.current) / samples as f32;
            self.samples_remaining = samples;
        }
    }

    pub fn set_immediate(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.increment = 0.0;
        self.samples_remaining = 0;
    }

    /// Advance by one sample, returning the new value.
    #[inline]
    pub fn get_next(&mut self) -> f32 {
        if self.samples_remaining > 0 {
            self.current += self.increment;
            self.samples_remaining -= 1;
            if self.samples_remaining == 0 {
                self.current = self.target;
            }
        }
        self.current
    }

    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    /// `true` once no ramp is in flight (every sample would return the same value).
    #[inline]
    pub fn is_constant(&self) -> bool {
        self.samples_remaining == 0
    }
}

impl Default for LinearSmooth {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reaches_target_exactly_after_configured_time() {
        let mut p = LinearSmooth::with_config(0.0, 48000.0, 10.0);
        p.set(1.0, false);
        let samples = (48000.0 * 0.010) as usize;
        for _ in 0..samples {
            p.get_next();
        }
        assert!((p.get() - 1.0).abs() < 1e-5);
        assert!(p.is_constant());
    }

    #[test]
    fn halfway_at_half_the_transition_time() {
        let mut p = LinearSmooth::with_config(0.0, 48000.0, 10.0);
        p.set(1.0, false);
        let samples = (48000.0 * 0.005) as usize;
        for _ in 0..samples {
            p.get_next();
        }
        assert!((p.get() - 0.5).abs() < 0.01);
    }

    #[test]
    fn now_flag_snaps_immediately() {
        let mut p = LinearSmooth::with_config(0.0, 48000.0, 10.0);
        p.set(0.5, true);
        assert_eq!(p.get_next(), 0.5);
        assert!(p.is_constant());
    }

    #[test]
    fn repeated_identical_target_is_a_no_op() {
        let mut p = LinearSmooth::with_config(0.0, 48000.0, 10.0);
        p.set(1.0, false);
        p.get_next();
        let before = p.get();
        p.set(1.0, false);
        assert_eq!(p.get(), before);
    }
}

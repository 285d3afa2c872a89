//! Per-channel controller state (C10).

/// Sustain pedal threshold (CC 64): values `>= 64` count as "held".
pub const SUSTAIN_THRESHOLD: u8 = 64;

/// 128-entry controller snapshot plus 14-bit pitch-bend, initialized from an
/// instrument's `set_cc` defaults at load and restored by `system_reset`.
#[derive(Debug, Clone)]
pub struct ChannelState {
    cc: [u8; 128],
    defaults: [u8; 128],
    /// 0..16383, centered at 0x2000.
    pitch_bend: u16,
    /// Most recent key-switch press, if any (C9 consumes this to update
    /// each region's `switch_match`).
    last_key_switch: Option<u8>,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self { cc: [0; 128], defaults: [0; 128], pitch_bend: 0x2000, last_key_switch: None }
    }
}

impl ChannelState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an instrument's `set_cc` default for a controller. Call for
    /// every defaulted CC before the first `system_reset`/construction use.
    pub fn set_default(&mut self, cc: u8, value: u8) {
        self.defaults[cc as usize] = value.min(127);
    }

    /// Reset every controller to its instrument-declared default and center
    /// pitch-bend. Used by `system_reset` and on initial load.
    pub fn reset_to_defaults(&mut self) {
        self.cc = self.defaults;
        self.pitch_bend = 0x2000;
        self.last_key_switch = None;
    }

    pub fn cc(&self, controller: u8) -> u8 {
        self.cc[controller as usize]
    }

    /// Set a controller value, clamped to `0..=127`. Returns the clamped
    /// value actually stored.
    pub fn set_cc(&mut self, controller: u8, value: u8) -> u8 {
        let clamped = value.min(127);
        self.cc[controller as usize] = clamped;
        clamped
    }

    pub fn sustain_held(&self) -> bool {
        self.cc[64] >= SUSTAIN_THRESHOLD
    }

    pub fn pitch_bend(&self) -> u16 {
        self.pitch_bend
    }

    /// Pitch bend as a signed value in `[-1.0, 1.0)`, 0 at center.
    pub fn pitch_bend_norm(&self) -> f32 {
        (f32::from(self.pitch_bend) - 8192.0) / 8192.0
    }

    /// Set pitch bend, clamped to `0..=16383`. Returns the clamped value.
    pub fn set_pitch_bend(&mut self, value: u16) -> u16 {
        let clamped = value.min(16383);
        self.pitch_bend = clamped;
        clamped
    }

    pub fn note_key_switch(&mut self, key: u8) {
        self.last_key_switch = Some(key);
    }

    pub fn last_key_switch(&self) -> Option<u8> {
        self.last_key_switch
    }
}

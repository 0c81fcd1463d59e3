//! First-order sigma-delta modulator: a 12-bit level on a 1-bit pin.
//!
//! A digital pin can only be high or low, but its *duty cycle* after an
//! analog low-pass filter can sit anywhere in between. The modulator keeps
//! a 32-bit phase accumulator and, for every output bit, adds the target
//! level scaled into the top of the 32-bit range. Each wrap of the
//! accumulator emits a 1. The wrap carries the exact quantization remainder
//! into the next bit, so the long-run fraction of set bits equals
//! `target / 4096` with zero DC error — the error never accumulates, it
//! just circulates.

use crate::device::{FULL_SCALE, StimulusPin};

/// Left shift that places a 12-bit target in the top of the 32-bit range.
///
/// One accumulator step is `target << 20`, so 4096 steps at full scale wrap
/// the accumulator exactly 4095/4096 of the time.
const TARGET_SHIFT: u32 = 20;

/// Sigma-delta bit stream generator.
///
/// The accumulator persists across words and across target changes. It is
/// reset only at construction: resetting mid-sweep would discard the carried
/// remainder and inject a one-time DC error into the ramp.
#[derive(Debug, Clone)]
pub struct SigmaDelta {
    target: u16,
    accumulator: u32,
    /// Word generated but refused by a full pin queue, awaiting delivery.
    pending: Option<u32>,
}

impl SigmaDelta {
    /// New modulator at target level 0 with a cleared accumulator.
    pub fn new() -> Self {
        Self {
            target: 0,
            accumulator: 0,
            pending: None,
        }
    }

    /// Current target level.
    pub fn target(&self) -> u16 {
        self.target
    }

    /// Set the 12-bit target level. Values above full scale are clamped.
    ///
    /// Takes effect from the next generated bit; the accumulator is left
    /// alone so the duty cycle glides to the new level without a DC step.
    pub fn set_target(&mut self, level: u16) {
        self.target = level.min(FULL_SCALE);
    }

    /// Generate the next 32 bits of the stream, LSB first.
    pub fn next_word(&mut self) -> u32 {
        let step = u32::from(self.target) << TARGET_SHIFT;
        let mut word = 0u32;
        for bit in 0..32 {
            let (acc, carry) = self.accumulator.overflowing_add(step);
            self.accumulator = acc;
            if carry {
                word |= 1 << bit;
            }
        }
        word
    }

    /// Push one word of the stream into the pin.
    ///
    /// Non-blocking: returns `false` when the pin queue is full. The refused
    /// word is parked and re-offered on the next call, so a full queue never
    /// costs stream continuity — only this call's delivery.
    pub fn feed<P: StimulusPin>(&mut self, pin: &mut P) -> bool {
        let word = match self.pending.take() {
            Some(word) => word,
            None => self.next_word(),
        };
        if pin.try_feed(word) {
            true
        } else {
            self.pending = Some(word);
            false
        }
    }
}

impl Default for SigmaDelta {
    fn default() -> Self {
        Self::new()
    }
}

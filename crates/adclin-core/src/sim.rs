//! Behavioral model of the stimulus pin, reconstruction filter, and the
//! defective converter.
//!
//! This is the loopback the tests and the CLI calibrate: a bounded output
//! queue feeding a single-pole low-pass filter (the RC network after the
//! pin), followed by a 12-bit quantizer with a monotonic static
//! non-linearity — a gentle bow plus a step discontinuity at each of the
//! four internal sub-range boundaries, which is exactly the defect the
//! calibration engine exists to remove. Optional code noise and
//! deterministic seeding keep runs reproducible.

use std::collections::VecDeque;
use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::device::{AdcChannel, ChannelInfo, FULL_SCALE, StimulusPin};
use crate::lut::SUB_RANGE_BOUNDARIES;

/// Relative step size per boundary. The silicon defect is not identical at
/// every sub-range seam, so the steps are deliberately uneven.
const STEP_WEIGHTS: [f64; 4] = [1.0, 0.6, 1.4, 0.8];

/// Simulator parameters.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Output queue depth in 32-bit words; a full queue refuses feeds.
    pub queue_depth: usize,
    /// Reconstruction filter pole, as an EMA coefficient per word. The
    /// default's time constant is ~66 words and keeps sigma-delta ripple
    /// under one code.
    pub filter_alpha: f64,
    /// Per-read decay of the filter level when the queue has starved. This
    /// is the bias a loop that stops feeding silently buys itself.
    pub starvation_decay: f64,
    /// Amplitude of the smooth integral non-linearity bow, in codes.
    pub inl_amplitude: f64,
    /// Base height of the step at each sub-range boundary, in codes.
    pub boundary_step: f64,
    /// Half-width of uniform code noise, in codes. Zero disables noise.
    pub noise_codes: f64,
    /// RNG seed; identical seeds replay identical conversions.
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            queue_depth: 8,
            filter_alpha: 0.015,
            starvation_decay: 0.02,
            inl_amplitude: 24.0,
            boundary_step: 6.0,
            noise_codes: 0.8,
            seed: 0x0ADC_11B8,
        }
    }
}

impl SimConfig {
    /// A defect-free, noise-free converter. Useful as a control.
    pub fn ideal() -> Self {
        Self {
            inl_amplitude: 0.0,
            boundary_step: 0.0,
            noise_codes: 0.0,
            ..Self::default()
        }
    }
}

static SIM_INFO: ChannelInfo = ChannelInfo {
    name: "sim12",
    description: "behavioral 12-bit converter with sub-range step defects",
    resolution_bits: 12,
};

/// Simulated converter loopback.
///
/// Implements both halves of the hardware seam: [`StimulusPin`] (the
/// modulated output) and [`AdcChannel`] (the converter reading the
/// filtered ramp back).
pub struct SimulatedConverter {
    config: SimConfig,
    /// Words queued but not yet shifted out.
    queue: VecDeque<u32>,
    /// Filter state, 0.0..=1.0 of full scale.
    level: f64,
    /// Whether any word was shifted out since the last conversion.
    pumped_since_read: bool,
    rng: StdRng,
}

impl SimulatedConverter {
    pub fn new(config: SimConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            queue: VecDeque::new(),
            level: 0.0,
            pumped_since_read: false,
            rng,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Shift the oldest queued word out through the reconstruction filter.
    ///
    /// One call models one word period elapsing. Both feeding and
    /// converting pump, so a feed loop is also a wait and a read-only loop
    /// starves the filter — the same coupling the real shifter imposes.
    fn pump_one(&mut self) {
        if let Some(word) = self.queue.pop_front() {
            let duty = f64::from(word.count_ones()) / 32.0;
            self.level += self.config.filter_alpha * (duty - self.level);
            self.pumped_since_read = true;
        }
    }

    /// Monotonic static non-linearity of the converter, in code units.
    ///
    /// A sine bow (zero at both ends) plus an upward step at each sub-range
    /// boundary. The gain is compressed so full scale still maps inside the
    /// code range after the steps are added; the bow slope never exceeds
    /// the compressed gain, so the transfer stays monotonic.
    fn distort(&self, ideal_code: f64) -> f64 {
        let full = f64::from(FULL_SCALE);
        let total_step: f64 =
            self.config.boundary_step * STEP_WEIGHTS.iter().sum::<f64>();
        let gain = (full - total_step) / full;

        let mut out = ideal_code * gain;
        out += self.config.inl_amplitude * (2.0 * PI * ideal_code / full).sin();
        for (weight, boundary) in STEP_WEIGHTS.iter().zip(SUB_RANGE_BOUNDARIES) {
            if ideal_code >= boundary as f64 {
                out += self.config.boundary_step * weight;
            }
        }
        out.clamp(0.0, full)
    }
}

impl StimulusPin for SimulatedConverter {
    fn try_feed(&mut self, word: u32) -> bool {
        self.pump_one();
        if self.queue.len() >= self.config.queue_depth {
            return false;
        }
        self.queue.push_back(word);
        true
    }
}

impl AdcChannel for SimulatedConverter {
    fn read_raw(&mut self) -> u16 {
        // A conversion takes about a word period too. If no word went out
        // since the last conversion, the ramp has been discharging into the
        // filter's load.
        self.pump_one();
        if !self.pumped_since_read {
            self.level *= 1.0 - self.config.starvation_decay;
        }
        self.pumped_since_read = false;

        let mut code = self.distort(self.level * f64::from(FULL_SCALE));
        if self.config.noise_codes > 0.0 {
            code += self
                .rng
                .random_range(-self.config.noise_codes..self.config.noise_codes);
        }
        code.round().clamp(0.0, f64::from(FULL_SCALE)) as u16
    }

    fn info(&self) -> &ChannelInfo {
        &SIM_INFO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modulator::SigmaDelta;
    use crate::sampler::sample_avg;

    /// Feed enough words at a fixed target for the filter to settle.
    fn settle(modulator: &mut SigmaDelta, sim: &mut SimulatedConverter, words: usize) {
        for _ in 0..words {
            modulator.feed(sim);
        }
    }

    #[test]
    fn saturated_queue_refuses_feeds() {
        // Depth 0 stalls the queue permanently: every feed is refused, and
        // refusal is a retry signal, not an error.
        let mut sim = SimulatedConverter::new(SimConfig {
            queue_depth: 0,
            ..SimConfig::ideal()
        });
        assert!(!sim.try_feed(0xFFFF_FFFF));
        assert!(!sim.try_feed(0xFFFF_FFFF));

        let mut sim = SimulatedConverter::new(SimConfig::ideal());
        assert!(sim.try_feed(0));
    }

    #[test]
    fn ideal_loopback_tracks_the_target() {
        let mut sim = SimulatedConverter::new(SimConfig::ideal());
        let mut modulator = SigmaDelta::new();
        for target in [512u16, 2048, 3583] {
            modulator.set_target(target);
            settle(&mut modulator, &mut sim, 600);
            let code = sample_avg(&mut modulator, &mut sim, 64);
            let err = i32::from(code) - i32::from(target);
            assert!(err.abs() <= 3, "target {target} read back as {code}");
        }
    }

    #[test]
    fn starvation_decays_the_level() {
        let mut sim = SimulatedConverter::new(SimConfig::ideal());
        let mut modulator = SigmaDelta::new();
        modulator.set_target(3000);
        settle(&mut modulator, &mut sim, 600);
        let fed = sim.read_raw();

        // Stop feeding: successive conversions watch the ramp sag.
        let mut starved = fed;
        for _ in 0..50 {
            starved = sim.read_raw();
        }
        assert!(starved < fed - 100, "no decay: {fed} -> {starved}");
    }

    #[test]
    fn transfer_is_monotonic_with_default_defects() {
        let sim = SimulatedConverter::new(SimConfig::default());
        let mut prev = -1.0;
        for code in 0..=FULL_SCALE {
            let out = sim.distort(f64::from(code));
            assert!(out >= prev, "non-monotonic transfer at {code}");
            prev = out;
        }
    }

    #[test]
    fn boundary_steps_show_up_in_the_transfer() {
        let sim = SimulatedConverter::new(SimConfig {
            inl_amplitude: 0.0,
            noise_codes: 0.0,
            ..SimConfig::default()
        });
        for (weight, boundary) in STEP_WEIGHTS.iter().zip(SUB_RANGE_BOUNDARIES) {
            let below = sim.distort(boundary as f64 - 1.0);
            let above = sim.distort(boundary as f64);
            let jump = above - below;
            let expected = sim.config().boundary_step * weight;
            assert!(
                (jump - expected).abs() < 1.5,
                "boundary {boundary}: jump {jump:.2}, expected ~{expected:.2}"
            );
        }
    }

    #[test]
    fn identical_seeds_replay_identical_codes() {
        let mut a = SimulatedConverter::new(SimConfig::default());
        let mut b = SimulatedConverter::new(SimConfig::default());
        let mut ma = SigmaDelta::new();
        let mut mb = SigmaDelta::new();
        ma.set_target(1234);
        mb.set_target(1234);
        for _ in 0..200 {
            ma.feed(&mut a);
            mb.feed(&mut b);
            assert_eq!(a.read_raw(), b.read_raw());
        }
    }
}

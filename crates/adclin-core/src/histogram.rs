//! Code-density histogram and the sweep that fills it.
//!
//! The collector walks the target level across the converter's full range in
//! both directions, letting the analog filter settle at each level before
//! sampling. Under a perfectly linear converter every code would collect the
//! same count; the deviations from uniformity are exactly the non-linearity
//! the LUT builder corrects.

use serde::{Deserialize, Serialize};

use crate::device::{AdcChannel, FULL_SCALE, NUM_CODES, StimulusPin};
use crate::modulator::SigmaDelta;
use crate::sampler::sample_raw;

/// Occurrence counters for all 4096 raw codes.
///
/// Mutated only during [`collect`]; read-only between collections. One
/// histogram is live per calibration context.
#[derive(Debug, Clone)]
pub struct Histogram {
    counts: Box<[u32; NUM_CODES]>,
}

impl Histogram {
    /// All-zero histogram.
    pub fn new() -> Self {
        Self {
            counts: Box::new([0; NUM_CODES]),
        }
    }

    /// Histogram over previously collected counters (profile load path).
    pub fn from_counts(counts: Box<[u32; NUM_CODES]>) -> Self {
        Self { counts }
    }

    /// Zero every counter. Called at the start of each collection run.
    pub fn reset(&mut self) {
        self.counts.fill(0);
    }

    /// Tally one observed raw code.
    ///
    /// Codes above full scale are discarded silently: a correctly wired
    /// 12-bit converter never produces one, and an occasional glitch must
    /// not poison the fit.
    pub fn record(&mut self, code: u16) {
        if let Some(slot) = self.counts.get_mut(usize::from(code)) {
            *slot = slot.saturating_add(1);
        }
    }

    /// Count for one code.
    pub fn count(&self, code: u16) -> u32 {
        self.counts
            .get(usize::from(code))
            .copied()
            .unwrap_or_default()
    }

    /// All 4096 counters, index = raw code.
    pub fn counts(&self) -> &[u32] {
        &self.counts[..]
    }

    /// Sum of all counters.
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| u64::from(c)).sum()
    }

    /// `(lowest, highest)` codes with nonzero counts, or `None` if the
    /// histogram is empty. Codes outside this range were never observed and
    /// sit outside the converter's effective range.
    pub fn nonzero_range(&self) -> Option<(u16, u16)> {
        let first = self.counts.iter().position(|&c| c > 0)?;
        let last = self.counts.iter().rposition(|&c| c > 0)?;
        Some((first as u16, last as u16))
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Sweep parameters for one collection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Number of full-range passes. Alternating directions average out the
    /// electrical hysteresis between rising and falling transitions.
    pub sweeps: usize,
    /// Samples tallied per target level per pass.
    pub samples_per_level: u32,
    /// Feed calls after each target change before sampling starts. Feeding
    /// is the only legal way to wait here, and this count must dominate the
    /// reconstruction filter's time constant.
    pub settle_feeds: u32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            sweeps: 4,
            samples_per_level: 128,
            settle_feeds: 64,
        }
    }
}

impl SweepConfig {
    /// Total samples a full run records (assuming none are discarded).
    pub fn expected_total(&self) -> u64 {
        self.sweeps as u64 * NUM_CODES as u64 * u64::from(self.samples_per_level)
    }
}

/// Sweep the target level across the full range and tally observed codes.
///
/// Passes alternate direction: even passes ascend `0..=4095`, odd passes
/// descend. Each level is settled by feeding, then sampled
/// `samples_per_level` times. The histogram is zeroed first and the target
/// level is returned to 0 afterward.
pub fn collect<D>(
    histogram: &mut Histogram,
    modulator: &mut SigmaDelta,
    device: &mut D,
    config: &SweepConfig,
) where
    D: StimulusPin + AdcChannel,
{
    histogram.reset();

    for pass in 0..config.sweeps {
        if pass % 2 == 0 {
            for level in 0..=FULL_SCALE {
                dwell(histogram, modulator, device, config, level);
            }
        } else {
            for level in (0..=FULL_SCALE).rev() {
                dwell(histogram, modulator, device, config, level);
            }
        }
    }

    modulator.set_target(0);
}

/// Settle at one target level, then sample it.
fn dwell<D>(
    histogram: &mut Histogram,
    modulator: &mut SigmaDelta,
    device: &mut D,
    config: &SweepConfig,
    level: u16,
) where
    D: StimulusPin + AdcChannel,
{
    modulator.set_target(level);
    for _ in 0..config.settle_feeds {
        modulator.feed(device);
    }
    for _ in 0..config.samples_per_level {
        let code = sample_raw(modulator, device);
        histogram.record(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ChannelInfo;

    #[test]
    fn record_and_range() {
        let mut h = Histogram::new();
        h.record(100);
        h.record(100);
        h.record(4095);
        assert_eq!(h.count(100), 2);
        assert_eq!(h.count(4095), 1);
        assert_eq!(h.total(), 3);
        assert_eq!(h.nonzero_range(), Some((100, 4095)));
    }

    #[test]
    fn empty_histogram_has_no_range() {
        assert_eq!(Histogram::new().nonzero_range(), None);
    }

    #[test]
    fn out_of_range_codes_are_discarded_silently() {
        let mut h = Histogram::new();
        h.record(4096);
        h.record(u16::MAX);
        assert_eq!(h.total(), 0);
    }

    #[test]
    fn reset_zeroes_everything() {
        let mut h = Histogram::new();
        h.record(7);
        h.reset();
        assert_eq!(h.total(), 0);
        assert_eq!(h.count(7), 0);
    }

    /// Loopback that derives a code from the last fed word's duty. The
    /// exact value is irrelevant to conservation tests.
    struct Transparent {
        level: u16,
        info: ChannelInfo,
    }

    impl Transparent {
        fn new() -> Self {
            Self {
                level: 0,
                info: ChannelInfo {
                    name: "transparent",
                    description: "echoes the stimulus duty as a code",
                    resolution_bits: 12,
                },
            }
        }
    }

    impl StimulusPin for Transparent {
        fn try_feed(&mut self, word: u32) -> bool {
            // Track duty coarsely: a long-run average would converge to
            // target/4096; for conservation tests the value is irrelevant.
            self.level = (word.count_ones() as u16) << 7;
            true
        }
    }

    impl AdcChannel for Transparent {
        fn read_raw(&mut self) -> u16 {
            self.level.min(FULL_SCALE)
        }

        fn info(&self) -> &ChannelInfo {
            &self.info
        }
    }

    #[test]
    fn collection_conserves_sample_count() {
        let mut h = Histogram::new();
        let mut m = SigmaDelta::new();
        let mut device = Transparent::new();
        let config = SweepConfig {
            sweeps: 2,
            samples_per_level: 3,
            settle_feeds: 2,
        };
        collect(&mut h, &mut m, &mut device, &config);
        assert_eq!(h.total(), config.expected_total());
        assert_eq!(h.total(), 2 * 4096 * 3);
    }

    #[test]
    fn collection_resets_target_to_zero() {
        let mut h = Histogram::new();
        let mut m = SigmaDelta::new();
        let mut device = Transparent::new();
        let config = SweepConfig {
            sweeps: 1,
            samples_per_level: 1,
            settle_feeds: 1,
        };
        collect(&mut h, &mut m, &mut device, &config);
        assert_eq!(m.target(), 0);
    }
}

//! Converter sampling with the stimulus kept alive.
//!
//! There is no thread driving the waveform output. If a sample is taken
//! without a preceding feed, the reconstruction filter has been discharging
//! since the last word was shifted out and the reading is biased low. Every
//! sampling entry point here therefore feeds at least once per read.

use crate::device::{AdcChannel, StimulusPin};
use crate::modulator::SigmaDelta;

/// One raw code, preceded by one feed call.
pub fn sample_raw<D>(modulator: &mut SigmaDelta, device: &mut D) -> u16
where
    D: StimulusPin + AdcChannel,
{
    modulator.feed(device);
    device.read_raw()
}

/// Average of `n` raw samples, each preceded by a feed call.
///
/// Rounds with `(sum + n/2) / n` instead of truncating; truncation would
/// bias every averaged reading half a code low.
pub fn sample_avg<D>(modulator: &mut SigmaDelta, device: &mut D, n: u32) -> u16
where
    D: StimulusPin + AdcChannel,
{
    if n == 0 {
        return 0;
    }
    let mut sum: u64 = 0;
    for _ in 0..n {
        sum += u64::from(sample_raw(modulator, device));
    }
    let n = u64::from(n);
    ((sum + n / 2) / n) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ChannelInfo;

    /// Scripted device: returns canned codes, counts feeds and reads.
    struct Scripted {
        codes: Vec<u16>,
        next: usize,
        feeds: usize,
        reads: usize,
        info: ChannelInfo,
    }

    impl Scripted {
        fn new(codes: Vec<u16>) -> Self {
            Self {
                codes,
                next: 0,
                feeds: 0,
                reads: 0,
                info: ChannelInfo {
                    name: "scripted",
                    description: "canned codes for sampler tests",
                    resolution_bits: 12,
                },
            }
        }
    }

    impl StimulusPin for Scripted {
        fn try_feed(&mut self, _word: u32) -> bool {
            self.feeds += 1;
            true
        }
    }

    impl AdcChannel for Scripted {
        fn read_raw(&mut self) -> u16 {
            self.reads += 1;
            let code = self.codes[self.next % self.codes.len()];
            self.next += 1;
            code
        }

        fn info(&self) -> &ChannelInfo {
            &self.info
        }
    }

    #[test]
    fn every_read_is_preceded_by_a_feed() {
        let mut device = Scripted::new(vec![100]);
        let mut modulator = SigmaDelta::new();
        sample_raw(&mut modulator, &mut device);
        sample_avg(&mut modulator, &mut device, 16);
        assert_eq!(device.reads, 17);
        assert!(device.feeds >= device.reads);
    }

    #[test]
    fn average_rounds_instead_of_truncating() {
        // 10, 11, 11 -> sum 32, avg 10.67: truncation would say 10.
        let mut device = Scripted::new(vec![10, 11, 11]);
        let mut modulator = SigmaDelta::new();
        assert_eq!(sample_avg(&mut modulator, &mut device, 3), 11);
    }

    #[test]
    fn average_of_constant_is_that_constant() {
        let mut device = Scripted::new(vec![2048]);
        let mut modulator = SigmaDelta::new();
        assert_eq!(sample_avg(&mut modulator, &mut device, 128), 2048);
    }

    #[test]
    fn zero_sample_average_is_zero() {
        let mut device = Scripted::new(vec![123]);
        let mut modulator = SigmaDelta::new();
        assert_eq!(sample_avg(&mut modulator, &mut device, 0), 0);
        assert_eq!(device.reads, 0);
    }
}

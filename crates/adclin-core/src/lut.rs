//! Correction table: histogram equalization, boundary smoothing, hot-path
//! application.
//!
//! The builder assumes the sweep's *input* distribution is uniform — every
//! target level dwells equally long — so any non-uniformity in the observed
//! code density comes from the converter itself. Wide codes (over-counted)
//! are compressed, narrow codes (under-counted) are stretched, by mapping
//! each code to the position its cumulative observation mass would occupy
//! under uniform density.

use crate::device::{FULL_SCALE, NUM_CODES};
use crate::histogram::Histogram;

/// Raw-code positions where the converter's internal sub-ranges meet.
///
/// The silicon defect shows up as a step discontinuity at each of these
/// codes; spacing (1024) is far larger than the smoothing radius, so the
/// four regions never overlap and can be processed in any order.
pub const SUB_RANGE_BOUNDARIES: [usize; 4] = [512, 1536, 2560, 3584];

/// Codes on each side of a boundary touched by the smoother.
pub const SMOOTH_RADIUS: usize = 16;

/// Why a correction table could not be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildError {
    /// The histogram recorded no samples: no information, no table. The
    /// caller keeps whatever table it already had.
    NoSamples,
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSamples => write!(f, "histogram contains no samples"),
        }
    }
}

impl std::error::Error for BuildError {}

/// Per-code signed correction offsets plus the observed valid code range.
///
/// Invariant: for any raw code `i`, `clamp(i + offset(i), 0, 4095)` is the
/// linearized code. Written once by the builder, refined in place by
/// [`CorrectionTable::smooth_boundaries`], then immutable until the next
/// full calibration.
#[derive(Debug, Clone)]
pub struct CorrectionTable {
    correction: Box<[i16; NUM_CODES]>,
    code_min: u16,
    code_max: u16,
}

impl CorrectionTable {
    /// Identity table: zero correction everywhere, full code range.
    pub fn zeroed() -> Self {
        Self {
            correction: Box::new([0; NUM_CODES]),
            code_min: 0,
            code_max: FULL_SCALE,
        }
    }

    /// Rebuild a table from stored parts (record load path).
    pub fn from_parts(correction: Box<[i16; NUM_CODES]>, code_min: u16, code_max: u16) -> Self {
        Self {
            correction,
            code_min,
            code_max,
        }
    }

    /// Equalize the observed code density against the uniform ideal.
    ///
    /// 1. Trim zero-count codes off both ends: `[code_min, code_max]` is the
    ///    converter's effective range and the only region fitted.
    /// 2. `expected_per_code` is the count each code would hold if density
    ///    were uniform across that range.
    /// 3. Walk the range with a cumulative count, crediting half of each
    ///    code's own count before computing its ideal position and half
    ///    after. Treating the observation mass as centered in its bin keeps
    ///    the whole fit from shifting by half a bin.
    /// 4. Below `code_min` the correction is 0 (never observed, no
    ///    information); above `code_max` it extrapolates flat.
    pub fn from_histogram(histogram: &Histogram) -> Result<Self, BuildError> {
        let (code_min, code_max) = histogram.nonzero_range().ok_or(BuildError::NoSamples)?;

        let span = u32::from(code_max - code_min) + 1;
        let total: u64 = (code_min..=code_max)
            .map(|code| u64::from(histogram.count(code)))
            .sum();
        let expected_per_code = total as f64 / f64::from(span);

        let mut correction = Box::new([0i16; NUM_CODES]);
        let mut cumulative = 0.0f64;
        for code in code_min..=code_max {
            let count = f64::from(histogram.count(code));
            cumulative += count / 2.0;
            let ideal_code = f64::from(code_min) + cumulative / expected_per_code;
            // The half-count credit puts ideal_code half a bin high by
            // construction; flooring it is round-half-up of the centered
            // estimate. Uniform density lands every code exactly on
            // code + 0.5 and must map to zero correction.
            let offset = ideal_code.floor() as i64 - i64::from(code);
            correction[usize::from(code)] =
                offset.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16;
            cumulative += count / 2.0;
        }

        let flat = correction[usize::from(code_max)];
        for slot in correction[usize::from(code_max) + 1..].iter_mut() {
            *slot = flat;
        }

        Ok(Self {
            correction,
            code_min,
            code_max,
        })
    }

    /// Erase the structural steps at the four sub-range boundaries.
    ///
    /// For each boundary, both anchor values (`±SMOOTH_RADIUS`) are read
    /// *before* anything in the region is written, then every code strictly
    /// between them is replaced by the straight line through the anchors.
    /// The anchors themselves are untouched, which also makes the pass
    /// idempotent: a second run interpolates the same anchors to the same
    /// line.
    pub fn smooth_boundaries(&mut self) {
        for boundary in SUB_RANGE_BOUNDARIES {
            let left = boundary - SMOOTH_RADIUS;
            let right = boundary + SMOOTH_RADIUS;
            let anchor_left = f64::from(self.correction[left]);
            let anchor_right = f64::from(self.correction[right]);
            let width = (right - left) as f64;
            for code in left + 1..right {
                let t = (code - left) as f64 / width;
                let value = anchor_left + t * (anchor_right - anchor_left);
                self.correction[code] = value.round() as i16;
            }
        }
    }

    /// Linearize one raw sample: add its offset, clamp to `0..=4095`.
    ///
    /// O(1), allocation-free, hot-path safe. Raw codes above full scale are
    /// clamped before lookup rather than trusted as indices.
    #[inline]
    pub fn correct(&self, raw: u16) -> u16 {
        let raw = raw.min(FULL_SCALE);
        let corrected = i32::from(raw) + i32::from(self.correction[usize::from(raw)]);
        corrected.clamp(0, i32::from(FULL_SCALE)) as u16
    }

    /// Offset for one code.
    pub fn offset(&self, code: u16) -> i16 {
        self.correction[usize::from(code).min(NUM_CODES - 1)]
    }

    /// All 4096 offsets, index = raw code.
    pub fn offsets(&self) -> &[i16] {
        &self.correction[..]
    }

    /// Lowest code observed during collection.
    pub fn code_min(&self) -> u16 {
        self.code_min
    }

    /// Highest code observed during collection.
    pub fn code_max(&self) -> u16 {
        self.code_max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn histogram_from(counts: &[(u16, u32)]) -> Histogram {
        let mut h = Histogram::new();
        for &(code, count) in counts {
            for _ in 0..count {
                h.record(code);
            }
        }
        h
    }

    fn uniform_histogram(count: u32) -> Histogram {
        let mut h = Histogram::new();
        for code in 0..=FULL_SCALE {
            for _ in 0..count {
                h.record(code);
            }
        }
        h
    }

    #[test]
    fn uniform_density_needs_no_correction() {
        // No distortion implies no correction: the fixed point of the
        // equalizer is the identity table.
        let table = CorrectionTable::from_histogram(&uniform_histogram(100)).unwrap();
        assert_eq!(table.code_min(), 0);
        assert_eq!(table.code_max(), FULL_SCALE);
        for code in 0..=FULL_SCALE {
            assert_eq!(table.offset(code), 0, "nonzero correction at {code}");
        }
    }

    #[test]
    fn empty_histogram_is_an_error() {
        assert_eq!(
            CorrectionTable::from_histogram(&Histogram::new()).unwrap_err(),
            BuildError::NoSamples
        );
    }

    #[test]
    fn range_trimming_is_exact() {
        let h = histogram_from(&[(300, 5), (1000, 1), (3900, 2)]);
        let table = CorrectionTable::from_histogram(&h).unwrap();
        assert_eq!(table.code_min(), 300);
        assert_eq!(table.code_max(), 3900);
    }

    #[test]
    fn edges_extrapolate_zero_below_and_flat_above() {
        // All mass concentrated in [2000, 2010].
        let counts: Vec<(u16, u32)> = (2000..=2010).map(|c| (c, 50)).collect();
        let table = CorrectionTable::from_histogram(&histogram_from(&counts)).unwrap();

        assert_eq!(table.code_min(), 2000);
        assert_eq!(table.code_max(), 2010);
        for code in 0..2000 {
            assert_eq!(table.offset(code), 0, "low-end correction at {code}");
        }
        let flat = table.offset(2010);
        for code in 2011..=FULL_SCALE {
            assert_eq!(table.offset(code), flat, "high-end correction at {code}");
        }
    }

    #[test]
    fn wide_code_gets_compressed() {
        // Code 2048 soaks up ~90x its share. The extra mass inflates
        // expected_per_code, so ideal positions fall below the bulge and
        // rise above it, and the correction steps up sharply across it.
        let mut h = uniform_histogram(10);
        for _ in 0..900 {
            h.record(2048);
        }
        let table = CorrectionTable::from_histogram(&h).unwrap();

        assert!(table.offset(2000) < 0);
        assert!(table.offset(2100) > 0);
        // The step across the bulge is on the order of 900 / expected.
        assert!(table.offset(2100) - table.offset(2000) > 50);

        // The corrected mapping stays monotonic: equalization never
        // reorders codes.
        let mut prev = -1i32;
        for code in 0..=FULL_SCALE {
            let mapped = i32::from(code) + i32::from(table.offset(code));
            assert!(mapped >= prev, "reordered at {code}");
            prev = mapped;
        }
    }

    #[test]
    fn smoothing_replaces_interior_with_straight_line() {
        let mut table = CorrectionTable::zeroed();
        // A synthetic step right at the first boundary.
        for code in 0..512 {
            table.correction[code] = -8;
        }
        for code in 512..NUM_CODES {
            table.correction[code] = 8;
        }
        table.smooth_boundaries();

        let left = 512 - SMOOTH_RADIUS;
        let right = 512 + SMOOTH_RADIUS;
        assert_eq!(table.offset(left as u16), -8);
        assert_eq!(table.offset(right as u16), 8);
        // Interior follows the line through the anchors, monotonic.
        let mut prev = table.offset(left as u16);
        for code in left + 1..right {
            let v = table.offset(code as u16);
            assert!(v >= prev, "non-monotonic smoothing at {code}");
            prev = v;
        }
        assert_eq!(table.offset(512 - 1), -1); // t=15/32 of the -8..8 line
        assert_eq!(table.offset(512), 0);
    }

    #[test]
    fn smoothing_is_idempotent() {
        let mut h = uniform_histogram(3);
        // Lumpy density near two boundaries.
        for _ in 0..400 {
            h.record(512);
            h.record(2560);
        }
        let mut once = CorrectionTable::from_histogram(&h).unwrap();
        once.smooth_boundaries();
        let mut twice = once.clone();
        twice.smooth_boundaries();
        assert_eq!(once.offsets(), twice.offsets());
    }

    #[test]
    fn smoothing_leaves_anchors_unmodified() {
        let mut h = uniform_histogram(3);
        for _ in 0..500 {
            h.record(1536);
        }
        let table = CorrectionTable::from_histogram(&h).unwrap();
        let mut smoothed = table.clone();
        smoothed.smooth_boundaries();
        for boundary in SUB_RANGE_BOUNDARIES {
            for anchor in [boundary - SMOOTH_RADIUS, boundary + SMOOTH_RADIUS] {
                assert_eq!(
                    table.offset(anchor as u16),
                    smoothed.offset(anchor as u16),
                    "anchor moved at {anchor}"
                );
            }
        }
    }

    #[test]
    fn correct_applies_offset_and_clamps() {
        let mut table = CorrectionTable::zeroed();
        table.correction[100] = 5;
        table.correction[0] = -3;
        table.correction[4095] = 7;

        assert_eq!(table.correct(100), 105);
        assert_eq!(table.correct(0), 0); // clamped low
        assert_eq!(table.correct(4095), 4095); // clamped high
        // Out-of-range raw input is clamped before lookup, never a panic.
        assert_eq!(table.correct(u16::MAX), 4095);
    }
}

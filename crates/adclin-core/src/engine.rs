//! Calibration sequencing: test → collect → build → save.
//!
//! The engine owns the one active calibration context — modulator,
//! histogram, and correction table — and runs the four phases strictly in
//! order, each completing before the next starts. Nothing here is
//! cancellable mid-flight; a sweep runs to completion before control
//! returns. All user-facing surfacing goes through advisory `log` calls
//! and the run report; no contract depends on either being observed.

use std::fs;
use std::io::{self, BufWriter};
use std::path::Path;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use uuid::Uuid;

use crate::device::{AdcChannel, FULL_SCALE, StimulusPin};
use crate::histogram::{Histogram, SweepConfig, collect};
use crate::lut::{BuildError, CorrectionTable};
use crate::modulator::SigmaDelta;
use crate::record::{CalibrationProfile, CalibrationRecord, export_csv};
use crate::sampler::sample_avg;

/// Settle multiplier for level jumps much larger than a sweep step. The
/// sweep moves one code at a time; the quick test and the verify grid jump
/// hundreds of codes and need proportionally more filter time.
const COLD_SETTLE_MULT: u32 = 12;

/// Engine parameters beyond the sweep itself.
#[derive(Debug, Clone, Serialize)]
pub struct EngineConfig {
    pub sweep: SweepConfig,
    /// Averaged samples taken by the quick test at mid-scale.
    pub quick_test_samples: u32,
    /// Allowed deviation from mid-scale before the quick test fails. This
    /// is a wiring check, not a linearity check, so it is generous.
    pub quick_test_tolerance: u16,
    /// Level stride of the verify sweep.
    pub verify_stride: u16,
    /// Averaged samples per verify level.
    pub verify_samples: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sweep: SweepConfig::default(),
            quick_test_samples: 64,
            quick_test_tolerance: 256,
            verify_stride: 64,
            verify_samples: 32,
        }
    }
}

/// Result of the mid-scale loopback check.
#[derive(Debug, Clone, Serialize)]
pub struct QuickTestReport {
    pub target: u16,
    pub code: u16,
    pub deviation: i32,
    pub pass: bool,
}

/// Worst-case deviations from the ideal line, before and after correction.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub levels_checked: usize,
    /// Largest |raw - ideal| across the verify grid.
    pub max_error_raw: u32,
    /// Largest |corrected - ideal| across the verify grid.
    pub max_error_corrected: u32,
    /// Level where the raw error peaked.
    pub worst_level_raw: u16,
    /// Level where the corrected error peaked.
    pub worst_level_corrected: u16,
}

/// Metadata for one completed calibration run, written as `report.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub id: String,
    pub adclin_version: String,
    pub channel: String,
    pub started_unix_ms: u64,
    pub duration_ms: u64,
    pub test_ms: u64,
    pub collect_ms: u64,
    pub build_ms: u64,
    pub save_ms: u64,
    pub sweep: SweepConfig,
    pub quick_test: QuickTestReport,
    pub code_min: u16,
    pub code_max: u16,
    pub total_samples: u64,
    pub record_path: String,
}

/// The one active calibration context.
///
/// Histogram and table live here for the lifetime of the engine; a new
/// calibration run overwrites both in place. The corrector side only ever
/// sees the finished table, and the builder side only writes during an
/// explicit calibration phase — never both at once.
pub struct CalibrationEngine<D> {
    modulator: SigmaDelta,
    device: D,
    histogram: Histogram,
    table: CorrectionTable,
    calibrated: bool,
    config: EngineConfig,
}

impl<D: StimulusPin + AdcChannel> CalibrationEngine<D> {
    /// Engine with an identity table and no calibration yet.
    pub fn new(device: D, config: EngineConfig) -> Self {
        Self {
            modulator: SigmaDelta::new(),
            device,
            histogram: Histogram::new(),
            table: CorrectionTable::zeroed(),
            calibrated: false,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    /// The current correction table. Identity until a calibration has
    /// completed or a record has been restored; gate on
    /// [`Self::is_calibrated`] where that matters.
    pub fn table(&self) -> &CorrectionTable {
        &self.table
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// Linearize one raw sample with the current table. O(1), hot-path
    /// safe. Before a valid calibration this is the identity mapping.
    #[inline]
    pub fn correct(&self, raw: u16) -> u16 {
        self.table.correct(raw)
    }

    /// Phase 1: drive mid-scale through the loopback and read it back.
    ///
    /// Catches a dead stimulus pin, a floating input, or a missing filter
    /// before committing to a multi-minute sweep. Settles far longer than a
    /// sweep step: the sweep moves one code at a time, but this is a cold
    /// full-scale step into the filter.
    pub fn quick_test(&mut self) -> QuickTestReport {
        let target = (FULL_SCALE + 1) / 2;
        self.modulator.set_target(target);
        for _ in 0..self.config.sweep.settle_feeds * COLD_SETTLE_MULT {
            self.modulator.feed(&mut self.device);
        }
        let code = sample_avg(
            &mut self.modulator,
            &mut self.device,
            self.config.quick_test_samples,
        );
        self.modulator.set_target(0);

        let deviation = i32::from(code) - i32::from(target);
        let pass = deviation.unsigned_abs() <= u32::from(self.config.quick_test_tolerance);
        if pass {
            log::info!("quick test: mid-scale read {code} (deviation {deviation})");
        } else {
            log::warn!("quick test FAILED: mid-scale read {code} (deviation {deviation})");
        }
        QuickTestReport {
            target,
            code,
            deviation,
            pass,
        }
    }

    /// Phase 2: sweep the range and fill the histogram.
    pub fn collect(&mut self) {
        log::info!(
            "collecting code density: {} sweeps x {} samples/level",
            self.config.sweep.sweeps,
            self.config.sweep.samples_per_level
        );
        collect(
            &mut self.histogram,
            &mut self.modulator,
            &mut self.device,
            &self.config.sweep,
        );
        let discarded = self
            .config
            .sweep
            .expected_total()
            .saturating_sub(self.histogram.total());
        if discarded > 0 {
            log::warn!("{discarded} samples were out of range and discarded");
        }
    }

    /// Phase 3: equalize the histogram and smooth the sub-range seams.
    ///
    /// On failure the previous table (or the identity default) is left
    /// untouched.
    pub fn build(&mut self) -> Result<(), BuildError> {
        let mut table = CorrectionTable::from_histogram(&self.histogram)?;
        table.smooth_boundaries();
        log::info!(
            "built correction table, valid codes {}..={}",
            table.code_min(),
            table.code_max()
        );
        self.table = table;
        self.calibrated = true;
        Ok(())
    }

    /// Phase 4: persist the finished table together with the histogram it
    /// was fitted from.
    pub fn save_profile(&self, path: &Path) -> io::Result<()> {
        if !self.calibrated {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "no valid calibration to save",
            ));
        }
        CalibrationProfile::new(
            self.histogram.clone(),
            CalibrationRecord::from_table(&self.table),
        )
        .save(path)
    }

    /// Full calibration run: test → collect → build → save, strictly
    /// sequential. Writes `calibration.bin`, `profile.csv`, and
    /// `report.json` into `output_dir`.
    ///
    /// A failed quick test is logged and reported but does not abort: the
    /// sweep itself is the authoritative measurement. A build failure (an
    /// empty histogram) aborts with the prior table intact.
    pub fn run<P: AsRef<Path>>(&mut self, output_dir: P) -> io::Result<RunReport> {
        let output_dir = output_dir.as_ref();
        fs::create_dir_all(output_dir)?;

        let started_unix_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        let run_started = Instant::now();

        let phase = Instant::now();
        let quick_test = self.quick_test();
        let test_ms = phase.elapsed().as_millis() as u64;

        let phase = Instant::now();
        self.collect();
        let collect_ms = phase.elapsed().as_millis() as u64;

        let phase = Instant::now();
        self.build()
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        let build_ms = phase.elapsed().as_millis() as u64;

        let phase = Instant::now();
        let record_path = output_dir.join("calibration.bin");
        self.save_profile(&record_path)?;
        self.export_profile(&output_dir.join("profile.csv"))?;
        let save_ms = phase.elapsed().as_millis() as u64;

        let report = RunReport {
            id: Uuid::new_v4().to_string(),
            adclin_version: crate::VERSION.to_string(),
            channel: self.device.info().name.to_string(),
            started_unix_ms,
            duration_ms: run_started.elapsed().as_millis() as u64,
            test_ms,
            collect_ms,
            build_ms,
            save_ms,
            sweep: self.config.sweep.clone(),
            quick_test,
            code_min: self.table.code_min(),
            code_max: self.table.code_max(),
            total_samples: self.histogram.total(),
            record_path: record_path.display().to_string(),
        };
        let json = serde_json::to_string_pretty(&report).map_err(io::Error::other)?;
        fs::write(output_dir.join("report.json"), json)?;

        log::info!(
            "calibration complete in {} ms, record at {}",
            report.duration_ms,
            report.record_path
        );
        Ok(report)
    }

    /// Write the `code,count,correction` export for the current state.
    pub fn export_profile(&self, path: &Path) -> io::Result<()> {
        let file = fs::File::create(path)?;
        let mut writer = BufWriter::new(file);
        export_csv(&mut writer, &self.histogram, &self.table)
    }

    /// Sweep a grid of check levels and compare raw and corrected readings
    /// against the straight line through the table's valid code range.
    pub fn verify(&mut self) -> VerifyReport {
        let span = f64::from(self.table.code_max() - self.table.code_min());
        let mut report = VerifyReport {
            levels_checked: 0,
            max_error_raw: 0,
            max_error_corrected: 0,
            worst_level_raw: 0,
            worst_level_corrected: 0,
        };

        let stride = usize::from(self.config.verify_stride.max(1));
        for level in (0..=usize::from(FULL_SCALE)).step_by(stride) {
            let level = level as u16;
            self.modulator.set_target(level);
            for _ in 0..self.config.sweep.settle_feeds * COLD_SETTLE_MULT {
                self.modulator.feed(&mut self.device);
            }
            let raw = sample_avg(
                &mut self.modulator,
                &mut self.device,
                self.config.verify_samples,
            );
            let corrected = self.table.correct(raw);

            let ideal = f64::from(self.table.code_min())
                + f64::from(level) * span / f64::from(FULL_SCALE);
            let err_raw = (f64::from(raw) - ideal).abs().round() as u32;
            let err_corrected = (f64::from(corrected) - ideal).abs().round() as u32;

            if err_raw > report.max_error_raw {
                report.max_error_raw = err_raw;
                report.worst_level_raw = level;
            }
            if err_corrected > report.max_error_corrected {
                report.max_error_corrected = err_corrected;
                report.worst_level_corrected = level;
            }
            report.levels_checked += 1;
        }
        self.modulator.set_target(0);

        log::info!(
            "verify: {} levels, worst raw {} codes, worst corrected {} codes",
            report.levels_checked,
            report.max_error_raw,
            report.max_error_corrected
        );
        report
    }

    /// Adopt a previously saved profile. Returns `false` (leaving the
    /// current table and histogram untouched) if the record's magic is
    /// invalid. On success both halves are adopted together, so a
    /// subsequent [`Self::export_profile`] reproduces the saved run's CSV.
    pub fn restore(&mut self, profile: &CalibrationProfile) -> bool {
        if !profile.record.is_valid() {
            log::warn!("refusing to restore an invalid calibration profile");
            return false;
        }
        self.table = profile.record.to_table();
        self.histogram = profile.histogram.clone();
        self.calibrated = true;
        true
    }
}

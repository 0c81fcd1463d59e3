//! # adclin-core
//!
//! **Linearize a non-uniform ADC with nothing but one digital pin.**
//!
//! `adclin-core` is the calibration engine behind `adclin`. It drives a
//! sigma-delta bit stream out of a single digital output, low-pass filtered
//! into a reference analog ramp, observes how the converter's raw output
//! codes distribute across that ramp, and derives a per-code correction
//! offset table that remaps each raw reading to a linearized value.
//!
//! ## Quick Start
//!
//! ```no_run
//! use adclin_core::{CalibrationEngine, EngineConfig, SimulatedConverter, SimConfig};
//!
//! let device = SimulatedConverter::new(SimConfig::default());
//! let mut engine = CalibrationEngine::new(device, EngineConfig::default());
//!
//! // Four phases, strictly sequential: test -> collect -> build -> save
//! let report = engine.run("calibration").unwrap();
//! println!("valid code range {}..={}", report.code_min, report.code_max);
//!
//! // Hot path: O(1) correction of a raw sample
//! let linearized = engine.correct(2048);
//! assert!(linearized <= 4095);
//! ```
//!
//! ## Architecture
//!
//! Modulator → Sampler → Histogram → LUT Builder → Smoother → (Record | Corrector)
//!
//! The statistical core is histogram equalization: the sweep visits every
//! target level the same number of times, so under a perfectly linear
//! converter every raw code would be observed equally often. Codes that
//! soak up more than their share of observations are too wide, codes that
//! starve are too narrow, and the cumulative density walk recovers the
//! mapping that restores uniformity.
//!
//! Everything is single-threaded and cooperative: there is no thread
//! driving the waveform output, so settle delays and sample loops all
//! interleave [`SigmaDelta::feed`] calls. A loop that stops feeding lets
//! the analog filter discharge and silently biases every sample after it.

pub mod device;
pub mod engine;
pub mod histogram;
pub mod lut;
pub mod modulator;
pub mod record;
pub mod sampler;
pub mod sim;

pub use device::{AdcChannel, ChannelInfo, FULL_SCALE, NUM_CODES, StimulusPin};
pub use engine::{CalibrationEngine, EngineConfig, QuickTestReport, RunReport, VerifyReport};
pub use histogram::{Histogram, SweepConfig, collect};
pub use lut::{BuildError, CorrectionTable, SMOOTH_RADIUS, SUB_RANGE_BOUNDARIES};
pub use modulator::SigmaDelta;
pub use record::{
    CalibrationProfile, CalibrationRecord, HISTOGRAM_SIZE, MAGIC, PROFILE_SIZE, RECORD_SIZE,
    export_csv,
};
pub use sampler::{sample_avg, sample_raw};
pub use sim::{SimConfig, SimulatedConverter};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

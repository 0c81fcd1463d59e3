pub mod calibrate;
pub mod dump;
pub mod quicktest;
pub mod verify;

use adclin_core::{CalibrationEngine, EngineConfig, SimConfig, SimulatedConverter};
use clap::Args;

/// Defect knobs for the behavioral converter every subcommand runs against.
#[derive(Args)]
pub struct SimArgs {
    /// Peak transfer-curve bow, in codes
    #[arg(long, default_value_t = 24.0)]
    pub inl: f64,

    /// Offset step at each sub-range boundary, in codes
    #[arg(long, default_value_t = 6.0)]
    pub step: f64,

    /// Read noise amplitude, in codes (0 disables noise)
    #[arg(long, default_value_t = 0.8)]
    pub noise: f64,

    /// Noise generator seed
    #[arg(long, default_value_t = 0x0ADC_11B8)]
    pub seed: u64,

    /// Disable every injected defect
    #[arg(long)]
    pub ideal: bool,
}

impl SimArgs {
    pub fn converter(&self) -> SimulatedConverter {
        let config = if self.ideal {
            SimConfig::ideal()
        } else {
            SimConfig {
                inl_amplitude: self.inl,
                boundary_step: self.step,
                noise_codes: self.noise,
                seed: self.seed,
                ..SimConfig::default()
            }
        };
        SimulatedConverter::new(config)
    }
}

/// Sweep overrides shared by the sweeping subcommands.
#[derive(Args)]
pub struct SweepArgs {
    /// Number of full-range ramp passes
    #[arg(long)]
    pub sweeps: Option<usize>,

    /// Samples recorded at each ramp level
    #[arg(long)]
    pub samples: Option<u32>,

    /// Modulator words fed before sampling each level
    #[arg(long)]
    pub settle: Option<u32>,
}

impl SweepArgs {
    pub fn apply(&self, config: &mut EngineConfig) {
        if let Some(sweeps) = self.sweeps {
            config.sweep.sweeps = sweeps;
        }
        if let Some(samples) = self.samples {
            config.sweep.samples_per_level = samples;
        }
        if let Some(settle) = self.settle {
            config.sweep.settle_feeds = settle;
        }
    }
}

pub fn make_engine(sim: &SimArgs, sweep: &SweepArgs) -> CalibrationEngine<SimulatedConverter> {
    let mut config = EngineConfig::default();
    sweep.apply(&mut config);
    CalibrationEngine::new(sim.converter(), config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_sim() -> SimArgs {
        SimArgs {
            inl: 24.0,
            step: 6.0,
            noise: 0.8,
            seed: 1,
            ideal: false,
        }
    }

    #[test]
    fn test_ideal_flag_wins_over_defect_knobs() {
        let mut args = default_sim();
        args.inl = 100.0;
        args.ideal = true;
        let converter = args.converter();
        assert_eq!(converter.config().inl_amplitude, 0.0);
        assert_eq!(converter.config().noise_codes, 0.0);
    }

    #[test]
    fn test_sweep_overrides_apply_only_when_given() {
        let args = SweepArgs {
            sweeps: Some(2),
            samples: None,
            settle: Some(16),
        };
        let mut config = EngineConfig::default();
        let default_samples = config.sweep.samples_per_level;
        args.apply(&mut config);
        assert_eq!(config.sweep.sweeps, 2);
        assert_eq!(config.sweep.samples_per_level, default_samples);
        assert_eq!(config.sweep.settle_feeds, 16);
    }
}

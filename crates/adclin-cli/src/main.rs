//! CLI for adclin — ADC linearity calibration over a sigma-delta stimulus.

mod commands;

use clap::{Parser, Subcommand};

use commands::{SimArgs, SweepArgs};

#[derive(Parser)]
#[command(name = "adclin")]
#[command(about = "adclin — histogram-based ADC linearity calibration")]
#[command(version = adclin_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: quick test, code-density sweep, table build,
    /// record + profile + report written to the output directory
    Calibrate {
        /// Directory for calibration.bin, profile.csv, report.json
        #[arg(long, default_value = "calibration")]
        output: String,

        #[command(flatten)]
        sim: SimArgs,

        #[command(flatten)]
        sweep: SweepArgs,
    },

    /// Drive mid-scale and check the converter tracks the stimulus
    QuickTest {
        /// Print the result as JSON instead of text
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        sim: SimArgs,

        #[command(flatten)]
        sweep: SweepArgs,
    },

    /// Measure raw vs corrected linearity against a saved record
    Verify {
        /// Path to a calibration record
        #[arg(long, default_value = "calibration/calibration.bin")]
        record: String,

        /// Print the result as JSON instead of text
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        sim: SimArgs,

        #[command(flatten)]
        sweep: SweepArgs,
    },

    /// Inspect a calibration record file
    Dump {
        /// Path to a calibration record
        #[arg(default_value = "calibration/calibration.bin")]
        record: String,

        /// Print every code,correction row as CSV
        #[arg(long)]
        csv: bool,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Calibrate { output, sim, sweep } => {
            commands::calibrate::run(&output, &sim, &sweep)
        }
        Commands::QuickTest { json, sim, sweep } => commands::quicktest::run(json, &sim, &sweep),
        Commands::Verify {
            record,
            json,
            sim,
            sweep,
        } => commands::verify::run(&record, json, &sim, &sweep),
        Commands::Dump { record, csv } => commands::dump::run(&record, csv),
    }
}

use std::path::Path;

use adclin_core::{AdcChannel, CalibrationProfile};

use super::{SimArgs, SweepArgs, make_engine};

pub fn run(record_path: &str, json: bool, sim: &SimArgs, sweep: &SweepArgs) {
    let profile = match CalibrationProfile::load(Path::new(record_path)) {
        Some(profile) => profile,
        None => {
            eprintln!("No valid calibration profile at {record_path}.");
            eprintln!("Run `adclin calibrate` first, or pass --record.");
            std::process::exit(1);
        }
    };

    let mut engine = make_engine(sim, sweep);
    if !engine.restore(&profile) {
        eprintln!("Profile at {record_path} failed validation.");
        std::process::exit(1);
    }

    let report = engine.verify();

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                eprintln!("Failed to serialize report: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    println!(
        "Verified {} against {} ({} levels):",
        engine.device().info().name,
        record_path,
        report.levels_checked
    );
    println!(
        "  raw        worst {:>3} codes at level {}",
        report.max_error_raw, report.worst_level_raw
    );
    println!(
        "  corrected  worst {:>3} codes at level {}",
        report.max_error_corrected, report.worst_level_corrected
    );
    if report.max_error_corrected < report.max_error_raw {
        println!("  correction is helping");
    } else {
        println!("  correction is NOT helping — recalibrate");
    }
}

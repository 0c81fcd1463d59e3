use std::path::Path;

use adclin_core::AdcChannel;

use super::{SimArgs, SweepArgs, make_engine};

pub fn run(output: &str, sim: &SimArgs, sweep: &SweepArgs) {
    let mut engine = make_engine(sim, sweep);

    println!(
        "Calibrating {} ({} sweeps, {} samples/level, {} settle words)",
        engine.device().info().name,
        engine.config().sweep.sweeps,
        engine.config().sweep.samples_per_level,
        engine.config().sweep.settle_feeds,
    );

    let report = match engine.run(Path::new(output)) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Calibration failed: {e}");
            std::process::exit(1);
        }
    };

    let qt = &report.quick_test;
    let qt_mark = if qt.pass { "ok" } else { "FAILED" };
    println!();
    println!(
        "  quick test    {} (target {}, read {}, deviation {:+})",
        qt_mark, qt.target, qt.code, qt.deviation
    );
    println!(
        "  code range    {}..={}",
        report.code_min, report.code_max
    );
    println!("  samples       {}", report.total_samples);
    println!(
        "  phases        test {} ms, collect {} ms, build {} ms, save {} ms",
        report.test_ms, report.collect_ms, report.build_ms, report.save_ms
    );
    println!("  record        {}", report.record_path);
    println!("  report        {}", Path::new(output).join("report.json").display());

    let verify = engine.verify();
    println!();
    println!(
        "  linearity     raw {:>3} codes worst (level {}), corrected {:>3} codes worst (level {})",
        verify.max_error_raw,
        verify.worst_level_raw,
        verify.max_error_corrected,
        verify.worst_level_corrected
    );
}

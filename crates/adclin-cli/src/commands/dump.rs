use std::io::Write;
use std::path::Path;

use adclin_core::{CalibrationProfile, export_csv};

pub fn run(record_path: &str, csv: bool) {
    let profile = match CalibrationProfile::load(Path::new(record_path)) {
        Some(profile) => profile,
        None => {
            eprintln!("No valid calibration profile at {record_path}.");
            std::process::exit(1);
        }
    };

    if csv {
        let table = profile.record.to_table();
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        if let Err(e) = export_csv(&mut out, &profile.histogram, &table) {
            eprintln!("Failed writing CSV: {e}");
            std::process::exit(1);
        }
        if let Err(e) = out.flush() {
            eprintln!("Failed writing CSV: {e}");
            std::process::exit(1);
        }
        return;
    }

    let record = &profile.record;
    let min_offset = record.correction.iter().copied().min().unwrap_or(0);
    let max_offset = record.correction.iter().copied().max().unwrap_or(0);
    let nonzero = record.correction.iter().filter(|&&c| c != 0).count();

    println!("Calibration profile at {record_path}:");
    println!("  magic        {:#010x}", record.magic);
    println!("  code range   {}..={}", record.adc_min, record.adc_max);
    println!("  samples      {}", profile.histogram.total());
    println!("  corrections  {nonzero} nonzero of {}", record.correction.len());
    println!("  offset span  {min_offset:+}..{max_offset:+}");
}

use adclin_core::AdcChannel;

use super::{SimArgs, SweepArgs, make_engine};

pub fn run(json: bool, sim: &SimArgs, sweep: &SweepArgs) {
    let mut engine = make_engine(sim, sweep);
    let report = engine.quick_test();

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                eprintln!("Failed to serialize report: {e}");
                std::process::exit(1);
            }
        }
    } else {
        println!("Quick test on {}:", engine.device().info().name);
        println!("  target     {}", report.target);
        println!("  read back  {}", report.code);
        println!("  deviation  {:+}", report.deviation);
        println!("  result     {}", if report.pass { "pass" } else { "FAIL" });
    }

    if !report.pass {
        std::process::exit(1);
    }
}

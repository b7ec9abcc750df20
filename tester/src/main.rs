mod benchmarks;
mod common;
mod consistency;
mod scenarios;

use common::{print_result_table, print_summary, CheckResult};
use std::env;

fn print_header() {
    println!("═══════════════════════════════════════════════════════════════");
    println!("                    STRATA State-Vector Core");
    println!("═══════════════════════════════════════════════════════════════\n");
}

fn print_usage() {
    println!("Usage: tester [OPTIONS]");
    println!();
    println!("Options:");
    println!("  all          Run everything (default)");
    println!("  scenarios    Run scenario walkthroughs only");
    println!("  consistency  Run regime/strategy consistency checks only");
    println!("  bench        Run timing comparisons only");
    println!("  help         Show this help message");
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    if args
        .iter()
        .any(|a| a == "help" || a == "--help" || a == "-h")
    {
        print_usage();
        return;
    }

    print_header();

    let mut results: Vec<CheckResult> = Vec::new();

    let run_all = args.is_empty() || args.iter().any(|a| a == "all");
    let run_scenarios = run_all || args.iter().any(|a| a == "scenarios");
    let run_consistency = run_all || args.iter().any(|a| a == "consistency");
    let run_bench = run_all || args.iter().any(|a| a == "bench");

    if run_scenarios {
        scenarios::run_all(&mut results);
    }

    if run_consistency {
        consistency::run_all(&mut results);
    }

    if run_bench {
        benchmarks::run_all(&mut results);
    }

    if !results.is_empty() {
        print_result_table(&results);
        print_summary(&results);
    }
}

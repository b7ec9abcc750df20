use libstrata_core::{format_amplitude, Amplitude, SingleProcess, Simulator};
use std::time::Duration;

pub struct CheckResult {
    pub name: String,
    pub elapsed: Duration,
    pub passed: bool,
}

pub fn states_equal(a: &[Amplitude], b: &[Amplitude]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).all(|(x, y)| (x - y).norm() < 1e-10)
}

pub fn format_duration(d: Duration) -> String {
    if d.as_secs() > 0 {
        format!("{:.3}s", d.as_secs_f64())
    } else if d.as_millis() > 0 {
        format!("{:.3}ms", d.as_secs_f64() * 1000.0)
    } else {
        format!("{:.3}us", d.as_secs_f64() * 1_000_000.0)
    }
}

pub fn print_section(title: &str) {
    let width = 61;
    let padding = width - title.len() - 2;
    println!("┌{}┐", "─".repeat(width));
    println!("│ {}{} │", title, " ".repeat(padding));
    println!("└{}┘\n", "─".repeat(width));
}

pub fn print_state(sim: &Simulator<SingleProcess>) {
    let n = sim.total_num_qubits() as usize;
    let state = sim.state_vector().expect("single-process state");
    for (i, amplitude) in state.iter().enumerate() {
        if amplitude.norm_sqr() > 1e-10 {
            println!(
                "  |{:0width$b}⟩: {}",
                i,
                format_amplitude(amplitude),
                width = n
            );
        }
    }
    println!();
}

pub fn print_result_table(results: &[CheckResult]) {
    const C1: usize = 42;
    const C2: usize = 12;

    println!("╔{}═{}╗", "═".repeat(C1 + 2), "═".repeat(C2 + 7));
    println!(
        "║ {:<width1$} │ {:<width2$} │ ok ║",
        "check",
        "time",
        width1 = C1,
        width2 = C2
    );
    println!("╟{}─{}╢", "─".repeat(C1 + 2), "─".repeat(C2 + 7));
    for result in results {
        println!(
            "║ {:<width1$} │ {:<width2$} │ {}  ║",
            result.name,
            format_duration(result.elapsed),
            if result.passed { "✓" } else { "✗" },
            width1 = C1,
            width2 = C2
        );
    }
    println!("╚{}═{}╝\n", "═".repeat(C1 + 2), "═".repeat(C2 + 7));
}

pub fn print_summary(results: &[CheckResult]) {
    let passed = results.iter().filter(|r| r.passed).count();
    println!("{}/{} checks passed", passed, results.len());
    if passed != results.len() {
        std::process::exit(1);
    }
}

use crate::common::{print_section, states_equal, CheckResult};
use libstrata_core::{
    regime, Control, IndexForm, Qubit, Regime, SimulatorBuilder, SingleProcess, Simulator,
    Strategy, Tuning,
};
use std::time::Instant;

pub fn run_all(results: &mut Vec<CheckResult>) {
    println!("═══════════════════════════════════════════════════════════════");
    println!("                    CONSISTENCY CHECKS");
    println!("═══════════════════════════════════════════════════════════════\n");

    regime_classification(results);
    strategies_and_forms(results);
    threaded_dispatch(results);
}

fn circuit(sim: &mut Simulator<SingleProcess>) {
    sim.hadamard(Qubit(1), &[]).unwrap();
    sim.hadamard(Qubit(9), &[]).unwrap();
    sim.pauli_x(Qubit(9), &[Control(Qubit(0))]).unwrap();
    sim.u3(0.5, -1.1, 0.3, Qubit(5), &[]).unwrap();
    sim.exp_pauli_y(0.7, &[Qubit(2), Qubit(8)], &[]).unwrap();
    sim.swap(Qubit(0), Qubit(7), &[]).unwrap();
}

fn build(on_cache: u32, strategy: Strategy, form: IndexForm, threads: Option<usize>) -> Vec<libstrata_core::Amplitude> {
    let mut builder = SimulatorBuilder::new(10)
        .seed(4)
        .num_on_cache_qubits(on_cache)
        .strategy(strategy)
        .index_form(form);
    if let Some(t) = threads {
        builder = builder.num_threads(t);
    }
    let mut sim = builder.build_local().unwrap();
    circuit(&mut sim);
    sim.state_vector().unwrap()
}

fn regime_classification(results: &mut Vec<CheckResult>) {
    print_section("Regime classification at C = 4, L = 10");
    let start = Instant::now();
    let tuning = Tuning {
        num_on_cache_qubits: 4,
        ..Tuning::default()
    };
    let cases = [
        (vec![Qubit(1)], Regime::AllOnCache, "q1"),
        (vec![Qubit(9)], Regime::NoneOnCache, "q9"),
        (vec![Qubit(0), Qubit(9)], Regime::SomeOnCache, "q0,q9"),
    ];
    let mut passed = true;
    for (operands, expected, label) in &cases {
        let got = regime(&tuning, 10, operands);
        println!("  {:<8} → {:?}", label, got);
        passed &= got == *expected;
    }
    println!();
    record(results, "regime classification", start, passed);
}

fn strategies_and_forms(results: &mut Vec<CheckResult>) {
    print_section("All strategies and index forms agree");
    let start = Instant::now();
    let reference = build(16, Strategy::Aliased, IndexForm::SortedSentinel, None);
    let mut passed = true;
    for on_cache in [4u32, 6] {
        for strategy in [Strategy::Aliased, Strategy::Scratch] {
            for form in [IndexForm::SortedSentinel, IndexForm::BitMasks] {
                let state = build(on_cache, strategy, form, None);
                let ok = states_equal(&reference, &state);
                println!(
                    "  C={:<2} {:?}/{:?}: {}",
                    on_cache,
                    strategy,
                    form,
                    if ok { "✓" } else { "✗" }
                );
                passed &= ok;
            }
        }
    }
    println!();
    record(results, "strategy/form agreement", start, passed);
}

fn threaded_dispatch(results: &mut Vec<CheckResult>) {
    print_section("Parallel policy matches sequential");
    let start = Instant::now();
    let reference = build(4, Strategy::Scratch, IndexForm::SortedSentinel, None);
    let threaded = build(4, Strategy::Scratch, IndexForm::SortedSentinel, Some(4));
    let passed = states_equal(&reference, &threaded);
    record(results, "threaded dispatch", start, passed);
}

fn record(results: &mut Vec<CheckResult>, name: &str, start: Instant, passed: bool) {
    println!("{}: {}\n", name, if passed { "✓" } else { "✗" });
    results.push(CheckResult {
        name: name.to_string(),
        elapsed: start.elapsed(),
        passed,
    });
}

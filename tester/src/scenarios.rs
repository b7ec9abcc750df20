use crate::common::{print_section, print_state, states_equal, CheckResult};
use libstrata_core::{exp_i, ChannelGroup, Control, Qubit, SimulatorBuilder};
use std::time::Instant;

pub fn run_all(results: &mut Vec<CheckResult>) {
    println!("═══════════════════════════════════════════════════════════════");
    println!("                    SCENARIO WALKTHROUGHS");
    println!("═══════════════════════════════════════════════════════════════\n");

    bell_pair(results);
    phase_kickback(results);
    fused_pair(results);
    distributed_swap(results);
    ghz_with_measurement(results);
}

fn record(results: &mut Vec<CheckResult>, name: &str, start: Instant, passed: bool) {
    println!("{}: {}\n", name, if passed { "✓" } else { "✗" });
    results.push(CheckResult {
        name: name.to_string(),
        elapsed: start.elapsed(),
        passed,
    });
}

fn bell_pair(results: &mut Vec<CheckResult>) {
    print_section("Bell pair: H(q0), CNOT(q1; q0)");
    let start = Instant::now();
    let mut sim = SimulatorBuilder::new(2).build_local().unwrap();
    sim.hadamard(Qubit(0), &[]).unwrap();
    sim.pauli_x(Qubit(1), &[Control(Qubit(0))]).unwrap();
    print_state(&sim);

    let state = sim.state_vector().unwrap();
    let h = std::f64::consts::FRAC_1_SQRT_2;
    let passed = (state[0].re - h).abs() < 1e-12
        && (state[3].re - h).abs() < 1e-12
        && state[1].norm() < 1e-12
        && state[2].norm() < 1e-12;
    record(results, "bell pair", start, passed);
}

fn phase_kickback(results: &mut Vec<CheckResult>) {
    print_section("Phase kickback on |11⟩");
    let start = Instant::now();
    let mut sim = SimulatorBuilder::new(2)
        .initial_integer(0b11)
        .build_local()
        .unwrap();
    let coefficient = exp_i(std::f64::consts::PI / 3.0);
    sim.phase_shift_coeff(coefficient, &[Control(Qubit(0))])
        .unwrap();
    print_state(&sim);

    let state = sim.state_vector().unwrap();
    let passed = (state[3] - coefficient).norm() < 1e-12;
    record(results, "phase kickback", start, passed);
}

fn fused_pair(results: &mut Vec<CheckResult>) {
    print_section("Fusion: H then X on q0 in one pass");
    let start = Instant::now();

    let mut fused = SimulatorBuilder::new(3).build_local().unwrap();
    fused.begin_fusion().unwrap();
    fused.hadamard(Qubit(0), &[]).unwrap();
    fused.pauli_x(Qubit(0), &[]).unwrap();
    fused.end_fusion().unwrap();
    print_state(&fused);

    let mut sequential = SimulatorBuilder::new(3).build_local().unwrap();
    sequential.hadamard(Qubit(0), &[]).unwrap();
    sequential.pauli_x(Qubit(0), &[]).unwrap();

    let passed = states_equal(
        &fused.state_vector().unwrap(),
        &sequential.state_vector().unwrap(),
    );
    record(results, "fusion pair", start, passed);
}

fn distributed_swap(results: &mut Vec<CheckResult>) {
    print_section("Distributed SWAP: two ranks, remote qubit 3");
    let start = Instant::now();

    let groups = ChannelGroup::connected(2);
    let handles: Vec<_> = groups
        .into_iter()
        .map(|transport| {
            std::thread::spawn(move || {
                let mut sim = SimulatorBuilder::new(4)
                    .num_local_qubits(3)
                    .initial_integer(0b1000)
                    .seed(1)
                    .build(transport)
                    .unwrap();
                sim.swap(Qubit(3), Qubit(0), &[]).unwrap();
                (sim.rank(), sim.measure().unwrap())
            })
        })
        .collect();

    let mut passed = true;
    for handle in handles {
        let (rank, outcome) = handle.join().unwrap();
        println!("  rank {}: measured |{:04b}⟩", rank, outcome);
        passed &= outcome == 0b0001;
    }
    println!();
    record(results, "distributed swap", start, passed);
}

fn ghz_with_measurement(results: &mut Vec<CheckResult>) {
    print_section("GHZ(4) event generation");
    let start = Instant::now();
    let mut sim = SimulatorBuilder::new(4).seed(11).build_local().unwrap();
    sim.hadamard(Qubit(0), &[]).unwrap();
    for q in 1..4 {
        sim.pauli_x(Qubit(q), &[Control(Qubit(q - 1))]).unwrap();
    }
    let events = sim.generate_events(1000).unwrap();
    let all_zero = events.iter().filter(|&&e| e == 0).count();
    let all_one = events.iter().filter(|&&e| e == 0b1111).count();
    println!(
        "  events: {} x |0000⟩, {} x |1111⟩, {} other\n",
        all_zero,
        all_one,
        events.len() - all_zero - all_one
    );
    let passed = all_zero + all_one == events.len() && all_zero > 0 && all_one > 0;
    record(results, "ghz events", start, passed);
}

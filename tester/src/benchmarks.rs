use crate::common::{format_duration, print_section, states_equal, CheckResult};
use libstrata_core::{Control, Qubit, SimulatorBuilder, SingleProcess, Simulator, Strategy};
use std::time::Instant;

pub fn run_all(results: &mut Vec<CheckResult>) {
    println!("═══════════════════════════════════════════════════════════════");
    println!("                    TIMING COMPARISONS");
    println!("═══════════════════════════════════════════════════════════════\n");

    sequential_vs_parallel(results);
    aliased_vs_scratch(results);
    fusion_vs_sequential(results);
}

const BENCH_QUBITS: u32 = 16;

fn workload(sim: &mut Simulator<SingleProcess>) {
    for q in 0..BENCH_QUBITS {
        sim.hadamard(Qubit(q), &[]).unwrap();
    }
    for q in 1..BENCH_QUBITS {
        sim.pauli_x(Qubit(q), &[Control(Qubit(q - 1))]).unwrap();
    }
    for q in 0..BENCH_QUBITS {
        sim.u3(0.3, 0.1, -0.2, Qubit(q), &[]).unwrap();
    }
}

fn sequential_vs_parallel(results: &mut Vec<CheckResult>) {
    print_section("Sequential vs parallel policy");

    let start_st = Instant::now();
    let mut st = SimulatorBuilder::new(BENCH_QUBITS).build_local().unwrap();
    workload(&mut st);
    let st_time = start_st.elapsed();

    let start_mt = Instant::now();
    let mut mt = SimulatorBuilder::new(BENCH_QUBITS)
        .num_threads(4)
        .build_local()
        .unwrap();
    workload(&mut mt);
    let mt_time = start_mt.elapsed();

    let passed = states_equal(&st.state_vector().unwrap(), &mt.state_vector().unwrap());
    println!(
        "  sequential: {}   parallel(4): {}\n",
        format_duration(st_time),
        format_duration(mt_time)
    );
    results.push(CheckResult {
        name: "sequential vs parallel".to_string(),
        elapsed: start_st.elapsed(),
        passed,
    });
}

fn aliased_vs_scratch(results: &mut Vec<CheckResult>) {
    print_section("Aliased vs scratch chunk strategy (C = 10)");

    let build = |strategy: Strategy| {
        let start = Instant::now();
        let mut sim = SimulatorBuilder::new(BENCH_QUBITS)
            .num_on_cache_qubits(10)
            .strategy(strategy)
            .build_local()
            .unwrap();
        workload(&mut sim);
        (sim.state_vector().unwrap(), start.elapsed())
    };

    let overall = Instant::now();
    let (aliased, aliased_time) = build(Strategy::Aliased);
    let (scratch, scratch_time) = build(Strategy::Scratch);
    println!(
        "  aliased: {}   scratch: {}\n",
        format_duration(aliased_time),
        format_duration(scratch_time)
    );
    results.push(CheckResult {
        name: "aliased vs scratch".to_string(),
        elapsed: overall.elapsed(),
        passed: states_equal(&aliased, &scratch),
    });
}

fn fusion_vs_sequential(results: &mut Vec<CheckResult>) {
    print_section("Fused single-qubit run vs gate-by-gate");

    let gates: Vec<Box<dyn Fn(&mut Simulator<SingleProcess>) -> libstrata_core::Result<()>>> = vec![
        Box::new(|s| s.hadamard(Qubit(0), &[])),
        Box::new(|s| s.u3(0.4, 0.9, -0.3, Qubit(0), &[])),
        Box::new(|s| s.pauli_y(Qubit(0), &[])),
        Box::new(|s| s.y_rotation_half_pi(Qubit(0), &[])),
        Box::new(|s| s.u1(0.8, &[Control(Qubit(0))])),
    ];

    let start_seq = Instant::now();
    let mut sequential = SimulatorBuilder::new(BENCH_QUBITS).build_local().unwrap();
    for _ in 0..10 {
        for gate in &gates {
            gate(&mut sequential).unwrap();
        }
    }
    let seq_time = start_seq.elapsed();

    let start_fused = Instant::now();
    let mut fused = SimulatorBuilder::new(BENCH_QUBITS).build_local().unwrap();
    for _ in 0..10 {
        fused.begin_fusion().unwrap();
        for gate in &gates {
            gate(&mut fused).unwrap();
        }
        fused.end_fusion().unwrap();
    }
    let fused_time = start_fused.elapsed();

    println!(
        "  gate-by-gate: {}   fused: {}\n",
        format_duration(seq_time),
        format_duration(fused_time)
    );
    results.push(CheckResult {
        name: "fusion vs sequential".to_string(),
        elapsed: start_seq.elapsed(),
        passed: states_equal(
            &sequential.state_vector().unwrap(),
            &fused.state_vector().unwrap(),
        ),
    });
}

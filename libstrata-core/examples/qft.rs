use libstrata_core::{format_amplitude, Control, Qubit, Result, SimulatorBuilder};

/// Quantum Fourier Transform over three qubits.
///
/// Builds the QFT from Hadamards and controlled phase shifts, applies it
/// to |001⟩, prints the resulting amplitudes and a histogram of generated
/// events. The QFT of a basis state is a uniform superposition, so every
/// outcome should appear with probability ~1/8.
fn main() -> Result<()> {
    const NUM_QUBITS: u32 = 3;

    let mut sim = SimulatorBuilder::new(NUM_QUBITS)
        .initial_integer(1)
        .seed(42)
        .build_local()?;

    // One pass per target qubit, high to low: a Hadamard followed by the
    // conditional phase ladder from every lower qubit.
    for target in (0..NUM_QUBITS).rev() {
        sim.hadamard(Qubit(target), &[])?;
        for source in (0..target).rev() {
            let angle = std::f64::consts::PI / (1u64 << (target - source)) as f64;
            sim.u1(angle, &[Control(Qubit(source)), Control(Qubit(target))])?;
        }
    }
    // Bit-reversal at the end.
    for q in 0..NUM_QUBITS / 2 {
        sim.swap(Qubit(q), Qubit(NUM_QUBITS - 1 - q), &[])?;
    }

    println!("State vector after the QFT of |001⟩:");
    for (i, amplitude) in sim.state_vector()?.iter().enumerate() {
        println!(
            "  |{:0width$b}⟩: {}",
            i,
            format_amplitude(amplitude),
            width = NUM_QUBITS as usize
        );
    }

    let num_events = 4096;
    let events = sim.generate_events(num_events)?;
    let mut histogram = vec![0usize; 1 << NUM_QUBITS];
    for event in events {
        histogram[event as usize] += 1;
    }

    println!("\nHistogram of {} generated events:", num_events);
    for (i, count) in histogram.iter().enumerate() {
        println!(
            "  |{:0width$b}⟩: {}",
            i,
            count,
            width = NUM_QUBITS as usize
        );
    }
    println!(
        "\nEach outcome should land near {} counts.",
        num_events / (1 << NUM_QUBITS)
    );

    Ok(())
}

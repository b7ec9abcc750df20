//! Gate kernels and their dense-operator forms.
//!
//! Each kernel inlines the small matrix-vector update for its gate and
//! addresses amplitudes through the index algebra. Operand order is
//! targets first, controls after; a kernel's `base` pattern has every
//! control bit set, so controlled forms fall out of the same body.

pub mod exponential;
pub mod hadamard;
pub mod matrices;
pub mod pauli;
pub mod phase_shift;
pub mod rotation;
pub mod swap;

pub use exponential::{ExpPauliXKernel, ExpPauliYKernel, ExpPauliZKernel};
pub use hadamard::HadamardKernel;
pub use pauli::{PauliXKernel, PauliYKernel, PauliZKernel};
pub use phase_shift::{PhaseCoeffKernel, PhaseShift2Kernel, PhaseShift3Kernel};
pub use rotation::{XRotationHalfPiKernel, YRotationHalfPiKernel};
pub use swap::{ExpSwapKernel, SwapKernel};

/// Pattern with every control bit set and every target bit clear.
#[inline]
pub(crate) fn control_base(num_targets: u32, num_controls: u32) -> u64 {
    ((1u64 << num_controls) - 1) << num_targets
}

#[cfg(test)]
mod tests {
    use super::matrices::DenseMatrix;
    use super::*;
    use crate::core::cache::{apply_gate, GateKernel, Tuning};
    use crate::core::loops::Policy;
    use crate::core::qubit::Qubit;
    use crate::maths::{exp_i, Amplitude};
    use num_complex::Complex64;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn control_base_sets_high_bits() {
        assert_eq!(control_base(1, 0), 0b0);
        assert_eq!(control_base(1, 1), 0b10);
        assert_eq!(control_base(1, 2), 0b110);
        assert_eq!(control_base(2, 1), 0b100);
    }

    fn random_state(num_qubits: u32, seed: u64) -> Vec<Amplitude> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..(1usize << num_qubits))
            .map(|_| Complex64::new(rng.random::<f64>() - 0.5, rng.random::<f64>() - 0.5))
            .collect()
    }

    fn naive_apply(state: &[Amplitude], matrix: &DenseMatrix, positions: &[u32]) -> Vec<Amplitude> {
        let dim = matrix.dim();
        let mut out = vec![Complex64::ZERO; state.len()];
        for (i, slot) in out.iter_mut().enumerate() {
            let mut row = 0usize;
            let mut cleared = i;
            for (j, &pos) in positions.iter().enumerate() {
                row |= (((i >> pos) & 1) as usize) << j;
                cleared &= !(1usize << pos);
            }
            let mut sum = Complex64::ZERO;
            for col in 0..dim {
                let mut src = cleared;
                for (j, &pos) in positions.iter().enumerate() {
                    if (col >> j) & 1 == 1 {
                        src |= 1usize << pos;
                    }
                }
                sum += matrix.get(row, col) * state[src];
            }
            *slot = sum;
        }
        out
    }

    /// Every kernel body must agree with its dense operator.
    fn check<K: GateKernel>(kernel: K, matrix: &DenseMatrix, positions: &[u32]) {
        let num_qubits = 6u32;
        let state0 = random_state(num_qubits, 31);
        let expected = naive_apply(&state0, matrix, positions);

        let mut state = state0;
        let mut scratch = Vec::new();
        let operated: Vec<Qubit> = positions.iter().map(|&p| Qubit(p)).collect();
        apply_gate(
            &Policy::Sequential,
            &Tuning::default(),
            &mut state,
            &mut scratch,
            &operated,
            "kernel",
            &kernel,
        )
        .unwrap();

        for (i, (a, e)) in state.iter().zip(expected.iter()).enumerate() {
            assert!(
                (a - e).norm() < 1e-12,
                "amplitude {}: {:?} vs {:?}",
                i,
                a,
                e
            );
        }
    }

    #[test]
    fn hadamard_kernel_matches_matrix() {
        check(HadamardKernel::new(0), &matrices::HADAMARD, &[2]);
        check(
            HadamardKernel::new(1),
            &matrices::controlled(&matrices::HADAMARD, 1),
            &[2, 4],
        );
    }

    #[test]
    fn pauli_kernels_match_matrices() {
        check(PauliXKernel::new(1, 0), &matrices::PAULI_X, &[0]);
        check(
            PauliXKernel::new(2, 1),
            &matrices::controlled(&matrices::pauli_x_product(2), 1),
            &[1, 3, 5],
        );
        check(PauliYKernel::new(1, 0), &matrices::PAULI_Y, &[3]);
        check(
            PauliYKernel::new(2, 0),
            &matrices::pauli_y_product(2),
            &[4, 1],
        );
        check(
            PauliZKernel::new(1, 1),
            &matrices::controlled(&matrices::PAULI_Z, 1),
            &[2, 0],
        );
        check(
            PauliZKernel::new(3, 0),
            &matrices::pauli_z_product(3),
            &[0, 2, 4],
        );
    }

    #[test]
    fn swap_kernels_match_matrices() {
        check(SwapKernel::new(0), &matrices::SWAP, &[1, 4]);
        check(
            SwapKernel::new(1),
            &matrices::controlled(&matrices::SWAP, 1),
            &[1, 4, 0],
        );
        check(ExpSwapKernel::new(0.6, 0), &matrices::exp_swap(0.6), &[2, 5]);
        check(
            ExpSwapKernel::new(-1.2, 1),
            &matrices::controlled(&matrices::exp_swap(-1.2), 1),
            &[0, 3, 5],
        );
    }

    #[test]
    fn phase_shift_kernels_match_matrices() {
        let coefficient = exp_i(0.77);
        check(
            PhaseCoeffKernel::new(coefficient, 2),
            &matrices::phase_coeff(coefficient, 2),
            &[3, 1],
        );
        check(
            PhaseShift2Kernel::new(0.4, -1.1, 0),
            &matrices::u2(0.4, -1.1),
            &[2],
        );
        check(
            PhaseShift2Kernel::adjoint(0.4, -1.1, 0),
            &matrices::u2(0.4, -1.1).adjoint(),
            &[2],
        );
        check(
            PhaseShift3Kernel::new(0.7, 1.3, -0.4, 0),
            &matrices::u3(0.7, 1.3, -0.4),
            &[5],
        );
        check(
            PhaseShift3Kernel::adjoint(0.7, 1.3, -0.4, 0),
            &matrices::u3(0.7, 1.3, -0.4).adjoint(),
            &[5],
        );
        check(
            PhaseShift3Kernel::new(0.7, 1.3, -0.4, 1),
            &matrices::controlled(&matrices::u3(0.7, 1.3, -0.4), 1),
            &[5, 2],
        );
    }

    #[test]
    fn rotation_kernels_match_matrices() {
        check(
            XRotationHalfPiKernel::new(false, 0),
            &matrices::x_rotation_half_pi(false),
            &[1],
        );
        check(
            XRotationHalfPiKernel::new(true, 0),
            &matrices::x_rotation_half_pi(true),
            &[1],
        );
        check(
            YRotationHalfPiKernel::new(false, 0),
            &matrices::y_rotation_half_pi(false),
            &[4],
        );
        check(
            YRotationHalfPiKernel::new(true, 1),
            &matrices::controlled(&matrices::y_rotation_half_pi(true), 1),
            &[4, 0],
        );
    }

    #[test]
    fn exponential_kernels_match_matrices() {
        check(
            ExpPauliXKernel::new(0.9, 2, 0),
            &matrices::exp_pauli_x(0.9, 2),
            &[0, 3],
        );
        check(
            ExpPauliYKernel::new(0.35, 1, 1),
            &matrices::controlled(&matrices::exp_pauli_y(0.35, 1), 1),
            &[2, 5],
        );
        check(
            ExpPauliYKernel::new(-0.8, 3, 0),
            &matrices::exp_pauli_y(-0.8, 3),
            &[1, 4, 2],
        );
        check(
            ExpPauliZKernel::new(1.4, 2, 0),
            &matrices::exp_pauli_z(1.4, 2),
            &[1, 4],
        );
    }
}

//! Dense small-operator matrices.
//!
//! Kernels inline their arithmetic and never touch these; the fusion
//! driver and the test suite work with the explicit matrices. Pattern
//! convention everywhere: bit `j` of a row/column index is operand `j`,
//! targets in the low bits, controls above them.

use lazy_static::lazy_static;
use num_complex::Complex64;

use crate::maths::{exp_i, Amplitude, ONE_DIV_ROOT_TWO};

/// A dense operator on `num_qubits` operands, row-major, dim `2^num_qubits`.
#[derive(Clone, Debug)]
pub struct DenseMatrix {
    num_qubits: u32,
    data: Vec<Amplitude>,
}

impl DenseMatrix {
    pub fn new(num_qubits: u32, data: Vec<Amplitude>) -> DenseMatrix {
        debug_assert_eq!(data.len(), 1 << (2 * num_qubits));
        DenseMatrix { num_qubits, data }
    }

    pub fn identity(num_qubits: u32) -> DenseMatrix {
        let dim = 1usize << num_qubits;
        let mut data = vec![Complex64::ZERO; dim * dim];
        for i in 0..dim {
            data[i * dim + i] = Complex64::ONE;
        }
        DenseMatrix { num_qubits, data }
    }

    #[inline]
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    #[inline]
    pub fn dim(&self) -> usize {
        1 << self.num_qubits
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Amplitude {
        self.data[row * self.dim() + col]
    }

    fn set(&mut self, row: usize, col: usize, value: Amplitude) {
        let dim = self.dim();
        self.data[row * dim + col] = value;
    }

    /// The conjugate transpose.
    pub fn adjoint(&self) -> DenseMatrix {
        let dim = self.dim();
        let mut out = DenseMatrix::new(self.num_qubits, vec![Complex64::ZERO; dim * dim]);
        for r in 0..dim {
            for c in 0..dim {
                out.set(r, c, self.get(c, r).conj());
            }
        }
        out
    }

    /// `self * other` (other applied first).
    pub fn compose(&self, other: &DenseMatrix) -> DenseMatrix {
        debug_assert_eq!(self.num_qubits, other.num_qubits);
        let dim = self.dim();
        let mut out = DenseMatrix::new(self.num_qubits, vec![Complex64::ZERO; dim * dim]);
        for r in 0..dim {
            for c in 0..dim {
                let mut sum = Complex64::ZERO;
                for k in 0..dim {
                    sum += self.get(r, k) * other.get(k, c);
                }
                out.set(r, c, sum);
            }
        }
        out
    }
}

fn mat2(m: [[Amplitude; 2]; 2]) -> DenseMatrix {
    DenseMatrix::new(1, vec![m[0][0], m[0][1], m[1][0], m[1][1]])
}

fn re(v: f64) -> Amplitude {
    Complex64::new(v, 0.0)
}

fn im(v: f64) -> Amplitude {
    Complex64::new(0.0, v)
}

#[rustfmt::skip]
lazy_static! {
    pub static ref HADAMARD: DenseMatrix = mat2([
        [re(ONE_DIV_ROOT_TWO), re(ONE_DIV_ROOT_TWO)],
        [re(ONE_DIV_ROOT_TWO), re(-ONE_DIV_ROOT_TWO)],
    ]);

    pub static ref PAULI_X: DenseMatrix = mat2([
        [re(0.0), re(1.0)],
        [re(1.0), re(0.0)],
    ]);

    pub static ref PAULI_Y: DenseMatrix = mat2([
        [re(0.0), im(-1.0)],
        [im(1.0), re(0.0)],
    ]);

    pub static ref PAULI_Z: DenseMatrix = mat2([
        [re(1.0), re(0.0)],
        [re(0.0), re(-1.0)],
    ]);

    pub static ref SWAP: DenseMatrix = DenseMatrix::new(2, vec![
        re(1.0), re(0.0), re(0.0), re(0.0),
        re(0.0), re(0.0), re(1.0), re(0.0),
        re(0.0), re(1.0), re(0.0), re(0.0),
        re(0.0), re(0.0), re(0.0), re(1.0),
    ]);
}

/// Diagonal phase on the all-ones pattern of `num_operands` operands.
pub fn phase_coeff(coefficient: Amplitude, num_operands: u32) -> DenseMatrix {
    let mut m = DenseMatrix::identity(num_operands);
    let last = m.dim() - 1;
    m.set(last, last, coefficient);
    m
}

/// U2(phase1, phase2).
pub fn u2(phase1: f64, phase2: f64) -> DenseMatrix {
    let c1 = exp_i(phase1);
    let c2 = exp_i(phase2);
    mat2([
        [
            re(ONE_DIV_ROOT_TWO),
            -c2 * ONE_DIV_ROOT_TWO,
        ],
        [
            c1 * ONE_DIV_ROOT_TWO,
            c1 * c2 * ONE_DIV_ROOT_TWO,
        ],
    ])
}

/// U3(phase1, phase2, phase3).
pub fn u3(phase1: f64, phase2: f64, phase3: f64) -> DenseMatrix {
    let cos = (phase1 / 2.0).cos();
    let sin = (phase1 / 2.0).sin();
    let c2 = exp_i(phase2);
    let c3 = exp_i(phase3);
    mat2([
        [re(cos), -c3 * sin],
        [c2 * sin, c2 * c3 * cos],
    ])
}

/// Half-pi X rotation: (I - iX)/sqrt(2); `adjoint` flips the sign of i.
pub fn x_rotation_half_pi(adjoint: bool) -> DenseMatrix {
    let s = if adjoint { 1.0 } else { -1.0 };
    mat2([
        [re(ONE_DIV_ROOT_TWO), im(s * ONE_DIV_ROOT_TWO)],
        [im(s * ONE_DIV_ROOT_TWO), re(ONE_DIV_ROOT_TWO)],
    ])
}

/// Half-pi Y rotation: (I - iY)/sqrt(2) = [[1, -1], [1, 1]]/sqrt(2).
pub fn y_rotation_half_pi(adjoint: bool) -> DenseMatrix {
    let s = if adjoint { 1.0 } else { -1.0 };
    mat2([
        [re(ONE_DIV_ROOT_TWO), re(s * ONE_DIV_ROOT_TWO)],
        [re(-s * ONE_DIV_ROOT_TWO), re(ONE_DIV_ROOT_TWO)],
    ])
}

/// The n-target Pauli-X product X⊗…⊗X.
pub fn pauli_x_product(num_targets: u32) -> DenseMatrix {
    let dim = 1usize << num_targets;
    let mut m = DenseMatrix::new(num_targets, vec![Complex64::ZERO; dim * dim]);
    for p in 0..dim {
        m.set(p, p ^ (dim - 1), Complex64::ONE);
    }
    m
}

/// The n-target Pauli-Y product Y⊗…⊗Y.
pub fn pauli_y_product(num_targets: u32) -> DenseMatrix {
    let dim = 1usize << num_targets;
    let i_pow = [re(1.0), im(1.0), re(-1.0), im(-1.0)][num_targets as usize % 4];
    let mut m = DenseMatrix::new(num_targets, vec![Complex64::ZERO; dim * dim]);
    for p in 0..dim {
        let q = p ^ (dim - 1);
        let sign = if (q as u64).count_ones() % 2 == 0 {
            1.0
        } else {
            -1.0
        };
        m.set(p, q, i_pow * sign);
    }
    m
}

/// The n-target Pauli-Z product Z⊗…⊗Z.
pub fn pauli_z_product(num_targets: u32) -> DenseMatrix {
    let dim = 1usize << num_targets;
    let mut m = DenseMatrix::new(num_targets, vec![Complex64::ZERO; dim * dim]);
    for p in 0..dim {
        let sign = if (p as u64).count_ones() % 2 == 0 {
            1.0
        } else {
            -1.0
        };
        m.set(p, p, re(sign));
    }
    m
}

/// e^{i phase X⊗…⊗X} = cos(phase) I + i sin(phase) X⊗…⊗X.
pub fn exp_pauli_x(phase: f64, num_targets: u32) -> DenseMatrix {
    exp_of_involution(phase, &pauli_x_product(num_targets))
}

pub fn exp_pauli_y(phase: f64, num_targets: u32) -> DenseMatrix {
    exp_of_involution(phase, &pauli_y_product(num_targets))
}

pub fn exp_pauli_z(phase: f64, num_targets: u32) -> DenseMatrix {
    exp_of_involution(phase, &pauli_z_product(num_targets))
}

/// e^{i phase SWAP}.
pub fn exp_swap(phase: f64) -> DenseMatrix {
    exp_of_involution(phase, &SWAP)
}

/// e^{i phase M} for self-inverse M: cos(phase) I + i sin(phase) M.
fn exp_of_involution(phase: f64, m: &DenseMatrix) -> DenseMatrix {
    let dim = m.dim();
    let cos = re(phase.cos());
    let isin = im(phase.sin());
    let mut out = DenseMatrix::new(m.num_qubits(), vec![Complex64::ZERO; dim * dim]);
    for r in 0..dim {
        for c in 0..dim {
            let ident = if r == c { Complex64::ONE } else { Complex64::ZERO };
            out.set(r, c, cos * ident + isin * m.get(r, c));
        }
    }
    out
}

/// Embeds `gate` under `num_controls` controls occupying the pattern bits
/// above the gate's operands: identity except on the all-controls-set
/// subspace.
pub fn controlled(gate: &DenseMatrix, num_controls: u32) -> DenseMatrix {
    if num_controls == 0 {
        return gate.clone();
    }
    let num_qubits = gate.num_qubits() + num_controls;
    let control_mask = ((1usize << num_controls) - 1) << gate.num_qubits();
    let mut out = DenseMatrix::identity(num_qubits);
    let target_dim = gate.dim();
    for r in 0..target_dim {
        for c in 0..target_dim {
            out.set(control_mask | r, control_mask | c, gate.get(r, c));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &DenseMatrix, b: &DenseMatrix) -> bool {
        a.dim() == b.dim()
            && (0..a.dim())
                .all(|r| (0..a.dim()).all(|c| (a.get(r, c) - b.get(r, c)).norm() < 1e-12))
    }

    #[test]
    fn catalog_matrices_are_unitary() {
        let cases: Vec<DenseMatrix> = vec![
            HADAMARD.clone(),
            PAULI_X.clone(),
            PAULI_Y.clone(),
            PAULI_Z.clone(),
            SWAP.clone(),
            u2(0.4, -1.1),
            u3(0.7, 1.3, -0.4),
            x_rotation_half_pi(false),
            y_rotation_half_pi(true),
            exp_pauli_x(0.9, 2),
            exp_pauli_y(-0.3, 1),
            exp_pauli_z(1.7, 3),
            exp_swap(0.25),
            phase_coeff(exp_i(1.0), 2),
        ];
        for m in cases {
            let product = m.adjoint().compose(&m);
            assert!(close(&product, &DenseMatrix::identity(m.num_qubits())));
        }
    }

    #[test]
    fn controlled_embeds_in_high_bits() {
        let cx = controlled(&PAULI_X, 1);
        // control clear: identity
        assert_eq!(cx.get(0, 0), Complex64::ONE);
        assert_eq!(cx.get(1, 1), Complex64::ONE);
        // control set: X on the target bit
        assert_eq!(cx.get(2, 3), Complex64::ONE);
        assert_eq!(cx.get(3, 2), Complex64::ONE);
        assert_eq!(cx.get(2, 2), Complex64::ZERO);
    }

    #[test]
    fn adjoint_identities_from_negated_phases() {
        assert!(close(&u2(0.4, 1.1).adjoint(), &u2(std::f64::consts::PI - 1.1, std::f64::consts::PI - 0.4)));
        assert!(close(&u3(0.7, 1.3, -0.4).adjoint(), &u3(-0.7, 0.4, -1.3)));
        assert!(close(&exp_pauli_x(0.6, 2).adjoint(), &exp_pauli_x(-0.6, 2)));
    }

    #[test]
    fn exp_swap_phases_symmetric_states() {
        let m = exp_swap(0.5);
        let e = exp_i(0.5);
        assert!((m.get(0, 0) - e).norm() < 1e-12);
        assert!((m.get(3, 3) - e).norm() < 1e-12);
        assert!((m.get(1, 1) - re(0.5f64.cos())).norm() < 1e-12);
        assert!((m.get(1, 2) - im(0.5f64.sin())).norm() < 1e-12);
    }
}

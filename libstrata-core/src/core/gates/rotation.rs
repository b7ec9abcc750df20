//! Half-pi Pauli rotations.

use num_complex::Complex64;

use crate::core::cache::{AmpAccess, GateKernel};
use crate::core::index::OperandIndexer;
use crate::maths::{Amplitude, ONE_DIV_ROOT_TWO};

/// (I ∓ iX)/sqrt(2); the adjoint flips the sign of i.
pub struct XRotationHalfPiKernel {
    base: u64,
    i_factor: Amplitude,
}

impl XRotationHalfPiKernel {
    pub fn new(adjoint: bool, num_controls: u32) -> XRotationHalfPiKernel {
        let sign = if adjoint { 1.0 } else { -1.0 };
        XRotationHalfPiKernel {
            base: super::control_base(1, num_controls),
            i_factor: Complex64::new(0.0, sign),
        }
    }
}

impl GateKernel for XRotationHalfPiKernel {
    #[inline]
    fn apply<A: AmpAccess>(
        &self,
        amps: &A,
        v: u64,
        operands: &OperandIndexer,
        _thread_index: usize,
    ) {
        let zero = operands.index(v, self.base);
        let one = operands.index(v, self.base | 1);
        let a0 = amps.load(zero);
        let a1 = amps.load(one);
        amps.store(zero, (a0 + self.i_factor * a1) * ONE_DIV_ROOT_TWO);
        amps.store(one, (self.i_factor * a0 + a1) * ONE_DIV_ROOT_TWO);
    }
}

/// (I ∓ iY)/sqrt(2), a real rotation.
pub struct YRotationHalfPiKernel {
    base: u64,
    sign: f64,
}

impl YRotationHalfPiKernel {
    pub fn new(adjoint: bool, num_controls: u32) -> YRotationHalfPiKernel {
        YRotationHalfPiKernel {
            base: super::control_base(1, num_controls),
            sign: if adjoint { -1.0 } else { 1.0 },
        }
    }
}

impl GateKernel for YRotationHalfPiKernel {
    #[inline]
    fn apply<A: AmpAccess>(
        &self,
        amps: &A,
        v: u64,
        operands: &OperandIndexer,
        _thread_index: usize,
    ) {
        let zero = operands.index(v, self.base);
        let one = operands.index(v, self.base | 1);
        let a0 = amps.load(zero);
        let a1 = amps.load(one);
        amps.store(zero, (a0 - a1 * self.sign) * ONE_DIV_ROOT_TWO);
        amps.store(one, (a0 * self.sign + a1) * ONE_DIV_ROOT_TWO);
    }
}

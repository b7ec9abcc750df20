//! Phase-shift kernels.
//!
//! The coefficient form is diagonal: it multiplies the single amplitude
//! whose operand pattern is all ones. U2 and U3 act on one target under
//! controls, with the phase coefficients folded into the two-row update.

use crate::core::cache::{AmpAccess, GateKernel};
use crate::core::index::OperandIndexer;
use crate::maths::{exp_i, Amplitude, ONE_DIV_ROOT_TWO};

/// Multiplies the all-operands-set amplitude by a phase coefficient.
///
/// With zero operands this degenerates to a global phase on every
/// amplitude.
pub struct PhaseCoeffKernel {
    pattern: u64,
    coefficient: Amplitude,
}

impl PhaseCoeffKernel {
    pub fn new(coefficient: Amplitude, num_operands: u32) -> PhaseCoeffKernel {
        PhaseCoeffKernel {
            pattern: (1u64 << num_operands) - 1,
            coefficient,
        }
    }
}

impl GateKernel for PhaseCoeffKernel {
    #[inline]
    fn apply<A: AmpAccess>(
        &self,
        amps: &A,
        v: u64,
        operands: &OperandIndexer,
        _thread_index: usize,
    ) {
        let index = operands.index(v, self.pattern);
        amps.store(index, amps.load(index) * self.coefficient);
    }
}

/// U2(phase1, phase2):
/// a0' = (a0 - e^{i phase2} a1)/sqrt(2),
/// a1' = e^{i phase1} (a0 + e^{i phase2} a1)/sqrt(2).
pub struct PhaseShift2Kernel {
    base: u64,
    modified_coefficient1: Amplitude,
    coefficient2: Amplitude,
}

impl PhaseShift2Kernel {
    pub fn new(phase1: f64, phase2: f64, num_controls: u32) -> PhaseShift2Kernel {
        PhaseShift2Kernel {
            base: super::control_base(1, num_controls),
            modified_coefficient1: exp_i(phase1) * ONE_DIV_ROOT_TWO,
            coefficient2: exp_i(phase2),
        }
    }

    /// The adjoint is U2 with swapped, pi-reflected phases.
    pub fn adjoint(phase1: f64, phase2: f64, num_controls: u32) -> PhaseShift2Kernel {
        use std::f64::consts::PI;
        PhaseShift2Kernel::new(PI - phase2, PI - phase1, num_controls)
    }
}

impl GateKernel for PhaseShift2Kernel {
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
        let shifted = self.coefficient2 * a1;
        amps.store(zero, (a0 - shifted) * ONE_DIV_ROOT_TWO);
        amps.store(one, (a0 + shifted) * self.modified_coefficient1);
    }
}

/// U3(phase1, phase2, phase3), the generalized phase shift:
/// [[cos(p1/2), -e^{i p3} sin(p1/2)], [e^{i p2} sin(p1/2), e^{i(p2+p3)} cos(p1/2)]].
pub struct PhaseShift3Kernel {
    base: u64,
    m00: f64,
    m01: Amplitude,
    m10: Amplitude,
    m11: Amplitude,
}

impl PhaseShift3Kernel {
    pub fn new(phase1: f64, phase2: f64, phase3: f64, num_controls: u32) -> PhaseShift3Kernel {
        let cos = (phase1 / 2.0).cos();
        let sin = (phase1 / 2.0).sin();
        let c2 = exp_i(phase2);
        let c3 = exp_i(phase3);
        PhaseShift3Kernel {
            base: super::control_base(1, num_controls),
            m00: cos,
            m01: -c3 * sin,
            m10: c2 * sin,
            m11: c2 * c3 * cos,
        }
    }

    /// The adjoint negates the rotation and swaps the two phases.
    pub fn adjoint(phase1: f64, phase2: f64, phase3: f64, num_controls: u32) -> PhaseShift3Kernel {
        PhaseShift3Kernel::new(-phase1, -phase3, -phase2, num_controls)
    }
}

impl GateKernel for PhaseShift3Kernel {
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
        amps.store(zero, a0 * self.m00 + self.m01 * a1);
        amps.store(one, self.m10 * a0 + self.m11 * a1);
    }
}

use num_complex::Complex64;

use crate::core::cache::{AmpAccess, GateKernel};
use crate::core::index::OperandIndexer;
use crate::maths::{exp_i, Amplitude};

/// SWAP of two targets, under any number of controls.
pub struct SwapKernel {
    base: u64,
}

impl SwapKernel {
    pub fn new(num_controls: u32) -> SwapKernel {
        SwapKernel {
            base: super::control_base(2, num_controls),
        }
    }
}

impl GateKernel for SwapKernel {
    #[inline]
    fn apply<A: AmpAccess>(
        &self,
        amps: &A,
        v: u64,
        operands: &OperandIndexer,
        _thread_index: usize,
    ) {
        let i = operands.index(v, self.base | 0b01);
        let j = operands.index(v, self.base | 0b10);
        let a = amps.load(i);
        amps.store(i, amps.load(j));
        amps.store(j, a);
    }
}

/// e^{i phase SWAP}: the symmetric patterns pick up e^{i phase}, the
/// antisymmetric pair mixes with cos/sin weights.
pub struct ExpSwapKernel {
    base: u64,
    phase_coefficient: Amplitude,
    cos: f64,
    i_sin: Amplitude,
}

impl ExpSwapKernel {
    pub fn new(phase: f64, num_controls: u32) -> ExpSwapKernel {
        ExpSwapKernel {
            base: super::control_base(2, num_controls),
            phase_coefficient: exp_i(phase),
            cos: phase.cos(),
            i_sin: Complex64::new(0.0, phase.sin()),
        }
    }
}

impl GateKernel for ExpSwapKernel {
    #[inline]
    fn apply<A: AmpAccess>(
        &self,
        amps: &A,
        v: u64,
        operands: &OperandIndexer,
        _thread_index: usize,
    ) {
        let both_clear = operands.index(v, self.base);
        let low = operands.index(v, self.base | 0b01);
        let high = operands.index(v, self.base | 0b10);
        let both_set = operands.index(v, self.base | 0b11);

        amps.store(both_clear, amps.load(both_clear) * self.phase_coefficient);
        amps.store(both_set, amps.load(both_set) * self.phase_coefficient);

        let a01 = amps.load(low);
        let a10 = amps.load(high);
        amps.store(low, a01 * self.cos + self.i_sin * a10);
        amps.store(high, a10 * self.cos + self.i_sin * a01);
    }
}

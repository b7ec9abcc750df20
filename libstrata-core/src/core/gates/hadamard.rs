use crate::core::cache::{AmpAccess, GateKernel};
use crate::core::index::OperandIndexer;
use crate::maths::ONE_DIV_ROOT_TWO;

/// Hadamard on one target, under any number of controls.
pub struct HadamardKernel {
    base: u64,
}

impl HadamardKernel {
    pub fn new(num_controls: u32) -> HadamardKernel {
        HadamardKernel {
            base: super::control_base(1, num_controls),
        }
    }
}

impl GateKernel for HadamardKernel {
    #[inline]
    fn apply<A: AmpAccess>(
        &self,
        amps: &A,
        index_wo_qubits: u64,
        operands: &OperandIndexer,
        _thread_index: usize,
    ) {
        let zero = operands.index(index_wo_qubits, self.base);
        let one = operands.index(index_wo_qubits, self.base | 1);
        let a0 = amps.load(zero);
        let a1 = amps.load(one);
        amps.store(zero, (a0 + a1) * ONE_DIV_ROOT_TWO);
        amps.store(one, (a0 - a1) * ONE_DIV_ROOT_TWO);
    }
}

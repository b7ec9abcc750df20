//! Pauli kernels, single-target and n-target products.
//!
//! The products pair each target pattern with its bitwise complement:
//! X⊗…⊗X swaps the pair, Y⊗…⊗Y swaps with the product phase, Z⊗…⊗Z is
//! diagonal with the pattern parity sign.

use num_complex::Complex64;

use crate::core::cache::{AmpAccess, GateKernel};
use crate::core::index::OperandIndexer;
use crate::maths::Amplitude;

#[inline]
fn i_power(n: u32) -> Amplitude {
    match n % 4 {
        0 => Complex64::new(1.0, 0.0),
        1 => Complex64::new(0.0, 1.0),
        2 => Complex64::new(-1.0, 0.0),
        _ => Complex64::new(0.0, -1.0),
    }
}

#[inline]
fn parity_sign(pattern: u64) -> f64 {
    if pattern.count_ones() % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}

pub struct PauliXKernel {
    num_targets: u32,
    base: u64,
}

impl PauliXKernel {
    pub fn new(num_targets: u32, num_controls: u32) -> PauliXKernel {
        PauliXKernel {
            num_targets,
            base: super::control_base(num_targets, num_controls),
        }
    }
}

impl GateKernel for PauliXKernel {
    #[inline]
    fn apply<A: AmpAccess>(
        &self,
        amps: &A,
        v: u64,
        operands: &OperandIndexer,
        _thread_index: usize,
    ) {
        let mask = (1u64 << self.num_targets) - 1;
        for p in 0..(1u64 << (self.num_targets - 1)) {
            let i = operands.index(v, self.base | p);
            let j = operands.index(v, self.base | (p ^ mask));
            let a = amps.load(i);
            amps.store(i, amps.load(j));
            amps.store(j, a);
        }
    }
}

pub struct PauliYKernel {
    num_targets: u32,
    base: u64,
    i_pow: Amplitude,
}

impl PauliYKernel {
    pub fn new(num_targets: u32, num_controls: u32) -> PauliYKernel {
        PauliYKernel {
            num_targets,
            base: super::control_base(num_targets, num_controls),
            i_pow: i_power(num_targets),
        }
    }
}

impl GateKernel for PauliYKernel {
    #[inline]
    fn apply<A: AmpAccess>(
        &self,
        amps: &A,
        v: u64,
        operands: &OperandIndexer,
        _thread_index: usize,
    ) {
        let mask = (1u64 << self.num_targets) - 1;
        for p in 0..(1u64 << (self.num_targets - 1)) {
            let q = p ^ mask;
            let i = operands.index(v, self.base | p);
            let j = operands.index(v, self.base | q);
            let a_p = amps.load(i);
            let a_q = amps.load(j);
            amps.store(i, self.i_pow * parity_sign(q) * a_q);
            amps.store(j, self.i_pow * parity_sign(p) * a_p);
        }
    }
}

pub struct PauliZKernel {
    num_targets: u32,
    base: u64,
}

impl PauliZKernel {
    pub fn new(num_targets: u32, num_controls: u32) -> PauliZKernel {
        PauliZKernel {
            num_targets,
            base: super::control_base(num_targets, num_controls),
        }
    }
}

impl GateKernel for PauliZKernel {
    #[inline]
    fn apply<A: AmpAccess>(
        &self,
        amps: &A,
        v: u64,
        operands: &OperandIndexer,
        _thread_index: usize,
    ) {
        for p in 1..(1u64 << self.num_targets) {
            if p.count_ones() % 2 == 1 {
                let i = operands.index(v, self.base | p);
                amps.store(i, -amps.load(i));
            }
        }
    }
}

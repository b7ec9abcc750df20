//! Exponential-Pauli kernels: e^{i phase P} for P a Pauli product.
//!
//! Every Pauli product squares to the identity, so the exponential is
//! cos(phase) I + i sin(phase) P and the kernel pairs each target pattern
//! with its bitwise complement.

use num_complex::Complex64;

use crate::core::cache::{AmpAccess, GateKernel};
use crate::core::index::OperandIndexer;
use crate::maths::{exp_i, Amplitude};

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

pub struct ExpPauliXKernel {
    num_targets: u32,
    base: u64,
    cos: f64,
    i_sin: Amplitude,
}

impl ExpPauliXKernel {
    pub fn new(phase: f64, num_targets: u32, num_controls: u32) -> ExpPauliXKernel {
        ExpPauliXKernel {
            num_targets,
            base: super::control_base(num_targets, num_controls),
            cos: phase.cos(),
            i_sin: Complex64::new(0.0, phase.sin()),
        }
    }
}

impl GateKernel for ExpPauliXKernel {
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
            let a_p = amps.load(i);
            let a_q = amps.load(j);
            amps.store(i, a_p * self.cos + self.i_sin * a_q);
            amps.store(j, a_q * self.cos + self.i_sin * a_p);
        }
    }
}

pub struct ExpPauliYKernel {
    num_targets: u32,
    base: u64,
    cos: f64,
    i_sin: Amplitude,
    i_pow: Amplitude,
}

impl ExpPauliYKernel {
    pub fn new(phase: f64, num_targets: u32, num_controls: u32) -> ExpPauliYKernel {
        ExpPauliYKernel {
            num_targets,
            base: super::control_base(num_targets, num_controls),
            cos: phase.cos(),
            i_sin: Complex64::new(0.0, phase.sin()),
            i_pow: i_power(num_targets),
        }
    }
}

impl GateKernel for ExpPauliYKernel {
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
            let f_pq = self.i_pow * parity_sign(q);
            let f_qp = self.i_pow * parity_sign(p);
            amps.store(i, a_p * self.cos + self.i_sin * f_pq * a_q);
            amps.store(j, a_q * self.cos + self.i_sin * f_qp * a_p);
        }
    }
}

pub struct ExpPauliZKernel {
    num_targets: u32,
    base: u64,
    even_coefficient: Amplitude,
    odd_coefficient: Amplitude,
}

impl ExpPauliZKernel {
    pub fn new(phase: f64, num_targets: u32, num_controls: u32) -> ExpPauliZKernel {
        ExpPauliZKernel {
            num_targets,
            base: super::control_base(num_targets, num_controls),
            even_coefficient: exp_i(phase),
            odd_coefficient: exp_i(-phase),
        }
    }
}

impl GateKernel for ExpPauliZKernel {
    #[inline]
    fn apply<A: AmpAccess>(
        &self,
        amps: &A,
        v: u64,
        operands: &OperandIndexer,
        _thread_index: usize,
    ) {
        for p in 0..(1u64 << self.num_targets) {
            let index = operands.index(v, self.base | p);
            let coefficient = if p.count_ones() % 2 == 0 {
                self.even_coefficient
            } else {
                self.odd_coefficient
            };
            amps.store(index, amps.load(index) * coefficient);
        }
    }
}

//! Gate fusion: coalescing a run of small gates over a shared operand set
//! into one pass through the state vector.
//!
//! Between begin and end, each fusible gate is recorded as its dense
//! operator plus its operands. End-fusion dispatches one generic k-qubit
//! kernel over the union of the operands; per outer index the kernel walks
//! the records in order, applying each operator to the sub-patterns its
//! operands select.

use num_complex::Complex64;

use crate::core::cache::{AmpAccess, GateKernel};
use crate::core::error::{Error, Result};
use crate::core::gates::matrices::DenseMatrix;
use crate::core::index::OperandIndexer;
use crate::core::qubit::Qubit;
use crate::maths::Amplitude;

/// Ceiling on one recorded gate's operand count; the fused kernel gathers
/// a recorded gate's sub-amplitudes into a `2^MAX_RECORDED_ARITY` stack
/// buffer.
const MAX_RECORDED_ARITY: usize = 6;

struct Recorded {
    matrix: DenseMatrix,
    operands: Vec<Qubit>,
}

/// An open fused-gate list. `fused_qubits` is the union of all recorded
/// operands, in order of first appearance.
pub struct FusedGateList {
    gates: Vec<Recorded>,
    fused_qubits: Vec<Qubit>,
}

impl FusedGateList {
    pub fn new() -> FusedGateList {
        FusedGateList {
            gates: Vec::new(),
            fused_qubits: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn fused_qubits(&self) -> &[Qubit] {
        &self.fused_qubits
    }

    /// Records one gate. Rejects the call if the gate's own arity exceeds
    /// the kernel's gather bound or the fused-qubit union would exceed
    /// `max_fused_qubits`; the list is left unchanged in either case.
    pub fn push(
        &mut self,
        gate: &'static str,
        matrix: DenseMatrix,
        operands: Vec<Qubit>,
        max_fused_qubits: usize,
    ) -> Result<()> {
        debug_assert_eq!(matrix.num_qubits() as usize, operands.len());
        if operands.len() > MAX_RECORDED_ARITY {
            return Err(Error::TooManyOperatedQubits {
                gate,
                requested: operands.len(),
                limit: MAX_RECORDED_ARITY,
            });
        }

        let mut grown = self.fused_qubits.clone();
        for &q in &operands {
            if !grown.contains(&q) {
                grown.push(q);
            }
        }
        if grown.len() > max_fused_qubits {
            return Err(Error::TooManyOperatedQubits {
                gate,
                requested: grown.len(),
                limit: max_fused_qubits,
            });
        }

        self.fused_qubits = grown;
        self.gates.push(Recorded { matrix, operands });
        Ok(())
    }

    /// Closes the list into the generic fused kernel; operand qubits become
    /// slot indices into the fused pattern space.
    pub fn into_kernel(self) -> FusedKernel {
        let fused = &self.fused_qubits;
        let ops = self
            .gates
            .into_iter()
            .map(|recorded| {
                let slots = recorded
                    .operands
                    .iter()
                    .map(|q| fused.iter().position(|f| f == q).unwrap() as u32)
                    .collect();
                FusedOp {
                    matrix: recorded.matrix,
                    slots,
                }
            })
            .collect();
        FusedKernel {
            num_fused: self.fused_qubits.len() as u32,
            ops,
        }
    }
}

impl Default for FusedGateList {
    fn default() -> Self {
        Self::new()
    }
}

struct FusedOp {
    matrix: DenseMatrix,
    /// Positions of this gate's operands within the fused pattern space.
    slots: Vec<u32>,
}

/// Spreads bit `j` of `t` to position `slots[j]`.
#[inline]
fn spread(t: u64, slots: &[u32]) -> u64 {
    slots
        .iter()
        .enumerate()
        .fold(0, |acc, (j, &s)| acc | (((t >> j) & 1) << s))
}

/// Distributes the bits of `u` over the positions of `[0, width)` not in
/// `excluded_mask`, ascending.
#[inline]
fn scatter_excluding(u: u64, width: u32, excluded_mask: u64) -> u64 {
    let mut out = 0u64;
    let mut src = 0u32;
    for position in 0..width {
        if (excluded_mask >> position) & 1 == 0 {
            out |= ((u >> src) & 1) << position;
            src += 1;
        }
    }
    out
}

/// The generic k-qubit kernel produced by end-fusion.
pub struct FusedKernel {
    num_fused: u32,
    ops: Vec<FusedOp>,
}

impl GateKernel for FusedKernel {
    fn apply<A: AmpAccess>(
        &self,
        amps: &A,
        v: u64,
        operands: &OperandIndexer,
        _thread_index: usize,
    ) {
        debug_assert_eq!(operands.num_operands() as u32, self.num_fused);

        for op in &self.ops {
            let arity = op.slots.len() as u32;
            let dim = 1usize << arity;
            let slot_mask = op.slots.iter().fold(0u64, |acc, &s| acc | (1 << s));
            let rest_bits = self.num_fused - arity;

            for u in 0..(1u64 << rest_bits) {
                let base = scatter_excluding(u, self.num_fused, slot_mask);

                let mut input = [Complex64::ZERO; 64];
                for t in 0..dim {
                    let pattern = base | spread(t as u64, &op.slots);
                    input[t] = amps.load(operands.index(v, pattern));
                }
                for t in 0..dim {
                    let mut sum: Amplitude = Complex64::ZERO;
                    for s in 0..dim {
                        sum += op.matrix.get(t, s) * input[s];
                    }
                    let pattern = base | spread(t as u64, &op.slots);
                    amps.store(operands.index(v, pattern), sum);
                }
            }
        }
    }
}

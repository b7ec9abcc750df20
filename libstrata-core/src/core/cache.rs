//! Cache-tiered gate dispatch.
//!
//! The `L` local qubit positions split at the on-cache boundary `C`:
//!
//! ```text
//! xxxx|yyyy|zzzzzz : local qubit positions
//!  off-cache |  on-cache
//!       yyyy : chunk positions (chosen per gate, sometimes none)
//!  xxxx|yyyy : tag positions, enumerating chunks of the state
//!     zzzzzz : nontag positions, offsets within a chunk
//! ```
//!
//! A gate is routed by where its operated positions fall relative to `C`:
//! all below (the state is walked in cache-sized segments), none below
//! (every operand becomes a chunk position), or straddling (off-cache
//! operands borrow free on-cache positions as chunk slots). In the chunked
//! regimes the kernel only ever addresses a cache-sized window, either
//! through an address-translating view or through a gathered scratch
//! buffer; the two sub-strategies are numerically equivalent.

use crate::core::error::{Error, Result};
use crate::core::index::{IndexForm, OperandIndexer};
use crate::core::loops::{loop_n, Policy};
use crate::core::qubit::Qubit;
use crate::maths::Amplitude;

pub const DEFAULT_NUM_ON_CACHE_QUBITS: u32 = 16;
pub const DEFAULT_MAX_OPERATED_QUBITS: usize = 6;

/// Sub-strategy for the chunked regimes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Iterate chunks in place through an address-translating view.
    #[default]
    Aliased,
    /// Gather chunks into the cache-resident scratch buffer, apply, scatter.
    Scratch,
}

/// Construction-time dispatch tunables.
#[derive(Clone, Copy, Debug)]
pub struct Tuning {
    pub num_on_cache_qubits: u32,
    pub max_operated_qubits: usize,
    pub index_form: IndexForm,
    pub strategy: Strategy,
}

impl Default for Tuning {
    fn default() -> Self {
        Tuning {
            num_on_cache_qubits: DEFAULT_NUM_ON_CACHE_QUBITS,
            max_operated_qubits: DEFAULT_MAX_OPERATED_QUBITS,
            index_form: IndexForm::default(),
            strategy: Strategy::default(),
        }
    }
}

/// Which regime a gate lands in for a given local span.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Regime {
    /// Cache boundary not meaningful; single uncached pass.
    Uncached,
    AllOnCache,
    NoneOnCache,
    SomeOnCache,
}

pub fn regime(tuning: &Tuning, num_local_qubits: u32, operated: &[Qubit]) -> Regime {
    let c = tuning.num_on_cache_qubits;
    if num_local_qubits <= c || operated.len() as u32 >= c {
        return Regime::Uncached;
    }
    let any_off = operated.iter().any(|q| q.index() >= c);
    let any_on = operated.iter().any(|q| q.index() < c);
    match (any_on, any_off) {
        (_, false) => Regime::AllOnCache,
        (false, true) => Regime::NoneOnCache,
        (true, true) => Regime::SomeOnCache,
    }
}

/// Amplitude access used by gate kernels.
///
/// Loads and stores go through this trait so one monomorphized kernel body
/// runs against the plain state, a translated chunk view, or scratch.
pub trait AmpAccess: Sync {
    fn load(&self, index: u64) -> Amplitude;
    fn store(&self, index: u64, value: Amplitude);
}

/// One gate's inner body.
///
/// Called once per index-without-qubits value; addresses amplitudes via
/// `operands.index(v, pattern)`. For distinct `v` the addressed sets are
/// disjoint, which is what makes the parallel loop race-free.
pub trait GateKernel: Sync {
    fn apply<A: AmpAccess>(
        &self,
        amps: &A,
        index_wo_qubits: u64,
        operands: &OperandIndexer,
        thread_index: usize,
    );
}

/// Raw view over a contiguous run of amplitudes.
///
/// Shared mutably across loop threads; soundness rests on the kernel
/// contract above (disjoint writes per iteration).
pub struct DirectView {
    base: *mut Amplitude,
    len: u64,
}

unsafe impl Sync for DirectView {}

impl DirectView {
    pub(crate) fn new(slice: &mut [Amplitude]) -> DirectView {
        DirectView {
            base: slice.as_mut_ptr(),
            len: slice.len() as u64,
        }
    }
}

impl AmpAccess for DirectView {
    #[inline]
    fn load(&self, index: u64) -> Amplitude {
        debug_assert!(index < self.len);
        unsafe { *self.base.add(index as usize) }
    }

    #[inline]
    fn store(&self, index: u64, value: Amplitude) {
        debug_assert!(index < self.len);
        unsafe {
            *self.base.add(index as usize) = value;
        }
    }
}

/// View over one tag's worth of chunks, translating on-cache indices to
/// their scattered physical addresses.
struct TranslatedView<'a> {
    base: *mut Amplitude,
    len: u64,
    tag_indexer: &'a OperandIndexer,
    tag_index: u64,
    num_nontag_qubits: u32,
}

unsafe impl Sync for TranslatedView<'_> {}

impl TranslatedView<'_> {
    #[inline]
    fn translate(&self, index: u64) -> u64 {
        let chunk = index >> self.num_nontag_qubits;
        let offset = index & ((1u64 << self.num_nontag_qubits) - 1);
        (self.tag_indexer.index(self.tag_index, chunk) << self.num_nontag_qubits) | offset
    }
}

impl AmpAccess for TranslatedView<'_> {
    #[inline]
    fn load(&self, index: u64) -> Amplitude {
        let i = self.translate(index);
        debug_assert!(i < self.len);
        unsafe { *self.base.add(i as usize) }
    }

    #[inline]
    fn store(&self, index: u64, value: Amplitude) {
        let i = self.translate(index);
        debug_assert!(i < self.len);
        unsafe {
            *self.base.add(i as usize) = value;
        }
    }
}

fn run_kernel<K: GateKernel, A: AmpAccess>(
    policy: &Policy,
    amps: &A,
    operands: &OperandIndexer,
    count: u64,
    kernel: &K,
) {
    loop_n(policy, count, |v, thread_index| {
        kernel.apply(amps, v, operands, thread_index)
    });
}

/// Applies `kernel` over `state` with the operated *physical* positions
/// `operated` (operand order), routing through the regime machinery.
///
/// `scratch` must hold at least `2^C` amplitudes when the scratch strategy
/// is active; it is owned by the caller and never allocated here.
pub fn apply_gate<K: GateKernel>(
    policy: &Policy,
    tuning: &Tuning,
    state: &mut [Amplitude],
    scratch: &mut [Amplitude],
    operated: &[Qubit],
    gate: &'static str,
    kernel: &K,
) -> Result<()> {
    debug_assert!(state.len().is_power_of_two());
    let num_local_qubits = state.len().trailing_zeros();
    let num_operated = operated.len();

    if num_operated > tuning.max_operated_qubits || num_operated as u32 > num_local_qubits {
        return Err(Error::TooManyOperatedQubits {
            gate,
            requested: num_operated,
            limit: tuning.max_operated_qubits.min(num_local_qubits as usize),
        });
    }
    if let Some(q) = operated.iter().find(|q| q.index() >= num_local_qubits) {
        return Err(Error::PermutationInvariant(format!(
            "operand position {} not local to {} qubits",
            q.index(),
            num_local_qubits
        )));
    }

    let c = tuning.num_on_cache_qubits;
    match regime(tuning, num_local_qubits, operated) {
        Regime::Uncached => {
            let operands = OperandIndexer::new(operated, num_local_qubits, tuning.index_form);
            let count = (state.len() as u64) >> num_operated;
            let view = DirectView::new(state);
            run_kernel(policy, &view, &operands, count, kernel);
        }
        Regime::AllOnCache => {
            let operands = OperandIndexer::new(operated, c, tuning.index_form);
            let cache_size = 1usize << c;
            let count = (cache_size as u64) >> num_operated;
            for segment in state.chunks_exact_mut(cache_size) {
                let view = DirectView::new(segment);
                run_kernel(policy, &view, &operands, count, kernel);
            }
        }
        Regime::NoneOnCache => {
            let least_significant_chunk = c - num_operated as u32;
            run_chunked(
                policy,
                tuning,
                state,
                scratch,
                operated,
                least_significant_chunk,
                kernel,
            );
        }
        Regime::SomeOnCache => {
            let least_significant_chunk = select_chunk_boundary(c, operated)?;
            run_chunked(
                policy,
                tuning,
                state,
                scratch,
                operated,
                least_significant_chunk,
                kernel,
            );
        }
    }
    Ok(())
}

/// Picks the least significant chunk position for the straddling regime:
/// one free on-cache slot per off-cache operand, scanning downward from
/// just below the boundary and keeping operated positions inside the
/// region.
fn select_chunk_boundary(c: u32, operated: &[Qubit]) -> Result<u32> {
    let mut sorted: Vec<u32> = operated.iter().map(|q| q.index()).collect();
    sorted.sort_unstable();
    let split = sorted.partition_point(|&q| q < c);
    let on_cache = &sorted[..split];
    let num_off_cache = sorted.len() - split;

    let mut occupied = on_cache.iter().rev().peekable();
    let mut free = c as i64 - 1;
    for _ in 0..num_off_cache {
        while occupied.peek().map(|&&q| q as i64) == Some(free) {
            occupied.next();
            free -= 1;
        }
        free -= 1;
    }
    if free < -1 {
        return Err(Error::PermutationInvariant(
            "chunk selection exhausted".to_string(),
        ));
    }
    Ok((free + 1) as u32)
}

/// Shared body of the two chunked regimes. Every operand at or above
/// `least_significant_chunk` is reassigned, in operand order, to the next
/// chunk slot; its original position (shifted into tag space) drives the
/// chunk addressing.
fn run_chunked<K: GateKernel>(
    policy: &Policy,
    tuning: &Tuning,
    state: &mut [Amplitude],
    scratch: &mut [Amplitude],
    operated: &[Qubit],
    least_significant_chunk: u32,
    kernel: &K,
) {
    let num_local_qubits = state.len().trailing_zeros();
    let c = tuning.num_on_cache_qubits;
    let num_operated = operated.len();

    let num_chunk_qubits = c - least_significant_chunk;
    let num_nontag_qubits = least_significant_chunk;
    let chunk_size = 1u64 << num_nontag_qubits;
    let num_chunks = 1u64 << num_chunk_qubits;
    let num_tag_qubits = (num_local_qubits - c) + num_chunk_qubits;

    let mut tag_positions = Vec::with_capacity(num_chunk_qubits as usize);
    let mut modified_positions = Vec::with_capacity(num_operated);
    let mut next_chunk_slot = least_significant_chunk;
    for q in operated {
        if q.index() < least_significant_chunk {
            modified_positions.push(q.index());
        } else {
            tag_positions.push(q.index() - num_nontag_qubits);
            modified_positions.push(next_chunk_slot);
            next_chunk_slot += 1;
        }
    }
    debug_assert_eq!(next_chunk_slot, c);
    debug_assert_eq!(tag_positions.len() as u32, num_chunk_qubits);

    let tag_indexer =
        OperandIndexer::from_positions(&tag_positions, num_tag_qubits, tuning.index_form);
    let cache_operands =
        OperandIndexer::from_positions(&modified_positions, c, tuning.index_form);

    let inner_count = (1u64 << c) >> num_operated;
    let tag_count = 1u64 << (num_tag_qubits - num_chunk_qubits);

    match tuning.strategy {
        Strategy::Aliased => {
            let len = state.len() as u64;
            let base = state.as_mut_ptr();
            for tag_index in 0..tag_count {
                let view = TranslatedView {
                    base,
                    len,
                    tag_indexer: &tag_indexer,
                    tag_index,
                    num_nontag_qubits,
                };
                run_kernel(policy, &view, &cache_operands, inner_count, kernel);
            }
        }
        Strategy::Scratch => {
            let cache_size = 1usize << c;
            debug_assert!(scratch.len() >= cache_size);
            let scratch = &mut scratch[..cache_size];
            for tag_index in 0..tag_count {
                for chunk in 0..num_chunks {
                    let src = (tag_indexer.index(tag_index, chunk) << num_nontag_qubits) as usize;
                    let dst = (chunk << num_nontag_qubits) as usize;
                    scratch[dst..dst + chunk_size as usize]
                        .copy_from_slice(&state[src..src + chunk_size as usize]);
                }
                {
                    let view = DirectView::new(scratch);
                    run_kernel(policy, &view, &cache_operands, inner_count, kernel);
                }
                for chunk in 0..num_chunks {
                    let dst = (tag_indexer.index(tag_index, chunk) << num_nontag_qubits) as usize;
                    let src = (chunk << num_nontag_qubits) as usize;
                    state[dst..dst + chunk_size as usize]
                        .copy_from_slice(&scratch[src..src + chunk_size as usize]);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Test-only kernel: applies a dense 2^k matrix at the addressed
    /// pattern positions.
    struct DenseKernel {
        dim: usize,
        matrix: Vec<Amplitude>,
    }

    impl GateKernel for DenseKernel {
        fn apply<A: AmpAccess>(
            &self,
            amps: &A,
            v: u64,
            operands: &OperandIndexer,
            _thread_index: usize,
        ) {
            let mut input = [Complex64::ZERO; 64];
            for p in 0..self.dim {
                input[p] = amps.load(operands.index(v, p as u64));
            }
            for p in 0..self.dim {
                let mut sum = Complex64::ZERO;
                for q in 0..self.dim {
                    sum += self.matrix[p * self.dim + q] * input[q];
                }
                amps.store(operands.index(v, p as u64), sum);
            }
        }
    }

    fn random_state(num_qubits: u32, seed: u64) -> Vec<Amplitude> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..(1usize << num_qubits))
            .map(|_| Complex64::new(rng.random::<f64>() - 0.5, rng.random::<f64>() - 0.5))
            .collect()
    }

    /// Straightforward full-state reference apply.
    fn naive_apply(state: &[Amplitude], matrix: &[Amplitude], positions: &[u32]) -> Vec<Amplitude> {
        let k = positions.len();
        let dim = 1usize << k;
        let mut out = vec![Complex64::ZERO; state.len()];
        for (i, slot) in out.iter_mut().enumerate() {
            let mut row = 0usize;
            for (j, &pos) in positions.iter().enumerate() {
                row |= (((i >> pos) & 1) as usize) << j;
            }
            let mut cleared = i;
            for &pos in positions {
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
                sum += matrix[row * dim + col] * state[src];
            }
            *slot = sum;
        }
        out
    }

    fn hadamard_matrix() -> Vec<Amplitude> {
        let h = std::f64::consts::FRAC_1_SQRT_2;
        vec![
            Complex64::new(h, 0.0),
            Complex64::new(h, 0.0),
            Complex64::new(h, 0.0),
            Complex64::new(-h, 0.0),
        ]
    }

    fn cnot_matrix() -> Vec<Amplitude> {
        // operand 0 = target, operand 1 = control
        let mut m = vec![Complex64::ZERO; 16];
        m[0] = Complex64::ONE; // |c=0,t=0>
        m[4 + 1] = Complex64::ONE; // |c=0,t=1>
        m[2 * 4 + 3] = Complex64::ONE; // |c=1,t=0> <- |c=1,t=1>
        m[3 * 4 + 2] = Complex64::ONE;
        m
    }

    fn check(positions: &[u32], matrix: Vec<Amplitude>, tuning: Tuning, expected: Regime) {
        let num_qubits = 10u32;
        let state0 = random_state(num_qubits, 7);
        let reference = naive_apply(&state0, &matrix, positions);

        let operated: Vec<Qubit> = positions.iter().map(|&p| Qubit(p)).collect();
        assert_eq!(regime(&tuning, num_qubits, &operated), expected);

        let mut state = state0.clone();
        let mut scratch = vec![Complex64::ZERO; 1 << tuning.num_on_cache_qubits];
        let kernel = DenseKernel {
            dim: 1 << positions.len(),
            matrix,
        };
        apply_gate(
            &Policy::Sequential,
            &tuning,
            &mut state,
            &mut scratch,
            &operated,
            "test",
            &kernel,
        )
        .unwrap();

        for (a, b) in state.iter().zip(reference.iter()) {
            assert!((a - b).norm() < 1e-12);
        }
    }

    fn tunings() -> Vec<Tuning> {
        let mut out = Vec::new();
        for strategy in [Strategy::Aliased, Strategy::Scratch] {
            for index_form in [IndexForm::SortedSentinel, IndexForm::BitMasks] {
                out.push(Tuning {
                    num_on_cache_qubits: 4,
                    max_operated_qubits: 6,
                    index_form,
                    strategy,
                });
            }
        }
        out
    }

    #[test]
    fn all_on_cache_matches_reference() {
        for tuning in tunings() {
            check(&[0], hadamard_matrix(), tuning, Regime::AllOnCache);
            check(&[3], hadamard_matrix(), tuning, Regime::AllOnCache);
            check(&[1, 3], cnot_matrix(), tuning, Regime::AllOnCache);
        }
    }

    #[test]
    fn none_on_cache_matches_reference() {
        for tuning in tunings() {
            check(&[8], hadamard_matrix(), tuning, Regime::NoneOnCache);
            check(&[4], hadamard_matrix(), tuning, Regime::NoneOnCache);
            check(&[9, 5], cnot_matrix(), tuning, Regime::NoneOnCache);
        }
    }

    #[test]
    fn some_on_cache_matches_reference() {
        for tuning in tunings() {
            check(&[0, 9], cnot_matrix(), tuning, Regime::SomeOnCache);
            check(&[3, 4], cnot_matrix(), tuning, Regime::SomeOnCache);
            check(&[2, 7], cnot_matrix(), tuning, Regime::SomeOnCache);
        }
    }

    #[test]
    fn uncached_span_matches_reference() {
        let tuning = Tuning {
            num_on_cache_qubits: 16,
            ..Tuning::default()
        };
        check(&[0], hadamard_matrix(), tuning, Regime::Uncached);
        check(&[5, 9], cnot_matrix(), tuning, Regime::Uncached);
    }

    #[test]
    fn parallel_policy_matches_sequential() {
        let tuning = Tuning {
            num_on_cache_qubits: 4,
            ..Tuning::default()
        };
        let positions = [2u32, 8];
        let operated: Vec<Qubit> = positions.iter().map(|&p| Qubit(p)).collect();
        let matrix = cnot_matrix();
        let state0 = random_state(10, 11);

        let mut seq = state0.clone();
        let mut par = state0;
        let mut scratch = vec![Complex64::ZERO; 16];
        let kernel = DenseKernel {
            dim: 4,
            matrix,
        };
        apply_gate(
            &Policy::Sequential,
            &tuning,
            &mut seq,
            &mut scratch,
            &operated,
            "test",
            &kernel,
        )
        .unwrap();
        apply_gate(
            &Policy::parallel_with(4).unwrap(),
            &tuning,
            &mut par,
            &mut scratch,
            &operated,
            "test",
            &kernel,
        )
        .unwrap();
        for (a, b) in seq.iter().zip(par.iter()) {
            assert!((a - b).norm() < 1e-12);
        }
    }

    #[test]
    fn oversubscription_is_rejected_before_dispatch() {
        let tuning = Tuning {
            max_operated_qubits: 2,
            ..Tuning::default()
        };
        let mut state = vec![Complex64::ZERO; 1 << 5];
        state[0] = Complex64::ONE;
        let snapshot = state.clone();
        let mut scratch = vec![Complex64::ZERO; 4];
        let operated = [Qubit(0), Qubit(1), Qubit(2)];
        let kernel = DenseKernel {
            dim: 8,
            matrix: vec![Complex64::ZERO; 64],
        };
        let err = apply_gate(
            &Policy::Sequential,
            &tuning,
            &mut state,
            &mut scratch,
            &operated,
            "test",
            &kernel,
        )
        .unwrap_err();
        match err {
            Error::TooManyOperatedQubits {
                requested, limit, ..
            } => {
                assert_eq!(requested, 3);
                assert_eq!(limit, 2);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(state, snapshot);
    }

    #[test]
    fn chunk_boundary_skips_operated_positions() {
        // C = 4; operands {3, 9}: position 3 is operated, so the free slot
        // scan lands on 2 and the chunk region is [2, 4).
        assert_eq!(select_chunk_boundary(4, &[Qubit(3), Qubit(9)]).unwrap(), 2);
        // operands {0, 9}: position 3 is free.
        assert_eq!(select_chunk_boundary(4, &[Qubit(0), Qubit(9)]).unwrap(), 3);
        // two off-cache operands consume two slots.
        assert_eq!(
            select_chunk_boundary(4, &[Qubit(1), Qubit(8), Qubit(9)]).unwrap(),
            2
        );
    }
}

//! Measurement primitives over one local data block.
//!
//! The probability accumulation runs as a phased kernel: each thread sums
//! its contiguous partition, a barrier closes the phase, and one thread
//! combines the partials. Collapse and scaling are plain disjoint-write
//! loops.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::cache::{AmpAccess, DirectView};
use crate::core::index::insert_bit;
use crate::core::loops::{execute, loop_n, partition, sum_n, Policy};
use crate::maths::Amplitude;

/// Probability mass of the half of `block` where `position` carries `bit`.
pub fn probability_of_bit(policy: &Policy, block: &[Amplitude], position: u32, bit: u64) -> f64 {
    let num_pairs = (block.len() / 2) as u64;
    let partials: Vec<AtomicU64> = (0..policy.num_threads())
        .map(|_| AtomicU64::new(0))
        .collect();
    let total = AtomicU64::new(0);

    execute(policy, |phase, thread_index, num_threads| {
        let (start, end) = partition(num_pairs, num_threads, thread_index);
        let mut local = 0.0f64;
        for v in start..end {
            let loc = insert_bit(v, position, bit) as usize;
            local += block[loc].norm_sqr();
        }
        partials[thread_index].store(local.to_bits(), Ordering::SeqCst);
        phase.barrier();
        phase.single(|| {
            let sum: f64 = partials
                .iter()
                .map(|p| f64::from_bits(p.load(Ordering::SeqCst)))
                .sum();
            total.store(sum.to_bits(), Ordering::SeqCst);
        });
    });

    f64::from_bits(total.load(Ordering::SeqCst))
}

/// Zeroes the half of `block` where `position` carries the losing bit and
/// scales the kept half by `scale`.
pub fn collapse_bit(
    policy: &Policy,
    block: &mut [Amplitude],
    position: u32,
    keep_bit: u64,
    scale: f64,
) {
    let num_pairs = (block.len() / 2) as u64;
    let view = DirectView::new(block);
    loop_n(policy, num_pairs, |v, _| {
        let kept = insert_bit(v, position, keep_bit);
        let lost = insert_bit(v, position, 1 - keep_bit);
        view.store(kept, view.load(kept) * scale);
        view.store(lost, Amplitude::ZERO);
    });
}

/// Total probability mass of `block`.
pub fn norm_sqr_total(policy: &Policy, block: &[Amplitude]) -> f64 {
    sum_n(policy, block.len() as u64, |i| block[i as usize].norm_sqr())
}

/// Walks `block` accumulating probability mass until it exceeds `target`;
/// returns the hit index, or the mass consumed if the block is exhausted.
pub fn sample_in_block(block: &[Amplitude], target: f64) -> std::result::Result<usize, f64> {
    let mut consumed = 0.0f64;
    for (index, amplitude) in block.iter().enumerate() {
        consumed += amplitude.norm_sqr();
        if consumed > target {
            return Ok(index);
        }
    }
    Err(consumed)
}

/// Per-qubit spin sums over the pairs split at `position`:
/// (Re Σ conj(a0) a1, Im Σ conj(a0) a1, Σ (|a0|² − |a1|²)).
pub fn spin_sums(policy: &Policy, block: &[Amplitude], position: u32) -> (f64, f64, f64) {
    let num_pairs = (block.len() / 2) as u64;
    let cross_re = sum_n(policy, num_pairs, |v| {
        let a0 = block[insert_bit(v, position, 0) as usize];
        let a1 = block[insert_bit(v, position, 1) as usize];
        (a0.conj() * a1).re
    });
    let cross_im = sum_n(policy, num_pairs, |v| {
        let a0 = block[insert_bit(v, position, 0) as usize];
        let a1 = block[insert_bit(v, position, 1) as usize];
        (a0.conj() * a1).im
    });
    let z = sum_n(policy, num_pairs, |v| {
        let a0 = block[insert_bit(v, position, 0) as usize];
        let a1 = block[insert_bit(v, position, 1) as usize];
        a0.norm_sqr() - a1.norm_sqr()
    });
    (cross_re, cross_im, z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    fn plus_state() -> Vec<Amplitude> {
        let h = std::f64::consts::FRAC_1_SQRT_2;
        vec![Complex64::new(h, 0.0), Complex64::new(h, 0.0)]
    }

    #[test]
    fn probability_splits_halves() {
        // |10>: qubit 1 set, qubit 0 clear.
        let mut block = vec![Complex64::ZERO; 4];
        block[2] = Complex64::ONE;
        let policy = Policy::Sequential;
        assert_eq!(probability_of_bit(&policy, &block, 1, 1), 1.0);
        assert_eq!(probability_of_bit(&policy, &block, 1, 0), 0.0);
        assert_eq!(probability_of_bit(&policy, &block, 0, 1), 0.0);
    }

    #[test]
    fn probability_parallel_matches_sequential() {
        let block: Vec<Amplitude> = (0..64)
            .map(|i| Complex64::new((i as f64 * 0.37).sin(), (i as f64 * 0.11).cos()))
            .collect();
        let parallel = Policy::parallel_with(3).unwrap();
        let a = probability_of_bit(&Policy::Sequential, &block, 3, 1);
        let b = probability_of_bit(&parallel, &block, 3, 1);
        assert!((a - b).abs() < 1e-10);
    }

    #[test]
    fn collapse_keeps_and_rescales() {
        let mut block = plus_state();
        collapse_bit(&Policy::Sequential, &mut block, 0, 1, std::f64::consts::SQRT_2);
        assert!((block[0].norm()) < 1e-12);
        assert!((block[1].re - 1.0).abs() < 1e-12);
    }

    #[test]
    fn sampling_walks_cumulative_mass() {
        let h = 0.5f64.sqrt();
        let block = vec![
            Complex64::new(h, 0.0),
            Complex64::ZERO,
            Complex64::ZERO,
            Complex64::new(h, 0.0),
        ];
        assert_eq!(sample_in_block(&block, 0.25), Ok(0));
        assert_eq!(sample_in_block(&block, 0.75), Ok(3));
        match sample_in_block(&block, 1.5) {
            Err(mass) => assert!((mass - 1.0).abs() < 1e-12),
            Ok(i) => panic!("unexpected hit {}", i),
        }
    }

    #[test]
    fn spin_sums_of_plus_state_point_along_x() {
        let block = plus_state();
        let (re, im, z) = spin_sums(&Policy::Sequential, &block, 0);
        assert!((re - 0.5).abs() < 1e-12);
        assert!(im.abs() < 1e-12);
        assert!(z.abs() < 1e-12);
    }
}

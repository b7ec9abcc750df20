//! Parallel loop engine.
//!
//! `loop_n` partitions `[0, n)` into contiguous per-thread sub-ranges and
//! calls `body(i, thread_id)` for each index, ascending within a thread.
//! `execute` runs one closure on every thread of the pool and hands it a
//! [`Phase`] for barrier / single-thread synchronization, for kernels that
//! need phased work. A panic inside a body is re-raised at join.

use std::sync::{Arc, Barrier};

use rayon::ThreadPool;
use rayon::ThreadPoolBuilder;

use crate::core::error::Error;

/// Execution policy for the loop engine.
///
/// The parallel policy owns a dedicated thread pool so the phased
/// `execute` protocol always has exactly `num_threads` participants.
#[derive(Clone)]
pub enum Policy {
    Sequential,
    Parallel(Arc<ThreadPool>),
}

fn hardware_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Policy {
    pub fn sequential() -> Policy {
        Policy::Sequential
    }

    /// Parallel policy with one thread per hardware thread.
    pub fn parallel() -> Result<Policy, Error> {
        Self::parallel_with(hardware_threads())
    }

    /// Parallel policy with a requested thread count, clamped to
    /// `[1, hardware threads]`.
    pub fn parallel_with(num_threads: usize) -> Result<Policy, Error> {
        let num_threads = num_threads.clamp(1, hardware_threads());
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| Error::InvalidConfiguration(format!("thread pool: {}", e)))?;
        Ok(Policy::Parallel(Arc::new(pool)))
    }

    pub fn num_threads(&self) -> usize {
        match self {
            Policy::Sequential => 1,
            Policy::Parallel(pool) => pool.current_num_threads(),
        }
    }
}

/// The contiguous sub-range of `[0, n)` owned by `thread_index`.
#[inline]
pub fn partition(n: u64, num_threads: usize, thread_index: usize) -> (u64, u64) {
    let t = num_threads as u128;
    let start = (n as u128 * thread_index as u128 / t) as u64;
    let end = (n as u128 * (thread_index as u128 + 1) / t) as u64;
    (start, end)
}

pub fn loop_n<F>(policy: &Policy, n: u64, body: F)
where
    F: Fn(u64, usize) + Sync,
{
    match policy {
        Policy::Sequential => {
            for i in 0..n {
                body(i, 0);
            }
        }
        Policy::Parallel(pool) => {
            let num_threads = pool.current_num_threads();
            pool.broadcast(|ctx| {
                let (start, end) = partition(n, num_threads, ctx.index());
                for i in start..end {
                    body(i, ctx.index());
                }
            });
        }
    }
}

/// Synchronization handle passed to phased kernels.
pub struct Phase<'a> {
    barrier: &'a Barrier,
}

impl Phase<'_> {
    /// Releases after the last thread arrives.
    pub fn barrier(&self) {
        self.barrier.wait();
    }

    /// Runs `f` on exactly one thread; every other thread waits for it.
    pub fn single<G: Fn()>(&self, f: G) {
        if self.barrier.wait().is_leader() {
            f();
        }
        self.barrier.wait();
    }
}

/// Runs `f(phase, thread_id, num_threads)` on every thread of the policy.
///
/// Bodies must keep barrier arrivals balanced across threads; the engine
/// provides no cancellation.
pub fn execute<F>(policy: &Policy, f: F)
where
    F: Fn(&Phase, usize, usize) + Sync,
{
    match policy {
        Policy::Sequential => {
            let barrier = Barrier::new(1);
            f(&Phase { barrier: &barrier }, 0, 1);
        }
        Policy::Parallel(pool) => {
            let num_threads = pool.current_num_threads();
            let barrier = Barrier::new(num_threads);
            pool.broadcast(|ctx| {
                f(&Phase { barrier: &barrier }, ctx.index(), num_threads);
            });
        }
    }
}

/// Parallel sum of `f(i)` over `[0, n)`.
pub fn sum_n<F>(policy: &Policy, n: u64, f: F) -> f64
where
    F: Fn(u64) -> f64 + Sync + Send,
{
    match policy {
        Policy::Sequential => (0..n).map(f).sum(),
        Policy::Parallel(pool) => pool.install(|| {
            use rayon::prelude::*;
            (0..n).into_par_iter().map(f).sum()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    #[test]
    fn partition_covers_range() {
        for n in [0u64, 1, 7, 64, 1000] {
            for threads in [1usize, 2, 3, 8] {
                let mut total = 0;
                let mut prev_end = 0;
                for t in 0..threads {
                    let (start, end) = partition(n, threads, t);
                    assert_eq!(start, prev_end);
                    total += end - start;
                    prev_end = end;
                }
                assert_eq!(prev_end, n);
                assert_eq!(total, n);
            }
        }
    }

    #[test]
    fn sequential_runs_inline_with_thread_zero() {
        let seen = std::sync::Mutex::new(Vec::new());
        loop_n(&Policy::Sequential, 5, |i, tid| {
            assert_eq!(tid, 0);
            seen.lock().unwrap().push(i);
        });
        assert_eq!(seen.into_inner().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn parallel_visits_every_index_once() {
        let policy = Policy::parallel_with(4).unwrap();
        let n = 1000u64;
        let sum = AtomicU64::new(0);
        let count = AtomicUsize::new(0);
        loop_n(&policy, n, |i, _| {
            sum.fetch_add(i, Ordering::Relaxed);
            count.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(count.load(Ordering::Relaxed), n as usize);
        assert_eq!(sum.load(Ordering::Relaxed), n * (n - 1) / 2);
    }

    #[test]
    fn thread_count_is_clamped() {
        let policy = Policy::parallel_with(0).unwrap();
        assert_eq!(policy.num_threads(), 1);
        let policy = Policy::parallel_with(1_000_000).unwrap();
        assert!(policy.num_threads() <= 1_000_000);
        assert!(policy.num_threads() >= 1);
    }

    #[test]
    fn single_runs_once_with_all_threads_waiting() {
        let policy = Policy::parallel_with(4).unwrap();
        let ran = AtomicUsize::new(0);
        let after = AtomicUsize::new(0);
        execute(&policy, |phase, _, _| {
            phase.single(|| {
                ran.fetch_add(1, Ordering::SeqCst);
            });
            // Everyone observes the single block's effect.
            assert_eq!(ran.load(Ordering::SeqCst), 1);
            after.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(after.load(Ordering::SeqCst), policy.num_threads());
    }

    #[test]
    fn phased_sum_matches_serial() {
        let policy = Policy::parallel_with(3).unwrap();
        let n = 300u64;
        let data: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let partials: Vec<AtomicU64> = (0..policy.num_threads())
            .map(|_| AtomicU64::new(0))
            .collect();
        let total = AtomicU64::new(0);
        execute(&policy, |phase, tid, threads| {
            let (start, end) = partition(n, threads, tid);
            let local: f64 = data[start as usize..end as usize].iter().sum();
            partials[tid].store(local.to_bits(), Ordering::SeqCst);
            phase.barrier();
            phase.single(|| {
                let sum: f64 = partials
                    .iter()
                    .map(|p| f64::from_bits(p.load(Ordering::SeqCst)))
                    .sum();
                total.store(sum.to_bits(), Ordering::SeqCst);
            });
        });
        let expected: f64 = (0..n).map(|i| i as f64).sum();
        assert_eq!(f64::from_bits(total.load(Ordering::SeqCst)), expected);
    }

    #[test]
    fn panic_in_body_reaches_join() {
        let policy = Policy::parallel_with(2).unwrap();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            loop_n(&policy, 16, |i, _| {
                if i == 7 {
                    panic!("kernel failure");
                }
            });
        }));
        assert!(result.is_err());
    }

    #[test]
    fn sum_n_agrees_across_policies() {
        let policy = Policy::parallel_with(4).unwrap();
        let serial = sum_n(&Policy::Sequential, 512, |i| (i as f64).sqrt());
        let parallel = sum_n(&policy, 512, |i| (i as f64).sqrt());
        assert!((serial - parallel).abs() < 1e-9);
    }
}

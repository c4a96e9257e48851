//! Parallel segmented sieve.
//!
//! Small primes up to √n come from the scalar sieve. The odd integers of
//! `(√n, n]` are split into fixed-size segments; a pool of scoped workers pull
//! segment indices from a shared atomic cursor, sieve each segment in a
//! worker-owned buffer and keep the survivors in a worker-owned vector. Once
//! every worker has joined, the vectors are concatenated with the small primes
//! and sorted once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ScopedJoinHandle};

use tracing::{debug, trace};

use crate::bitfield;
use crate::capability::CapabilitySnapshot;
use crate::config::EngineConfig;
use crate::error::{self, Result, SieveError};
use crate::scalar::ScalarBitSieve;
use crate::vector::VectorSieve;

/// Odd-only layout of the range above √n.
#[derive(Debug, Clone, Copy)]
struct SegmentPlan {
    /// First odd integer above √n.
    low: u64,
    n: u64,
    /// Odd numbers per segment.
    segment_bits: u64,
    /// Odd numbers in `[low, n]`.
    odd_count: u64,
    segments: usize,
}

impl SegmentPlan {
    fn new(n: u64, sqrt_n: u64, segment_bits: u64) -> Result<Self> {
        let low = (sqrt_n + 1) | 1;
        let odd_count = if n >= low { (n - low) / 2 + 1 } else { 0 };
        let segments = error::to_usize(odd_count.div_ceil(segment_bits), "segment table", 1)?;
        Ok(Self {
            low,
            n,
            segment_bits,
            odd_count,
            segments,
        })
    }

    /// Words a worker buffer needs: one full segment, or the whole range when
    /// that is shorter.
    fn buffer_words(&self) -> usize {
        (self.segment_bits.min(self.odd_count) as usize).div_ceil(64)
    }

    /// Inclusive odd bounds of segment `idx`.
    fn bounds(&self, idx: usize) -> (u64, u64) {
        let seg_low = self.low + 2 * idx as u64 * self.segment_bits;
        let seg_high = seg_low
            .saturating_add(2 * (self.segment_bits - 1))
            .min(self.n);
        (seg_low, seg_high)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SegmentedParallelSieve {
    caps: CapabilitySnapshot,
    config: EngineConfig,
}

impl SegmentedParallelSieve {
    pub fn new(caps: &CapabilitySnapshot, config: &EngineConfig) -> Self {
        Self {
            caps: *caps,
            config: *config,
        }
    }

    /// Workers requested before clamping to the segment count.
    pub fn workers(&self) -> usize {
        self.config.workers.unwrap_or(self.caps.cores).max(1)
    }

    /// Ascending primes `<= n`. Bounds below the parallel threshold go to a
    /// flat single-threaded sieve.
    pub fn sieve(&self, n: u64) -> Result<Vec<u64>> {
        if n < self.config.parallel_threshold {
            debug!(n, threshold = self.config.parallel_threshold, "below parallel threshold, delegating");
            return if VectorSieve::supports(&self.caps) {
                VectorSieve::new(&self.caps).sieve(n)
            } else {
                ScalarBitSieve::new().sieve(n)
            };
        }
        self.sieve_with_workers(n, self.workers())
    }

    /// Always take the segmented path, with at most `workers` threads.
    pub fn sieve_with_workers(&self, n: u64, workers: usize) -> Result<Vec<u64>> {
        if n < 2 {
            return Ok(Vec::new());
        }

        let sqrt_n = n.isqrt();
        let small_primes = ScalarBitSieve::new().sieve(sqrt_n)?;
        let plan = SegmentPlan::new(n, sqrt_n, self.config.segment_bits())?;
        let workers = workers.min(plan.segments).max(1);

        debug!(n, segments = plan.segments, workers, small_primes = small_primes.len(), "segmented sieve");

        let cursor = AtomicUsize::new(0);
        let sieving_primes = small_primes.get(1..).unwrap_or(&[]);

        let worker_results = thread::scope(|scope| -> Result<Vec<Vec<u64>>> {
            let mut handles = Vec::with_capacity(workers);
            for worker in 0..workers {
                let cursor = &cursor;
                let handle = thread::Builder::new()
                    .name(format!("sieve-worker-{worker}"))
                    .spawn_scoped(scope, move || run_worker(worker, &plan, sieving_primes, cursor))
                    .map_err(|_| SieveError::Allocation {
                        what: "worker stack",
                        bytes: 0,
                    })?;
                handles.push(handle);
            }

            let mut results = Vec::with_capacity(handles.len());
            for (worker, handle) in handles.into_iter().enumerate() {
                results.push(join_worker(worker, handle)?);
            }
            Ok(results)
        })?;

        // 2 lies above √n only when n < 4
        let two = usize::from(sqrt_n < 2);
        let total = two + small_primes.len() + worker_results.iter().map(Vec::len).sum::<usize>();
        let mut all_primes = Vec::new();
        error::try_reserve(&mut all_primes, total, "merged result")?;
        if two == 1 {
            all_primes.push(2);
        }
        all_primes.extend_from_slice(&small_primes);
        for primes in worker_results {
            all_primes.extend(primes);
        }

        // Segments are claimed in scheduling order, so sort once globally
        all_primes.sort_unstable();
        Ok(all_primes)
    }
}

/// Wait for `worker`, reporting a panic as [`SieveError::WorkerPanicked`].
fn join_worker<T>(worker: usize, handle: ScopedJoinHandle<'_, Result<T>>) -> Result<T> {
    handle
        .join()
        .map_err(|_| SieveError::WorkerPanicked { worker })?
}

/// Claim segments until the cursor runs past the end; return this worker's
/// survivors (ascending within each segment, not across segments).
fn run_worker(
    worker: usize,
    plan: &SegmentPlan,
    sieving_primes: &[u64],
    cursor: &AtomicUsize,
) -> Result<Vec<u64>> {
    let mut segment = error::alloc_words(plan.buffer_words(), !0_u64, "segment buffer")?;
    let mut local_primes = Vec::new();

    loop {
        let segment_idx = cursor.fetch_add(1, Ordering::Relaxed);
        if segment_idx >= plan.segments {
            break;
        }
        let (seg_low, seg_high) = plan.bounds(segment_idx);
        trace!(worker, segment_idx, seg_low, seg_high, "claimed segment");

        let seg_bits = ((seg_high - seg_low) / 2 + 1) as usize;
        let words_needed = seg_bits.div_ceil(64);
        let words = &mut segment[..words_needed];

        // Reinitialize segment (all bits to 1 = prime)
        words.fill(!0_u64);

        for &p in sieving_primes {
            // First odd multiple of p in [seg_low, seg_high], but never below p*p
            let mut start = seg_low.div_ceil(p) * p;
            if start % 2 == 0 {
                start += p;
            }
            let start = start.max(p * p);
            if start > seg_high {
                continue;
            }
            let idx = ((start - seg_low) / 2) as usize;
            bitfield::clear_stride(words, idx, p as usize, seg_bits);
        }

        // Mask bits past seg_high in the last word
        let tail = seg_bits & 63;
        if tail != 0 {
            words[words_needed - 1] &= (1_u64 << tail) - 1;
        }

        let found: usize = words.iter().map(|w| w.count_ones() as usize).sum();
        error::try_reserve(&mut local_primes, found, "worker result buffer")?;
        for (word_idx, &word) in words.iter().enumerate() {
            let mut w = word;
            while w != 0 {
                let bit_idx = w.trailing_zeros() as u64;
                let idx = (word_idx as u64) * 64 + bit_idx;
                local_primes.push(seg_low + idx * 2);
                w &= w - 1; // Clear lowest set bit
            }
        }
    }

    Ok(local_primes)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tiny segments and no delegation, so small bounds exercise many segments.
    fn small_segments() -> EngineConfig {
        EngineConfig {
            segment_bytes: 64,
            parallel_threshold: 0,
            ..EngineConfig::default()
        }
    }

    fn sieve(workers: usize) -> SegmentedParallelSieve {
        let caps = CapabilitySnapshot {
            cores: workers,
            ..CapabilitySnapshot::baseline()
        };
        SegmentedParallelSieve::new(&caps, &small_segments())
    }

    #[test]
    fn test_segmented_edge_cases() {
        let s = sieve(4);
        assert_eq!(s.sieve(0).unwrap(), Vec::<u64>::new());
        assert_eq!(s.sieve(1).unwrap(), Vec::<u64>::new());
        assert_eq!(s.sieve(2).unwrap(), vec![2]);
        assert_eq!(s.sieve(3).unwrap(), vec![2, 3]);
        assert_eq!(s.sieve(4).unwrap(), vec![2, 3]);
        assert_eq!(s.sieve(10).unwrap(), vec![2, 3, 5, 7]);
    }

    #[test]
    fn test_segmented_known_counts() {
        let s = sieve(3);
        assert_eq!(s.sieve(100).unwrap().len(), 25);
        assert_eq!(s.sieve(1_000).unwrap().len(), 168);
        assert_eq!(s.sieve(100_000).unwrap().len(), 9_592);
    }

    #[test]
    fn test_matches_flat() {
        let flat = ScalarBitSieve::new();
        let seg = sieve(4);
        for n in (0..2_000).chain([9_999, 10_000, 65_537, 262_143]) {
            assert_eq!(seg.sieve(n).unwrap(), flat.sieve(n).unwrap(), "Mismatch at n={n}");
        }
    }

    #[test]
    fn test_segment_boundaries() {
        // one segment = 512 odd numbers; while isqrt(n) == 1000 segments start
        // at 1001 + 1024k, and k = 977 starts at 1_001_449
        let flat = ScalarBitSieve::new();
        let seg = sieve(2);
        for n in [1_000_000_u64, 1_001_447, 1_001_448, 1_001_449, 1_001_450, 1_002_000] {
            assert_eq!(n.isqrt(), 1_000);
            assert_eq!(seg.sieve(n).unwrap(), flat.sieve(n).unwrap(), "Mismatch at n={n}");
        }
    }

    #[test]
    fn more_workers_than_segments() {
        let seg = sieve(64);
        assert_eq!(seg.sieve_with_workers(200, 64).unwrap().len(), 46);
    }

    #[test]
    fn delegates_below_threshold() {
        let config = EngineConfig::default();
        let s = SegmentedParallelSieve::new(&CapabilitySnapshot::baseline(), &config);
        assert_eq!(s.sieve(1_000).unwrap().len(), 168);
    }

    #[test]
    fn plan_covers_odds_above_sqrt() {
        let plan = SegmentPlan::new(1_000, 31, 64).unwrap();
        assert_eq!(plan.low, 33);
        // 33..=999 holds 484 odd numbers -> 8 segments of 64
        assert_eq!(plan.segments, 8);
        assert_eq!(plan.bounds(0), (33, 159));
        assert_eq!(plan.bounds(7), (929, 999));
        assert_eq!(plan.buffer_words(), 1);
    }

    #[test]
    fn buffer_shrinks_to_short_ranges() {
        // 33..=999 is 484 odd numbers, well under one 2^20-bit segment
        let plan = SegmentPlan::new(1_000, 31, 1 << 20).unwrap();
        assert_eq!(plan.segments, 1);
        assert_eq!(plan.buffer_words(), 8);
    }

    #[test]
    fn oversized_segment_config_is_clamped() {
        let config = EngineConfig {
            segment_bytes: usize::MAX,
            parallel_threshold: 0,
            ..EngineConfig::default()
        };
        let s = SegmentedParallelSieve::new(&CapabilitySnapshot::baseline(), &config);
        assert_eq!(s.sieve(1_000).unwrap().len(), 168);
        assert_eq!(s.sieve_with_workers(100_000, 4).unwrap().len(), 9_592);
    }

    #[test]
    fn panicking_worker_is_reported() {
        let outcome = thread::scope(|scope| {
            let handle = scope.spawn(|| -> Result<Vec<u64>> { panic!("segment worker died") });
            join_worker(3, handle)
        });
        assert!(matches!(outcome, Err(SieveError::WorkerPanicked { worker: 3 })));
    }

    #[test]
    fn worker_result_passes_through_join() {
        let outcome = thread::scope(|scope| {
            let handle = scope.spawn(|| -> Result<Vec<u64>> { Ok(vec![5, 7]) });
            join_worker(0, handle)
        });
        assert_eq!(outcome.unwrap(), vec![5, 7]);
    }

    #[test]
    fn zero_workers_still_runs() {
        assert_eq!(sieve(1).sieve_with_workers(1_000, 0).unwrap().len(), 168);
    }
}

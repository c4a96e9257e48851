//! Vector-width bit sieve.
//!
//! Same algorithm as [`ScalarBitSieve`](crate::scalar::ScalarBitSieve). For
//! stepping primes small enough to hit a register-sized block more than once,
//! the composite bits of a block are gathered into a `[u64; LANES]` mask and
//! cleared with one and-not across the whole block. The resulting field is
//! word-for-word identical to the scalar one.
//!
//! The AVX2 kernel is the same 4-lane block code compiled with
//! `target_feature(enable = "avx2")`. The mask is still built one bit at a
//! time, so only the final and-not can use 256-bit instructions; the kernel is
//! mostly a codegen hint.

use crate::bitfield::{self, BitField};
use crate::capability::CapabilitySnapshot;
use crate::error::Result;

/// Smallest register width this strategy is worth selecting for.
pub const MIN_VECTOR_BITS: u32 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kernel {
    Lanes2,
    Lanes4,
    Lanes8,
    #[cfg(target_arch = "x86_64")]
    Avx2,
}

impl Kernel {
    fn lanes(self) -> usize {
        match self {
            Kernel::Lanes2 => 2,
            Kernel::Lanes4 => 4,
            Kernel::Lanes8 => 8,
            #[cfg(target_arch = "x86_64")]
            Kernel::Avx2 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VectorSieve {
    kernel: Kernel,
}

impl VectorSieve {
    /// Whether the snapshot reports a register wide enough for this strategy.
    pub fn supports(caps: &CapabilitySnapshot) -> bool {
        caps.vector_bits >= MIN_VECTOR_BITS
    }

    /// Build a sieve sized to the snapshot's vector width. An unsupported
    /// snapshot still gets a correct (two-lane, portable) kernel.
    pub fn new(caps: &CapabilitySnapshot) -> Self {
        let kernel = match caps.vector_lanes() {
            0..=3 => Kernel::Lanes2,
            4..=7 => Self::four_lane_kernel(),
            _ => Kernel::Lanes8,
        };
        Self { kernel }
    }

    #[cfg(target_arch = "x86_64")]
    fn four_lane_kernel() -> Kernel {
        if is_x86_feature_detected!("avx2") {
            Kernel::Avx2
        } else {
            Kernel::Lanes4
        }
    }

    #[cfg(not(target_arch = "x86_64"))]
    fn four_lane_kernel() -> Kernel {
        Kernel::Lanes4
    }

    /// 64-bit lanes cleared per block.
    pub fn lanes(&self) -> usize {
        self.kernel.lanes()
    }

    /// Ascending primes `<= n`.
    pub fn sieve(&self, n: u64) -> Result<Vec<u64>> {
        if n < 2 {
            return Ok(Vec::new());
        }
        if n == 2 {
            return Ok(vec![2]);
        }
        self.sieve_field(n)?.primes_skipping(self.lanes())
    }

    /// The field after sieving; equal to `ScalarBitSieve::sieve_field(n)`.
    pub fn sieve_field(&self, n: u64) -> Result<BitField> {
        let mut field = BitField::for_bound(n)?;
        if field.is_empty() {
            return Ok(field);
        }
        field.clear(0);

        let end = field.len();
        let block_bits = self.lanes() * 64;
        let words = field.words_mut();
        let sqrt_n = n.isqrt() as usize;

        for p in (3..=sqrt_n).step_by(2) {
            if !bitfield::get_bit(words, p / 2) {
                continue;
            }
            let start = p * p / 2;
            if p < block_bits {
                self.clear_blocks(words, start, p, end);
            } else {
                bitfield::clear_stride(words, start, p, end);
            }
        }

        Ok(field)
    }

    fn clear_blocks(&self, words: &mut [u64], start: usize, step: usize, end: usize) {
        match self.kernel {
            Kernel::Lanes2 => clear_blocks::<2>(words, start, step, end),
            Kernel::Lanes4 => clear_blocks::<4>(words, start, step, end),
            Kernel::Lanes8 => clear_blocks::<8>(words, start, step, end),
            #[cfg(target_arch = "x86_64")]
            // SAFETY: Kernel::Avx2 is only built after is_x86_feature_detected!("avx2").
            Kernel::Avx2 => unsafe { clear_blocks_avx2(words, start, step, end) },
        }
    }
}

/// Clear bits `start, start + step, ...` below `end`, one `LANES * 64`-bit
/// block at a time.
#[inline(always)]
fn clear_blocks<const LANES: usize>(words: &mut [u64], start: usize, step: usize, end: usize) {
    let block_bits = LANES * 64;
    let mut j = start;
    while j < end {
        let block = j / block_bits;
        let base = block * block_bits;
        let limit = (base + block_bits).min(end);

        let mut mask = [0_u64; LANES];
        while j < limit {
            let local = j - base;
            mask[local >> 6] |= 1_u64 << (local & 63);
            j += step;
        }

        let first = block * LANES;
        let last = (first + LANES).min(words.len());
        for (w, m) in words[first..last].iter_mut().zip(mask) {
            *w &= !m;
        }
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn clear_blocks_avx2(words: &mut [u64], start: usize, step: usize, end: usize) {
    clear_blocks::<4>(words, start, step, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::ScalarBitSieve;

    fn snapshot(vector_bits: u32) -> CapabilitySnapshot {
        CapabilitySnapshot {
            vector_bits,
            ..CapabilitySnapshot::baseline()
        }
    }

    #[test]
    fn lanes_follow_snapshot_width() {
        assert_eq!(VectorSieve::new(&snapshot(128)).lanes(), 2);
        assert_eq!(VectorSieve::new(&snapshot(256)).lanes(), 4);
        assert_eq!(VectorSieve::new(&snapshot(512)).lanes(), 8);
        assert_eq!(VectorSieve::new(&snapshot(0)).lanes(), 2);
    }

    #[test]
    fn supports_requires_128_bits() {
        assert!(!VectorSieve::supports(&snapshot(0)));
        assert!(VectorSieve::supports(&snapshot(128)));
        assert!(VectorSieve::supports(&snapshot(512)));
    }

    #[test]
    fn test_edge_cases() {
        let v = VectorSieve::new(&snapshot(256));
        assert_eq!(v.sieve(0).unwrap(), Vec::<u64>::new());
        assert_eq!(v.sieve(1).unwrap(), Vec::<u64>::new());
        assert_eq!(v.sieve(2).unwrap(), vec![2]);
        assert_eq!(v.sieve(3).unwrap(), vec![2, 3]);
        assert_eq!(v.sieve(10).unwrap(), vec![2, 3, 5, 7]);
    }

    #[test]
    fn fields_match_scalar_bit_for_bit() {
        let scalar = ScalarBitSieve::new();
        for bits in [128, 256, 512] {
            let vector = VectorSieve::new(&snapshot(bits));
            for n in [3, 64, 127, 128, 129, 1_000, 4_097, 65_536, 100_003, 1_000_000] {
                assert_eq!(
                    vector.sieve_field(n).unwrap(),
                    scalar.sieve_field(n).unwrap(),
                    "Field mismatch at n={n} with {bits}-bit vectors"
                );
            }
        }
    }

    #[test]
    fn block_clear_matches_bitwise_clear() {
        for step in [1, 3, 7, 31, 63, 64, 127, 255] {
            let mut expected = vec![!0_u64; 20];
            bitfield::clear_stride(&mut expected, 5, step, 1_250);
            let mut two = vec![!0_u64; 20];
            clear_blocks::<2>(&mut two, 5, step, 1_250);
            let mut eight = vec![!0_u64; 20];
            clear_blocks::<8>(&mut eight, 5, step, 1_250);
            assert_eq!(two, expected, "step={step}");
            assert_eq!(eight, expected, "step={step}");
        }
    }

    #[test]
    fn known_counts() {
        let v = VectorSieve::new(&snapshot(256));
        assert_eq!(v.sieve(1_000).unwrap().len(), 168);
        assert_eq!(v.sieve(100_000).unwrap().len(), 9_592);
    }
}

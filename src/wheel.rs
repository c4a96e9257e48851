//! Mod-30 wheel sieve.
//!
//! Tracks only integers coprime to 30 = 2·3·5, eight residues per block of 30
//! packed into one byte: 8 bits per 30 integers instead of the 15 an odd-only
//! field needs. Composites are struck as `p·k` where `k` walks the wheel, so
//! multiples divisible by 2, 3 or 5 are never visited.

use crate::error::{self, Result, SieveError};

/// Residues coprime to 30; bit `i` of a block byte stands for `30·block + RESIDUES[i]`.
const RESIDUES: [u64; 8] = [1, 7, 11, 13, 17, 19, 23, 29];

/// Map residue → bit in the block byte (255 for residues sharing a factor with 30).
const RES_TO_BIT: [u8; 30] = [
    255, 0, 255, 255, 255, 255, 255, 1, 255, 255, 255, 2, 255, 3, 255, 255, 255, 4, 255, 5, 255,
    255, 255, 6, 255, 255, 255, 255, 255, 7,
];

/// Distance from `RESIDUES[i]` to the next wheel number.
const GAPS: [u64; 8] = [6, 4, 2, 4, 2, 4, 6, 2];

const WHEEL_PRIMES: [u64; 3] = [2, 3, 5];

#[derive(Debug, Clone, Copy, Default)]
pub struct WheelSieve;

impl WheelSieve {
    pub fn new() -> Self {
        Self
    }

    /// Ascending primes `<= n`.
    pub fn sieve(&self, n: u64) -> Result<Vec<u64>> {
        if n < 2 {
            return Ok(Vec::new());
        }

        let blocks = error::to_usize(n / 30 + 1, "wheel field", 1)?;
        let mut wheel = Vec::new();
        wheel
            .try_reserve_exact(blocks)
            .map_err(|_| SieveError::Allocation {
                what: "wheel field",
                bytes: blocks as u128,
            })?;
        wheel.resize(blocks, 0xFF_u8);

        // 1 is not prime
        wheel[0] &= !1;

        // Drop residues past n in the last block
        let last = blocks - 1;
        for (bit, &r) in RESIDUES.iter().enumerate() {
            if 30 * last as u64 + r > n {
                wheel[last] &= !(1 << bit);
            }
        }

        let sqrt_n = n.isqrt();
        'outer: for block in 0..=(sqrt_n / 30) as usize {
            for (bit, &r) in RESIDUES.iter().enumerate() {
                let p = 30 * block as u64 + r;
                if p > sqrt_n {
                    break 'outer;
                }
                if wheel[block] & (1 << bit) == 0 {
                    continue; // already marked composite
                }
                // k starts at p and walks the wheel; p·k is coprime to 30
                let mut k = p;
                let mut gap = bit;
                while let Some(m) = p.checked_mul(k).filter(|&m| m <= n) {
                    wheel[(m / 30) as usize] &= !(1 << RES_TO_BIT[(m % 30) as usize]);
                    k += GAPS[gap];
                    gap = (gap + 1) & 7;
                }
            }
        }

        let mut primes = Vec::new();
        error::try_reserve(&mut primes, crate::bitfield::prime_count_upper(n), "result buffer")?;
        primes.extend(WHEEL_PRIMES.iter().copied().filter(|&p| p <= n));
        for (block, &byte) in wheel.iter().enumerate() {
            let mut b = byte;
            while b != 0 {
                let bit = b.trailing_zeros() as usize;
                primes.push(30 * block as u64 + RESIDUES[bit]);
                b &= b - 1;
            }
        }
        Ok(primes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::ScalarBitSieve;

    #[test]
    fn test_wheel_small_limits() {
        let w = WheelSieve::new();
        assert_eq!(w.sieve(0).unwrap(), Vec::<u64>::new());
        assert_eq!(w.sieve(1).unwrap(), Vec::<u64>::new());
        assert_eq!(w.sieve(2).unwrap(), vec![2]);
        assert_eq!(w.sieve(3).unwrap(), vec![2, 3]);
        assert_eq!(w.sieve(4).unwrap(), vec![2, 3]);
        assert_eq!(w.sieve(5).unwrap(), vec![2, 3, 5]);
        assert_eq!(w.sieve(6).unwrap(), vec![2, 3, 5]);
        assert_eq!(w.sieve(7).unwrap(), vec![2, 3, 5, 7]);
        assert_eq!(w.sieve(10).unwrap(), vec![2, 3, 5, 7]);
    }

    #[test]
    fn test_wheel_boundary_around_30() {
        let w = WheelSieve::new();
        assert_eq!(w.sieve(29).unwrap().last(), Some(&29));
        assert_eq!(w.sieve(30).unwrap().last(), Some(&29));
        assert_eq!(w.sieve(31).unwrap().last(), Some(&31));
        assert_eq!(w.sieve(49).unwrap().last(), Some(&47));
    }

    #[test]
    fn test_wheel_known_counts() {
        let w = WheelSieve::new();
        assert_eq!(w.sieve(100).unwrap().len(), 25);
        assert_eq!(w.sieve(1_000).unwrap().len(), 168);
        assert_eq!(w.sieve(100_000).unwrap().len(), 9_592);
        assert_eq!(w.sieve(1_000_000).unwrap().len(), 78_498);
    }

    #[test]
    fn test_wheel_matches_bit_sieve() {
        let w = WheelSieve::new();
        let s = ScalarBitSieve::new();
        for n in 0..1_500 {
            assert_eq!(w.sieve(n).unwrap(), s.sieve(n).unwrap(), "Mismatch at n={n}");
        }
    }

    #[test]
    fn gaps_walk_the_residues() {
        let mut k = 1;
        for (i, gap) in GAPS.iter().enumerate() {
            assert_eq!(k, RESIDUES[i]);
            assert_eq!(RES_TO_BIT[k as usize] as usize, i);
            k += gap;
        }
        assert_eq!(k, 31);
    }
}

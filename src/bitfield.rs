//! Odd-only bit-packed field.
//!
//! Bit `i` stands for the odd integer `2i + 1`; a set bit means "still
//! assumed prime". The even prime 2 is never stored.

use crate::error::{self, Result};

#[inline]
pub(crate) fn clear_bit(words: &mut [u64], idx: usize) {
    words[idx >> 6] &= !(1_u64 << (idx & 63));
}

#[inline]
pub(crate) fn get_bit(words: &[u64], idx: usize) -> bool {
    (words[idx >> 6] >> (idx & 63)) & 1 == 1
}

/// Clear bits `start, start + step, ...` below `end`, eight per iteration.
///
/// Used by every bit sieve for strides that do not fit a vector block.
#[inline]
pub(crate) fn clear_stride(words: &mut [u64], start: usize, step: usize, end: usize) {
    let mut j = start;
    if end > 7 * step {
        let unroll_end = end - 7 * step;
        while j < unroll_end {
            clear_bit(words, j);
            clear_bit(words, j + step);
            clear_bit(words, j + 2 * step);
            clear_bit(words, j + 3 * step);
            clear_bit(words, j + 4 * step);
            clear_bit(words, j + 5 * step);
            clear_bit(words, j + 6 * step);
            clear_bit(words, j + 7 * step);
            j += 8 * step;
        }
    }
    while j < end {
        clear_bit(words, j);
        j += step;
    }
}

/// Upper bound on π(n) for pre-allocation. Overestimates by ~15%.
#[inline]
pub(crate) fn prime_count_upper(n: u64) -> usize {
    if n < 10 {
        return 4;
    }
    let nf = n as f64;
    (nf / nf.ln() * 1.15) as usize + 1
}

/// Odd-only sieve field for the integers `1..=bound`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitField {
    words: Vec<u64>,
    bits: usize,
    bound: u64,
}

impl BitField {
    /// A field with every odd integer in `1..=bound` marked as a candidate.
    /// Bits past the last odd integer are zero.
    pub fn for_bound(bound: u64) -> Result<Self> {
        let bits = error::to_usize(bound.div_ceil(2), "bit field", 1)?;
        let mut words = error::alloc_words(bits.div_ceil(64), !0_u64, "bit field")?;
        let tail = bits & 63;
        if tail != 0 {
            if let Some(last) = words.last_mut() {
                *last &= (1_u64 << tail) - 1;
            }
        }
        Ok(Self { words, bits, bound })
    }

    /// Number of odd integers represented.
    pub fn len(&self) -> usize {
        self.bits
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub(crate) fn words_mut(&mut self) -> &mut [u64] {
        &mut self.words
    }

    /// Whether the odd integer at bit `idx` is still a candidate.
    pub fn get(&self, idx: usize) -> bool {
        get_bit(&self.words, idx)
    }

    pub fn clear(&mut self, idx: usize) {
        clear_bit(&mut self.words, idx);
    }

    /// Set bits remaining, i.e. odd candidates.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// 2 (when `bound >= 2`) followed by the odd value of every set bit, in
    /// ascending order. On a sieved field this is exactly the primes
    /// `<= bound`.
    pub fn primes(&self) -> Result<Vec<u64>> {
        self.primes_skipping(1)
    }

    /// Like [`BitField::primes`], but jumps over runs of `block_words` words
    /// that are entirely zero before bit-scanning.
    pub(crate) fn primes_skipping(&self, block_words: usize) -> Result<Vec<u64>> {
        if self.bound < 2 {
            return Ok(Vec::new());
        }
        let mut primes = Vec::new();
        error::try_reserve(&mut primes, prime_count_upper(self.bound), "result buffer")?;
        primes.push(2);

        let block_words = block_words.max(1);
        for (block_idx, block) in self.words.chunks(block_words).enumerate() {
            if block.iter().all(|&w| w == 0) {
                continue;
            }
            let base = block_idx * block_words;
            for (offset, &word) in block.iter().enumerate() {
                let mut w = word;
                while w != 0 {
                    let bit = w.trailing_zeros() as usize;
                    let idx = ((base + offset) << 6) + bit;
                    primes.push(2 * idx as u64 + 1);
                    w &= w - 1; // Clear lowest set bit
                }
            }
        }
        Ok(primes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_bits_are_zero() {
        // 1..=100 holds 50 odd numbers
        let field = BitField::for_bound(100).unwrap();
        assert_eq!(field.len(), 50);
        assert_eq!(field.words().len(), 1);
        assert_eq!(field.count_ones(), 50);
    }

    #[test]
    fn empty_bound_has_no_words() {
        let field = BitField::for_bound(0).unwrap();
        assert!(field.is_empty());
        assert!(field.words().is_empty());
        assert_eq!(field.primes().unwrap(), Vec::<u64>::new());
    }

    #[test]
    fn clear_and_get() {
        let mut field = BitField::for_bound(200).unwrap();
        assert!(field.get(70));
        field.clear(70);
        assert!(!field.get(70));
        assert_eq!(field.count_ones(), 99);
    }

    #[test]
    fn clear_stride_matches_simple_loop() {
        for step in [1, 3, 5, 7, 63, 64, 65, 200] {
            for start in [0, 4, 63, 100] {
                let mut fast = vec![!0_u64; 16];
                let mut slow = vec![!0_u64; 16];
                clear_stride(&mut fast, start, step, 1000);
                let mut j = start;
                while j < 1000 {
                    clear_bit(&mut slow, j);
                    j += step;
                }
                assert_eq!(fast, slow, "start={start} step={step}");
            }
        }
    }

    #[test]
    fn extraction_reads_back_odd_values() {
        let mut field = BitField::for_bound(15).unwrap();
        // keep only 1, 9 and 15 -> bits 0, 4, 7
        for idx in [1, 2, 3, 5, 6] {
            field.clear(idx);
        }
        assert_eq!(field.primes().unwrap(), vec![2, 1, 9, 15]);
    }

    #[test]
    fn skipping_extraction_matches_plain() {
        let mut field = BitField::for_bound(10_000).unwrap();
        for idx in (0..field.len()).filter(|i| i % 97 != 0) {
            field.clear(idx);
        }
        assert_eq!(field.primes().unwrap(), field.primes_skipping(4).unwrap());
    }
}

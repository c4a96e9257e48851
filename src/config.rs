// Tuning constants. None of these change which primes are produced, only
// which code path produces them and how fast.

/// Below this bound the plain scalar bit sieve wins outright.
pub const DEFAULT_SCALAR_MAX: u64 = 1_000_000;

/// Up to this bound a single-threaded sieve (vector-width when available) is
/// preferred over spinning up workers.
pub const DEFAULT_VECTOR_MAX: u64 = 10_000_000;

/// The segmented sieve delegates to a flat sieve for `n` below this.
pub const DEFAULT_PARALLEL_THRESHOLD: u64 = 10_000_000;

/// Segment buffer size in bytes. 32KB fits L1d on nearly every x86/ARM core;
/// each byte holds 8 odd numbers, so one segment spans 524,288 integers.
pub const DEFAULT_SEGMENT_BYTES: usize = 32 * 1024;

/// Largest segment buffer honoured; bigger requests are clamped to this.
pub const MAX_SEGMENT_BYTES: usize = 64 * 1024 * 1024;

/// Engine tuning knobs, passed explicitly to the selector and strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub scalar_max: u64,
    pub vector_max: u64,
    pub parallel_threshold: u64,
    pub segment_bytes: usize,
    /// Worker count override; `None` uses the probed core count.
    pub workers: Option<usize>,
    /// Prefer the mod-30 wheel over a flat odd-only field when a single core
    /// has to handle a large bound.
    pub low_memory: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scalar_max: DEFAULT_SCALAR_MAX,
            vector_max: DEFAULT_VECTOR_MAX,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            segment_bytes: DEFAULT_SEGMENT_BYTES,
            workers: None,
            low_memory: false,
        }
    }
}

impl EngineConfig {
    /// Odd numbers covered by one segment. Rounded down to whole 64-bit words,
    /// never zero and never above [`MAX_SEGMENT_BYTES`].
    pub fn segment_bits(&self) -> u64 {
        let words = (self.segment_bytes.min(MAX_SEGMENT_BYTES) / 8).max(1);
        words as u64 * 64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_segment_covers_262144_odds() {
        assert_eq!(EngineConfig::default().segment_bits(), 262_144);
    }

    #[test]
    fn tiny_segment_is_clamped_to_one_word() {
        let config = EngineConfig {
            segment_bytes: 3,
            ..EngineConfig::default()
        };
        assert_eq!(config.segment_bits(), 64);
    }

    #[test]
    fn huge_segment_is_clamped() {
        let config = EngineConfig {
            segment_bytes: usize::MAX,
            ..EngineConfig::default()
        };
        assert_eq!(config.segment_bits(), MAX_SEGMENT_BYTES as u64 * 8);
    }
}

//! Auto-tuning prime enumeration.
//!
//! [`enumerate_primes`] probes the hardware once, picks a sieve for the bound
//! and returns every prime `<= n` in ascending order. The chosen strategy
//! depends on the machine and on `n`; the output never does.
//!
//! ```
//! let primes = primer::enumerate_primes(30).unwrap();
//! assert_eq!(primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
//! ```

pub mod bitfield;
pub mod capability;
pub mod config;
pub mod error;
pub mod scalar;
pub mod segmented;
pub mod select;
pub mod vector;
pub mod wheel;

pub use capability::{CapabilitySnapshot, probe};
pub use config::EngineConfig;
pub use error::{Result, SieveError};
pub use select::{Strategy, StrategyKind, select};

/// Ascending primes `<= n` using the probed capabilities and default tuning.
pub fn enumerate_primes(n: u64) -> Result<Vec<u64>> {
    enumerate_primes_with(n, &probe(), &EngineConfig::default())
}

/// Ascending primes `<= n` with an explicit snapshot and configuration.
pub fn enumerate_primes_with(
    n: u64,
    caps: &CapabilitySnapshot,
    config: &EngineConfig,
) -> Result<Vec<u64>> {
    select(n, caps, config).sieve(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_small_cases() {
        assert_eq!(enumerate_primes(0).unwrap(), Vec::<u64>::new());
        assert_eq!(enumerate_primes(1).unwrap(), Vec::<u64>::new());
        assert_eq!(enumerate_primes(2).unwrap(), vec![2]);
        assert_eq!(enumerate_primes(3).unwrap(), vec![2, 3]);
        assert_eq!(enumerate_primes(10).unwrap(), vec![2, 3, 5, 7]);
    }

    #[test]
    fn first_hundred() {
        let primes = enumerate_primes(100).unwrap();
        assert_eq!(primes.len(), 25);
        assert_eq!(&primes[..10], &[2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
    }

    #[test]
    fn explicit_baseline_snapshot() {
        let primes =
            enumerate_primes_with(100_000, &CapabilitySnapshot::baseline(), &EngineConfig::default())
                .unwrap();
        assert_eq!(primes.len(), 9_592);
    }
}

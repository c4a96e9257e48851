use std::fmt;

use tracing::debug;

use crate::capability::CapabilitySnapshot;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::scalar::ScalarBitSieve;
use crate::segmented::SegmentedParallelSieve;
use crate::vector::VectorSieve;
use crate::wheel::WheelSieve;

/// Names of the available strategies, for callers that want to force one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Scalar,
    Vector,
    Segmented,
    Wheel,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::Scalar,
        StrategyKind::Vector,
        StrategyKind::Segmented,
        StrategyKind::Wheel,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::Scalar => "scalar bit-packed",
            StrategyKind::Vector => "vector bit-packed",
            StrategyKind::Segmented => "parallel segmented",
            StrategyKind::Wheel => "mod-30 wheel",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A ready-to-run sieve. The set of variants is closed; every variant yields
/// the same primes for the same bound.
#[derive(Debug, Clone, Copy)]
pub enum Strategy {
    Scalar(ScalarBitSieve),
    Vector(VectorSieve),
    Segmented(SegmentedParallelSieve),
    Wheel(WheelSieve),
}

impl Strategy {
    /// Build an explicitly requested strategy. Asking for the vector sieve on
    /// a machine without vector support yields the scalar sieve.
    pub fn build(kind: StrategyKind, caps: &CapabilitySnapshot, config: &EngineConfig) -> Self {
        match kind {
            StrategyKind::Scalar => Strategy::Scalar(ScalarBitSieve::new()),
            StrategyKind::Vector if VectorSieve::supports(caps) => {
                Strategy::Vector(VectorSieve::new(caps))
            }
            StrategyKind::Vector => Strategy::Scalar(ScalarBitSieve::new()),
            StrategyKind::Segmented => {
                Strategy::Segmented(SegmentedParallelSieve::new(caps, config))
            }
            StrategyKind::Wheel => Strategy::Wheel(WheelSieve::new()),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Scalar(_) => StrategyKind::Scalar,
            Strategy::Vector(_) => StrategyKind::Vector,
            Strategy::Segmented(_) => StrategyKind::Segmented,
            Strategy::Wheel(_) => StrategyKind::Wheel,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Ascending primes `<= n`.
    pub fn sieve(&self, n: u64) -> Result<Vec<u64>> {
        match self {
            Strategy::Scalar(s) => s.sieve(n),
            Strategy::Vector(s) => s.sieve(n),
            Strategy::Segmented(s) => s.sieve(n),
            Strategy::Wheel(s) => s.sieve(n),
        }
    }
}

/// Pick a strategy for `n` on hardware described by `caps`.
///
/// - `n < scalar_max`: scalar
/// - `n <= vector_max`: vector when supported, else scalar
/// - larger: segmented on 2+ cores; on one core the wheel when `low_memory`,
///   else vector when supported, else scalar
pub fn select(n: u64, caps: &CapabilitySnapshot, config: &EngineConfig) -> Strategy {
    let vector_ok = VectorSieve::supports(caps);

    let kind = if n < config.scalar_max {
        StrategyKind::Scalar
    } else if n <= config.vector_max {
        if vector_ok {
            StrategyKind::Vector
        } else {
            StrategyKind::Scalar
        }
    } else if caps.cores >= 2 {
        StrategyKind::Segmented
    } else if config.low_memory {
        StrategyKind::Wheel
    } else if vector_ok {
        StrategyKind::Vector
    } else {
        StrategyKind::Scalar
    };

    debug!(n, strategy = %kind, "selected strategy");
    Strategy::build(kind, caps, config)
}

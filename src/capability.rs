//! One-time hardware inspection.
//!
//! The probe runs once per process and is cached; every later call returns
//! the same [`CapabilitySnapshot`]. Strategies never query the hardware on
//! their own, they receive the snapshot from the caller.

use std::fmt;
use std::fs;
use std::sync::OnceLock;

use tracing::debug;

const BASELINE_CACHE_LINE: usize = 64;

static SNAPSHOT: OnceLock<CapabilitySnapshot> = OnceLock::new();

/// What the engine knows about the machine it runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilitySnapshot {
    /// Widest usable SIMD register in bits, 0 when none.
    pub vector_bits: u32,
    /// Logical cores available to this process, at least 1.
    pub cores: usize,
    /// Cache line size in bytes.
    pub cache_line: usize,
}

impl CapabilitySnapshot {
    /// The conservative profile used whenever probing fails: no vector unit,
    /// one core.
    pub const fn baseline() -> Self {
        Self {
            vector_bits: 0,
            cores: 1,
            cache_line: BASELINE_CACHE_LINE,
        }
    }

    /// Number of 64-bit lanes in one vector register.
    pub fn vector_lanes(&self) -> usize {
        (self.vector_bits / 64) as usize
    }
}

impl Default for CapabilitySnapshot {
    fn default() -> Self {
        Self::baseline()
    }
}

impl fmt::Display for CapabilitySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vector = match self.vector_bits {
            0 => "none".to_string(),
            bits => format!("{bits}-bit"),
        };
        write!(
            f,
            "vector: {}, cores: {}, cache line: {} bytes",
            vector, self.cores, self.cache_line
        )
    }
}

/// Inspect the hardware (first call only) and return the cached snapshot.
pub fn probe() -> CapabilitySnapshot {
    *SNAPSHOT.get_or_init(|| {
        let snapshot = CapabilitySnapshot {
            vector_bits: detect_vector_bits(),
            cores: detect_cores(),
            cache_line: detect_cache_line(),
        };
        debug!(%snapshot, "capability probe");
        snapshot
    })
}

fn detect_vector_bits() -> u32 {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx512f") {
            512
        } else if is_x86_feature_detected!("avx2") {
            256
        } else if is_x86_feature_detected!("sse2") {
            128
        } else {
            0
        }
    }
    #[cfg(target_arch = "aarch64")]
    {
        if std::arch::is_aarch64_feature_detected!("neon") {
            128
        } else {
            0
        }
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        0
    }
}

fn detect_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Read the L1d line size from sysfs. Format: a single decimal number.
fn detect_cache_line() -> usize {
    fs::read_to_string("/sys/devices/system/cpu/cpu0/cache/index0/coherency_line_size")
        .ok()
        .and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|&size| size.is_power_of_two())
        .unwrap_or(BASELINE_CACHE_LINE)
}

use thiserror::Error;

/// Failures the engine reports to its caller.
///
/// A bound below 2 is not an error; it simply yields no primes.
#[derive(Debug, Error)]
pub enum SieveError {
    /// A buffer for the bit field, a segment or a result vector could not be
    /// allocated (or its size does not fit the address space).
    #[error("failed to allocate {bytes} bytes for {what}")]
    Allocation { what: &'static str, bytes: u128 },

    /// A segment worker panicked before finishing its share of the range.
    #[error("segment worker {worker} panicked")]
    WorkerPanicked { worker: usize },
}

pub type Result<T> = std::result::Result<T, SieveError>;

/// Reserve room for `additional` more elements, turning an allocator refusal
/// into [`SieveError::Allocation`].
pub(crate) fn try_reserve<T>(vec: &mut Vec<T>, additional: usize, what: &'static str) -> Result<()> {
    vec.try_reserve(additional).map_err(|_| SieveError::Allocation {
        what,
        bytes: additional as u128 * std::mem::size_of::<T>() as u128,
    })
}

/// Allocate `len` words all set to `fill`.
pub(crate) fn alloc_words(len: usize, fill: u64, what: &'static str) -> Result<Vec<u64>> {
    let mut words = Vec::new();
    words.try_reserve_exact(len).map_err(|_| SieveError::Allocation {
        what,
        bytes: len as u128 * 8,
    })?;
    words.resize(len, fill);
    Ok(words)
}

/// Convert a count derived from `n` into `usize`, reporting overflow the same
/// way as an allocation failure.
pub(crate) fn to_usize(value: u64, what: &'static str, elem_bytes: u128) -> Result<usize> {
    usize::try_from(value).map_err(|_| SieveError::Allocation {
        what,
        bytes: value as u128 * elem_bytes,
    })
}

//! Pseudorandom set expansion for FullSet queries
//!
//! A PRSet key expands to exactly one index per chunk, in chunk order. The
//! shape of the set (size, one-per-chunk coverage) is the same for every key,
//! so the server cannot tell which chunk holds the client's real target.

use crate::prf::{Fnv1aMix, KeyedMix, PrfKey128};

/// Pseudorandom set defined by its PRF key
pub struct PrSet<M: KeyedMix = Fnv1aMix> {
    mix: M,
}

impl PrSet {
    /// Create a PRSet with the reference mixing function
    pub fn new(key: PrfKey128) -> Self {
        Self::with_mix(Fnv1aMix::new(&key))
    }
}

impl<M: KeyedMix> PrSet<M> {
    /// Create a PRSet over an already keyed mixing function
    pub fn with_mix(mix: M) -> Self {
        Self { mix }
    }

    /// Offset inside `chunk`: full 64-bit mix output reduced mod `chunk_size`
    pub fn offset_in_chunk(&self, chunk: u64, chunk_size: u64) -> u64 {
        if chunk_size == 0 {
            return 0;
        }
        self.mix.eval(chunk) % chunk_size
    }

    /// Index selected in `chunk`
    ///
    /// An index past `u64::MAX` cannot be formed and saturates, which every
    /// database read resolves to the zero entry.
    pub fn index_for_chunk(&self, chunk: u64, chunk_size: u64) -> u64 {
        chunk
            .checked_mul(chunk_size)
            .and_then(|start| start.checked_add(self.offset_in_chunk(chunk, chunk_size)))
            .unwrap_or(u64::MAX)
    }

    /// Expand into `set_size` indices, the i-th lying in
    /// `[i * chunk_size, (i + 1) * chunk_size)`
    pub fn expand(&self, set_size: u64, chunk_size: u64) -> Vec<u64> {
        (0..set_size)
            .map(|chunk| self.index_for_chunk(chunk, chunk_size))
            .collect()
    }

    /// Check if a target index is in this set (only its own chunk is evaluated)
    pub fn contains(&self, target: u64, set_size: u64, chunk_size: u64) -> bool {
        if chunk_size == 0 {
            return false;
        }
        let chunk = target / chunk_size;
        chunk < set_size && self.index_for_chunk(chunk, chunk_size) == target
    }
}

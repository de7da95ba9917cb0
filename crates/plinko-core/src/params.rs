//! Parameter planning: derives chunk and set sizes from the database size
//!
//! The database is split into `set_size` chunks of `chunk_size` entries each.
//! Every component that re-derives sizes from a stored `db_size` must go
//! through [`gen_params`] so the result is bit-for-bit identical.

use serde::{Deserialize, Serialize};

/// Compute `(chunk_size, set_size)` for a database of `db_size` entries.
///
/// - `chunk_size` is the smallest power of two with `chunk_size >= 2 * sqrt(db_size)`
/// - `set_size` is `ceil(db_size / chunk_size)` rounded up to a multiple of 4
pub fn gen_params(db_size: u64) -> (u64, u64) {
    // chunk >= 2*sqrt(n)  <=>  chunk^2 >= 4n, evaluated exactly in integers
    let target = 4 * db_size as u128;
    let mut chunk_size = 1u64;
    while (chunk_size as u128) * (chunk_size as u128) < target {
        chunk_size *= 2;
    }

    let set_size = db_size.div_ceil(chunk_size).next_multiple_of(4);
    (chunk_size, set_size)
}

/// Sizing of a Plinko PIR database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlinkoParams {
    /// Logical number of entries (real data)
    pub db_size: u64,
    /// Entries per chunk
    pub chunk_size: u64,
    /// Number of chunks (and of hint sets)
    pub set_size: u64,
}

impl PlinkoParams {
    /// Plan parameters for a database of `db_size` entries
    pub fn new(db_size: u64) -> Self {
        let (chunk_size, set_size) = gen_params(db_size);
        Self {
            db_size,
            chunk_size,
            set_size,
        }
    }

    /// Use explicit sizes (e.g. read back from a snapshot header)
    pub fn from_parts(db_size: u64, chunk_size: u64, set_size: u64) -> Self {
        Self {
            db_size,
            chunk_size,
            set_size,
        }
    }

    /// Padded entry count: `chunk_size * set_size`
    pub fn total_entries(&self) -> u64 {
        self.chunk_size * self.set_size
    }

    /// Chunk containing `index`
    pub fn chunk_of(&self, index: u64) -> u64 {
        if self.chunk_size == 0 {
            return 0;
        }
        index / self.chunk_size
    }

    /// First index of `chunk`
    pub fn chunk_start(&self, chunk: u64) -> u64 {
        chunk * self.chunk_size
    }

    /// Number of zero entries appended after the real data
    pub fn padding(&self) -> u64 {
        self.total_entries().saturating_sub(self.db_size)
    }
}

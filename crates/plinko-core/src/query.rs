//! Query engine: plaintext, FullSet and SetParity reads

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::prf::{key_from_slice, KeyedMix};
use crate::prset::PrSet;
use crate::{Database, DbEntry, Result};

/// Result plus server-side processing time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timed<T> {
    pub value: T,
    pub elapsed: Duration,
}

impl<T> Timed<T> {
    pub fn elapsed_nanos(&self) -> u64 {
        self.elapsed.as_nanos() as u64
    }
}

fn timed<T>(f: impl FnOnce() -> T) -> Timed<T> {
    let start = Instant::now();
    let value = f();
    Timed {
        value,
        elapsed: start.elapsed(),
    }
}

/// Read-only operations over the shared database
#[derive(Debug, Clone)]
pub struct QueryEngine {
    database: Arc<Database>,
    chunk_size: u64,
    set_size: u64,
}

impl QueryEngine {
    pub fn new(database: Arc<Database>, chunk_size: u64, set_size: u64) -> Self {
        Self {
            database,
            chunk_size,
            set_size,
        }
    }

    /// Bounds-checked read; out-of-range indices read as zero
    #[inline]
    pub fn db_access(&self, index: u64) -> DbEntry {
        self.database.get(index)
    }

    /// Direct lookup, diagnostics only
    pub fn plaintext_query(&self, index: u64) -> Timed<DbEntry> {
        timed(|| self.db_access(index))
    }

    /// XOR of the one-per-chunk set expanded from `prf_key`
    pub fn full_set_query(&self, prf_key: &[u8]) -> Result<Timed<DbEntry>> {
        let key = key_from_slice(prf_key)?;
        Ok(self.full_set_query_with(&PrSet::new(key)))
    }

    /// FullSet over an already keyed PRSet (any mixing function)
    pub fn full_set_query_with<M: KeyedMix>(&self, prset: &PrSet<M>) -> Timed<DbEntry> {
        timed(|| {
            (0..self.set_size)
                .map(|chunk| self.db_access(prset.index_for_chunk(chunk, self.chunk_size)))
                .fold(0, |acc, v| acc ^ v)
        })
    }

    /// XOR over caller-chosen indices (non-oblivious)
    pub fn set_parity_query(&self, indices: &[u64]) -> Timed<DbEntry> {
        timed(|| compute_parity(&self.database, indices))
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn set_size(&self) -> u64 {
        self.set_size
    }
}

/// XOR of the entries at `indices`
pub fn compute_parity(database: &Database, indices: &[u64]) -> DbEntry {
    indices.iter().fold(0, |acc, &i| acc ^ database.get(i))
}

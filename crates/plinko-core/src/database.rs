//! In-memory database shared by the query engine and the update manager
//!
//! Entries are single 64-bit words stored as atomics, so a point update is
//! one store and readers never observe a torn write. Queries and updates can
//! run concurrently without a database-wide lock.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::DbEntry;

/// Padded database of `u64` entries
pub struct Database {
    entries: Box<[AtomicU64]>,
    /// Logical size; indices in `[db_size, len)` are zero padding
    db_size: u64,
}

impl Database {
    /// Wrap padded entries. `db_size` is clamped to the physical length.
    pub fn new(entries: Vec<DbEntry>, db_size: u64) -> Self {
        let db_size = db_size.min(entries.len() as u64);
        let entries = entries.into_iter().map(AtomicU64::new).collect();
        Self { entries, db_size }
    }

    /// Read entry `index`; any index outside `[0, db_size)` reads as zero
    #[inline]
    pub fn get(&self, index: u64) -> DbEntry {
        if index >= self.db_size {
            return 0;
        }
        self.entries[index as usize].load(Ordering::Relaxed)
    }

    /// Write entry `index`. Returns `false` (and writes nothing) when the
    /// index is outside the real data.
    #[inline]
    pub fn set(&self, index: u64, value: DbEntry) -> bool {
        if index >= self.db_size {
            return false;
        }
        self.entries[index as usize].store(value, Ordering::Relaxed);
        true
    }

    /// Logical entry count (real data)
    pub fn db_size(&self) -> u64 {
        self.db_size
    }

    /// Physical entry count including padding
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy out every physical entry (padding included)
    pub fn to_vec(&self) -> Vec<DbEntry> {
        self.entries
            .iter()
            .map(|e| e.load(Ordering::Relaxed))
            .collect()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("db_size", &self.db_size)
            .field("len", &self.entries.len())
            .finish()
    }
}

//! Incremental update manager
//!
//! Applies point writes to the live database and emits one [`HintDelta`] per
//! write, routed to the hint set chosen by the iPRF. With cache mode enabled
//! the routing is a table lookup, so each update costs O(1).

use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::delta::HintDelta;
use crate::iprf::Iprf;
use crate::prf::{Fnv1aMix, KeyedMix, PrfKey128};
use crate::{Database, DbEntry};

/// Fixed key of the update iPRF (bytes `0..16`), constant across restarts so
/// hint set routing never changes under a client
pub const UPDATE_PRF_KEY: PrfKey128 = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];

/// A single point write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbUpdate {
    pub index: u64,
    pub old_value: DbEntry,
    pub new_value: DbEntry,
}

/// Owns the write path over the shared database
pub struct UpdateManager<M: KeyedMix = Fnv1aMix> {
    database: Arc<Database>,
    iprf: Iprf<M>,
    chunk_size: u64,
    set_size: u64,
    index_to_hint: Option<Vec<u64>>,
}

impl UpdateManager {
    /// Create a manager keyed with [`UPDATE_PRF_KEY`]
    pub fn new(database: Arc<Database>, chunk_size: u64, set_size: u64) -> Self {
        let iprf = Iprf::new(UPDATE_PRF_KEY, database.db_size(), set_size);
        Self::with_iprf(database, iprf, chunk_size, set_size)
    }
}

impl<M: KeyedMix> UpdateManager<M> {
    pub fn with_iprf(database: Arc<Database>, iprf: Iprf<M>, chunk_size: u64, set_size: u64) -> Self {
        Self {
            database,
            iprf,
            chunk_size,
            set_size,
            index_to_hint: None,
        }
    }

    /// Precompute `index -> hint set` for every real index
    ///
    /// Runs to completion before returning; call it before serving updates.
    pub fn enable_cache_mode(&mut self) -> Duration {
        let start = Instant::now();
        let db_size = self.database.db_size();

        info!(db_size, set_size = self.set_size, "Building index-to-hint cache");

        let iprf = &self.iprf;
        let table: Vec<u64> = (0..db_size).into_par_iter().map(|i| iprf.forward(i)).collect();
        self.index_to_hint = Some(table);

        let elapsed = start.elapsed();
        info!(
            entries = db_size,
            elapsed_ms = elapsed.as_millis() as u64,
            "Cache mode enabled"
        );
        elapsed
    }

    pub fn is_cache_enabled(&self) -> bool {
        self.index_to_hint.is_some()
    }

    /// Hint set routed to by `index`
    #[inline]
    pub fn hint_set_for(&self, index: u64) -> u64 {
        match &self.index_to_hint {
            Some(table) => table.get(index as usize).copied().unwrap_or(0),
            None => self.iprf.forward(index),
        }
    }

    /// Apply a batch in order, returning one delta per in-range update
    ///
    /// Updates naming an index outside the real data are dropped without a
    /// delta and leave the database untouched.
    pub fn apply_updates(&self, updates: &[DbUpdate]) -> (Vec<HintDelta>, Duration) {
        let start = Instant::now();
        let mut deltas = Vec::with_capacity(updates.len());

        for update in updates {
            if !self.database.set(update.index, update.new_value) {
                continue;
            }
            let hint_set_id = self.hint_set_for(update.index);
            deltas.push(HintDelta::new(hint_set_id, update.old_value ^ update.new_value));
        }

        let elapsed = start.elapsed();
        let skipped = updates.len() - deltas.len();
        debug!(
            applied = deltas.len(),
            skipped,
            elapsed_us = elapsed.as_micros() as u64,
            "Applied update batch"
        );
        (deltas, elapsed)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::PlinkoParams;
    use crate::prf::Aes128Mix;

    fn manager(db_size: u64) -> UpdateManager {
        let params = PlinkoParams::new(db_size);
        let mut entries: Vec<u64> = (0..db_size).collect();
        entries.resize(params.total_entries() as usize, 0);
        let db = Arc::new(Database::new(entries, db_size));
        UpdateManager::new(db, params.chunk_size, params.set_size)
    }

    #[test]
    fn test_single_update_delta() {
        let mgr = manager(16);
        let (deltas, _) = mgr.apply_updates(&[DbUpdate {
            index: 5,
            old_value: 100,
            new_value: 100 ^ 0xFF,
        }]);

        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].delta, 0xFF);
        assert!(!deltas[0].is_backup_set);
        assert!(deltas[0].hint_set_id < mgr.set_size());
        assert_eq!(mgr.database().get(5), 100 ^ 0xFF);
    }

    #[test]
    fn test_out_of_range_dropped() {
        let mgr = manager(16);
        let before = mgr.database().to_vec();

        let (deltas, _) = mgr.apply_updates(&[
            DbUpdate { index: 16, old_value: 0, new_value: 1 },
            DbUpdate { index: 16 + 1000, old_value: 0, new_value: 1 },
        ]);

        assert!(deltas.is_empty());
        assert_eq!(mgr.database().to_vec(), before);
    }

    #[test]
    fn test_batch_order_preserved() {
        let mgr = manager(100);
        let updates: Vec<DbUpdate> = (0..10)
            .map(|i| DbUpdate { index: i * 7, old_value: i * 7, new_value: i })
            .collect();

        let (deltas, _) = mgr.apply_updates(&updates);
        assert_eq!(deltas.len(), 10);
        for (u, d) in updates.iter().zip(&deltas) {
            assert_eq!(d.delta, u.old_value ^ u.new_value);
            assert_eq!(d.hint_set_id, mgr.hint_set_for(u.index));
        }
    }

    #[test]
    fn test_cache_mode_matches_direct_routing() {
        let updates: Vec<DbUpdate> = (0..500)
            .map(|i| DbUpdate { index: (i * 13) % 5_000, old_value: i, new_value: i + 1 })
            .collect();

        let direct = manager(5_000);
        let (direct_deltas, _) = direct.apply_updates(&updates);

        let mut cached = manager(5_000);
        cached.enable_cache_mode();
        assert!(cached.is_cache_enabled());
        let (cached_deltas, _) = cached.apply_updates(&updates);

        assert_eq!(direct_deltas, cached_deltas);
    }

    #[test]
    fn test_cache_table_matches_iprf() {
        let mut mgr = manager(2_000);
        let iprf = Iprf::new(UPDATE_PRF_KEY, 2_000, mgr.set_size());
        mgr.enable_cache_mode();
        for i in 0..2_000 {
            assert_eq!(mgr.hint_set_for(i), iprf.forward(i));
        }
    }

    #[test]
    fn test_custom_mix() {
        let db = Arc::new(Database::new(vec![0; 64], 64));
        let iprf = Iprf::with_mix(Aes128Mix::new(&[4u8; 16]), 64, 8);
        let mgr = UpdateManager::with_iprf(db, iprf, 16, 8);
        let (deltas, _) = mgr.apply_updates(&[DbUpdate { index: 3, old_value: 0, new_value: 9 }]);
        assert_eq!(deltas.len(), 1);
        assert!(deltas[0].hint_set_id < 8);
    }
}

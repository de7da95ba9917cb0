//! Update batch sources
//!
//! A source numbers its batches (blocks) from 1 and reports the newest one
//! available. The service pulls every batch it has not processed yet.

use std::future::Future;
use std::time::{Duration, Instant};

use plinko_core::{Database, DbUpdate};

/// Supplies numbered batches of point updates
pub trait UpdateSource: Send + Sync {
    /// Number of the newest available batch (0 when none)
    fn latest_batch(&self) -> impl Future<Output = anyhow::Result<u64>> + Send;

    /// Updates of batch `number`; `old_value`s are read from `database`
    fn fetch_batch(
        &self,
        number: u64,
        database: &Database,
    ) -> impl Future<Output = anyhow::Result<Vec<DbUpdate>>> + Send;
}

/// Deterministic change simulator
///
/// Batch `b` rewrites `changes_per_block` consecutive indices starting at
/// `b * changes_per_block` (wrapping at `db_size`) to `b * 1000 + i`. A new
/// batch becomes available every `block_interval`.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    changes_per_block: u64,
    block_interval: Duration,
    started: Instant,
}

impl SimulatedSource {
    pub fn new(changes_per_block: u64, block_interval: Duration) -> Self {
        Self {
            changes_per_block,
            block_interval,
            started: Instant::now(),
        }
    }

    pub fn changes_per_block(&self) -> u64 {
        self.changes_per_block
    }
}

impl UpdateSource for SimulatedSource {
    async fn latest_batch(&self) -> anyhow::Result<u64> {
        let interval = self.block_interval.as_millis().max(1);
        Ok((self.started.elapsed().as_millis() / interval) as u64)
    }

    async fn fetch_batch(&self, number: u64, database: &Database) -> anyhow::Result<Vec<DbUpdate>> {
        Ok(simulated_updates(number, self.changes_per_block, database))
    }
}

/// Updates of simulated block `block`
///
/// All old values are read before any of the batch is applied.
pub fn simulated_updates(block: u64, changes_per_block: u64, database: &Database) -> Vec<DbUpdate> {
    let db_size = database.db_size();
    if db_size == 0 {
        return Vec::new();
    }

    (0..changes_per_block)
        .map(|i| {
            let index = block.wrapping_mul(changes_per_block).wrapping_add(i) % db_size;
            DbUpdate {
                index,
                old_value: database.get(index),
                new_value: block.wrapping_mul(1000).wrapping_add(i),
            }
        })
        .collect()
}

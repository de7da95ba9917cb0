//! Sequential block polling loop
//!
//! On every tick the service drains all batches newer than the last one it
//! processed, in order. A batch is marked processed only after its delta file
//! is on disk, so no batch is applied twice or skipped.

use std::time::{Duration, Instant};

use plinko_core::prf::{Fnv1aMix, KeyedMix};
use plinko_core::{HintDelta, UpdateManager};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::delta_writer::DeltaWriter;
use crate::source::UpdateSource;

/// Deltas computed for a block whose file has not been written yet
#[derive(Debug)]
struct PendingWrite {
    block: u64,
    deltas: Vec<HintDelta>,
}

/// Outcome of one tick
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Batches fully processed during this tick
    pub blocks: u64,
    /// Delta records written during this tick
    pub deltas: u64,
}

pub struct UpdateService<S: UpdateSource, M: KeyedMix = Fnv1aMix> {
    manager: UpdateManager<M>,
    source: S,
    writer: DeltaWriter,
    last_processed: u64,
    pending: Option<PendingWrite>,
    deltas_generated: u64,
}

impl<S: UpdateSource, M: KeyedMix> UpdateService<S, M> {
    pub fn new(manager: UpdateManager<M>, source: S, writer: DeltaWriter) -> Self {
        Self {
            manager,
            source,
            writer,
            last_processed: 0,
            pending: None,
            deltas_generated: 0,
        }
    }

    /// Treat every batch up to `block` as already processed
    pub fn starting_after(mut self, block: u64) -> Self {
        self.last_processed = block;
        self
    }

    pub fn last_processed(&self) -> u64 {
        self.last_processed
    }

    /// Number of delta files written so far
    pub fn deltas_generated(&self) -> u64 {
        self.deltas_generated
    }

    pub fn manager(&self) -> &UpdateManager<M> {
        &self.manager
    }

    /// Process every batch in `(last_processed, latest]`
    ///
    /// Stops at the first batch that cannot be fetched or written; that batch
    /// is retried on the next tick.
    pub async fn tick(&mut self) -> anyhow::Result<TickReport> {
        let mut report = TickReport::default();

        if let Some(pending) = self.pending.take() {
            if let Err(e) = self.writer.write(pending.block, &pending.deltas) {
                self.pending = Some(pending);
                return Err(e);
            }
            self.finish_block(pending.block, pending.deltas.len(), &mut report);
        }

        let latest = self.source.latest_batch().await?;

        while self.last_processed < latest {
            let block = self.last_processed + 1;
            let started = Instant::now();

            let updates = match self.source.fetch_batch(block, self.manager.database()).await {
                Ok(updates) => updates,
                Err(e) => {
                    warn!(block, error = %e, "Failed to fetch batch, retrying next tick");
                    break;
                }
            };

            if updates.is_empty() {
                self.last_processed = block;
                report.blocks += 1;
                metrics::counter!("plinko_blocks_processed_total").increment(1);
                continue;
            }

            let (deltas, update_time) = self.manager.apply_updates(&updates);
            metrics::counter!("plinko_updates_applied_total").increment(updates.len() as u64);

            if let Err(e) = self.writer.write(block, &deltas) {
                self.pending = Some(PendingWrite { block, deltas });
                return Err(e.context(format!("failed to write delta file for block {block}")));
            }
            let count = deltas.len();
            self.finish_block(block, count, &mut report);

            info!(
                block,
                changes = updates.len(),
                deltas = count,
                update_us = update_time.as_micros() as u64,
                total_us = started.elapsed().as_micros() as u64,
                "Processed block"
            );
        }

        Ok(report)
    }

    fn finish_block(&mut self, block: u64, deltas: usize, report: &mut TickReport) {
        self.last_processed = block;
        self.deltas_generated += 1;
        report.blocks += 1;
        report.deltas += deltas as u64;
        metrics::counter!("plinko_blocks_processed_total").increment(1);
        metrics::counter!("plinko_hint_deltas_total").increment(deltas as u64);
    }

    /// Tick forever on `poll_interval`
    pub async fn run(mut self, poll_interval: Duration) {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            poll_ms = poll_interval.as_millis() as u64,
            after_block = self.last_processed,
            "Starting block monitoring"
        );

        loop {
            ticker.tick().await;
            if let Err(e) = self.tick().await {
                warn!(error = %e, "Block processing failed");
            }
        }
    }
}

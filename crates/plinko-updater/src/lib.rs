//! plinko-updater: turns update batches into hint delta files
//!
//! The service polls an [`UpdateSource`] (a wall-clock simulator or a
//! JSON-RPC chain head) for new batches, applies each one
//! through the core update manager and writes the resulting hint deltas to
//! `delta-{block:06}.bin`.

pub mod chain;
pub mod delta_writer;
pub mod health;
pub mod service;
pub mod source;

pub use chain::{connect_with_retry, ChainHead, ChainSource, RpcChainHead};
pub use delta_writer::DeltaWriter;
pub use health::health_router;
pub use service::{TickReport, UpdateService};
pub use source::{simulated_updates, SimulatedSource, UpdateSource};

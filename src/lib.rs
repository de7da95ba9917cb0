//! Plinko PIR: single-server private information retrieval over account balances
//!
//! Workspace crates:
//! - `plinko-core`: parameters, iPRF, PRSet, snapshots, deltas, update routing, queries
//! - `plinko-server`: HTTP query API
//! - `plinko-updater`: per-block hint delta service
//! - `plinko-hintgen`: balance collection and first snapshot

pub use plinko_core as core;
pub use plinko_hintgen as hintgen;
pub use plinko_server as server;
pub use plinko_updater as updater;

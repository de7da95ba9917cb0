//! plinko-core: privacy-preserving indexing engine for Plinko PIR
//!
//! A client retrieves one entry of a server-held database without the server
//! learning which index was read. The client holds a hint derived from the
//! [`HintSnapshot`] and keeps it fresh by applying [`HintDelta`] records as the
//! database changes.
//!
//! This crate provides:
//! - Parameter planning (chunk/set sizing)
//! - A pluggable keyed mixing function used as the shared PRF
//! - The invertible PRF (forward direction) built from binomial ball-in-bin sampling
//! - PRSet expansion for oblivious FullSet queries
//! - Hint snapshot and delta file formats
//! - The update manager and the query engine
//!
//! # Privacy Model
//!
//! | Operation | Server learns |
//! |-----------|---------------|
//! | FullSet query | the PRF key only; one index per chunk is touched |
//! | SetParity query | the explicit index set (non-oblivious) |
//! | Plaintext query | the index (diagnostics only) |
//!
//! The default mixing function is **not** cryptographically secure. See
//! [`prf::Aes128Mix`] for a keyed block-cipher substitute.

pub mod binomial;
pub mod database;
pub mod delta;
mod error;
pub mod iprf;
pub mod params;
pub mod prf;
pub mod prset;
pub mod query;
pub mod readiness;
pub mod snapshot;
pub mod source;
pub mod update;

pub use database::Database;
pub use delta::HintDelta;
pub use error::Error;
pub use iprf::Iprf;
pub use params::{gen_params, PlinkoParams};
pub use prf::{Aes128Mix, Fnv1aMix, KeyedMix, PrfKey128, PRF_KEY_SIZE};
pub use prset::PrSet;
pub use query::{QueryEngine, Timed};
pub use snapshot::{HintSnapshot, SnapshotHeader, SNAPSHOT_HEADER_SIZE};
pub use update::{DbUpdate, UpdateManager, UPDATE_PRF_KEY};

pub type Result<T> = std::result::Result<T, Error>;

/// Database entry (account balance, truncated to 64 bits)
pub type DbEntry = u64;

/// Entry size in bytes on disk
pub const ENTRY_SIZE: usize = 8;

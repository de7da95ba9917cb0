//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid snapshot: too small for header (need 32 bytes, got {actual})")]
    SnapshotTooShort { actual: usize },

    #[error("Invalid snapshot: {trailing} trailing bytes after the last whole entry")]
    SnapshotMisaligned { trailing: usize },

    #[error("Invalid snapshot: header sizes {chunk_size} x {set_size} do not match {entries} body entries")]
    SnapshotLayout {
        chunk_size: u64,
        set_size: u64,
        entries: u64,
    },

    #[error("Params mismatch: {field} - expected {expected}, but snapshot has {actual}")]
    ParamsMismatch {
        field: &'static str,
        expected: u64,
        actual: u64,
    },

    #[error("PRF key must be 16 bytes, got {actual}")]
    InvalidKeyLength { actual: usize },

    #[error("Invalid delta: header too short (need 16 bytes, got {actual})")]
    DeltaHeaderTooShort { actual: usize },

    #[error("Invalid delta: truncated (expected {expected} bytes, got {actual})")]
    DeltaTruncated { expected: usize, actual: usize },

    #[error("Invalid delta: record count {count} does not fit in memory")]
    TooManyDeltas { count: u64 },

    #[error("Invalid source file: length {len} is not a multiple of record size {record_size}")]
    SourceMisaligned { len: usize, record_size: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

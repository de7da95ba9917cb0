//! Hint snapshot (`hint.bin`) format
//!
//! ```text
//! [DBSize:8][ChunkSize:8][SetSize:8][Reserved:8]   32-byte header, u64 little-endian
//! [entry 0:8][entry 1:8] ... [entry ChunkSize*SetSize-1:8]
//! ```
//!
//! Entries past `DBSize` are zero padding. The snapshot is written once at
//! hint generation and never rewritten; incremental changes travel as delta
//! files (see [`crate::delta`]).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::delta::HintDelta;
use crate::params::PlinkoParams;
use crate::{Database, DbEntry, Error, Result, ENTRY_SIZE};

/// Header size in bytes
pub const SNAPSHOT_HEADER_SIZE: usize = 32;

/// Fixed snapshot header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub db_size: u64,
    pub chunk_size: u64,
    pub set_size: u64,
    pub reserved: u64,
}

impl SnapshotHeader {
    pub fn from_params(params: &PlinkoParams) -> Self {
        Self {
            db_size: params.db_size,
            chunk_size: params.chunk_size,
            set_size: params.set_size,
            reserved: 0,
        }
    }

    pub fn params(&self) -> PlinkoParams {
        PlinkoParams::from_parts(self.db_size, self.chunk_size, self.set_size)
    }

    /// Parse the header from the start of `data`
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < SNAPSHOT_HEADER_SIZE {
            return Err(Error::SnapshotTooShort { actual: data.len() });
        }
        Ok(Self {
            db_size: read_u64(data, 0),
            chunk_size: read_u64(data, 8),
            set_size: read_u64(data, 16),
            reserved: read_u64(data, 24),
        })
    }

    pub fn to_bytes(&self) -> [u8; SNAPSHOT_HEADER_SIZE] {
        let mut out = [0u8; SNAPSHOT_HEADER_SIZE];
        out[0..8].copy_from_slice(&self.db_size.to_le_bytes());
        out[8..16].copy_from_slice(&self.chunk_size.to_le_bytes());
        out[16..24].copy_from_slice(&self.set_size.to_le_bytes());
        out[24..32].copy_from_slice(&self.reserved.to_le_bytes());
        out
    }
}

/// Decoded hint snapshot: header plus every physical entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintSnapshot {
    pub header: SnapshotHeader,
    pub entries: Vec<DbEntry>,
}

impl HintSnapshot {
    /// Build a snapshot from raw balances, padding to `chunk_size * set_size`
    pub fn from_balances(mut balances: Vec<DbEntry>) -> Self {
        let params = PlinkoParams::new(balances.len() as u64);
        let total = params.total_entries() as usize;
        if balances.len() < total {
            balances.resize(total, 0);
        }
        Self {
            header: SnapshotHeader::from_params(&params),
            entries: balances,
        }
    }

    /// Build a snapshot with explicit sizing (entries are padded or kept as is)
    pub fn with_params(params: PlinkoParams, mut entries: Vec<DbEntry>) -> Self {
        let total = params.total_entries() as usize;
        if entries.len() < total {
            entries.resize(total, 0);
        }
        Self {
            header: SnapshotHeader::from_params(&params),
            entries,
        }
    }

    /// Decode a snapshot
    ///
    /// Fails if the header is incomplete, the body is not a whole number of
    /// 8-byte entries, or `chunk_size * set_size` does not equal the number
    /// of entries. A host cannot serve from a malformed snapshot.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let header = SnapshotHeader::from_bytes(data)?;

        let body = &data[SNAPSHOT_HEADER_SIZE..];
        let trailing = body.len() % ENTRY_SIZE;
        if trailing != 0 {
            return Err(Error::SnapshotMisaligned { trailing });
        }

        let entries = body
            .chunks_exact(ENTRY_SIZE)
            .map(|chunk| read_u64(chunk, 0))
            .collect::<Vec<_>>();

        let entry_count = entries.len() as u64;
        if header.chunk_size.checked_mul(header.set_size) != Some(entry_count) {
            return Err(Error::SnapshotLayout {
                chunk_size: header.chunk_size,
                set_size: header.set_size,
                entries: entry_count,
            });
        }

        Ok(Self { header, entries })
    }

    /// Encode header then entries verbatim (padding included)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SNAPSHOT_HEADER_SIZE + self.entries.len() * ENTRY_SIZE);
        out.extend_from_slice(&self.header.to_bytes());
        for entry in &self.entries {
            out.extend_from_slice(&entry.to_le_bytes());
        }
        out
    }

    /// Load from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Save to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&self.header.to_bytes())?;
        for entry in &self.entries {
            writer.write_all(&entry.to_le_bytes())?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn params(&self) -> PlinkoParams {
        self.header.params()
    }

    /// Re-derive sizes from `db_size` and check header and body agree
    pub fn verify(&self) -> Result<()> {
        let expected = PlinkoParams::new(self.header.db_size);
        if self.header.chunk_size != expected.chunk_size {
            return Err(Error::ParamsMismatch {
                field: "chunk_size",
                expected: expected.chunk_size,
                actual: self.header.chunk_size,
            });
        }
        if self.header.set_size != expected.set_size {
            return Err(Error::ParamsMismatch {
                field: "set_size",
                expected: expected.set_size,
                actual: self.header.set_size,
            });
        }
        if self.entries.len() as u64 != expected.total_entries() {
            return Err(Error::ParamsMismatch {
                field: "total_entries",
                expected: expected.total_entries(),
                actual: self.entries.len() as u64,
            });
        }
        Ok(())
    }

    /// Expected file size for this header: `32 + 8 * chunk_size * set_size`
    pub fn expected_file_size(&self) -> u64 {
        SNAPSHOT_HEADER_SIZE as u64 + self.params().total_entries() * ENTRY_SIZE as u64
    }

    /// Client-side delta application: XOR the delta into the first entry of
    /// chunk `hint_set_id`. Deltas naming a chunk outside the copy are ignored.
    pub fn apply_delta(&mut self, delta: &HintDelta) -> bool {
        let offset = delta.hint_set_id.checked_mul(self.header.chunk_size);
        match offset.and_then(|o| self.entries.get_mut(o as usize)) {
            Some(entry) => {
                *entry = delta.apply(*entry);
                true
            }
            None => false,
        }
    }

    /// Move the entries into a shared in-memory database
    pub fn into_database(self) -> Database {
        Database::new(self.entries, self.header.db_size)
    }
}

#[inline]
fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

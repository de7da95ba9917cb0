//! Source artifacts consumed by hint generation
//!
//! - `database.bin`: `DBSize` little-endian u64 balances, sorted by address
//! - `address-mapping.bin`: `DBSize` records of `[address:20][index:u32-le]`

use std::collections::HashMap;
use std::path::Path;

use crate::{DbEntry, Error, Result, ENTRY_SIZE};

/// Account identifier
pub type Address = [u8; 20];

/// Mapping record size in bytes
pub const ADDRESS_MAPPING_RECORD_SIZE: usize = 24;

/// Decode `database.bin`
pub fn read_balances(data: &[u8]) -> Result<Vec<DbEntry>> {
    if data.len() % ENTRY_SIZE != 0 {
        return Err(Error::SourceMisaligned {
            len: data.len(),
            record_size: ENTRY_SIZE,
        });
    }
    Ok(data
        .chunks_exact(ENTRY_SIZE)
        .map(|c| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(c);
            u64::from_le_bytes(buf)
        })
        .collect())
}

/// Encode `database.bin`
pub fn encode_balances(balances: &[DbEntry]) -> Vec<u8> {
    balances.iter().flat_map(|b| b.to_le_bytes()).collect()
}

/// Load `database.bin` from disk
pub fn load_balances<P: AsRef<Path>>(path: P) -> Result<Vec<DbEntry>> {
    read_balances(&std::fs::read(path)?)
}

/// Address to database index table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressMapping {
    entries: Vec<(Address, u32)>,
    lookup: HashMap<Address, u32>,
}

impl AddressMapping {
    /// Build from addresses already in database order
    pub fn from_sorted(addresses: &[Address]) -> Self {
        let entries: Vec<(Address, u32)> = addresses
            .iter()
            .enumerate()
            .map(|(i, a)| (*a, i as u32))
            .collect();
        Self::from_entries(entries)
    }

    fn from_entries(entries: Vec<(Address, u32)>) -> Self {
        let lookup = entries.iter().copied().collect();
        Self { entries, lookup }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() % ADDRESS_MAPPING_RECORD_SIZE != 0 {
            return Err(Error::SourceMisaligned {
                len: data.len(),
                record_size: ADDRESS_MAPPING_RECORD_SIZE,
            });
        }
        let entries = data
            .chunks_exact(ADDRESS_MAPPING_RECORD_SIZE)
            .map(|rec| {
                let mut address = [0u8; 20];
                address.copy_from_slice(&rec[..20]);
                let mut idx = [0u8; 4];
                idx.copy_from_slice(&rec[20..24]);
                (address, u32::from_le_bytes(idx))
            })
            .collect();
        Ok(Self::from_entries(entries))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.entries.len() * ADDRESS_MAPPING_RECORD_SIZE);
        for (address, index) in &self.entries {
            out.extend_from_slice(address);
            out.extend_from_slice(&index.to_le_bytes());
        }
        out
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_bytes(&std::fs::read(path)?)
    }

    /// Database index of `address`
    pub fn lookup(&self, address: &Address) -> Option<u64> {
        self.lookup.get(address).map(|&i| i as u64)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

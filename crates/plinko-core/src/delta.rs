//! Hint deltas and the delta file format
//!
//! ```text
//! [count:8][reserved:8]                                16-byte header, u64 little-endian
//! [hintSetID:8][isBackupSet:8 (0/1)][xorDelta:8]       24 bytes per record
//! ```

use serde::{Deserialize, Serialize};

use crate::{DbEntry, Error, Result};

/// Header size in bytes
pub const DELTA_HEADER_SIZE: usize = 16;

/// Record size in bytes
pub const DELTA_RECORD_SIZE: usize = 24;

/// Incremental correction for a client-held hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintDelta {
    pub hint_set_id: u64,
    /// Routes to the backup set table; never set by the update manager today
    pub is_backup_set: bool,
    /// `old_value ^ new_value`
    pub delta: u64,
}

impl HintDelta {
    /// Primary-set delta
    pub fn new(hint_set_id: u64, delta: u64) -> Self {
        Self {
            hint_set_id,
            is_backup_set: false,
            delta,
        }
    }

    /// Apply this delta to a parity value
    #[inline]
    pub fn apply(&self, value: DbEntry) -> DbEntry {
        value ^ self.delta
    }
}

/// Replace `old` with `new` inside an XOR parity
#[inline]
pub fn xor_update(parity: DbEntry, old: DbEntry, new: DbEntry) -> DbEntry {
    parity ^ old ^ new
}

/// Encode a delta file
pub fn encode_deltas(deltas: &[HintDelta]) -> Vec<u8> {
    let mut data = Vec::with_capacity(DELTA_HEADER_SIZE + deltas.len() * DELTA_RECORD_SIZE);
    data.extend_from_slice(&(deltas.len() as u64).to_le_bytes());
    data.extend_from_slice(&0u64.to_le_bytes());
    for d in deltas {
        data.extend_from_slice(&d.hint_set_id.to_le_bytes());
        data.extend_from_slice(&(d.is_backup_set as u64).to_le_bytes());
        data.extend_from_slice(&d.delta.to_le_bytes());
    }
    data
}

/// Decode a delta file. Trailing bytes past the last record are ignored.
pub fn decode_deltas(data: &[u8]) -> Result<Vec<HintDelta>> {
    if data.len() < DELTA_HEADER_SIZE {
        return Err(Error::DeltaHeaderTooShort { actual: data.len() });
    }

    let count = read_u64(data, 0);

    // count comes from the file; must not overflow on 32-bit targets
    let expected = usize::try_from(count)
        .ok()
        .and_then(|c| c.checked_mul(DELTA_RECORD_SIZE))
        .and_then(|p| p.checked_add(DELTA_HEADER_SIZE))
        .ok_or(Error::TooManyDeltas { count })?;

    if data.len() < expected {
        return Err(Error::DeltaTruncated {
            expected,
            actual: data.len(),
        });
    }

    let deltas = data[DELTA_HEADER_SIZE..expected]
        .chunks_exact(DELTA_RECORD_SIZE)
        .map(|rec| HintDelta {
            hint_set_id: read_u64(rec, 0),
            is_backup_set: read_u64(rec, 8) != 0,
            delta: read_u64(rec, 16),
        })
        .collect();

    Ok(deltas)
}

#[inline]
fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_file_roundtrip() {
        let deltas = vec![
            HintDelta::new(3, 0xFF),
            HintDelta {
                hint_set_id: 900,
                is_backup_set: true,
                delta: u64::MAX,
            },
        ];

        let bytes = encode_deltas(&deltas);
        assert_eq!(bytes.len(), DELTA_HEADER_SIZE + 2 * DELTA_RECORD_SIZE);
        assert_eq!(decode_deltas(&bytes).unwrap(), deltas);
    }

    #[test]
    fn test_record_layout() {
        let bytes = encode_deltas(&[HintDelta::new(7, 0x0102)]);
        assert_eq!(&bytes[0..8], &1u64.to_le_bytes());
        assert_eq!(&bytes[8..16], &[0u8; 8]);
        assert_eq!(&bytes[16..24], &7u64.to_le_bytes());
        assert_eq!(&bytes[24..32], &0u64.to_le_bytes());
        assert_eq!(&bytes[32..40], &0x0102u64.to_le_bytes());
    }

    #[test]
    fn test_empty_file() {
        let bytes = encode_deltas(&[]);
        assert_eq!(bytes.len(), DELTA_HEADER_SIZE);
        assert!(decode_deltas(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_header_too_short() {
        assert!(matches!(
            decode_deltas(&[0u8; 15]),
            Err(Error::DeltaHeaderTooShort { actual: 15 })
        ));
    }

    #[test]
    fn test_truncated() {
        let mut bytes = encode_deltas(&[HintDelta::new(1, 1), HintDelta::new(2, 2)]);
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(
            decode_deltas(&bytes),
            Err(Error::DeltaTruncated { expected: 64, actual: 63 })
        ));
    }

    #[test]
    fn test_huge_count_rejected() {
        let mut data = vec![0u8; 16];
        data[0..8].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(decode_deltas(&data).is_err());
    }

    #[test]
    fn test_xor_self_inverse() {
        let delta = HintDelta::new(0, 100 ^ 200);
        let value = 0xDEAD_BEEF;
        assert_eq!(delta.apply(delta.apply(value)), value);
    }

    #[test]
    fn test_xor_update_replaces_member() {
        let parity = 1 ^ 2 ^ 3;
        assert_eq!(xor_update(parity, 2, 9), 1 ^ 9 ^ 3);
    }
}

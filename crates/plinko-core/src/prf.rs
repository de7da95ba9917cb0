//! Keyed mixing function shared by the iPRF and PRSet
//!
//! Callers only rely on `key x input -> u64`, deterministic. The reference
//! mixer is an FNV-1a accumulator and is **not** a secure PRF; [`Aes128Mix`]
//! can be substituted without touching any call site.

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;

/// PRF key size in bytes
pub const PRF_KEY_SIZE: usize = 16;

/// PRF key (16 bytes)
pub type PrfKey128 = [u8; PRF_KEY_SIZE];

const FNV_OFFSET: u64 = 2_166_136_261;
const FNV_PRIME: u64 = 16_777_619;

/// Deterministic keyed function `H(key, x) -> u64`
pub trait KeyedMix: Send + Sync {
    /// Bind the function to a key
    fn new(key: &PrfKey128) -> Self
    where
        Self: Sized;

    /// Evaluate on `x`. Call sites truncate the output as they need.
    fn eval(&self, x: u64) -> u64;
}

/// FNV-1a style accumulator over the key bytes then the little-endian input
#[derive(Debug, Clone)]
pub struct Fnv1aMix {
    /// Accumulator state after absorbing the key
    keyed: u64,
}

impl KeyedMix for Fnv1aMix {
    fn new(key: &PrfKey128) -> Self {
        Self {
            keyed: absorb(FNV_OFFSET, key),
        }
    }

    fn eval(&self, x: u64) -> u64 {
        absorb(self.keyed, &x.to_le_bytes())
    }
}

#[inline]
fn absorb(mut hash: u64, bytes: &[u8]) -> u64 {
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// AES-128 keyed mixer: encrypts the little-endian input block and keeps
/// the first 8 bytes of ciphertext
#[derive(Clone)]
pub struct Aes128Mix {
    cipher: Aes128,
}

impl KeyedMix for Aes128Mix {
    fn new(key: &PrfKey128) -> Self {
        Self {
            cipher: Aes128::new(&(*key).into()),
        }
    }

    fn eval(&self, x: u64) -> u64 {
        let mut block = [0u8; 16];
        block[..8].copy_from_slice(&x.to_le_bytes());

        let mut encrypted = block.into();
        self.cipher.encrypt_block(&mut encrypted);

        let mut out = [0u8; 8];
        out.copy_from_slice(&encrypted[..8]);
        u64::from_le_bytes(out)
    }
}

/// Parse a key from an arbitrary byte slice, rejecting any length but 16
pub fn key_from_slice(bytes: &[u8]) -> crate::Result<PrfKey128> {
    bytes
        .try_into()
        .map_err(|_| crate::Error::InvalidKeyLength {
            actual: bytes.len(),
        })
}

//! Key material for essence encryption.
//!
//! # Security
//!
//! Content key bytes are zeroized on drop so key material does not linger
//! in memory after use.

use crate::error::{CryptoError, Result};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of an AES-128 key in bytes.
pub const AES_128_KEY_SIZE: usize = 16;

/// Size of a CBC initialization vector in bytes.
pub const IV_SIZE: usize = 16;

/// Which MIC key derivation procedure to apply to a content key.
///
/// Track files written against the standards-track label set derive the
/// integrity key with the FIPS 186-2 procedure; legacy interop files use a
/// single SHA-1 pass over the key and a fixed nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDerivationMode {
    /// FIPS 186-2 Sec. 3.1 (with Change 1) two-round derivation.
    Smpte,
    /// Legacy interop derivation: `SHA1(key || key_nonce)`.
    Interop,
}

/// A 128-bit content encryption key.
///
/// The key bytes are zeroized when the value is dropped and are redacted
/// from `Debug` output.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ContentKey {
    key: [u8; AES_128_KEY_SIZE],
}

impl ContentKey {
    /// Create a content key from raw bytes.
    pub fn new(key: [u8; AES_128_KEY_SIZE]) -> Self {
        Self { key }
    }

    /// Create a content key from a byte slice.
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != AES_128_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: AES_128_KEY_SIZE,
                actual: slice.len(),
            });
        }
        let mut key = [0u8; AES_128_KEY_SIZE];
        key.copy_from_slice(slice);
        Ok(Self { key })
    }

    /// Create a content key from a hex string (dashes and spaces ignored).
    pub fn from_hex(hex: &str) -> Result<Self> {
        let hex = hex.replace(['-', ' '], "");
        if hex.len() != AES_128_KEY_SIZE * 2 {
            return Err(CryptoError::InvalidKeyLength {
                expected: AES_128_KEY_SIZE * 2,
                actual: hex.len(),
            });
        }

        let mut key = [0u8; AES_128_KEY_SIZE];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let hex_str = std::str::from_utf8(chunk)
                .map_err(|_| CryptoError::CryptInit("invalid hex string".into()))?;
            key[i] = u8::from_str_radix(hex_str, 16)
                .map_err(|_| CryptoError::CryptInit("invalid hex character".into()))?;
        }
        Ok(Self { key })
    }

    /// Generate a random content key.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut key = [0u8; AES_128_KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut key);
        Self { key }
    }

    /// Get the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; AES_128_KEY_SIZE] {
        &self.key
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentKey([REDACTED])")
    }
}

/// A 16-byte CBC initialization vector.
///
/// IVs are per-frame public values; unlike [`ContentKey`] they are plain
/// copyable data.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Iv([u8; IV_SIZE]);

impl Iv {
    /// Create an IV from raw bytes.
    pub fn new(bytes: [u8; IV_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create an IV from a byte slice.
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != IV_SIZE {
            return Err(CryptoError::InvalidIvLength {
                expected: IV_SIZE,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; IV_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Generate a random IV.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; IV_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// The all-zero IV.
    pub fn zero() -> Self {
        Self([0u8; IV_SIZE])
    }

    /// Get the raw IV bytes.
    pub fn as_bytes(&self) -> &[u8; IV_SIZE] {
        &self.0
    }
}

impl fmt::Debug for Iv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Iv(")?;
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_from_slice() {
        let key = ContentKey::from_slice(&[0xAB; 16]).unwrap();
        assert_eq!(key.as_bytes(), &[0xAB; 16]);

        let err = ContentKey::from_slice(&[0u8; 15]).unwrap_err();
        assert_eq!(err.code(), "CRYPT_INIT");
    }

    #[test]
    fn test_key_from_hex() {
        let key = ContentKey::from_hex("000102030405060708090a0b0c0d0e0f").unwrap();
        assert_eq!(key.as_bytes()[1], 0x01);
        assert_eq!(key.as_bytes()[15], 0x0f);

        let with_dashes = ContentKey::from_hex("00010203-04050607-08090a0b-0c0d0e0f").unwrap();
        assert_eq!(key, with_dashes);
    }

    #[test]
    fn test_key_debug_redacted() {
        let key = ContentKey::generate();
        assert_eq!(format!("{:?}", key), "ContentKey([REDACTED])");
    }

    #[test]
    fn test_iv_lengths() {
        assert!(Iv::from_slice(&[0u8; 16]).is_ok());
        assert!(Iv::from_slice(&[0u8; 12]).is_err());
    }
}

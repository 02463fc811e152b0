//! AES-128-CBC block encryption contexts.
//!
//! Essence payloads are enciphered one 16-byte block at a time with an
//! explicit, caller-visible chaining vector. Encryption and decryption keep
//! separate key schedules; each context carries a mutable IV that advances
//! with every block processed, so a context can run across an entire
//! encrypted source value in successive calls.

use crate::error::{CryptoError, Result};
use crate::key::{ContentKey, Iv, AES_128_KEY_SIZE, IV_SIZE};
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;

/// AES block size in bytes.
pub const CBC_BLOCK_SIZE: usize = 16;

/// AES-128-CBC encryption context.
///
/// For each block: `out = AES(pt XOR iv); iv = out`. Input must be a whole
/// number of blocks. The IV may be reset any number of times for a given
/// key.
#[derive(Debug)]
pub struct CbcEncryptor {
    cipher: Aes128,
    iv: [u8; IV_SIZE],
}

impl CbcEncryptor {
    /// Create an encryption context keyed with `key`. The IV starts at zero.
    pub fn new(key: &ContentKey) -> Self {
        Self {
            cipher: Aes128::new(key.as_bytes().into()),
            iv: [0u8; IV_SIZE],
        }
    }

    /// Create an encryption context from raw key bytes.
    pub fn from_key_bytes(key: &[u8]) -> Result<Self> {
        if key.len() != AES_128_KEY_SIZE {
            return Err(CryptoError::CryptInit(format!(
                "AES-128 key must be {} bytes, got {}",
                AES_128_KEY_SIZE,
                key.len()
            )));
        }
        Ok(Self::new(&ContentKey::from_slice(key)?))
    }

    /// Set the chaining vector.
    pub fn set_iv(&mut self, iv: &Iv) {
        self.iv.copy_from_slice(iv.as_bytes());
    }

    /// Current chaining vector.
    pub fn iv(&self) -> Iv {
        Iv::new(self.iv)
    }

    /// Encrypt whole blocks in place, advancing the IV to the last
    /// ciphertext block.
    pub fn encrypt_in_place(&mut self, data: &mut [u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        if data.len() % CBC_BLOCK_SIZE != 0 {
            return Err(CryptoError::BlockAlignment {
                size: data.len(),
                block_size: CBC_BLOCK_SIZE,
            });
        }

        for block in data.chunks_exact_mut(CBC_BLOCK_SIZE) {
            for (byte, iv_byte) in block.iter_mut().zip(self.iv.iter()) {
                *byte ^= iv_byte;
            }

            let block_len = block.len();
            let block_array: &mut [u8; CBC_BLOCK_SIZE] = block.try_into().map_err(|_| {
                CryptoError::BlockAlignment {
                    size: block_len,
                    block_size: CBC_BLOCK_SIZE,
                }
            })?;
            self.cipher.encrypt_block(block_array.into());

            self.iv.copy_from_slice(block);
        }

        Ok(())
    }
}

/// AES-128-CBC decryption context.
///
/// For each block: `out = AES_DEC(ct) XOR iv; iv = ct`. The IV advances to
/// the just-consumed ciphertext block.
pub struct CbcDecryptor {
    cipher: Aes128,
    iv: [u8; IV_SIZE],
}

impl CbcDecryptor {
    /// Create a decryption context keyed with `key`. The IV starts at zero.
    pub fn new(key: &ContentKey) -> Self {
        Self {
            cipher: Aes128::new(key.as_bytes().into()),
            iv: [0u8; IV_SIZE],
        }
    }

    /// Create a decryption context from raw key bytes.
    pub fn from_key_bytes(key: &[u8]) -> Result<Self> {
        if key.len() != AES_128_KEY_SIZE {
            return Err(CryptoError::CryptInit(format!(
                "AES-128 key must be {} bytes, got {}",
                AES_128_KEY_SIZE,
                key.len()
            )));
        }
        Ok(Self::new(&ContentKey::from_slice(key)?))
    }

    /// Set the chaining vector.
    pub fn set_iv(&mut self, iv: &Iv) {
        self.iv.copy_from_slice(iv.as_bytes());
    }

    /// Current chaining vector.
    pub fn iv(&self) -> Iv {
        Iv::new(self.iv)
    }

    /// Decrypt whole blocks in place, advancing the IV to the last
    /// ciphertext block consumed.
    pub fn decrypt_in_place(&mut self, data: &mut [u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        if data.len() % CBC_BLOCK_SIZE != 0 {
            return Err(CryptoError::BlockAlignment {
                size: data.len(),
                block_size: CBC_BLOCK_SIZE,
            });
        }

        for block in data.chunks_exact_mut(CBC_BLOCK_SIZE) {
            let mut ciphertext = [0u8; CBC_BLOCK_SIZE];
            ciphertext.copy_from_slice(block);

            let block_len = block.len();
            let block_array: &mut [u8; CBC_BLOCK_SIZE] = block.try_into().map_err(|_| {
                CryptoError::BlockAlignment {
                    size: block_len,
                    block_size: CBC_BLOCK_SIZE,
                }
            })?;
            self.cipher.decrypt_block(block_array.into());

            for (byte, iv_byte) in block_array.iter_mut().zip(self.iv.iter()) {
                *byte ^= iv_byte;
            }

            self.iv = ciphertext;
        }

        Ok(())
    }
}

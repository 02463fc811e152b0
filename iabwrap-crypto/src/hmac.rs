//! HMAC-SHA1 integrity context.
//!
//! The construction differs from RFC 2104 in one respect: the 16-byte MIC
//! key is XORed directly against 16-byte inner/outer pads rather than being
//! extended to the hash block size. The context is an explicit state
//! machine (`new`/`reset` -> `update`* -> `finalize` -> `value`/`verify`)
//! and rejects out-of-order use.

use crate::error::{CryptoError, Result};
use crate::kdf::derive_mic_key;
use crate::key::{ContentKey, KeyDerivationMode};
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// Size of the HMAC output in bytes.
pub const HMAC_SIZE: usize = 20;

const KEY_LEN: usize = 16;
const IPAD: u8 = 0x36;
const OPAD: u8 = 0x5c;

/// HMAC-SHA1 context keyed with a derived MIC key.
///
/// The same context may be reused across frames: call [`reset`] to rewind
/// to the post-keying state.
///
/// [`reset`]: HmacContext::reset
pub struct HmacContext {
    mic_key: [u8; KEY_LEN],
    sha: Sha1,
    value: [u8; HMAC_SIZE],
    finalized: bool,
}

impl HmacContext {
    /// Derive the MIC key from `key` using `mode` and start the inner hash.
    pub fn new(key: &ContentKey, mode: KeyDerivationMode) -> Self {
        let mut ctx = Self {
            mic_key: derive_mic_key(key, mode),
            sha: Sha1::new(),
            value: [0u8; HMAC_SIZE],
            finalized: false,
        };
        ctx.reset();
        ctx
    }

    /// Rewind to the post-keying state: clears the digest, drops the
    /// finalized flag, and restarts the inner hash over `key XOR ipad`.
    pub fn reset(&mut self) {
        self.value = [0u8; HMAC_SIZE];
        self.finalized = false;

        let mut xor_buf = [0u8; KEY_LEN];
        for (out, key_byte) in xor_buf.iter_mut().zip(self.mic_key.iter()) {
            *out = key_byte ^ IPAD;
        }

        self.sha = Sha1::new();
        self.sha.update(xor_buf);
    }

    /// Feed data into the inner hash. Fails with `Init` after finalize.
    pub fn update(&mut self, buf: &[u8]) -> Result<()> {
        if self.finalized {
            return Err(CryptoError::Init);
        }
        self.sha.update(buf);
        Ok(())
    }

    /// Complete the construction: `SHA1(key XOR opad || inner_digest)`.
    /// Fails with `Init` if already finalized.
    pub fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Err(CryptoError::Init);
        }

        let inner = std::mem::replace(&mut self.sha, Sha1::new());
        let inner_digest: [u8; HMAC_SIZE] = inner.finalize().into();

        let mut xor_buf = [0u8; KEY_LEN];
        for (out, key_byte) in xor_buf.iter_mut().zip(self.mic_key.iter()) {
            *out = key_byte ^ OPAD;
        }

        let mut outer = Sha1::new();
        outer.update(xor_buf);
        outer.update(inner_digest);
        self.value = outer.finalize().into();
        self.finalized = true;

        Ok(())
    }

    /// The finalized digest. Fails with `Init` before finalize.
    pub fn value(&self) -> Result<&[u8; HMAC_SIZE]> {
        if !self.finalized {
            return Err(CryptoError::Init);
        }
        Ok(&self.value)
    }

    /// Compare the finalized digest against `expected` in constant time.
    /// A mismatch is `HmacMismatch`; the digest stays inspectable.
    pub fn verify(&self, expected: &[u8]) -> Result<()> {
        if !self.finalized {
            return Err(CryptoError::Init);
        }

        if bool::from(self.value.ct_eq(expected)) {
            Ok(())
        } else {
            Err(CryptoError::HmacMismatch)
        }
    }
}

impl Drop for HmacContext {
    fn drop(&mut self) {
        self.mic_key.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> HmacContext {
        HmacContext::new(&ContentKey::new([0x33; 16]), KeyDerivationMode::Smpte)
    }

    #[test]
    fn test_matches_manual_construction() {
        let key = ContentKey::new([0x33; 16]);
        let mic_key = derive_mic_key(&key, KeyDerivationMode::Smpte);
        let data = b"the quick brown fox";

        let mut inner_key = [0u8; 16];
        let mut outer_key = [0u8; 16];
        for i in 0..16 {
            inner_key[i] = mic_key[i] ^ IPAD;
            outer_key[i] = mic_key[i] ^ OPAD;
        }

        let mut inner = Sha1::new();
        inner.update(inner_key);
        inner.update(data);
        let inner_digest: [u8; 20] = inner.finalize().into();

        let mut outer = Sha1::new();
        outer.update(outer_key);
        outer.update(inner_digest);
        let expected: [u8; 20] = outer.finalize().into();

        let mut ctx = context();
        ctx.update(data).unwrap();
        ctx.finalize().unwrap();
        assert_eq!(ctx.value().unwrap(), &expected);
    }

    #[test]
    fn test_verify_ok_and_mismatch() {
        let mut ctx = context();
        ctx.update(b"payload").unwrap();
        ctx.finalize().unwrap();
        let mac = *ctx.value().unwrap();

        assert!(ctx.verify(&mac).is_ok());

        let mut flipped = mac;
        flipped[0] ^= 0x01;
        let err = ctx.verify(&flipped).unwrap_err();
        assert_eq!(err.code(), "HMACFAIL");

        // Digest stays inspectable after a failed verify.
        assert_eq!(ctx.value().unwrap(), &mac);
    }

    #[test]
    fn test_state_machine_misuse() {
        let mut ctx = context();

        // Read before finalize.
        assert!(matches!(ctx.value(), Err(CryptoError::Init)));
        assert!(matches!(ctx.verify(&[0u8; 20]), Err(CryptoError::Init)));

        ctx.update(b"data").unwrap();
        ctx.finalize().unwrap();

        // Update or finalize after finalize.
        assert!(matches!(ctx.update(b"more"), Err(CryptoError::Init)));
        assert!(matches!(ctx.finalize(), Err(CryptoError::Init)));
    }

    #[test]
    fn test_reset_allows_reuse() {
        let mut ctx = context();
        ctx.update(b"frame 0").unwrap();
        ctx.finalize().unwrap();
        let first = *ctx.value().unwrap();

        ctx.reset();
        ctx.update(b"frame 0").unwrap();
        ctx.finalize().unwrap();
        assert_eq!(ctx.value().unwrap(), &first);

        ctx.reset();
        ctx.update(b"frame 1").unwrap();
        ctx.finalize().unwrap();
        assert_ne!(ctx.value().unwrap(), &first);
    }

    #[test]
    fn test_any_bit_flip_changes_mac() {
        let preimage = [0xA5u8; 48];

        let mut ctx = context();
        ctx.update(&preimage).unwrap();
        ctx.finalize().unwrap();
        let reference = *ctx.value().unwrap();

        for byte in 0..preimage.len() {
            let mut mutated = preimage;
            mutated[byte] ^= 0x80;

            ctx.reset();
            ctx.update(&mutated).unwrap();
            ctx.finalize().unwrap();
            assert!(ctx.verify(&reference).is_err());
        }
    }
}

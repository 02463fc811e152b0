//! MIC key derivation.
//!
//! The 16-byte message integrity check key is never the raw content key;
//! it is derived by one of two procedures selected by the track file's
//! label set.

use crate::key::{ContentKey, KeyDerivationMode};
use sha1::{Digest, Sha1};

/// Fixed `t` seed from FIPS 186-2 Sec. 3.1 (the SHA-1 initial state words).
const T_SEED: [u8; 20] = [
    0x67, 0x45, 0x23, 0x01, 0xef, 0xcd, 0xab, 0x89, 0x98, 0xba, 0xdc, 0xfe, 0x10, 0x32, 0x54,
    0x76, 0xc3, 0xd2, 0xe1, 0xf0,
];

/// Fixed nonce for the interop derivation.
const INTEROP_KEY_NONCE: [u8; 16] = [
    0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee,
    0xff,
];

/// Derive the 16-byte MIC key from a content key.
///
/// Both procedures are pure functions of the key.
pub fn derive_mic_key(key: &ContentKey, mode: KeyDerivationMode) -> [u8; 16] {
    match mode {
        KeyDerivationMode::Smpte => derive_smpte(key.as_bytes()),
        KeyDerivationMode::Interop => derive_interop(key.as_bytes()),
    }
}

/// FIPS 186-2 Sec. 3.1 (as modified by Change 1) general purpose random
/// number generation, run for two rounds with XSEED = 0.
fn derive_smpte(key: &[u8; 16]) -> [u8; 16] {
    // Round 1: x0 = G(t, xkey) with xkey = key.
    let mut sha = Sha1::new();
    sha.update(T_SEED);
    sha.update(key);
    let x0: [u8; 20] = sha.finalize().into();

    // xkey1 = (xkey + 1 + x0) mod 2^160. The addition must carry across
    // the full 160 bits; the key occupies the low 128.
    let mut xkey = [0u8; 20];
    xkey[4..].copy_from_slice(key);
    add_be_160(&mut xkey, &[1]);
    add_be_160(&mut xkey, &x0);

    // Round 2: x1 = G(t, xkey1) over the minimal big-endian encoding of
    // xkey1, leading zero bytes stripped.
    let first_nonzero = xkey.iter().position(|&b| b != 0).unwrap_or(xkey.len());
    let mut sha = Sha1::new();
    sha.update(T_SEED);
    sha.update(&xkey[first_nonzero..]);
    let x1: [u8; 20] = sha.finalize().into();

    let mut mic_key = [0u8; 16];
    mic_key.copy_from_slice(&x1[..16]);
    mic_key
}

/// Interop derivation: `MICKey = trunc(SHA1(key || key_nonce))`.
fn derive_interop(key: &[u8; 16]) -> [u8; 16] {
    let mut sha = Sha1::new();
    sha.update(key);
    sha.update(INTEROP_KEY_NONCE);
    let digest: [u8; 20] = sha.finalize().into();

    let mut mic_key = [0u8; 16];
    mic_key.copy_from_slice(&digest[..16]);
    mic_key
}

/// Big-endian addition into a 160-bit accumulator. The addend is
/// right-aligned; a carry out of bit 160 is discarded, which is exactly
/// the `mod 2^160` reduction.
fn add_be_160(acc: &mut [u8; 20], addend: &[u8]) {
    debug_assert!(addend.len() <= acc.len());

    let offset = acc.len() - addend.len();
    let mut carry = 0u16;

    for i in (0..acc.len()).rev() {
        let a = acc[i] as u16;
        let b = if i >= offset { addend[i - offset] as u16 } else { 0 };
        let sum = a + b + carry;
        acc[i] = sum as u8;
        carry = sum >> 8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ContentKey;

    #[test]
    fn test_add_carry_propagates() {
        let mut acc = [0xFFu8; 20];
        add_be_160(&mut acc, &[1]);
        assert_eq!(acc, [0u8; 20]);

        let mut acc = [0u8; 20];
        acc[19] = 0xFF;
        add_be_160(&mut acc, &[0x01]);
        assert_eq!(acc[18], 0x01);
        assert_eq!(acc[19], 0x00);
    }

    #[test]
    fn test_smpte_derivation_zero_key() {
        // Independent computation of the specified formula:
        // trunc16(SHA1(t || minimal_be((1 + SHA1(t || K)) mod 2^160)))
        let key = ContentKey::new([0u8; 16]);

        let mut sha = Sha1::new();
        sha.update(T_SEED);
        sha.update([0u8; 16]);
        let x0: [u8; 20] = sha.finalize().into();

        let mut xkey = [0u8; 20];
        add_be_160(&mut xkey, &x0);
        add_be_160(&mut xkey, &[1]);

        let first = xkey.iter().position(|&b| b != 0).unwrap_or(20);
        let mut sha = Sha1::new();
        sha.update(T_SEED);
        sha.update(&xkey[first..]);
        let expected: [u8; 20] = sha.finalize().into();

        let derived = derive_mic_key(&key, KeyDerivationMode::Smpte);
        assert_eq!(derived, expected[..16]);
    }

    #[test]
    fn test_interop_derivation_formula() {
        let key = ContentKey::new([0x24; 16]);

        let mut sha = Sha1::new();
        sha.update([0x24; 16]);
        sha.update(INTEROP_KEY_NONCE);
        let expected: [u8; 20] = sha.finalize().into();

        let derived = derive_mic_key(&key, KeyDerivationMode::Interop);
        assert_eq!(derived, expected[..16]);
    }

    #[test]
    fn test_derivations_deterministic_and_distinct() {
        let key = ContentKey::generate();

        let smpte_a = derive_mic_key(&key, KeyDerivationMode::Smpte);
        let smpte_b = derive_mic_key(&key, KeyDerivationMode::Smpte);
        assert_eq!(smpte_a, smpte_b);

        let interop_a = derive_mic_key(&key, KeyDerivationMode::Interop);
        let interop_b = derive_mic_key(&key, KeyDerivationMode::Interop);
        assert_eq!(interop_a, interop_b);

        assert_ne!(smpte_a, interop_a);
    }
}

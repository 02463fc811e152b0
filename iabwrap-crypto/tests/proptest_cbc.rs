//! Property-based tests for the CBC contexts and key derivation.

use iabwrap_crypto::{
    derive_mic_key, CbcDecryptor, CbcEncryptor, ContentKey, HmacContext, Iv, KeyDerivationMode,
};
use proptest::prelude::*;

proptest! {
    /// Dec(Enc(P)) == P for any key, IV, and block-aligned plaintext.
    #[test]
    fn roundtrip_cbc(
        key in any::<[u8; 16]>(),
        iv in any::<[u8; 16]>(),
        blocks in 1usize..=16,
        fill in any::<u8>(),
    ) {
        let key = ContentKey::new(key);
        let iv = Iv::new(iv);
        let original = vec![fill; blocks * 16];

        let mut data = original.clone();
        let mut enc = CbcEncryptor::new(&key);
        enc.set_iv(&iv);
        enc.encrypt_in_place(&mut data).unwrap();

        let mut dec = CbcDecryptor::new(&key);
        dec.set_iv(&iv);
        dec.decrypt_in_place(&mut data).unwrap();

        prop_assert_eq!(data, original);
    }

    /// Non-block-aligned input is always rejected.
    #[test]
    fn rejects_misaligned(len in 1usize..256) {
        prop_assume!(len % 16 != 0);

        let key = ContentKey::new([0u8; 16]);
        let mut enc = CbcEncryptor::new(&key);
        let mut data = vec![0u8; len];
        prop_assert!(enc.encrypt_in_place(&mut data).is_err());
    }

    /// Both derivations are pure functions of the key.
    #[test]
    fn kdf_deterministic(key in any::<[u8; 16]>()) {
        let key = ContentKey::new(key);
        prop_assert_eq!(
            derive_mic_key(&key, KeyDerivationMode::Smpte),
            derive_mic_key(&key, KeyDerivationMode::Smpte)
        );
        prop_assert_eq!(
            derive_mic_key(&key, KeyDerivationMode::Interop),
            derive_mic_key(&key, KeyDerivationMode::Interop)
        );
    }

    /// Flipping any single bit of the preimage breaks verification.
    #[test]
    fn hmac_detects_bit_flips(
        key in any::<[u8; 16]>(),
        data in proptest::collection::vec(any::<u8>(), 1..128),
        flip_byte in any::<prop::sample::Index>(),
        flip_bit in 0u8..8,
    ) {
        let key = ContentKey::new(key);
        let mut ctx = HmacContext::new(&key, KeyDerivationMode::Smpte);
        ctx.update(&data).unwrap();
        ctx.finalize().unwrap();
        let mac = *ctx.value().unwrap();

        let mut mutated = data.clone();
        let idx = flip_byte.index(mutated.len());
        mutated[idx] ^= 1 << flip_bit;

        ctx.reset();
        ctx.update(&mutated).unwrap();
        ctx.finalize().unwrap();
        prop_assert!(ctx.verify(&mac).is_err());

        ctx.reset();
        ctx.update(&data).unwrap();
        ctx.finalize().unwrap();
        prop_assert!(ctx.verify(&mac).is_ok());
    }
}

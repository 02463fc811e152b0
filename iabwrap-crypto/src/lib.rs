//! Essence encryption support for IAB track files.
//!
//! This crate provides the cryptographic framing used to protect essence
//! payloads inside clip-wrapped IAB track files:
//!
//! - **AES-128-CBC**: block-at-a-time encryption and decryption contexts
//!   with explicit, caller-controlled initialization vectors
//! - **MIC key derivation**: the two procedures used to derive the message
//!   integrity check key from the content key (the FIPS 186-2 based
//!   standards-track procedure and the legacy interoperability procedure)
//! - **HMAC-SHA1**: the keyed digest construction applied to each encrypted
//!   essence triplet, modelled as an explicit update/finalize state machine
//!
//! # Example
//!
//! ```
//! use iabwrap_crypto::{CbcDecryptor, CbcEncryptor, ContentKey, Iv};
//!
//! let key = ContentKey::generate();
//! let iv = Iv::generate();
//!
//! let mut data = vec![0u8; 64];
//! let mut enc = CbcEncryptor::new(&key);
//! enc.set_iv(&iv);
//! enc.encrypt_in_place(&mut data).unwrap();
//!
//! let mut dec = CbcDecryptor::new(&key);
//! dec.set_iv(&iv);
//! dec.decrypt_in_place(&mut data).unwrap();
//! assert_eq!(data, vec![0u8; 64]);
//! ```

mod cbc;
mod error;
mod hmac;
mod kdf;
mod key;

pub use cbc::{CbcDecryptor, CbcEncryptor, CBC_BLOCK_SIZE};
pub use error::{CryptoError, Result};
pub use hmac::{HmacContext, HMAC_SIZE};
pub use kdf::derive_mic_key;
pub use key::{ContentKey, Iv, KeyDerivationMode, AES_128_KEY_SIZE, IV_SIZE};

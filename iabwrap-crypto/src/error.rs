//! Error types for essence encryption operations.

use thiserror::Error;

/// Result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors raised by the encryption and integrity contexts.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Key schedule or context construction failed.
    #[error("crypto context init failed: {0}")]
    CryptInit(String),

    /// A context was used out of order (update after finalize, digest read
    /// before finalize, operation on an unkeyed context).
    #[error("crypto context not ready for this operation")]
    Init,

    /// Input is not block aligned.
    #[error("data length {size} is not a multiple of the {block_size}-byte cipher block")]
    BlockAlignment {
        /// Length of the offending input.
        size: usize,
        /// Required block size.
        block_size: usize,
    },

    /// Key material has the wrong length.
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Expected key length in bytes.
        expected: usize,
        /// Actual key length provided.
        actual: usize,
    },

    /// Initialization vector has the wrong length.
    #[error("invalid IV length: expected {expected} bytes, got {actual}")]
    InvalidIvLength {
        /// Expected IV length in bytes.
        expected: usize,
        /// Actual IV length provided.
        actual: usize,
    },

    /// Recomputed MAC does not match the stored value.
    #[error("HMAC value does not match")]
    HmacMismatch,
}

impl CryptoError {
    /// Stable error code for this error, as surfaced to callers.
    pub fn code(&self) -> &'static str {
        match self {
            CryptoError::CryptInit(_) => "CRYPT_INIT",
            CryptoError::Init => "INIT",
            CryptoError::BlockAlignment { .. } => "FORMAT",
            CryptoError::InvalidKeyLength { .. } => "CRYPT_INIT",
            CryptoError::InvalidIvLength { .. } => "CRYPT_INIT",
            CryptoError::HmacMismatch => "HMACFAIL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(CryptoError::Init.code(), "INIT");
        assert_eq!(CryptoError::HmacMismatch.code(), "HMACFAIL");
        assert_eq!(CryptoError::CryptInit("bad".into()).code(), "CRYPT_INIT");
    }

    #[test]
    fn test_error_display() {
        let err = CryptoError::BlockAlignment {
            size: 17,
            block_size: 16,
        };
        assert!(err.to_string().contains("17"));
        assert!(err.to_string().contains("16"));
    }
}

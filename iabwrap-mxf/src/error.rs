//! Error types for track file operations.

use iabwrap_crypto::CryptoError;
use std::fmt;
use std::io;

/// Result type for track file operations.
pub type Result<T> = std::result::Result<T, MxfError>;

/// Errors that can occur while reading or writing a track file.
#[derive(Debug)]
pub enum MxfError {
    /// IO error during read/write.
    Io(io::Error),
    /// Object not opened or used before initialization.
    Init,
    /// Operation called in the wrong state.
    State,
    /// Generic structural failure.
    Fail(String),
    /// Parser rejected the bytes.
    Format(String),
    /// Short read.
    ReadFail(String),
    /// Frame number out of range.
    Range(u32),
    /// Caller buffer too small.
    SmallBuf {
        needed: usize,
        capacity: usize,
    },
    /// BER encoding error.
    BerError(String),
    /// Missing required metadata.
    MissingMetadata(&'static str),
    /// Cryptographic framing error.
    Crypto(CryptoError),
}

impl MxfError {
    /// Stable error code for this error, as surfaced to callers.
    pub fn code(&self) -> &'static str {
        match self {
            MxfError::Io(_) => "FAIL",
            MxfError::Init => "INIT",
            MxfError::State => "STATE",
            MxfError::Fail(_) => "FAIL",
            MxfError::Format(_) => "FORMAT",
            MxfError::ReadFail(_) => "READFAIL",
            MxfError::Range(_) => "RANGE",
            MxfError::SmallBuf { .. } => "SMALLBUF",
            MxfError::BerError(_) => "FORMAT",
            MxfError::MissingMetadata(_) => "FAIL",
            MxfError::Crypto(e) => e.code(),
        }
    }
}

impl fmt::Display for MxfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MxfError::Io(e) => write!(f, "IO error: {}", e),
            MxfError::Init => write!(f, "object not initialized"),
            MxfError::State => write!(f, "operation not valid in the current state"),
            MxfError::Fail(msg) => write!(f, "operation failed: {}", msg),
            MxfError::Format(msg) => write!(f, "format error: {}", msg),
            MxfError::ReadFail(msg) => write!(f, "short read: {}", msg),
            MxfError::Range(frame) => write!(f, "frame number out of range: {}", frame),
            MxfError::SmallBuf { needed, capacity } => {
                write!(
                    f,
                    "buffer too small: need {} bytes, capacity {}",
                    needed, capacity
                )
            }
            MxfError::BerError(msg) => write!(f, "BER encoding error: {}", msg),
            MxfError::MissingMetadata(name) => {
                write!(f, "missing required metadata: {}", name)
            }
            MxfError::Crypto(e) => write!(f, "crypto error: {}", e),
        }
    }
}

impl std::error::Error for MxfError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MxfError::Io(e) => Some(e),
            MxfError::Crypto(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MxfError {
    fn from(e: io::Error) -> Self {
        MxfError::Io(e)
    }
}

impl From<CryptoError> for MxfError {
    fn from(e: CryptoError) -> Self {
        MxfError::Crypto(e)
    }
}

//! Error types for the UTF table crate.

use thiserror::Error;

/// Errors that can occur when decoding @UTF tables.
#[derive(Debug, Error)]
pub enum Error {
    /// Common library error.
    #[error("{0}")]
    Common(#[from] crikit_common::Error),

    /// The @UTF signature was not found at the given offset.
    #[error("@UTF signature not found at offset 0x{offset:X}: got {actual:02X?}")]
    SignatureNotFound { offset: u64, actual: [u8; 4] },

    /// The table looks encrypted but no LCG key pair reproduces the signature.
    ///
    /// Kept distinct from [`Error::SignatureNotFound`] so callers can tell
    /// "not a UTF table" apart from "UTF table we could not decrypt".
    #[error("unable to decrypt UTF table at offset 0x{offset:X}: LCG key search exhausted")]
    UnrecoverableEncryption { offset: u64 },

    /// A column descriptor carried an unrecognized primitive type code.
    #[error("unknown column type 0x{code:02X} at offset 0x{offset:X}")]
    UnknownColumnType { offset: u64, code: u8 },
}

/// Result type for UTF operations.
pub type Result<T> = std::result::Result<T, Error>;

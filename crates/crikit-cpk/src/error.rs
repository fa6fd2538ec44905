//! Error types for the CPK crate.

use thiserror::Error;

/// Errors that can occur when reading CPK archives.
#[derive(Debug, Error)]
pub enum Error {
    /// Common library error.
    #[error("{0}")]
    Common(#[from] crikit_common::Error),

    /// UTF table error from a header or TOC sub-table.
    #[error("{0}")]
    Utf(#[from] crikit_utf::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The `CPK ` signature was not found at the given offset.
    #[error("CPK signature not found at offset 0x{offset:X}: got {actual:02X?}")]
    SignatureNotFound { offset: u64, actual: [u8; 4] },

    /// The CRILAYLA signature was not found at the given offset.
    #[error("CRILAYLA signature not found at offset 0x{offset:X}")]
    CrilaylaSignatureNotFound { offset: u64 },

    /// The CRILAYLA trailer does not line up with the stated block size.
    #[error("CRILAYLA uncompressed header does not match expected size at offset 0x{offset:X}")]
    CrilaylaSizeMismatch { offset: u64 },

    /// The compressed stream referenced data outside the output buffer.
    #[error("corrupt CRILAYLA stream at offset 0x{offset:X}")]
    CorruptStream { offset: u64 },
}

/// Result type for CPK operations.
pub type Result<T> = std::result::Result<T, Error>;

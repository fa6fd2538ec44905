//! Error types for the AFS2 crate.

use thiserror::Error;

/// Errors that can occur when reading AFS2 archives.
#[derive(Debug, Error)]
pub enum Error {
    /// Common library error.
    #[error("{0}")]
    Common(#[from] crikit_common::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The AFS2 signature was not found at the given offset.
    #[error("AFS2 magic bytes not found at offset 0x{offset:X}: got {actual:02X?}")]
    SignatureNotFound { offset: u64, actual: [u8; 4] },

    /// The file count exceeds the 16-bit cue-id key space.
    #[error("file count {count} exceeds the 16-bit cue-id key space")]
    TooManyFiles { count: u32 },

    /// The version byte selects an offset-field width we have never seen.
    ///
    /// Only widths 2 and 4 are known; anything else fails loudly rather
    /// than guessing.
    #[error("unsupported AFS2 offset field width {width}")]
    UnsupportedOffsetWidth { width: u8 },
}

/// Result type for AFS2 operations.
pub type Result<T> = std::result::Result<T, Error>;

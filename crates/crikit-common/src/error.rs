//! Error types for crikit-common.

use thiserror::Error;

/// Common error type shared by the format crates.
#[derive(Debug, Error)]
pub enum Error {
    /// End of buffer reached while reading.
    #[error("unexpected end of buffer at offset 0x{offset:X}: needed {needed} bytes but only {available} available")]
    UnexpectedEof {
        offset: u64,
        needed: usize,
        available: usize,
    },

    /// Invalid magic bytes encountered.
    #[error("invalid signature at offset 0x{offset:X}: expected {expected:02X?}, got {actual:02X?}")]
    InvalidMagic {
        offset: u64,
        expected: Vec<u8>,
        actual: Vec<u8>,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// String missing its NUL terminator.
    #[error("string at offset 0x{offset:X} missing NUL terminator")]
    MissingNulTerminator { offset: u64 },
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

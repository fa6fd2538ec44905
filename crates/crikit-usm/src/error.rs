//! Error types for the demultiplexer crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while demultiplexing a container.
#[derive(Debug, Error)]
pub enum Error {
    /// Common library error.
    #[error("{0}")]
    Common(#[from] crikit_common::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No pack header was found in the file.
    #[error("cannot find pack header for file {}", .path.display())]
    PackHeaderNotFound { path: PathBuf },

    /// A block id outside the format's dictionary.
    ///
    /// Fatal: continuing past an unknown block would desynchronize the
    /// scan and corrupt every downstream stream.
    #[error("block id at 0x{offset:X} not found in table: 0x{id:08X}")]
    UnknownBlock { offset: u64, id: u32 },

    /// A size field width the scanner cannot read.
    #[error("unhandled block size field width {width}")]
    UnsupportedSizeWidth { width: u8 },
}

/// Result type for demultiplexer operations.
pub type Result<T> = std::result::Result<T, Error>;

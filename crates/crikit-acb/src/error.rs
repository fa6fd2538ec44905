//! Error types for the ACB crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when resolving ACB cue databases.
#[derive(Debug, Error)]
pub enum Error {
    /// Common library error.
    #[error("{0}")]
    Common(#[from] crikit_common::Error),

    /// UTF table error from the root table or a sub-table.
    #[error("{0}")]
    Utf(#[from] crikit_utf::Error),

    /// AFS2 error from an internal or external AWB.
    #[error("{0}")]
    Awb(#[from] crikit_awb::Error),

    /// CPK error from an internal or external CPK container.
    #[error("{0}")]
    Cpk(#[from] crikit_cpk::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The root table is missing a required sub-table field.
    #[error("ACB root table is missing the {name} table")]
    MissingTable { name: &'static str },

    /// A cue carried a reference type we do not know how to resolve.
    ///
    /// Unknown reference schemes must not silently misresolve, so this is
    /// fatal to the parse.
    #[error("unexpected ReferenceType {reference_type} for cue index {cue_index}")]
    UnsupportedReferenceType {
        reference_type: u8,
        cue_index: usize,
    },

    /// No companion AWB file matched any of the known naming conventions.
    #[error("cannot find AWB file for {}: expected '{base}_streamfiles.awb', '{base}.awb' or '{base}_STR.awb'", .acb.display())]
    AwbNotFound { acb: PathBuf, base: String },

    /// More than one candidate companion AWB matched.
    #[error("more than one matching AWB file for {}", .acb.display())]
    AmbiguousAwb { acb: PathBuf },

    /// The companion AWB's MD5 does not match the hash embedded in the ACB.
    #[error("AWB file {} did not match checksum inside ACB file", .path.display())]
    ChecksumMismatch { path: PathBuf },
}

/// Result type for ACB operations.
pub type Result<T> = std::result::Result<T, Error>;

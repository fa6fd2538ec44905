//! AFS2 archive reader for AWB waveform banks.
//!
//! An AWB ("Audio Wave Bank") file is an AFS2 archive: a flat, cue-id
//! keyed index of byte ranges holding encoded audio. The waveforms are
//! passed through as opaque blobs - decoding ADX/HCA/etc. is out of
//! scope.
//!
//! # Example
//!
//! ```no_run
//! use crikit_awb::Afs2Archive;
//!
//! let data = std::fs::read("bank.awb")?;
//! let archive = Afs2Archive::parse(&data, 0)?;
//!
//! for entry in archive.files.values() {
//!     println!("cue {:05}: {} bytes", entry.cue_id, entry.length);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod archive;
mod error;

pub use archive::{
    extract_file, is_afs2, Afs2Archive, Afs2Entry, EXTRACTION_FOLDER_FORMAT, SIGNATURE,
};
pub use error::{Error, Result};

//! CPK archive reader.
//!
//! CPK is CRI Middleware's general-purpose archive container. The volume
//! header and the file indices are @UTF tables: the TOC maps directory
//! and file names to explicit offsets, while the ITOC (used by audio
//! archives) is keyed by numeric id with offsets reconstructed by size
//! accumulation. Individual members may be CRILAYLA-compressed, detected
//! by signature sniffing at extraction time.
//!
//! # Example
//!
//! ```no_run
//! use crikit_cpk::CpkArchive;
//!
//! let data = std::fs::read("game.cpk")?;
//! let archive = CpkArchive::parse(&data, 0)?;
//!
//! for file in archive.files() {
//!     println!("{}/{} ({} bytes)", file.directory, file.name, file.size);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod archive;
mod entry;
mod error;

pub mod crilayla;

pub use archive::{
    extract_file, is_cpk, CpkArchive, EXTRACTION_FOLDER_FORMAT, NULL_FILENAME, SIGNATURE,
};
pub use entry::{CpkDirectory, CpkFile};
pub use error::{Error, Result};

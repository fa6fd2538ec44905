//! crikit - CRI Middleware container extraction library.
//!
//! This crate provides a unified interface to the crikit library
//! ecosystem for recovering files from CRI container formats.
//!
//! # Crates
//!
//! - [`crikit_common`] - binary reading, byte search, file helpers
//! - [`crikit_utf`] - @UTF self-describing table decoding (+ LCG cipher)
//! - [`crikit_awb`] - AFS2 waveform bank reading
//! - [`crikit_cpk`] - CPK archives (TOC/ITOC) and CRILAYLA decompression
//! - [`crikit_acb`] - ACB cue databases and waveform extraction
//! - [`crikit_usm`] - MPEG/USM stream demultiplexing
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use crikit::prelude::*;
//!
//! let acb = AcbFile::open(Path::new("bgm.acb"), false)?;
//! let files = acb.extract_all(None)?;
//! println!("extracted {} waveforms", files.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use crikit_acb as acb;
pub use crikit_awb as awb;
pub use crikit_common as common;
pub use crikit_cpk as cpk;
pub use crikit_usm as usm;
pub use crikit_utf as utf;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crikit_acb::{AcbDatabase, AcbFile, CueRecord};
    pub use crikit_awb::{Afs2Archive, Afs2Entry};
    pub use crikit_common::{BinaryReader, find_pattern};
    pub use crikit_cpk::{crilayla, CpkArchive, CpkDirectory, CpkFile};
    pub use crikit_usm::{demux_usm, DemuxOptions, MpegPsFormat, UsmFormat};
    pub use crikit_utf::{dump_table, is_utf_table, UtfTable, UtfValue};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

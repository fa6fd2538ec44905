//! Interleaved-container demultiplexing.
//!
//! A table-driven packet scanner splits MPEG-style multiplexed streams
//! into per-stream elementary files. The engine is format-agnostic:
//! [`ContainerFormat`] describes the block dictionary and per-packet
//! geometry of a concrete container, with [`MpegPsFormat`] covering
//! plain program streams and [`UsmFormat`] the CRI USM variant
//! (including its post-scan metadata stripping and extension sniffing).
//!
//! No audio/video decoding happens here: elementary streams are passed
//! through as opaque bytes.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use crikit_usm::{demux_usm, DemuxOptions};
//!
//! let files = demux_usm(Path::new("movie.usm"), &DemuxOptions::default(), None)?;
//! for file in files {
//!     println!("{}", file.display());
//! }
//! # Ok::<(), crikit_usm::Error>(())
//! ```

mod demux;
mod error;
mod mpeg;
mod usm;

pub use demux::{
    demux, BlockSize, ContainerFormat, DemuxOptions, PACKET_END_BYTES, PACKET_START_BYTES,
};
pub use error::{Error, Result};
pub use mpeg::MpegPsFormat;
pub use usm::{
    demux_usm, UsmFormat, ALP_BYTES, CRID_BYTES, CUE_BYTES, DEFAULT_AUDIO_EXTENSION,
    DEFAULT_VIDEO_EXTENSION, SBT_BYTES, SFA_BYTES, SFV_BYTES,
};

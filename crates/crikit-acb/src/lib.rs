//! ACB cue database resolution and extraction.
//!
//! An ACB ("Audio Cue Bank") is a @UTF-based database of cues - playable
//! sound events - that reference waveforms indirectly through Synth
//! tables. This crate walks the Cue -> Synth -> Waveform chain (with its
//! type-coded, version-fragile offset arithmetic), joins cue names, and
//! drives extraction from the embedded or companion AWB/CPK containers.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use crikit_acb::AcbFile;
//!
//! let acb = AcbFile::open(Path::new("bgm.acb"), false)?;
//! for cue in &acb.db.cues {
//!     if cue.is_waveform_identified {
//!         println!("{}: waveform {}", cue.cue_id, cue.waveform_id);
//!     }
//! }
//! let files = acb.extract_all(None)?;
//! println!("extracted {} files", files.len());
//! # Ok::<(), crikit_acb::Error>(())
//! ```

mod acb;
mod cue;
mod error;
mod file;

pub use acb::{waveform_id_for_row, waveform_row_for_id, AcbDatabase};
pub use cue::{
    extension_for_encode_type, CueRecord, ENCODE_TYPE_ADX, ENCODE_TYPE_ATRAC3, ENCODE_TYPE_ATRAC9,
    ENCODE_TYPE_BCWAV, ENCODE_TYPE_HCA, ENCODE_TYPE_HCA_ALT, ENCODE_TYPE_NINTENDO_DSP,
    ENCODE_TYPE_VAG,
};
pub use error::{Error, Result};
pub use file::{AcbFile, ExternalContainer, AWB_NAME_FORMATS, EXTRACTION_FOLDER_FORMAT};

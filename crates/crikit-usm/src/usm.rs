//! CRI USM container format.
//!
//! USM reuses the interleaved-packet model with its own chunk four-CCs
//! (`CRID`, `@SFV`, `@SFA`, ...), 4-byte big-endian size fields, and a
//! per-packet header/footer whose sizes are stored inside the packet.
//! One `@SFA` id carries multiple logical audio tracks disambiguated by
//! a stream-id byte. After the scan, each produced stream still carries
//! `#HEADER END`/`#METADATA END` metadata sections and a `#CONTENTS END`
//! trailer which are stripped by sentinel search, and the audio
//! extension is fixed up by content sniffing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crikit_common::{find_pattern, BinaryReader};

use crate::demux::{demux, BlockSize, ContainerFormat, DemuxOptions};
use crate::Result;

pub const CRID_BYTES: [u8; 4] = *b"CRID";
pub const SFV_BYTES: [u8; 4] = *b"@SFV";
pub const SFA_BYTES: [u8; 4] = *b"@SFA";
pub const SBT_BYTES: [u8; 4] = *b"@SBT";
pub const CUE_BYTES: [u8; 4] = *b"@CUE";
pub const ALP_BYTES: [u8; 4] = *b"@ALP";

pub const DEFAULT_AUDIO_EXTENSION: &str = ".adx";
pub const DEFAULT_VIDEO_EXTENSION: &str = ".m2v";

const HCA_SIGNATURE: [u8; 4] = *b"HCA\0";
const AIX_SIGNATURE: [u8; 4] = *b"AIXF";

const HEADER_END_BYTES: [u8; 32] = *b"#HEADER END     ===============\0";
const METADATA_END_BYTES: [u8; 32] = *b"#METADATA END   ===============\0";
const CONTENTS_END_BYTES: [u8; 32] = *b"#CONTENTS END   ===============\0";

/// The USM flavor of the interleaved-container scanner.
pub struct UsmFormat {
    block_map: HashMap<u32, BlockSize>,
}

impl UsmFormat {
    pub fn new() -> Self {
        let mut map = HashMap::new();
        for id in [ALP_BYTES, CRID_BYTES, SFV_BYTES, SFA_BYTES, SBT_BYTES, CUE_BYTES] {
            map.insert(u32::from_le_bytes(id), BlockSize::SizeBytes(4));
        }
        Self { block_map: map }
    }
}

impl Default for UsmFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerFormat for UsmFormat {
    fn block_map(&self) -> &HashMap<u32, BlockSize> {
        &self.block_map
    }

    fn packet_start_bytes(&self) -> &[u8] {
        &CRID_BYTES
    }

    fn uses_same_id_for_multiple_tracks(&self) -> bool {
        true
    }

    fn is_audio_block(&self, id: &[u8; 4]) -> bool {
        *id == SFA_BYTES
    }

    fn is_video_block(&self, id: &[u8; 4]) -> bool {
        *id == SFV_BYTES
    }

    fn audio_header_size(&self, data: &[u8], offset: usize) -> Result<usize> {
        Ok(BinaryReader::new(data).u16_be_at(offset + 8)? as usize)
    }

    fn video_header_size(&self, data: &[u8], offset: usize) -> Result<usize> {
        Ok(BinaryReader::new(data).u16_be_at(offset + 8)? as usize)
    }

    fn audio_footer_size(&self, data: &[u8], offset: usize) -> Result<usize> {
        Ok(BinaryReader::new(data).u16_be_at(offset + 0xA)? as usize)
    }

    fn video_footer_size(&self, data: &[u8], offset: usize) -> Result<usize> {
        Ok(BinaryReader::new(data).u16_be_at(offset + 0xA)? as usize)
    }

    fn stream_id(&self, data: &[u8], offset: usize) -> Result<u8> {
        Ok(BinaryReader::new(data).u8_at(offset + 0xC)?)
    }

    fn audio_extension(&self, _data: &[u8], _offset: usize) -> String {
        DEFAULT_AUDIO_EXTENSION.to_string()
    }

    fn video_extension(&self, _data: &[u8], _offset: usize) -> String {
        DEFAULT_VIDEO_EXTENSION.to_string()
    }

    /// Strip the metadata head and trailer from each stream and fix the
    /// audio extension by sniffing the first payload bytes.
    fn finalize(
        &self,
        _source: &[u8],
        outputs: Vec<(u32, PathBuf)>,
        _add_header: bool,
    ) -> Result<Vec<PathBuf>> {
        let mut files = Vec::with_capacity(outputs.len());

        for (stream_key, path) in outputs {
            let bytes = std::fs::read(&path)?;

            let header_end = find_pattern(&bytes, 0, &HEADER_END_BYTES);
            let metadata_end = find_pattern(&bytes, 0, &METADATA_END_BYTES);
            let header_size = match (header_end, metadata_end) {
                (Some(h), Some(m)) => h.max(m) + METADATA_END_BYTES.len(),
                (Some(h), None) => h + METADATA_END_BYTES.len(),
                (None, Some(m)) => m + METADATA_END_BYTES.len(),
                (None, None) => 0,
            };

            let contents_end =
                find_pattern(&bytes, header_size, &CONTENTS_END_BYTES).unwrap_or(bytes.len());
            let payload = &bytes[header_size.min(bytes.len())..contents_end];

            // The low nibble of the id byte holds the sub-stream id; mask
            // it off to recover the block id for classification.
            let id_bytes = (stream_key & 0xFFFF_FFF0).to_le_bytes();
            let extension = if self.is_audio_block(&id_bytes) {
                sniff_audio_extension(payload)
            } else {
                path.extension()
                    .map(|e| format!(".{}", e.to_string_lossy()))
                    .unwrap_or_default()
            };

            let final_path = path.with_extension(extension.trim_start_matches('.'));
            std::fs::write(&final_path, payload)?;
            if final_path != path {
                std::fs::remove_file(&path)?;
            }

            debug!(path = %final_path.display(), bytes = payload.len(), "finalized stream");
            files.push(final_path);
        }

        Ok(files)
    }
}

fn sniff_audio_extension(payload: &[u8]) -> String {
    if payload.len() >= 4 && payload[..4] == AIX_SIGNATURE {
        ".aix".to_string()
    } else if !payload.is_empty() && payload[0] == 0x80 {
        ".adx".to_string()
    } else if payload.len() >= 4 && payload[..4] == HCA_SIGNATURE {
        ".hca".to_string()
    } else {
        ".bin".to_string()
    }
}

/// Demultiplex a USM file into elementary audio/video streams.
pub fn demux_usm(
    path: &Path,
    options: &DemuxOptions,
    dest_override: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    let format = UsmFormat::new();
    demux(path, &format, options, dest_override)
}

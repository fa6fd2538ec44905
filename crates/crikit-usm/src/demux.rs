//! Table-driven packet scanner.
//!
//! A single pass over the byte stream: each 4-byte block id is classified
//! against the format's dictionary as fixed-size, size-prefixed or an EOF
//! marker. Size-prefixed audio/video blocks are routed to per-stream
//! output sinks keyed by block id (optionally combined with an embedded
//! sub-stream id for formats that reuse one block id across tracks).

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::debug;

use crikit_common::{find_pattern, BinaryReader};

use crate::{Error, Result};

/// Default pack-header start code (MPEG program stream).
pub const PACKET_START_BYTES: [u8; 4] = [0x00, 0x00, 0x01, 0xBA];

/// Default program-end start code.
pub const PACKET_END_BYTES: [u8; 4] = [0x00, 0x00, 0x01, 0xB9];

/// How a block's extent is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockSize {
    /// Fixed total size (including the 4 id bytes).
    Static(u32),
    /// A size field of the given byte width follows the id; the value
    /// counts the bytes after the size field.
    SizeBytes(u8),
    /// End-of-stream marker; terminates the scan.
    Eof,
}

/// What to pull out of the container.
#[derive(Debug, Clone, Copy)]
pub struct DemuxOptions {
    pub extract_audio: bool,
    pub extract_video: bool,
    /// Reserved for formats whose finalize step prepends a header.
    pub add_header: bool,
}

impl Default for DemuxOptions {
    fn default() -> Self {
        Self {
            extract_audio: true,
            extract_video: true,
            add_header: false,
        }
    }
}

/// Hooks describing one concrete interleaved-container format.
///
/// Defaults describe a plain MPEG program stream; concrete formats
/// override what differs (block dictionary, audio/video classification,
/// per-packet header/footer sizes, sub-stream ids, finalization).
pub trait ContainerFormat {
    /// Block dictionary keyed on the raw 4 id bytes (read little-endian).
    fn block_map(&self) -> &HashMap<u32, BlockSize>;

    fn packet_start_bytes(&self) -> &[u8] {
        &PACKET_START_BYTES
    }

    /// Size fields are big-endian unless a format says otherwise.
    fn block_size_is_little_endian(&self) -> bool {
        false
    }

    /// True for formats (PAM/DVD/USM) that reuse one block id for several
    /// logical audio tracks, disambiguated by an embedded stream id.
    fn uses_same_id_for_multiple_tracks(&self) -> bool {
        false
    }

    fn is_audio_block(&self, id: &[u8; 4]) -> bool {
        (0xC0..=0xDF).contains(&id[3])
    }

    fn is_video_block(&self, id: &[u8; 4]) -> bool {
        (0xE0..=0xEF).contains(&id[3])
    }

    /// Bytes to skip at the start of an audio packet's payload.
    fn audio_header_size(&self, _data: &[u8], _offset: usize) -> Result<usize> {
        Ok(0)
    }

    /// Extra skip for multi-track formats, per stream id.
    fn audio_sub_header_size(&self, _data: &[u8], _offset: usize, _stream_id: u8) -> Result<usize> {
        Ok(0)
    }

    fn video_header_size(&self, _data: &[u8], _offset: usize) -> Result<usize> {
        Ok(0)
    }

    /// Bytes to drop from the end of an audio packet's payload.
    fn audio_footer_size(&self, _data: &[u8], _offset: usize) -> Result<usize> {
        Ok(0)
    }

    fn video_footer_size(&self, _data: &[u8], _offset: usize) -> Result<usize> {
        Ok(0)
    }

    /// Sub-stream id for multi-track formats.
    fn stream_id(&self, _data: &[u8], _offset: usize) -> Result<u8> {
        Ok(0)
    }

    fn audio_extension(&self, _data: &[u8], _offset: usize) -> String {
        ".mpa".to_string()
    }

    fn video_extension(&self, _data: &[u8], _offset: usize) -> String {
        ".m2v".to_string()
    }

    /// Where to start searching for the first pack header.
    fn start_offset(&self, _data: &[u8]) -> usize {
        0
    }

    /// Post-scan fixup over the produced files (strip metadata sections,
    /// adjust extensions). Receives `(stream_key, path)` pairs with all
    /// sinks already closed; returns the final file list.
    fn finalize(
        &self,
        _source: &[u8],
        outputs: Vec<(u32, PathBuf)>,
        _add_header: bool,
    ) -> Result<Vec<PathBuf>> {
        Ok(outputs.into_iter().map(|(_, path)| path).collect())
    }
}

struct OutputSink {
    path: PathBuf,
    file: File,
}

/// Demultiplex `path` into per-stream elementary files next to it (or
/// under `dest_override`). Returns the produced file paths.
///
/// Open sinks are owned exclusively by the scan loop and released on
/// every exit path; files already flushed to disk are left behind on
/// error as diagnostic artifacts.
pub fn demux(
    path: &Path,
    format: &dyn ContainerFormat,
    options: &DemuxOptions,
    dest_override: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };
    let data: &[u8] = &mmap;

    let dest = match dest_override {
        Some(dir) => dir.to_path_buf(),
        None => path.parent().unwrap_or_else(|| Path::new("")).to_path_buf(),
    };
    std::fs::create_dir_all(&dest)?;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let start = format.start_offset(data);
    let Some(first_pack) = find_pattern(data, start, format.packet_start_bytes()) else {
        return Err(Error::PackHeaderNotFound {
            path: path.to_path_buf(),
        });
    };

    // Sink registry: opened on first use, owned by this loop until the
    // scan ends. Dropping the map closes every file on all exit paths.
    let mut sinks: HashMap<u32, OutputSink> = HashMap::new();
    let reader = BinaryReader::new(data);

    let mut offset = first_pack;
    while offset < data.len() {
        let id_bytes: [u8; 4] = reader.bytes_at(offset, 4)?.try_into().expect("4-byte read");
        let id_key = u32::from_le_bytes(id_bytes);

        let Some(&block) = format.block_map().get(&id_key) else {
            return Err(Error::UnknownBlock {
                offset: offset as u64,
                id: u32::from_be_bytes(id_bytes),
            });
        };

        match block {
            BlockSize::Static(size) => {
                offset += size as usize;
            }
            BlockSize::Eof => {
                break;
            }
            BlockSize::SizeBytes(width) => {
                let block_size = read_size_field(&reader, offset + 4, width, format)?;

                let is_audio = format.is_audio_block(&id_bytes);
                let is_video = format.is_video_block(&id_bytes);

                if (options.extract_audio && is_audio) || (options.extract_video && is_video) {
                    let stream_id = if is_audio && format.uses_same_id_for_multiple_tracks() {
                        format.stream_id(data, offset)?
                    } else {
                        0
                    };
                    let stream_key = id_key | u32::from(stream_id);

                    if !sinks.contains_key(&stream_key) {
                        let extension = if is_audio {
                            format.audio_extension(data, offset)
                        } else {
                            format.video_extension(data, offset)
                        };
                        // Byte-swapped so the name shows the id in file
                        // order.
                        let name = format!("{stem}_{:08X}{extension}", stream_key.swap_bytes());
                        let sink_path = dest.join(name);
                        let sink_file = File::create(&sink_path)?;
                        debug!(path = %sink_path.display(), "opened stream sink");
                        sinks.insert(
                            stream_key,
                            OutputSink {
                                path: sink_path,
                                file: sink_file,
                            },
                        );
                    }

                    let (skip, footer) = if is_audio {
                        (
                            format.audio_header_size(data, offset)?
                                + format.audio_sub_header_size(data, offset, stream_id)?,
                            format.audio_footer_size(data, offset)?,
                        )
                    } else {
                        (
                            format.video_header_size(data, offset)?,
                            format.video_footer_size(data, offset)?,
                        )
                    };

                    // Zero or negative payload is a no-op write; malformed
                    // small packets are skipped rather than fatal.
                    let cut = block_size as i64 - skip as i64 - footer as i64;
                    if cut > 0 {
                        let payload_start = offset + 4 + width as usize + skip;
                        let payload = reader.bytes_at(payload_start, cut as usize)?;
                        let sink = sinks.get_mut(&stream_key).expect("sink opened above");
                        sink.file.write_all(payload)?;
                    }
                }

                offset += 4 + width as usize + block_size as usize;
            }
        }
    }

    // Close every sink before finalization rewrites the files.
    let outputs: Vec<(u32, PathBuf)> = sinks
        .drain()
        .map(|(key, sink)| (key, sink.path))
        .collect();

    format.finalize(data, outputs, options.add_header)
}

fn read_size_field(
    reader: &BinaryReader<'_>,
    at: usize,
    width: u8,
    format: &dyn ContainerFormat,
) -> Result<u32> {
    let little_endian = format.block_size_is_little_endian();

    let value = match width {
        1 => u32::from(reader.u8_at(at)?),
        2 => {
            if little_endian {
                u32::from(reader.u16_at(at)?)
            } else {
                u32::from(reader.u16_be_at(at)?)
            }
        }
        4 => {
            if little_endian {
                reader.u32_at(at)?
            } else {
                reader.u32_be_at(at)?
            }
        }
        width => return Err(Error::UnsupportedSizeWidth { width }),
    };

    Ok(value)
}

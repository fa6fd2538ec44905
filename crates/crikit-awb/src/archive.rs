//! AFS2 archive parsing.
//!
//! AFS2 is a fixed-layout, little-endian file index: cue ids followed by
//! an offset table with one trailing terminal entry. Entries do not store
//! their own length - entry i's length is derived from entry i+1's raw
//! offset (or the terminal value) minus entry i's aligned offset, so the
//! table is decoded as a scan with one-element lookahead.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::debug;

use crikit_common::fsutil::{round_up, write_chunk};
use crikit_common::BinaryReader;

use crate::{Error, Result};

/// The `AFS2` signature.
pub const SIGNATURE: [u8; 4] = *b"AFS2";

/// Extraction root folder pattern.
pub const EXTRACTION_FOLDER_FORMAT: &str = "_vgmt_awb_ext_";

/// One file entry in an AFS2 archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Afs2Entry {
    /// Cue id keying this entry (16-bit by format).
    pub cue_id: u16,
    /// Stored offset, absolute in the source.
    pub raw_offset: u64,
    /// Offset rounded up to the archive's byte alignment.
    pub aligned_offset: u64,
    /// Payload length in bytes.
    pub length: u64,
}

/// A parsed AFS2 archive.
#[derive(Debug, Clone, PartialEq)]
pub struct Afs2Archive {
    /// Absolute offset of the archive in the source.
    pub base_offset: u64,
    /// Raw version field.
    pub version: [u8; 4],
    /// Number of file entries.
    pub file_count: u32,
    /// Byte alignment applied to file offsets.
    pub byte_alignment: u32,
    /// Entries keyed by cue id.
    pub files: BTreeMap<u16, Afs2Entry>,
}

/// Probe whether the bytes at `offset` carry the AFS2 signature.
pub fn is_afs2(data: &[u8], offset: usize) -> bool {
    data.len() >= offset + 4 && data[offset..offset + 4] == SIGNATURE
}

impl Afs2Archive {
    /// Parse an AFS2 archive at `offset`.
    pub fn parse(data: &[u8], offset: usize) -> Result<Afs2Archive> {
        let reader = BinaryReader::new(data);

        let magic = reader.bytes_at(offset, 4)?;
        if magic != SIGNATURE {
            return Err(Error::SignatureNotFound {
                offset: offset as u64,
                actual: magic.try_into().expect("4-byte read"),
            });
        }

        let version: [u8; 4] = reader.bytes_at(offset + 4, 4)?.try_into().expect("4-byte read");
        let file_count = reader.u32_at(offset + 8)?;

        if file_count > u32::from(u16::MAX) {
            return Err(Error::TooManyFiles { count: file_count });
        }

        // Version byte 1 selects the offset-table entry width. Known
        // values are 2 and 4; 4 is by far the most common.
        let width = match version[1] {
            2 => 2usize,
            4 => 4usize,
            other => return Err(Error::UnsupportedOffsetWidth { width: other }),
        };

        let byte_alignment = reader.u32_at(offset + 0xC)?;
        let ids_base = offset + 0x10;
        let table_base = ids_base + file_count as usize * 2;

        let entry_offset = |index: usize| -> Result<u64> {
            let at = table_base + width * index;
            let value = match width {
                2 => u64::from(reader.u16_at(at)?),
                _ => u64::from(reader.u32_at(at)?),
            };
            Ok(value + offset as u64)
        };

        let mut entries = Vec::with_capacity(file_count as usize);
        for i in 0..file_count as usize {
            let cue_id = reader.u16_at(ids_base + 2 * i)?;
            let raw_offset = entry_offset(i)?;
            let aligned_offset = round_up(raw_offset, u64::from(byte_alignment));

            entries.push(Afs2Entry {
                cue_id,
                raw_offset,
                aligned_offset,
                length: 0,
            });
        }

        // Lengths come from the next entry's raw offset; the last entry
        // is closed by the terminal table value.
        for i in 0..entries.len() {
            let next_raw = if i + 1 < entries.len() {
                entries[i + 1].raw_offset
            } else {
                entry_offset(entries.len())?
            };
            entries[i].length = next_raw.saturating_sub(entries[i].aligned_offset);
        }

        debug!(
            offset,
            files = file_count,
            alignment = byte_alignment,
            "parsed AFS2 archive"
        );

        Ok(Afs2Archive {
            base_offset: offset as u64,
            version,
            file_count,
            byte_alignment,
            files: entries.into_iter().map(|e| (e.cue_id, e)).collect(),
        })
    }

    /// Extract every entry as `{source_name}.{cue_id:05}.bin` under
    /// `dest`. Returns the written paths.
    pub fn extract_all_raw(
        &self,
        data: &[u8],
        source_name: &str,
        dest: &Path,
    ) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.files.len());

        for entry in self.files.values() {
            let reader = BinaryReader::new(data);
            let bytes = reader.bytes_at(entry.aligned_offset as usize, entry.length as usize)?;
            let name = format!("{source_name}.{:05}.bin", entry.cue_id);
            written.push(write_chunk(bytes, &dest.join(name))?);
        }

        Ok(written)
    }
}

/// Open an AWB file and extract everything beneath
/// `_vgmt_awb_ext_{basename}` next to it (or under `dest_override`).
pub fn extract_file(path: &Path, dest_override: Option<&Path>) -> Result<Vec<PathBuf>> {
    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };

    let archive = Afs2Archive::parse(&mmap, 0)?;

    let basename = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let source_name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let dest = match dest_override {
        Some(dir) => dir.to_path_buf(),
        None => path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(format!("{EXTRACTION_FOLDER_FORMAT}{basename}")),
    };

    archive.extract_all_raw(&mmap, &source_name, &dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build an AFS2 image with the given alignment and payloads.
    fn make_afs2(alignment: u32, width: u8, payloads: &[(u16, &[u8])]) -> Vec<u8> {
        let count = payloads.len();
        let ids_base = 0x10;
        let table_base = ids_base + count * 2;
        let header_end = table_base + (count + 1) * width as usize;

        // Compute payload placement: stored offsets are pre-alignment,
        // actual data goes at the aligned position.
        let mut raw_offsets = Vec::with_capacity(count + 1);
        let mut cursor = header_end as u64;
        for (_, payload) in payloads {
            raw_offsets.push(cursor);
            let aligned = round_up(cursor, u64::from(alignment));
            cursor = aligned + payload.len() as u64;
        }
        raw_offsets.push(cursor); // terminal: total length

        let mut image = vec![0u8; cursor as usize];
        image[0..4].copy_from_slice(&SIGNATURE);
        image[4..8].copy_from_slice(&[0x01, width, 0x02, 0x00]);
        image[8..12].copy_from_slice(&(count as u32).to_le_bytes());
        image[12..16].copy_from_slice(&alignment.to_le_bytes());

        for (i, (cue_id, _)) in payloads.iter().enumerate() {
            let at = ids_base + i * 2;
            image[at..at + 2].copy_from_slice(&cue_id.to_le_bytes());
        }

        for (i, raw) in raw_offsets.iter().enumerate() {
            let at = table_base + i * width as usize;
            match width {
                2 => image[at..at + 2].copy_from_slice(&(*raw as u16).to_le_bytes()),
                _ => image[at..at + 4].copy_from_slice(&(*raw as u32).to_le_bytes()),
            }
        }

        for (i, (_, payload)) in payloads.iter().enumerate() {
            let at = round_up(raw_offsets[i], u64::from(alignment)) as usize;
            image[at..at + payload.len()].copy_from_slice(payload);
        }

        image
    }

    #[test]
    fn test_alignment_and_adjacency() {
        let payloads: [(u16, &[u8]); 3] = [(0, b"first"), (1, b"second!"), (2, b"x")];
        let image = make_afs2(32, 4, &payloads);
        let archive = Afs2Archive::parse(&image, 0).unwrap();

        assert_eq!(archive.file_count, 3);
        assert_eq!(archive.byte_alignment, 32);

        let entries: Vec<_> = archive.files.values().copied().collect();
        for (i, entry) in entries.iter().enumerate() {
            // Every aligned offset is a multiple of the alignment.
            assert_eq!(entry.aligned_offset % 32, 0);

            // aligned + length meets the next entry's raw offset (or the
            // file length for the last entry).
            let next_raw = entries
                .get(i + 1)
                .map(|e| e.raw_offset)
                .unwrap_or(image.len() as u64);
            assert_eq!(entry.aligned_offset + entry.length, next_raw);
        }
    }

    #[test]
    fn test_payload_recovery() {
        let payloads: [(u16, &[u8]); 2] = [(10, b"AAAA"), (11, b"BBBBBB")];
        let image = make_afs2(16, 4, &payloads);
        let archive = Afs2Archive::parse(&image, 0).unwrap();

        let entry = archive.files[&10];
        let start = entry.aligned_offset as usize;
        assert!(image[start..start + 4].starts_with(b"AAAA"));

        let entry = archive.files[&11];
        let start = entry.aligned_offset as usize;
        assert_eq!(&image[start..start + entry.length as usize], b"BBBBBB");
    }

    #[test]
    fn test_two_byte_offset_width() {
        let payloads: [(u16, &[u8]); 2] = [(0, b"ab"), (1, b"cd")];
        let image = make_afs2(4, 2, &payloads);
        let archive = Afs2Archive::parse(&image, 0).unwrap();

        assert_eq!(archive.files.len(), 2);
        let entry = archive.files[&1];
        assert_eq!(
            &image[entry.aligned_offset as usize..(entry.aligned_offset + entry.length) as usize],
            b"cd"
        );
    }

    #[test]
    fn test_parse_at_nonzero_offset() {
        let payloads: [(u16, &[u8]); 1] = [(5, b"data")];
        let inner = make_afs2(8, 4, &payloads);
        let mut image = vec![0xEEu8; 0x30];
        image.extend_from_slice(&inner);

        let archive = Afs2Archive::parse(&image, 0x30).unwrap();
        let entry = archive.files[&5];
        assert_eq!(
            &image[entry.aligned_offset as usize..(entry.aligned_offset + entry.length) as usize],
            b"data"
        );
    }

    #[test]
    fn test_bad_signature() {
        let image = vec![0u8; 0x20];
        assert!(matches!(
            Afs2Archive::parse(&image, 0),
            Err(Error::SignatureNotFound { .. })
        ));
        assert!(!is_afs2(&image, 0));
    }

    #[test]
    fn test_unknown_offset_width_fails_loudly() {
        let payloads: [(u16, &[u8]); 1] = [(0, b"zz")];
        let mut image = make_afs2(4, 4, &payloads);
        image[5] = 3; // version byte 1

        assert!(matches!(
            Afs2Archive::parse(&image, 0),
            Err(Error::UnsupportedOffsetWidth { width: 3 })
        ));
    }

    #[test]
    fn test_extract_all_raw() {
        let payloads: [(u16, &[u8]); 2] = [(0, b"one"), (7, b"seven")];
        let image = make_afs2(8, 4, &payloads);
        let archive = Afs2Archive::parse(&image, 0).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let written = archive
            .extract_all_raw(&image, "bank.awb", dir.path())
            .unwrap();

        assert_eq!(written.len(), 2);
        assert_eq!(
            std::fs::read(dir.path().join("bank.awb.00000.bin")).unwrap(),
            b"one"
        );
        assert_eq!(
            std::fs::read(dir.path().join("bank.awb.00007.bin")).unwrap(),
            b"seven"
        );
    }
}

//! CPK archive parsing and extraction.
//!
//! A CPK volume starts with a `CPK ` container signature; the header is
//! an @UTF table at +0x10 whose fields point at the TOC (path-indexed)
//! and ITOC (id-indexed) sub-tables. TOC rows carry explicit offsets;
//! ITOC offsets are not stored and are reconstructed by accumulating
//! `FileSize` from `ContentOffset` with alignment rounding.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use memmap2::Mmap;
use tracing::debug;

use crikit_awb::Afs2Entry;
use crikit_common::fsutil::{clean_file_name, round_up, write_chunk};
use crikit_common::BinaryReader;
use crikit_utf::{KeyCache, UtfTable, UtfValue};

use crate::crilayla;
use crate::entry::{CpkDirectory, CpkFile};
use crate::{Error, Result};

/// The `CPK ` container signature.
pub const SIGNATURE: [u8; 4] = *b"CPK ";

/// Sentinel used by TOC rows without a real name.
pub const NULL_FILENAME: &str = "<NULL>";

/// Extraction root folder pattern.
pub const EXTRACTION_FOLDER_FORMAT: &str = "VGMT_CPK_EXTRACT_";

/// A parsed CPK archive.
#[derive(Debug, Clone)]
pub struct CpkArchive {
    /// Absolute offset of the volume in the source.
    pub base_offset: u64,
    /// Header table name (volume identifier).
    pub volume_name: String,
    /// The CPK header table.
    pub header: UtfTable,
    /// TOC sub-table, when the archive is path-indexed.
    pub toc: Option<UtfTable>,
    /// ITOC sub-table, when the archive is id-indexed.
    pub itoc: Option<UtfTable>,
    /// Assembled directory tree ("TOC" and/or "ITOC" under the root).
    pub root: CpkDirectory,
    /// ITOC entries keyed by cue id, for ACB-driven extraction.
    pub itoc_files: BTreeMap<u16, Afs2Entry>,
}

/// Probe whether the bytes at `offset` carry the CPK signature.
pub fn is_cpk(data: &[u8], offset: usize) -> bool {
    data.len() >= offset + 4 && data[offset..offset + 4] == SIGNATURE
}

impl CpkArchive {
    /// Parse a CPK volume at `offset`.
    pub fn parse(data: &[u8], offset: usize) -> Result<CpkArchive> {
        let reader = BinaryReader::new(data);
        let magic = reader.bytes_at(offset, 4)?;
        if magic != SIGNATURE {
            return Err(Error::SignatureNotFound {
                offset: offset as u64,
                actual: magic.try_into().expect("4-byte read"),
            });
        }

        let mut keys: KeyCache = None;
        let header = UtfTable::parse_with_cache(data, offset + 0x10, &mut keys)?;

        let content_offset = header
            .field_value(0, "ContentOffset")
            .and_then(UtfValue::as_u64)
            .unwrap_or(0);
        let align = u64::from(
            header
                .field_value(0, "Align")
                .and_then(UtfValue::as_u16)
                .unwrap_or(1),
        );

        let toc = Self::sub_table(data, &header, "TocOffset", &mut keys)?;
        let itoc = Self::sub_table(data, &header, "ItocOffset", &mut keys)?;

        debug!(
            offset,
            volume = %header.table_name,
            has_toc = toc.is_some(),
            has_itoc = itoc.is_some(),
            "parsed CPK header"
        );

        let mut root = CpkDirectory::new("");
        let mut itoc_files = BTreeMap::new();

        if let Some(toc) = &toc {
            let toc_dir = Self::toc_directory(toc, content_offset, align)?;
            if toc_dir.file_count() > 0 {
                root.subdirectories.push(toc_dir);
            }
        }

        if let Some(itoc) = &itoc {
            let itoc_dir = Self::itoc_directory(
                data,
                itoc,
                content_offset,
                align,
                offset as u64,
                &mut keys,
                &mut itoc_files,
            )?;
            if itoc_dir.file_count() > 0 {
                root.subdirectories.push(itoc_dir);
            }
        }

        Ok(CpkArchive {
            base_offset: offset as u64,
            volume_name: header.table_name.clone(),
            header,
            toc,
            itoc,
            root,
            itoc_files,
        })
    }

    /// Resolve an offset-valued header field into a parsed sub-table.
    fn sub_table(
        data: &[u8],
        header: &UtfTable,
        key: &str,
        keys: &mut KeyCache,
    ) -> Result<Option<UtfTable>> {
        let Some(value) = header.field_value(0, key).and_then(UtfValue::as_u64) else {
            return Ok(None);
        };

        // Zero-storage fields and sentinel values mean the index is absent.
        if value == 0 || value == u64::MAX {
            return Ok(None);
        }

        let at = header.base_offset + value;
        Ok(Some(UtfTable::parse_with_cache(data, at as usize, keys)?))
    }

    /// Build the directory tree for a path-indexed TOC.
    fn toc_directory(toc: &UtfTable, content_offset: u64, align: u64) -> Result<CpkDirectory> {
        // The TOC's UTF header starts 0x10 into its container signature.
        let true_toc_base = toc.base_offset.saturating_sub(0x10);
        let offset_base = if content_offset < true_toc_base {
            content_offset
        } else {
            true_toc_base
        };

        let mut groups: IndexMap<String, Vec<CpkFile>> = IndexMap::new();

        for row in 0..toc.row_count as usize {
            let Some(file_name) = toc.field_value(row, "FileName").and_then(UtfValue::as_str)
            else {
                continue;
            };
            let file_name = if file_name == NULL_FILENAME {
                format!("{row:05}.bin")
            } else {
                file_name.to_string()
            };

            let dir_name = toc
                .field_value(row, "DirName")
                .and_then(UtfValue::as_str)
                .unwrap_or("");
            let dir_name = if dir_name == NULL_FILENAME { "" } else { dir_name };

            let Some(local_offset) = toc.field_value(row, "FileOffset").and_then(UtfValue::as_u64)
            else {
                continue;
            };
            let Some(size) = toc.field_value(row, "FileSize").and_then(UtfValue::as_u64) else {
                continue;
            };
            let extract_size = toc
                .field_value(row, "ExtractSize")
                .and_then(UtfValue::as_u64)
                .unwrap_or(size);

            let offset = round_up(local_offset + offset_base, align);

            let directory = if dir_name.is_empty() {
                "TOC".to_string()
            } else {
                format!("TOC/{}", dir_name.replace('\\', "/"))
            };

            groups.entry(dir_name.to_string()).or_default().push(CpkFile {
                directory,
                name: file_name,
                offset,
                size,
                extract_size,
            });
        }

        let mut toc_dir = CpkDirectory::new("TOC");
        for (path, files) in groups {
            toc_dir.descend(&path).files.extend(files);
        }

        Ok(toc_dir)
    }

    /// Build the flat file list for an id-indexed ITOC, reconstructing
    /// offsets by size accumulation.
    fn itoc_directory(
        data: &[u8],
        itoc: &UtfTable,
        content_offset: u64,
        align: u64,
        volume_base: u64,
        keys: &mut KeyCache,
        itoc_files: &mut BTreeMap<u16, Afs2Entry>,
    ) -> Result<CpkDirectory> {
        let files_h = itoc
            .field_value(0, "FilesH")
            .and_then(UtfValue::as_u64)
            .unwrap_or(0);
        let files_l = itoc
            .field_value(0, "FilesL")
            .and_then(UtfValue::as_u64)
            .unwrap_or(0);

        let mut sizes: BTreeMap<u16, (u64, u64)> = BTreeMap::new();

        let mut collect = |group: &str| -> Result<()> {
            let Some(offset) = itoc.field_offset(0, group).filter(|&o| o != 0) else {
                return Ok(());
            };
            let table = UtfTable::parse_with_cache(data, offset as usize, keys)?;
            for row in 0..table.row_count as usize {
                let Some(id) = table.field_value(row, "ID").and_then(UtfValue::as_u16) else {
                    continue;
                };
                let Some(size) = table.field_value(row, "FileSize").and_then(UtfValue::as_u64)
                else {
                    continue;
                };
                let extract_size = table
                    .field_value(row, "ExtractSize")
                    .and_then(UtfValue::as_u64)
                    .unwrap_or(size);
                sizes.insert(id, (size, extract_size));
            }
            Ok(())
        };

        if files_h > 0 {
            collect("DataH")?;
        }
        if files_l > 0 {
            collect("DataL")?;
        }

        let mut itoc_dir = CpkDirectory::new("ITOC");
        let mut current = content_offset;

        for (&id, &(size, extract_size)) in &sizes {
            let raw_offset = volume_base + current;
            current = round_up(current, align);
            let offset = volume_base + current;

            itoc_files.insert(
                id,
                Afs2Entry {
                    cue_id: id,
                    raw_offset,
                    aligned_offset: offset,
                    length: size,
                },
            );

            itoc_dir.files.push(CpkFile {
                directory: "ITOC".to_string(),
                name: format!("{id:05}.bin"),
                offset,
                size,
                extract_size,
            });

            current += size;
        }

        Ok(itoc_dir)
    }

    /// All files across TOC and ITOC.
    pub fn files(&self) -> Vec<&CpkFile> {
        self.root.all_files()
    }

    /// Extract every file beneath `dest`, routing CRILAYLA-compressed
    /// members through the decompressor. Returns the written paths.
    pub fn extract_all(&self, data: &[u8], dest: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for file in self.files() {
            written.push(self.extract_one(data, file, dest)?);
        }
        Ok(written)
    }

    /// Extract a single file.
    ///
    /// The CRILAYLA check sniffs the signature at the stored offset
    /// rather than trusting `extract_size`, since the size metadata is
    /// not reliable across titles.
    pub fn extract_one(&self, data: &[u8], file: &CpkFile, dest: &Path) -> Result<PathBuf> {
        let out_dir = file
            .directory
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(dest.to_path_buf(), |p, c| p.join(c));
        let target = out_dir.join(clean_file_name(&file.name));

        if crilayla::is_crilayla(data, file.offset as usize) {
            let bytes = crilayla::decompress(data, file.offset as usize, file.size as usize)?;
            Ok(write_chunk(&bytes, &target)?)
        } else {
            let reader = BinaryReader::new(data);
            let bytes = reader.bytes_at(file.offset as usize, file.size as usize)?;
            Ok(write_chunk(bytes, &target)?)
        }
    }
}

/// Open a CPK file and extract everything beneath
/// `VGMT_CPK_EXTRACT_{filename}` next to it (or under `dest_override`).
pub fn extract_file(path: &Path, dest_override: Option<&Path>) -> Result<Vec<PathBuf>> {
    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };

    let archive = CpkArchive::parse(&mmap, 0)?;

    let file_name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let dest = match dest_override {
        Some(dir) => dir.to_path_buf(),
        None => path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(format!("{EXTRACTION_FOLDER_FORMAT}{file_name}")),
    };

    archive.extract_all(&mmap, &dest)
}

//! ACB file handling: container discovery and extraction.

use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::{debug, warn};

use crikit_awb::{is_afs2, Afs2Archive, Afs2Entry};
use crikit_common::checksum::md5_digest;
use crikit_common::fsutil::{clean_file_name, write_chunk};
use crikit_common::BinaryReader;
use crikit_cpk::{is_cpk, CpkArchive};
use crikit_utf::UtfValue;

use crate::acb::{waveform_row_for_id, AcbDatabase};
use crate::cue::extension_for_encode_type;
use crate::{Error, Result};

/// Extraction root folder pattern.
pub const EXTRACTION_FOLDER_FORMAT: &str = "_vgmt_acb_ext_";

/// Companion streaming-AWB naming conventions, tried in order.
pub const AWB_NAME_FORMATS: [&str; 3] = ["{}_streamfiles.awb", "{}.awb", "{}_STR.awb"];

/// The located companion streaming container.
pub struct ExternalContainer {
    /// Path of the companion file.
    pub path: PathBuf,
    mmap: Mmap,
    /// Parsed AFS2 archive, when the companion is an AWB.
    pub awb: Option<Afs2Archive>,
    /// Parsed CPK volume, when the companion is a CPK.
    pub cpk: Option<CpkArchive>,
}

impl std::fmt::Debug for ExternalContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalContainer")
            .field("path", &self.path)
            .field("awb", &self.awb.is_some())
            .field("cpk", &self.cpk.is_some())
            .finish()
    }
}

/// An opened ACB file with its resolved containers.
pub struct AcbFile {
    /// Path of the ACB file.
    pub path: PathBuf,
    mmap: Mmap,
    /// The parsed cue database.
    pub db: AcbDatabase,
    /// Companion streaming container, when the ACB references one.
    pub external: Option<ExternalContainer>,
}

impl std::fmt::Debug for AcbFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcbFile")
            .field("path", &self.path)
            .field("cues", &self.db.cues.len())
            .field("external", &self.external)
            .finish()
    }
}

impl AcbFile {
    /// Open an ACB file, resolve its cue graph and locate its companion
    /// streaming AWB/CPK if one is referenced.
    pub fn open(path: &Path, include_cue_id_in_name: bool) -> Result<AcbFile> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        let db = AcbDatabase::parse(&mmap, include_cue_id_in_name)?;

        let external = if db.expects_external_container() {
            Some(locate_external(path, &db)?)
        } else {
            None
        };

        Ok(AcbFile {
            path: path.to_path_buf(),
            mmap,
            db,
            external,
        })
    }

    /// Raw bytes of the ACB file.
    pub fn data(&self) -> &[u8] {
        &self.mmap
    }

    /// Extract every resolvable waveform.
    ///
    /// Named cues are routed to one of four destination buckets by their
    /// streaming flag and the container kind present: `acb/awb`,
    /// `acb/cpk`, `awb`, `cpk`. Waveform entries not reached through any
    /// cue are extracted afterward under synthesized
    /// `{container}.{id:05}{ext}` names.
    pub fn extract_all(&self, dest_override: Option<&Path>) -> Result<Vec<PathBuf>> {
        let basename = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dest = match dest_override {
            Some(dir) => dir.to_path_buf(),
            None => self
                .path
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(format!("{EXTRACTION_FOLDER_FORMAT}{basename}")),
        };

        let mut written = Vec::new();
        let mut internal_extracted: BTreeSet<u16> = BTreeSet::new();
        let mut external_extracted: BTreeSet<u16> = BTreeSet::new();

        for cue in &self.db.cues {
            if !cue.is_waveform_identified {
                continue;
            }
            // Identified but unnamed cues are handled by the orphan pass
            // with a synthesized name.
            let Some(cue_name) = &cue.cue_name else {
                continue;
            };
            let file_name = clean_file_name(cue_name);

            if cue.is_streaming {
                let Some(external) = &self.external else {
                    warn!(cue_id = cue.cue_id, "streaming cue but no external container");
                    continue;
                };

                if let Some(awb) = &external.awb {
                    if let Some(path) = extract_entry(
                        &external.mmap,
                        awb.files.get(&cue.waveform_id),
                        &dest.join("awb").join(&file_name),
                        cue.waveform_id,
                    )? {
                        written.push(path);
                    }
                } else if let Some(cpk) = &external.cpk {
                    if let Some(path) = extract_entry(
                        &external.mmap,
                        cpk.itoc_files.get(&cue.waveform_id),
                        &dest.join("cpk").join(&file_name),
                        cue.waveform_id,
                    )? {
                        written.push(path);
                    }
                }

                external_extracted.insert(cue.waveform_id);
            } else {
                if let Some(awb) = &self.db.internal_awb {
                    if let Some(path) = extract_entry(
                        &self.mmap,
                        awb.files.get(&cue.waveform_id),
                        &dest.join("acb").join("awb").join(&file_name),
                        cue.waveform_id,
                    )? {
                        written.push(path);
                    }
                } else if let Some(cpk) = &self.db.internal_cpk {
                    if let Some(path) = extract_entry(
                        &self.mmap,
                        cpk.itoc_files.get(&cue.waveform_id),
                        &dest.join("acb").join("cpk").join(&file_name),
                        cue.waveform_id,
                    )? {
                        written.push(path);
                    }
                }

                internal_extracted.insert(cue.waveform_id);
            }
        }

        written.extend(self.extract_orphans(&dest, &internal_extracted, &external_extracted)?);

        debug!(files = written.len(), dest = %dest.display(), "ACB extraction complete");
        Ok(written)
    }

    /// Extract container entries that no cue reached, naming them from
    /// the container file name, id and sniffed encode type.
    fn extract_orphans(
        &self,
        dest: &Path,
        internal_extracted: &BTreeSet<u16>,
        external_extracted: &BTreeSet<u16>,
    ) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();

        let acb_file_name = self
            .path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        if let Some(external) = &self.external {
            let container_name = external
                .path
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();

            let entries: Vec<(u16, Afs2Entry)> = if let Some(awb) = &external.awb {
                awb.files.iter().map(|(&id, &e)| (id, e)).collect()
            } else if let Some(cpk) = &external.cpk {
                cpk.itoc_files.iter().map(|(&id, &e)| (id, e)).collect()
            } else {
                Vec::new()
            };
            let folder = if external.awb.is_some() { "awb" } else { "cpk" };

            for (id, entry) in entries {
                if external_extracted.contains(&id) {
                    continue;
                }
                let Some(name) = self.orphan_name(&container_name, id, true) else {
                    warn!(id, "external orphan has no waveform row; skipped");
                    continue;
                };
                if let Some(path) = extract_entry(
                    &external.mmap,
                    Some(&entry),
                    &dest.join(folder).join(clean_file_name(&name)),
                    id,
                )? {
                    written.push(path);
                }
            }
        }

        let internal_entries: Vec<(u16, Afs2Entry)> = if let Some(awb) = &self.db.internal_awb {
            awb.files.iter().map(|(&id, &e)| (id, e)).collect()
        } else if let Some(cpk) = &self.db.internal_cpk {
            cpk.itoc_files.iter().map(|(&id, &e)| (id, e)).collect()
        } else {
            Vec::new()
        };
        let internal_folder: PathBuf = if self.db.internal_awb.is_some() {
            Path::new("acb").join("awb")
        } else {
            Path::new("acb").join("cpk")
        };

        for (id, entry) in internal_entries {
            if internal_extracted.contains(&id) {
                continue;
            }
            let Some(name) = self.orphan_name(&acb_file_name, id, false) else {
                warn!(id, "internal orphan has no waveform row; skipped");
                continue;
            };
            if let Some(path) = extract_entry(
                &self.mmap,
                Some(&entry),
                &dest.join(&internal_folder).join(clean_file_name(&name)),
                id,
            )? {
                written.push(path);
            }
        }

        Ok(written)
    }

    fn orphan_name(&self, container_name: &str, id: u16, is_streaming: bool) -> Option<String> {
        let row = waveform_row_for_id(&self.db.waveform_table, id, is_streaming)?;
        let encode_type = self
            .db
            .waveform_table
            .field_value(row as usize, "EncodeType")
            .and_then(UtfValue::as_u64)? as u8;

        Some(format!(
            "{container_name}.{id:05}{}",
            extension_for_encode_type(encode_type)
        ))
    }
}

/// Write one container entry's byte range, tolerating (and logging) ids
/// absent from the container.
fn extract_entry(
    data: &[u8],
    entry: Option<&Afs2Entry>,
    target: &Path,
    waveform_id: u16,
) -> Result<Option<PathBuf>> {
    let Some(entry) = entry else {
        warn!(waveform_id, "waveform id not present in container");
        return Ok(None);
    };

    let reader = BinaryReader::new(data);
    let bytes = reader.bytes_at(entry.aligned_offset as usize, entry.length as usize)?;
    Ok(Some(write_chunk(bytes, target)?))
}

/// Locate, verify and parse the companion streaming container.
fn locate_external(acb_path: &Path, db: &AcbDatabase) -> Result<ExternalContainer> {
    let dir = acb_path.parent().unwrap_or_else(|| Path::new("."));
    let base = acb_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut matches: Vec<PathBuf> = Vec::new();
    for format in AWB_NAME_FORMATS {
        let pattern = dir
            .join(format.replace("{}", &base))
            .to_string_lossy()
            .into_owned();
        if let Ok(paths) = glob::glob(&pattern) {
            matches.extend(paths.flatten());
        }
        if !matches.is_empty() {
            break;
        }
    }

    if matches.is_empty() {
        return Err(Error::AwbNotFound {
            acb: acb_path.to_path_buf(),
            base,
        });
    }
    if matches.len() > 1 {
        return Err(Error::AmbiguousAwb {
            acb: acb_path.to_path_buf(),
        });
    }

    let path = matches.remove(0);
    let file = File::open(&path)?;
    let mmap = unsafe { Mmap::map(&file)? };

    // A 16-byte stored hash is MD5; newer hash formats are unknown and
    // skipped.
    if db.stream_awb_hash.len() == 0x10 && md5_digest(&mmap)[..] != db.stream_awb_hash[..] {
        return Err(Error::ChecksumMismatch { path });
    }

    let mut awb = None;
    let mut cpk = None;
    if is_afs2(&mmap, 0) {
        awb = Some(Afs2Archive::parse(&mmap, 0)?);
    } else if is_cpk(&mmap, 0) {
        cpk = Some(CpkArchive::parse(&mmap, 0)?);
    }

    Ok(ExternalContainer {
        path,
        mmap,
        awb,
        cpk,
    })
}

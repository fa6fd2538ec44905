//! ACB root table parsing and cue resolution.
//!
//! A cue references exactly one Synth-table row; that row's
//! `ReferenceItems` blob encodes, via a reference-type-dependent byte
//! offset, a Waveform-table row index. For reference types 3 and 8 the
//! offset correction is not recomputed per cue: it accumulates +4 across
//! the cue loop relative to the previous cue, a reverse-engineered
//! convention that must be carried as loop state, not derived per row.

use indexmap::IndexMap;
use tracing::{debug, warn};

use crikit_awb::{is_afs2, Afs2Archive};
use crikit_common::BinaryReader;
use crikit_cpk::{is_cpk, CpkArchive};
use crikit_utf::{KeyCache, UtfTable, UtfValue};

use crate::cue::{extension_for_encode_type, CueRecord};
use crate::{Error, Result};

/// A parsed ACB cue database (in-memory part; container files and
/// extraction live on [`crate::AcbFile`]).
#[derive(Debug)]
pub struct AcbDatabase {
    /// Bank name from the root table.
    pub name: Option<String>,
    /// Authoring-tool version string.
    pub version_string: Option<String>,
    /// Resolved cues, in cue-table row order.
    pub cues: Vec<CueRecord>,
    /// Resolved cue names mapped to waveform ids.
    pub cue_names_to_waveforms: IndexMap<String, u16>,
    /// Internal (embedded) AWB, when the AwbFile blob is an AFS2 archive.
    pub internal_awb: Option<Afs2Archive>,
    /// Internal CPK, when the AwbFile blob is a CPK volume.
    pub internal_cpk: Option<CpkArchive>,
    /// Stored MD5 of the companion streaming AWB (empty when absent).
    pub stream_awb_hash: Vec<u8>,
    /// Size of the StreamAwbAfs2Header blob; nonzero implies a companion
    /// streaming file exists.
    pub stream_awb_header_size: u64,
    /// The waveform table, kept for orphan extraction.
    pub waveform_table: UtfTable,
    /// The root table.
    pub root: UtfTable,
}

impl AcbDatabase {
    /// Parse an ACB database from its raw bytes.
    pub fn parse(data: &[u8], include_cue_id_in_name: bool) -> Result<AcbDatabase> {
        let mut keys: KeyCache = None;
        let root = UtfTable::parse_with_cache(data, 0, &mut keys)?;

        let cue_table = required_sub_table(data, &root, "CueTable", &mut keys)?;
        let synth_table = required_sub_table(data, &root, "SynthTable", &mut keys)?;
        let waveform_table = required_sub_table(data, &root, "WaveformTable", &mut keys)?;

        let mut cues = resolve_cues(data, &cue_table, &synth_table, &waveform_table)?;
        let cue_names_to_waveforms = resolve_cue_names(
            data,
            &root,
            &mut cues,
            &mut keys,
            include_cue_id_in_name,
        )?;

        let internal_offset = root.field_offset(0, "AwbFile").unwrap_or(0) as usize;
        let internal_size = root.field_size(0, "AwbFile").unwrap_or(0);

        let mut internal_awb = None;
        let mut internal_cpk = None;
        if internal_size > 0 {
            if is_afs2(data, internal_offset) {
                internal_awb = Some(Afs2Archive::parse(data, internal_offset)?);
            } else if is_cpk(data, internal_offset) {
                internal_cpk = Some(CpkArchive::parse(data, internal_offset)?);
            }
        }

        let stream_awb_hash = root
            .field_value(0, "StreamAwbHash")
            .and_then(UtfValue::as_bytes)
            .map(<[u8]>::to_vec)
            .unwrap_or_default();
        let stream_awb_header_size = root.field_size(0, "StreamAwbAfs2Header").unwrap_or(0);

        debug!(
            name = root.field_value(0, "Name").and_then(UtfValue::as_str),
            cues = cues.len(),
            internal_awb = internal_awb.is_some(),
            internal_cpk = internal_cpk.is_some(),
            "parsed ACB database"
        );

        Ok(AcbDatabase {
            name: root
                .field_value(0, "Name")
                .and_then(UtfValue::as_str)
                .map(str::to_string),
            version_string: root
                .field_value(0, "VersionString")
                .and_then(UtfValue::as_str)
                .map(str::to_string),
            cues,
            cue_names_to_waveforms,
            internal_awb,
            internal_cpk,
            stream_awb_hash,
            stream_awb_header_size,
            waveform_table,
            root,
        })
    }

    /// True when the root table points at a companion streaming AWB.
    pub fn expects_external_container(&self) -> bool {
        self.stream_awb_header_size > 0 || self.stream_awb_hash.iter().any(|&b| b != 0)
    }
}

fn required_sub_table(
    data: &[u8],
    root: &UtfTable,
    name: &'static str,
    keys: &mut KeyCache,
) -> Result<UtfTable> {
    let offset = root
        .field_offset(0, name)
        .filter(|&o| o != 0)
        .ok_or(Error::MissingTable { name })?;

    Ok(UtfTable::parse_with_cache(data, offset as usize, keys)?)
}

fn resolve_cues(
    data: &[u8],
    cue_table: &UtfTable,
    synth_table: &UtfTable,
    waveform_table: &UtfTable,
) -> Result<Vec<CueRecord>> {
    let reader = BinaryReader::new(data);
    let mut cues = Vec::with_capacity(cue_table.row_count as usize);

    // Reference-resolution state carried across the cue loop: types 3/8
    // accumulate their correction relative to the previous cue instead
    // of looking the Synth row up again.
    let mut reference_items_offset: u64 = 0;
    let mut reference_items_size: u64 = 0;
    let mut reference_correction: u64 = 0;

    for i in 0..cue_table.row_count as usize {
        let cue_id = cue_table
            .field_value(i, "CueId")
            .and_then(UtfValue::as_u32)
            .unwrap_or(0);
        let reference_type = cue_table
            .field_value(i, "ReferenceType")
            .and_then(UtfValue::as_u64)
            .unwrap_or(0) as u8;
        let reference_index = cue_table
            .field_value(i, "ReferenceIndex")
            .and_then(UtfValue::as_u16)
            .unwrap_or(0);

        let mut cue = CueRecord::unidentified(cue_id, reference_type, reference_index);

        match reference_type {
            2 => {
                reference_items_offset = synth_table
                    .field_offset(reference_index as usize, "ReferenceItems")
                    .unwrap_or(0);
                reference_items_size = synth_table
                    .field_size(reference_index as usize, "ReferenceItems")
                    .unwrap_or(0);
                reference_correction = reference_items_size.wrapping_add(2);
            }
            3 | 8 => {
                if i == 0 {
                    reference_items_offset = synth_table
                        .field_offset(0, "ReferenceItems")
                        .unwrap_or(0);
                    reference_items_size =
                        synth_table.field_size(0, "ReferenceItems").unwrap_or(0);
                    // Samples observed so far carry a single '01 00'
                    // record, putting the index in the blob's last two
                    // bytes.
                    reference_correction = reference_items_size.wrapping_sub(2);
                } else {
                    // Relative to the previous cue's correction; no fresh
                    // table lookup.
                    reference_correction = reference_correction.wrapping_add(4);
                }
            }
            other => {
                return Err(Error::UnsupportedReferenceType {
                    reference_type: other,
                    cue_index: i,
                });
            }
        }

        if reference_items_size != 0 {
            let at = reference_items_offset.wrapping_add(reference_correction) as usize;
            let waveform_index = reader.u16_be_at(at)?;
            cue.waveform_index = waveform_index;

            // A missing waveform row is tolerated: some titles ship cues
            // with dangling references. The cue stays unidentified and is
            // excluded from naming and extraction.
            let streaming = waveform_table
                .field_value(waveform_index as usize, "Streaming")
                .and_then(UtfValue::as_u64);

            if let Some(streaming) = streaming {
                cue.is_streaming = streaming != 0;

                if let Some(waveform_id) =
                    waveform_id_for_row(waveform_table, waveform_index as usize, cue.is_streaming)
                {
                    cue.waveform_id = waveform_id;
                    cue.encode_type = waveform_table
                        .field_value(waveform_index as usize, "EncodeType")
                        .and_then(UtfValue::as_u64)
                        .unwrap_or(0) as u8;
                    cue.is_waveform_identified = true;
                } else {
                    warn!(cue = i, waveform_index, "waveform row has no id field");
                }
            }
        }

        cues.push(cue);
    }

    Ok(cues)
}

fn resolve_cue_names(
    data: &[u8],
    root: &UtfTable,
    cues: &mut [CueRecord],
    keys: &mut KeyCache,
    include_cue_id_in_name: bool,
) -> Result<IndexMap<String, u16>> {
    let mut names = IndexMap::new();

    let Some(offset) = root.field_offset(0, "CueNameTable").filter(|&o| o != 0) else {
        return Ok(names);
    };
    let cue_name_table = UtfTable::parse_with_cache(data, offset as usize, keys)?;

    for row in 0..cue_name_table.row_count as usize {
        let Some(cue_index) = cue_name_table
            .field_value(row, "CueIndex")
            .and_then(UtfValue::as_u16)
        else {
            continue;
        };
        let Some(cue_name) = cue_name_table
            .field_value(row, "CueName")
            .and_then(UtfValue::as_str)
        else {
            continue;
        };

        let Some(cue) = cues.get_mut(cue_index as usize) else {
            warn!(row, cue_index, "cue name row points past the cue table");
            continue;
        };

        // Cues with unidentified waveforms are never named, staying
        // consistent with their exclusion from extraction.
        if !cue.is_waveform_identified {
            continue;
        }

        let mut full_name = format!(
            "{cue_name}{}",
            extension_for_encode_type(cue.encode_type)
        );
        if include_cue_id_in_name {
            full_name = format!("{:05}_{full_name}", cue.cue_id);
        }

        cue.cue_name = Some(full_name.clone());
        names.insert(full_name, cue.waveform_id);
    }

    Ok(names)
}

/// Read a waveform row's id, trying the legacy `Id` field first and
/// falling back to the split `StreamAwbId`/`MemoryAwbId` fields of later
/// schema generations.
pub fn waveform_id_for_row(
    waveform_table: &UtfTable,
    row: usize,
    is_streaming: bool,
) -> Option<u16> {
    if let Some(id) = waveform_table
        .field_value(row, "Id")
        .and_then(UtfValue::as_u16)
    {
        return Some(id);
    }

    let key = if is_streaming {
        "StreamAwbId"
    } else {
        "MemoryAwbId"
    };
    waveform_table.field_value(row, key).and_then(UtfValue::as_u16)
}

/// Find the waveform row carrying `waveform_id`, scanning every row and
/// keeping the last match.
pub fn waveform_row_for_id(
    waveform_table: &UtfTable,
    waveform_id: u16,
    is_streaming: bool,
) -> Option<u16> {
    let mut found = None;

    for row in 0..waveform_table.row_count as usize {
        if waveform_id_for_row(waveform_table, row, is_streaming) == Some(waveform_id) {
            found = Some(row as u16);
        }
    }

    found
}

//! ACB resolution and extraction tests over synthesized databases.

use crikit_acb::{AcbDatabase, AcbFile, Error};
use crikit_common::checksum::md5_digest;
use crikit_common::fsutil::round_up;
use crikit_utf::testkit::TableBuilder;

/// Build a minimal AFS2 image (4-byte offset entries).
fn make_afs2(alignment: u32, payloads: &[(u16, &[u8])]) -> Vec<u8> {
    let count = payloads.len();
    let ids_base = 0x10;
    let table_base = ids_base + count * 2;
    let header_end = table_base + (count + 1) * 4;

    let mut raw_offsets = Vec::with_capacity(count + 1);
    let mut cursor = header_end as u64;
    for (_, payload) in payloads {
        raw_offsets.push(cursor);
        cursor = round_up(cursor, u64::from(alignment)) + payload.len() as u64;
    }
    raw_offsets.push(cursor);

    let mut image = vec![0u8; cursor as usize];
    image[0..4].copy_from_slice(b"AFS2");
    image[4..8].copy_from_slice(&[0x01, 0x04, 0x02, 0x00]);
    image[8..12].copy_from_slice(&(count as u32).to_le_bytes());
    image[12..16].copy_from_slice(&alignment.to_le_bytes());

    for (i, (cue_id, _)) in payloads.iter().enumerate() {
        image[ids_base + i * 2..ids_base + i * 2 + 2].copy_from_slice(&cue_id.to_le_bytes());
    }
    for (i, raw) in raw_offsets.iter().enumerate() {
        let at = table_base + i * 4;
        image[at..at + 4].copy_from_slice(&(*raw as u32).to_le_bytes());
    }
    for (i, (_, payload)) in payloads.iter().enumerate() {
        let at = round_up(raw_offsets[i], u64::from(alignment)) as usize;
        image[at..at + payload.len()].copy_from_slice(payload);
    }

    image
}

/// Build an ACB image exercising reference types 3, 2 and 8.
///
/// Waveform rows: ids 100/200/300/77/500, encode types 2/0/13/7/9,
/// streaming 0/1/0/0/1.
///
/// Synth rows carry a `ReferenceItems` blob immediately followed (in the
/// data segment) by a pad blob, mirroring real banks where the resolved
/// waveform index lives at a reference-type-dependent offset past the
/// blob itself:
///   cue 0 (type 3):           row 0, index in RI0's last two bytes -> 0
///   cue 1 (type 2, ref 1):    index at RI1 + size + 2 -> pad1[2..4] -> 1
///   cue 2 (type 8, carried):  index at RI1 + prev correction + 4 -> pad1[6..8] -> 2
///   cue 3 (type 2, ref 2):    index at RI2 + size + 2 -> pad2[2..4] -> 99 (dangling)
fn make_acb(internal_awb: &[u8], stream_awb_hash: &[u8; 16]) -> Vec<u8> {
    let mut wf = TableBuilder::new("Waveform");
    wf.per_row_u16("Id", &[100, 200, 300, 77, 500]);
    wf.per_row_u8("EncodeType", &[2, 0, 13, 7, 9]);
    wf.per_row_u8("Streaming", &[0, 1, 0, 0, 1]);
    let wf_image = wf.build();

    let ri0: &[u8] = &[0x01, 0x00, 0x00, 0x00];
    let ri1: &[u8] = &[0x01, 0x00];
    let ri2: &[u8] = &[0x01, 0x00];
    let pad0: &[u8] = &[0u8; 8];
    let pad1: &[u8] = &[0, 0, 0, 1, 0, 0, 0, 2];
    let pad2: &[u8] = &[0, 0, 0, 99, 0, 0, 0, 0];
    let mut synth = TableBuilder::new("Synth");
    synth.per_row_data("ReferenceItems", &[ri0, ri1, ri2]);
    synth.per_row_data("ReferencePad", &[pad0, pad1, pad2]);
    let synth_image = synth.build();

    let mut cue = TableBuilder::new("Cue");
    cue.per_row_u32("CueId", &[10, 11, 12, 13]);
    cue.per_row_u8("ReferenceType", &[3, 2, 8, 2]);
    cue.per_row_u16("ReferenceIndex", &[0, 1, 0, 2]);
    let cue_image = cue.build();

    let mut names = TableBuilder::new("CueName");
    names.per_row_u16("CueIndex", &[0, 1, 2, 3]);
    names.per_row_string("CueName", &["intro", "battle", "field", "broken"]);
    let name_image = names.build();

    let mut root = TableBuilder::new("Header");
    root.constant_string("Name", "bank");
    root.constant_string("VersionString", "1.29.00");
    root.constant_data("AwbFile", internal_awb);
    root.constant_data("CueTable", &cue_image);
    root.constant_data("CueNameTable", &name_image);
    root.constant_data("WaveformTable", &wf_image);
    root.constant_data("SynthTable", &synth_image);
    root.constant_data("StreamAwbHash", stream_awb_hash);
    root.constant_data("StreamAwbAfs2Header", &[]);
    root.build()
}

#[test]
fn resolution_covers_mixed_reference_types() {
    let acb = make_acb(&[], &[0u8; 16]);
    let db = AcbDatabase::parse(&acb, false).unwrap();

    assert_eq!(db.name.as_deref(), Some("bank"));
    assert_eq!(db.version_string.as_deref(), Some("1.29.00"));
    assert_eq!(db.cues.len(), 4);

    let c = &db.cues[0];
    assert!(c.is_waveform_identified);
    assert_eq!(
        (c.waveform_index, c.waveform_id, c.encode_type, c.is_streaming),
        (0, 100, 2, false)
    );
    assert_eq!(c.cue_name.as_deref(), Some("intro.hca"));

    let c = &db.cues[1];
    assert!(c.is_waveform_identified);
    assert_eq!(
        (c.waveform_index, c.waveform_id, c.encode_type, c.is_streaming),
        (1, 200, 0, true)
    );
    assert_eq!(c.cue_name.as_deref(), Some("battle.adx"));

    let c = &db.cues[2];
    assert!(c.is_waveform_identified);
    assert_eq!(
        (c.waveform_index, c.waveform_id, c.encode_type, c.is_streaming),
        (2, 300, 13, false)
    );
    assert_eq!(c.cue_name.as_deref(), Some("field.dsp"));

    // Dangling waveform reference: tolerated, never named.
    let c = &db.cues[3];
    assert!(!c.is_waveform_identified);
    assert_eq!(c.waveform_index, 99);
    assert_eq!(c.cue_name, None);

    assert_eq!(db.cue_names_to_waveforms.len(), 3);
    assert_eq!(db.cue_names_to_waveforms["intro.hca"], 100);
    assert_eq!(db.cue_names_to_waveforms["battle.adx"], 200);
}

#[test]
fn resolution_is_deterministic() {
    let acb = make_acb(&[], &[0u8; 16]);
    let a = AcbDatabase::parse(&acb, false).unwrap();
    let b = AcbDatabase::parse(&acb, false).unwrap();
    assert_eq!(a.cues, b.cues);
}

#[test]
fn cue_id_prefix_in_names() {
    let acb = make_acb(&[], &[0u8; 16]);
    let db = AcbDatabase::parse(&acb, true).unwrap();

    assert_eq!(db.cues[0].cue_name.as_deref(), Some("00010_intro.hca"));
    assert_eq!(db.cues[1].cue_name.as_deref(), Some("00011_battle.adx"));
}

#[test]
fn unsupported_reference_type_is_fatal() {
    let mut cue = TableBuilder::new("Cue");
    cue.per_row_u32("CueId", &[1]);
    cue.per_row_u8("ReferenceType", &[5]);
    cue.per_row_u16("ReferenceIndex", &[0]);
    let cue_image = cue.build();

    let mut wf = TableBuilder::new("Waveform");
    wf.per_row_u16("Id", &[1]);
    wf.per_row_u8("EncodeType", &[0]);
    wf.per_row_u8("Streaming", &[0]);
    let wf_image = wf.build();

    let mut synth = TableBuilder::new("Synth");
    synth.per_row_data("ReferenceItems", &[&[0x01, 0x00, 0x00, 0x00][..]]);
    let synth_image = synth.build();

    let mut root = TableBuilder::new("Header");
    root.constant_string("Name", "bad");
    root.constant_data("CueTable", &cue_image);
    root.constant_data("WaveformTable", &wf_image);
    root.constant_data("SynthTable", &synth_image);
    let acb = root.build();

    match AcbDatabase::parse(&acb, false) {
        Err(Error::UnsupportedReferenceType {
            reference_type: 5,
            cue_index: 0,
        }) => {}
        other => panic!("expected UnsupportedReferenceType, got {other:?}"),
    }
}

#[test]
fn missing_sub_table_is_fatal() {
    let mut root = TableBuilder::new("Header");
    root.constant_string("Name", "empty");
    let acb = root.build();

    assert!(matches!(
        AcbDatabase::parse(&acb, false),
        Err(Error::MissingTable { name: "CueTable" })
    ));
}

#[test]
fn internal_awb_extraction_with_orphans() {
    let internal: [(u16, &[u8]); 3] = [
        (77, b"VAG-77"),
        (100, b"HCA-ONE-HUNDRED"),
        (300, b"DSP-300"),
    ];
    // Alignment 1: the blob lands at an arbitrary offset inside the ACB,
    // and entry alignment is computed on absolute offsets.
    let awb_image = make_afs2(1, &internal);
    let acb_image = make_acb(&awb_image, &[0u8; 16]);

    let dir = tempfile::tempdir().unwrap();
    let acb_path = dir.path().join("bank.acb");
    std::fs::write(&acb_path, &acb_image).unwrap();

    let acb = AcbFile::open(&acb_path, false).unwrap();
    assert!(acb.db.internal_awb.is_some());
    assert!(acb.external.is_none());

    let written = acb.extract_all(None).unwrap();
    assert_eq!(written.len(), 3);

    let root = dir.path().join("_vgmt_acb_ext_bank");
    assert_eq!(
        std::fs::read(root.join("acb/awb/intro.hca")).unwrap(),
        b"HCA-ONE-HUNDRED"
    );
    assert_eq!(
        std::fs::read(root.join("acb/awb/field.dsp")).unwrap(),
        b"DSP-300"
    );
    // Waveform id 77 is reached by no cue: synthesized orphan name from
    // the container file name, id and encode type.
    assert_eq!(
        std::fs::read(root.join("acb/awb/bank.acb.00077.vag")).unwrap(),
        b"VAG-77"
    );
}

#[test]
fn external_awb_with_checksum() {
    let external: [(u16, &[u8]); 2] = [(200, b"ADX-200"), (500, b"BCWAV-500")];
    let awb_image = make_afs2(0x10, &external);
    let acb_image = make_acb(&[], &md5_digest(&awb_image));

    let dir = tempfile::tempdir().unwrap();
    let acb_path = dir.path().join("bank.acb");
    std::fs::write(&acb_path, &acb_image).unwrap();
    std::fs::write(dir.path().join("bank.awb"), &awb_image).unwrap();

    let acb = AcbFile::open(&acb_path, false).unwrap();
    let external = acb.external.as_ref().unwrap();
    assert_eq!(external.path, dir.path().join("bank.awb"));
    assert!(external.awb.is_some());

    let written = acb.extract_all(None).unwrap();
    assert_eq!(written.len(), 2);

    let root = dir.path().join("_vgmt_acb_ext_bank");
    assert_eq!(
        std::fs::read(root.join("awb/battle.adx")).unwrap(),
        b"ADX-200"
    );
    assert_eq!(
        std::fs::read(root.join("awb/bank.awb.00500.bcwav")).unwrap(),
        b"BCWAV-500"
    );
}

#[test]
fn external_awb_checksum_mismatch() {
    let external: [(u16, &[u8]); 1] = [(200, b"ADX-200")];
    let awb_image = make_afs2(0x10, &external);
    let acb_image = make_acb(&[], &[0xABu8; 16]);

    let dir = tempfile::tempdir().unwrap();
    let acb_path = dir.path().join("bank.acb");
    std::fs::write(&acb_path, &acb_image).unwrap();
    std::fs::write(dir.path().join("bank.awb"), &awb_image).unwrap();

    assert!(matches!(
        AcbFile::open(&acb_path, false),
        Err(Error::ChecksumMismatch { .. })
    ));
}

#[test]
fn external_awb_not_found() {
    let acb_image = make_acb(&[], &[0xCDu8; 16]);

    let dir = tempfile::tempdir().unwrap();
    let acb_path = dir.path().join("bank.acb");
    std::fs::write(&acb_path, &acb_image).unwrap();

    assert!(matches!(
        AcbFile::open(&acb_path, false),
        Err(Error::AwbNotFound { .. })
    ));
}

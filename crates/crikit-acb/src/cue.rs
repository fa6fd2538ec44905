//! Cue records and encode-type mapping.

/// Waveform encode type codes carried by the waveform table.
pub const ENCODE_TYPE_ADX: u8 = 0;
pub const ENCODE_TYPE_HCA: u8 = 2;
pub const ENCODE_TYPE_HCA_ALT: u8 = 6;
pub const ENCODE_TYPE_VAG: u8 = 7;
pub const ENCODE_TYPE_ATRAC3: u8 = 8;
pub const ENCODE_TYPE_BCWAV: u8 = 9;
pub const ENCODE_TYPE_ATRAC9: u8 = 11;
pub const ENCODE_TYPE_NINTENDO_DSP: u8 = 13;

/// A cue resolved against the Synth and Waveform tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueRecord {
    /// Cue id from the Cue table.
    pub cue_id: u32,
    /// Reference scheme selecting how the Synth row is interpreted.
    pub reference_type: u8,
    /// Synth-table row referenced by this cue.
    pub reference_index: u16,
    /// Waveform-table row index, when identified.
    pub waveform_index: u16,
    /// Waveform id keying the AWB/CPK container entry.
    pub waveform_id: u16,
    /// Encode type code from the waveform row.
    pub encode_type: u8,
    /// False = embedded in the ACB, true = in the external streaming AWB.
    pub is_streaming: bool,
    /// False when the waveform row lookup failed (tolerated; the cue is
    /// excluded from naming and extraction).
    pub is_waveform_identified: bool,
    /// Resolved cue name with extension, when the CueName table has one.
    pub cue_name: Option<String>,
}

impl CueRecord {
    pub(crate) fn unidentified(cue_id: u32, reference_type: u8, reference_index: u16) -> Self {
        Self {
            cue_id,
            reference_type,
            reference_index,
            waveform_index: 0,
            waveform_id: 0,
            encode_type: 0,
            is_streaming: false,
            is_waveform_identified: false,
            cue_name: None,
        }
    }
}

/// Map an encode type code to the output file extension.
///
/// Unknown codes keep the raw code visible in the name instead of
/// guessing a format.
pub fn extension_for_encode_type(encode_type: u8) -> String {
    match encode_type {
        ENCODE_TYPE_ADX => ".adx".to_string(),
        ENCODE_TYPE_HCA | ENCODE_TYPE_HCA_ALT => ".hca".to_string(),
        ENCODE_TYPE_VAG => ".vag".to_string(),
        ENCODE_TYPE_ATRAC3 => ".at3".to_string(),
        ENCODE_TYPE_BCWAV => ".bcwav".to_string(),
        ENCODE_TYPE_ATRAC9 => ".at9".to_string(),
        ENCODE_TYPE_NINTENDO_DSP => ".dsp".to_string(),
        other => format!(".EncodeType-{other:02}.bin"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_mapping() {
        assert_eq!(extension_for_encode_type(0), ".adx");
        assert_eq!(extension_for_encode_type(2), ".hca");
        assert_eq!(extension_for_encode_type(6), ".hca");
        assert_eq!(extension_for_encode_type(7), ".vag");
        assert_eq!(extension_for_encode_type(8), ".at3");
        assert_eq!(extension_for_encode_type(9), ".bcwav");
        assert_eq!(extension_for_encode_type(11), ".at9");
        assert_eq!(extension_for_encode_type(13), ".dsp");
        assert_eq!(extension_for_encode_type(42), ".EncodeType-42.bin");
        assert_eq!(extension_for_encode_type(3), ".EncodeType-03.bin");
    }
}

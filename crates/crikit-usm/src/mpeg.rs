//! Plain MPEG program-stream format description.

use std::collections::HashMap;

use crate::demux::{BlockSize, ContainerFormat, PACKET_END_BYTES, PACKET_START_BYTES};

/// Standard MPEG program stream: pack headers and slice codes are fixed
/// size, system/private/audio/video packets carry a 2-byte big-endian
/// length.
pub struct MpegPsFormat {
    block_map: HashMap<u32, BlockSize>,
}

impl MpegPsFormat {
    pub fn new() -> Self {
        let mut map = HashMap::new();

        let key = |last: u8| u32::from_le_bytes([0x00, 0x00, 0x01, last]);

        // Program end / pack header.
        map.insert(u32::from_le_bytes(PACKET_END_BYTES), BlockSize::Eof);
        map.insert(u32::from_le_bytes(PACKET_START_BYTES), BlockSize::Static(0xE));

        // System header and private/padding streams.
        map.insert(key(0xBB), BlockSize::SizeBytes(2));
        map.insert(key(0xBD), BlockSize::SizeBytes(2));
        map.insert(key(0xBE), BlockSize::SizeBytes(2));
        map.insert(key(0xBF), BlockSize::SizeBytes(2));

        // Audio streams.
        for id in 0xC0..=0xDF {
            map.insert(key(id), BlockSize::SizeBytes(2));
        }

        // Video streams.
        for id in 0xE0..=0xEF {
            map.insert(key(id), BlockSize::SizeBytes(2));
        }

        // Slice packets.
        for id in 0x00..=0xAF {
            map.insert(key(id), BlockSize::Static(0xE));
        }

        Self { block_map: map }
    }
}

impl Default for MpegPsFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerFormat for MpegPsFormat {
    fn block_map(&self) -> &HashMap<u32, BlockSize> {
        &self.block_map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demux::{demux, DemuxOptions};

    #[test]
    fn test_three_block_stream() {
        // Pack header (0xE bytes), one audio block with payload "ABCD",
        // program end.
        let mut stream = Vec::new();
        stream.extend_from_slice(&[0x00, 0x00, 0x01, 0xBA]);
        stream.extend_from_slice(&[0u8; 0xA]);
        stream.extend_from_slice(&[0x00, 0x00, 0x01, 0xC0, 0x00, 0x04]);
        stream.extend_from_slice(b"ABCD");
        stream.extend_from_slice(&[0x00, 0x00, 0x01, 0xB9]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movie.mpg");
        std::fs::write(&path, &stream).unwrap();

        let format = MpegPsFormat::new();
        let files = demux(&path, &format, &DemuxOptions::default(), None).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(std::fs::read(&files[0]).unwrap(), b"ABCD");
        assert_eq!(
            files[0].file_name().unwrap().to_string_lossy(),
            "movie_000001C0.mpa"
        );
    }

    #[test]
    fn test_audio_only_filter() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&[0x00, 0x00, 0x01, 0xBA]);
        stream.extend_from_slice(&[0u8; 0xA]);
        stream.extend_from_slice(&[0x00, 0x00, 0x01, 0xE0, 0x00, 0x02]);
        stream.extend_from_slice(b"VV");
        stream.extend_from_slice(&[0x00, 0x00, 0x01, 0xC0, 0x00, 0x02]);
        stream.extend_from_slice(b"AA");
        stream.extend_from_slice(&[0x00, 0x00, 0x01, 0xB9]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movie.mpg");
        std::fs::write(&path, &stream).unwrap();

        let format = MpegPsFormat::new();
        let options = DemuxOptions {
            extract_audio: true,
            extract_video: false,
            add_header: false,
        };
        let files = demux(&path, &format, &options, None).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(std::fs::read(&files[0]).unwrap(), b"AA");
    }

    #[test]
    fn test_unknown_block_is_fatal() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&[0x00, 0x00, 0x01, 0xBA]);
        stream.extend_from_slice(&[0u8; 0xA]);
        stream.extend_from_slice(b"GARB");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movie.mpg");
        std::fs::write(&path, &stream).unwrap();

        let format = MpegPsFormat::new();
        assert!(matches!(
            demux(&path, &format, &DemuxOptions::default(), None),
            Err(crate::Error::UnknownBlock { offset: 0xE, .. })
        ));
    }

    #[test]
    fn test_missing_pack_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movie.mpg");
        std::fs::write(&path, vec![0u8; 0x40]).unwrap();

        let format = MpegPsFormat::new();
        assert!(matches!(
            demux(&path, &format, &DemuxOptions::default(), None),
            Err(crate::Error::PackHeaderNotFound { .. })
        ));
    }
}

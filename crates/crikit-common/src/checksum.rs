//! Checksum helpers.
//!
//! Only MD5 is needed by the formats themselves: ACB files embed an MD5
//! of their companion streaming AWB.

/// Compute the MD5 digest of a byte slice.
pub fn md5_digest(bytes: &[u8]) -> [u8; 16] {
    md5::compute(bytes).0
}

/// Compute the MD5 digest of a byte slice as a lowercase hex string.
pub fn md5_hex(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_known_vectors() {
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_hex(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_md5_digest_matches_hex() {
        let digest = md5_digest(b"abc");
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        assert_eq!(hex, md5_hex(b"abc"));
    }
}

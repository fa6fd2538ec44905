//! Binary reader for parsing byte slices.
//!
//! This module provides [`BinaryReader`], a cursor-like type that reads
//! binary data from a byte slice without copying. CRI containers mix
//! endianness per structure (UTF headers are big-endian, AFS2/CRILAYLA
//! headers little-endian), so both variants are provided explicitly.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::{Error, Result};

/// A binary reader over a byte slice.
///
/// Maintains a position and reads without copying. Most CRI parsing is
/// done at absolute offsets, so in addition to the sequential `read_*`
/// methods there is a family of `*_at` accessors that do not move the
/// cursor.
///
/// # Example
///
/// ```
/// use crikit_common::BinaryReader;
///
/// let data = [0x01, 0x02, 0x03, 0x04];
/// let mut reader = BinaryReader::new(&data);
///
/// assert_eq!(reader.read_u32().unwrap(), 0x04030201);
/// assert_eq!(reader.u32_be_at(0).unwrap(), 0x01020304);
/// assert!(reader.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BinaryReader<'a> {
    /// Create a new reader from a byte slice.
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Create a new reader starting at a specific position.
    #[inline]
    pub const fn new_at(data: &'a [u8], position: usize) -> Self {
        Self { data, position }
    }

    /// Get the current position in the buffer.
    #[inline]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Get the total length of the underlying buffer.
    #[inline]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Get the number of bytes remaining to read.
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Check if there are no more bytes to read.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.position >= self.data.len()
    }

    /// Seek to an absolute position.
    #[inline]
    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    /// Advance the position by a number of bytes.
    #[inline]
    pub fn advance(&mut self, count: usize) {
        self.position = self.position.saturating_add(count);
    }

    /// Peek at bytes without advancing the position.
    #[inline]
    pub fn peek_bytes(&self, count: usize) -> Result<&'a [u8]> {
        if self.remaining() < count {
            return Err(Error::UnexpectedEof {
                offset: self.position as u64,
                needed: count,
                available: self.remaining(),
            });
        }
        Ok(&self.data[self.position..self.position + count])
    }

    /// Read bytes and advance the position.
    #[inline]
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let bytes = self.peek_bytes(count)?;
        self.position += count;
        Ok(bytes)
    }

    /// Borrow bytes at an absolute offset without moving the cursor.
    #[inline]
    pub fn bytes_at(&self, offset: usize, count: usize) -> Result<&'a [u8]> {
        if offset.saturating_add(count) > self.data.len() {
            return Err(Error::UnexpectedEof {
                offset: offset as u64,
                needed: count,
                available: self.data.len().saturating_sub(offset.min(self.data.len())),
            });
        }
        Ok(&self.data[offset..offset + count])
    }

    /// Read a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_bytes(1).map(|b| b[0])
    }

    /// Read a signed byte.
    #[inline]
    pub fn read_i8(&mut self) -> Result<i8> {
        self.read_u8().map(|b| b as i8)
    }

    /// Read a little-endian u16.
    #[inline]
    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_bytes(2).map(LittleEndian::read_u16)
    }

    /// Read a little-endian u32.
    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_bytes(4).map(LittleEndian::read_u32)
    }

    /// Read a little-endian u64.
    #[inline]
    pub fn read_u64(&mut self) -> Result<u64> {
        self.read_bytes(8).map(LittleEndian::read_u64)
    }

    /// Read a big-endian u16.
    #[inline]
    pub fn read_u16_be(&mut self) -> Result<u16> {
        self.read_bytes(2).map(BigEndian::read_u16)
    }

    /// Read a big-endian u32.
    #[inline]
    pub fn read_u32_be(&mut self) -> Result<u32> {
        self.read_bytes(4).map(BigEndian::read_u32)
    }

    /// Read a big-endian u64.
    #[inline]
    pub fn read_u64_be(&mut self) -> Result<u64> {
        self.read_bytes(8).map(BigEndian::read_u64)
    }

    // Absolute-offset accessors. These never move the cursor.

    #[inline]
    pub fn u8_at(&self, offset: usize) -> Result<u8> {
        self.bytes_at(offset, 1).map(|b| b[0])
    }

    #[inline]
    pub fn i8_at(&self, offset: usize) -> Result<i8> {
        self.u8_at(offset).map(|b| b as i8)
    }

    #[inline]
    pub fn u16_at(&self, offset: usize) -> Result<u16> {
        self.bytes_at(offset, 2).map(LittleEndian::read_u16)
    }

    #[inline]
    pub fn u32_at(&self, offset: usize) -> Result<u32> {
        self.bytes_at(offset, 4).map(LittleEndian::read_u32)
    }

    #[inline]
    pub fn u16_be_at(&self, offset: usize) -> Result<u16> {
        self.bytes_at(offset, 2).map(BigEndian::read_u16)
    }

    #[inline]
    pub fn i16_be_at(&self, offset: usize) -> Result<i16> {
        self.bytes_at(offset, 2).map(BigEndian::read_i16)
    }

    #[inline]
    pub fn u32_be_at(&self, offset: usize) -> Result<u32> {
        self.bytes_at(offset, 4).map(BigEndian::read_u32)
    }

    #[inline]
    pub fn i32_be_at(&self, offset: usize) -> Result<i32> {
        self.bytes_at(offset, 4).map(BigEndian::read_i32)
    }

    #[inline]
    pub fn u64_be_at(&self, offset: usize) -> Result<u64> {
        self.bytes_at(offset, 8).map(BigEndian::read_u64)
    }

    #[inline]
    pub fn f32_be_at(&self, offset: usize) -> Result<f32> {
        self.bytes_at(offset, 4).map(BigEndian::read_f32)
    }

    /// Read a NUL-terminated string at an absolute offset.
    ///
    /// CRI string tables are nominally ASCII but some titles carry
    /// Shift-JIS names; non-ASCII bytes are decoded lossily rather than
    /// rejected so that such tables still parse.
    pub fn cstring_at(&self, offset: usize) -> Result<String> {
        if offset >= self.data.len() {
            return Err(Error::UnexpectedEof {
                offset: offset as u64,
                needed: 1,
                available: 0,
            });
        }

        let tail = &self.data[offset..];
        let nul = memchr::memchr(0, tail).ok_or(Error::MissingNulTerminator {
            offset: offset as u64,
        })?;

        Ok(String::from_utf8_lossy(&tail[..nul]).into_owned())
    }

    /// Expect specific magic bytes at the cursor, advancing past them.
    pub fn expect_magic(&mut self, expected: &[u8]) -> Result<()> {
        let offset = self.position as u64;
        let actual = self.read_bytes(expected.len())?;
        if actual != expected {
            return Err(Error::InvalidMagic {
                offset,
                expected: expected.to_vec(),
                actual: actual.to_vec(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_primitives() {
        let data = [0x01u8, 0x02, 0x03, 0x04, 0xFF, 0xFF, 0xFF, 0xFF];
        let mut reader = BinaryReader::new(&data);

        assert_eq!(reader.read_u32().unwrap(), 0x04030201);
        assert_eq!(reader.read_u32().unwrap(), 0xFFFFFFFF);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_endian_variants() {
        let data = [0x12u8, 0x34, 0x56, 0x78];
        let reader = BinaryReader::new(&data);

        assert_eq!(reader.u32_at(0).unwrap(), 0x78563412);
        assert_eq!(reader.u32_be_at(0).unwrap(), 0x12345678);
        assert_eq!(reader.u16_be_at(2).unwrap(), 0x5678);
    }

    #[test]
    fn test_cstring_at() {
        let data = b"hello\0world\0";
        let reader = BinaryReader::new(data);

        assert_eq!(reader.cstring_at(0).unwrap(), "hello");
        assert_eq!(reader.cstring_at(6).unwrap(), "world");
        assert!(reader.cstring_at(100).is_err());
    }

    #[test]
    fn test_cstring_missing_terminator() {
        let data = b"notermi";
        let reader = BinaryReader::new(data);

        assert!(matches!(
            reader.cstring_at(0),
            Err(Error::MissingNulTerminator { .. })
        ));
    }

    #[test]
    fn test_eof_error() {
        let data = [0x01, 0x02];
        let mut reader = BinaryReader::new(&data);

        assert!(reader.read_u32().is_err());
        assert!(reader.u64_be_at(0).is_err());
    }

    #[test]
    fn test_expect_magic() {
        let data = b"AFS2rest";
        let mut reader = BinaryReader::new(data);

        assert!(reader.expect_magic(b"AFS2").is_ok());
        assert_eq!(reader.position(), 4);

        let mut reader = BinaryReader::new(data);
        assert!(matches!(
            reader.expect_magic(b"CPK "),
            Err(Error::InvalidMagic { .. })
        ));
    }
}

//! @UTF table parser.
//!
//! The @UTF format is self-describing: a big-endian header is followed by
//! per-column descriptors whose type codes pack a storage kind (per-row /
//! table-constant / zero) with a primitive type. Constant values live
//! inline in the schema stream; per-row values live in the row data
//! region. Two cursors are maintained while walking the schema - the
//! schema cursor restarts at 0x20 for every row, the row cursor restarts
//! at the row base - and each advances only for the storage kind it owns.

use std::borrow::Cow;

use byteorder::{BigEndian, ByteOrder};
use indexmap::IndexMap;
use tracing::debug;

use crikit_common::BinaryReader;

use crate::cipher::{self, KeyCache, LcgKeys, LcgKeystream};
use crate::{Error, Result, UtfValue};

/// The `@UTF` signature.
pub const SIGNATURE: [u8; 4] = *b"@UTF";

pub const COLUMN_STORAGE_MASK: u8 = 0xF0;
pub const COLUMN_STORAGE_PER_ROW: u8 = 0x50;
pub const COLUMN_STORAGE_CONSTANT: u8 = 0x30;
pub const COLUMN_STORAGE_CONSTANT2: u8 = 0x70;
pub const COLUMN_STORAGE_ZERO: u8 = 0x10;

pub const COLUMN_TYPE_MASK: u8 = 0x0F;
pub const COLUMN_TYPE_U8: u8 = 0x00;
pub const COLUMN_TYPE_I8: u8 = 0x01;
pub const COLUMN_TYPE_U16: u8 = 0x02;
pub const COLUMN_TYPE_I16: u8 = 0x03;
pub const COLUMN_TYPE_U32: u8 = 0x04;
pub const COLUMN_TYPE_I32: u8 = 0x05;
pub const COLUMN_TYPE_U64: u8 = 0x06;
pub const COLUMN_TYPE_F32: u8 = 0x08;
pub const COLUMN_TYPE_STRING: u8 = 0x0A;
pub const COLUMN_TYPE_DATA: u8 = 0x0B;

/// A decoded field within a row.
#[derive(Debug, Clone, PartialEq)]
pub struct UtfField {
    /// Raw column type code (storage nibble | primitive type nibble).
    pub type_code: u8,
    /// Column name from the string table.
    pub name: String,
    /// Decoded value.
    pub value: UtfValue,
    /// Absolute offset of the blob bytes in the source (data fields only).
    pub offset: u64,
    /// Blob size in bytes (data fields only).
    pub size: u64,
}

/// A decoded @UTF table.
///
/// Tables nest: a data field's bytes may themselves be another @UTF table
/// (probed with [`is_utf_table`] and re-parsed by the caller).
#[derive(Debug, Clone, PartialEq)]
pub struct UtfTable {
    /// Absolute offset of the table in the source.
    pub base_offset: u64,
    /// Table name from the string table.
    pub table_name: String,
    /// Table byte size (counted from offset 8).
    pub table_size: u32,
    /// Row data offset relative to the table start.
    pub row_offset: u32,
    /// String table offset relative to the table start.
    pub string_table_offset: u32,
    /// Data segment offset relative to the table start.
    pub data_offset: u32,
    /// Number of columns.
    pub field_count: u16,
    /// Byte size of one row's per-row data.
    pub row_size: u16,
    /// Number of rows.
    pub row_count: u32,
    /// Decoded rows; each row maps column name to field, in schema order.
    pub rows: Vec<IndexMap<String, UtfField>>,
}

impl UtfTable {
    /// Parse a table at `offset`, deriving LCG keys if it is encrypted.
    pub fn parse(data: &[u8], offset: usize) -> Result<UtfTable> {
        let mut cache = None;
        Self::parse_with_cache(data, offset, &mut cache)
    }

    /// Parse a table at `offset`, reusing (and populating) a per-file
    /// LCG key cache.
    ///
    /// Keys found for one table in a file are assumed to apply to all
    /// subsequently encrypted tables in the same file.
    pub fn parse_with_cache(data: &[u8], offset: usize, cache: &mut KeyCache) -> Result<UtfTable> {
        let source = BinaryReader::new(data);
        let magic: [u8; 4] = source
            .bytes_at(offset, 4)
            .map_err(Error::Common)?
            .try_into()
            .expect("4-byte read");

        let keys = if magic == SIGNATURE {
            None
        } else {
            let keys = resolve_keys(magic, *cache).ok_or(Error::UnrecoverableEncryption {
                offset: offset as u64,
            })?;
            *cache = Some(keys);
            Some(keys)
        };

        // Table size counts from offset 8; +8 covers the whole image.
        let table_size = match keys {
            None => source.u32_be_at(offset + 4)?,
            Some(k) => {
                let mut head = source.bytes_at(offset, 8)?.to_vec();
                LcgKeystream::new(k).decrypt(0, &mut head);
                BigEndian::read_u32(&head[4..8])
            }
        };

        let image_len = (table_size as usize + 8).min(data.len().saturating_sub(offset));
        let image: Cow<'_, [u8]> = match keys {
            None => Cow::Borrowed(&data[offset..offset + image_len]),
            Some(k) => {
                // In-memory scratch copy of the decrypted table image.
                // Blob bytes are stored in the clear and are read from the
                // original source below, never from this copy.
                let mut buf = data[offset..offset + image_len].to_vec();
                LcgKeystream::new(k).decrypt(0, &mut buf);
                Cow::Owned(buf)
            }
        };

        let table = BinaryReader::new(&image);
        let decrypted_magic = table.bytes_at(0, 4)?;
        if decrypted_magic != SIGNATURE {
            return Err(Error::SignatureNotFound {
                offset: offset as u64,
                actual: magic,
            });
        }

        let row_offset = u32::from(table.u16_be_at(0x0A)?) + 8;
        let string_table_offset = table.u32_be_at(0x0C)? + 8;
        let data_offset = table.u32_be_at(0x10)? + 8;
        let table_name_offset = table.u32_be_at(0x14)?;
        let field_count = table.u16_be_at(0x18)?;
        let row_size = table.u16_be_at(0x1A)?;
        let row_count = table.u32_be_at(0x1C)?;

        let table_name =
            table.cstring_at(string_table_offset as usize + table_name_offset as usize)?;

        debug!(
            offset,
            name = %table_name,
            rows = row_count,
            fields = field_count,
            encrypted = keys.is_some(),
            "parsed UTF header"
        );

        let mut rows = Vec::with_capacity(row_count as usize);

        for i in 0..row_count {
            let mut schema_cursor = 0x20usize;
            let row_base = row_offset as usize + row_size as usize * i as usize;
            let mut row_cursor = 0usize;
            let mut row = IndexMap::with_capacity(field_count as usize);

            for _ in 0..field_count {
                let type_code = table.u8_at(schema_cursor)?;
                let name_offset = table.u32_be_at(schema_cursor + 1)?;
                let name =
                    table.cstring_at(string_table_offset as usize + name_offset as usize)?;

                let field = match type_code & COLUMN_STORAGE_MASK {
                    COLUMN_STORAGE_CONSTANT | COLUMN_STORAGE_CONSTANT2 => {
                        let decoded = decode_value(
                            &table,
                            &source,
                            schema_cursor + 5,
                            type_code,
                            string_table_offset as usize,
                            data_offset as u64,
                            offset as u64,
                        )?;
                        schema_cursor += decoded.width;
                        UtfField {
                            type_code,
                            name: name.clone(),
                            value: decoded.value,
                            offset: decoded.offset,
                            size: decoded.size,
                        }
                    }
                    COLUMN_STORAGE_PER_ROW => {
                        let decoded = decode_value(
                            &table,
                            &source,
                            row_base + row_cursor,
                            type_code,
                            string_table_offset as usize,
                            data_offset as u64,
                            offset as u64,
                        )?;
                        row_cursor += decoded.width;
                        UtfField {
                            type_code,
                            name: name.clone(),
                            value: decoded.value,
                            offset: decoded.offset,
                            size: decoded.size,
                        }
                    }
                    // Zero storage contributes no stored bytes; every row
                    // sees the type's zero.
                    _ => UtfField {
                        type_code,
                        name: name.clone(),
                        value: zero_value(type_code, (offset + schema_cursor) as u64)?,
                        offset: 0,
                        size: 0,
                    },
                };

                row.insert(name, field);
                schema_cursor += 5;
            }

            rows.push(row);
        }

        Ok(UtfTable {
            base_offset: offset as u64,
            table_name,
            table_size,
            row_offset,
            string_table_offset,
            data_offset,
            field_count,
            row_size,
            row_count,
            rows,
        })
    }

    /// Get a field by row index and column name.
    pub fn field(&self, row: usize, name: &str) -> Option<&UtfField> {
        self.rows.get(row).and_then(|r| r.get(name))
    }

    /// Get a field's value by row index and column name.
    pub fn field_value(&self, row: usize, name: &str) -> Option<&UtfValue> {
        self.field(row, name).map(|f| &f.value)
    }

    /// Get a blob field's absolute source offset.
    pub fn field_offset(&self, row: usize, name: &str) -> Option<u64> {
        self.field(row, name).map(|f| f.offset)
    }

    /// Get a blob field's size.
    pub fn field_size(&self, row: usize, name: &str) -> Option<u64> {
        self.field(row, name).map(|f| f.size)
    }
}

/// Probe whether the bytes at `offset` are an @UTF table, consulting the
/// key cache for the encrypted variant. The cache is read but never
/// populated by a probe.
pub fn is_utf_table(data: &[u8], offset: usize, cache: &KeyCache) -> bool {
    let Ok(magic) = BinaryReader::new(data).bytes_at(offset, 4) else {
        return false;
    };
    let magic: [u8; 4] = magic.try_into().expect("4-byte read");

    magic == SIGNATURE || resolve_keys(magic, *cache).is_some()
}

fn resolve_keys(magic: [u8; 4], cached: KeyCache) -> Option<LcgKeys> {
    if let Some(keys) = cached {
        if cipher::decrypt_signature(magic, keys) == SIGNATURE {
            return Some(keys);
        }
    }

    cipher::find_keys(magic)
}

struct DecodedValue {
    value: UtfValue,
    offset: u64,
    size: u64,
    width: usize,
}

fn decode_value(
    table: &BinaryReader<'_>,
    source: &BinaryReader<'_>,
    at: usize,
    type_code: u8,
    string_table_offset: usize,
    data_offset: u64,
    base_offset: u64,
) -> Result<DecodedValue> {
    let plain = |value, width| DecodedValue {
        value,
        offset: 0,
        size: 0,
        width,
    };

    match type_code & COLUMN_TYPE_MASK {
        COLUMN_TYPE_U8 => Ok(plain(UtfValue::U8(table.u8_at(at)?), 1)),
        COLUMN_TYPE_I8 => Ok(plain(UtfValue::I8(table.i8_at(at)?), 1)),
        COLUMN_TYPE_U16 => Ok(plain(UtfValue::U16(table.u16_be_at(at)?), 2)),
        COLUMN_TYPE_I16 => Ok(plain(UtfValue::I16(table.i16_be_at(at)?), 2)),
        COLUMN_TYPE_U32 => Ok(plain(UtfValue::U32(table.u32_be_at(at)?), 4)),
        COLUMN_TYPE_I32 => Ok(plain(UtfValue::I32(table.i32_be_at(at)?), 4)),
        COLUMN_TYPE_U64 => Ok(plain(UtfValue::U64(table.u64_be_at(at)?), 8)),
        COLUMN_TYPE_F32 => Ok(plain(UtfValue::F32(table.f32_be_at(at)?), 4)),
        COLUMN_TYPE_STRING => {
            let local = table.u32_be_at(at)? as usize;
            let s = table.cstring_at(string_table_offset + local)?;
            Ok(plain(UtfValue::String(s), 4))
        }
        COLUMN_TYPE_DATA => {
            let local = u64::from(table.u32_be_at(at)?);
            let size = u64::from(table.u32_be_at(at + 4)?);
            let abs = base_offset + data_offset + local;
            // Blob bytes come from the original source stream; the data
            // segment is stored in the clear even in encrypted tables.
            let bytes = source.bytes_at(abs as usize, size as usize)?.to_vec();
            Ok(DecodedValue {
                value: UtfValue::Data(bytes),
                offset: abs,
                size,
                width: 8,
            })
        }
        code => Err(Error::UnknownColumnType {
            offset: base_offset + at as u64,
            code,
        }),
    }
}

fn zero_value(type_code: u8, offset: u64) -> Result<UtfValue> {
    match type_code & COLUMN_TYPE_MASK {
        COLUMN_TYPE_U8 => Ok(UtfValue::U8(0)),
        COLUMN_TYPE_I8 => Ok(UtfValue::I8(0)),
        COLUMN_TYPE_U16 => Ok(UtfValue::U16(0)),
        COLUMN_TYPE_I16 => Ok(UtfValue::I16(0)),
        COLUMN_TYPE_U32 => Ok(UtfValue::U32(0)),
        COLUMN_TYPE_I32 => Ok(UtfValue::I32(0)),
        COLUMN_TYPE_U64 => Ok(UtfValue::U64(0)),
        COLUMN_TYPE_F32 => Ok(UtfValue::F32(0.0)),
        COLUMN_TYPE_STRING => Ok(UtfValue::String(String::new())),
        COLUMN_TYPE_DATA => Ok(UtfValue::Data(Vec::new())),
        code => Err(Error::UnknownColumnType { offset, code }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::LcgKeys;
    use crate::testkit::TableBuilder;

    fn sample_table() -> TableBuilder {
        let mut b = TableBuilder::new("SampleTable");
        b.constant_u32("Version", 0x0113);
        b.per_row_string("Name", &["first", "second"]);
        b.per_row_data("Payload", &[&[0xAA, 0xBB, 0xCC][..], &[0x01, 0x02][..]]);
        b
    }

    #[test]
    fn test_end_to_end_two_rows_three_columns() {
        let bytes = sample_table().build();
        let table = UtfTable::parse(&bytes, 0).unwrap();

        assert_eq!(table.table_name, "SampleTable");
        assert_eq!(table.row_count, 2);
        assert_eq!(table.field_count, 3);
        assert_eq!(table.rows.len(), 2);

        assert_eq!(
            table.field_value(0, "Version").and_then(UtfValue::as_u32),
            Some(0x0113)
        );
        assert_eq!(
            table.field_value(1, "Version").and_then(UtfValue::as_u32),
            Some(0x0113)
        );
        assert_eq!(
            table.field_value(0, "Name").and_then(UtfValue::as_str),
            Some("first")
        );
        assert_eq!(
            table.field_value(1, "Name").and_then(UtfValue::as_str),
            Some("second")
        );
        assert_eq!(
            table.field_value(0, "Payload").and_then(UtfValue::as_bytes),
            Some(&[0xAA, 0xBB, 0xCC][..])
        );
        assert_eq!(
            table.field_value(1, "Payload").and_then(UtfValue::as_bytes),
            Some(&[0x01, 0x02][..])
        );

        // Blob offset/size locate the bytes in the source.
        let field = table.field(1, "Payload").unwrap();
        assert_eq!(
            &bytes[field.offset as usize..(field.offset + field.size) as usize],
            &[0x01, 0x02]
        );
    }

    #[test]
    fn test_reparse_is_pure() {
        let bytes = sample_table().build();
        let first = UtfTable::parse(&bytes, 0).unwrap();
        let second = UtfTable::parse(&bytes, 0).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_schema_invariant() {
        let bytes = sample_table().build();
        let table = UtfTable::parse(&bytes, 0).unwrap();

        for row in &table.rows {
            assert_eq!(row.len(), table.field_count as usize);
        }

        // Constant columns are bit-identical across rows.
        let v0 = table.field_value(0, "Version").unwrap();
        let v1 = table.field_value(1, "Version").unwrap();
        assert_eq!(v0, v1);
    }

    #[test]
    fn test_parse_at_nonzero_offset() {
        let image = sample_table().build();
        let mut bytes = vec![0u8; 0x40];
        bytes.extend_from_slice(&image);
        let table = UtfTable::parse(&bytes, 0x40).unwrap();

        assert_eq!(table.base_offset, 0x40);
        assert_eq!(
            table.field_value(0, "Payload").and_then(UtfValue::as_bytes),
            Some(&[0xAA, 0xBB, 0xCC][..])
        );
    }

    #[test]
    fn test_encrypted_table_parses_identically() {
        let keys = LcgKeys {
            seed: 0x5F,
            increment: 0x15,
        };
        let plain = sample_table().build();
        let encrypted = sample_table().build_encrypted(keys);
        assert_ne!(plain[..4], encrypted[..4]);

        let mut cache = None;
        let from_plain = UtfTable::parse(&plain, 0).unwrap();
        let from_encrypted = UtfTable::parse_with_cache(&encrypted, 0, &mut cache).unwrap();

        assert_eq!(cache, Some(keys));
        assert_eq!(from_plain.rows, from_encrypted.rows);
        assert_eq!(from_plain.table_name, from_encrypted.table_name);
    }

    #[test]
    fn test_not_a_table_is_unrecoverable() {
        // Random bytes that no key pair maps to the signature.
        let bytes = vec![0x13u8; 0x40];
        match UtfTable::parse(&bytes, 0) {
            Err(Error::UnrecoverableEncryption { offset }) => assert_eq!(offset, 0),
            other => panic!("expected UnrecoverableEncryption, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_storage_column() {
        let mut b = TableBuilder::new("ZeroTable");
        b.per_row_u16("Index", &[1, 2, 3]);
        b.zero_column("Reserved", COLUMN_TYPE_U32);
        let bytes = b.build();

        let table = UtfTable::parse(&bytes, 0).unwrap();
        for row in 0..3 {
            assert_eq!(
                table.field_value(row, "Reserved"),
                Some(&UtfValue::U32(0))
            );
        }
    }

    #[test]
    fn test_is_utf_table_probe() {
        let bytes = sample_table().build();
        let cache = None;
        assert!(is_utf_table(&bytes, 0, &cache));
        assert!(!is_utf_table(&bytes, 4, &cache));
        assert!(!is_utf_table(&bytes, bytes.len(), &cache));
    }
}

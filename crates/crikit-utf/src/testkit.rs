//! Synthetic @UTF table builder.
//!
//! Test-only tooling for constructing well-formed table images in memory:
//! the unit tests here and the cpk/acb test suites build fixtures with it.
//! Layout produced: header (0x20) | schema | row data | string table |
//! data segment. Constant blob values are encoded first, then per-row
//! blobs in row-major order, so consecutive rows' blobs are adjacent in
//! the data segment (which some ACB resolution paths rely on).

use byteorder::{BigEndian, ByteOrder};
use indexmap::IndexMap;

use crate::cipher::{LcgKeys, LcgKeystream};
use crate::table::{
    COLUMN_STORAGE_CONSTANT, COLUMN_STORAGE_PER_ROW, COLUMN_STORAGE_ZERO, COLUMN_TYPE_DATA,
    COLUMN_TYPE_I16, COLUMN_TYPE_I32, COLUMN_TYPE_I8, COLUMN_TYPE_STRING, COLUMN_TYPE_U16,
    COLUMN_TYPE_U32, COLUMN_TYPE_U64, COLUMN_TYPE_U8, SIGNATURE,
};
use crate::UtfValue;

enum Storage {
    PerRow(Vec<UtfValue>),
    Constant(UtfValue),
    Zero(u8),
}

struct Column {
    name: String,
    storage: Storage,
}

/// Builder producing @UTF byte images.
pub struct TableBuilder {
    name: String,
    columns: Vec<Column>,
    explicit_rows: Option<usize>,
}

impl TableBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            explicit_rows: None,
        }
    }

    /// Force a row count (only needed for tables with no per-row columns).
    pub fn rows(&mut self, count: usize) -> &mut Self {
        self.explicit_rows = Some(count);
        self
    }

    pub fn constant_u8(&mut self, name: &str, value: u8) -> &mut Self {
        self.push_constant(name, UtfValue::U8(value))
    }

    pub fn constant_u16(&mut self, name: &str, value: u16) -> &mut Self {
        self.push_constant(name, UtfValue::U16(value))
    }

    pub fn constant_u32(&mut self, name: &str, value: u32) -> &mut Self {
        self.push_constant(name, UtfValue::U32(value))
    }

    pub fn constant_u64(&mut self, name: &str, value: u64) -> &mut Self {
        self.push_constant(name, UtfValue::U64(value))
    }

    pub fn constant_string(&mut self, name: &str, value: &str) -> &mut Self {
        self.push_constant(name, UtfValue::String(value.to_string()))
    }

    pub fn constant_data(&mut self, name: &str, value: &[u8]) -> &mut Self {
        self.push_constant(name, UtfValue::Data(value.to_vec()))
    }

    pub fn per_row_u8(&mut self, name: &str, values: &[u8]) -> &mut Self {
        self.push_per_row(name, values.iter().map(|&v| UtfValue::U8(v)).collect())
    }

    pub fn per_row_u16(&mut self, name: &str, values: &[u16]) -> &mut Self {
        self.push_per_row(name, values.iter().map(|&v| UtfValue::U16(v)).collect())
    }

    pub fn per_row_u32(&mut self, name: &str, values: &[u32]) -> &mut Self {
        self.push_per_row(name, values.iter().map(|&v| UtfValue::U32(v)).collect())
    }

    pub fn per_row_u64(&mut self, name: &str, values: &[u64]) -> &mut Self {
        self.push_per_row(name, values.iter().map(|&v| UtfValue::U64(v)).collect())
    }

    pub fn per_row_string(&mut self, name: &str, values: &[&str]) -> &mut Self {
        self.push_per_row(
            name,
            values
                .iter()
                .map(|v| UtfValue::String((*v).to_string()))
                .collect(),
        )
    }

    pub fn per_row_data(&mut self, name: &str, values: &[&[u8]]) -> &mut Self {
        self.push_per_row(
            name,
            values.iter().map(|v| UtfValue::Data(v.to_vec())).collect(),
        )
    }

    pub fn zero_column(&mut self, name: &str, type_code: u8) -> &mut Self {
        self.columns.push(Column {
            name: name.to_string(),
            storage: Storage::Zero(type_code),
        });
        self
    }

    fn push_constant(&mut self, name: &str, value: UtfValue) -> &mut Self {
        self.columns.push(Column {
            name: name.to_string(),
            storage: Storage::Constant(value),
        });
        self
    }

    fn push_per_row(&mut self, name: &str, values: Vec<UtfValue>) -> &mut Self {
        self.columns.push(Column {
            name: name.to_string(),
            storage: Storage::PerRow(values),
        });
        self
    }

    fn row_count(&self) -> usize {
        self.columns
            .iter()
            .find_map(|c| match &c.storage {
                Storage::PerRow(v) => Some(v.len()),
                _ => None,
            })
            .or(self.explicit_rows)
            .unwrap_or(1)
    }

    /// Build the table image.
    pub fn build(&self) -> Vec<u8> {
        self.build_image().0
    }

    /// Build the table image and XOR-encrypt everything before the data
    /// segment with the LCG keystream. The data segment stays in the
    /// clear, matching how encrypted tables appear on disk.
    pub fn build_encrypted(&self, keys: LcgKeys) -> Vec<u8> {
        let (mut image, data_start) = self.build_image();
        LcgKeystream::new(keys).decrypt(0, &mut image[..data_start]);
        image
    }

    fn build_image(&self) -> (Vec<u8>, usize) {
        let row_count = self.row_count();

        for column in &self.columns {
            if let Storage::PerRow(values) = &column.storage {
                assert_eq!(
                    values.len(),
                    row_count,
                    "per-row column {} has inconsistent row count",
                    column.name
                );
            }
        }

        // Intern strings: <NULL> sentinel first, then the table name,
        // column names, and string values, in encounter order.
        let mut strings: IndexMap<String, u32> = IndexMap::new();
        let mut string_blob = Vec::new();
        let mut intern = |s: &str, blob: &mut Vec<u8>, map: &mut IndexMap<String, u32>| -> u32 {
            if let Some(&off) = map.get(s) {
                return off;
            }
            let off = blob.len() as u32;
            blob.extend_from_slice(s.as_bytes());
            blob.push(0);
            map.insert(s.to_string(), off);
            off
        };

        intern("<NULL>", &mut string_blob, &mut strings);
        let name_offset = intern(&self.name, &mut string_blob, &mut strings);
        for column in &self.columns {
            intern(&column.name, &mut string_blob, &mut strings);
        }
        for column in &self.columns {
            match &column.storage {
                Storage::Constant(UtfValue::String(s)) => {
                    intern(s, &mut string_blob, &mut strings);
                }
                Storage::PerRow(values) => {
                    for value in values {
                        if let UtfValue::String(s) = value {
                            intern(s, &mut string_blob, &mut strings);
                        }
                    }
                }
                _ => {}
            }
        }

        // Lay out the data segment: constant blobs, then per-row blobs in
        // row-major order.
        let mut data_blob = Vec::new();
        let mut blob_offsets: Vec<Vec<Option<u32>>> = Vec::new(); // [column][row]
        for column in &self.columns {
            let mut per_column = vec![None; row_count.max(1)];
            if let Storage::Constant(UtfValue::Data(bytes)) = &column.storage {
                let off = data_blob.len() as u32;
                data_blob.extend_from_slice(bytes);
                per_column.fill(Some(off));
            }
            blob_offsets.push(per_column);
        }
        for row in 0..row_count {
            for (ci, column) in self.columns.iter().enumerate() {
                if let Storage::PerRow(values) = &column.storage {
                    if let UtfValue::Data(bytes) = &values[row] {
                        let off = data_blob.len() as u32;
                        data_blob.extend_from_slice(bytes);
                        blob_offsets[ci][row] = Some(off);
                    }
                }
            }
        }

        let encode = |value: &UtfValue, blob_off: Option<u32>, out: &mut Vec<u8>| match value {
            UtfValue::U8(v) => out.push(*v),
            UtfValue::I8(v) => out.push(*v as u8),
            UtfValue::U16(v) => out.extend_from_slice(&v.to_be_bytes()),
            UtfValue::I16(v) => out.extend_from_slice(&v.to_be_bytes()),
            UtfValue::U32(v) => out.extend_from_slice(&v.to_be_bytes()),
            UtfValue::I32(v) => out.extend_from_slice(&v.to_be_bytes()),
            UtfValue::U64(v) => out.extend_from_slice(&v.to_be_bytes()),
            UtfValue::F32(v) => out.extend_from_slice(&v.to_be_bytes()),
            UtfValue::String(s) => {
                out.extend_from_slice(&strings[s.as_str()].to_be_bytes());
            }
            UtfValue::Data(bytes) => {
                out.extend_from_slice(&blob_off.expect("blob laid out").to_be_bytes());
                out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
            }
            UtfValue::Null => panic!("cannot encode a null value"),
        };

        // Schema stream: descriptor (type + name offset) plus inline
        // constant values.
        let mut schema = Vec::new();
        for (ci, column) in self.columns.iter().enumerate() {
            let name_off = strings[column.name.as_str()];
            match &column.storage {
                Storage::Constant(value) => {
                    schema.push(COLUMN_STORAGE_CONSTANT | type_code_of(value));
                    schema.extend_from_slice(&name_off.to_be_bytes());
                    encode(value, blob_offsets[ci].first().copied().flatten(), &mut schema);
                }
                Storage::PerRow(values) => {
                    schema.push(COLUMN_STORAGE_PER_ROW | type_code_of(&values[0]));
                    schema.extend_from_slice(&name_off.to_be_bytes());
                }
                Storage::Zero(type_code) => {
                    schema.push(COLUMN_STORAGE_ZERO | (type_code & 0x0F));
                    schema.extend_from_slice(&name_off.to_be_bytes());
                }
            }
        }

        // Row data.
        let mut row_data = Vec::new();
        let mut row_size = 0usize;
        for row in 0..row_count {
            let before = row_data.len();
            for (ci, column) in self.columns.iter().enumerate() {
                if let Storage::PerRow(values) = &column.storage {
                    encode(&values[row], blob_offsets[ci][row], &mut row_data);
                }
            }
            row_size = row_data.len() - before;
        }

        let schema_start = 0x20usize;
        let rows_start = schema_start + schema.len();
        let strings_start = rows_start + row_data.len();
        let data_start = strings_start + string_blob.len();
        let total = data_start + data_blob.len();

        let mut image = vec![0u8; total];
        image[0..4].copy_from_slice(&SIGNATURE);
        BigEndian::write_u32(&mut image[4..8], (total - 8) as u32);
        BigEndian::write_u16(&mut image[8..10], 1);
        BigEndian::write_u16(&mut image[0x0A..0x0C], (rows_start - 8) as u16);
        BigEndian::write_u32(&mut image[0x0C..0x10], (strings_start - 8) as u32);
        BigEndian::write_u32(&mut image[0x10..0x14], (data_start - 8) as u32);
        BigEndian::write_u32(&mut image[0x14..0x18], name_offset);
        BigEndian::write_u16(&mut image[0x18..0x1A], self.columns.len() as u16);
        BigEndian::write_u16(&mut image[0x1A..0x1C], row_size as u16);
        BigEndian::write_u32(&mut image[0x1C..0x20], row_count as u32);

        image[schema_start..rows_start].copy_from_slice(&schema);
        image[rows_start..strings_start].copy_from_slice(&row_data);
        image[strings_start..data_start].copy_from_slice(&string_blob);
        image[data_start..].copy_from_slice(&data_blob);

        (image, data_start)
    }
}

fn type_code_of(value: &UtfValue) -> u8 {
    match value {
        UtfValue::U8(_) => COLUMN_TYPE_U8,
        UtfValue::I8(_) => COLUMN_TYPE_I8,
        UtfValue::U16(_) => COLUMN_TYPE_U16,
        UtfValue::I16(_) => COLUMN_TYPE_I16,
        UtfValue::U32(_) => COLUMN_TYPE_U32,
        UtfValue::I32(_) => COLUMN_TYPE_I32,
        UtfValue::U64(_) => COLUMN_TYPE_U64,
        UtfValue::F32(_) => crate::table::COLUMN_TYPE_F32,
        UtfValue::String(_) => COLUMN_TYPE_STRING,
        UtfValue::Data(_) => COLUMN_TYPE_DATA,
        UtfValue::Null => panic!("null values have no type code"),
    }
}

//! CRI @UTF table decoder.
//!
//! The @UTF format (unrelated to Unicode) is CRI Middleware's generic
//! self-describing tabular container. An ACB cue database is a @UTF table
//! whose blob fields hold further @UTF tables; CPK archives store their
//! TOC/ITOC indices the same way. This crate decodes:
//!
//! - the big-endian header and per-column schema (storage kind + runtime
//!   primitive type),
//! - per-row, table-constant and zero-storage column values,
//! - string-table and data-segment (blob) fields, including blobs that
//!   are themselves nested tables,
//! - the LCG-encrypted variant, recovering `(seed, increment)` by brute
//!   force against the 4-byte signature.
//!
//! # Example
//!
//! ```no_run
//! use crikit_utf::UtfTable;
//!
//! let data = std::fs::read("header.bin")?;
//! let table = UtfTable::parse(&data, 0)?;
//!
//! for row in &table.rows {
//!     for field in row.values() {
//!         println!("{} = {}", field.name, field.value);
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod cipher;
mod dump;
mod error;
mod table;
mod value;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use cipher::{find_keys, KeyCache, LcgKeys, LcgKeystream};
pub use dump::dump_table;
pub use error::{Error, Result};
pub use table::{
    is_utf_table, UtfField, UtfTable, COLUMN_STORAGE_CONSTANT, COLUMN_STORAGE_CONSTANT2,
    COLUMN_STORAGE_MASK, COLUMN_STORAGE_PER_ROW, COLUMN_STORAGE_ZERO, COLUMN_TYPE_DATA,
    COLUMN_TYPE_F32, COLUMN_TYPE_I16, COLUMN_TYPE_I32, COLUMN_TYPE_I8, COLUMN_TYPE_MASK,
    COLUMN_TYPE_STRING, COLUMN_TYPE_U16, COLUMN_TYPE_U32, COLUMN_TYPE_U64, COLUMN_TYPE_U8,
    SIGNATURE,
};
pub use value::UtfValue;

//! Human-readable table dumps.
//!
//! Mirrors the layout reverse-engineers expect: one line per field with
//! hex offset, raw type code, name and value, recursing into data fields
//! that themselves probe as nested @UTF tables.

use std::fmt::Write;

use crate::cipher::KeyCache;
use crate::table::{is_utf_table, UtfTable, COLUMN_TYPE_DATA, COLUMN_TYPE_MASK};
use crate::{Result, UtfValue};

/// Render `table` as indented text, re-parsing nested tables found in
/// data fields. `source` must be the byte slice the table was parsed from.
pub fn dump_table(table: &UtfTable, source: &[u8], cache: &mut KeyCache) -> Result<String> {
    let mut out = String::new();
    dump_into(&mut out, table, source, cache, 0)?;
    Ok(out)
}

fn dump_into(
    out: &mut String,
    table: &UtfTable,
    source: &[u8],
    cache: &mut KeyCache,
    indent: usize,
) -> Result<()> {
    let pad = " ".repeat(indent);

    for (i, row) in table.rows.iter().enumerate() {
        let _ = writeln!(out, "{pad}{}[0x{i:04X}]", table.table_name);

        for field in row.values() {
            let is_nested = (field.type_code & COLUMN_TYPE_MASK) == COLUMN_TYPE_DATA
                && field.size > 0
                && is_utf_table(source, field.offset as usize, cache);

            if is_nested {
                let _ = writeln!(
                    out,
                    "{pad}  0x{:08X} {:02X} {} =",
                    field.offset, field.type_code, field.name
                );
                let nested = UtfTable::parse_with_cache(source, field.offset as usize, cache)?;
                dump_into(out, &nested, source, cache, indent + 4)?;
            } else if let UtfValue::Data(bytes) = &field.value {
                let _ = writeln!(
                    out,
                    "{pad}  0x{:08X} {:02X} {} = {}",
                    field.offset,
                    field.type_code,
                    field.name,
                    hex_preview(bytes)
                );
            } else {
                let _ = writeln!(
                    out,
                    "{pad}  0x{:08X} {:02X} {} = {}",
                    field.offset, field.type_code, field.name, field.value
                );
            }
        }

        let _ = writeln!(out);
    }

    Ok(())
}

fn hex_preview(bytes: &[u8]) -> String {
    const PREVIEW_LIMIT: usize = 0x20;

    let shown = &bytes[..bytes.len().min(PREVIEW_LIMIT)];
    let hex: Vec<String> = shown.iter().map(|b| format!("{b:02X}")).collect();

    if bytes.len() > PREVIEW_LIMIT {
        format!("{} .. ({} bytes)", hex.join(" "), bytes.len())
    } else {
        hex.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::TableBuilder;

    #[test]
    fn test_dump_plain_table() {
        let mut b = TableBuilder::new("Header");
        b.constant_u32("Version", 2);
        b.per_row_string("Name", &["bgm"]);
        let bytes = b.build();

        let table = UtfTable::parse(&bytes, 0).unwrap();
        let mut cache = None;
        let text = dump_table(&table, &bytes, &mut cache).unwrap();

        assert!(text.contains("Header[0x0000]"));
        assert!(text.contains("Version"));
        assert!(text.contains("bgm"));
    }

    #[test]
    fn test_dump_recurses_into_nested_table() {
        let mut inner = TableBuilder::new("InnerTable");
        inner.per_row_u16("CueIndex", &[7]);
        let inner_bytes = inner.build();

        let mut outer = TableBuilder::new("OuterTable");
        outer.constant_data("Nested", &inner_bytes);
        let bytes = outer.build();

        let table = UtfTable::parse(&bytes, 0).unwrap();
        let mut cache = None;
        let text = dump_table(&table, &bytes, &mut cache).unwrap();

        assert!(text.contains("OuterTable[0x0000]"));
        assert!(text.contains("InnerTable[0x0000]"));
        assert!(text.contains("CueIndex"));
    }
}

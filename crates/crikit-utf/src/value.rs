//! Runtime-typed field values for @UTF tables.
//!
//! A UTF column stores one of nine primitive kinds, discovered at parse
//! time from the column descriptor. `UtfValue` represents them as a tagged
//! union; all call sites match exhaustively instead of downcasting.

/// A decoded @UTF field value.
#[derive(Debug, Clone, PartialEq)]
pub enum UtfValue {
    /// Unsigned 8-bit integer.
    U8(u8),
    /// Signed 8-bit integer.
    I8(i8),
    /// Unsigned 16-bit integer.
    U16(u16),
    /// Signed 16-bit integer.
    I16(i16),
    /// Unsigned 32-bit integer.
    U32(u32),
    /// Signed 32-bit integer.
    I32(i32),
    /// Unsigned 64-bit integer.
    U64(u64),
    /// 32-bit float.
    F32(f32),
    /// NUL-terminated string from the string table.
    String(String),
    /// Raw data blob from the data segment.
    Data(Vec<u8>),
    /// No stored value (zero-storage column in a table with zero rows).
    Null,
}

impl UtfValue {
    /// Check if this value is null.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, UtfValue::Null)
    }

    /// Try to get this value as a u8.
    #[inline]
    pub fn as_u8(&self) -> Option<u8> {
        match self {
            UtfValue::U8(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as a u16, widening smaller unsigned types.
    #[inline]
    pub fn as_u16(&self) -> Option<u16> {
        match self {
            UtfValue::U8(v) => Some(u16::from(*v)),
            UtfValue::U16(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as a u32, widening smaller unsigned types.
    #[inline]
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            UtfValue::U8(v) => Some(u32::from(*v)),
            UtfValue::U16(v) => Some(u32::from(*v)),
            UtfValue::U32(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as a u64, widening smaller unsigned types.
    #[inline]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            UtfValue::U8(v) => Some(u64::from(*v)),
            UtfValue::U16(v) => Some(u64::from(*v)),
            UtfValue::U32(v) => Some(u64::from(*v)),
            UtfValue::U64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as an i64, widening signed types.
    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            UtfValue::I8(v) => Some(i64::from(*v)),
            UtfValue::I16(v) => Some(i64::from(*v)),
            UtfValue::I32(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Try to get this value as an f32.
    #[inline]
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            UtfValue::F32(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as a string slice.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            UtfValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a byte slice (data blobs only).
    #[inline]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            UtfValue::Data(b) => Some(b),
            _ => None,
        }
    }
}

impl std::fmt::Display for UtfValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UtfValue::U8(v) => write!(f, "0x{v:02X} ({v})"),
            UtfValue::I8(v) => write!(f, "{v}"),
            UtfValue::U16(v) => write!(f, "0x{v:04X} ({v})"),
            UtfValue::I16(v) => write!(f, "{v}"),
            UtfValue::U32(v) => write!(f, "0x{v:08X} ({v})"),
            UtfValue::I32(v) => write!(f, "{v}"),
            UtfValue::U64(v) => write!(f, "0x{v:08X} ({v})"),
            UtfValue::F32(v) => write!(f, "{v}"),
            UtfValue::String(s) => write!(f, "{s}"),
            UtfValue::Data(b) => write!(f, "<data {} bytes>", b.len()),
            UtfValue::Null => write!(f, "null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widening_accessors() {
        let v = UtfValue::U8(42);
        assert_eq!(v.as_u8(), Some(42));
        assert_eq!(v.as_u16(), Some(42));
        assert_eq!(v.as_u32(), Some(42));
        assert_eq!(v.as_u64(), Some(42));
        assert_eq!(v.as_i64(), None);

        let v = UtfValue::U64(7);
        assert_eq!(v.as_u32(), None);
        assert_eq!(v.as_u64(), Some(7));
    }

    #[test]
    fn test_str_and_bytes() {
        let v = UtfValue::String("CueName".into());
        assert_eq!(v.as_str(), Some("CueName"));
        assert_eq!(v.as_bytes(), None);

        let v = UtfValue::Data(vec![1, 2, 3]);
        assert_eq!(v.as_bytes(), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", UtfValue::U32(16)), "0x00000010 (16)");
        assert_eq!(format!("{}", UtfValue::String("x".into())), "x");
        assert_eq!(format!("{}", UtfValue::Null), "null");
    }
}

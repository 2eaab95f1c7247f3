//! Data type table: short dtype codes to pixel formats.
//!
//! Codes are `<prefix><scalar><bytes>`: `f` float, `u` unsigned integer,
//! `i` signed integer, and the `n` prefix for normalized integers read as
//! floats. `f1` is the usual 8-bit normalized color format.

use crate::error::{GlError, Result};

/// Formats and sizes behind one dtype code.
#[derive(Debug, PartialEq, Eq)]
pub struct DataType {
    pub code: &'static str,
    /// Client pixel format per component count, indexed `1..=4`.
    pub base_format: [u32; 5],
    /// Storage format per component count, indexed `1..=4`.
    pub internal_format: [u32; 5],
    pub gl_type: u32,
    /// Bytes per component.
    pub size: usize,
    /// Sampled as floats (normalized or real floats).
    pub float_type: bool,
}

const FLOAT_BASE: [u32; 5] = [0, glow::RED, glow::RG, glow::RGB, glow::RGBA];
const INT_BASE: [u32; 5] = [0, glow::RED_INTEGER, glow::RG_INTEGER, glow::RGB_INTEGER, glow::RGBA_INTEGER];

const fn entry(
    code: &'static str,
    base_format: [u32; 5],
    internal_format: [u32; 5],
    gl_type: u32,
    size: usize,
    float_type: bool,
) -> DataType {
    DataType { code, base_format, internal_format, gl_type, size, float_type }
}

static TABLE: [DataType; 13] = [
    entry("f1", FLOAT_BASE, [0, glow::R8, glow::RG8, glow::RGB8, glow::RGBA8], glow::UNSIGNED_BYTE, 1, true),
    entry("f2", FLOAT_BASE, [0, glow::R16F, glow::RG16F, glow::RGB16F, glow::RGBA16F], glow::HALF_FLOAT, 2, true),
    entry("f4", FLOAT_BASE, [0, glow::R32F, glow::RG32F, glow::RGB32F, glow::RGBA32F], glow::FLOAT, 4, true),
    entry("u1", INT_BASE, [0, glow::R8UI, glow::RG8UI, glow::RGB8UI, glow::RGBA8UI], glow::UNSIGNED_BYTE, 1, false),
    entry("u2", INT_BASE, [0, glow::R16UI, glow::RG16UI, glow::RGB16UI, glow::RGBA16UI], glow::UNSIGNED_SHORT, 2, false),
    entry("u4", INT_BASE, [0, glow::R32UI, glow::RG32UI, glow::RGB32UI, glow::RGBA32UI], glow::UNSIGNED_INT, 4, false),
    entry("i1", INT_BASE, [0, glow::R8I, glow::RG8I, glow::RGB8I, glow::RGBA8I], glow::BYTE, 1, false),
    entry("i2", INT_BASE, [0, glow::R16I, glow::RG16I, glow::RGB16I, glow::RGBA16I], glow::SHORT, 2, false),
    entry("i4", INT_BASE, [0, glow::R32I, glow::RG32I, glow::RGB32I, glow::RGBA32I], glow::INT, 4, false),
    entry("nu1", FLOAT_BASE, [0, glow::R8, glow::RG8, glow::RGB8, glow::RGBA8], glow::UNSIGNED_BYTE, 1, true),
    entry("nu2", FLOAT_BASE, [0, glow::R16, glow::RG16, glow::RGB16, glow::RGBA16], glow::UNSIGNED_SHORT, 2, true),
    entry("ni1", FLOAT_BASE, [0, glow::R8_SNORM, glow::RG8_SNORM, glow::RGB8_SNORM, glow::RGBA8_SNORM], glow::BYTE, 1, true),
    entry("ni2", FLOAT_BASE, [0, glow::R16_SNORM, glow::RG16_SNORM, glow::RGB16_SNORM, glow::RGBA16_SNORM], glow::SHORT, 2, true),
];

/// Looks up a dtype code. Unknown codes yield `None`.
pub fn from_dtype(code: &str) -> Option<&'static DataType> {
    TABLE.iter().find(|dt| dt.code == code)
}

pub(crate) fn lookup(code: &str) -> Result<&'static DataType> {
    from_dtype(code).ok_or_else(|| GlError::UnknownDtype(code.to_string()))
}

/// Bytes of one row of `width` pixels padded to `alignment`.
pub(crate) fn row_size(width: u32, components: u32, dtype: &DataType, alignment: usize) -> usize {
    let raw = width as usize * components as usize * dtype.size;
    raw.div_ceil(alignment) * alignment
}

pub(crate) fn check_alignment(alignment: usize) {
    assert!(
        matches!(alignment, 1 | 2 | 4 | 8),
        "the alignment must be 1, 2, 4 or 8 (got {alignment})"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_code_is_in_the_table() {
        let expected = [
            ("f1", 1, true),
            ("f2", 2, true),
            ("f4", 4, true),
            ("u1", 1, false),
            ("u2", 2, false),
            ("u4", 4, false),
            ("i1", 1, false),
            ("i2", 2, false),
            ("i4", 4, false),
            ("nu1", 1, true),
            ("nu2", 2, true),
            ("ni1", 1, true),
            ("ni2", 2, true),
        ];
        for (code, size, float_type) in expected {
            let dt = from_dtype(code).unwrap_or_else(|| panic!("{code} is missing"));
            assert_eq!((dt.code, dt.size, dt.float_type), (code, size, float_type), "{code}");
            if code.starts_with('n') {
                assert_eq!(dt.base_format[4], glow::RGBA, "{code} samples normalized");
            }
        }
        assert_eq!(TABLE.len(), expected.len());
    }

    #[test]
    fn near_miss_codes_are_unknown() {
        for code in ["f8", "u8", "i8", "nf1", "nu4", "ni4", "f", "F1", "zz", ""] {
            assert!(from_dtype(code).is_none(), "{code}");
        }
    }

    #[test]
    fn normalized_codes_sample_as_float() {
        let dt = from_dtype("ni2").unwrap();
        assert!(dt.float_type);
        assert_eq!((dt.gl_type, dt.size), (glow::SHORT, 2));
        assert_eq!(dt.internal_format[4], glow::RGBA16_SNORM);
    }

    #[test]
    fn integer_codes_use_integer_base_formats() {
        let dt = from_dtype("u2").unwrap();
        assert!(!dt.float_type);
        assert_eq!(dt.base_format[3], glow::RGB_INTEGER);
    }

    #[test]
    fn lookup_reports_the_code() {
        assert_eq!(lookup("zz").unwrap_err(), GlError::UnknownDtype("zz".into()));
    }

    #[test]
    fn rows_are_padded_to_the_alignment() {
        let f1 = from_dtype("f1").unwrap();
        assert_eq!(row_size(3, 3, f1, 1), 9);
        assert_eq!(row_size(3, 3, f1, 4), 12);
        assert_eq!(row_size(2, 4, from_dtype("f4").unwrap(), 8), 32);
    }

    #[test]
    #[should_panic(expected = "alignment must be 1, 2, 4 or 8")]
    fn odd_alignment_is_fatal() {
        check_alignment(3);
    }
}

//! Parser for **vertex layout strings**, the per-buffer attribute descriptions
//! used by `ferrogl` vertex arrays.
//!
//! This crate has no dependencies so that editors and build tooling can
//! validate layouts without a GL stack.
//!
//! # Grammar
//!
//! Whitespace-separated tokens of the form `<count>?<kind><width>?`:
//!
//! | kind | meaning | widths |
//! |------|---------|--------|
//! | `f` | float (`f1` is a normalized unsigned byte, `f2` half, `f8` double) | 1, 2, 4, 8 |
//! | `i` | signed integer | 1, 2, 4 |
//! | `u` | unsigned integer | 1, 2, 4 |
//! | `x` | padding bytes, no attribute | 1, 2, 4, 8 |
//!
//! The count defaults to 1 and the width to 4 (1 for `x`). The string may end
//! with one divisor suffix that applies to every attribute: `/v` (per vertex,
//! the default), `/i` (per instance) or `/r` (once per render call).
//!
//! # Quick start
//!
//! ```rust
//! use ferrogl_layout::{info, Divisor};
//!
//! let info = info("2f 3f/i").unwrap();
//! assert_eq!(info.size, 20);
//! assert_eq!(info.nodes, 2);
//! assert_eq!(info.divisor, Divisor::PerInstance);
//! ```

pub mod error;
pub mod info;
pub mod iter;
pub mod node;

pub use error::FormatError;
pub use info::{info, parse, FormatInfo, VertexFormat};
pub use iter::FormatIter;
pub use node::{Divisor, FormatNode, FormatToken, Kind, ScalarType};

#[cfg(test)]
mod layout_tests {
    use super::*;

    fn ok(src: &str) -> FormatInfo { info(src).unwrap() }
    fn err(src: &str) -> FormatError { info(src).unwrap_err() }

    // ── sizes and node counts ─────────────────────────────────────────────

    #[test] fn two_float_attributes() {
        let i = ok("2f 3f");
        assert_eq!((i.size, i.nodes), (20, 2));
    }
    #[test] fn padding_is_not_a_node() {
        let i = ok("1x4 2f");
        assert_eq!((i.size, i.nodes), (12, 1));
    }
    #[test] fn default_padding_width_is_one_byte() {
        assert_eq!(ok("3x 1f").size, 7);
    }
    #[test] fn mixed_widths() {
        let i = ok("4f1 2i2 1u4 3f2 1f8");
        assert_eq!(i.size, 4 + 4 + 4 + 6 + 8);
        assert_eq!(i.nodes, 5);
    }
    #[test] fn count_defaults_to_one() {
        assert_eq!(ok("f i u").size, 12);
    }
    #[test] fn multi_digit_count() {
        assert_eq!(ok("16f").size, 64);
    }
    #[test] fn extra_whitespace_is_ignored() {
        assert_eq!(ok("  2f \t 3f  ").nodes, 2);
    }
    #[test] fn empty_string_is_a_valid_empty_layout() {
        let i = ok("");
        assert_eq!((i.size, i.nodes, i.divisor), (0, 0, Divisor::PerVertex));
    }

    // ── divisor suffix ────────────────────────────────────────────────────

    #[test] fn instance_divisor() { assert_eq!(ok("3f4/i").divisor.value(), 1); }
    #[test] fn render_divisor() { assert_eq!(ok("3f4/r").divisor.value(), 0x7fff_ffff); }
    #[test] fn vertex_divisor_explicit() { assert_eq!(ok("3f4/v").divisor.value(), 0); }
    #[test] fn no_suffix_is_per_vertex() { assert_eq!(ok("3f4").divisor.value(), 0); }
    #[test] fn suffix_after_space() { assert_eq!(ok("2f 3f /i").divisor, Divisor::PerInstance); }
    #[test] fn suffix_with_trailing_whitespace() { assert_eq!(ok("2f/r  ").divisor, Divisor::PerRender); }

    // ── node details ──────────────────────────────────────────────────────

    #[test] fn only_f1_is_normalized() {
        let format = parse("4f1 4u1 2f").unwrap();
        let normalized: Vec<bool> = format.nodes().map(|n| n.normalize).collect();
        assert_eq!(normalized, vec![true, false, false]);
    }
    #[test] fn scalar_types_follow_width() {
        let format = parse("f1 f2 f4 f8 i1 i2 i4 u1 u2 u4").unwrap();
        let scalars: Vec<ScalarType> = format.nodes().map(|n| n.scalar).collect();
        assert_eq!(scalars, vec![
            ScalarType::UnsignedByte, ScalarType::HalfFloat, ScalarType::Float, ScalarType::Double,
            ScalarType::Byte, ScalarType::Short, ScalarType::Int,
            ScalarType::UnsignedByte, ScalarType::UnsignedShort, ScalarType::UnsignedInt,
        ]);
    }
    #[test] fn tokens_keep_padding_in_order() {
        let format = parse("2f 4x 1i").unwrap();
        assert_eq!(format.tokens()[1], FormatToken::Padding(4));
        assert_eq!(format.tokens().len(), 3);
    }

    // ── invalid strings ───────────────────────────────────────────────────

    #[test] fn err_unknown_kind() { err("3q"); }
    #[test] fn err_unsupported_float_width() { err("2f3"); }
    #[test] fn err_unsupported_int_width() { err("2i8"); }
    #[test] fn err_suffix_then_trailing_characters() { err("3f/ix"); }
    #[test] fn err_token_after_suffix() { err("2f/i 3f"); }
    #[test] fn err_unknown_suffix() { err("2f/q"); }
    #[test] fn err_bare_slash() { err("2f/"); }
    #[test] fn err_count_without_kind() { err("2f 3"); }
    #[test] fn err_zero_count() { err("0f"); }
    #[test] fn err_glued_tokens() { err("2f3f"); }
    #[test] fn error_reports_offset() {
        assert_eq!(err("2f 3q").offset, 4);
    }

    #[test] fn iterator_is_fused_after_error() {
        let mut iter = FormatIter::new("2f 3q 4f");
        assert!(matches!(iter.next(), Some(Ok(_))));
        assert!(matches!(iter.next(), Some(Err(_))));
        assert!(iter.next().is_none());
    }
    #[test] fn iterator_end_is_distinct_from_error() {
        let mut iter = FormatIter::new("2f");
        assert!(matches!(iter.next(), Some(Ok(_))));
        assert!(iter.next().is_none());
    }
}

use crate::error::FormatError;
use crate::iter::FormatIter;
use crate::node::{Divisor, FormatNode, FormatToken};

/// Aggregate facts about a whole layout string.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct FormatInfo {
    /// Bytes in one vertex record (attributes and padding).
    pub size: u32,
    /// Number of bindable (non-padding) nodes.
    pub nodes: u32,
    pub divisor: Divisor,
}

/// A fully parsed layout string.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct VertexFormat {
    tokens: Vec<FormatToken>,
    divisor: Divisor,
}

impl VertexFormat {
    pub fn tokens(&self) -> &[FormatToken] {
        &self.tokens
    }

    /// Bindable nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &FormatNode> {
        self.tokens.iter().filter_map(FormatToken::node)
    }

    pub fn divisor(&self) -> Divisor {
        self.divisor
    }

    pub fn info(&self) -> FormatInfo {
        FormatInfo {
            size: self.tokens.iter().map(FormatToken::size).sum(),
            nodes: self.nodes().count() as u32,
            divisor: self.divisor,
        }
    }
}

/// Parses a layout string such as `"2f 3f"` or `"4f1 2x4/i"`.
///
/// Any malformed token anywhere rejects the whole string.
pub fn parse(src: &str) -> Result<VertexFormat, FormatError> {
    let mut iter = FormatIter::new(src);
    let mut tokens = Vec::new();
    for token in iter.by_ref() {
        tokens.push(token?);
    }
    tokens
        .iter()
        .try_fold(0u32, |acc, token| acc.checked_add(token.size()))
        .ok_or_else(|| FormatError::new("vertex record size overflows", src.len()))?;
    Ok(VertexFormat { tokens, divisor: iter.divisor() })
}

/// Parses `src` and returns only its aggregate [`FormatInfo`].
pub fn info(src: &str) -> Result<FormatInfo, FormatError> {
    parse(src).map(|format| format.info())
}

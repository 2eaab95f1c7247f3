use std::fmt;

/// A malformed vertex layout string.
///
/// Returned in place of a descriptor; a layout that fails anywhere never
/// yields partial information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatError {
    pub message: String,
    /// 0-based byte offset in the layout string where parsing stopped.
    pub offset: usize,
}

impl FormatError {
    pub(crate) fn new(msg: impl Into<String>, offset: usize) -> Self {
        Self { message: msg.into(), offset }
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid vertex format at byte {}: {}", self.offset, self.message)
    }
}

impl std::error::Error for FormatError {}

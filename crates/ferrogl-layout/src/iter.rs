use crate::error::FormatError;
use crate::node::{Divisor, FormatNode, FormatToken, Kind};

/// Streaming tokenizer over a layout string.
///
/// Yields one `Ok(FormatToken)` per token, `None` at the end of the string
/// (or after a divisor suffix), and `Some(Err(_))` exactly once on the first
/// malformed token. The iterator is fused after an error.
pub struct FormatIter<'s> {
    src: &'s [u8],
    pos: usize,
    divisor: Divisor,
    done: bool,
}

impl<'s> FormatIter<'s> {
    pub fn new(src: &'s str) -> Self {
        Self { src: src.as_bytes(), pos: 0, divisor: Divisor::PerVertex, done: false }
    }

    /// Divisor named by the trailing suffix.
    ///
    /// Only meaningful once the iterator has returned `None`.
    pub fn divisor(&self) -> Divisor {
        self.divisor
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn fail(&mut self, msg: impl Into<String>) -> Option<Result<FormatToken, FormatError>> {
        self.done = true;
        Some(Err(FormatError::new(msg, self.pos)))
    }

    fn parse_suffix(&mut self) -> Option<Result<FormatToken, FormatError>> {
        self.pos += 1; // consume `/`
        self.divisor = match self.peek() {
            Some(b'v') => Divisor::PerVertex,
            Some(b'i') => Divisor::PerInstance,
            Some(b'r') => Divisor::PerRender,
            Some(c) => return self.fail(format!("unknown divisor suffix {:?}", c as char)),
            None => return self.fail("missing divisor after '/'"),
        };
        self.pos += 1;
        self.skip_whitespace();
        if self.peek().is_some() {
            return self.fail("trailing characters after divisor suffix");
        }
        self.done = true;
        None
    }

    fn parse_count(&mut self) -> Result<Option<u32>, FormatError> {
        let start = self.pos;
        let mut count: u32 = 0;
        while let Some(c) = self.peek().filter(u8::is_ascii_digit) {
            count = count
                .checked_mul(10)
                .and_then(|n| n.checked_add(u32::from(c - b'0')))
                .ok_or_else(|| FormatError::new("component count overflows", start))?;
            self.pos += 1;
        }
        if self.pos == start {
            return Ok(None);
        }
        if count == 0 {
            return Err(FormatError::new("component count must be at least 1", start));
        }
        Ok(Some(count))
    }
}

impl Iterator for FormatIter<'_> {
    type Item = Result<FormatToken, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        self.skip_whitespace();
        match self.peek() {
            None => {
                self.done = true;
                return None;
            }
            Some(b'/') => return self.parse_suffix(),
            Some(_) => {}
        }

        let count = match self.parse_count() {
            Ok(count) => count.unwrap_or(1),
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };

        let kind = match self.peek() {
            Some(b'f') => Some(Kind::Float),
            Some(b'i') => Some(Kind::Int),
            Some(b'u') => Some(Kind::UInt),
            Some(b'x') => None,
            Some(c) => return self.fail(format!("unknown attribute kind {:?}", c as char)),
            None => return self.fail("component count without a kind"),
        };
        self.pos += 1;

        let width = match self.peek().filter(u8::is_ascii_digit) {
            Some(c) => {
                let width = u32::from(c - b'0');
                let allowed: &[u32] = match kind {
                    Some(Kind::Float) | None => &[1, 2, 4, 8],
                    Some(Kind::Int) | Some(Kind::UInt) => &[1, 2, 4],
                };
                if !allowed.contains(&width) {
                    return self.fail(format!("unsupported width {}", width));
                }
                self.pos += 1;
                width
            }
            None if kind.is_none() => 1,
            None => 4,
        };

        // A token ends at whitespace, a divisor suffix or the end of the string.
        match self.peek() {
            None | Some(b'/') => {}
            Some(c) if c.is_ascii_whitespace() => {}
            Some(_) => return self.fail("unexpected character after token"),
        }

        if count.checked_mul(width).is_none() {
            return self.fail("token size overflows");
        }

        Some(Ok(match kind {
            Some(kind) => FormatToken::Attribute(FormatNode::new(kind, count, width)),
            None => FormatToken::Padding(count * width),
        }))
    }
}

impl std::iter::FusedIterator for FormatIter<'_> {}

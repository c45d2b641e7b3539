use std::fmt::Display;

/// Represents a position in source text.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SourcePosition {
    /// The 0-based index of the character in the input stream.
    pub index: usize,
    /// The 1-based line number.
    pub line: usize,
    /// The 1-based column number.
    pub column: usize,
}

impl Default for SourcePosition {
    fn default() -> Self {
        Self {
            index: 0,
            line: 1,
            column: 1,
        }
    }
}

impl Display for SourcePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{},{}", self.line, self.column))
    }
}

/// Represents a span within source text.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SourceSpan {
    /// The start position.
    pub start: SourcePosition,
    /// The end position of the span (exclusive).
    pub end: SourcePosition,
}

impl SourceSpan {
    /// Returns the length of the span in characters.
    pub fn length(&self) -> usize {
        self.end.index - self.start.index
    }

    pub(crate) fn within(start: &Self, end: &Self) -> Self {
        Self {
            start: start.start,
            end: end.end,
        }
    }
}

impl Display for SourceSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}..{}", self.start, self.end))
    }
}

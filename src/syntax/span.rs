//! Position and range tracking for Rust source files
//!
//! Lexer tokens carry byte offsets. Matching a call site needs line:column
//! positions as the compiler reports them, so every syntax node stores both.
//!
//! ## Types
//!
//! - [`Position`] - A 0-based line:column position
//! - [`Range`] - A byte span together with its start and end positions
//! - [`SourceLocation`] - Converts byte offsets to positions
//!
//! Columns count characters, not bytes. `std::panic::Location::column` does
//! the same, so a non-ASCII string earlier on a line does not shift the match.

use std::fmt;
use std::ops::Range as ByteRange;

/// A position in source code (0-based line and column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// 1-based line, as reported by caller locations and backtraces
    pub fn display_line(&self) -> usize {
        self.line + 1
    }

    /// 1-based column, as reported by caller locations and backtraces
    pub fn display_column(&self) -> usize {
        self.column + 1
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.display_line(), self.display_column())
    }
}

/// A location in source code: byte span plus start and end positions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Range {
    pub span: ByteRange<usize>,
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(span: ByteRange<usize>, start: Position, end: Position) -> Self {
        Self { span, start, end }
    }

    /// Build a range covering all provided ranges.
    pub fn bounding_box<'a, I>(mut ranges: I) -> Option<Range>
    where
        I: Iterator<Item = &'a Range>,
    {
        let first = ranges.next()?.clone();
        let mut bounds = first;

        for range in ranges {
            if range.span.start < bounds.span.start {
                bounds.span.start = range.span.start;
                bounds.start = range.start;
            }
            if range.span.end > bounds.span.end {
                bounds.span.end = range.span.end;
                bounds.end = range.end;
            }
        }

        Some(bounds)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Provides fast conversion from byte offsets to line/column positions
pub struct SourceLocation<'s> {
    source: &'s str,
    /// Byte offsets where each line starts
    line_starts: Vec<usize>,
}

impl<'s> SourceLocation<'s> {
    pub fn new(source: &'s str) -> Self {
        let mut line_starts = vec![0];

        for (byte_pos, ch) in source.char_indices() {
            if ch == '\n' {
                line_starts.push(byte_pos + 1);
            }
        }

        Self {
            source,
            line_starts,
        }
    }

    /// Convert a byte offset to a line/column position
    pub fn byte_to_position(&self, byte_offset: usize) -> Position {
        let line = self
            .line_starts
            .binary_search(&byte_offset)
            .unwrap_or_else(|i| i - 1);

        let line_start = self.line_starts[line];
        let column = self
            .source
            .get(line_start..byte_offset)
            .map_or(byte_offset - line_start, |prefix| prefix.chars().count());

        Position::new(line, column)
    }

    /// Convert a byte range to a located range
    pub fn byte_range_to_range(&self, range: &ByteRange<usize>) -> Range {
        Range::new(
            range.clone(),
            self.byte_to_position(range.start),
            self.byte_to_position(range.end),
        )
    }
}

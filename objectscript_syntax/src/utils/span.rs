//! Source location tracking
//!
//! Byte offsets are authoritative; line and column are derived through
//! [`SourceMap`] so tokens and error ranges can be reported to editors.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// Byte offset with its 1-based line and character column
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Position {
    pub offset: usize,
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(offset: usize, line: u32, column: u32) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Half-open source range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        debug_assert!(start.offset <= end.offset, "inverted span");
        Self { start, end }
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn end(&self) -> Position {
        self.end
    }

    /// Span without line information
    pub fn from_offsets(start: usize, end: usize) -> Self {
        Self {
            start: Position::new(start, 0, 0),
            end: Position::new(end, 0, 0),
        }
    }

    pub fn len(&self) -> usize {
        self.end.offset - self.start.offset
    }

    pub fn is_empty(&self) -> bool {
        self.start.offset == self.end.offset
    }

    pub fn byte_range(&self) -> Range<usize> {
        self.start.offset..self.end.offset
    }

    /// Text of the span, or `""` if it does not fit `input`
    pub fn slice<'a>(&self, input: &'a str) -> &'a str {
        input.get(self.byte_range()).unwrap_or("")
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start.line == 0 {
            write!(f, "bytes {}..{}", self.start.offset, self.end.offset)
        } else if self.start.line == self.end.line {
            write!(f, "{}-{}", self.start, self.end.column)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Shared source text with its line index
#[derive(Debug, Clone)]
pub struct SourceMap {
    source: Arc<str>,
    line_starts: Vec<usize>,
}

impl SourceMap {
    pub fn new(source: impl Into<Arc<str>>) -> Self {
        let source: Arc<str> = source.into();
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            source,
            line_starts,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn shared_source(&self) -> Arc<str> {
        self.source.clone()
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// 0-based index of the line containing `offset`
    fn line_index(&self, offset: usize) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next.saturating_sub(1),
        }
    }

    /// Byte offset of the start of the line containing `offset`
    pub fn line_start(&self, offset: usize) -> usize {
        self.line_starts[self.line_index(offset)]
    }

    pub fn position_at(&self, offset: usize) -> Position {
        let offset = offset.min(self.source.len());
        let line = self.line_index(offset);
        let start = self.line_starts[line];
        let column = self
            .source
            .get(start..offset)
            .map_or(offset - start, |text| text.chars().count());
        Position::new(offset, line as u32 + 1, column as u32 + 1)
    }

    pub fn span(&self, start: usize, end: usize) -> Span {
        Span::new(self.position_at(start), self.position_at(end))
    }

    /// Text of 1-based `line` without its terminator
    pub fn line_text(&self, line: u32) -> Option<&str> {
        let index = (line as usize).checked_sub(1)?;
        let start = *self.line_starts.get(index)?;
        let end = self
            .line_starts
            .get(index + 1)
            .map_or(self.source.len(), |next| next - 1);
        self.source
            .get(start..end)
            .map(|text| text.trim_end_matches('\r'))
    }

    /// `message` followed by the first line of `span`, underlined. Empty
    /// spans get a single caret.
    pub fn render(&self, span: Span, message: &str) -> String {
        let span = self.span(span.start.offset, span.end.offset);
        let mut out = format!("{}\n --> {}\n", message, span.start);
        let Some(text) = self.line_text(span.start.line) else {
            return out;
        };
        let gutter = span.start.line.to_string();
        let width = if span.end.line == span.start.line {
            span.end.column.saturating_sub(span.start.column) as usize
        } else {
            (text.chars().count() + 1).saturating_sub(span.start.column as usize)
        };
        out.push_str(&format!("{} | {}\n", gutter, text));
        out.push_str(&format!(
            "{} | {}{}\n",
            " ".repeat(gutter.len()),
            " ".repeat(span.start.column as usize - 1),
            "^".repeat(width.max(1))
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_lookup() {
        let map = SourceMap::new("start\n write x\n");
        assert_eq!(map.position_at(0), Position::new(0, 1, 1));
        assert_eq!(map.position_at(4), Position::new(4, 1, 5));
        assert_eq!(map.position_at(6), Position::new(6, 2, 1));
        assert_eq!(map.position_at(7), Position::new(7, 2, 2));
        assert_eq!(map.position_at(99).offset, map.len());
        assert_eq!(map.line_start(10), 6);
    }

    #[test]
    fn test_columns_count_characters() {
        let map = SourceMap::new(" s é=1");
        assert_eq!(map.position_at(5).column, 5);
    }

    #[test]
    fn test_span_display() {
        let map = SourceMap::new("a\nbc\n");
        assert_eq!(map.span(2, 4).to_string(), "2:1-3");
        assert_eq!(map.span(0, 3).to_string(), "1:1-2:2");
        assert_eq!(Span::from_offsets(3, 7).to_string(), "bytes 3..7");
        assert_eq!(map.span(2, 4).slice(map.source()), "bc");
    }

    #[test]
    fn test_line_text() {
        let map = SourceMap::new("one\r\ntwo\n");
        assert_eq!(map.line_text(1), Some("one"));
        assert_eq!(map.line_text(2), Some("two"));
        assert_eq!(map.line_text(3), Some(""));
        assert_eq!(map.line_text(0), None);
    }

    #[test]
    fn test_render_underlines_span() {
        let map = SourceMap::new(" set x = \n write 1\n");
        let rendered = map.render(Span::from_offsets(9, 9), "Missing expression");
        assert_eq!(
            rendered,
            "Missing expression\n --> 1:10\n1 |  set x = \n  |          ^\n"
        );
        let rendered = map.render(Span::from_offsets(1, 4), "here");
        assert!(rendered.ends_with("  |  ^^^\n"));
    }
}

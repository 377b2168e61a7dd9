//! Token kinds produced by the scanner
//!
//! The kinds are deliberately coarse. Keywords are not a separate kind: a
//! grammar matches them by case-insensitive text on `Identifier` tokens, and
//! command words by their abbreviation table on `Command` tokens. This keeps
//! the lexer independent of which grammar is consuming it.
use crate::lexical::LexMode;
use crate::utils::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TokenKind {
    // === TRIVIA ===
    Whitespace,
    LineComment,
    BlockComment,
    DocComment,

    // === LINE STRUCTURE (core layer only) ===
    Newline,
    Label,
    Command,
    Directive,

    // === NAMES ===
    Identifier,
    InstanceVariable,
    SystemVariable,
    SystemFunction,
    Macro,
    SqlFieldReference,

    // === LITERALS ===
    Number,
    String,
    Pattern,

    // === SYMBOLS ===
    Operator,
    Punctuation,

    // === EMBEDDED REGIONS ===
    EmbedOpen,
    RawText,

    // === SPECIAL ===
    Error,
}

impl TokenKind {
    /// Trivia never reaches the parser's action table
    pub fn is_trivia(&self) -> bool {
        matches!(
            self,
            TokenKind::Whitespace
                | TokenKind::LineComment
                | TokenKind::BlockComment
                | TokenKind::DocComment
        )
    }

    /// Symbol kinds whose text selects the terminal (`+`, `(`, `&sql(`)
    pub fn is_symbolic(&self) -> bool {
        matches!(
            self,
            TokenKind::Operator | TokenKind::Punctuation | TokenKind::EmbedOpen
        )
    }

    /// Node name used for leaves of this kind in the syntax tree
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Whitespace => "whitespace",
            TokenKind::LineComment => "line_comment",
            TokenKind::BlockComment => "block_comment",
            TokenKind::DocComment => "documatic_line",
            TokenKind::Newline => "newline",
            TokenKind::Label => "label",
            TokenKind::Command => "command",
            TokenKind::Directive => "directive",
            TokenKind::Identifier => "identifier",
            TokenKind::InstanceVariable => "instance_variable",
            TokenKind::SystemVariable => "system_variable",
            TokenKind::SystemFunction => "system_function_name",
            TokenKind::Macro => "macro_name",
            TokenKind::SqlFieldReference => "sql_field_reference",
            TokenKind::Number => "number",
            TokenKind::String => "string",
            TokenKind::Pattern => "pattern",
            TokenKind::Operator => "operator",
            TokenKind::Punctuation => "punctuation",
            TokenKind::EmbedOpen => "embed_open",
            TokenKind::RawText => "raw_text",
            TokenKind::Error => "ERROR",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A classified slice of the source
///
/// Tokens are immutable. `mode` is the lexer state the token was scanned in,
/// which lets the scanner restart exactly at `span.start.offset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub mode: LexMode,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, mode: LexMode) -> Self {
        Self { kind, span, mode }
    }

    pub fn start(&self) -> usize {
        self.span.start.offset
    }

    pub fn end(&self) -> usize {
        self.span.end.offset
    }

    pub fn len(&self) -> usize {
        self.span.len()
    }

    pub fn is_empty(&self) -> bool {
        self.span.is_empty()
    }

    pub fn is_trivia(&self) -> bool {
        self.kind.is_trivia()
    }

    /// Raw text slice of this token
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        self.span.slice(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trivia_classification() {
        assert!(TokenKind::Whitespace.is_trivia());
        assert!(TokenKind::DocComment.is_trivia());
        assert!(!TokenKind::Newline.is_trivia());
        assert!(!TokenKind::Error.is_trivia());
    }

    #[test]
    fn test_symbolic_kinds() {
        assert!(TokenKind::Operator.is_symbolic());
        assert!(TokenKind::EmbedOpen.is_symbolic());
        assert!(!TokenKind::Identifier.is_symbolic());
    }

    #[test]
    fn test_leaf_names_are_snake_case() {
        assert_eq!(TokenKind::SystemFunction.name(), "system_function_name");
        assert_eq!(TokenKind::Error.to_string(), "ERROR");
    }
}

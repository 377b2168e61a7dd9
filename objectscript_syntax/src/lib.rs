// Internal modules
pub mod compose;
pub mod config;
pub mod grammar;
pub mod language;
pub mod lexical;
#[macro_use]
pub mod logging;
pub mod syntax;
pub mod tokens;
pub mod utils;

// Re-export key types for library consumers
pub use compose::{GrammarCompileError, MergedTable};
pub use grammar::{Grammar, GrammarId};
pub use language::Language;
pub use lexical::LexMode;
pub use syntax::{
    Edit, EditError, Node, NodeRef, ParseResult, Parser, RecoveryTable, ReparseStats, SyntaxError,
};
pub use utils::{Position, Span};

use logging::Code;

/// Failures that stop a request before any tree is built.
///
/// Malformed source is never one of these: it is reported through
/// [`ParseResult::errors`].
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Grammar composition failed: {0}")]
    Grammar(#[from] GrammarCompileError),

    #[error("Invalid edit: {0}")]
    InvalidEdit(#[from] EditError),
}

impl ParseError {
    pub fn error_code(&self) -> Code {
        match self {
            Self::Grammar(error) => error.error_code(),
            Self::InvalidEdit(error) => error.error_code(),
        }
    }
}

/// Parse `source` as a whole document of `language`
pub fn parse(language: &Language, source: &str) -> ParseResult {
    Parser::new(language).parse(source)
}

/// Reparse `source` after `edit` was applied to `previous`'s source,
/// reusing what the edit left untouched
pub fn reparse(
    language: &Language,
    previous: &ParseResult,
    edit: &Edit,
    source: &str,
) -> ParseResult {
    Parser::new(language).reparse(previous, edit, source)
}

//! Shared primitive types used by the lexer and the parser.

pub mod span;

pub use span::{Position, SourceMap, Span};

//! Tokens produced by the lexer
//!
//! A [`Token`] is a kind plus a span plus the lexer mode it was scanned in.
//! Tokens tile the source with no gaps. The [`TokenStream`] adds an index of
//! significant (non-trivia) tokens, which is the position space the GLR
//! engine and the incremental reparser work in.

pub mod token;
pub mod token_stream;

pub use token::{Token, TokenKind};
pub use token_stream::{validate_token_tiling, TokenStream};

//! Token stream with a significant-token index
//!
//! The parser addresses tokens by *significant position*: the index of a
//! non-trivia token. Position `len()` is the end-of-input sentinel. Trivia
//! stays in `all_tokens` so the tree builder can attach it between children.

use crate::{
    tokens::token::{Token, TokenKind},
    utils::{SourceMap, Span},
};
use std::ops::Range;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct TokenStream {
    /// All tokens, trivia included, in source order
    all_tokens: Vec<Token>,
    /// Indices into `all_tokens` of the non-trivia tokens
    significant_indices: Vec<usize>,
    source_map: SourceMap,
}

impl TokenStream {
    pub fn new(tokens: Vec<Token>, source_map: SourceMap) -> Self {
        let significant_indices = tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_trivia())
            .map(|(i, _)| i)
            .collect::<Vec<_>>();

        crate::log_debug!("Token stream built",
            "total_tokens" => tokens.len(),
            "significant_tokens" => significant_indices.len()
        );

        Self {
            all_tokens: tokens,
            significant_indices,
            source_map,
        }
    }

    // === SIGNIFICANT NAVIGATION ===

    /// Number of significant tokens
    pub fn len(&self) -> usize {
        self.significant_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.significant_indices.is_empty()
    }

    /// Significant token at position `p`, `None` at end of input
    pub fn get(&self, p: usize) -> Option<&Token> {
        self.significant_indices
            .get(p)
            .and_then(|&i| self.all_tokens.get(i))
    }

    /// Index into `all_tokens` for significant position `p`.
    /// The sentinel position maps to `all_tokens.len()`.
    pub fn original_index(&self, p: usize) -> usize {
        self.significant_indices
            .get(p)
            .copied()
            .unwrap_or(self.all_tokens.len())
    }

    /// Text of the significant token at `p`
    pub fn text(&self, p: usize) -> &str {
        self.get(p)
            .map(|t| t.text(self.source_map.source()))
            .unwrap_or("")
    }

    /// Start byte of significant position `p` (source length at the sentinel)
    pub fn start_byte(&self, p: usize) -> usize {
        self.get(p)
            .map(|t| t.start())
            .unwrap_or_else(|| self.source_map.len())
    }

    /// End byte of the significant token at `p`
    pub fn end_byte(&self, p: usize) -> usize {
        self.get(p)
            .map(|t| t.end())
            .unwrap_or_else(|| self.source_map.len())
    }

    /// Span covering significant positions `start..end`
    pub fn span_range(&self, start: usize, end: usize) -> Span {
        if start >= end {
            let at = self.start_byte(start);
            return self.source_map.span(at, at);
        }
        self.source_map
            .span(self.start_byte(start), self.end_byte(end - 1))
    }

    /// Significant position of the first token starting at or after `byte`
    pub fn position_at_byte(&self, byte: usize) -> usize {
        self.significant_indices
            .partition_point(|&i| self.all_tokens[i].start() < byte)
    }

    /// Range into `all_tokens` of the trivia preceding significant position `p`
    pub fn leading_trivia(&self, p: usize) -> Range<usize> {
        let end = self.original_index(p);
        let start = if p == 0 {
            0
        } else {
            self.original_index(p - 1) + 1
        };
        start..end
    }

    pub fn iter_significant(&self) -> impl Iterator<Item = &Token> {
        self.significant_indices.iter().map(|&i| &self.all_tokens[i])
    }

    // === RAW ACCESS ===

    pub fn all_tokens(&self) -> &[Token] {
        &self.all_tokens
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.all_tokens
    }

    pub fn source(&self) -> &str {
        self.source_map.source()
    }

    pub fn shared_source(&self) -> Arc<str> {
        self.source_map.shared_source()
    }

    pub fn source_map(&self) -> &SourceMap {
        &self.source_map
    }

    pub fn error_token_count(&self) -> usize {
        self.all_tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Error)
            .count()
    }

    /// Short dump of the significant tokens, for debugging
    pub fn diagnostic(&self) -> String {
        let mut output = format!(
            "TokenStream: {} tokens, {} significant\n",
            self.all_tokens.len(),
            self.significant_indices.len()
        );
        for (p, token) in self.iter_significant().enumerate() {
            output.push_str(&format!(
                "  [{}] {} {:?} @{}\n",
                p,
                token.kind,
                token.text(self.source()),
                token.start()
            ));
        }
        output
    }
}

/// Checks that tokens tile the source exactly: contiguous, in order, no gaps.
pub fn validate_token_tiling(tokens: &[Token], source_len: usize) -> Result<(), String> {
    let mut expected = 0;
    for (i, token) in tokens.iter().enumerate() {
        if token.start() != expected {
            return Err(format!(
                "token {} starts at {} but previous ended at {}",
                i,
                token.start(),
                expected
            ));
        }
        if token.is_empty() {
            return Err(format!("token {} at {} is empty", i, token.start()));
        }
        expected = token.end();
    }
    if expected != source_len {
        return Err(format!(
            "tokens end at {} but source has {} bytes",
            expected, source_len
        ));
    }
    Ok(())
}

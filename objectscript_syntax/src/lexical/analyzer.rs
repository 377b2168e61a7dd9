//! Whole-buffer tokenization with metrics and diagnostics
//!
//! The analyzer drives [`scan_token`] from the start of a buffer. It never
//! fails: malformed input is carried by `Error` tokens, and a [`LexerError`]
//! can be recovered from any error token after the fact.

use crate::config::compile_time::lexical::*;
use crate::config::runtime::LexicalPreferences;
use crate::lexical::mode::{Layer, LexMode};
use crate::lexical::scanner::scan_token;
use crate::logging::codes;
use crate::tokens::{Token, TokenKind, TokenStream};
use crate::utils::{SourceMap, Span};
use crate::{log_debug, log_error, log_success};
use std::collections::BTreeMap;

/// Lexical diagnostics, one per error token
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexerError {
    #[error("Invalid character '{character}'")]
    InvalidCharacter { character: char, span: Span },

    #[error("Malformed token '{text}'")]
    MalformedToken { text: String, span: Span },

    #[error("Unterminated string literal")]
    UnterminatedString { span: Span },

    #[error("Unterminated block comment")]
    UnterminatedComment { span: Span },

    #[error("Unterminated embedded region")]
    UnterminatedEmbeddedRegion { span: Span },

    #[error("Identifier too long: {length} characters (max {MAX_IDENTIFIER_LENGTH})")]
    IdentifierTooLong { length: usize, span: Span },

    #[error("String too large: {size} bytes (max {MAX_STRING_SIZE})")]
    StringTooLarge { size: usize, span: Span },

    #[error("Too many tokens (max {MAX_TOKEN_COUNT}); remaining input not tokenized")]
    TooManyTokens { span: Span },
}

impl LexerError {
    pub fn error_code(&self) -> crate::logging::Code {
        match self {
            LexerError::InvalidCharacter { .. } | LexerError::MalformedToken { .. } => {
                codes::lexical::INVALID_CHARACTER
            }
            LexerError::UnterminatedString { .. } => codes::lexical::UNTERMINATED_STRING,
            LexerError::UnterminatedComment { .. } => codes::lexical::UNTERMINATED_COMMENT,
            LexerError::UnterminatedEmbeddedRegion { .. } => {
                codes::lexical::UNTERMINATED_EMBEDDED_REGION
            }
            LexerError::IdentifierTooLong { .. } => codes::lexical::IDENTIFIER_TOO_LONG,
            LexerError::StringTooLarge { .. } => codes::lexical::STRING_TOO_LARGE,
            LexerError::TooManyTokens { .. } => codes::lexical::TOO_MANY_TOKENS,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            LexerError::InvalidCharacter { span, .. }
            | LexerError::MalformedToken { span, .. }
            | LexerError::UnterminatedString { span }
            | LexerError::UnterminatedComment { span }
            | LexerError::UnterminatedEmbeddedRegion { span }
            | LexerError::IdentifierTooLong { span, .. }
            | LexerError::StringTooLarge { span, .. }
            | LexerError::TooManyTokens { span } => *span,
        }
    }

    /// Reconstruct the diagnostic for an `Error` token.
    ///
    /// `is_overflow` marks the final token produced when the token limit was
    /// reached; its text alone does not identify it.
    pub fn from_error_token(token: &Token, source: &str, is_overflow: bool) -> Self {
        let span = token.span;
        let text = token.text(source);
        if is_overflow {
            return LexerError::TooManyTokens { span };
        }
        if token.mode.layer == Layer::Raw {
            return LexerError::UnterminatedEmbeddedRegion { span };
        }
        if text.starts_with('"') {
            let terminated = text.len() > 1 && text.ends_with('"') && text.len() > MAX_STRING_SIZE;
            return if terminated {
                LexerError::StringTooLarge {
                    size: text.len(),
                    span,
                }
            } else {
                LexerError::UnterminatedString { span }
            };
        }
        if text.starts_with("/*") {
            return LexerError::UnterminatedComment { span };
        }
        let length = text.chars().count();
        if length > MAX_IDENTIFIER_LENGTH {
            return LexerError::IdentifierTooLong { length, span };
        }
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(character), None) => LexerError::InvalidCharacter { character, span },
            _ => LexerError::MalformedToken {
                text: text.to_string(),
                span,
            },
        }
    }
}

/// Diagnostics for every error token in a token list
pub fn collect_lexer_errors(tokens: &[Token], source: &str) -> Vec<LexerError> {
    let overflow = tokens.len() >= MAX_TOKEN_COUNT;
    tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| t.kind == TokenKind::Error)
        .map(|(i, t)| {
            let is_overflow = overflow && i + 1 == tokens.len();
            LexerError::from_error_token(t, source, is_overflow)
        })
        .collect()
}

/// Counters gathered while tokenizing
#[derive(Debug, Default, Clone)]
pub struct LexicalMetrics {
    pub total_tokens: usize,
    pub trivia_tokens: usize,
    pub command_tokens: usize,
    pub identifier_tokens: usize,
    pub operator_tokens: usize,
    pub error_tokens: usize,
    pub embedded_regions: usize,
    pub max_string_length: usize,

    // Detailed metrics, collected when enabled
    pub kind_counts: BTreeMap<TokenKind, usize>,
    /// Start offsets of the first error tokens
    pub error_offsets: Vec<usize>,
}

impl LexicalMetrics {
    pub(crate) fn record_token(&mut self, token: &Token, preferences: &LexicalPreferences) {
        self.total_tokens += 1;

        match token.kind {
            k if k.is_trivia() => self.trivia_tokens += 1,
            TokenKind::Command => self.command_tokens += 1,
            TokenKind::Identifier | TokenKind::InstanceVariable => self.identifier_tokens += 1,
            TokenKind::Operator => self.operator_tokens += 1,
            TokenKind::EmbedOpen => self.embedded_regions += 1,
            TokenKind::String => self.max_string_length = self.max_string_length.max(token.len()),
            TokenKind::Error => self.error_tokens += 1,
            _ => {}
        }

        if preferences.collect_detailed_metrics {
            *self.kind_counts.entry(token.kind).or_insert(0) += 1;
            if token.kind == TokenKind::Error && self.error_offsets.len() < METRICS_BUFFER_SIZE {
                self.error_offsets.push(token.start());
            }
        }
    }
}

/// Drives the scanner over a whole buffer
pub struct LexicalAnalyzer {
    metrics: LexicalMetrics,
    preferences: LexicalPreferences,
}

impl LexicalAnalyzer {
    pub fn new() -> Self {
        Self {
            metrics: LexicalMetrics::default(),
            preferences: LexicalPreferences::default(),
        }
    }

    pub fn with_preferences(preferences: LexicalPreferences) -> Self {
        Self {
            metrics: LexicalMetrics::default(),
            preferences,
        }
    }

    /// Tokenize `source_map` starting in `mode`
    pub fn tokenize(&mut self, source_map: SourceMap, mode: LexMode) -> TokenStream {
        self.metrics = LexicalMetrics::default();
        let source_len = source_map.len();

        log_debug!("Starting lexical analysis",
            "bytes" => source_len,
            "layer" => format!("{:?}", mode.layer),
            "max_tokens_allowed" => MAX_TOKEN_COUNT
        );

        let mut tokens = Vec::new();
        let mut offset = 0;
        let mut mode = mode;

        while offset < source_len {
            if tokens.len() + 1 >= MAX_TOKEN_COUNT {
                let token = Token::new(TokenKind::Error, source_map.span(offset, source_len), mode);
                log_error!(codes::lexical::TOO_MANY_TOKENS, "Token limit reached",
                    span = token.span,
                    "limit" => MAX_TOKEN_COUNT
                );
                self.metrics.record_token(&token, &self.preferences);
                tokens.push(token);
                break;
            }

            let Some((token, next)) = scan_token(&source_map, offset, mode) else {
                break;
            };
            self.record(&token, source_map.source());
            offset = token.end();
            mode = next;
            tokens.push(token);
        }

        log_success!(codes::success::TOKENIZATION_COMPLETE, "Lexical analysis completed",
            "tokens" => self.metrics.total_tokens,
            "commands" => self.metrics.command_tokens,
            "errors" => self.metrics.error_tokens
        );

        TokenStream::new(tokens, source_map)
    }

    /// Convenience wrapper for borrowed source text
    pub fn tokenize_str(&mut self, source: &str, mode: LexMode) -> TokenStream {
        self.tokenize(SourceMap::new(source), mode)
    }

    fn record(&mut self, token: &Token, source: &str) {
        self.metrics.record_token(token, &self.preferences);
        if token.kind == TokenKind::Error && self.preferences.log_error_tokens {
            let error = LexerError::from_error_token(token, source, false);
            log_error!(error.error_code(), &error.to_string(), span = token.span);
        }
    }

    pub fn metrics(&self) -> &LexicalMetrics {
        &self.metrics
    }

    pub fn preferences(&self) -> &LexicalPreferences {
        &self.preferences
    }

    pub fn set_preferences(&mut self, preferences: LexicalPreferences) {
        self.preferences = preferences;
    }
}

impl Default for LexicalAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::validate_token_tiling;
    use assert_matches::assert_matches;

    fn detailed() -> LexicalPreferences {
        LexicalPreferences {
            collect_detailed_metrics: true,
            log_error_tokens: false,
        }
    }

    #[test]
    fn test_tokens_tile_source() {
        let source = "start ; entry\n set x=$piece(y,\",\",2) write !,x\n quit\n";
        let stream = LexicalAnalyzer::new().tokenize_str(source, LexMode::core());
        assert!(validate_token_tiling(stream.all_tokens(), source.len()).is_ok());
    }

    #[test]
    fn test_empty_source_has_no_tokens() {
        let stream = LexicalAnalyzer::new().tokenize_str("", LexMode::core());
        assert!(stream.all_tokens().is_empty());
        assert!(stream.is_empty());
    }

    #[test]
    fn test_metrics_count_kinds() {
        let mut analyzer = LexicalAnalyzer::with_preferences(detailed());
        analyzer.tokenize_str(" set x=1 write x ` ", LexMode::core());
        let metrics = analyzer.metrics();
        assert_eq!(metrics.command_tokens, 2);
        assert_eq!(metrics.error_tokens, 1);
        assert_eq!(metrics.kind_counts.get(&TokenKind::Command), Some(&2));
        assert_eq!(metrics.error_offsets, vec![17]);
    }

    #[test]
    fn test_error_classification() {
        let source = " write \"abc\n /* open";
        let stream = LexicalAnalyzer::new().tokenize_str(source, LexMode::core());
        let errors = collect_lexer_errors(stream.all_tokens(), source);
        assert_eq!(errors.len(), 2);
        assert_matches!(errors[0], LexerError::UnterminatedString { .. });
        assert_matches!(errors[1], LexerError::UnterminatedComment { .. });
        assert_eq!(errors[0].error_code(), codes::lexical::UNTERMINATED_STRING);
    }

    #[test]
    fn test_invalid_character_classification() {
        let source = "1 ` 2";
        let stream = LexicalAnalyzer::new().tokenize_str(source, LexMode::expr());
        let errors = collect_lexer_errors(stream.all_tokens(), source);
        assert_matches!(errors.as_slice(), [LexerError::InvalidCharacter { character: '`', .. }]);
        assert_eq!(errors[0].span().start.offset, 2);
    }

    #[test]
    fn test_unterminated_embedded_region_classification() {
        let source = " &sql(SELECT 1";
        let stream = LexicalAnalyzer::new().tokenize_str(source, LexMode::core());
        let errors = collect_lexer_errors(stream.all_tokens(), source);
        assert_matches!(errors.as_slice(), [LexerError::UnterminatedEmbeddedRegion { .. }]);
    }

    #[test]
    fn test_repeated_unterminated_strings_terminate() {
        let source = " write \"a\n".repeat(200);
        let stream = LexicalAnalyzer::new().tokenize_str(&source, LexMode::core());
        assert_eq!(stream.error_token_count(), 200);
    }
}

//! Located syntax diagnostics
//!
//! Syntax errors are never returned through `Result` from a parse. They are
//! read off the finished tree: every `ERROR` region and every missing node
//! becomes one [`SyntaxError`] with the span it covers.

use crate::lexical::LexerError;
use crate::logging::{codes, Code};
use crate::utils::Span;

/// A malformed-input range found by the parser
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyntaxError {
    #[error("Unexpected token: expected {expected}, found '{found}' at {span}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("Unexpected end of input: expected {expected} at {span}")]
    UnexpectedEndOfInput { expected: String, span: Span },

    #[error("Missing {symbol} at {span}")]
    MissingSymbol { symbol: String, span: Span },

    #[error("Recovery limit of {limit} reached; remaining input not parsed at {span}")]
    RecoveryLimitReached { limit: usize, span: Span },

    #[error("Internal parser error: {message}")]
    InternalParserError { message: String, span: Span },

    #[error(transparent)]
    Lexical(#[from] LexerError),
}

impl SyntaxError {
    pub fn unexpected_token(expected: &str, found: &str, span: Span) -> Self {
        Self::UnexpectedToken {
            expected: expected.to_string(),
            found: found.to_string(),
            span,
        }
    }

    pub fn unexpected_end_of_input(expected: &str, span: Span) -> Self {
        Self::UnexpectedEndOfInput {
            expected: expected.to_string(),
            span,
        }
    }

    pub fn missing_symbol(symbol: &str, span: Span) -> Self {
        Self::MissingSymbol {
            symbol: symbol.to_string(),
            span,
        }
    }

    pub fn recovery_limit_reached(limit: usize, span: Span) -> Self {
        Self::RecoveryLimitReached { limit, span }
    }

    pub fn internal_parser_error(message: &str, span: Span) -> Self {
        Self::InternalParserError {
            message: message.to_string(),
            span,
        }
    }

    /// Get error code for global logging system
    pub fn error_code(&self) -> Code {
        match self {
            Self::UnexpectedToken { .. } => codes::syntax::UNEXPECTED_TOKEN,
            Self::UnexpectedEndOfInput { .. } => codes::syntax::UNEXPECTED_END_OF_INPUT,
            Self::MissingSymbol { .. } => codes::syntax::MISSING_SYMBOL,
            Self::RecoveryLimitReached { .. } => codes::syntax::RECOVERY_LIMIT_REACHED,
            Self::InternalParserError { .. } => codes::syntax::INTERNAL_PARSER_ERROR,
            Self::Lexical(error) => error.error_code(),
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedToken { span, .. }
            | Self::UnexpectedEndOfInput { span, .. }
            | Self::MissingSymbol { span, .. }
            | Self::RecoveryLimitReached { span, .. }
            | Self::InternalParserError { span, .. } => *span,
            Self::Lexical(error) => error.span(),
        }
    }

    pub fn is_lexical(&self) -> bool {
        matches!(self, Self::Lexical(_))
    }

    pub fn severity(&self) -> &'static str {
        codes::get_severity(self.error_code().as_str()).as_str()
    }

    pub fn description(&self) -> &'static str {
        codes::get_description(self.error_code().as_str())
    }

    pub fn recommended_action(&self) -> &'static str {
        codes::get_action(self.error_code().as_str())
    }

    /// Message with the registry's recommended action appended
    pub fn enhanced_message(&self) -> String {
        match self {
            Self::UnexpectedToken {
                expected, found, ..
            } => format!(
                "Expected {} but found '{}'. {}",
                expected,
                found,
                self.recommended_action()
            ),
            Self::UnexpectedEndOfInput { expected, .. } => format!(
                "Unexpected end of input while expecting {}. {}",
                expected,
                self.recommended_action()
            ),
            _ => format!("{} ({})", self, self.recommended_action()),
        }
    }
}

/// Stable ordering for reporting: by start offset, lexical before syntax
pub(crate) fn sort_errors(errors: &mut [SyntaxError]) {
    errors.sort_by_key(|e| (e.span().start().offset, !e.is_lexical(), e.span().end().offset));
}

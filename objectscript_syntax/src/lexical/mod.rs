//! Lexical analysis
//!
//! The scanner is a pure function of `(source, offset, mode)`; see
//! [`scanner::scan`]. [`LexicalAnalyzer`] runs it over a whole buffer.

pub mod analyzer;
pub mod keywords;
pub mod mode;
pub mod scanner;

use crate::config::compile_time::lexical::*;
use crate::tokens::TokenStream;

pub use analyzer::{collect_lexer_errors, LexerError, LexicalAnalyzer, LexicalMetrics};
pub use mode::{BodyKind, Fence, FenceKind, Layer, LexMode, LinePosition};
pub use scanner::{scan, scan_token, Scan};

/// Tokenize a buffer with default preferences
pub fn tokenize(source: &str, mode: LexMode) -> TokenStream {
    LexicalAnalyzer::new().tokenize_str(source, mode)
}

/// Check that every lexical code has registry metadata
pub fn validate_lexical_codes() -> Result<(), String> {
    let lexical_codes = [
        crate::logging::codes::lexical::INVALID_CHARACTER,
        crate::logging::codes::lexical::UNTERMINATED_STRING,
        crate::logging::codes::lexical::UNTERMINATED_COMMENT,
        crate::logging::codes::lexical::IDENTIFIER_TOO_LONG,
        crate::logging::codes::lexical::STRING_TOO_LARGE,
        crate::logging::codes::lexical::UNTERMINATED_EMBEDDED_REGION,
        crate::logging::codes::lexical::TOO_MANY_TOKENS,
    ];

    for code in &lexical_codes {
        if crate::logging::codes::get_error_metadata(code.as_str()).is_none() {
            return Err(format!(
                "Lexical error code {} not found in metadata registry",
                code.as_str()
            ));
        }
    }

    crate::log_debug!("Lexical limits",
        "max_token_count" => MAX_TOKEN_COUNT,
        "max_identifier_length" => MAX_IDENTIFIER_LENGTH,
        "max_string_size" => MAX_STRING_SIZE
    );

    Ok(())
}

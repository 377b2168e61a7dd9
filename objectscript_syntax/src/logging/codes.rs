//! Consolidated error codes and classification system
//!
//! Single source of truth for all codes emitted by the lexer, the grammar
//! composer and the parser, together with their behavioral metadata.

// ============================================================================
// CODE WRAPPER TYPE
// ============================================================================

/// Universal code wrapper for both error and success codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Code(&'static str);

impl Code {
    pub const fn new(code: &'static str) -> Self {
        Self(code)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ERROR CLASSIFICATION TYPES
// ============================================================================

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Critical = 0,
    High = 1,
    Medium = 2,
    Low = 3,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }
}

/// Complete metadata for an error code
#[derive(Debug, Clone)]
pub struct ErrorMetadata {
    pub code: &'static str,
    pub category: &'static str,
    pub severity: Severity,
    pub recoverable: bool,
    pub requires_halt: bool,
    pub description: &'static str,
    pub recommended_action: &'static str,
}

impl ErrorMetadata {
    pub const fn new(
        code: &'static str,
        category: &'static str,
        severity: Severity,
        recoverable: bool,
        requires_halt: bool,
        description: &'static str,
        recommended_action: &'static str,
    ) -> Self {
        Self {
            code,
            category,
            severity,
            recoverable,
            requires_halt,
            description,
            recommended_action,
        }
    }
}

// ============================================================================
// ERROR CODE CONSTANTS
// ============================================================================

/// System error codes
pub mod system {
    use super::Code;

    pub const INTERNAL_ERROR: Code = Code::new("ERR001");
    pub const INITIALIZATION_FAILURE: Code = Code::new("ERR002");
    pub const CONFIGURATION_ERROR: Code = Code::new("ERR003");
}

/// Lexical analysis error codes
pub mod lexical {
    use super::Code;

    pub const INVALID_CHARACTER: Code = Code::new("E020");
    pub const UNTERMINATED_STRING: Code = Code::new("E021");
    pub const UNTERMINATED_COMMENT: Code = Code::new("E022");
    pub const IDENTIFIER_TOO_LONG: Code = Code::new("E023");
    pub const STRING_TOO_LARGE: Code = Code::new("E024");
    pub const UNTERMINATED_EMBEDDED_REGION: Code = Code::new("E026");
    pub const TOO_MANY_TOKENS: Code = Code::new("E027");
}

/// Syntax analysis error codes
pub mod syntax {
    use super::Code;

    pub const UNEXPECTED_END_OF_INPUT: Code = Code::new("E040");
    pub const MISSING_SYMBOL: Code = Code::new("E042");
    pub const UNEXPECTED_TOKEN: Code = Code::new("E050");
    pub const RECOVERY_LIMIT_REACHED: Code = Code::new("E051");
    pub const INTERNAL_PARSER_ERROR: Code = Code::new("E086");
}

/// Grammar compilation error codes
pub mod grammar {
    use super::Code;

    pub const UNDEFINED_NONTERMINAL: Code = Code::new("E100");
    pub const UNSATISFIED_EMBEDDING: Code = Code::new("E101");
    pub const CYCLIC_EMBEDDING: Code = Code::new("E102");
    pub const CONFLICTING_PRECEDENCE: Code = Code::new("E103");
    pub const UNDEFINED_PRECEDENCE_LEVEL: Code = Code::new("E104");
    pub const MISSING_OPERATOR_PRECEDENCE: Code = Code::new("E105");
    pub const EMPTY_RULE: Code = Code::new("E106");
    pub const DUPLICATE_RULE: Code = Code::new("E107");
    pub const UNREACHABLE_RULE: Code = Code::new("E108");
    pub const MISSING_START_RULE: Code = Code::new("E109");
    pub const EMPTY_PRODUCTION: Code = Code::new("E110");
    pub const AMBIGUOUS_EMBEDDING: Code = Code::new("E111");
    pub const UNKNOWN_GRAMMAR: Code = Code::new("E112");
}

/// Incremental reparse codes
pub mod incremental {
    use super::Code;

    pub const INVALID_EDIT: Code = Code::new("E120");
}

/// Success codes
pub mod success {
    use super::Code;

    pub const SYSTEM_INITIALIZATION_COMPLETED: Code = Code::new("I004");
    pub const TOKENIZATION_COMPLETE: Code = Code::new("I020");
    pub const GRAMMAR_COMPOSITION_COMPLETE: Code = Code::new("I030");
    pub const TABLE_CONSTRUCTION_COMPLETE: Code = Code::new("I031");
    pub const PARSE_COMPLETE: Code = Code::new("I040");
    pub const REPARSE_COMPLETE: Code = Code::new("I041");
}

// ============================================================================
// ERROR METADATA REGISTRY
// ============================================================================

/// Every code with metadata, grouped by category
static REGISTRY: &[ErrorMetadata] = &[
    // System
    ErrorMetadata::new("ERR001", "System", Severity::Critical, false, true,
        "Critical internal engine error",
        "File a bug report with the input that triggered it"),
    ErrorMetadata::new("ERR002", "System", Severity::Critical, false, true,
        "Logging or engine initialization failure",
        "Check configuration and initialization order"),
    ErrorMetadata::new("ERR003", "System", Severity::High, false, true,
        "Invalid runtime configuration",
        "Fix the runtime preferences file or environment variables"),
    // Lexical
    ErrorMetadata::new("E020", "Lexical", Severity::Low, true, false,
        "Character not valid in the current lexical mode",
        "Remove or quote the character"),
    ErrorMetadata::new("E021", "Lexical", Severity::Medium, true, false,
        "String literal not terminated before end of line",
        "Close the string with a double quote"),
    ErrorMetadata::new("E022", "Lexical", Severity::Medium, true, false,
        "Block comment not terminated",
        "Close the comment with */"),
    ErrorMetadata::new("E023", "Lexical", Severity::Low, true, false,
        "Identifier exceeds the configured length limit",
        "Shorten the identifier"),
    ErrorMetadata::new("E024", "Lexical", Severity::Low, true, false,
        "String literal exceeds the configured size limit",
        "Split the literal"),
    ErrorMetadata::new("E026", "Lexical", Severity::Medium, true, false,
        "Embedded region or raw body not terminated",
        "Add the closing delimiter of the embedded region"),
    ErrorMetadata::new("E027", "Lexical", Severity::High, true, false,
        "Token limit reached; remainder scanned as one error token",
        "Split the document or raise max_token_count"),
    // Syntax
    ErrorMetadata::new("E040", "Syntax", Severity::Medium, true, false,
        "Input ended before the construct was complete",
        "Complete the construct"),
    ErrorMetadata::new("E042", "Syntax", Severity::Medium, true, false,
        "A required symbol is missing",
        "Insert the missing symbol"),
    ErrorMetadata::new("E050", "Syntax", Severity::Medium, true, false,
        "Token not valid at this position",
        "Check the statement syntax near the token"),
    ErrorMetadata::new("E051", "Syntax", Severity::High, true, false,
        "Recovery limit reached; remainder wrapped in one error node",
        "Fix earlier errors first"),
    ErrorMetadata::new("E086", "Syntax", Severity::Critical, false, false,
        "Internal parser invariant violated",
        "File a bug report with the input that triggered it"),
    // Grammar
    ErrorMetadata::new("E100", "Grammar", Severity::Critical, false, true,
        "Rule references an undefined non-terminal",
        "Define the rule or fix the reference"),
    ErrorMetadata::new("E101", "Grammar", Severity::Critical, false, true,
        "Embedding point has no target grammar in the composition",
        "Include the target grammar or export the rule"),
    ErrorMetadata::new("E102", "Grammar", Severity::Critical, false, true,
        "Embedding relation between grammars is cyclic",
        "Remove the back edge from the embedding graph"),
    ErrorMetadata::new("E103", "Grammar", Severity::Critical, false, true,
        "Two grammars assign different precedence to one terminal",
        "Align the levels or make one of them local"),
    ErrorMetadata::new("E104", "Grammar", Severity::Critical, false, true,
        "Production references an undeclared precedence level",
        "Declare the level in the precedence table"),
    ErrorMetadata::new("E105", "Grammar", Severity::Critical, false, true,
        "Binary operator production has no precedence level",
        "Tag the production with a level"),
    ErrorMetadata::new("E106", "Grammar", Severity::Critical, false, true,
        "Rule has no productions",
        "Add at least one alternative"),
    ErrorMetadata::new("E107", "Grammar", Severity::Critical, false, true,
        "Rule defined twice in one grammar",
        "Merge the definitions"),
    ErrorMetadata::new("E108", "Grammar", Severity::High, false, true,
        "Rule is unreachable from the start or exported rules",
        "Remove the rule or reference it"),
    ErrorMetadata::new("E109", "Grammar", Severity::Critical, false, true,
        "Start rule is not defined",
        "Define the start rule"),
    ErrorMetadata::new("E110", "Grammar", Severity::Critical, false, true,
        "Production expands to an empty sequence",
        "Remove the empty alternative; optional parts belong to the parent"),
    ErrorMetadata::new("E111", "Grammar", Severity::Critical, false, true,
        "Embedding point satisfied by more than one grammar",
        "Declare a single target grammar"),
    ErrorMetadata::new("E112", "Grammar", Severity::Critical, false, true,
        "Grammar name is not known",
        "Use core, expr or udl"),
    // Incremental
    ErrorMetadata::new("E120", "Incremental", Severity::Low, true, false,
        "Edit does not match the previous source",
        "Parse from scratch"),
];

// ============================================================================
// CLASSIFICATION FUNCTIONS
// ============================================================================

pub fn get_error_metadata(code: &str) -> Option<&'static ErrorMetadata> {
    REGISTRY.iter().find(|metadata| metadata.code == code)
}

/// Unregistered codes are treated as recoverable medium-severity errors
pub fn get_severity(code: &str) -> Severity {
    get_error_metadata(code).map_or(Severity::Medium, |m| m.severity)
}

pub fn is_recoverable(code: &str) -> bool {
    get_error_metadata(code).map_or(true, |m| m.recoverable)
}

pub fn requires_halt(code: &str) -> bool {
    get_error_metadata(code).is_some_and(|m| m.requires_halt)
}

pub fn get_description(code: &str) -> &'static str {
    get_error_metadata(code).map_or("Unknown error", |m| m.description)
}

pub fn get_action(code: &str) -> &'static str {
    get_error_metadata(code).map_or("No specific action available", |m| m.recommended_action)
}

/// Registered category, or one derived from the code's prefix letter
pub fn get_category(code: &str) -> &'static str {
    if let Some(metadata) = get_error_metadata(code) {
        return metadata.category;
    }
    match code.as_bytes().first() {
        Some(b'I') => "Success",
        Some(b'W') => "Warning",
        Some(b'D') => "Debug",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_codes_are_unique() {
        for (i, metadata) in REGISTRY.iter().enumerate() {
            assert!(
                REGISTRY[i + 1..].iter().all(|m| m.code != metadata.code),
                "duplicate {}",
                metadata.code
            );
        }
    }

    #[test]
    fn test_every_error_constant_has_metadata() {
        let all = [
            system::INTERNAL_ERROR,
            system::INITIALIZATION_FAILURE,
            system::CONFIGURATION_ERROR,
            lexical::INVALID_CHARACTER,
            lexical::UNTERMINATED_STRING,
            lexical::UNTERMINATED_COMMENT,
            lexical::IDENTIFIER_TOO_LONG,
            lexical::STRING_TOO_LARGE,
            lexical::UNTERMINATED_EMBEDDED_REGION,
            lexical::TOO_MANY_TOKENS,
            syntax::UNEXPECTED_END_OF_INPUT,
            syntax::MISSING_SYMBOL,
            syntax::UNEXPECTED_TOKEN,
            syntax::RECOVERY_LIMIT_REACHED,
            syntax::INTERNAL_PARSER_ERROR,
            grammar::UNDEFINED_NONTERMINAL,
            grammar::UNSATISFIED_EMBEDDING,
            grammar::CYCLIC_EMBEDDING,
            grammar::CONFLICTING_PRECEDENCE,
            grammar::UNDEFINED_PRECEDENCE_LEVEL,
            grammar::MISSING_OPERATOR_PRECEDENCE,
            grammar::EMPTY_RULE,
            grammar::DUPLICATE_RULE,
            grammar::UNREACHABLE_RULE,
            grammar::MISSING_START_RULE,
            grammar::EMPTY_PRODUCTION,
            grammar::AMBIGUOUS_EMBEDDING,
            grammar::UNKNOWN_GRAMMAR,
            incremental::INVALID_EDIT,
        ];

        for code in all {
            let metadata = get_error_metadata(code.as_str());
            assert!(metadata.is_some(), "missing metadata for {}", code);
            assert_eq!(metadata.map(|m| m.code), Some(code.as_str()));
        }
    }

    #[test]
    fn test_classification_defaults_for_unknown_codes() {
        assert_eq!(get_severity("X999"), Severity::Medium);
        assert!(is_recoverable("X999"));
        assert!(!requires_halt("X999"));
        assert_eq!(get_description("X999"), "Unknown error");
        assert_eq!(get_category("X999"), "Unknown");
        assert_eq!(get_category(success::PARSE_COMPLETE.as_str()), "Success");
    }

    #[test]
    fn test_grammar_errors_halt_and_syntax_errors_recover() {
        assert!(requires_halt(grammar::CYCLIC_EMBEDDING.as_str()));
        assert!(!is_recoverable(grammar::CONFLICTING_PRECEDENCE.as_str()));
        assert!(is_recoverable(syntax::UNEXPECTED_TOKEN.as_str()));
        assert!(!requires_halt(syntax::MISSING_SYMBOL.as_str()));
        assert_eq!(get_category(lexical::UNTERMINATED_STRING.as_str()), "Lexical");
    }
}

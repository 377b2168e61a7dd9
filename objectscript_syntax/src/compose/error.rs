//! Grammar compilation errors
//!
//! These are the only fatal errors in the crate. They occur while grammars
//! are validated and composed, never while a document is parsed.

use crate::grammar::GrammarId;
use crate::logging::{codes, Code};

pub type ComposeResult<T> = Result<T, GrammarCompileError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrammarCompileError {
    #[error("Rule '{grammar}::{rule}' references undefined non-terminal '{symbol}'")]
    UndefinedNonterminal {
        grammar: GrammarId,
        rule: String,
        symbol: String,
    },

    #[error("Embedding point '{slot}' in grammar '{grammar}' is not satisfied: {reason}")]
    UnsatisfiedEmbedding {
        grammar: GrammarId,
        slot: String,
        reason: String,
    },

    #[error("Embedding point '{slot}' in grammar '{grammar}' is declared more than once")]
    AmbiguousEmbedding { grammar: GrammarId, slot: String },

    #[error("Unknown grammar '{name}'")]
    UnknownGrammar { name: String },

    #[error("Cyclic embedding: {}", path.iter().map(|g| g.name()).collect::<Vec<_>>().join(" -> "))]
    CyclicEmbedding { path: Vec<GrammarId> },

    #[error("Operator '{operator}' has precedence '{first}' and '{second}' in different grammars")]
    ConflictingPrecedence {
        operator: String,
        first: String,
        second: String,
    },

    #[error("Precedence level '{level}' used by grammar '{grammar}' is not defined")]
    UndefinedPrecedenceLevel { grammar: GrammarId, level: String },

    #[error("Binary production of '{grammar}::{rule}' has no precedence level")]
    MissingOperatorPrecedence { grammar: GrammarId, rule: String },

    #[error("Rule '{grammar}::{rule}' has no alternatives")]
    EmptyRule { grammar: GrammarId, rule: String },

    #[error("Rule '{grammar}::{rule}' has an empty production")]
    EmptyProduction { grammar: GrammarId, rule: String },

    #[error("Rule '{grammar}::{rule}' is defined more than once")]
    DuplicateRule { grammar: GrammarId, rule: String },

    #[error("Start rule '{rule}' of grammar '{grammar}' is not defined")]
    MissingStartRule { grammar: GrammarId, rule: String },

    #[error("Rule '{grammar}::{rule}' is unreachable from the start rule and exports")]
    UnreachableRule { grammar: GrammarId, rule: String },
}

impl GrammarCompileError {
    pub fn undefined_nonterminal(grammar: GrammarId, rule: &str, symbol: &str) -> Self {
        Self::UndefinedNonterminal {
            grammar,
            rule: rule.to_string(),
            symbol: symbol.to_string(),
        }
    }

    pub fn unsatisfied_embedding(grammar: GrammarId, slot: &str, reason: &str) -> Self {
        Self::UnsatisfiedEmbedding {
            grammar,
            slot: slot.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn ambiguous_embedding(grammar: GrammarId, slot: &str) -> Self {
        Self::AmbiguousEmbedding {
            grammar,
            slot: slot.to_string(),
        }
    }

    pub fn unknown_grammar(name: &str) -> Self {
        Self::UnknownGrammar {
            name: name.to_string(),
        }
    }

    pub fn conflicting_precedence(operator: &str, first: &str, second: &str) -> Self {
        Self::ConflictingPrecedence {
            operator: operator.to_string(),
            first: first.to_string(),
            second: second.to_string(),
        }
    }

    pub fn undefined_precedence_level(grammar: GrammarId, level: &str) -> Self {
        Self::UndefinedPrecedenceLevel {
            grammar,
            level: level.to_string(),
        }
    }

    pub fn missing_operator_precedence(grammar: GrammarId, rule: &str) -> Self {
        Self::MissingOperatorPrecedence {
            grammar,
            rule: rule.to_string(),
        }
    }

    pub fn empty_rule(grammar: GrammarId, rule: &str) -> Self {
        Self::EmptyRule {
            grammar,
            rule: rule.to_string(),
        }
    }

    pub fn empty_production(grammar: GrammarId, rule: &str) -> Self {
        Self::EmptyProduction {
            grammar,
            rule: rule.to_string(),
        }
    }

    pub fn duplicate_rule(grammar: GrammarId, rule: &str) -> Self {
        Self::DuplicateRule {
            grammar,
            rule: rule.to_string(),
        }
    }

    pub fn missing_start_rule(grammar: GrammarId, rule: &str) -> Self {
        Self::MissingStartRule {
            grammar,
            rule: rule.to_string(),
        }
    }

    pub fn unreachable_rule(grammar: GrammarId, rule: &str) -> Self {
        Self::UnreachableRule {
            grammar,
            rule: rule.to_string(),
        }
    }

    /// Get error code for global logging system
    pub fn error_code(&self) -> Code {
        match self {
            Self::UndefinedNonterminal { .. } => codes::grammar::UNDEFINED_NONTERMINAL,
            Self::UnsatisfiedEmbedding { .. } => codes::grammar::UNSATISFIED_EMBEDDING,
            Self::AmbiguousEmbedding { .. } => codes::grammar::AMBIGUOUS_EMBEDDING,
            Self::UnknownGrammar { .. } => codes::grammar::UNKNOWN_GRAMMAR,
            Self::CyclicEmbedding { .. } => codes::grammar::CYCLIC_EMBEDDING,
            Self::ConflictingPrecedence { .. } => codes::grammar::CONFLICTING_PRECEDENCE,
            Self::UndefinedPrecedenceLevel { .. } => codes::grammar::UNDEFINED_PRECEDENCE_LEVEL,
            Self::MissingOperatorPrecedence { .. } => codes::grammar::MISSING_OPERATOR_PRECEDENCE,
            Self::EmptyRule { .. } => codes::grammar::EMPTY_RULE,
            Self::EmptyProduction { .. } => codes::grammar::EMPTY_PRODUCTION,
            Self::DuplicateRule { .. } => codes::grammar::DUPLICATE_RULE,
            Self::MissingStartRule { .. } => codes::grammar::MISSING_START_RULE,
            Self::UnreachableRule { .. } => codes::grammar::UNREACHABLE_RULE,
        }
    }

    /// Grammar the error was found in, when it belongs to one
    pub fn grammar(&self) -> Option<GrammarId> {
        match self {
            Self::UndefinedNonterminal { grammar, .. }
            | Self::UnsatisfiedEmbedding { grammar, .. }
            | Self::AmbiguousEmbedding { grammar, .. }
            | Self::UndefinedPrecedenceLevel { grammar, .. }
            | Self::MissingOperatorPrecedence { grammar, .. }
            | Self::EmptyRule { grammar, .. }
            | Self::EmptyProduction { grammar, .. }
            | Self::DuplicateRule { grammar, .. }
            | Self::MissingStartRule { grammar, .. }
            | Self::UnreachableRule { grammar, .. } => Some(*grammar),
            Self::CyclicEmbedding { path } => path.first().copied(),
            Self::UnknownGrammar { .. } | Self::ConflictingPrecedence { .. } => None,
        }
    }

    pub fn description(&self) -> &'static str {
        codes::get_description(self.error_code().as_str())
    }

    pub fn recommended_action(&self) -> &'static str {
        codes::get_action(self.error_code().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let cyclic = GrammarCompileError::CyclicEmbedding {
            path: vec![GrammarId::CORE, GrammarId::EXPR, GrammarId::CORE],
        };
        assert_eq!(cyclic.error_code().as_str(), "E102");
        assert_eq!(cyclic.to_string(), "Cyclic embedding: core -> expr -> core");
        assert_eq!(cyclic.grammar(), Some(GrammarId::CORE));

        let undefined = GrammarCompileError::undefined_nonterminal(GrammarId::EXPR, "lvn", "subs");
        assert_eq!(undefined.error_code(), codes::grammar::UNDEFINED_NONTERMINAL);
        assert!(undefined.to_string().contains("expr::lvn"));

        let conflicting = GrammarCompileError::conflicting_precedence("+", "additive", "or");
        assert_eq!(conflicting.error_code().as_str(), "E103");
        assert_eq!(conflicting.grammar(), None);
    }

    #[test]
    fn test_codes_are_registered() {
        let error = GrammarCompileError::unreachable_rule(GrammarId::UDL, "orphan");
        assert_ne!(error.description(), "Unknown error");
    }
}

//! Grammar handles
//!
//! A [`Language`] is an entry grammar plus the merged table it parses
//! against. The built-in handles are composed once per process and shared.

use crate::compose::{compose_grammars, GrammarCompileError, MergedTable};
use crate::grammar::{builtin, builtin_closure, Grammar, GrammarId};
use crate::lexical::LexMode;
use crate::logging::codes;
use crate::{log_error, ParseError};
use std::fmt;
use std::sync::{Arc, OnceLock};

#[derive(Debug, Clone)]
pub struct Language {
    grammar: GrammarId,
    table: Arc<MergedTable>,
    mode: LexMode,
}

static EXPR: OnceLock<Language> = OnceLock::new();
static CORE: OnceLock<Language> = OnceLock::new();
static UDL: OnceLock<Language> = OnceLock::new();

impl Language {
    /// Standalone expression fragments
    pub fn expr() -> &'static Language {
        EXPR.get_or_init(|| Self::builtin_or_degraded(GrammarId::EXPR))
    }

    /// Routine code: commands and statements
    pub fn core() -> &'static Language {
        CORE.get_or_init(|| Self::builtin_or_degraded(GrammarId::CORE))
    }

    /// Class definition documents
    pub fn udl() -> &'static Language {
        UDL.get_or_init(|| Self::builtin_or_degraded(GrammarId::UDL))
    }

    /// Built-in handle by grammar name, case-insensitive
    pub fn by_name(name: &str) -> Option<&'static Language> {
        match GrammarId::builtin(name)? {
            GrammarId::EXPR => Some(Self::expr()),
            GrammarId::CORE => Some(Self::core()),
            GrammarId::UDL => Some(Self::udl()),
            _ => None,
        }
    }

    /// Composes exactly the listed built-in grammars; the first is the entry.
    /// Every embedding must be satisfied within the list.
    pub fn compose(ids: &[GrammarId]) -> Result<Language, ParseError> {
        let Some(&entry) = ids.first() else {
            return Err(GrammarCompileError::UnknownGrammar {
                name: String::new(),
            }
            .into());
        };
        let mut grammars = Vec::with_capacity(ids.len());
        for &id in ids {
            let grammar = builtin(id).ok_or_else(|| GrammarCompileError::UnknownGrammar {
                name: id.name().to_string(),
            })?;
            grammars.push(grammar);
        }
        Self::from_grammars(entry, &grammars, default_mode(entry))
    }

    /// Handle over user-supplied grammars
    pub fn from_grammars(
        entry: GrammarId,
        grammars: &[Grammar],
        mode: LexMode,
    ) -> Result<Language, ParseError> {
        if !grammars.iter().any(|g| g.id == entry) {
            return Err(GrammarCompileError::UnknownGrammar {
                name: entry.name().to_string(),
            }
            .into());
        }
        let table = compose_grammars(grammars)?;
        Ok(Language {
            grammar: entry,
            table,
            mode,
        })
    }

    fn builtin_or_degraded(id: GrammarId) -> Language {
        match Self::from_grammars(id, &builtin_closure(id), default_mode(id)) {
            Ok(language) => language,
            Err(error) => {
                log_error!(codes::system::INTERNAL_ERROR, "Built-in grammar failed to compose",
                    "grammar" => id,
                    "error" => error.to_string()
                );
                Language {
                    grammar: id,
                    table: Arc::new(MergedTable::empty()),
                    mode: default_mode(id),
                }
            }
        }
    }

    pub fn grammar(&self) -> GrammarId {
        self.grammar
    }

    pub fn name(&self) -> &'static str {
        self.grammar.name()
    }

    pub fn table(&self) -> &Arc<MergedTable> {
        &self.table
    }

    /// Lexer mode a document of this language starts in
    pub fn initial_mode(&self) -> LexMode {
        self.mode
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} states)", self.grammar, self.table.state_count())
    }
}

fn default_mode(id: GrammarId) -> LexMode {
    match id {
        GrammarId::CORE => LexMode::core(),
        GrammarId::UDL => LexMode::udl(),
        _ => LexMode::expr(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_builtin_handles_are_shared() {
        assert!(std::ptr::eq(Language::core(), Language::core()));
        assert!(Arc::ptr_eq(Language::udl().table(), Language::udl().table()));
        assert_eq!(Language::expr().grammar(), GrammarId::EXPR);
    }

    #[test]
    fn test_builtin_tables_contain_their_closure() {
        let udl = Language::udl().table();
        assert!(udl.contains(GrammarId::CORE));
        assert!(udl.contains(GrammarId::EXPR));
        assert!(!Language::expr().table().contains(GrammarId::CORE));
    }

    #[test]
    fn test_by_name() {
        assert_eq!(Language::by_name("CORE").map(|l| l.name()), Some("core"));
        assert!(Language::by_name("sql").is_none());
    }

    #[test]
    fn test_compose_requires_closed_set() {
        assert_matches!(
            Language::compose(&[GrammarId::CORE]),
            Err(ParseError::Grammar(GrammarCompileError::UnsatisfiedEmbedding { .. }))
        );
        let language = Language::compose(&[GrammarId::CORE, GrammarId::EXPR]).unwrap();
        assert_eq!(language.grammar(), GrammarId::CORE);
        assert_eq!(language.initial_mode(), LexMode::core());
    }

    #[test]
    fn test_compose_rejects_unknown_and_empty() {
        assert_matches!(
            Language::compose(&[GrammarId::new("sql")]),
            Err(ParseError::Grammar(GrammarCompileError::UnknownGrammar { .. }))
        );
        assert_matches!(Language::compose(&[]), Err(ParseError::Grammar(_)));
    }
}

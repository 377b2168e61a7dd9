//! Parser front door
//!
//! Lexes, runs the engine and packages a [`ParseResult`]. Reparse validates
//! the edit, relexes the edited neighbourhood and lets the engine reuse old
//! subtrees; an invalid edit falls back to a full parse.

use crate::config::compile_time::syntax::MAX_ERROR_HISTORY;
use crate::config::runtime::{LexicalPreferences, RuntimeConfig, SyntaxPreferences};
use crate::language::Language;
use crate::lexical::LexicalAnalyzer;
use crate::logging::codes;
use crate::syntax::engine::{self, EngineInput};
use crate::syntax::error::SyntaxError;
use crate::syntax::incremental::{relex, Edit, ReparseStats, ReuseIndex};
use crate::syntax::recovery::RecoveryTable;
use crate::syntax::result::ParseResult;
use crate::tokens::TokenStream;
use crate::utils::SourceMap;
use crate::{log_debug, log_error, log_success, ParseError};
use std::collections::VecDeque;
use std::sync::Arc;

pub struct Parser {
    language: Language,
    recovery: RecoveryTable,
    preferences: SyntaxPreferences,
    lexical: LexicalPreferences,
    /// Most recent errors across parses, oldest first
    error_history: VecDeque<SyntaxError>,
}

impl Parser {
    pub fn new(language: &Language) -> Self {
        log_debug!("Creating parser", "grammar" => language.grammar());
        Self {
            recovery: RecoveryTable::for_table(language.table()),
            language: language.clone(),
            preferences: SyntaxPreferences::default(),
            lexical: LexicalPreferences::default(),
            error_history: VecDeque::new(),
        }
    }

    /// Parser using the lexical and syntax sections of `config`
    pub fn from_config(language: &Language, config: &RuntimeConfig) -> Self {
        Self::new(language)
            .with_preferences(config.syntax.clone())
            .with_lexical_preferences(config.lexical.clone())
    }

    /// Replace the resynchronization tokens used by recovery
    pub fn with_recovery(mut self, recovery: RecoveryTable) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn with_preferences(mut self, preferences: SyntaxPreferences) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn with_lexical_preferences(mut self, preferences: LexicalPreferences) -> Self {
        self.lexical = preferences;
        self
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn recovery_table(&self) -> &RecoveryTable {
        &self.recovery
    }

    pub fn parse(&mut self, source: &str) -> ParseResult {
        let tokens = LexicalAnalyzer::with_preferences(self.lexical.clone())
            .tokenize(SourceMap::new(source), self.language.initial_mode());
        let (result, _) = self.run(tokens, None);
        log_success!(codes::success::PARSE_COMPLETE, "Parse completed",
            "grammar" => self.language.grammar(),
            "tokens" => result.stats().tokens,
            "gss_nodes" => result.stats().gss_nodes,
            "errors" => result.errors().len()
        );
        self.remember(&result);
        result
    }

    /// Reparse after `edit`; an edit that does not match the two sources
    /// is logged and answered with a full parse
    pub fn reparse(&mut self, previous: &ParseResult, edit: &Edit, source: &str) -> ParseResult {
        match self.try_reparse(previous, edit, source) {
            Ok(result) => result,
            Err(error) => {
                log_error!(error.error_code(), "Invalid edit, parsing from scratch",
                    "error" => error.to_string()
                );
                self.parse(source)
            }
        }
    }

    pub fn try_reparse(
        &mut self,
        previous: &ParseResult,
        edit: &Edit,
        source: &str,
    ) -> Result<ParseResult, ParseError> {
        edit.validate(previous.source(), source)?;

        let relexed = relex(previous.tokens(), edit, source, self.language.initial_mode());
        let reusable = self.preferences.enable_subtree_reuse
            && Arc::ptr_eq(previous.table(), self.language.table())
            && previous.grammar() == self.language.grammar()
            && previous.recovery_table() == &self.recovery;
        let index = if reusable {
            ReuseIndex::build(
                previous.root(),
                previous.ambiguity(),
                previous.tokens(),
                &relexed,
                &self.recovery,
            )
        } else {
            ReuseIndex::default()
        };
        log_debug!("Reuse candidates collected",
            "candidates" => index.len(),
            "relexed_tokens" => relexed.relexed_tokens
        );

        let relexed_tokens = relexed.relexed_tokens;
        let (result, reused_subtrees) = self.run(relexed.tokens, Some(&index));
        let stats = ReparseStats {
            reused_subtrees,
            relexed_tokens,
        };
        let result = result.with_reparse_stats(stats);
        log_success!(codes::success::REPARSE_COMPLETE, "Reparse completed",
            "grammar" => self.language.grammar(),
            "reused_subtrees" => stats.reused_subtrees,
            "relexed_tokens" => stats.relexed_tokens,
            "errors" => result.errors().len()
        );
        self.remember(&result);
        Ok(result)
    }

    /// Parse result and the number of subtrees reused
    fn run(&self, tokens: TokenStream, reuse: Option<&ReuseIndex>) -> (ParseResult, usize) {
        let table = self.language.table();
        let output = engine::run(EngineInput {
            table,
            grammar: self.language.grammar(),
            tokens: &tokens,
            recovery: &self.recovery,
            reuse,
            log_recovery: self.preferences.log_recovery_steps,
        });
        let reused = output.reused;
        let result = ParseResult::new(
            output,
            tokens,
            table.clone(),
            self.language.grammar(),
            self.recovery.clone(),
        );
        (result, reused)
    }

    fn remember(&mut self, result: &ParseResult) {
        for error in result.errors() {
            if self.error_history.len() >= MAX_ERROR_HISTORY {
                self.error_history.pop_front();
            }
            self.error_history.push_back(error.clone());
        }
    }

    /// Errors from recent parses, bounded
    pub fn error_history(&self) -> impl Iterator<Item = &SyntaxError> {
        self.error_history.iter()
    }

    pub fn clear_error_history(&mut self) {
        self.error_history.clear();
    }
}

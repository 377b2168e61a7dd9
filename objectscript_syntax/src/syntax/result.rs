//! Parse results
//!
//! A [`ParseResult`] owns everything a later reparse needs: the tree, the
//! token stream with its lexer modes, and the per-position ambiguity marks.

use crate::compose::MergedTable;
use crate::grammar::GrammarId;
use crate::lexical::collect_lexer_errors;
use crate::syntax::cst::{Node, NodeRef, NodeSymbol};
use crate::syntax::engine::{EngineOutput, ParseStats};
use crate::syntax::error::{sort_errors, SyntaxError};
use crate::syntax::incremental::ReparseStats;
use crate::syntax::recovery::{RecoveryKind, RecoveryRecord, RecoveryTable};
use crate::tokens::TokenStream;
use crate::utils::Span;
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ParseResult {
    root: Arc<Node>,
    errors: Vec<SyntaxError>,
    tokens: TokenStream,
    table: Arc<MergedTable>,
    grammar: GrammarId,
    recovery: RecoveryTable,
    ambiguity: Vec<bool>,
    stats: ParseStats,
    reparse_stats: Option<ReparseStats>,
}

impl ParseResult {
    pub(crate) fn new(
        output: EngineOutput,
        tokens: TokenStream,
        table: Arc<MergedTable>,
        grammar: GrammarId,
        recovery: RecoveryTable,
    ) -> Self {
        let errors = derive_errors(&output, &tokens);
        Self {
            root: output.root,
            errors,
            tokens,
            table,
            grammar,
            recovery,
            ambiguity: output.ambiguity,
            stats: output.stats,
            reparse_stats: None,
        }
    }

    pub(crate) fn with_reparse_stats(mut self, stats: ReparseStats) -> Self {
        self.reparse_stats = Some(stats);
        self
    }

    pub fn root(&self) -> &Arc<Node> {
        &self.root
    }

    pub fn root_node(&self) -> NodeRef<'_> {
        NodeRef::root(&self.root, self.tokens.source())
    }

    /// Located lexical and syntax errors, ordered by position
    pub fn errors(&self) -> &[SyntaxError] {
        &self.errors
    }

    pub fn error_ranges(&self) -> Vec<Range<usize>> {
        self.errors.iter().map(|e| e.span().byte_range()).collect()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn source(&self) -> &str {
        self.tokens.source()
    }

    pub fn tokens(&self) -> &TokenStream {
        &self.tokens
    }

    pub fn table(&self) -> &Arc<MergedTable> {
        &self.table
    }

    pub fn grammar(&self) -> GrammarId {
        self.grammar
    }

    pub fn recovery_table(&self) -> &RecoveryTable {
        &self.recovery
    }

    /// Whether more than one interpretation was live at significant
    /// position `p`
    pub fn is_ambiguous_at(&self, p: usize) -> bool {
        self.ambiguity.get(p).copied().unwrap_or(false)
    }

    pub(crate) fn ambiguity(&self) -> &[bool] {
        &self.ambiguity
    }

    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    /// Present on results produced by a reparse
    pub fn reparse_stats(&self) -> Option<ReparseStats> {
        self.reparse_stats
    }

    /// Every error with the source line it points at, underlined
    pub fn render_errors(&self) -> String {
        let map = self.tokens.source_map();
        self.errors
            .iter()
            .map(|error| map.render(error.span(), &format!("[{}] {}", error.error_code(), error)))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn to_sexp(&self) -> String {
        self.root_node().to_sexp()
    }

    /// Structural equality of the trees, ignoring how they were produced
    pub fn same_tree(&self, other: &ParseResult) -> bool {
        self.root.same_structure(&other.root)
    }
}

/// Errors read off the finished tree: the outermost node of every `ERROR`
/// region, every missing node, every lexer error token, and an internal
/// failure if there was one
fn derive_errors(output: &EngineOutput, tokens: &TokenStream) -> Vec<SyntaxError> {
    let map = tokens.source_map();
    let mut errors: Vec<SyntaxError> = collect_lexer_errors(tokens.all_tokens(), tokens.source())
        .into_iter()
        .map(SyntaxError::from)
        .collect();

    let eof_start = match tokens.len() {
        0 => 0,
        n => tokens.end_byte(n - 1),
    };
    let root = NodeRef::root(&output.root, tokens.source());
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let span = map.span(node.start_byte(), node.end_byte());
        if node.is_missing() {
            errors.push(missing_error(node.kind(), node.start_byte(), eof_start, span));
            continue;
        }
        if node.node().symbol() == NodeSymbol::Error {
            errors.push(region_error(&output.records, node.start_byte(), span, tokens));
            continue;
        }
        if node.has_error() {
            stack.extend(node.children().into_iter().rev());
        }
    }

    if let Some(message) = &output.internal_error {
        errors.push(SyntaxError::internal_parser_error(
            message,
            map.span(0, tokens.source().len()),
        ));
    }
    sort_errors(&mut errors);
    errors
}

fn missing_error(kind: &str, start: usize, eof_start: usize, span: Span) -> SyntaxError {
    if start >= eof_start {
        SyntaxError::unexpected_end_of_input(kind, span)
    } else {
        SyntaxError::missing_symbol(kind, span)
    }
}

fn region_error(
    records: &BTreeMap<usize, RecoveryRecord>,
    start: usize,
    span: Span,
    tokens: &TokenStream,
) -> SyntaxError {
    let Some(record) = records.get(&start) else {
        let found = span.slice(tokens.source()).split_whitespace().next().unwrap_or("");
        return SyntaxError::unexpected_token("valid syntax", found, span);
    };
    let expected = describe_expected(&record.expected);
    match &record.kind {
        RecoveryKind::Skip { found } => SyntaxError::unexpected_token(&expected, found, span),
        RecoveryKind::EndOfInput => SyntaxError::unexpected_end_of_input(&expected, span),
        RecoveryKind::Limit => SyntaxError::recovery_limit_reached(
            crate::config::compile_time::syntax::MAX_ERROR_COUNT,
            span,
        ),
    }
}

fn describe_expected(expected: &[String]) -> String {
    match expected {
        [] => "valid syntax".to_string(),
        [one] => one.clone(),
        many => format!("one of {}", many.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Language;
    use crate::syntax::Parser;
    use assert_matches::assert_matches;

    #[test]
    fn test_error_ranges_follow_errors() {
        let result = Parser::new(Language::core()).parse(" set x = \n write 1\n");
        let ranges = result.error_ranges();
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0], result.errors()[0].span().byte_range());
        assert!(ranges[0].is_empty());
        assert!((8..=9).contains(&ranges[0].start), "{:?}", ranges);

        let clean = Parser::new(Language::core()).parse(" set x = 1\n");
        assert!(clean.error_ranges().is_empty());
    }

    #[test]
    fn test_recovery_positions_are_ambiguous() {
        let result = Parser::new(Language::core()).parse(" set x = \n write 1\n");
        let positions = result.tokens().len();
        assert!((0..=positions).any(|p| result.is_ambiguous_at(p)));
        assert!(!result.is_ambiguous_at(positions + 1));
        assert_eq!(result.ambiguity().len(), positions + 1);
    }

    #[test]
    fn test_describe_expected() {
        assert_eq!(describe_expected(&[]), "valid syntax");
        assert_eq!(describe_expected(&["')'".to_string()]), "')'");
        assert_eq!(
            describe_expected(&["','".to_string(), "')'".to_string()]),
            "one of ',', ')'"
        );
    }

    #[test]
    fn test_missing_at_end_reads_as_end_of_input() {
        let span = Span::from_offsets(7, 7);
        assert_matches!(
            missing_error("expression", 7, 7, span),
            SyntaxError::UnexpectedEndOfInput { .. }
        );
        assert_matches!(
            missing_error("expression", 3, 7, span),
            SyntaxError::MissingSymbol { .. }
        );
    }
}

//! Incremental reparse support
//!
//! An [`Edit`] describes one replaced byte range. [`relex`] rescans only the
//! edited neighbourhood and splices the old token suffix back in once the
//! scanner realigns with it. [`ReuseIndex`] lists old subtrees that cannot
//! have changed, keyed by where they start in the new token stream.

use crate::config::compile_time::incremental::{MAX_REUSE_CANDIDATES, RELEX_BACKOFF_TOKENS};
use crate::config::compile_time::lexical::MAX_TOKEN_COUNT;
use crate::lexical::{scan_token, LexMode, LexicalAnalyzer};
use crate::logging::{codes, Code};
use crate::syntax::cst::{Node, NodeSymbol};
use crate::syntax::recovery::RecoveryTable;
use crate::tokens::{Token, TokenStream};
use crate::utils::SourceMap;
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

/// One replaced byte range: `start_byte..old_end_byte` in the old source
/// became `start_byte..new_end_byte` in the new one
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Edit {
    pub start_byte: usize,
    pub old_end_byte: usize,
    pub new_end_byte: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("Edit range {start}..{end} is inverted")]
    InvertedRange { start: usize, end: usize },

    #[error("Edit ends at byte {end} but the previous source has {len} bytes")]
    OutOfBounds { end: usize, len: usize },

    #[error("Edit implies a new source of {expected} bytes but {actual} were given")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Edit boundary {offset} is not on a character boundary")]
    NotCharBoundary { offset: usize },
}

impl EditError {
    pub fn error_code(&self) -> Code {
        codes::incremental::INVALID_EDIT
    }
}

impl Edit {
    pub fn new(start_byte: usize, old_end_byte: usize, new_end_byte: usize) -> Self {
        Self {
            start_byte,
            old_end_byte,
            new_end_byte,
        }
    }

    /// Replace `range` of `source` with `text`, returning the edit and the
    /// new source
    pub fn replace(source: &str, range: Range<usize>, text: &str) -> (Edit, String) {
        let start = range.start.min(source.len());
        let end = range.end.clamp(start, source.len());
        let mut updated = String::with_capacity(source.len() - (end - start) + text.len());
        updated.push_str(&source[..start]);
        updated.push_str(text);
        updated.push_str(&source[end..]);
        (Edit::new(start, end, start + text.len()), updated)
    }

    /// Change in source length
    pub fn delta(&self) -> isize {
        self.new_end_byte as isize - self.old_end_byte as isize
    }

    /// Check the edit against both versions of the source
    pub fn validate(&self, old_source: &str, new_source: &str) -> Result<(), EditError> {
        if self.old_end_byte < self.start_byte {
            return Err(EditError::InvertedRange {
                start: self.start_byte,
                end: self.old_end_byte,
            });
        }
        if self.new_end_byte < self.start_byte {
            return Err(EditError::InvertedRange {
                start: self.start_byte,
                end: self.new_end_byte,
            });
        }
        if self.old_end_byte > old_source.len() {
            return Err(EditError::OutOfBounds {
                end: self.old_end_byte,
                len: old_source.len(),
            });
        }
        let expected = old_source.len() - (self.old_end_byte - self.start_byte)
            + (self.new_end_byte - self.start_byte);
        if expected != new_source.len() {
            return Err(EditError::LengthMismatch {
                expected,
                actual: new_source.len(),
            });
        }
        for offset in [self.start_byte, self.old_end_byte] {
            if !old_source.is_char_boundary(offset) {
                return Err(EditError::NotCharBoundary { offset });
            }
        }
        for offset in [self.start_byte, self.new_end_byte] {
            if !new_source.is_char_boundary(offset) {
                return Err(EditError::NotCharBoundary { offset });
            }
        }
        Ok(())
    }

    fn shift(&self, offset: usize) -> usize {
        (offset as isize + self.delta()) as usize
    }
}

/// Work saved by a reparse
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ReparseStats {
    pub reused_subtrees: usize,
    pub relexed_tokens: usize,
}

// === RELEXING ===

/// New token stream plus where it differs from the old one, in
/// significant positions
pub(crate) struct Relexed {
    pub tokens: TokenStream,
    pub relexed_tokens: usize,
    /// First position that may differ; the same in both streams
    pub first_changed: usize,
    /// Where the unchanged suffix starts in the old stream
    pub old_resume: usize,
    /// Where the unchanged suffix starts in the new stream
    pub new_resume: usize,
}

/// Rescan from the start of the edited line, backed off a little, until a
/// fresh token starts where a shifted old token started in the same mode
pub(crate) fn relex(previous: &TokenStream, edit: &Edit, source: &str, initial: LexMode) -> Relexed {
    let map = SourceMap::new(source);
    let old = previous.all_tokens();

    let anchor = previous.source_map().line_start(edit.start_byte);
    let first = old
        .partition_point(|t| t.end() < anchor)
        .saturating_sub(RELEX_BACKOFF_TOKENS);
    let (mut offset, mut mode) = match old.get(first) {
        Some(token) => (token.start(), token.mode),
        None => (0, initial),
    };

    let mut tokens: Vec<Token> = old[..first].to_vec();
    let mut relexed_tokens = 0;
    let mut realigned = None;

    while let Some((token, next)) = scan_token(&map, offset, mode) {
        if tokens.len() + 1 >= MAX_TOKEN_COUNT {
            return full_relex(map, initial, previous.len());
        }
        if token.start() >= edit.new_end_byte {
            let old_start = token.start() as isize - edit.delta();
            let found = old.binary_search_by_key(&(old_start as usize), |t| t.start());
            if let Ok(index) = found {
                if index >= first && old[index].mode == mode {
                    realigned = Some(index);
                    break;
                }
            }
        }
        offset = token.end();
        mode = next;
        tokens.push(token);
        relexed_tokens += 1;
    }

    let significant = |slice: &[Token]| slice.iter().filter(|t| !t.is_trivia()).count();
    let first_changed = significant(&old[..first]);
    let fresh_end = tokens.len();
    let old_resume = match realigned {
        Some(index) => {
            for token in &old[index..] {
                let span = map.span(edit.shift(token.start()), edit.shift(token.end()));
                tokens.push(Token::new(token.kind, span, token.mode));
            }
            significant(&old[..index])
        }
        None => previous.len(),
    };
    if tokens.len() + 1 >= MAX_TOKEN_COUNT {
        return full_relex(map, initial, previous.len());
    }
    let new_resume = significant(&tokens[..fresh_end]);

    Relexed {
        tokens: TokenStream::new(tokens, map),
        relexed_tokens,
        first_changed,
        old_resume,
        new_resume,
    }
}

/// Fallback with nothing reusable: no prefix, and a suffix past the old end
fn full_relex(map: SourceMap, initial: LexMode, old_len: usize) -> Relexed {
    let tokens = LexicalAnalyzer::new().tokenize(map, initial);
    let n = tokens.len();
    Relexed {
        relexed_tokens: tokens.all_tokens().len(),
        tokens,
        first_changed: 0,
        old_resume: old_len,
        new_resume: n,
    }
}

// === SUBTREE REUSE ===

/// Old subtrees that may be pushed whole, by start position in the new
/// token stream, largest first
#[derive(Debug, Default)]
pub(crate) struct ReuseIndex {
    by_position: BTreeMap<usize, Vec<Arc<Node>>>,
}

struct Window {
    /// Candidates and their lookahead lie before this old position
    prefix_end: usize,
    /// Candidates start at or after this old position
    suffix_start: usize,
    old_resume: usize,
    new_resume: usize,
    old_len: usize,
}

impl ReuseIndex {
    /// Collects error-free subtrees whose tokens and lookahead are unchanged
    /// and whose positions were parsed without ambiguity
    pub fn build(
        root: &Node,
        ambiguity: &[bool],
        old_tokens: &TokenStream,
        relexed: &Relexed,
        recovery: &RecoveryTable,
    ) -> Self {
        let mut index = Self::default();
        let old_len = old_tokens.len();
        // One statement of trailing context after the relexed region
        let suffix_start = (relexed.old_resume..old_len)
            .find(|&q| match old_tokens.get(q) {
                Some(token) => recovery.is_resync(token.kind, old_tokens.text(q)),
                None => false,
            })
            .unwrap_or(old_len);
        let window = Window {
            prefix_end: relexed.first_changed,
            suffix_start,
            old_resume: relexed.old_resume,
            new_resume: relexed.new_resume,
            old_len,
        };

        let mut position = 0;
        index.collect(root, ambiguity, &window, &mut position);
        for candidates in index.by_position.values_mut() {
            candidates.sort_by(|a, b| b.token_count().cmp(&a.token_count()));
            candidates.truncate(MAX_REUSE_CANDIDATES);
        }
        index
    }

    fn collect(&mut self, node: &Node, ambiguity: &[bool], window: &Window, position: &mut usize) {
        for child in node.children() {
            let first = *position;
            if let Some(start) = Self::reusable_at(child, first, ambiguity, window) {
                self.by_position.entry(start).or_default().push(child.clone());
            }
            // Nothing inside a recovery region is reused
            if child.children().is_empty() || child.is_error() {
                *position += child.token_count();
            } else {
                self.collect(child, ambiguity, window, position);
            }
        }
    }

    fn reusable_at(node: &Node, first: usize, ambiguity: &[bool], window: &Window) -> Option<usize> {
        if !matches!(node.symbol(), NodeSymbol::NonTerminal(_))
            || node.has_error()
            || node.pre_state().is_none()
            || node.token_count() == 0
        {
            return None;
        }
        let lookahead = first + node.token_count();
        let start = if lookahead < window.prefix_end {
            first
        } else if first >= window.suffix_start && lookahead <= window.old_len {
            first - window.old_resume + window.new_resume
        } else {
            return None;
        };
        let clear = ambiguity
            .get(first..=lookahead)
            .is_some_and(|marks| marks.iter().all(|m| !m));
        clear.then_some(start)
    }

    pub fn candidates_at(&self, position: usize) -> &[Arc<Node>] {
        self.by_position
            .get(&position)
            .map(|c| c.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_position.values().map(|c| c.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexical::tokenize;
    use assert_matches::assert_matches;

    #[test]
    fn test_replace_builds_edit_and_source() {
        let (edit, updated) = Edit::replace("set x = 1", 8..9, "42");
        assert_eq!(updated, "set x = 42");
        assert_eq!(edit, Edit::new(8, 9, 10));
        assert_eq!(edit.delta(), 1);
        assert!(edit.validate("set x = 1", &updated).is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_edits() {
        assert_matches!(
            Edit::new(5, 3, 5).validate("abcdef", "abcdef"),
            Err(EditError::InvertedRange { .. })
        );
        assert_matches!(
            Edit::new(0, 10, 0).validate("abc", ""),
            Err(EditError::OutOfBounds { len: 3, .. })
        );
        assert_matches!(
            Edit::new(0, 1, 1).validate("abc", "abcd"),
            Err(EditError::LengthMismatch { expected: 3, actual: 4 })
        );
        assert_matches!(
            Edit::new(1, 1, 2).validate("é", "éx"),
            Err(EditError::NotCharBoundary { offset: 1 })
        );
        assert_eq!(
            Edit::new(0, 1, 1).validate("abc", "abcd").unwrap_err().error_code(),
            codes::incremental::INVALID_EDIT
        );
    }

    #[test]
    fn test_relex_matches_full_tokenization() {
        let old_source = " set x = 1\n write x\n quit\n";
        let cases = [(9..10, "2 + 3"), (0..0, " "), (12..17, "w"), (22..26, "")];
        for (range, text) in cases {
            let previous = tokenize(old_source, LexMode::core());
            let (edit, new_source) = Edit::replace(old_source, range, text);
            let relexed = relex(&previous, &edit, &new_source, LexMode::core());
            let full = tokenize(&new_source, LexMode::core());
            assert_eq!(relexed.tokens.all_tokens(), full.all_tokens(), "{:?}", new_source);
        }
    }

    #[test]
    fn test_relex_stops_after_realigning() {
        let old_source = " set a = 1\n set b = 2\n set c = 3\n set d = 4\n";
        let previous = tokenize(old_source, LexMode::core());
        let (edit, new_source) = Edit::replace(old_source, 20..21, "7");
        let relexed = relex(&previous, &edit, &new_source, LexMode::core());
        assert!(relexed.relexed_tokens < previous.all_tokens().len() / 2);
        assert!(relexed.first_changed <= 5);
        assert_eq!(
            relexed.old_resume as isize - relexed.new_resume as isize,
            0
        );
        assert_eq!(relexed.tokens.len(), previous.len());
    }

    #[test]
    fn test_relex_of_empty_previous_source() {
        let previous = tokenize("", LexMode::expr());
        let (edit, new_source) = Edit::replace("", 0..0, "1+2");
        let relexed = relex(&previous, &edit, &new_source, LexMode::expr());
        assert_eq!(relexed.tokens.len(), 3);
        assert_eq!(relexed.first_changed, 0);
    }
}

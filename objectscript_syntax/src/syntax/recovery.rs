//! Error recovery for the GLR engine
//!
//! Tried in order when no head can move: insert one missing symbol, then
//! skip to the next resynchronization token some stack node accepts, then
//! wrap everything left into one error region. Each step either consumes a
//! token, adds a bounded insertion, or ends the parse, so recovery always
//! terminates.

use crate::compose::{Action, MergedTable, Sym, TermId};
use crate::config::compile_time::syntax::{
    MAX_ERROR_COUNT, MAX_INSERTION_CANDIDATES, MAX_MISSING_INSERTIONS,
};
use crate::grammar::{GrammarId, Terminal};
use crate::logging::codes;
use crate::syntax::cst::{Node, NodeSymbol};
use crate::syntax::engine::{Edge, Engine, Label};
use crate::tokens::TokenKind;
use crate::{log_debug, log_warning};
use std::sync::Arc;

/// Tokens at which skipping stops and parsing is retried
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryTable {
    resync: Vec<Terminal>,
}

impl RecoveryTable {
    pub fn new(resync: Vec<Terminal>) -> Self {
        Self { resync }
    }

    /// Union of the resynchronization tokens of every composed grammar
    pub fn for_table(table: &MergedTable) -> Self {
        let mut resync: Vec<Terminal> = Vec::new();
        for &grammar in table.grammars() {
            for terminal in table.resync(grammar) {
                if !resync.contains(terminal) {
                    resync.push(*terminal);
                }
            }
        }
        Self { resync }
    }

    pub fn with_terminal(mut self, terminal: Terminal) -> Self {
        if !self.resync.contains(&terminal) {
            self.resync.push(terminal);
        }
        self
    }

    pub fn terminals(&self) -> &[Terminal] {
        &self.resync
    }

    pub fn is_resync(&self, kind: TokenKind, text: &str) -> bool {
        let lower = text.to_ascii_lowercase();
        self.resync.iter().any(|t| t.matches(kind, text, &lower))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RecoveryKind {
    /// Tokens skipped starting at an unexpected one
    Skip { found: String },
    /// Input ended before the grammar could accept
    EndOfInput,
    /// Too many recoveries; the rest of the input was not parsed
    Limit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecoveryRecord {
    pub kind: RecoveryKind,
    pub expected: Vec<String>,
}

pub(super) enum Recovery {
    Resume(usize),
    Finished,
}

struct Candidate {
    head: usize,
    symbol: Sym,
    target: u32,
    grammar: GrammarId,
}

impl Engine<'_> {
    pub(super) fn recover(&mut self, p: usize) -> Recovery {
        self.stats.recoveries += 1;

        if self.stats.recoveries > MAX_ERROR_COUNT {
            log_warning!(code = codes::syntax::RECOVERY_LIMIT_REACHED, "Recovery limit reached",
                "limit" => MAX_ERROR_COUNT,
                "position" => p
            );
            self.wrap_to_end(p, RecoveryKind::Limit);
            return Recovery::Finished;
        }

        if self.insertion_allowed(p) {
            if let Some(symbol) = self.insert_missing(p) {
                if self.log_recovery {
                    log_debug!("Inserted missing symbol", "symbol" => symbol.as_str(), "position" => p);
                }
                self.ambiguity[p] = true;
                return Recovery::Resume(p);
            }
        }

        if p < self.n {
            if let Some(q) = self.skip_to_resync(p) {
                if self.log_recovery {
                    log_debug!("Skipped to resynchronization token",
                        "from" => p,
                        "to" => q
                    );
                }
                return Recovery::Resume(q);
            }
        }

        let kind = if p < self.n {
            RecoveryKind::Skip {
                found: self.tokens.text(p).to_string(),
            }
        } else {
            RecoveryKind::EndOfInput
        };
        self.wrap_to_end(p, kind);
        Recovery::Finished
    }

    fn insertion_allowed(&self, p: usize) -> bool {
        if p == self.n {
            self.eof_insertions < MAX_MISSING_INSERTIONS
        } else {
            self.last_insertion != Some(p)
        }
    }

    // === INSERTION ===

    /// Symbols the heads expect next whose successor state can act on the
    /// current token; non-terminals first
    fn insertion_candidates(&self, p: usize) -> Vec<Candidate> {
        let mut nonterminals = Vec::new();
        let mut terminals = Vec::new();
        for &head in &self.frontier {
            let state = self.table.state(self.gss[head].state);
            for item in &state.kernel {
                let production = self.table.production(item.production);
                let Some(&symbol) = production.rhs.get(item.dot as usize) else {
                    continue;
                };
                let from = self.gss[head].state;
                let target = match symbol {
                    Sym::N(nt) => self.table.goto(from, nt),
                    Sym::T(t) if t != crate::compose::EOF => {
                        self.table.actions(from, t).iter().find_map(|a| match a {
                            Action::Shift(s) => Some(*s),
                            _ => None,
                        })
                    }
                    Sym::T(_) => None,
                };
                let Some(target) = target else {
                    continue;
                };
                let candidate = Candidate {
                    head,
                    symbol,
                    target,
                    grammar: production.grammar,
                };
                let bucket = match symbol {
                    Sym::N(_) => &mut nonterminals,
                    Sym::T(_) => &mut terminals,
                };
                if !bucket
                    .iter()
                    .any(|c: &Candidate| c.symbol == symbol && c.head == head)
                {
                    bucket.push(candidate);
                }
            }
        }
        nonterminals.extend(terminals);
        nonterminals.truncate(MAX_INSERTION_CANDIDATES);
        nonterminals.retain(|c| self.acts_on(c.target, &self.terms[p]));
        nonterminals
    }

    fn acts_on(&self, state: u32, terms: &[TermId]) -> bool {
        terms
            .iter()
            .any(|&t| !self.table.actions(state, t).is_empty())
    }

    fn insert_missing(&mut self, p: usize) -> Option<String> {
        let candidate = self.insertion_candidates(p).into_iter().next()?;
        let (kind, symbol) = match candidate.symbol {
            Sym::N(nt) => (
                self.table.symbol_name(candidate.symbol),
                NodeSymbol::NonTerminal(nt),
            ),
            Sym::T(t) => (missing_terminal_kind(self.table.terminal(t)), NodeSymbol::Terminal(t)),
        };
        let node = Arc::new(Node::missing(
            Arc::from(kind.as_str()),
            Some(candidate.grammar),
            symbol,
        ));

        let created = self.push_node(candidate.target, p, p);
        self.gss[created].edges.push(Edge {
            to: candidate.head,
            label: Label {
                node,
                first: p,
                end: p,
            },
        });
        self.reset_frontier(created);

        if p == self.n {
            self.eof_insertions += 1;
        } else {
            self.last_insertion = Some(p);
        }
        Some(kind)
    }

    // === SKIPPING ===

    /// Pops the first head's stack to the top-most node that can act at
    /// the next resynchronization token and parks the popped subtrees and
    /// skipped tokens in one error region
    fn skip_to_resync(&mut self, p: usize) -> Option<usize> {
        let chain = self.first_head_chain();
        for q in p + 1..=self.n {
            let resync = match self.tokens.get(q) {
                Some(token) => self.recovery.is_resync(token.kind, self.tokens.text(q)),
                None => true,
            };
            if !resync {
                continue;
            }
            let Some(depth) = chain
                .iter()
                .position(|&node| self.acts_on(self.gss[node].state, &self.terms[q]))
            else {
                continue;
            };

            let survivor = chain[depth];
            let lo = self.gss[survivor].covered;
            let mut pieces = self.popped_labels(&chain[..depth]);
            pieces.extend((p..q).map(|j| self.skipped_piece(j)));

            let expected = self.expected_here();
            let region = Arc::new(Node::error(self.assemble(lo, &pieces, q)));
            self.regions.insert(lo, (q, region));
            self.records.insert(
                self.tokens.start_byte(lo),
                RecoveryRecord {
                    kind: RecoveryKind::Skip {
                        found: self.tokens.text(p).to_string(),
                    },
                    expected,
                },
            );

            let state = self.gss[survivor].state;
            let edges = self.gss[survivor].edges.clone();
            let copy = self.push_node(state, q, lo);
            self.gss[copy].edges = edges;
            self.reset_frontier(copy);
            self.mark_ambiguous(lo, q);
            return Some(q);
        }
        None
    }

    /// Wraps the first head's whole stack and the remaining tokens into
    /// one error region ending at end of input
    fn wrap_to_end(&mut self, p: usize, kind: RecoveryKind) {
        let chain = self.first_head_chain();
        let Some(&bottom) = chain.last() else {
            return;
        };
        let lo = self.gss[bottom].covered;
        let mut pieces = self.popped_labels(&chain[..chain.len() - 1]);
        pieces.extend((p..self.n).map(|j| self.skipped_piece(j)));

        let expected = self.expected_here();
        let region = Arc::new(Node::error(self.assemble(lo, &pieces, self.n)));
        self.regions.insert(lo, (self.n, region));
        self.records
            .insert(self.tokens.start_byte(lo), RecoveryRecord { kind, expected });
        self.mark_ambiguous(lo.min(p), self.n);
    }

    /// First-edge labels of `nodes` (top first) in source order
    fn popped_labels(&self, nodes: &[usize]) -> Vec<Label> {
        let mut labels: Vec<Label> = nodes
            .iter()
            .filter_map(|&node| self.gss[node].edges.first().map(|e| e.label.clone()))
            .collect();
        labels.reverse();
        labels
    }

    fn expected_here(&self) -> Vec<String> {
        let mut expected: Vec<String> = Vec::new();
        for &head in &self.frontier {
            for name in self.table.expected_symbols(self.gss[head].state) {
                if !expected.contains(&name) {
                    expected.push(name);
                }
            }
        }
        expected.sort();
        expected
    }
}

fn missing_terminal_kind(terminal: Option<Terminal>) -> String {
    match terminal {
        Some(Terminal::Sym(text)) | Some(Terminal::Keyword(text)) => text.to_string(),
        Some(Terminal::Kind(kind)) => kind.name().to_string(),
        Some(Terminal::Command(name)) => format!("keyword_{}", name),
        Some(Terminal::Directive(name)) => format!("#{}", name),
        None => "end".to_string(),
    }
}

//! GLR engine over the merged table
//!
//! The graph-structured stack keeps at most one node per state at each
//! significant position. Edges carry the subtree between two stack nodes.
//! Reductions run to a fixed point before each shift. When an edge is added
//! to a node whose reductions already ran, only the paths through that edge
//! are reduced again.
//!
//! Positions are significant-token indices; `n` is the end-of-input
//! position. Trivia never enters the stack. It is attached while children
//! are assembled, together with error regions left behind by recovery.
//!
//! Hidden helper nodes keep their hidden children nested while the stack is
//! built and are spliced into the first visible ancestor, so left-recursive
//! repetitions assemble in linear time.

use crate::compose::{Action, MergedTable, NonTermId, ProdId, StateId, TermId, EOF};
use crate::grammar::GrammarId;
use crate::logging::codes;
use crate::syntax::cst::{Node, NodeSymbol};
use crate::syntax::incremental::ReuseIndex;
use crate::syntax::recovery::{Recovery, RecoveryRecord, RecoveryTable};
use crate::tokens::TokenStream;
use crate::{log_debug, log_error};
use std::cell::Cell;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Work counters for one parse
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub tokens: usize,
    pub gss_nodes: usize,
    pub max_heads: usize,
    pub recoveries: usize,
    /// Children placed into assembled nodes, spliced helpers included
    pub assembled_children: usize,
}

/// Subtree on a stack edge covering significant positions `first..end`
#[derive(Debug, Clone)]
pub(super) struct Label {
    pub node: Arc<Node>,
    pub first: usize,
    pub end: usize,
}

#[derive(Debug, Clone)]
pub(super) struct Edge {
    pub to: usize,
    pub label: Label,
}

#[derive(Debug, Clone)]
pub(super) struct GssNode {
    pub state: StateId,
    pub position: usize,
    /// End of the input actually covered below this node; behind
    /// `position` when an error region was skipped
    pub covered: usize,
    pub edges: Vec<Edge>,
}

/// Stack as it was before an old subtree was pushed, kept until the token
/// after the subtree shifts
struct ReuseCheckpoint {
    start: usize,
    end: usize,
    frontier: Vec<usize>,
    by_state: HashMap<StateId, usize>,
}

pub(crate) struct EngineInput<'a> {
    pub table: &'a MergedTable,
    pub grammar: GrammarId,
    pub tokens: &'a TokenStream,
    pub recovery: &'a RecoveryTable,
    pub reuse: Option<&'a ReuseIndex>,
    pub log_recovery: bool,
}

pub(crate) struct EngineOutput {
    pub root: Arc<Node>,
    /// One mark per position, end of input included
    pub ambiguity: Vec<bool>,
    pub stats: ParseStats,
    /// Recovery details keyed by the start byte of the region or insertion
    pub records: BTreeMap<usize, RecoveryRecord>,
    pub internal_error: Option<String>,
    pub reused: usize,
}

pub(super) struct Engine<'a> {
    pub(super) table: &'a MergedTable,
    pub(super) grammar: GrammarId,
    pub(super) tokens: &'a TokenStream,
    pub(super) recovery: &'a RecoveryTable,
    reuse: Option<&'a ReuseIndex>,
    pub(super) log_recovery: bool,
    pub(super) n: usize,
    /// Terminals each position's token is an instance of
    pub(super) terms: Vec<Vec<TermId>>,
    pub(super) gss: Vec<GssNode>,
    pub(super) frontier: Vec<usize>,
    pub(super) by_state: HashMap<StateId, usize>,
    /// Error regions by first position: (end position, ERROR node)
    pub(super) regions: BTreeMap<usize, (usize, Arc<Node>)>,
    leaves: HashMap<(usize, TermId), Arc<Node>>,
    pub(super) ambiguity: Vec<bool>,
    pub(super) records: BTreeMap<usize, RecoveryRecord>,
    pub(super) stats: ParseStats,
    pub(super) last_insertion: Option<usize>,
    pub(super) eof_insertions: usize,
    reused: usize,
    checkpoint: Option<ReuseCheckpoint>,
    /// No reuse before this position after a reused subtree was abandoned
    reuse_blocked_until: usize,
    assembled: Cell<usize>,
}

pub(crate) fn run(input: EngineInput<'_>) -> EngineOutput {
    let mut engine = Engine::new(&input);

    let Some(entry) = input.table.entry(input.grammar) else {
        let message = format!("no entry state for grammar '{}'", input.grammar);
        log_error!(codes::syntax::INTERNAL_PARSER_ERROR, "Parse table has no entry for grammar",
            "grammar" => input.grammar
        );
        let root = engine.degraded_root();
        return engine.finish(root, Some(message));
    };

    if engine.n == 0 {
        let root = engine.finish_root(None);
        return engine.finish(root, None);
    }

    let start = engine.push_node(entry.state, 0, 0);
    engine.frontier = vec![start];
    engine.by_state.insert(entry.state, start);

    let mut p = 0;
    let mut reduced = false;
    let root = loop {
        if !reduced {
            engine.reduce_all(p);
            engine.stats.max_heads = engine.stats.max_heads.max(engine.frontier.len());
        }
        reduced = false;

        if p == engine.n {
            if let Some(label) = engine.accepting_label() {
                break engine.finish_root(Some(label));
            }
        } else {
            if let Some(next) = engine.try_reuse(p) {
                p = next;
                continue;
            }
            if engine.shift(p) {
                engine.checkpoint = None;
                p += 1;
                continue;
            }
        }

        // A full parse would recover with the subtree's inner heads still
        // on the stack, so parse those tokens again instead
        if let Some(start) = engine.undo_reuse(p) {
            p = start;
            reduced = true;
            continue;
        }

        match engine.recover(p) {
            Recovery::Resume(next) => p = next,
            Recovery::Finished => break engine.finish_root(None),
        }
    };
    engine.finish(root, None)
}

impl<'a> Engine<'a> {
    fn new(input: &EngineInput<'a>) -> Self {
        let n = input.tokens.len();
        let mut terms: Vec<Vec<TermId>> = input
            .tokens
            .iter_significant()
            .map(|t| {
                input
                    .table
                    .terminals_for(t.kind, t.text(input.tokens.source()))
            })
            .collect();
        terms.push(vec![EOF]);

        Self {
            table: input.table,
            grammar: input.grammar,
            tokens: input.tokens,
            recovery: input.recovery,
            reuse: input.reuse,
            log_recovery: input.log_recovery,
            n,
            terms,
            gss: Vec::new(),
            frontier: Vec::new(),
            by_state: HashMap::new(),
            regions: BTreeMap::new(),
            leaves: HashMap::new(),
            ambiguity: vec![false; n + 1],
            records: BTreeMap::new(),
            stats: ParseStats {
                tokens: n,
                ..ParseStats::default()
            },
            last_insertion: None,
            eof_insertions: 0,
            reused: 0,
            checkpoint: None,
            reuse_blocked_until: 0,
            assembled: Cell::new(0),
        }
    }

    fn finish(self, root: Arc<Node>, internal_error: Option<String>) -> EngineOutput {
        EngineOutput {
            root,
            ambiguity: self.ambiguity,
            stats: ParseStats {
                gss_nodes: self.gss.len(),
                assembled_children: self.assembled.get(),
                ..self.stats
            },
            records: self.records,
            internal_error,
            reused: self.reused,
        }
    }

    pub(super) fn push_node(&mut self, state: StateId, position: usize, covered: usize) -> usize {
        self.gss.push(GssNode {
            state,
            position,
            covered,
            edges: Vec::new(),
        });
        self.gss.len() - 1
    }

    /// Starts a new frontier holding only `node`
    pub(super) fn reset_frontier(&mut self, node: usize) {
        self.frontier = vec![node];
        self.by_state.clear();
        self.by_state.insert(self.gss[node].state, node);
    }

    // === REDUCER ===

    fn reductions(&self, node: usize, p: usize) -> Vec<ProdId> {
        let state = self.gss[node].state;
        let mut out: Vec<ProdId> = Vec::new();
        for &t in &self.terms[p] {
            for action in self.table.actions(state, t) {
                if let Action::Reduce(production) = *action {
                    if !out.contains(&production) {
                        out.push(production);
                    }
                }
            }
        }
        out
    }

    pub(super) fn reduce_all(&mut self, p: usize) {
        let mut queue: VecDeque<(usize, ProdId, Option<usize>)> = VecDeque::new();
        let mut seen: HashSet<(usize, ProdId, Option<usize>)> = HashSet::new();
        let mut done: HashSet<(usize, ProdId)> = HashSet::new();
        let mut merged = false;

        for i in 0..self.frontier.len() {
            let node = self.frontier[i];
            for production in self.reductions(node, p) {
                if seen.insert((node, production, None)) {
                    queue.push_back((node, production, None));
                }
            }
        }

        while let Some((node, production, via)) = queue.pop_front() {
            if via.is_none() {
                done.insert((node, production));
            }
            let (lhs, length) = {
                let prod = self.table.production(production);
                (prod.lhs, prod.rhs.len())
            };

            for (bottom, labels) in self.paths(node, length, via) {
                let below = self.gss[bottom].state;
                let Some(target) = self.table.goto(below, lhs) else {
                    continue;
                };
                let label = self.reduce_labels(production, lhs, &labels, below);

                match self.by_state.get(&target).copied() {
                    Some(existing) => {
                        let edges = &mut self.gss[existing].edges;
                        if let Some(edge) = edges.iter_mut().find(|e| e.to == bottom) {
                            // Earlier-declared production wins; ties keep the first built
                            if label.node.production() < edge.label.node.production() {
                                edge.label = label;
                            }
                            merged = true;
                            continue;
                        }
                        edges.push(Edge { to: bottom, label });
                        let edge = edges.len() - 1;
                        // Two paths now meet in one node
                        merged = true;
                        for next in self.reductions(existing, p) {
                            let key = (existing, next, Some(edge));
                            if done.contains(&(existing, next)) && seen.insert(key) {
                                queue.push_back(key);
                            }
                        }
                    }
                    None => {
                        let created = self.push_node(target, p, label.end);
                        self.gss[created].edges.push(Edge { to: bottom, label });
                        self.frontier.push(created);
                        self.by_state.insert(target, created);
                        for next in self.reductions(created, p) {
                            if seen.insert((created, next, None)) {
                                queue.push_back((created, next, None));
                            }
                        }
                    }
                }
            }
        }

        if merged {
            self.ambiguity[p] = true;
        }
    }

    /// Every path of `length` edges down from `node`, as (bottom, labels in
    /// source order). `via` restricts the first edge taken.
    fn paths(&self, node: usize, length: usize, via: Option<usize>) -> Vec<(usize, Vec<Label>)> {
        let mut out = Vec::new();
        let mut labels = Vec::with_capacity(length);
        self.walk_paths(node, length, via, &mut labels, &mut out);
        out
    }

    fn walk_paths(
        &self,
        node: usize,
        remaining: usize,
        via: Option<usize>,
        labels: &mut Vec<Label>,
        out: &mut Vec<(usize, Vec<Label>)>,
    ) {
        if remaining == 0 {
            let mut ordered = labels.clone();
            ordered.reverse();
            out.push((node, ordered));
            return;
        }
        for (index, edge) in self.gss[node].edges.iter().enumerate() {
            if via.is_some_and(|v| v != index) {
                continue;
            }
            labels.push(edge.label.clone());
            self.walk_paths(edge.to, remaining - 1, None, labels, out);
            labels.pop();
        }
    }

    fn reduce_labels(
        &self,
        production: ProdId,
        lhs: NonTermId,
        labels: &[Label],
        pre_state: StateId,
    ) -> Label {
        let first = labels.first().map(|l| l.first).unwrap_or(0);
        let end = labels.last().map(|l| l.end).unwrap_or(first);
        let nonterminal = self.table.nonterminal(lhs);
        let children = self.assemble_with(first, labels, end, !nonterminal.hidden);
        let node = Node::internal(
            nonterminal.name.clone(),
            nonterminal.grammar,
            lhs,
            production,
            pre_state,
            children,
        );
        Label {
            node: Arc::new(node),
            first,
            end,
        }
    }

    // === SHIFTER ===

    fn shift(&mut self, p: usize) -> bool {
        let mut next: Vec<usize> = Vec::new();
        let mut next_by_state: HashMap<StateId, usize> = HashMap::new();
        let mut shifts = 0;

        for i in 0..self.frontier.len() {
            let node = self.frontier[i];
            let state = self.gss[node].state;
            let mut action_count = 0;
            for t_index in 0..self.terms[p].len() {
                let terminal = self.terms[p][t_index];
                let actions = self.table.actions(state, terminal);
                action_count += actions.len();
                for action in actions {
                    let Action::Shift(target) = *action else {
                        continue;
                    };
                    shifts += 1;
                    let leaf = self.leaf(p, terminal, target);
                    let label = Label {
                        node: leaf,
                        first: p,
                        end: p + 1,
                    };
                    match next_by_state.get(&target).copied() {
                        Some(existing) => {
                            if !self.gss[existing].edges.iter().any(|e| e.to == node) {
                                self.gss[existing].edges.push(Edge { to: node, label });
                            }
                        }
                        None => {
                            let created = self.push_node(target, p + 1, p + 1);
                            self.gss[created].edges.push(Edge { to: node, label });
                            next.push(created);
                            next_by_state.insert(target, created);
                        }
                    }
                }
            }
            if action_count > 1 {
                self.ambiguity[p] = true;
            }
        }
        if shifts > 1 {
            self.ambiguity[p] = true;
        }
        if next.is_empty() {
            return false;
        }
        self.frontier = next;
        self.by_state = next_by_state;
        true
    }

    fn leaf(&mut self, p: usize, terminal: TermId, target: StateId) -> Arc<Node> {
        if let Some(leaf) = self.leaves.get(&(p, terminal)) {
            return leaf.clone();
        }
        let (kind, named) = match (self.tokens.get(p), self.table.terminal(terminal)) {
            (Some(token), Some(t)) => t.leaf_kind(token.kind, self.tokens.text(p)),
            _ => (String::from("end"), false),
        };
        let grammar = self
            .table
            .state(target)
            .kernel
            .first()
            .map(|item| self.table.production(item.production).grammar);
        let length = self.tokens.get(p).map(|t| t.len()).unwrap_or(0);
        let leaf = Arc::new(Node::leaf(Arc::from(kind), named, grammar, terminal, length));
        self.leaves.insert((p, terminal), leaf.clone());
        leaf
    }

    // === REUSE ===

    /// Pushes an old subtree as one goto when the stack is in the state the
    /// subtree was built on and nothing else could shift here
    fn try_reuse(&mut self, p: usize) -> Option<usize> {
        let index = self.reuse?;
        if p < self.reuse_blocked_until {
            return None;
        }
        let candidates = index.candidates_at(p);
        if candidates.is_empty() || self.terms[p].len() != 1 {
            return None;
        }
        let terminal = self.terms[p][0];

        let mut shifter = None;
        for &node in &self.frontier {
            let actions = self.table.actions(self.gss[node].state, terminal);
            if actions.iter().any(|a| matches!(a, Action::Shift(_))) {
                if shifter.is_some() || actions.len() != 1 {
                    return None;
                }
                shifter = Some(node);
            }
        }
        let node = shifter?;
        let state = self.gss[node].state;

        for candidate in candidates {
            if candidate.pre_state() != Some(state) {
                continue;
            }
            let NodeSymbol::NonTerminal(lhs) = candidate.symbol() else {
                continue;
            };
            let Some(target) = self.table.goto(state, lhs) else {
                continue;
            };
            let end = p + candidate.token_count();
            if end > self.n || end == p {
                continue;
            }
            self.checkpoint = Some(ReuseCheckpoint {
                start: p,
                end,
                frontier: self.frontier.clone(),
                by_state: self.by_state.clone(),
            });
            let created = self.push_node(target, end, end);
            self.gss[created].edges.push(Edge {
                to: node,
                label: Label {
                    node: candidate.clone(),
                    first: p,
                    end,
                },
            });
            self.reset_frontier(created);
            self.reused += 1;
            log_debug!("Reused subtree",
                "kind" => candidate.kind(),
                "position" => p,
                "tokens" => candidate.token_count()
            );
            return Some(end);
        }
        None
    }

    /// Restores the stack saved before the last reused subtree when the
    /// parse cannot continue right after it. Returns where to resume.
    fn undo_reuse(&mut self, p: usize) -> Option<usize> {
        let checkpoint = self.checkpoint.take()?;
        if checkpoint.end != p {
            return None;
        }
        self.frontier = checkpoint.frontier;
        self.by_state = checkpoint.by_state;
        self.reused -= 1;
        self.reuse_blocked_until = p;
        log_debug!("Abandoned reused subtree",
            "position" => checkpoint.start,
            "lookahead" => p
        );
        Some(checkpoint.start)
    }

    // === ACCEPT ===

    fn accepting_label(&self) -> Option<Label> {
        for &node in &self.frontier {
            let accepts = self
                .table
                .actions(self.gss[node].state, EOF)
                .contains(&Action::Accept);
            if !accepts {
                continue;
            }
            let mut best: Option<&Edge> = None;
            for edge in &self.gss[node].edges {
                if best.map_or(true, |b| edge.label.first < b.label.first) {
                    best = Some(edge);
                }
            }
            if let Some(edge) = best {
                return Some(edge.label.clone());
            }
        }
        None
    }

    // === TREE ASSEMBLY ===

    /// Root covering every token: leading trivia, the accepted subtree or
    /// error regions, trailing trivia
    pub(super) fn finish_root(&self, accepted: Option<Label>) -> Arc<Node> {
        let mut children = Vec::new();
        self.push_trivia(0, &mut children);
        if self.n > 0 {
            let pieces: Vec<Label> = accepted.into_iter().collect();
            children.extend(self.assemble(0, &pieces, self.n));
            self.push_trivia(self.n, &mut children);
        }
        Arc::new(Node::root(self.grammar, children))
    }

    fn degraded_root(&self) -> Arc<Node> {
        let mut children = Vec::new();
        self.push_trivia(0, &mut children);
        if self.n > 0 {
            self.fill_gap(0, self.n, 0, &mut children);
            self.push_trivia(self.n, &mut children);
        }
        Arc::new(Node::root(self.grammar, children))
    }

    /// Children for `pieces` spanning positions `lo..hi`. Trivia goes before
    /// every token-bearing piece except one starting at `lo`; zero-width
    /// pieces sit right after the previous child.
    pub(super) fn assemble(&self, lo: usize, pieces: &[Label], hi: usize) -> Vec<Arc<Node>> {
        self.assemble_with(lo, pieces, hi, true)
    }

    /// As [`Engine::assemble`]; `splice` is false while building a hidden
    /// helper, whose hidden children stay nested until a visible ancestor
    /// takes them
    fn assemble_with(&self, lo: usize, pieces: &[Label], hi: usize, splice: bool) -> Vec<Arc<Node>> {
        let mut out = Vec::new();
        let mut cursor = lo;
        for piece in pieces {
            if piece.first > cursor {
                self.fill_gap(cursor, piece.first, lo, &mut out);
                cursor = piece.first;
            }
            if piece.first < piece.end && piece.first > lo {
                self.push_trivia(piece.first, &mut out);
            }
            if splice {
                self.push_child(&piece.node, &mut out);
            } else {
                out.push(piece.node.clone());
            }
            cursor = cursor.max(piece.end);
        }
        if hi > cursor {
            self.fill_gap(cursor, hi, lo, &mut out);
        }
        self.assembled.set(self.assembled.get() + out.len());
        out
    }

    /// Positions `a..b` no piece covers: a recorded error region if one
    /// spans exactly that, otherwise an ERROR node over what is there
    fn fill_gap(&self, a: usize, b: usize, lo: usize, out: &mut Vec<Arc<Node>>) {
        if a > lo {
            self.push_trivia(a, out);
        }
        if let Some((end, region)) = self.regions.get(&a) {
            if *end == b {
                out.push(region.clone());
                return;
            }
        }
        let mut pieces = Vec::new();
        let mut j = a;
        while j < b {
            match self.regions.get(&j) {
                Some((end, region)) if *end <= b && *end > j => {
                    pieces.push(Label {
                        node: region.clone(),
                        first: j,
                        end: *end,
                    });
                    j = *end;
                }
                _ => {
                    pieces.push(self.skipped_piece(j));
                    j += 1;
                }
            }
        }
        out.push(Arc::new(Node::error(self.assemble(a, &pieces, b))));
    }

    pub(super) fn skipped_piece(&self, p: usize) -> Label {
        let node = match self.tokens.get(p) {
            Some(token) => Node::skipped(token.kind, token.len()),
            None => Node::error(Vec::new()),
        };
        Label {
            node: Arc::new(node),
            first: p,
            end: p + 1,
        }
    }

    fn push_trivia(&self, p: usize, out: &mut Vec<Arc<Node>>) {
        let range = self.tokens.leading_trivia(p);
        for token in &self.tokens.all_tokens()[range] {
            out.push(Arc::new(Node::extra(token.kind, token.len())));
        }
    }

    fn is_hidden(&self, node: &Node) -> bool {
        match node.symbol() {
            NodeSymbol::NonTerminal(id) => self.table.nonterminal(id).hidden && !node.is_missing(),
            _ => false,
        }
    }

    /// Pushes `node`, or the visible nodes under it when it is a hidden
    /// helper, however deeply helpers nest
    fn push_child(&self, node: &Arc<Node>, out: &mut Vec<Arc<Node>>) {
        if !self.is_hidden(node) {
            out.push(node.clone());
            return;
        }
        let mut stack = vec![node.children().iter()];
        while let Some(top) = stack.last_mut() {
            match top.next() {
                Some(child) if self.is_hidden(child) => stack.push(child.children().iter()),
                Some(child) => out.push(child.clone()),
                None => {
                    stack.pop();
                }
            }
        }
    }

    // === RECOVERY SUPPORT ===

    /// Stack nodes down the first edge of the first head, top first
    pub(super) fn first_head_chain(&self) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut current = self.frontier.first().copied();
        while let Some(node) = current {
            chain.push(node);
            current = self.gss[node].edges.first().map(|e| e.to);
        }
        chain
    }

    pub(super) fn mark_ambiguous(&mut self, from: usize, to: usize) {
        let last = to.min(self.n);
        for mark in self.ambiguity.iter_mut().take(last + 1).skip(from) {
            *mark = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::compose_grammars;
    use crate::lexical::{tokenize, LexMode};
    use crate::syntax::cst::NodeRef;
    use crate::syntax::test_grammars;

    fn calc() -> Arc<MergedTable> {
        compose_grammars(&[test_grammars::calc()]).unwrap()
    }

    fn parse(table: &MergedTable, source: &str) -> (EngineOutput, String) {
        let tokens = tokenize(source, LexMode::expr());
        let recovery = RecoveryTable::for_table(table);
        let output = run(EngineInput {
            table,
            grammar: test_grammars::CALC,
            tokens: &tokens,
            recovery: &recovery,
            reuse: None,
            log_recovery: false,
        });
        let sexp = NodeRef::root(&output.root, source).to_sexp();
        (output, sexp)
    }

    #[test]
    fn test_precedence_shapes_tree() {
        let table = calc();
        let (output, sexp) = parse(&table, "1 + 2 * 3");
        assert_eq!(
            sexp,
            "(source_file (sum (number) (product (number) (number))))"
        );
        assert_eq!(output.root.byte_len(), 9);
        assert!(!output.root.has_error());
        assert_eq!(output.stats.recoveries, 0);
    }

    #[test]
    fn test_left_associativity() {
        let table = calc();
        let (_, sexp) = parse(&table, "1+2+3");
        assert_eq!(sexp, "(source_file (sum (sum (number) (number)) (number)))");
    }

    #[test]
    fn test_trivia_attached_to_root_edges() {
        let table = calc();
        let (output, _) = parse(&table, "  (1)  ");
        let kinds: Vec<&str> = output.root.children().iter().map(|c| c.kind()).collect();
        assert_eq!(kinds, vec!["whitespace", "(", "number", ")", "whitespace"]);
        assert_eq!(output.root.byte_len(), 7);
    }

    #[test]
    fn test_missing_operand_is_inserted() {
        let table = calc();
        let (output, sexp) = parse(&table, "1 +");
        assert_eq!(sexp, "(source_file (sum (number) (MISSING e)))");
        assert!(output.root.has_error());
        assert_eq!(output.root.byte_len(), 3);
    }

    #[test]
    fn test_unexpected_tokens_become_error_region() {
        let table = calc();
        let (output, sexp) = parse(&table, "1 ) + 2");
        assert!(sexp.contains("ERROR"), "{}", sexp);
        assert_eq!(output.root.byte_len(), 7);
        assert!(output.stats.recoveries >= 1);
    }

    #[test]
    fn test_empty_input() {
        let table = calc();
        let (output, sexp) = parse(&table, "");
        assert_eq!(sexp, "(source_file)");
        assert!(output.root.children().is_empty());
        assert_eq!(output.ambiguity.len(), 1);
    }
}

//! Merged parse table
//!
//! One LR(0) automaton over the productions of every composed grammar, with
//! SLR(1) lookaheads and one augmented start state per grammar. Shift/reduce
//! conflicts settled by precedence or by a directive are pruned here; the
//! rest stay as multiple actions for the GLR engine.

use crate::grammar::precedence::{resolve, Resolution};
use crate::grammar::{ConflictDirective, GrammarId, Prec, PrecedenceTable, Terminal};
use crate::lexical::keywords;
use crate::logging::codes;
use crate::tokens::TokenKind;
use crate::{log_debug, log_success};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

pub type TermId = u32;
pub type NonTermId = u32;
pub type ProdId = u32;
pub type StateId = u32;

/// End of input
pub const EOF: TermId = 0;

/// Right-hand-side symbol after composition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sym {
    T(TermId),
    N(NonTermId),
}

#[derive(Debug, Clone)]
pub struct NonTerminal {
    /// `grammar::rule`
    pub qualified: String,
    /// Node kind in the tree
    pub name: Arc<str>,
    pub grammar: GrammarId,
    pub hidden: bool,
    /// Synthetic `S'` of a grammar entry
    pub augmented: bool,
}

#[derive(Debug, Clone)]
pub struct Production {
    pub lhs: NonTermId,
    pub rhs: Vec<Sym>,
    pub grammar: GrammarId,
    pub prec: Option<Prec>,
    pub directive: Option<ConflictDirective>,
    pub binary: bool,
}

/// Ordered so that a shift sorts before reductions, and reductions by
/// declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    Shift(StateId),
    Reduce(ProdId),
    Accept,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Item {
    pub production: ProdId,
    pub dot: u16,
}

#[derive(Debug, Clone, Default)]
pub struct State {
    pub kernel: Vec<Item>,
    pub actions: BTreeMap<TermId, Vec<Action>>,
    pub gotos: BTreeMap<NonTermId, StateId>,
}

/// Start of one grammar in the merged automaton
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub grammar: GrammarId,
    pub state: StateId,
    pub start: NonTermId,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStats {
    pub states: usize,
    pub productions: usize,
    /// (state, terminal) cells left with several actions
    pub conflicts_kept: usize,
    /// Shift/reduce pairs settled by precedence or directive
    pub conflicts_pruned: usize,
}

/// Grammars lowered onto shared symbol indices, ready for table construction
#[derive(Debug, Default)]
pub(crate) struct Lowered {
    pub grammars: Vec<GrammarId>,
    /// `TermId` is the index plus one; zero is end of input
    pub terminals: Vec<Terminal>,
    pub nonterminals: Vec<NonTerminal>,
    pub productions: Vec<Production>,
    /// Grammar, augmented production, start non-terminal
    pub entries: Vec<(GrammarId, ProdId, NonTermId)>,
    pub resync: BTreeMap<GrammarId, Vec<Terminal>>,
    pub precedence: PrecedenceTable,
    pub local_precedence: BTreeMap<GrammarId, BTreeMap<String, usize>>,
}

impl Lowered {
    pub fn intern_terminal(&mut self, terminal: Terminal) -> TermId {
        match self.terminals.iter().position(|t| *t == terminal) {
            Some(index) => index as TermId + 1,
            None => {
                self.terminals.push(terminal);
                self.terminals.len() as TermId
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
struct TerminalIndex {
    kinds: BTreeMap<TokenKind, TermId>,
    syms: HashMap<String, TermId>,
    keywords: HashMap<&'static str, TermId>,
    commands: Vec<(&'static str, TermId)>,
    directives: HashMap<&'static str, TermId>,
}

impl TerminalIndex {
    fn new(terminals: &[Terminal]) -> Self {
        let mut index = Self::default();
        for (i, terminal) in terminals.iter().enumerate() {
            let id = i as TermId + 1;
            match *terminal {
                Terminal::Kind(kind) => {
                    index.kinds.insert(kind, id);
                }
                Terminal::Sym(text) => {
                    index.syms.insert(text.to_ascii_lowercase(), id);
                }
                Terminal::Keyword(word) => {
                    index.keywords.insert(word, id);
                }
                Terminal::Command(name) => index.commands.push((name, id)),
                Terminal::Directive(name) => {
                    index.directives.insert(name, id);
                }
            }
        }
        index
    }
}

/// Fixed-size set of terminal ids
#[derive(Debug, Clone, PartialEq, Eq)]
struct TermSet {
    words: Vec<u64>,
}

impl TermSet {
    fn new(size: usize) -> Self {
        Self {
            words: vec![0; size / 64 + 1],
        }
    }

    fn insert(&mut self, id: TermId) -> bool {
        let (word, bit) = (id as usize / 64, id as usize % 64);
        let before = self.words[word];
        self.words[word] |= 1 << bit;
        before != self.words[word]
    }

    fn union(&mut self, other: &TermSet) -> bool {
        let mut changed = false;
        for (mine, theirs) in self.words.iter_mut().zip(&other.words) {
            let merged = *mine | *theirs;
            changed |= merged != *mine;
            *mine = merged;
        }
        changed
    }

    fn iter(&self) -> impl Iterator<Item = TermId> + '_ {
        self.words.iter().enumerate().flat_map(|(w, &bits)| {
            (0..64)
                .filter(move |b| bits & (1u64 << b) != 0)
                .map(move |b| (w * 64 + b) as TermId)
        })
    }
}

/// Immutable parse table shared by every parse of a language
#[derive(Debug)]
pub struct MergedTable {
    grammars: Vec<GrammarId>,
    terminals: Vec<Terminal>,
    nonterminals: Vec<NonTerminal>,
    productions: Vec<Production>,
    states: Vec<State>,
    entries: BTreeMap<GrammarId, Entry>,
    resync: BTreeMap<GrammarId, Vec<Terminal>>,
    precedence: PrecedenceTable,
    local_precedence: BTreeMap<GrammarId, BTreeMap<String, usize>>,
    index: TerminalIndex,
    stats: TableStats,
}

impl MergedTable {
    pub(crate) fn build(lowered: Lowered, log_conflicts: bool) -> Self {
        let index = TerminalIndex::new(&lowered.terminals);
        let mut table = MergedTable {
            grammars: lowered.grammars,
            terminals: lowered.terminals,
            nonterminals: lowered.nonterminals,
            productions: lowered.productions,
            states: Vec::new(),
            entries: BTreeMap::new(),
            resync: lowered.resync,
            precedence: lowered.precedence,
            local_precedence: lowered.local_precedence,
            index,
            stats: TableStats::default(),
        };

        let by_lhs = table.productions_by_lhs();
        let first = table.first_sets(&by_lhs);
        let follow = table.follow_sets(&first, &lowered.entries);
        table.build_states(&by_lhs, &lowered.entries);
        table.fill_actions(&by_lhs, &follow, log_conflicts);

        table.stats.states = table.states.len();
        table.stats.productions = table.productions.len();
        log_success!(codes::success::TABLE_CONSTRUCTION_COMPLETE, "Parse table constructed",
            "states" => table.stats.states,
            "productions" => table.stats.productions,
            "conflicts_kept" => table.stats.conflicts_kept,
            "conflicts_pruned" => table.stats.conflicts_pruned
        );
        table
    }

    /// Table with no grammars; every parse against it degrades to an error root
    pub(crate) fn empty() -> Self {
        Self::build(Lowered::default(), false)
    }

    // === CONSTRUCTION ===

    fn productions_by_lhs(&self) -> Vec<Vec<ProdId>> {
        let mut by_lhs = vec![Vec::new(); self.nonterminals.len()];
        for (id, production) in self.productions.iter().enumerate() {
            by_lhs[production.lhs as usize].push(id as ProdId);
        }
        by_lhs
    }

    /// FIRST of every non-terminal; productions are never empty
    fn first_sets(&self, by_lhs: &[Vec<ProdId>]) -> Vec<TermSet> {
        let size = self.terminals.len() + 1;
        let mut first = vec![TermSet::new(size); self.nonterminals.len()];
        let mut changed = true;
        while changed {
            changed = false;
            for (lhs, productions) in by_lhs.iter().enumerate() {
                for &p in productions {
                    match self.productions[p as usize].rhs.first() {
                        Some(Sym::T(t)) => changed |= first[lhs].insert(*t),
                        Some(Sym::N(n)) if *n as usize != lhs => {
                            let other = first[*n as usize].clone();
                            changed |= first[lhs].union(&other);
                        }
                        _ => {}
                    }
                }
            }
        }
        first
    }

    fn follow_sets(
        &self,
        first: &[TermSet],
        entries: &[(GrammarId, ProdId, NonTermId)],
    ) -> Vec<TermSet> {
        let size = self.terminals.len() + 1;
        let mut follow = vec![TermSet::new(size); self.nonterminals.len()];
        for &(_, augmented, _) in entries {
            let lhs = self.productions[augmented as usize].lhs;
            follow[lhs as usize].insert(EOF);
        }
        let mut changed = true;
        while changed {
            changed = false;
            for production in &self.productions {
                for (i, symbol) in production.rhs.iter().enumerate() {
                    let Sym::N(n) = *symbol else {
                        continue;
                    };
                    let addition = match production.rhs.get(i + 1) {
                        Some(Sym::T(t)) => {
                            changed |= follow[n as usize].insert(*t);
                            continue;
                        }
                        Some(Sym::N(next)) => first[*next as usize].clone(),
                        None => follow[production.lhs as usize].clone(),
                    };
                    changed |= follow[n as usize].union(&addition);
                }
            }
        }
        follow
    }

    fn closure(&self, kernel: &[Item], by_lhs: &[Vec<ProdId>]) -> Vec<Item> {
        let mut items: Vec<Item> = kernel.to_vec();
        let mut added: BTreeSet<NonTermId> = BTreeSet::new();
        let mut i = 0;
        while i < items.len() {
            let item = items[i];
            i += 1;
            let production = &self.productions[item.production as usize];
            if let Some(Sym::N(n)) = production.rhs.get(item.dot as usize) {
                if added.insert(*n) {
                    for &p in &by_lhs[*n as usize] {
                        items.push(Item {
                            production: p,
                            dot: 0,
                        });
                    }
                }
            }
        }
        items
    }

    fn build_states(&mut self, by_lhs: &[Vec<ProdId>], entries: &[(GrammarId, ProdId, NonTermId)]) {
        let mut known: HashMap<Vec<Item>, StateId> = HashMap::new();
        let mut queue: VecDeque<StateId> = VecDeque::new();

        for &(grammar, augmented, start) in entries {
            let kernel = vec![Item {
                production: augmented,
                dot: 0,
            }];
            let state = self.intern_state(kernel, &mut known, &mut queue);
            self.entries.insert(
                grammar,
                Entry {
                    grammar,
                    state,
                    start,
                },
            );
        }

        while let Some(state) = queue.pop_front() {
            let items = self.closure(&self.states[state as usize].kernel, by_lhs);
            let mut transitions: BTreeMap<Sym, Vec<Item>> = BTreeMap::new();
            for item in items {
                let production = &self.productions[item.production as usize];
                if let Some(symbol) = production.rhs.get(item.dot as usize) {
                    transitions.entry(*symbol).or_default().push(Item {
                        production: item.production,
                        dot: item.dot + 1,
                    });
                }
            }
            for (symbol, mut kernel) in transitions {
                kernel.sort();
                kernel.dedup();
                let target = self.intern_state(kernel, &mut known, &mut queue);
                match symbol {
                    Sym::T(t) => {
                        self.states[state as usize]
                            .actions
                            .entry(t)
                            .or_default()
                            .push(Action::Shift(target));
                    }
                    Sym::N(n) => {
                        self.states[state as usize].gotos.insert(n, target);
                    }
                }
            }
        }
    }

    fn intern_state(
        &mut self,
        kernel: Vec<Item>,
        known: &mut HashMap<Vec<Item>, StateId>,
        queue: &mut VecDeque<StateId>,
    ) -> StateId {
        if let Some(&id) = known.get(&kernel) {
            return id;
        }
        let id = self.states.len() as StateId;
        known.insert(kernel.clone(), id);
        self.states.push(State {
            kernel,
            ..State::default()
        });
        queue.push_back(id);
        id
    }

    fn fill_actions(&mut self, by_lhs: &[Vec<ProdId>], follow: &[TermSet], log_conflicts: bool) {
        for state in 0..self.states.len() {
            let items = self.closure(&self.states[state].kernel, by_lhs);
            let mut actions = std::mem::take(&mut self.states[state].actions);
            for item in items {
                let production = &self.productions[item.production as usize];
                if (item.dot as usize) < production.rhs.len() {
                    continue;
                }
                if self.nonterminals[production.lhs as usize].augmented {
                    actions.entry(EOF).or_default().push(Action::Accept);
                    continue;
                }
                for t in follow[production.lhs as usize].iter() {
                    actions
                        .entry(t)
                        .or_default()
                        .push(Action::Reduce(item.production));
                }
            }

            for (&terminal, cell) in actions.iter_mut() {
                cell.sort();
                cell.dedup();
                self.prune_conflicts(terminal, cell);
                if cell.len() > 1 {
                    self.stats.conflicts_kept += 1;
                    if log_conflicts {
                        log_debug!("Conflict kept for GLR",
                            "state" => state,
                            "terminal" => self.terminal_name(terminal),
                            "actions" => cell.len()
                        );
                    }
                }
            }
            actions.retain(|_, cell| !cell.is_empty());
            self.states[state].actions = actions;
        }
    }

    /// Settles shift/reduce pairs in one cell by precedence, then directive
    fn prune_conflicts(&mut self, terminal: TermId, cell: &mut Vec<Action>) {
        let Some(shift_at) = cell.iter().position(|a| matches!(a, Action::Shift(_))) else {
            return;
        };
        let mut keep_shift = true;
        let mut dropped: Vec<Action> = Vec::new();
        for action in cell.iter() {
            let Action::Reduce(p) = *action else {
                continue;
            };
            let production = &self.productions[p as usize];
            let decision = match (production.prec, self.lookahead_prec(production, terminal)) {
                (Some(reducing), Some(lookahead)) => Some(resolve(reducing, lookahead)),
                _ => match production.directive {
                    Some(ConflictDirective::PreferShift) => Some(Resolution::Shift),
                    Some(ConflictDirective::PreferReduce) => Some(Resolution::Reduce),
                    None => None,
                },
            };
            match decision {
                Some(Resolution::Shift) => dropped.push(*action),
                Some(Resolution::Reduce) => keep_shift = false,
                Some(Resolution::Neither) => {
                    dropped.push(*action);
                    keep_shift = false;
                }
                None => continue,
            }
            self.stats.conflicts_pruned += 1;
        }
        if !keep_shift {
            dropped.push(cell[shift_at]);
        }
        cell.retain(|a| !dropped.contains(a));
    }

    /// Precedence of `terminal` as seen by `production`: the production's
    /// grammar-local override first, then the merged table
    fn lookahead_prec(&self, production: &Production, terminal: TermId) -> Option<Prec> {
        let operator = self.terminal(terminal)?.operator_text()?;
        let local = self
            .local_precedence
            .get(&production.grammar)
            .and_then(|overrides| overrides.get(&operator.to_ascii_lowercase()));
        match local {
            Some(&level) => self.precedence.prec_of_level(level),
            None => self.precedence.prec_of_operator(operator),
        }
    }

    // === LOOKUP ===

    pub fn grammars(&self) -> &[GrammarId] {
        &self.grammars
    }

    pub fn contains(&self, grammar: GrammarId) -> bool {
        self.grammars.contains(&grammar)
    }

    /// `None` for end of input
    pub fn terminal(&self, id: TermId) -> Option<Terminal> {
        if id == EOF {
            return None;
        }
        self.terminals.get(id as usize - 1).copied()
    }

    pub fn terminal_count(&self) -> usize {
        self.terminals.len() + 1
    }

    pub fn terminal_name(&self, id: TermId) -> String {
        match self.terminal(id) {
            Some(terminal) => terminal.to_string(),
            None => "end of input".to_string(),
        }
    }

    pub fn nonterminal(&self, id: NonTermId) -> &NonTerminal {
        &self.nonterminals[id as usize]
    }

    pub fn nonterminals(&self) -> &[NonTerminal] {
        &self.nonterminals
    }

    /// Non-terminal by qualified name, e.g. `expr::binary_expression`
    pub fn nonterminal_by_name(&self, qualified: &str) -> Option<NonTermId> {
        self.nonterminals
            .iter()
            .position(|n| n.qualified == qualified)
            .map(|i| i as NonTermId)
    }

    pub fn production(&self, id: ProdId) -> &Production {
        &self.productions[id as usize]
    }

    pub fn productions(&self) -> &[Production] {
        &self.productions
    }

    pub fn state(&self, id: StateId) -> &State {
        &self.states[id as usize]
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn actions(&self, state: StateId, terminal: TermId) -> &[Action] {
        self.states
            .get(state as usize)
            .and_then(|s| s.actions.get(&terminal))
            .map(|cell| cell.as_slice())
            .unwrap_or(&[])
    }

    pub fn goto(&self, state: StateId, nonterminal: NonTermId) -> Option<StateId> {
        self.states
            .get(state as usize)
            .and_then(|s| s.gotos.get(&nonterminal))
            .copied()
    }

    pub fn entry(&self, grammar: GrammarId) -> Option<Entry> {
        self.entries.get(&grammar).copied()
    }

    /// Default resynchronization terminals declared by `grammar`
    pub fn resync(&self, grammar: GrammarId) -> &[Terminal] {
        self.resync.get(&grammar).map(|r| r.as_slice()).unwrap_or(&[])
    }

    pub fn precedence(&self) -> &PrecedenceTable {
        &self.precedence
    }

    pub fn stats(&self) -> TableStats {
        self.stats
    }

    /// Every terminal a token of `kind` spelled `text` is an instance of
    pub fn terminals_for(&self, kind: TokenKind, text: &str) -> Vec<TermId> {
        let lower = text.to_ascii_lowercase();
        let mut out = Vec::new();
        if let Some(&id) = self.index.kinds.get(&kind) {
            out.push(id);
        }
        match kind {
            k if k.is_symbolic() => out.extend(self.index.syms.get(&lower).copied()),
            TokenKind::Identifier => out.extend(self.index.keywords.get(lower.as_str()).copied()),
            TokenKind::Command => out.extend(
                self.index
                    .commands
                    .iter()
                    .filter(|(name, _)| keywords::command_matches(name, &lower))
                    .map(|(_, id)| *id),
            ),
            TokenKind::Directive => {
                out.extend(self.index.directives.get(lower.as_str()).copied())
            }
            _ => {}
        }
        out
    }

    pub fn symbol_name(&self, symbol: Sym) -> String {
        match symbol {
            Sym::T(t) => self.terminal_name(t),
            Sym::N(n) => self.nonterminals[n as usize]
                .name
                .trim_start_matches('_')
                .to_string(),
        }
    }

    /// Symbols that may follow in `state`, from its kernel items
    pub fn expected_symbols(&self, state: StateId) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let Some(s) = self.states.get(state as usize) else {
            return out;
        };
        for item in &s.kernel {
            let production = &self.productions[item.production as usize];
            if let Some(symbol) = production.rhs.get(item.dot as usize) {
                let name = self.symbol_name(*symbol);
                if !out.contains(&name) {
                    out.push(name);
                }
            }
        }
        out
    }
}

impl fmt::Display for MergedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.grammars.iter().map(|g| g.name()).collect();
        write!(
            f,
            "MergedTable[{}]: {} terminals, {} non-terminals, {} productions, {} states",
            names.join("+"),
            self.terminal_count(),
            self.nonterminals.len(),
            self.productions.len(),
            self.states.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::builder::*;
    use crate::grammar::{GrammarId, PrecedenceLevel};

    fn arithmetic() -> Arc<MergedTable> {
        let mut b = GrammarBuilder::new(GrammarId::new("calc"));
        b.start("_e");
        b.level(PrecedenceLevel::left("add", &["+"]));
        b.level(PrecedenceLevel::left("mul", &["*"]));
        b.rule(
            "_e",
            vec![
                alt(vec![n("_e"), sym("+"), n("_e")]).binary(),
                alt(vec![n("_e"), sym("*"), n("_e")]).binary(),
                alt(vec![kind(TokenKind::Number)]),
            ],
        );
        crate::compose::compose_grammars(&[b.build()]).unwrap()
    }

    #[test]
    fn test_precedence_prunes_arithmetic_conflicts() {
        let table = arithmetic();
        let stats = table.stats();
        assert_eq!(stats.conflicts_kept, 0);
        assert_eq!(stats.conflicts_pruned, 4);
        for id in 0..table.state_count() as StateId {
            for cell in table.state(id).actions.values() {
                assert_eq!(cell.len(), 1);
            }
        }
    }

    #[test]
    fn test_terminal_lookup() {
        let table = arithmetic();
        let plus = table.terminals_for(TokenKind::Operator, "+");
        assert_eq!(plus.len(), 1);
        assert_eq!(table.terminal(plus[0]), Some(Terminal::Sym("+")));
        assert!(table.terminals_for(TokenKind::Identifier, "x").is_empty());
        assert_eq!(table.terminal(EOF), None);
        assert_eq!(table.terminal_name(EOF), "end of input");
    }

    #[test]
    fn test_entry_state_accepts_after_start() {
        let table = arithmetic();
        let entry = table.entry(GrammarId::new("calc")).unwrap();
        let after = table.goto(entry.state, entry.start).unwrap();
        assert!(table.actions(after, EOF).contains(&Action::Accept));
        let number = table.terminals_for(TokenKind::Number, "1")[0];
        assert!(matches!(table.actions(entry.state, number), [Action::Shift(_)]));
    }

    #[test]
    fn test_expected_symbols_come_from_kernel() {
        let table = arithmetic();
        let entry = table.entry(GrammarId::new("calc")).unwrap();
        let after = table.goto(entry.state, entry.start).unwrap();
        let expected = table.expected_symbols(after);
        assert!(expected.contains(&"'+'".to_string()));
        assert!(expected.contains(&"'*'".to_string()));
    }

    #[test]
    fn test_term_set() {
        let mut set = TermSet::new(130);
        assert!(set.insert(0));
        assert!(set.insert(129));
        assert!(!set.insert(129));
        let mut other = TermSet::new(130);
        other.insert(64);
        assert!(set.union(&other));
        assert!(!set.union(&other));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 64, 129]);
    }
}

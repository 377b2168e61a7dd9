//! Builder DSL for rule tables
//!
//! Rules are written as alternatives of [`Item`]s. Optional and choice items
//! expand into separate alternatives at build time, and repetitions become
//! hidden left-recursive helper rules, so a finished [`Grammar`] contains
//! only plain symbol sequences and no epsilon productions.

use crate::grammar::definition::{
    Alternative, ConflictDirective, EmbedSlot, Grammar, GrammarId, Rule, Symbol, Terminal,
};
use crate::grammar::precedence::PrecedenceLevel;
use crate::tokens::TokenKind;

/// A right-hand-side element before expansion
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Sym(Symbol),
    Opt(Vec<Item>),
    Choice(Vec<Vec<Item>>),
    Many1(Vec<Item>),
    List1(Vec<Item>, Vec<Item>),
}

pub fn n(rule: &str) -> Item {
    Item::Sym(Symbol::N(rule.to_string()))
}

pub fn t(terminal: Terminal) -> Item {
    Item::Sym(Symbol::T(terminal))
}

pub fn kind(kind: TokenKind) -> Item {
    t(Terminal::Kind(kind))
}

/// Operator or punctuation by text
pub fn sym(text: &'static str) -> Item {
    t(Terminal::Sym(text))
}

/// Case-insensitive keyword; `word` must be lowercase
pub fn kw(word: &'static str) -> Item {
    t(Terminal::Keyword(word))
}

pub fn cmd(name: &'static str) -> Item {
    t(Terminal::Command(name))
}

pub fn dir(name: &'static str) -> Item {
    t(Terminal::Directive(name))
}

pub fn embed(slot: &'static str) -> Item {
    Item::Sym(Symbol::Embed(slot))
}

pub fn opt(items: Vec<Item>) -> Item {
    Item::Opt(items)
}

pub fn choice(alternatives: Vec<Vec<Item>>) -> Item {
    Item::Choice(alternatives)
}

pub fn many1(items: Vec<Item>) -> Item {
    Item::Many1(items)
}

/// One or more `items` separated by `separator`
pub fn list1(items: Vec<Item>, separator: Item) -> Item {
    Item::List1(items, vec![separator])
}

/// An alternative under construction
#[derive(Debug, Clone)]
pub struct Alt {
    items: Vec<Item>,
    prec: Option<&'static str>,
    binary: bool,
    directive: Option<ConflictDirective>,
}

pub fn alt(items: Vec<Item>) -> Alt {
    Alt {
        items,
        prec: None,
        binary: false,
        directive: None,
    }
}

impl Alt {
    pub fn prec(mut self, level: &'static str) -> Self {
        self.prec = Some(level);
        self
    }

    pub fn binary(mut self) -> Self {
        self.binary = true;
        self
    }

    pub fn prefer_shift(mut self) -> Self {
        self.directive = Some(ConflictDirective::PreferShift);
        self
    }

    pub fn prefer_reduce(mut self) -> Self {
        self.directive = Some(ConflictDirective::PreferReduce);
        self
    }
}

impl From<Vec<Item>> for Alt {
    fn from(items: Vec<Item>) -> Self {
        alt(items)
    }
}

impl From<Item> for Alt {
    fn from(item: Item) -> Self {
        alt(vec![item])
    }
}

pub struct GrammarBuilder {
    id: GrammarId,
    start: Option<String>,
    rules: Vec<Rule>,
    exports: Vec<String>,
    slots: Vec<EmbedSlot>,
    precedence: Vec<PrecedenceLevel>,
    local_precedence: Vec<(&'static str, &'static str)>,
    resync: Vec<Terminal>,
    helper_count: usize,
}

impl GrammarBuilder {
    pub fn new(id: GrammarId) -> Self {
        Self {
            id,
            start: None,
            rules: Vec::new(),
            exports: Vec::new(),
            slots: Vec::new(),
            precedence: Vec::new(),
            local_precedence: Vec::new(),
            resync: Vec::new(),
            helper_count: 0,
        }
    }

    pub fn start(&mut self, rule: &str) -> &mut Self {
        self.start = Some(rule.to_string());
        self
    }

    pub fn export(&mut self, rule: &str) -> &mut Self {
        self.exports.push(rule.to_string());
        self
    }

    pub fn slot(
        &mut self,
        name: &'static str,
        grammar: GrammarId,
        rule: Option<&'static str>,
    ) -> &mut Self {
        self.slots.push(EmbedSlot {
            name,
            grammar,
            rule,
        });
        self
    }

    pub fn level(&mut self, level: PrecedenceLevel) -> &mut Self {
        self.precedence.push(level);
        self
    }

    /// Level for `operator` within this grammar's productions only
    pub fn local_precedence(&mut self, operator: &'static str, level: &'static str) -> &mut Self {
        self.local_precedence.push((operator, level));
        self
    }

    pub fn resync(&mut self, terminals: &[Terminal]) -> &mut Self {
        self.resync.extend_from_slice(terminals);
        self
    }

    /// Adds a rule. Declaring a name twice keeps both so the composer can
    /// report the duplicate.
    pub fn rule<A: Into<Alt>>(&mut self, name: &str, alternatives: Vec<A>) -> &mut Self {
        let mut expanded: Vec<Alternative> = Vec::new();
        for alternative in alternatives {
            let alt: Alt = alternative.into();
            for symbols in self.expand(name, &alt.items) {
                let candidate = Alternative {
                    symbols,
                    prec: alt.prec,
                    binary: alt.binary,
                    directive: alt.directive,
                };
                if !expanded.contains(&candidate) {
                    expanded.push(candidate);
                }
            }
        }
        self.rules.push(Rule {
            name: name.to_string(),
            alternatives: expanded,
        });
        self
    }

    /// Cartesian expansion of optional and choice items
    fn expand(&mut self, owner: &str, items: &[Item]) -> Vec<Vec<Symbol>> {
        let mut sequences: Vec<Vec<Symbol>> = vec![Vec::new()];
        for item in items {
            match item {
                Item::Sym(symbol) => {
                    for sequence in &mut sequences {
                        sequence.push(symbol.clone());
                    }
                }
                Item::Opt(inner) => {
                    let tails = self.expand(owner, inner);
                    sequences = append_tails(&sequences, &tails, true);
                }
                Item::Choice(alternatives) => {
                    let mut tails = Vec::new();
                    for alternative in alternatives {
                        tails.extend(self.expand(owner, alternative));
                    }
                    sequences = append_tails(&sequences, &tails, false);
                }
                Item::Many1(inner) => {
                    let helper = self.repeat_rule(owner, inner, &[]);
                    for sequence in &mut sequences {
                        sequence.push(Symbol::N(helper.clone()));
                    }
                }
                Item::List1(inner, separator) => {
                    let helper = self.repeat_rule(owner, inner, separator);
                    for sequence in &mut sequences {
                        sequence.push(Symbol::N(helper.clone()));
                    }
                }
            }
        }
        sequences
    }

    /// `helper: element | helper separator element`
    fn repeat_rule(&mut self, owner: &str, element: &[Item], separator: &[Item]) -> String {
        self.helper_count += 1;
        let name = format!(
            "_{}_repeat{}",
            owner.trim_start_matches('_'),
            self.helper_count
        );
        let elements = self.expand(&name, element);
        let separators = self.expand(&name, separator);

        let mut alternatives: Vec<Alternative> =
            elements.iter().cloned().map(Alternative::new).collect();
        for sep in &separators {
            for element in &elements {
                let mut symbols = vec![Symbol::N(name.clone())];
                symbols.extend(sep.iter().cloned());
                symbols.extend(element.iter().cloned());
                alternatives.push(Alternative::new(symbols));
            }
        }
        self.rules.push(Rule {
            name: name.clone(),
            alternatives,
        });
        name
    }

    pub fn build(self) -> Grammar {
        Grammar {
            id: self.id,
            start: self.start.unwrap_or_default(),
            rules: self.rules,
            exports: self.exports,
            slots: self.slots,
            precedence: self.precedence,
            local_precedence: self.local_precedence,
            resync: self.resync,
        }
    }
}

fn append_tails(
    prefixes: &[Vec<Symbol>],
    tails: &[Vec<Symbol>],
    keep_bare: bool,
) -> Vec<Vec<Symbol>> {
    let mut out = Vec::new();
    for prefix in prefixes {
        if keep_bare {
            out.push(prefix.clone());
        }
        for tail in tails {
            let mut sequence = prefix.clone();
            sequence.extend(tail.iter().cloned());
            out.push(sequence);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(symbols: &[Symbol]) -> Vec<String> {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_optional_items_expand_to_alternatives() {
        let mut b = GrammarBuilder::new(GrammarId::new("t"));
        b.rule("call", vec![vec![n("name"), opt(vec![sym("("), sym(")")])]]);
        let g = b.build();
        let rule = g.rule("call").unwrap();
        assert_eq!(rule.alternatives.len(), 2);
        assert_eq!(names(&rule.alternatives[0].symbols), vec!["name"]);
        assert_eq!(names(&rule.alternatives[1].symbols), vec!["name", "'('", "')'"]);
    }

    #[test]
    fn test_choice_multiplies_alternatives() {
        let mut b = GrammarBuilder::new(GrammarId::new("t"));
        b.rule(
            "arg",
            vec![vec![
                choice(vec![vec![kw("byref")], vec![kw("output")]]),
                n("name"),
            ]],
        );
        let g = b.build();
        assert_eq!(g.rule("arg").unwrap().alternatives.len(), 2);
    }

    #[test]
    fn test_list_becomes_left_recursive_helper() {
        let mut b = GrammarBuilder::new(GrammarId::new("t"));
        b.rule("args", vec![vec![list1(vec![n("value")], sym(","))]]);
        let g = b.build();
        let args = g.rule("args").unwrap();
        let helper = match &args.alternatives[0].symbols[0] {
            Symbol::N(name) => name.clone(),
            other => panic!("unexpected symbol {:?}", other),
        };
        assert!(helper.starts_with("_args_repeat"));
        let helper_rule = g.rule(&helper).unwrap();
        assert!(helper_rule.is_hidden());
        assert_eq!(helper_rule.alternatives.len(), 2);
        assert_eq!(
            names(&helper_rule.alternatives[1].symbols),
            vec![helper.clone(), "','".to_string(), "value".to_string()]
        );
    }

    #[test]
    fn test_alternative_flags_survive_expansion() {
        let mut b = GrammarBuilder::new(GrammarId::new("t"));
        b.rule(
            "binary",
            vec![alt(vec![n("e"), sym("+"), n("e")]).prec("additive").binary()],
        );
        let g = b.build();
        let a = &g.rule("binary").unwrap().alternatives[0];
        assert_eq!(a.prec, Some("additive"));
        assert!(a.binary);
    }

    #[test]
    fn test_all_optional_sequence_yields_empty_alternative() {
        let mut b = GrammarBuilder::new(GrammarId::new("t"));
        b.rule("maybe", vec![vec![opt(vec![sym("x")])]]);
        let g = b.build();
        assert!(g
            .rule("maybe")
            .unwrap()
            .alternatives
            .iter()
            .any(|a| a.symbols.is_empty()));
    }
}

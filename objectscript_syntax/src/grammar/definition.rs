//! Rule-table data model
//!
//! A [`Grammar`] is plain data: rules made of alternatives, the embedding
//! slots it delegates to other grammars, its precedence levels and its
//! recovery terminals. Grammars are validated and turned into parse tables
//! by [`crate::compose`]; nothing here knows about LR states.

use crate::grammar::precedence::PrecedenceLevel;
use crate::lexical::keywords;
use crate::tokens::TokenKind;
use serde::Serialize;
use std::fmt;

/// Name of a grammar, also used as the namespace of its rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GrammarId(&'static str);

impl GrammarId {
    pub const EXPR: GrammarId = GrammarId("expr");
    pub const CORE: GrammarId = GrammarId("core");
    pub const UDL: GrammarId = GrammarId("udl");

    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub const fn name(self) -> &'static str {
        self.0
    }

    /// Built-in grammar by name
    pub fn builtin(name: &str) -> Option<GrammarId> {
        [Self::EXPR, Self::CORE, Self::UDL]
            .into_iter()
            .find(|g| g.0.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for GrammarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A class of tokens a grammar position accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Terminal {
    /// Any token of this kind
    Kind(TokenKind),
    /// Operator, punctuation or embed opener with this text (ASCII case-insensitive)
    Sym(&'static str),
    /// Identifier spelling this word, case-insensitively
    Keyword(&'static str),
    /// Command token spelling any form of the canonical command
    Command(&'static str),
    /// Directive token with this text, `#` included
    Directive(&'static str),
}

impl Terminal {
    /// True if a token of `kind` with `text` is this terminal.
    /// `lower` is `text` lowercased; callers compute it once per token.
    pub fn matches(&self, kind: TokenKind, text: &str, lower: &str) -> bool {
        match *self {
            Terminal::Kind(k) => k == kind,
            Terminal::Sym(s) => kind.is_symbolic() && text.eq_ignore_ascii_case(s),
            Terminal::Keyword(w) => kind == TokenKind::Identifier && lower == w,
            Terminal::Command(c) => kind == TokenKind::Command && keywords::command_matches(c, lower),
            Terminal::Directive(d) => kind == TokenKind::Directive && lower == d,
        }
    }

    /// Leaf node name for a token shifted through this terminal
    pub fn leaf_kind(&self, token_kind: TokenKind, text: &str) -> (String, bool) {
        match *self {
            Terminal::Kind(TokenKind::Newline) => (TokenKind::Newline.name().to_string(), false),
            Terminal::Kind(k) => (k.name().to_string(), true),
            Terminal::Sym(_) => (text.to_string(), false),
            Terminal::Keyword(w) => (w.to_string(), false),
            Terminal::Command(c) => (format!("keyword_{}", c), true),
            Terminal::Directive(_) => (token_kind.name().to_string(), true),
        }
    }

    /// Binary-operator text this terminal carries for precedence lookup
    pub fn operator_text(&self) -> Option<&'static str> {
        match *self {
            Terminal::Sym(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminal::Kind(k) => write!(f, "{}", k),
            Terminal::Sym(s) => write!(f, "'{}'", s),
            Terminal::Keyword(w) => write!(f, "'{}'", w),
            Terminal::Command(c) => write!(f, "command {}", c),
            Terminal::Directive(d) => write!(f, "{}", d),
        }
    }
}

/// One symbol of a production
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Symbol {
    T(Terminal),
    /// Rule of the same grammar
    N(String),
    /// Named slot resolved to another grammar's rule at composition
    Embed(&'static str),
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::T(t) => write!(f, "{}", t),
            Symbol::N(n) => f.write_str(n),
            Symbol::Embed(s) => write!(f, "<{}>", s),
        }
    }
}

/// Explicit resolution for a shift/reduce conflict on this alternative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConflictDirective {
    PreferShift,
    PreferReduce,
}

/// One production of a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alternative {
    pub symbols: Vec<Symbol>,
    /// Precedence level name; defaults to the level of the last operator
    pub prec: Option<&'static str>,
    /// Binary-operator production, which must resolve to a level
    pub binary: bool,
    pub directive: Option<ConflictDirective>,
}

impl Alternative {
    pub fn new(symbols: Vec<Symbol>) -> Self {
        Self {
            symbols,
            prec: None,
            binary: false,
            directive: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub name: String,
    pub alternatives: Vec<Alternative>,
}

impl Rule {
    /// Hidden rules are spliced into their parent in the tree
    pub fn is_hidden(&self) -> bool {
        is_hidden_name(&self.name)
    }
}

pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('_')
}

/// Delegation of a slot to a rule of another grammar
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedSlot {
    pub name: &'static str,
    pub grammar: GrammarId,
    /// Target rule; `None` means the target grammar's start rule
    pub rule: Option<&'static str>,
}

/// A complete grammar definition
#[derive(Debug, Clone, Serialize)]
pub struct Grammar {
    pub id: GrammarId,
    pub start: String,
    pub rules: Vec<Rule>,
    pub exports: Vec<String>,
    pub slots: Vec<EmbedSlot>,
    /// Levels loosest first
    pub precedence: Vec<PrecedenceLevel>,
    /// Operator text to level name, applied to this grammar's productions only
    pub local_precedence: Vec<(&'static str, &'static str)>,
    pub resync: Vec<Terminal>,
}

impl Grammar {
    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn slot(&self, name: &str) -> Option<&EmbedSlot> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// Grammars this one embeds, in slot declaration order
    pub fn embedded_grammars(&self) -> Vec<GrammarId> {
        let mut out = Vec::new();
        for slot in &self.slots {
            if !out.contains(&slot.grammar) {
                out.push(slot.grammar);
            }
        }
        out
    }

    pub fn production_count(&self) -> usize {
        self.rules.iter().map(|r| r.alternatives.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_matching() {
        assert!(Terminal::Sym("+").matches(TokenKind::Operator, "+", "+"));
        assert!(!Terminal::Sym("+").matches(TokenKind::String, "+", "+"));
        assert!(Terminal::Sym("##class").matches(TokenKind::Punctuation, "##Class", "##class"));
        assert!(Terminal::Sym("&sql(").matches(TokenKind::EmbedOpen, "&SQL(", "&sql("));
        assert!(Terminal::Keyword("extends").matches(TokenKind::Identifier, "Extends", "extends"));
        assert!(!Terminal::Keyword("extends").matches(TokenKind::Command, "Extends", "extends"));
        assert!(Terminal::Command("set").matches(TokenKind::Command, "S", "s"));
        assert!(Terminal::Command("halt").matches(TokenKind::Command, "h", "h"));
        assert!(Terminal::Command("hang").matches(TokenKind::Command, "h", "h"));
        assert!(!Terminal::Command("set").matches(TokenKind::Identifier, "set", "set"));
        assert!(Terminal::Directive("#define").matches(TokenKind::Directive, "#Define", "#define"));
    }

    #[test]
    fn test_leaf_kinds() {
        assert_eq!(
            Terminal::Command("set").leaf_kind(TokenKind::Command, "s"),
            ("keyword_set".to_string(), true)
        );
        assert_eq!(
            Terminal::Sym("+").leaf_kind(TokenKind::Operator, "+"),
            ("+".to_string(), false)
        );
        assert_eq!(
            Terminal::Kind(TokenKind::Number).leaf_kind(TokenKind::Number, "1"),
            ("number".to_string(), true)
        );
    }

    #[test]
    fn test_grammar_ids() {
        assert_eq!(GrammarId::builtin("Core"), Some(GrammarId::CORE));
        assert_eq!(GrammarId::builtin("sql"), None);
        assert_eq!(GrammarId::UDL.to_string(), "udl");
    }

    #[test]
    fn test_hidden_names() {
        assert!(is_hidden_name("_expression"));
        assert!(!is_hidden_name("binary_expression"));
    }
}

//! Concrete syntax tree
//!
//! Nodes are immutable values shared through `Arc`. A node stores its byte
//! length, never its absolute position, so an unchanged subtree can be
//! shared between an old tree and the tree built after an edit. Absolute
//! offsets and parents are computed while walking, through [`NodeRef`].

use crate::compose::{NonTermId, ProdId, StateId, TermId};
use crate::grammar::GrammarId;
use crate::tokens::TokenKind;
use std::fmt::Write as _;
use std::ops::Range;
use std::sync::Arc;

/// Kind of the root node
pub const ROOT_KIND: &str = "source_file";
/// Kind of error regions
pub const ERROR_KIND: &str = "ERROR";

/// Grammar symbol a node was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeSymbol {
    Root,
    NonTerminal(NonTermId),
    Terminal(TermId),
    /// Trivia or a token taken into an error region
    Token(TokenKind),
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Flags {
    is_error: bool,
    is_missing: bool,
    is_extra: bool,
    has_error: bool,
    named: bool,
}

#[derive(Debug, Clone)]
pub struct Node {
    kind: Arc<str>,
    grammar: Option<GrammarId>,
    symbol: NodeSymbol,
    production: Option<ProdId>,
    /// State of the stack the node was reduced on top of
    pre_state: Option<StateId>,
    byte_len: usize,
    /// Significant tokens covered
    token_count: usize,
    children: Vec<Arc<Node>>,
    flags: Flags,
}

impl Node {
    // === CONSTRUCTION ===

    /// Leaf for a significant token shifted through a terminal
    pub(crate) fn leaf(
        kind: Arc<str>,
        named: bool,
        grammar: Option<GrammarId>,
        terminal: TermId,
        byte_len: usize,
    ) -> Self {
        Self {
            kind,
            grammar,
            symbol: NodeSymbol::Terminal(terminal),
            production: None,
            pre_state: None,
            byte_len,
            token_count: 1,
            children: Vec::new(),
            flags: Flags {
                named,
                ..Flags::default()
            },
        }
    }

    /// Trivia leaf; comments are named so they show up in S-expressions
    pub(crate) fn extra(kind: TokenKind, byte_len: usize) -> Self {
        Self {
            kind: Arc::from(kind.name()),
            grammar: None,
            symbol: NodeSymbol::Token(kind),
            production: None,
            pre_state: None,
            byte_len,
            token_count: 0,
            children: Vec::new(),
            flags: Flags {
                is_extra: true,
                named: !matches!(kind, TokenKind::Whitespace | TokenKind::Newline),
                ..Flags::default()
            },
        }
    }

    /// Significant token swallowed by an error region
    pub(crate) fn skipped(kind: TokenKind, byte_len: usize) -> Self {
        Self {
            kind: Arc::from(kind.name()),
            grammar: None,
            symbol: NodeSymbol::Token(kind),
            production: None,
            pre_state: None,
            byte_len,
            token_count: 1,
            children: Vec::new(),
            flags: Flags {
                named: kind == TokenKind::Error,
                is_error: kind == TokenKind::Error,
                has_error: kind == TokenKind::Error,
                ..Flags::default()
            },
        }
    }

    /// Zero-width node synthesized by recovery
    pub(crate) fn missing(kind: Arc<str>, grammar: Option<GrammarId>, symbol: NodeSymbol) -> Self {
        Self {
            kind,
            grammar,
            symbol,
            production: None,
            pre_state: None,
            byte_len: 0,
            token_count: 0,
            children: Vec::new(),
            flags: Flags {
                is_error: true,
                is_missing: true,
                has_error: true,
                named: true,
                ..Flags::default()
            },
        }
    }

    pub(crate) fn internal(
        kind: Arc<str>,
        grammar: GrammarId,
        nonterminal: NonTermId,
        production: ProdId,
        pre_state: StateId,
        children: Vec<Arc<Node>>,
    ) -> Self {
        let mut node = Self {
            kind,
            grammar: Some(grammar),
            symbol: NodeSymbol::NonTerminal(nonterminal),
            production: Some(production),
            pre_state: Some(pre_state),
            byte_len: 0,
            token_count: 0,
            children,
            flags: Flags {
                named: true,
                ..Flags::default()
            },
        };
        node.summarize();
        node
    }

    pub(crate) fn error(children: Vec<Arc<Node>>) -> Self {
        let mut node = Self {
            kind: Arc::from(ERROR_KIND),
            grammar: None,
            symbol: NodeSymbol::Error,
            production: None,
            pre_state: None,
            byte_len: 0,
            token_count: 0,
            children,
            flags: Flags {
                is_error: true,
                named: true,
                ..Flags::default()
            },
        };
        node.summarize();
        node.flags.has_error = true;
        node
    }

    pub(crate) fn root(grammar: GrammarId, children: Vec<Arc<Node>>) -> Self {
        let mut node = Self {
            kind: Arc::from(ROOT_KIND),
            grammar: Some(grammar),
            symbol: NodeSymbol::Root,
            production: None,
            pre_state: None,
            byte_len: 0,
            token_count: 0,
            children,
            flags: Flags {
                named: true,
                ..Flags::default()
            },
        };
        node.summarize();
        node
    }

    fn summarize(&mut self) {
        self.byte_len = self.children.iter().map(|c| c.byte_len).sum();
        self.token_count = self.children.iter().map(|c| c.token_count).sum();
        self.flags.has_error |= self.children.iter().any(|c| c.flags.has_error);
    }

    // === ACCESSORS ===

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub(crate) fn shared_kind(&self) -> Arc<str> {
        self.kind.clone()
    }

    pub fn grammar(&self) -> Option<GrammarId> {
        self.grammar
    }

    pub fn symbol(&self) -> NodeSymbol {
        self.symbol
    }

    pub fn production(&self) -> Option<ProdId> {
        self.production
    }

    pub fn pre_state(&self) -> Option<StateId> {
        self.pre_state
    }

    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    pub fn token_count(&self) -> usize {
        self.token_count
    }

    pub fn children(&self) -> &[Arc<Node>] {
        &self.children
    }

    pub fn is_named(&self) -> bool {
        self.flags.named
    }

    pub fn is_error(&self) -> bool {
        self.flags.is_error
    }

    pub fn is_missing(&self) -> bool {
        self.flags.is_missing
    }

    pub fn is_extra(&self) -> bool {
        self.flags.is_extra
    }

    pub fn has_error(&self) -> bool {
        self.flags.has_error
    }

    /// Same kinds, lengths, flags and children, recursively
    pub fn same_structure(&self, other: &Node) -> bool {
        self.kind == other.kind
            && self.byte_len == other.byte_len
            && self.flags == other.flags
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(&other.children)
                .all(|(a, b)| Arc::ptr_eq(a, b) || a.same_structure(b))
    }
}

/// A node positioned in its tree
#[derive(Debug, Clone)]
pub struct NodeRef<'t> {
    node: &'t Node,
    start: usize,
    source: &'t str,
    /// (ancestor, its start, index of the next node down among its children)
    ancestors: Vec<(&'t Node, usize, usize)>,
}

impl<'t> NodeRef<'t> {
    pub(crate) fn root(node: &'t Node, source: &'t str) -> Self {
        Self {
            node,
            start: 0,
            source,
            ancestors: Vec::new(),
        }
    }

    pub fn node(&self) -> &'t Node {
        self.node
    }

    pub fn kind(&self) -> &'t str {
        self.node.kind()
    }

    pub fn grammar(&self) -> Option<GrammarId> {
        self.node.grammar()
    }

    pub fn is_named(&self) -> bool {
        self.node.is_named()
    }

    pub fn is_error(&self) -> bool {
        self.node.is_error()
    }

    pub fn is_missing(&self) -> bool {
        self.node.is_missing()
    }

    pub fn is_extra(&self) -> bool {
        self.node.is_extra()
    }

    pub fn has_error(&self) -> bool {
        self.node.has_error()
    }

    pub fn start_byte(&self) -> usize {
        self.start
    }

    pub fn end_byte(&self) -> usize {
        self.start + self.node.byte_len
    }

    pub fn byte_range(&self) -> Range<usize> {
        self.start..self.end_byte()
    }

    pub fn text(&self) -> &'t str {
        self.source.get(self.byte_range()).unwrap_or("")
    }

    pub fn child_count(&self) -> usize {
        self.node.children.len()
    }

    pub fn child(&self, index: usize) -> Option<NodeRef<'t>> {
        let child = self.node.children.get(index)?;
        let start = self.start
            + self.node.children[..index]
                .iter()
                .map(|c| c.byte_len)
                .sum::<usize>();
        let mut ancestors = self.ancestors.clone();
        ancestors.push((self.node, self.start, index));
        Some(NodeRef {
            node: child,
            start,
            source: self.source,
            ancestors,
        })
    }

    pub fn children(&self) -> Vec<NodeRef<'t>> {
        let mut out = Vec::with_capacity(self.node.children.len());
        let mut start = self.start;
        for (index, child) in self.node.children.iter().enumerate() {
            let mut ancestors = self.ancestors.clone();
            ancestors.push((self.node, self.start, index));
            out.push(NodeRef {
                node: child,
                start,
                source: self.source,
                ancestors,
            });
            start += child.byte_len;
        }
        out
    }

    pub fn named_children(&self) -> Vec<NodeRef<'t>> {
        self.children().into_iter().filter(|c| c.is_named()).collect()
    }

    /// First child of `kind`
    pub fn child_by_kind(&self, kind: &str) -> Option<NodeRef<'t>> {
        self.children().into_iter().find(|c| c.kind() == kind)
    }

    pub fn parent(&self) -> Option<NodeRef<'t>> {
        let mut ancestors = self.ancestors.clone();
        let (node, start, _) = ancestors.pop()?;
        Some(NodeRef {
            node,
            start,
            source: self.source,
            ancestors,
        })
    }

    /// Index of this node among its parent's children
    pub fn index_in_parent(&self) -> Option<usize> {
        self.ancestors.last().map(|(_, _, index)| *index)
    }

    /// Smallest non-extra descendant whose range contains `start..end`
    pub fn descendant_for_range(&self, start: usize, end: usize) -> Option<NodeRef<'t>> {
        if start < self.start || end > self.end_byte() {
            return None;
        }
        let mut current = self.clone();
        'descend: loop {
            for child in current.children() {
                if child.is_extra() {
                    continue;
                }
                let range = child.byte_range();
                let contains = range.start <= start && end <= range.end;
                let nonempty_hit = range.start < range.end || start == end;
                if contains && nonempty_hit {
                    current = child;
                    continue 'descend;
                }
            }
            return Some(current);
        }
    }

    /// Every descendant, pre-order, this node included
    pub fn descendants(&self) -> Vec<NodeRef<'t>> {
        let mut out = Vec::new();
        let mut stack = vec![self.clone()];
        while let Some(node) = stack.pop() {
            let mut children = node.children();
            children.reverse();
            stack.extend(children);
            out.push(node);
        }
        out
    }

    pub fn walk(&self) -> TreeCursor<'t> {
        TreeCursor::new(self.clone())
    }

    /// Named nodes as nested S-expressions
    pub fn to_sexp(&self) -> String {
        let mut out = String::new();
        write_sexp(self, false, &mut out);
        out
    }

    /// Like [`to_sexp`](Self::to_sexp) with `[start, end]` after each kind
    pub fn to_sexp_with_ranges(&self) -> String {
        let mut out = String::new();
        write_sexp(self, true, &mut out);
        out
    }
}

fn write_sexp(node: &NodeRef<'_>, ranges: bool, out: &mut String) {
    if node.is_missing() {
        out.push_str("(MISSING ");
        out.push_str(node.kind());
        if ranges {
            let _ = write!(out, " [{}, {}]", node.start_byte(), node.end_byte());
        }
        out.push(')');
        return;
    }
    out.push('(');
    out.push_str(node.kind());
    if ranges {
        let _ = write!(out, " [{}, {}]", node.start_byte(), node.end_byte());
    }
    for child in node.children() {
        if child.is_named() || child.is_missing() {
            out.push(' ');
            write_sexp(&child, ranges, out);
        } else if child.child_count() > 0 {
            for grandchild in child.named_children() {
                out.push(' ');
                write_sexp(&grandchild, ranges, out);
            }
        }
    }
    out.push(')');
}

/// Depth-first cursor over a tree
#[derive(Debug, Clone)]
pub struct TreeCursor<'t> {
    current: NodeRef<'t>,
    depth: usize,
}

impl<'t> TreeCursor<'t> {
    pub fn new(node: NodeRef<'t>) -> Self {
        Self {
            current: node,
            depth: 0,
        }
    }

    pub fn node(&self) -> NodeRef<'t> {
        self.current.clone()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn goto_first_child(&mut self) -> bool {
        match self.current.child(0) {
            Some(child) => {
                self.current = child;
                self.depth += 1;
                true
            }
            None => false,
        }
    }

    pub fn goto_next_sibling(&mut self) -> bool {
        if self.depth == 0 {
            return false;
        }
        let (Some(parent), Some(index)) = (self.current.parent(), self.current.index_in_parent())
        else {
            return false;
        };
        match parent.child(index + 1) {
            Some(sibling) => {
                self.current = sibling;
                true
            }
            None => false,
        }
    }

    pub fn goto_parent(&mut self) -> bool {
        if self.depth == 0 {
            return false;
        }
        match self.current.parent() {
            Some(parent) => {
                self.current = parent;
                self.depth -= 1;
                true
            }
            None => false,
        }
    }

    /// Pre-order step; false once the walk has left the starting subtree
    pub fn goto_next(&mut self) -> bool {
        if self.goto_first_child() {
            return true;
        }
        loop {
            if self.goto_next_sibling() {
                return true;
            }
            if !self.goto_parent() {
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(kind: &str, named: bool, len: usize) -> Arc<Node> {
        Arc::new(Node::leaf(Arc::from(kind), named, Some(GrammarId::EXPR), 1, len))
    }

    /// `1 + 2` as binary_expression(number, '+', number) with spaces
    fn sample() -> (Node, &'static str) {
        let binary = Node::internal(
            Arc::from("binary_expression"),
            GrammarId::EXPR,
            0,
            0,
            0,
            vec![
                leaf("number", true, 1),
                Arc::new(Node::extra(TokenKind::Whitespace, 1)),
                leaf("+", false, 1),
                Arc::new(Node::extra(TokenKind::Whitespace, 1)),
                leaf("number", true, 1),
            ],
        );
        (Node::root(GrammarId::EXPR, vec![Arc::new(binary)]), "1 + 2")
    }

    #[test]
    fn test_lengths_and_counts_are_summed() {
        let (root, _) = sample();
        assert_eq!(root.byte_len(), 5);
        assert_eq!(root.token_count(), 3);
        assert!(!root.has_error());
    }

    #[test]
    fn test_node_ref_positions_and_text() {
        let (root, source) = sample();
        let root_ref = NodeRef::root(&root, source);
        let binary = root_ref.child(0).unwrap();
        let right = binary.child(4).unwrap();
        assert_eq!(right.byte_range(), 4..5);
        assert_eq!(right.text(), "2");
        assert_eq!(right.parent().unwrap().kind(), "binary_expression");
        assert_eq!(binary.named_children().len(), 2);
    }

    #[test]
    fn test_sexp_shows_named_nodes_only() {
        let (root, source) = sample();
        let root_ref = NodeRef::root(&root, source);
        assert_eq!(
            root_ref.to_sexp(),
            "(source_file (binary_expression (number) (number)))"
        );
        assert!(root_ref
            .to_sexp_with_ranges()
            .starts_with("(source_file [0, 5] (binary_expression [0, 5]"));
    }

    #[test]
    fn test_missing_and_error_rendering() {
        let missing = Arc::new(Node::missing(Arc::from("expression"), None, NodeSymbol::Error));
        let error = Arc::new(Node::error(vec![Arc::new(Node::skipped(TokenKind::Operator, 1))]));
        let root = Node::root(GrammarId::EXPR, vec![error, missing]);
        let root_ref = NodeRef::root(&root, ")");
        assert!(root.has_error());
        assert_eq!(root_ref.to_sexp(), "(source_file (ERROR) (MISSING expression))");
    }

    #[test]
    fn test_descendant_for_range() {
        let (root, source) = sample();
        let root_ref = NodeRef::root(&root, source);
        let found = root_ref.descendant_for_range(4, 5).unwrap();
        assert_eq!(found.kind(), "number");
        assert_eq!(found.start_byte(), 4);
        let found = root_ref.descendant_for_range(0, 5).unwrap();
        assert_eq!(found.kind(), "binary_expression");
        assert!(root_ref.descendant_for_range(0, 9).is_none());
    }

    #[test]
    fn test_cursor_walks_pre_order() {
        let (root, source) = sample();
        let mut cursor = NodeRef::root(&root, source).walk();
        let mut kinds = vec![cursor.node().kind().to_string()];
        while cursor.goto_next() {
            kinds.push(cursor.node().kind().to_string());
        }
        assert_eq!(
            kinds,
            vec!["source_file", "binary_expression", "number", "whitespace", "+", "whitespace", "number"]
        );
    }

    #[test]
    fn test_same_structure() {
        let (a, _) = sample();
        let (b, _) = sample();
        assert!(a.same_structure(&b));
        let c = Node::root(GrammarId::EXPR, vec![leaf("number", true, 5)]);
        assert!(!a.same_structure(&c));
    }
}

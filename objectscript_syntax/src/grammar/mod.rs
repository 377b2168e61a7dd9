//! Grammar rule tables
//!
//! Three grammars build on the [`builder`] DSL: `expr` for expressions,
//! `core` for commands and `udl` for class definitions. Each is plain data
//! until [`crate::compose`] validates it and builds parse tables.

pub mod builder;
pub mod core;
pub mod definition;
pub mod expr;
pub mod precedence;
pub mod udl;

pub use definition::{
    is_hidden_name, Alternative, ConflictDirective, EmbedSlot, Grammar, GrammarId, Rule, Symbol,
    Terminal,
};
pub use precedence::{Assoc, Prec, PrecedenceLevel, PrecedenceTable};

/// Definition of a built-in grammar
pub fn builtin(id: GrammarId) -> Option<Grammar> {
    match id {
        GrammarId::EXPR => Some(expr::grammar()),
        GrammarId::CORE => Some(self::core::grammar()),
        GrammarId::UDL => Some(udl::grammar()),
        _ => None,
    }
}

/// `id` and every grammar it embeds, transitively, in dependency order
pub fn builtin_closure(id: GrammarId) -> Vec<Grammar> {
    let mut ordered: Vec<Grammar> = Vec::new();
    let mut pending = vec![id];
    while let Some(next) = pending.pop() {
        if ordered.iter().any(|g| g.id == next) {
            continue;
        }
        if let Some(grammar) = builtin(next) {
            pending.extend(grammar.embedded_grammars());
            ordered.push(grammar);
        }
    }
    ordered
}

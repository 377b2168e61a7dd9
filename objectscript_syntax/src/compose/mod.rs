//! Grammar composition
//!
//! Validates a set of grammars, resolves embedding slots and precedence
//! across them, and builds the merged parse table every parser of that
//! language shares.

pub mod composer;
pub mod error;
pub mod table;

pub use composer::{compose, compose_grammars, compose_with_preferences};
pub use error::{ComposeResult, GrammarCompileError};
pub use table::{
    Action, Entry, MergedTable, NonTermId, NonTerminal, ProdId, Production, StateId, Sym,
    TableStats, TermId, EOF,
};

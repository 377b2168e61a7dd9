//! Operator precedence levels and shift/reduce resolution

use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Assoc {
    Left,
    Right,
    NonAssoc,
}

/// A named level; `operators` are the terminal texts it assigns.
/// Prefix-only levels carry no operators and are referenced by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrecedenceLevel {
    pub name: &'static str,
    pub assoc: Assoc,
    pub operators: Vec<&'static str>,
}

impl PrecedenceLevel {
    pub fn left(name: &'static str, operators: &[&'static str]) -> Self {
        Self {
            name,
            assoc: Assoc::Left,
            operators: operators.to_vec(),
        }
    }

    pub fn right(name: &'static str, operators: &[&'static str]) -> Self {
        Self {
            name,
            assoc: Assoc::Right,
            operators: operators.to_vec(),
        }
    }

    pub fn prefix(name: &'static str) -> Self {
        Self {
            name,
            assoc: Assoc::Right,
            operators: Vec::new(),
        }
    }
}

/// Resolved precedence: higher rank binds tighter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Prec {
    pub rank: u16,
    pub assoc: Assoc,
}

/// Outcome of comparing a reducible production with a lookahead operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Shift,
    Reduce,
    /// Non-associative operators at equal level: neither action survives
    Neither,
}

pub fn resolve(production: Prec, lookahead: Prec) -> Resolution {
    if production.rank > lookahead.rank {
        return Resolution::Reduce;
    }
    if production.rank < lookahead.rank {
        return Resolution::Shift;
    }
    match production.assoc {
        Assoc::Left => Resolution::Reduce,
        Assoc::Right => Resolution::Shift,
        Assoc::NonAssoc => Resolution::Neither,
    }
}

/// Merged, totally ordered levels with an operator index
#[derive(Debug, Clone, Default, Serialize)]
pub struct PrecedenceTable {
    levels: Vec<(&'static str, Assoc)>,
    operators: BTreeMap<String, usize>,
}

impl PrecedenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a level if absent and returns its index
    pub fn push_level(&mut self, name: &'static str, assoc: Assoc) -> usize {
        if let Some(index) = self.level_index(name) {
            return index;
        }
        self.levels.push((name, assoc));
        self.levels.len() - 1
    }

    pub fn assign(&mut self, operator: &str, level: usize) {
        self.operators.insert(operator.to_ascii_lowercase(), level);
    }

    pub fn level_index(&self, name: &str) -> Option<usize> {
        self.levels.iter().position(|(n, _)| *n == name)
    }

    pub fn level_assoc(&self, index: usize) -> Option<Assoc> {
        self.levels.get(index).map(|(_, a)| *a)
    }

    pub fn level_name(&self, index: usize) -> Option<&'static str> {
        self.levels.get(index).map(|(n, _)| *n)
    }

    pub fn operator_level(&self, operator: &str) -> Option<usize> {
        self.operators.get(&operator.to_ascii_lowercase()).copied()
    }

    pub fn prec_of_level(&self, index: usize) -> Option<Prec> {
        self.level_assoc(index).map(|assoc| Prec {
            rank: index as u16,
            assoc,
        })
    }

    pub fn prec_of_operator(&self, operator: &str) -> Option<Prec> {
        self.operator_level(operator)
            .and_then(|i| self.prec_of_level(i))
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prec(rank: u16, assoc: Assoc) -> Prec {
        Prec { rank, assoc }
    }

    #[test]
    fn test_resolution() {
        assert_eq!(resolve(prec(4, Assoc::Left), prec(5, Assoc::Left)), Resolution::Shift);
        assert_eq!(resolve(prec(5, Assoc::Left), prec(4, Assoc::Left)), Resolution::Reduce);
        assert_eq!(resolve(prec(4, Assoc::Left), prec(4, Assoc::Left)), Resolution::Reduce);
        assert_eq!(resolve(prec(6, Assoc::Right), prec(6, Assoc::Right)), Resolution::Shift);
        assert_eq!(
            resolve(prec(2, Assoc::NonAssoc), prec(2, Assoc::NonAssoc)),
            Resolution::Neither
        );
    }

    #[test]
    fn test_table_lookup() {
        let mut table = PrecedenceTable::new();
        let add = table.push_level("additive", Assoc::Left);
        let mul = table.push_level("multiplicative", Assoc::Left);
        table.assign("+", add);
        table.assign("*", mul);
        assert_eq!(table.push_level("additive", Assoc::Left), add);
        assert!(table.prec_of_operator("*").unwrap().rank > table.prec_of_operator("+").unwrap().rank);
        assert_eq!(table.operator_level("/"), None);
        assert_eq!(table.level_name(mul), Some("multiplicative"));
    }
}

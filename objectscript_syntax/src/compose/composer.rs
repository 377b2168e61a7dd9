//! Grammar validation and composition
//!
//! Composition checks each grammar on its own, checks that the embedding
//! relation between grammars is acyclic, merges precedence levels and then
//! lowers every rule onto shared symbol indices. Embedding slots become
//! direct references to the target grammar's non-terminal.

use crate::compose::error::{ComposeResult, GrammarCompileError};
use crate::compose::table::{Lowered, MergedTable, NonTerminal, ProdId, Production, Sym};
use crate::config::runtime::SyntaxPreferences;
use crate::grammar::{is_hidden_name, Grammar, GrammarId, Prec, PrecedenceTable, Symbol};
use crate::logging::codes;
use crate::{log_debug, log_error, log_success};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Composes the three built-in layers
pub fn compose(core: &Grammar, expr: &Grammar, udl: &Grammar) -> ComposeResult<Arc<MergedTable>> {
    compose_grammars(&[udl.clone(), core.clone(), expr.clone()])
}

/// Composes any set of grammars closed under embedding
pub fn compose_grammars(grammars: &[Grammar]) -> ComposeResult<Arc<MergedTable>> {
    compose_with_preferences(grammars, &SyntaxPreferences::default())
}

pub fn compose_with_preferences(
    grammars: &[Grammar],
    preferences: &SyntaxPreferences,
) -> ComposeResult<Arc<MergedTable>> {
    let names: Vec<&str> = grammars.iter().map(|g| g.id.name()).collect();
    log_debug!("Composing grammars", "grammars" => names.join(","));

    match Composer::new(grammars).run() {
        Ok(lowered) => {
            let table = MergedTable::build(lowered, preferences.log_table_conflicts);
            log_success!(codes::success::GRAMMAR_COMPOSITION_COMPLETE, "Grammars composed",
                "grammars" => names.join(","),
                "states" => table.state_count()
            );
            Ok(Arc::new(table))
        }
        Err(error) => {
            log_error!(error.error_code(), "Grammar composition failed",
                "error" => error.to_string()
            );
            Err(error)
        }
    }
}

struct Composer<'g> {
    grammars: Vec<&'g Grammar>,
    by_id: BTreeMap<GrammarId, &'g Grammar>,
}

impl<'g> Composer<'g> {
    /// A grammar listed twice is composed once, first occurrence wins
    fn new(grammars: &'g [Grammar]) -> Self {
        let mut by_id = BTreeMap::new();
        let mut ordered = Vec::new();
        for grammar in grammars {
            if by_id.contains_key(&grammar.id) {
                continue;
            }
            by_id.insert(grammar.id, grammar);
            ordered.push(grammar);
        }
        Self {
            grammars: ordered,
            by_id,
        }
    }

    fn run(self) -> ComposeResult<Lowered> {
        self.check_embedding_cycles()?;
        for grammar in &self.grammars {
            self.validate(grammar)?;
        }
        let (precedence, local_precedence) = self.merge_precedence()?;
        self.lower(precedence, local_precedence)
    }

    // === VALIDATION ===

    /// Depth-first search over slot targets, reporting the first cycle
    fn check_embedding_cycles(&self) -> ComposeResult<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Active,
            Done,
        }

        fn visit(
            id: GrammarId,
            by_id: &BTreeMap<GrammarId, &Grammar>,
            marks: &mut BTreeMap<GrammarId, Mark>,
            path: &mut Vec<GrammarId>,
        ) -> ComposeResult<()> {
            match marks.get(&id) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Active) => {
                    let from = path.iter().position(|g| *g == id).unwrap_or(0);
                    let mut cycle = path[from..].to_vec();
                    cycle.push(id);
                    return Err(GrammarCompileError::CyclicEmbedding { path: cycle });
                }
                None => {}
            }
            let Some(grammar) = by_id.get(&id) else {
                return Ok(());
            };
            marks.insert(id, Mark::Active);
            path.push(id);
            for target in grammar.embedded_grammars() {
                visit(target, by_id, marks, path)?;
            }
            path.pop();
            marks.insert(id, Mark::Done);
            Ok(())
        }

        let mut marks = BTreeMap::new();
        for grammar in &self.grammars {
            visit(grammar.id, &self.by_id, &mut marks, &mut Vec::new())?;
        }
        Ok(())
    }

    fn validate(&self, grammar: &Grammar) -> ComposeResult<()> {
        let id = grammar.id;
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for rule in &grammar.rules {
            if !seen.insert(rule.name.as_str()) {
                return Err(GrammarCompileError::duplicate_rule(id, &rule.name));
            }
        }
        if grammar.rule(&grammar.start).is_none() {
            return Err(GrammarCompileError::missing_start_rule(id, &grammar.start));
        }

        let mut slots: BTreeSet<&str> = BTreeSet::new();
        for slot in &grammar.slots {
            if !slots.insert(slot.name) {
                return Err(GrammarCompileError::ambiguous_embedding(id, slot.name));
            }
            let Some(target) = self.by_id.get(&slot.grammar) else {
                let reason = format!("grammar '{}' is not part of the composition", slot.grammar);
                return Err(GrammarCompileError::unsatisfied_embedding(id, slot.name, &reason));
            };
            if let Some(rule) = slot.rule {
                let exported = rule == target.start || target.exports.iter().any(|e| e == rule);
                if target.rule(rule).is_none() || !exported {
                    let reason = format!("'{}::{}' is not the start rule or an export", slot.grammar, rule);
                    return Err(GrammarCompileError::unsatisfied_embedding(id, slot.name, &reason));
                }
            }
        }

        for rule in &grammar.rules {
            if rule.alternatives.is_empty() {
                return Err(GrammarCompileError::empty_rule(id, &rule.name));
            }
            for alternative in &rule.alternatives {
                if alternative.symbols.is_empty() {
                    return Err(GrammarCompileError::empty_production(id, &rule.name));
                }
                for symbol in &alternative.symbols {
                    match symbol {
                        Symbol::N(name) if grammar.rule(name).is_none() => {
                            return Err(GrammarCompileError::undefined_nonterminal(id, &rule.name, name));
                        }
                        Symbol::Embed(slot) if grammar.slot(slot).is_none() => {
                            return Err(GrammarCompileError::unsatisfied_embedding(
                                id,
                                slot,
                                "slot is not declared",
                            ));
                        }
                        _ => {}
                    }
                }
            }
        }

        for export in &grammar.exports {
            if grammar.rule(export).is_none() {
                return Err(GrammarCompileError::undefined_nonterminal(id, &grammar.start, export));
            }
        }

        let reachable = reachable_rules(grammar);
        if let Some(rule) = grammar.rules.iter().find(|r| !reachable.contains(r.name.as_str())) {
            return Err(GrammarCompileError::unreachable_rule(id, &rule.name));
        }
        Ok(())
    }

    // === PRECEDENCE ===

    /// Merges levels by name in declaration order. Shared levels must keep
    /// their relative order and associativity, and an operator may belong
    /// to one level only.
    fn merge_precedence(
        &self,
    ) -> ComposeResult<(PrecedenceTable, BTreeMap<GrammarId, BTreeMap<String, usize>>)> {
        let mut table = PrecedenceTable::new();
        for grammar in &self.grammars {
            let mut previous: Option<usize> = None;
            for level in &grammar.precedence {
                let index = match table.level_index(level.name) {
                    Some(index) => {
                        if table.level_assoc(index) != Some(level.assoc) {
                            return Err(GrammarCompileError::conflicting_precedence(
                                level.name,
                                &format!("{:?}", table.level_assoc(index)),
                                &format!("{:?}", level.assoc),
                            ));
                        }
                        if let Some(before) = previous.filter(|p| *p > index) {
                            return Err(GrammarCompileError::conflicting_precedence(
                                level.name,
                                table.level_name(before).unwrap_or_default(),
                                level.name,
                            ));
                        }
                        index
                    }
                    None => table.push_level(level.name, level.assoc),
                };
                for operator in &level.operators {
                    match table.operator_level(operator) {
                        Some(existing) if existing != index => {
                            return Err(GrammarCompileError::conflicting_precedence(
                                operator,
                                table.level_name(existing).unwrap_or_default(),
                                level.name,
                            ));
                        }
                        _ => table.assign(operator, index),
                    }
                }
                previous = Some(index);
            }
        }

        let mut locals = BTreeMap::new();
        for grammar in &self.grammars {
            let mut overrides = BTreeMap::new();
            for (operator, level) in &grammar.local_precedence {
                let index = table
                    .level_index(level)
                    .ok_or_else(|| GrammarCompileError::undefined_precedence_level(grammar.id, level))?;
                overrides.insert(operator.to_ascii_lowercase(), index);
            }
            if !overrides.is_empty() {
                locals.insert(grammar.id, overrides);
            }
        }
        Ok((table, locals))
    }

    // === LOWERING ===

    fn lower(
        &self,
        precedence: PrecedenceTable,
        local_precedence: BTreeMap<GrammarId, BTreeMap<String, usize>>,
    ) -> ComposeResult<Lowered> {
        let mut lowered = Lowered {
            grammars: self.grammars.iter().map(|g| g.id).collect(),
            ..Lowered::default()
        };

        let mut ids: HashMap<(GrammarId, &str), u32> = HashMap::new();
        for grammar in &self.grammars {
            for rule in &grammar.rules {
                ids.insert((grammar.id, rule.name.as_str()), lowered.nonterminals.len() as u32);
                lowered.nonterminals.push(NonTerminal {
                    qualified: format!("{}::{}", grammar.id, rule.name),
                    name: Arc::from(rule.name.as_str()),
                    grammar: grammar.id,
                    hidden: is_hidden_name(&rule.name),
                    augmented: false,
                });
            }
        }

        for grammar in &self.grammars {
            let local = local_precedence.get(&grammar.id);
            for rule in &grammar.rules {
                let lhs = ids[&(grammar.id, rule.name.as_str())];
                for alternative in &rule.alternatives {
                    let mut rhs = Vec::with_capacity(alternative.symbols.len());
                    for symbol in &alternative.symbols {
                        rhs.push(match symbol {
                            Symbol::T(terminal) => Sym::T(lowered.intern_terminal(*terminal)),
                            Symbol::N(name) => Sym::N(ids[&(grammar.id, name.as_str())]),
                            Symbol::Embed(slot) => Sym::N(self.resolve_slot(grammar, slot, &ids)?),
                        });
                    }

                    let prec = match alternative.prec {
                        Some(level) => {
                            let index = precedence.level_index(level).ok_or_else(|| {
                                GrammarCompileError::undefined_precedence_level(grammar.id, level)
                            })?;
                            precedence.prec_of_level(index)
                        }
                        None => operator_prec(alternative.symbols.as_slice(), &precedence, local),
                    };
                    if alternative.binary && prec.is_none() {
                        return Err(GrammarCompileError::missing_operator_precedence(
                            grammar.id, &rule.name,
                        ));
                    }

                    lowered.productions.push(Production {
                        lhs,
                        rhs,
                        grammar: grammar.id,
                        prec,
                        directive: alternative.directive,
                        binary: alternative.binary,
                    });
                }
            }
        }

        for grammar in &self.grammars {
            let start = ids[&(grammar.id, grammar.start.as_str())];
            let augmented = lowered.nonterminals.len() as u32;
            lowered.nonterminals.push(NonTerminal {
                qualified: format!("{}::{}'", grammar.id, grammar.start),
                name: Arc::from("source_file"),
                grammar: grammar.id,
                hidden: false,
                augmented: true,
            });
            let production = lowered.productions.len() as ProdId;
            lowered.productions.push(Production {
                lhs: augmented,
                rhs: vec![Sym::N(start)],
                grammar: grammar.id,
                prec: None,
                directive: None,
                binary: false,
            });
            lowered.entries.push((grammar.id, production, start));
            lowered.resync.insert(grammar.id, grammar.resync.clone());
        }

        lowered.precedence = precedence;
        lowered.local_precedence = local_precedence;
        Ok(lowered)
    }

    fn resolve_slot(
        &self,
        grammar: &Grammar,
        slot: &str,
        ids: &HashMap<(GrammarId, &str), u32>,
    ) -> ComposeResult<u32> {
        let declared = grammar
            .slot(slot)
            .ok_or_else(|| GrammarCompileError::unsatisfied_embedding(grammar.id, slot, "slot is not declared"))?;
        let target = self
            .by_id
            .get(&declared.grammar)
            .ok_or_else(|| GrammarCompileError::unknown_grammar(declared.grammar.name()))?;
        let rule = declared.rule.unwrap_or(target.start.as_str());
        ids.get(&(target.id, rule)).copied().ok_or_else(|| {
            GrammarCompileError::unsatisfied_embedding(grammar.id, slot, "target rule is not defined")
        })
    }
}

/// Level of the last operator in a production, local override first
fn operator_prec(
    symbols: &[Symbol],
    precedence: &PrecedenceTable,
    local: Option<&BTreeMap<String, usize>>,
) -> Option<Prec> {
    symbols.iter().rev().find_map(|symbol| {
        let Symbol::T(terminal) = symbol else {
            return None;
        };
        let operator = terminal.operator_text()?;
        match local.and_then(|l| l.get(&operator.to_ascii_lowercase())) {
            Some(&level) => precedence.prec_of_level(level),
            None => precedence.prec_of_operator(operator),
        }
    })
}

/// Rules reachable from the start rule and the exports
fn reachable_rules(grammar: &Grammar) -> BTreeSet<&str> {
    let mut reached: BTreeSet<&str> = BTreeSet::new();
    let mut pending: Vec<&str> = vec![grammar.start.as_str()];
    pending.extend(grammar.exports.iter().map(|e| e.as_str()));
    while let Some(name) = pending.pop() {
        if !reached.insert(name) {
            continue;
        }
        if let Some(rule) = grammar.rule(name) {
            for alternative in &rule.alternatives {
                for symbol in &alternative.symbols {
                    if let Symbol::N(next) = symbol {
                        pending.push(next.as_str());
                    }
                }
            }
        }
    }
    reached
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::builder::*;
    use crate::grammar::{self, PrecedenceLevel};
    use crate::tokens::TokenKind;
    use assert_matches::assert_matches;

    fn leaf_grammar(id: &'static str) -> GrammarBuilder {
        let mut b = GrammarBuilder::new(GrammarId::new(id));
        b.start("item");
        b.rule("item", vec![vec![kind(TokenKind::Identifier)]]);
        b
    }

    #[test]
    fn test_builtin_grammars_compose() {
        let table = compose(
            &grammar::core::grammar(),
            &grammar::expr::grammar(),
            &grammar::udl::grammar(),
        )
        .unwrap();
        assert!(table.entry(GrammarId::UDL).is_some());
        assert!(table.entry(GrammarId::CORE).is_some());
        assert!(table.entry(GrammarId::EXPR).is_some());
        assert!(table.nonterminal_by_name("expr::binary_expression").is_some());
        assert!(table.nonterminal_by_name("core::command_set").is_some());
        assert!(table.nonterminal_by_name("udl::method").is_some());
    }

    #[test]
    fn test_expression_layer_composes_alone() {
        let table = compose_grammars(&[grammar::expr::grammar()]).unwrap();
        assert_eq!(table.grammars(), &[GrammarId::EXPR]);
        assert!(table.entry(GrammarId::CORE).is_none());
    }

    #[test]
    fn test_embedding_rewritten_to_target_nonterminal() {
        let table =
            compose_grammars(&[grammar::core::grammar(), grammar::expr::grammar()]).unwrap();
        let postconditional = table.nonterminal_by_name("core::postconditional").unwrap();
        let expression = table.nonterminal_by_name("expr::_expression").unwrap();
        let production = table
            .productions()
            .iter()
            .find(|p| p.lhs == postconditional)
            .unwrap();
        assert_eq!(production.rhs.last(), Some(&Sym::N(expression)));
    }

    #[test]
    fn test_missing_target_grammar_is_unsatisfied() {
        let error = compose_grammars(&[grammar::core::grammar()]).unwrap_err();
        assert_matches!(error, GrammarCompileError::UnsatisfiedEmbedding { .. });
    }

    #[test]
    fn test_cycle_is_reported_with_path() {
        let mut a = leaf_grammar("a");
        a.slot("inner", GrammarId::new("b"), None);
        a.rule("wrapper", vec![vec![embed("inner")]]);
        a.export("wrapper");
        let mut b = leaf_grammar("b");
        b.slot("outer", GrammarId::new("a"), None);
        b.rule("wrapper", vec![vec![embed("outer")]]);
        b.export("wrapper");

        let error = compose_grammars(&[a.build(), b.build()]).unwrap_err();
        assert_matches!(
            &error,
            GrammarCompileError::CyclicEmbedding { path } if path.len() == 3
        );
        assert_eq!(error.error_code(), codes::grammar::CYCLIC_EMBEDDING);
    }

    #[test]
    fn test_undefined_nonterminal() {
        let mut b = GrammarBuilder::new(GrammarId::new("t"));
        b.start("item");
        b.rule("item", vec![vec![n("nowhere")]]);
        let error = compose_grammars(&[b.build()]).unwrap_err();
        assert_matches!(
            error,
            GrammarCompileError::UndefinedNonterminal { ref symbol, .. } if symbol == "nowhere"
        );
    }

    #[test]
    fn test_unreachable_rule() {
        let mut b = leaf_grammar("t");
        b.rule("orphan", vec![vec![kind(TokenKind::Number)]]);
        let error = compose_grammars(&[b.build()]).unwrap_err();
        assert_matches!(error, GrammarCompileError::UnreachableRule { ref rule, .. } if rule == "orphan");
    }

    #[test]
    fn test_duplicate_and_empty_rules() {
        let mut b = leaf_grammar("t");
        b.rule("item", vec![vec![kind(TokenKind::Number)]]);
        assert_matches!(
            compose_grammars(&[b.build()]).unwrap_err(),
            GrammarCompileError::DuplicateRule { .. }
        );

        let mut b = leaf_grammar("t");
        b.rule("item2", vec![vec![opt(vec![sym("x")])]]);
        b.export("item2");
        assert_matches!(
            compose_grammars(&[b.build()]).unwrap_err(),
            GrammarCompileError::EmptyProduction { .. }
        );
    }

    #[test]
    fn test_missing_start_rule() {
        let mut b = leaf_grammar("t");
        b.start("document");
        assert_matches!(
            compose_grammars(&[b.build()]).unwrap_err(),
            GrammarCompileError::MissingStartRule { .. }
        );
    }

    #[test]
    fn test_conflicting_precedence_between_grammars() {
        let mut a = leaf_grammar("a");
        a.level(PrecedenceLevel::left("additive", &["+"]));
        let mut b = leaf_grammar("b");
        b.level(PrecedenceLevel::left("additive", &["-"]));
        b.level(PrecedenceLevel::left("or", &["+"]));
        let error = compose_grammars(&[a.build(), b.build()]).unwrap_err();
        assert_matches!(
            error,
            GrammarCompileError::ConflictingPrecedence { ref operator, .. } if operator == "+"
        );
    }

    #[test]
    fn test_local_override_is_exempt() {
        let mut a = leaf_grammar("a");
        a.level(PrecedenceLevel::left("low", &["#"]));
        a.level(PrecedenceLevel::left("high", &["*"]));
        a.rule(
            "pair",
            vec![alt(vec![n("item"), sym("#"), n("item")]).binary()],
        );
        a.export("pair");
        let mut b = leaf_grammar("b");
        b.local_precedence("#", "high");
        b.rule(
            "pair",
            vec![alt(vec![n("item"), sym("#"), n("item")]).binary()],
        );
        b.export("pair");

        let table = compose_grammars(&[a.build(), b.build()]).unwrap();
        let rank = |qualified: &str| {
            let lhs = table.nonterminal_by_name(qualified).unwrap();
            table
                .productions()
                .iter()
                .find(|p| p.lhs == lhs)
                .and_then(|p| p.prec)
                .map(|p| p.rank)
        };
        assert!(rank("b::pair") > rank("a::pair"));
    }

    #[test]
    fn test_binary_production_without_level() {
        let mut b = leaf_grammar("t");
        b.rule("pair", vec![alt(vec![n("item"), sym("~"), n("item")]).binary()]);
        b.export("pair");
        assert_matches!(
            compose_grammars(&[b.build()]).unwrap_err(),
            GrammarCompileError::MissingOperatorPrecedence { .. }
        );
    }

    #[test]
    fn test_undefined_local_level() {
        let mut b = leaf_grammar("t");
        b.local_precedence("+", "nowhere");
        assert_matches!(
            compose_grammars(&[b.build()]).unwrap_err(),
            GrammarCompileError::UndefinedPrecedenceLevel { .. }
        );
    }

    #[test]
    fn test_slot_declared_twice_is_ambiguous() {
        let mut a = leaf_grammar("a");
        a.slot("inner", GrammarId::new("b"), None);
        a.slot("inner", GrammarId::new("b"), None);
        a.rule("wrapper", vec![vec![embed("inner")]]);
        a.export("wrapper");

        let error = compose_grammars(&[a.build(), leaf_grammar("b").build()]).unwrap_err();
        assert_matches!(
            &error,
            GrammarCompileError::AmbiguousEmbedding { slot, .. } if slot == "inner"
        );
        assert_eq!(error.error_code(), codes::grammar::AMBIGUOUS_EMBEDDING);
    }

    #[test]
    fn test_slot_must_target_start_or_export() {
        let mut a = leaf_grammar("a");
        a.slot("inner", GrammarId::new("b"), Some("hidden_rule"));
        a.rule("wrapper", vec![vec![embed("inner")]]);
        a.export("wrapper");
        let mut b = leaf_grammar("b");
        b.rule("hidden_rule", vec![vec![kind(TokenKind::Number)]]);
        b.rule("item2", vec![vec![n("hidden_rule")]]);
        b.export("item2");
        assert_matches!(
            compose_grammars(&[a.build(), b.build()]).unwrap_err(),
            GrammarCompileError::UnsatisfiedEmbedding { .. }
        );
    }
}

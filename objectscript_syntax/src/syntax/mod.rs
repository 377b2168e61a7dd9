//! Syntax analysis - token stream to concrete syntax tree
//!
//! A GLR engine over the merged table of the composed grammars. Malformed
//! input never fails a parse: it becomes `ERROR` regions and missing nodes
//! in a tree that still covers every byte, and each of those is reported as
//! a located [`SyntaxError`].

pub mod cst;
mod engine;
mod error;
pub mod incremental;
mod parser;
pub mod recovery;
mod result;

pub use cst::{Node, NodeRef, NodeSymbol, TreeCursor, ERROR_KIND, ROOT_KIND};
pub use engine::ParseStats;
pub use error::SyntaxError;
pub use incremental::{Edit, EditError, ReparseStats};
pub use parser::Parser;
pub use recovery::RecoveryTable;
pub use result::ParseResult;

use crate::logging::codes;

/// Check that every syntax and incremental code has registry metadata
pub fn validate_syntax_codes() -> Result<(), String> {
    let syntax_codes = [
        codes::syntax::UNEXPECTED_END_OF_INPUT,
        codes::syntax::MISSING_SYMBOL,
        codes::syntax::UNEXPECTED_TOKEN,
        codes::syntax::RECOVERY_LIMIT_REACHED,
        codes::syntax::INTERNAL_PARSER_ERROR,
        codes::incremental::INVALID_EDIT,
    ];

    for code in &syntax_codes {
        if codes::get_error_metadata(code.as_str()).is_none() {
            return Err(format!(
                "Syntax error code {} not found in metadata registry",
                code.as_str()
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_grammars {
    use crate::grammar::builder::*;
    use crate::grammar::{Grammar, GrammarId, PrecedenceLevel, Terminal};
    use crate::tokens::TokenKind;

    pub const CALC: GrammarId = GrammarId::new("calc");

    /// Small arithmetic grammar whose conflicts are all settled statically
    pub fn calc() -> Grammar {
        let mut b = GrammarBuilder::new(CALC);
        b.start("_e");
        b.level(PrecedenceLevel::left("add", &["+"]));
        b.level(PrecedenceLevel::left("mul", &["*"]));
        b.resync(&[Terminal::Sym(",")]);
        b.rule(
            "_e",
            vec![
                alt(vec![n("sum")]),
                alt(vec![n("product")]),
                alt(vec![kind(TokenKind::Number)]),
                alt(vec![sym("("), n("_e"), sym(")")]),
            ],
        );
        b.rule("sum", vec![alt(vec![n("_e"), sym("+"), n("_e")]).binary()]);
        b.rule("product", vec![alt(vec![n("_e"), sym("*"), n("_e")]).binary()]);
        b.build()
    }
}

#[cfg(test)]
mod tests {
    use super::test_grammars::{calc, CALC};
    use super::*;
    use crate::config::runtime::RuntimeConfig;
    use crate::grammar::GrammarId;
    use crate::language::Language;
    use crate::logging;
    use crate::lexical::LexMode;
    use assert_matches::assert_matches;

    fn leaves_text(result: &ParseResult) -> String {
        result
            .root_node()
            .descendants()
            .into_iter()
            .filter(|n| n.child_count() == 0)
            .map(|n| n.text().to_string())
            .collect()
    }

    fn ancestors_kinds(node: &NodeRef<'_>) -> Vec<String> {
        let mut kinds = Vec::new();
        let mut current = node.parent();
        while let Some(parent) = current {
            kinds.push(parent.kind().to_string());
            current = parent.parent();
        }
        kinds
    }

    const SAMPLES: &[(&str, &str)] = &[
        ("expr", ""),
        ("expr", "1 + 2 * 3"),
        ("expr", "$piece(x, \",\", 2) _ \"tail\""),
        ("expr", "a + ) ( * 7 ,,"),
        ("core", " set x = 1\n write x, !\n quit\n"),
        ("core", "start ; entry\n set ^g(1,2) = $h\n if x { write 1 } else { write 2 }\n"),
        ("core", " set x = \n write 1\n"),
        ("core", " write \"abc\n set = = =\n }\n"),
        ("udl", "Class A.B Extends %RegisteredObject\n{\nProperty P As %String;\n}\n"),
        ("udl", "Class A.B\n{\nMethod M()\n{\n set x = 1 + 2\n}\n}\n"),
        ("udl", "Class A.B\n{\nMethod M(\n{\n set\n}\nProperty Q;\n}\n"),
    ];

    #[test]
    fn test_syntax_codes_are_registered() {
        assert!(validate_syntax_codes().is_ok());
    }

    #[test]
    fn test_tree_covers_every_byte() {
        for (grammar, source) in SAMPLES {
            let language = Language::by_name(grammar).unwrap();
            let result = Parser::new(language).parse(source);
            assert_eq!(leaves_text(&result), *source, "{}: {:?}", grammar, source);
            assert_eq!(result.root_node().byte_range(), 0..source.len());
        }
    }

    #[test]
    fn test_parsing_is_deterministic() {
        for (grammar, source) in SAMPLES {
            let language = Language::by_name(grammar).unwrap();
            let first = Parser::new(language).parse(source);
            let second = Parser::new(language).parse(source);
            assert!(first.same_tree(&second), "{:?}", source);
            assert_eq!(first.to_sexp(), second.to_sexp());
            assert_eq!(first.errors(), second.errors());
        }
    }

    #[test]
    fn test_reparse_matches_full_parse() {
        let source = "start\n set x = 1\n set y = x + 2\n write x, y\n if x { set z = 3 }\n quit\n";
        let edits: &[(std::ops::Range<usize>, &str)] = &[
            (13..14, "42"),
            (0..0, " write 0\n"),
            (source.len()..source.len(), " halt\n"),
            (20..35, ""),
            (26..27, "* ("),
            (41..42, "\"unterminated"),
            (48..50, "while"),
            (0..source.len(), "Lbl\n"),
        ];
        let language = Language::core();
        let mut parser = Parser::new(language);
        let previous = parser.parse(source);
        for (range, text) in edits {
            let (edit, new_source) = Edit::replace(source, range.clone(), text);
            let incremental = parser.reparse(&previous, &edit, &new_source);
            let full = Parser::new(language).parse(&new_source);
            assert!(incremental.same_tree(&full), "edit {:?} -> {:?}", range, new_source);
            assert_eq!(incremental.errors(), full.errors());
            assert!(incremental.reparse_stats().is_some());
        }
    }

    #[test]
    fn test_reparse_reuses_untouched_prefix() {
        let language = Language::from_grammars(CALC, &[calc()], LexMode::expr()).unwrap();
        let source = "(1+2)\n*(3+4)\n+(5+6)";
        let mut parser = Parser::new(&language);
        let previous = parser.parse(source);
        assert!(!previous.has_errors());

        let (edit, new_source) = Edit::replace(source, 17..18, "7");
        let incremental = parser.reparse(&previous, &edit, &new_source);
        let full = Parser::new(&language).parse(&new_source);
        assert!(incremental.same_tree(&full));
        let stats = incremental.reparse_stats().unwrap();
        assert!(stats.reused_subtrees >= 1);
        assert!(stats.relexed_tokens < full.tokens().all_tokens().len());
    }

    #[test]
    fn test_reparse_after_errors_matches_full_parse() {
        let cases: &[(&str, &str, std::ops::Range<usize>, &str)] = &[
            ("core", "do (=.[//c", 0..0, ""),
            ("expr", "quit(?\n*/quit=/*}?", 7..9, "+"),
        ];
        for (grammar, source, range, text) in cases {
            let language = Language::by_name(grammar).unwrap();
            let mut parser = Parser::new(language);
            let previous = parser.parse(source);
            let (edit, new_source) = Edit::replace(source, range.clone(), text);
            let incremental = parser.reparse(&previous, &edit, &new_source);
            let full = Parser::new(language).parse(&new_source);
            assert!(incremental.same_tree(&full), "{}: {:?}", grammar, new_source);
            assert_eq!(incremental.errors(), full.errors());
        }
    }

    /// Deterministic generator for edit sequences
    struct Lcg(u64);

    impl Lcg {
        fn below(&mut self, bound: usize) -> usize {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((self.0 >> 33) as usize) % bound.max(1)
        }
    }

    const FRAGMENTS: &[(&str, &[&str])] = &[
        (
            "expr",
            &["1", "x", " + ", "*", "(", ")", "$h", "\"s\"", ",", " ", "\n", "/", "?", "=", "quit", "a(1)", "_", "'"],
        ),
        (
            "core",
            &[" set x = 1", "\n", " do ", "(", "=", ".", "[", "//c", " write ", "x", ",", "{", "}", " if x ", "\"", "1", " quit"],
        ),
        (
            "udl",
            &["Class A.B", "\n{", "\n}", "\nProperty P As %String", ";", " [ InitialExpression = {$h} ]", "\nMethod M(a = {1}, b)", "\n{\n set x = 1\n}", "(", ")", "[", "]", "=", "{", "}"],
        ),
    ];

    #[test]
    fn test_random_edits_reparse_like_full_parse() {
        let mut rng = Lcg(0x0b1e_c75c);
        for (grammar, fragments) in FRAGMENTS {
            let language = Language::by_name(grammar).unwrap();
            let mut parser = Parser::new(language);
            for _ in 0..150 {
                let pieces = rng.below(10) + 1;
                let mut source = std::string::String::new();
                for _ in 0..pieces {
                    source.push_str(fragments[rng.below(fragments.len())]);
                }
                let start = rng.below(source.len() + 1);
                let end = start + rng.below(source.len() - start + 1);
                let text = if rng.below(3) == 0 {
                    ""
                } else {
                    fragments[rng.below(fragments.len())]
                };

                let previous = parser.parse(&source);
                let (edit, new_source) = Edit::replace(&source, start..end, text);
                let incremental = parser.reparse(&previous, &edit, &new_source);
                let full = Parser::new(language).parse(&new_source);
                assert!(
                    incremental.same_tree(&full),
                    "{}: {:?} with {:?} -> {:?}",
                    grammar,
                    source,
                    start..end,
                    text
                );
                assert_eq!(incremental.errors(), full.errors(), "{:?}", new_source);
            }
        }
    }

    #[test]
    fn test_long_bodies_assemble_in_linear_work() {
        let parse = |lines: usize| Parser::new(Language::core()).parse(&" set x = x + 1\n".repeat(lines));
        let short = parse(500);
        let long = parse(2000);
        assert!(!long.has_errors());
        let statements = long
            .root_node()
            .children()
            .into_iter()
            .filter(|n| n.kind() == "statement")
            .count();
        assert_eq!(statements, 2000);

        let ratio = long.stats().assembled_children as f64 / short.stats().assembled_children as f64;
        assert!(ratio < 5.0, "assembly work grew by {:.1}x for 4x the lines", ratio);
    }

    #[test]
    fn test_reuse_can_be_disabled() {
        let language = Language::from_grammars(CALC, &[calc()], LexMode::expr()).unwrap();
        let config = RuntimeConfig::from_toml_str("[syntax]\nenable_subtree_reuse = false\n").unwrap();
        let mut parser = Parser::from_config(&language, &config);
        let source = "(1+2)\n*(3+4)\n+(5+6)";
        let previous = parser.parse(source);
        let (edit, new_source) = Edit::replace(source, 17..18, "7");
        let incremental = parser.reparse(&previous, &edit, &new_source);
        assert_eq!(incremental.reparse_stats().unwrap().reused_subtrees, 0);
        assert!(incremental.same_tree(&Parser::new(&language).parse(&new_source)));
    }

    #[test]
    fn test_parse_logs_completion_and_recovery() {
        let mut parser = Parser::new(Language::expr());
        let (result, events) = logging::capture(|| parser.parse("1 + ) 2"));
        assert!(result.has_errors());
        let completed = events
            .iter()
            .find(|e| e.code == codes::success::PARSE_COMPLETE)
            .unwrap();
        assert_eq!(completed.context_value("grammar"), Some("expr"));
        assert_eq!(
            completed.context_value("errors"),
            Some(result.errors().len().to_string().as_str())
        );
        assert!(events.iter().any(|e| e.message.starts_with("Skipped")
            || e.message.starts_with("Inserted")));
    }

    #[test]
    fn test_invalid_edit_falls_back_to_full_parse() {
        let mut parser = Parser::new(Language::expr());
        let previous = parser.parse("1 + 2");
        let bogus = Edit::new(3, 1, 9);
        assert_matches!(
            parser.try_reparse(&previous, &bogus, "1 - 2"),
            Err(crate::ParseError::InvalidEdit(EditError::InvertedRange { .. }))
        );
        let result = parser.reparse(&previous, &bogus, "1 - 2");
        assert!(result.reparse_stats().is_none());
        assert!(!result.has_errors());
    }

    #[test]
    fn test_repeated_unterminated_strings_terminate() {
        let source = " write \"a\n".repeat(300);
        let result = Parser::new(Language::core()).parse(&source);
        assert_eq!(leaves_text(&result), source);
        assert!(result.has_errors());
        assert!(result.errors().iter().any(|e| e.is_lexical()));

        let junk = "\"\"\"(((,,,]]]".repeat(100);
        let result = Parser::new(Language::expr()).parse(&junk);
        assert_eq!(result.root_node().end_byte(), junk.len());
    }

    #[test]
    fn test_method_body_expression_nests_under_class() {
        let source = "Class A.B\n{\nMethod M()\n{\n set x = 1 + 2\n}\n}\n";
        let result = Parser::new(Language::udl()).parse(source);
        assert!(!result.has_errors(), "{:?}", result.errors());

        let root = result.root_node();
        let binary = root
            .descendants()
            .into_iter()
            .find(|n| n.kind() == "binary_expression")
            .unwrap();
        assert_eq!(binary.text(), "1 + 2");
        assert_eq!(binary.grammar(), Some(GrammarId::EXPR));

        let chain = ancestors_kinds(&binary);
        let position = |kind: &str| chain.iter().position(|k| k == kind).unwrap();
        assert!(position("command_set") < position("method_body"));
        assert!(position("method_body") < position("method"));
        assert!(position("method") < position("class_definition"));

        let set = root.descendants().into_iter().find(|n| n.kind() == "command_set").unwrap();
        assert_eq!(set.grammar(), Some(GrammarId::CORE));
        let method = root.descendants().into_iter().find(|n| n.kind() == "method").unwrap();
        assert_eq!(method.grammar(), Some(GrammarId::UDL));
    }

    #[test]
    fn test_braced_member_values_embed_expressions_and_code() {
        let source = "Class A.B\n{\n\
Property P As %String [ InitialExpression = {$h} ];\n\
Property Q [ SqlComputed, SqlComputeCode = { set {*} = {Name}_\"x\" } ];\n\
Index I On P [ Condition = {P > 1} ];\n\
Method M(a As %String = {$h}, b = 1)\n{\n quit\n}\n}\n";
        let result = Parser::new(Language::udl()).parse(source);
        assert!(!result.has_errors(), "{}", result.render_errors());

        let root = result.root_node();
        let nodes = root.descendants();
        let braced: Vec<_> = nodes.iter().filter(|n| n.kind() == "braced_expression").collect();
        let texts: Vec<&str> = braced.iter().map(|n| n.text()).collect();
        assert_eq!(texts, vec!["{$h}", "{P > 1}", "{$h}"]);
        assert!(braced.iter().all(|n| n.grammar() == Some(GrammarId::UDL)));

        let comparison = nodes
            .iter()
            .find(|n| n.kind() == "binary_expression" && n.text() == "P > 1")
            .unwrap();
        assert_eq!(comparison.grammar(), Some(GrammarId::EXPR));
        assert!(ancestors_kinds(comparison).iter().any(|k| k == "braced_expression"));

        let set = nodes.iter().find(|n| n.kind() == "command_set").unwrap();
        assert_eq!(set.grammar(), Some(GrammarId::CORE));
        let chain = ancestors_kinds(set);
        assert!(chain.iter().any(|k| k == "code_snippet"));
        assert!(chain.iter().any(|k| k == "property"));
        assert_eq!(
            nodes.iter().filter(|n| n.kind() == "sql_field_reference").count(),
            2
        );
    }

    #[test]
    fn test_zsu_and_execute_directive() {
        for source in [" zsu \"x\"\n", " zsu\n", " #execute set x = 1\n"] {
            let result = Parser::new(Language::core()).parse(source);
            assert!(!result.has_errors(), "{:?}: {}", source, result.render_errors());
        }
        let result = Parser::new(Language::core()).parse(" zsu \"x\", 2\n");
        let kinds: Vec<std::string::String> =
            result.root_node().descendants().iter().map(|n| n.kind().to_string()).collect();
        assert!(kinds.iter().any(|k| k == "command_zsu"));

        let result = Parser::new(Language::core()).parse(" #execute set x = 1\n");
        let kinds: Vec<std::string::String> =
            result.root_node().descendants().iter().map(|n| n.kind().to_string()).collect();
        assert!(kinds.iter().any(|k| k == "pound_execute"));
        assert!(kinds.iter().any(|k| k == "command_set"));
    }

    #[test]
    fn test_multiplication_binds_tighter() {
        let result = Parser::new(Language::expr()).parse("1 + 2 * 3");
        assert!(!result.has_errors());
        let root = result.root_node();
        let top = root.named_children().into_iter().next().unwrap();
        assert_eq!(top.kind(), "binary_expression");
        assert_eq!(top.text(), "1 + 2 * 3");
        let right = top.named_children().into_iter().last().unwrap();
        assert_eq!(right.kind(), "binary_expression");
        assert_eq!(right.text(), "2 * 3");
    }

    #[test]
    fn test_missing_operand_is_isolated() {
        let source = " set x = \n write 1\n";
        let result = Parser::new(Language::core()).parse(source);
        assert_eq!(result.errors().len(), 1, "{:?}", result.errors());
        assert_matches!(
            &result.errors()[0],
            SyntaxError::MissingSymbol { symbol, .. } if symbol == "expression"
        );

        let root = result.root_node();
        let lvn = root
            .descendants()
            .into_iter()
            .find(|n| n.kind() == "lvn")
            .unwrap();
        assert_eq!(lvn.text(), "x");
        assert!(!lvn.has_error());

        let write = root
            .descendants()
            .into_iter()
            .find(|n| n.kind() == "command_write")
            .unwrap();
        assert!(!write.has_error());
        assert!(root.descendants().iter().all(|n| n.kind() != ERROR_KIND));

        let rendered = result.render_errors();
        assert!(rendered.starts_with("[E042] Missing expression"), "{}", rendered);
        assert!(rendered.contains("1 |  set x = "));
    }

    #[test]
    fn test_empty_input() {
        for language in [Language::expr(), Language::core(), Language::udl()] {
            let result = Parser::new(language).parse("");
            assert_eq!(result.to_sexp(), "(source_file)");
            assert_eq!(result.root_node().child_count(), 0);
            assert!(!result.has_errors());
        }
    }

    #[test]
    fn test_trivia_only_input() {
        let result = Parser::new(Language::expr()).parse("  /* note */  ");
        let root = result.root_node();
        assert!(root.child_count() > 0);
        assert!(root.children().iter().all(|c| c.is_extra()));
        assert!(!result.has_errors());

        let result = Parser::new(Language::core()).parse(" ; comment");
        assert!(result.root_node().children().iter().all(|c| c.is_extra()));
        assert!(!result.has_errors());
    }

    #[test]
    fn test_error_history_is_bounded() {
        let mut parser = Parser::new(Language::expr());
        for _ in 0..3 {
            parser.parse(")");
        }
        assert!(parser.error_history().count() >= 3);
        parser.clear_error_history();
        assert_eq!(parser.error_history().count(), 0);
    }
}

//! Class definition grammar
//!
//! Member bodies are decided by the lexer: a code body arrives as command
//! tokens, an expression body as expression tokens and a foreign body as one
//! `RawText` token. All three alternatives of `method_body` are offered and
//! the ones that do not match the token stream die on their first token.
//! Braced keyword values and argument defaults embed the same way.

use crate::grammar::builder::*;
use crate::grammar::definition::{Grammar, GrammarId, Terminal};
use crate::tokens::TokenKind as K;

const MEMBER_KEYWORDS: &[&str] = &[
    "classmethod",
    "clientmethod",
    "foreignkey",
    "index",
    "method",
    "parameter",
    "projection",
    "property",
    "query",
    "relationship",
    "storage",
    "trigger",
    "xdata",
];

fn keywords() -> Item {
    opt(vec![n("keyword_list")])
}

fn name_list() -> Item {
    choice(vec![
        vec![kind(K::Identifier)],
        vec![
            sym("("),
            list1(vec![kind(K::Identifier)], sym(",")),
            sym(")"),
        ],
    ])
}

pub fn grammar() -> Grammar {
    let mut b = GrammarBuilder::new(GrammarId::UDL);
    b.start("_document");
    b.slot("method_code", GrammarId::CORE, None)
        .slot("method_expression", GrammarId::EXPR, None);
    let mut resync: Vec<Terminal> = MEMBER_KEYWORDS
        .iter()
        .copied()
        .map(Terminal::Keyword)
        .collect();
    resync.push(Terminal::Sym("}"));
    b.resync(&resync);

    b.rule("_document", vec![vec![many1(vec![n("_top_item")])]]);
    b.rule(
        "_top_item",
        vec![
            vec![n("include_clause")],
            vec![n("import_clause")],
            vec![n("class_definition")],
        ],
    );
    b.rule(
        "include_clause",
        vec![
            vec![kw("include"), name_list()],
            vec![kw("includegenerator"), name_list()],
        ],
    );
    b.rule("import_clause", vec![vec![kw("import"), name_list()]]);

    b.rule(
        "class_definition",
        vec![vec![
            kw("class"),
            kind(K::Identifier),
            opt(vec![n("class_extends")]),
            keywords(),
            n("class_body"),
        ]],
    );
    b.rule("class_extends", vec![vec![kw("extends"), name_list()]]);
    b.rule(
        "class_body",
        vec![vec![sym("{"), opt(vec![many1(vec![n("_member")])]), sym("}")]],
    );

    // === KEYWORD LISTS ===

    b.rule(
        "keyword_list",
        vec![
            vec![sym("["), sym("]")],
            vec![sym("["), list1(vec![n("keyword")], sym(",")), sym("]")],
        ],
    );
    b.rule(
        "keyword",
        vec![
            vec![kind(K::Identifier)],
            vec![kw("not"), kind(K::Identifier)],
            vec![kind(K::Identifier), sym("="), n("_keyword_value")],
        ],
    );
    b.rule(
        "_keyword_value",
        vec![
            vec![kind(K::Identifier)],
            vec![kind(K::String)],
            vec![kind(K::Number)],
            vec![n("signed_number")],
            vec![n("keyword_value_list")],
            vec![n("braced_expression")],
            vec![n("code_snippet")],
        ],
    );
    b.rule(
        "braced_expression",
        vec![
            vec![sym("{"), sym("}")],
            vec![sym("{"), embed("method_expression"), sym("}")],
        ],
    );
    b.rule(
        "code_snippet",
        vec![vec![sym("{"), embed("method_code"), sym("}")]],
    );
    b.rule(
        "signed_number",
        vec![vec![choice(vec![vec![sym("-")], vec![sym("+")]]), kind(K::Number)]],
    );
    b.rule(
        "keyword_value_list",
        vec![
            vec![sym("("), sym(")")],
            vec![
                sym("("),
                list1(vec![n("_keyword_value")], sym(",")),
                sym(")"),
            ],
        ],
    );

    // === TYPES ===

    b.rule(
        "typename",
        vec![
            vec![kind(K::Identifier)],
            vec![
                kind(K::Identifier),
                sym("("),
                list1(vec![n("type_parameter")], sym(",")),
                sym(")"),
            ],
            vec![kind(K::Identifier), kw("of"), kind(K::Identifier)],
        ],
    );
    b.rule(
        "type_parameter",
        vec![vec![kind(K::Identifier), sym("="), n("_keyword_value")]],
    );
    b.rule("return_type", vec![vec![kw("as"), n("typename")]]);

    // === MEMBERS ===

    b.rule(
        "_member",
        vec![
            vec![n("method")],
            vec![n("property")],
            vec![n("parameter")],
            vec![n("relationship")],
            vec![n("foreignkey")],
            vec![n("index")],
            vec![n("projection")],
            vec![n("query")],
            vec![n("trigger")],
            vec![n("xdata")],
            vec![n("storage")],
        ],
    );
    b.rule(
        "method",
        vec![vec![
            choice(vec![
                vec![kw("method")],
                vec![kw("classmethod")],
                vec![kw("clientmethod")],
            ]),
            n("_member_name"),
            n("arguments"),
            opt(vec![n("return_type")]),
            keywords(),
            n("method_body"),
        ]],
    );
    b.rule(
        "_member_name",
        vec![vec![kind(K::Identifier)], vec![kind(K::String)]],
    );
    b.rule(
        "arguments",
        vec![
            vec![sym("("), sym(")")],
            vec![sym("("), list1(vec![n("argument")], sym(",")), sym(")")],
        ],
    );
    b.rule(
        "argument",
        vec![vec![
            opt(vec![choice(vec![vec![kw("byref")], vec![kw("output")]])]),
            kind(K::Identifier),
            opt(vec![sym("...")]),
            opt(vec![kw("as"), n("typename")]),
            opt(vec![sym("="), n("_default_value")]),
        ]],
    );
    b.rule(
        "_default_value",
        vec![
            vec![kind(K::String)],
            vec![kind(K::Number)],
            vec![n("signed_number")],
            vec![kind(K::Identifier)],
            vec![n("braced_expression")],
        ],
    );
    b.rule(
        "method_body",
        vec![
            vec![sym("{"), sym("}")],
            vec![sym("{"), embed("method_code"), sym("}")],
            vec![sym("{"), embed("method_expression"), sym("}")],
            vec![sym("{"), kind(K::RawText), sym("}")],
        ],
    );
    b.rule(
        "raw_body",
        vec![
            vec![sym("{"), sym("}")],
            vec![sym("{"), kind(K::RawText), sym("}")],
        ],
    );

    b.rule(
        "property",
        vec![vec![
            kw("property"),
            kind(K::Identifier),
            opt(vec![kw("as"), n("typename")]),
            keywords(),
            sym(";"),
        ]],
    );
    b.rule(
        "parameter",
        vec![vec![
            kw("parameter"),
            kind(K::Identifier),
            opt(vec![kw("as"), kind(K::Identifier)]),
            keywords(),
            opt(vec![sym("="), n("_keyword_value")]),
            sym(";"),
        ]],
    );
    b.rule(
        "relationship",
        vec![vec![
            kw("relationship"),
            kind(K::Identifier),
            kw("as"),
            n("typename"),
            keywords(),
            sym(";"),
        ]],
    );
    b.rule(
        "foreignkey",
        vec![vec![
            kw("foreignkey"),
            kind(K::Identifier),
            sym("("),
            list1(vec![kind(K::Identifier)], sym(",")),
            sym(")"),
            kw("references"),
            kind(K::Identifier),
            sym("("),
            opt(vec![kind(K::Identifier)]),
            sym(")"),
            keywords(),
            sym(";"),
        ]],
    );
    b.rule(
        "index",
        vec![vec![
            kw("index"),
            kind(K::Identifier),
            kw("on"),
            name_list(),
            keywords(),
            sym(";"),
        ]],
    );
    b.rule(
        "projection",
        vec![vec![
            kw("projection"),
            kind(K::Identifier),
            kw("as"),
            n("typename"),
            keywords(),
            sym(";"),
        ]],
    );
    b.rule(
        "query",
        vec![vec![
            kw("query"),
            kind(K::Identifier),
            n("arguments"),
            kw("as"),
            n("typename"),
            keywords(),
            n("raw_body"),
        ]],
    );
    b.rule(
        "trigger",
        vec![vec![
            kw("trigger"),
            kind(K::Identifier),
            keywords(),
            n("method_body"),
        ]],
    );
    b.rule(
        "xdata",
        vec![vec![kw("xdata"), kind(K::Identifier), keywords(), n("raw_body")]],
    );
    b.rule(
        "storage",
        vec![vec![kw("storage"), kind(K::Identifier), keywords(), n("raw_body")]],
    );

    b.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::definition::Symbol;
    use crate::lexical::keywords::member_body;
    use crate::lexical::BodyKind;

    #[test]
    fn test_member_endings_agree_with_lexer_arming() {
        let g = grammar();
        for keyword in MEMBER_KEYWORDS {
            let expected = match member_body(keyword) {
                Some(BodyKind::Code) => "method_body",
                Some(BodyKind::Raw) => "raw_body",
                _ => "';'",
            };
            let endings: Vec<String> = g
                .rules
                .iter()
                .flat_map(|r| r.alternatives.iter())
                .filter(|a| a.symbols.first() == Some(&Symbol::T(Terminal::Keyword(*keyword))))
                .map(|a| a.symbols.last().map(|s| s.to_string()).unwrap_or_default())
                .collect();
            assert!(!endings.is_empty(), "no member rule for {}", keyword);
            assert!(
                endings.iter().all(|e| e == expected),
                "{} ends in {:?}",
                keyword,
                endings
            );
        }
    }

    #[test]
    fn test_slots() {
        let g = grammar();
        assert_eq!(g.embedded_grammars(), vec![GrammarId::CORE, GrammarId::EXPR]);
        assert!(g.resync.contains(&Terminal::Keyword("method")));
    }
}

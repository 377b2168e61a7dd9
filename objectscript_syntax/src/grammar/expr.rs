//! Expression grammar
//!
//! Standalone expression fragments, expression-mode method bodies, and every
//! operand position of the command grammar.
//!
//! Conflict sites:
//! - Unary versus binary `-`/`+`: the prefix alternatives carry the `unary`
//!   level, which binds tighter than every binary level.
//! - `?` after an operand: the lexer has already scanned the pattern into a
//!   single `Pattern` token, so the right operand is never an expression.
//! - Argument lists allow empty slots (`f(a,,b)`); the left-recursive list
//!   keeps them unambiguous.

use crate::grammar::builder::*;
use crate::grammar::definition::{Grammar, GrammarId, Terminal};
use crate::grammar::precedence::PrecedenceLevel;
use crate::tokens::TokenKind as K;

/// Binary operator levels, loosest first, then the prefix level
pub fn precedence_levels() -> Vec<PrecedenceLevel> {
    vec![
        PrecedenceLevel::left("or", &["!", "||", "'!"]),
        PrecedenceLevel::left("and", &["&", "&&", "'&"]),
        PrecedenceLevel::left(
            "comparison",
            &[
                "=", "'=", "<", ">", "<=", ">=", "'<", "'>", "[", "'[", "]", "']", "]]", "']]",
                "?", "'?",
            ],
        ),
        PrecedenceLevel::left("concatenation", &["_"]),
        PrecedenceLevel::left("additive", &["+", "-"]),
        PrecedenceLevel::left("multiplicative", &["*", "/", "\\", "#"]),
        PrecedenceLevel::right("exponent", &["**"]),
        PrecedenceLevel::prefix("unary"),
    ]
}

/// Operators whose right operand is a pattern rather than an expression
const PATTERN_OPERATORS: &[&str] = &["?", "'?"];

fn subscripts() -> Item {
    opt(vec![sym("("), n("_subscripts"), sym(")")])
}

pub fn grammar() -> Grammar {
    let mut b = GrammarBuilder::new(GrammarId::EXPR);
    b.start("_expression");
    for rule in ["lvn", "glvn", "method_args", "macro", "class_name", "_assignable"] {
        b.export(rule);
    }
    for level in precedence_levels() {
        b.level(level);
    }
    b.resync(&[Terminal::Sym(","), Terminal::Sym(")")]);

    b.rule(
        "_expression",
        vec![
            vec![n("_primary")],
            vec![n("binary_expression")],
            vec![n("unary_expression")],
        ],
    );

    let mut binary = Vec::new();
    for level in precedence_levels() {
        for op in level.operators {
            if PATTERN_OPERATORS.contains(&op) {
                binary.push(alt(vec![n("_expression"), sym(op), n("_pattern_operand")]).binary());
            } else {
                binary.push(alt(vec![n("_expression"), sym(op), n("_expression")]).binary());
            }
        }
    }
    b.rule("binary_expression", binary);

    b.rule(
        "unary_expression",
        vec![
            alt(vec![sym("-"), n("_expression")]).prec("unary"),
            alt(vec![sym("+"), n("_expression")]).prec("unary"),
            alt(vec![sym("'"), n("_expression")]).prec("unary"),
        ],
    );

    b.rule(
        "_pattern_operand",
        vec![vec![kind(K::Pattern)], vec![n("indirection")]],
    );

    b.rule(
        "_primary",
        vec![
            vec![kind(K::Number)],
            vec![kind(K::String)],
            vec![kind(K::SqlFieldReference)],
            vec![kind(K::InstanceVariable)],
            vec![kind(K::SystemVariable)],
            vec![n("lvn")],
            vec![n("gvn")],
            vec![n("ssvn")],
            vec![n("system_function")],
            vec![n("macro")],
            vec![n("extrinsic_function")],
            vec![n("class_method_call")],
            vec![n("class_parameter_ref")],
            vec![n("superclass_method_call")],
            vec![n("relative_dot_method")],
            vec![n("relative_dot_property")],
            vec![n("relative_dot_parameter")],
            vec![n("oref_method_call")],
            vec![n("oref_property")],
            vec![n("oref_parameter")],
            vec![n("indirection")],
            vec![n("parenthetical_expression")],
            vec![n("json_object_literal")],
            vec![n("json_array_literal")],
        ],
    );

    // === VARIABLES ===

    b.rule("lvn", vec![vec![kind(K::Identifier), subscripts()]]);
    b.rule(
        "gvn",
        vec![
            vec![sym("^"), opt(vec![sym("||")]), kind(K::Identifier), subscripts()],
            vec![sym("^"), sym("("), n("_subscripts"), sym(")")],
        ],
    );
    b.rule("ssvn", vec![vec![sym("^$"), kind(K::Identifier), subscripts()]]);
    b.rule(
        "glvn",
        vec![vec![n("lvn")], vec![n("gvn")], vec![n("ssvn")]],
    );
    b.rule(
        "_subscripts",
        vec![vec![list1(vec![n("_expression")], sym(","))]],
    );

    // === CALLS ===

    b.rule(
        "system_function",
        vec![vec![
            kind(K::SystemFunction),
            sym("("),
            opt(vec![n("_argument_list")]),
            sym(")"),
        ]],
    );
    b.rule("macro", vec![vec![kind(K::Macro), opt(vec![n("method_args")])]]);
    b.rule(
        "extrinsic_function",
        vec![vec![sym("$$"), n("_label_ref"), opt(vec![n("method_args")])]],
    );
    b.rule(
        "_label_ref",
        vec![
            vec![kind(K::Identifier)],
            vec![kind(K::Identifier), sym("^"), kind(K::Identifier)],
            vec![sym("^"), kind(K::Identifier)],
        ],
    );
    b.rule(
        "method_args",
        vec![vec![sym("("), opt(vec![n("_argument_list")]), sym(")")]],
    );
    b.rule(
        "_argument_list",
        vec![
            vec![n("_argument")],
            vec![n("_argument_list"), sym(","), n("_argument")],
            vec![n("_argument_list"), sym(",")],
            vec![sym(","), opt(vec![n("_argument")])],
        ],
    );
    b.rule(
        "_argument",
        vec![
            vec![n("_expression")],
            vec![n("by_ref_argument")],
            vec![n("variadic_argument")],
            vec![n("case_argument")],
            vec![n("case_default")],
        ],
    );
    b.rule("by_ref_argument", vec![vec![sym("."), kind(K::Identifier)]]);
    b.rule("variadic_argument", vec![vec![kind(K::Identifier), sym("...")]]);
    b.rule(
        "case_argument",
        vec![vec![n("_expression"), sym(":"), n("_expression")]],
    );
    b.rule("case_default", vec![vec![sym(":"), n("_expression")]]);

    // === CLASSES AND OBJECTS ===

    b.rule(
        "class_name",
        vec![vec![list1(vec![kind(K::Identifier)], sym("."))]],
    );
    b.rule(
        "_class_ref",
        vec![vec![sym("##class"), sym("("), n("class_name"), sym(")")]],
    );
    b.rule(
        "class_method_call",
        vec![vec![
            n("_class_ref"),
            sym("."),
            n("_member_name"),
            n("method_args"),
        ]],
    );
    b.rule(
        "class_parameter_ref",
        vec![vec![n("_class_ref"), sym("."), sym("#"), kind(K::Identifier)]],
    );
    b.rule("superclass_method_call", vec![vec![sym("##super"), n("method_args")]]);
    b.rule(
        "relative_dot_method",
        vec![vec![sym(".."), n("_member_name"), n("method_args")]],
    );
    b.rule("relative_dot_property", vec![vec![sym(".."), n("_member_name")]]);
    b.rule(
        "relative_dot_parameter",
        vec![vec![sym(".."), sym("#"), kind(K::Identifier)]],
    );
    b.rule(
        "_member_name",
        vec![vec![kind(K::Identifier)], vec![kind(K::String)]],
    );
    b.rule(
        "_chainable",
        vec![
            vec![n("lvn")],
            vec![kind(K::SystemVariable)],
            vec![kind(K::InstanceVariable)],
            vec![n("macro")],
            vec![n("system_function")],
            vec![n("class_method_call")],
            vec![n("superclass_method_call")],
            vec![n("relative_dot_method")],
            vec![n("relative_dot_property")],
            vec![n("oref_method_call")],
            vec![n("oref_property")],
            vec![n("parenthetical_expression")],
        ],
    );
    b.rule(
        "oref_method_call",
        vec![vec![
            n("_chainable"),
            sym("."),
            n("_member_name"),
            n("method_args"),
        ]],
    );
    b.rule(
        "oref_property",
        vec![vec![n("_chainable"), sym("."), n("_member_name")]],
    );
    b.rule(
        "oref_parameter",
        vec![vec![n("_chainable"), sym("."), sym("#"), kind(K::Identifier)]],
    );

    // === OTHER ATOMS ===

    b.rule(
        "indirection",
        vec![
            vec![sym("@"), n("_indirect_target")],
            vec![
                sym("@"),
                n("_indirect_target"),
                sym("@"),
                sym("("),
                n("_subscripts"),
                sym(")"),
            ],
        ],
    );
    b.rule(
        "_indirect_target",
        vec![
            vec![n("lvn")],
            vec![n("gvn")],
            vec![kind(K::String)],
            vec![n("relative_dot_property")],
            vec![n("parenthetical_expression")],
        ],
    );
    b.rule(
        "parenthetical_expression",
        vec![vec![sym("("), n("_expression"), sym(")")]],
    );
    b.rule(
        "json_object_literal",
        vec![
            vec![sym("{"), sym("}")],
            vec![sym("{"), list1(vec![n("json_pair")], sym(",")), sym("}")],
        ],
    );
    b.rule(
        "json_pair",
        vec![vec![kind(K::String), sym(":"), n("_expression")]],
    );
    b.rule(
        "json_array_literal",
        vec![
            vec![sym("["), sym("]")],
            vec![sym("["), list1(vec![n("_expression")], sym(",")), sym("]")],
        ],
    );

    // === ASSIGNMENT TARGETS ===

    b.rule(
        "_assignable",
        vec![
            vec![n("lvn")],
            vec![n("gvn")],
            vec![kind(K::InstanceVariable)],
            vec![kind(K::SystemVariable)],
            vec![kind(K::SqlFieldReference)],
            vec![n("system_function")],
            vec![n("oref_property")],
            vec![n("relative_dot_property")],
            vec![n("indirection")],
            vec![n("macro")],
        ],
    );

    b.build()
}

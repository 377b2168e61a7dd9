//! Command grammar
//!
//! Lines of labels, commands and preprocessor directives. Every operand
//! position delegates to the expression grammar through a slot.
//!
//! Conflict sites:
//! - `do label` versus `do expression`: both derive `do_argument` over the
//!   same tokens; the routine alternatives are declared first and win the
//!   merge.
//! - Old-style `else` versus block `else`: the token matches both command
//!   terminals; the fork that does not see `{` dies.
//! - `}` then newline inside `if`/`try`: the newline may start an `elseif`,
//!   `else` or `catch` continuation or end the statement. Both forks run
//!   until the next command decides.
//! - Set target versus comparison `=`: targets come from `assignable`, which
//!   never derives a comparison, so the comparison fork dies.
//! - Pattern `?` versus write tab `?`: the lexer only produces a pattern
//!   after an operand.

use crate::grammar::builder::*;
use crate::grammar::definition::{Grammar, GrammarId, Terminal};
use crate::tokens::TokenKind as K;

/// Optional `:condition`
fn pc() -> Item {
    opt(vec![n("postconditional")])
}

fn expression() -> Item {
    embed("expression")
}

fn expressions() -> Item {
    list1(vec![expression()], sym(","))
}

/// `name: keyword [:cond] [arguments]`
fn simple(b: &mut GrammarBuilder, rule: &str, command: &'static str, arguments: Option<Item>) {
    let mut items = vec![cmd(command), pc()];
    if let Some(arguments) = arguments {
        items.push(opt(vec![arguments]));
    }
    b.rule(rule, vec![items]);
}

pub fn grammar() -> Grammar {
    let mut b = GrammarBuilder::new(GrammarId::CORE);
    b.start("_body");
    b.slot("expression", GrammarId::EXPR, None)
        .slot("assignable", GrammarId::EXPR, Some("_assignable"))
        .slot("lvn", GrammarId::EXPR, Some("lvn"))
        .slot("glvn", GrammarId::EXPR, Some("glvn"))
        .slot("method_args", GrammarId::EXPR, Some("method_args"))
        .slot("macro", GrammarId::EXPR, Some("macro"))
        .slot("class_name", GrammarId::EXPR, Some("class_name"));
    b.resync(&[
        Terminal::Kind(K::Newline),
        Terminal::Kind(K::Command),
        Terminal::Kind(K::Label),
        Terminal::Kind(K::Directive),
        Terminal::Sym("}"),
    ]);

    // === LINES ===

    b.rule("_body", vec![vec![many1(vec![n("_line_item")])]]);
    b.rule(
        "_line_item",
        vec![
            vec![kind(K::Newline)],
            vec![n("statement")],
            vec![n("dotted_statement")],
            vec![n("tag")],
            vec![n("tag_with_params")],
            vec![n("procedure")],
            vec![n("_preprocessor")],
        ],
    );
    b.rule("statement", vec![vec![n("_command")]]);
    b.rule(
        "dotted_statement",
        vec![vec![many1(vec![sym(".")]), n("statement")]],
    );
    b.rule("block", vec![vec![sym("{"), opt(vec![n("_body")]), sym("}")]]);
    b.rule("_newlines", vec![vec![many1(vec![kind(K::Newline)])]]);
    b.rule("postconditional", vec![vec![sym(":"), expression()]]);

    // === LABELS ===

    b.rule("tag", vec![vec![kind(K::Label)]]);
    b.rule(
        "tag_with_params",
        vec![vec![
            kind(K::Label),
            sym("("),
            opt(vec![n("_formal_list")]),
            sym(")"),
        ]],
    );
    b.rule(
        "procedure",
        vec![vec![
            kind(K::Label),
            sym("("),
            opt(vec![n("_formal_list")]),
            sym(")"),
            opt(vec![n("public_variables")]),
            opt(vec![n("_procedure_access")]),
            n("block"),
        ]],
    );
    b.rule(
        "_formal_list",
        vec![vec![list1(vec![n("formal_parameter")], sym(","))]],
    );
    b.rule(
        "formal_parameter",
        vec![
            vec![kind(K::Identifier)],
            vec![kind(K::Identifier), sym("="), expression()],
            vec![kind(K::Identifier), sym("...")],
        ],
    );
    b.rule(
        "public_variables",
        vec![vec![
            sym("["),
            opt(vec![list1(vec![kind(K::Identifier)], sym(","))]),
            sym("]"),
        ]],
    );
    b.rule(
        "_procedure_access",
        vec![vec![kw("public")], vec![kw("private")], vec![kw("methodimpl")]],
    );

    // === COMMANDS ===

    b.rule(
        "_command",
        vec![
            vec![n("command_set")],
            vec![n("command_write")],
            vec![n("command_do")],
            vec![n("command_do_while")],
            vec![n("command_if")],
            vec![n("command_else")],
            vec![n("command_for")],
            vec![n("command_while")],
            vec![n("command_kill")],
            vec![n("command_lock")],
            vec![n("command_read")],
            vec![n("command_open")],
            vec![n("command_use")],
            vec![n("command_close")],
            vec![n("command_new")],
            vec![n("command_quit")],
            vec![n("command_return")],
            vec![n("command_goto")],
            vec![n("command_halt")],
            vec![n("command_hang")],
            vec![n("command_job")],
            vec![n("command_merge")],
            vec![n("command_xecute")],
            vec![n("command_view")],
            vec![n("command_break")],
            vec![n("command_throw")],
            vec![n("command_try")],
            vec![n("command_tstart")],
            vec![n("command_tcommit")],
            vec![n("command_trollback")],
            vec![n("command_continue")],
            vec![n("command_zwrite")],
            vec![n("command_zkill")],
            vec![n("command_znspace")],
            vec![n("command_ztrap")],
            vec![n("command_zsu")],
            vec![n("command_zbreak")],
            vec![n("command_z")],
            vec![n("macro_statement")],
            vec![n("embedded_sql")],
            vec![n("embedded_html")],
            vec![n("embedded_js")],
            vec![n("embedded_xml")],
        ],
    );

    // set
    b.rule(
        "command_set",
        vec![vec![
            cmd("set"),
            pc(),
            list1(vec![n("set_argument")], sym(",")),
        ]],
    );
    b.rule(
        "set_argument",
        vec![
            vec![embed("assignable"), sym("="), expression()],
            vec![
                sym("("),
                list1(vec![embed("assignable")], sym(",")),
                sym(")"),
                sym("="),
                expression(),
            ],
        ],
    );

    // write and its format controls
    simple(
        &mut b,
        "command_write",
        "write",
        Some(list1(vec![n("_write_argument")], sym(","))),
    );
    b.rule(
        "_write_argument",
        vec![
            vec![expression()],
            vec![n("write_format")],
            vec![n("write_format"), expression()],
            vec![n("write_tab")],
            vec![n("write_char")],
            vec![n("write_mnemonic")],
        ],
    );
    b.rule(
        "write_format",
        vec![vec![many1(vec![choice(vec![vec![sym("!")], vec![sym("#")]])])]],
    );
    b.rule("write_tab", vec![vec![sym("?"), expression()]]);
    b.rule("write_char", vec![vec![sym("*"), expression()]]);
    b.rule(
        "write_mnemonic",
        vec![vec![
            sym("/"),
            kind(K::Identifier),
            opt(vec![embed("method_args")]),
        ]],
    );

    // do
    simple(
        &mut b,
        "command_do",
        "do",
        Some(list1(vec![n("do_argument")], sym(","))),
    );
    b.rule(
        "do_argument",
        vec![
            vec![n("routine_ref"), pc()],
            vec![n("routine_ref"), embed("method_args"), pc()],
            vec![expression(), pc()],
        ],
    );
    b.rule(
        "command_do_while",
        vec![vec![cmd("do"), n("block"), cmd("while"), expressions()]],
    );
    b.rule(
        "routine_ref",
        vec![
            vec![
                kind(K::Identifier),
                opt(vec![sym("+"), kind(K::Number)]),
                opt(vec![sym("^"), kind(K::Identifier)]),
            ],
            vec![sym("^"), kind(K::Identifier)],
        ],
    );

    // if / elseif / else
    b.rule(
        "command_if",
        vec![
            vec![cmd("if")],
            vec![cmd("if"), expressions()],
            vec![
                cmd("if"),
                expressions(),
                n("block"),
                opt(vec![many1(vec![n("_elseif_part")])]),
                opt(vec![opt(vec![n("_newlines")]), n("else_block")]),
            ],
        ],
    );
    b.rule(
        "_elseif_part",
        vec![vec![opt(vec![n("_newlines")]), n("elseif_block")]],
    );
    b.rule(
        "elseif_block",
        vec![vec![cmd("elseif"), expressions(), n("block")]],
    );
    b.rule("else_block", vec![vec![cmd("else"), n("block")]]);
    b.rule("command_else", vec![vec![cmd("oldelse"), pc()]]);

    // loops
    b.rule(
        "command_for",
        vec![
            vec![cmd("for"), opt(vec![n("for_parameter")])],
            vec![cmd("for"), opt(vec![n("for_parameter")]), n("block")],
        ],
    );
    b.rule(
        "for_parameter",
        vec![vec![
            embed("lvn"),
            sym("="),
            list1(vec![n("for_range")], sym(",")),
        ]],
    );
    b.rule(
        "for_range",
        vec![vec![
            expression(),
            opt(vec![sym(":"), expression(), opt(vec![sym(":"), expression()])]),
        ]],
    );
    b.rule(
        "command_while",
        vec![vec![cmd("while"), expressions(), n("block")]],
    );

    // variables and locks
    simple(
        &mut b,
        "command_kill",
        "kill",
        Some(list1(vec![n("_kill_argument")], sym(","))),
    );
    b.rule(
        "_kill_argument",
        vec![vec![embed("glvn")], vec![n("exclusive_list")]],
    );
    b.rule(
        "exclusive_list",
        vec![vec![sym("("), list1(vec![embed("lvn")], sym(",")), sym(")")]],
    );
    simple(
        &mut b,
        "command_new",
        "new",
        Some(list1(vec![n("_new_argument")], sym(","))),
    );
    b.rule(
        "_new_argument",
        vec![
            vec![kind(K::Identifier)],
            vec![kind(K::SystemVariable)],
            vec![n("exclusive_list")],
        ],
    );
    simple(
        &mut b,
        "command_lock",
        "lock",
        Some(list1(vec![n("lock_argument")], sym(","))),
    );
    b.rule(
        "lock_argument",
        vec![vec![
            opt(vec![choice(vec![vec![sym("+")], vec![sym("-")]])]),
            n("_lock_target"),
            opt(vec![sym("#"), kind(K::String)]),
            opt(vec![sym(":"), expression()]),
        ]],
    );
    b.rule(
        "_lock_target",
        vec![
            vec![embed("glvn")],
            vec![sym("("), list1(vec![embed("glvn")], sym(",")), sym(")")],
        ],
    );
    b.rule(
        "command_merge",
        vec![vec![
            cmd("merge"),
            pc(),
            list1(vec![n("merge_argument")], sym(",")),
        ]],
    );
    b.rule(
        "merge_argument",
        vec![vec![embed("glvn"), sym("="), embed("glvn")]],
    );

    // devices
    b.rule(
        "command_read",
        vec![vec![
            cmd("read"),
            pc(),
            list1(vec![n("_read_argument")], sym(",")),
        ]],
    );
    b.rule(
        "_read_argument",
        vec![
            vec![kind(K::String)],
            vec![n("write_format")],
            vec![n("write_tab")],
            vec![n("read_target")],
        ],
    );
    b.rule(
        "read_target",
        vec![vec![
            opt(vec![sym("*")]),
            embed("glvn"),
            opt(vec![sym("#"), expression()]),
            opt(vec![sym(":"), expression()]),
        ]],
    );
    for (rule, command) in [
        ("command_open", "open"),
        ("command_use", "use"),
        ("command_close", "close"),
    ] {
        b.rule(
            rule,
            vec![vec![
                cmd(command),
                pc(),
                list1(vec![n("io_argument")], sym(",")),
            ]],
        );
    }
    b.rule(
        "io_argument",
        vec![vec![expression(), opt(vec![n("_io_tail")])]],
    );
    b.rule(
        "_io_tail",
        vec![
            vec![sym(":")],
            vec![sym(":"), n("_io_parameter")],
            vec![n("_io_tail"), sym(":")],
            vec![n("_io_tail"), sym(":"), n("_io_parameter")],
        ],
    );
    b.rule(
        "_io_parameter",
        vec![vec![expression()], vec![n("io_parameter_list")]],
    );
    b.rule(
        "io_parameter_list",
        vec![vec![
            sym("("),
            list1(vec![n("_io_parameter_item")], sym(":")),
            sym(")"),
        ]],
    );
    b.rule(
        "_io_parameter_item",
        vec![vec![expression()], vec![n("io_keyword")]],
    );
    b.rule(
        "io_keyword",
        vec![vec![
            sym("/"),
            kind(K::Identifier),
            opt(vec![sym("="), expression()]),
        ]],
    );

    // flow control
    simple(&mut b, "command_quit", "quit", Some(expression()));
    simple(&mut b, "command_return", "return", Some(expression()));
    simple(
        &mut b,
        "command_goto",
        "goto",
        Some(list1(vec![n("goto_argument")], sym(","))),
    );
    b.rule("goto_argument", vec![vec![n("routine_ref"), pc()]]);
    simple(&mut b, "command_halt", "halt", None);
    b.rule(
        "command_hang",
        vec![vec![cmd("hang"), pc(), expressions()]],
    );
    b.rule(
        "command_job",
        vec![vec![
            cmd("job"),
            pc(),
            list1(vec![n("job_argument")], sym(",")),
        ]],
    );
    b.rule(
        "job_argument",
        vec![
            vec![
                n("routine_ref"),
                opt(vec![embed("method_args")]),
                opt(vec![n("_io_tail")]),
            ],
            vec![expression(), opt(vec![n("_io_tail")])],
        ],
    );
    b.rule(
        "command_xecute",
        vec![vec![
            cmd("xecute"),
            pc(),
            list1(vec![n("xecute_argument")], sym(",")),
        ]],
    );
    b.rule("xecute_argument", vec![vec![expression(), pc()]]);
    b.rule(
        "command_view",
        vec![vec![
            cmd("view"),
            pc(),
            list1(vec![n("view_argument")], sym(",")),
        ]],
    );
    b.rule(
        "view_argument",
        vec![vec![list1(vec![expression()], sym(":"))]],
    );
    simple(&mut b, "command_break", "break", Some(expression()));
    simple(&mut b, "command_throw", "throw", Some(expression()));
    simple(&mut b, "command_continue", "continue", None);

    // try / catch
    b.rule(
        "command_try",
        vec![vec![
            cmd("try"),
            n("block"),
            opt(vec![n("_newlines")]),
            n("catch_block"),
        ]],
    );
    b.rule(
        "catch_block",
        vec![
            vec![cmd("catch"), n("block")],
            vec![cmd("catch"), kind(K::Identifier), n("block")],
            vec![
                cmd("catch"),
                sym("("),
                kind(K::Identifier),
                sym(")"),
                n("block"),
            ],
        ],
    );

    // transactions
    simple(&mut b, "command_tstart", "tstart", Some(expression()));
    simple(&mut b, "command_tcommit", "tcommit", None);
    simple(&mut b, "command_trollback", "trollback", Some(expression()));

    // z commands
    simple(&mut b, "command_zwrite", "zwrite", Some(expressions()));
    b.rule(
        "command_zkill",
        vec![vec![
            cmd("zkill"),
            pc(),
            list1(vec![embed("glvn")], sym(",")),
        ]],
    );
    b.rule(
        "command_znspace",
        vec![vec![cmd("znspace"), pc(), expression()]],
    );
    simple(&mut b, "command_ztrap", "ztrap", Some(expression()));
    simple(&mut b, "command_zsu", "zsu", Some(expressions()));
    simple(&mut b, "command_zbreak", "zbreak", Some(expressions()));
    simple(&mut b, "command_z", "zz", Some(expressions()));

    b.rule("macro_statement", vec![vec![embed("macro")]]);

    // === PREPROCESSOR ===

    b.rule(
        "_preprocessor",
        vec![
            vec![n("pound_define")],
            vec![n("pound_def1arg")],
            vec![n("pound_undef")],
            vec![n("pound_if")],
            vec![n("pound_ifdef")],
            vec![n("pound_ifndef")],
            vec![n("pound_elseif")],
            vec![n("pound_else")],
            vec![n("pound_endif")],
            vec![n("pound_include")],
            vec![n("pound_import")],
            vec![n("pound_dim")],
            vec![n("pound_sqlcompile")],
            vec![n("pound_execute")],
        ],
    );
    for (rule, directive) in [("pound_define", "#define"), ("pound_def1arg", "#def1arg")] {
        b.rule(
            rule,
            vec![vec![
                dir(directive),
                kind(K::Identifier),
                opt(vec![n("macro_parameters")]),
                opt(vec![kind(K::RawText)]),
            ]],
        );
    }
    b.rule(
        "macro_parameters",
        vec![vec![
            sym("("),
            opt(vec![list1(vec![kind(K::Identifier)], sym(","))]),
            sym(")"),
        ]],
    );
    b.rule("pound_undef", vec![vec![dir("#undef"), kind(K::Identifier)]]);
    b.rule("pound_if", vec![vec![dir("#if"), expression()]]);
    b.rule("pound_ifdef", vec![vec![dir("#ifdef"), kind(K::Identifier)]]);
    b.rule("pound_ifndef", vec![vec![dir("#ifndef"), kind(K::Identifier)]]);
    b.rule("pound_elseif", vec![vec![dir("#elseif"), expression()]]);
    b.rule("pound_else", vec![vec![dir("#else")]]);
    b.rule("pound_endif", vec![vec![dir("#endif")]]);
    b.rule("pound_execute", vec![vec![dir("#execute")]]);
    b.rule(
        "pound_include",
        vec![vec![dir("#include"), kind(K::Identifier)]],
    );
    b.rule(
        "pound_import",
        vec![vec![
            dir("#import"),
            list1(vec![embed("class_name")], sym(",")),
        ]],
    );
    b.rule(
        "pound_dim",
        vec![vec![
            dir("#dim"),
            list1(vec![kind(K::Identifier)], sym(",")),
            opt(vec![kw("as"), embed("class_name")]),
            opt(vec![sym("="), expression()]),
        ]],
    );
    b.rule(
        "pound_sqlcompile",
        vec![vec![
            dir("#sqlcompile"),
            kind(K::Identifier),
            sym("="),
            expression(),
        ]],
    );

    // === EMBEDDED LANGUAGES ===

    b.rule(
        "embedded_sql",
        vec![
            vec![sym("&sql("), opt(vec![kind(K::RawText)]), sym(")")],
            vec![sym("##sql("), opt(vec![kind(K::RawText)]), sym(")")],
        ],
    );
    for (rule, opener) in [
        ("embedded_html", "&html<"),
        ("embedded_js", "&js<"),
        ("embedded_xml", "&xml<"),
    ] {
        b.rule(
            rule,
            vec![vec![sym(opener), opt(vec![kind(K::RawText)]), sym(">")]],
        );
    }

    b.build()
}

//! Word tables used by the scanner and by grammar terminals
//!
//! All lookups take lowercase text. Command words are matched against every
//! form (full and abbreviated), so one word can name several commands: `h`
//! is both `halt` and `hang`, `e` and `else` are both old-style `else`.

use crate::lexical::mode::BodyKind;

/// One command with its accepted spellings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    /// Canonical name used by grammar terminals
    pub name: &'static str,
    pub forms: &'static [&'static str],
    /// Accepts a `{` block after one space
    pub block: bool,
}

const fn cmd(name: &'static str, forms: &'static [&'static str], block: bool) -> CommandSpec {
    CommandSpec { name, forms, block }
}

pub const COMMANDS: &[CommandSpec] = &[
    cmd("set", &["s", "set"], false),
    cmd("write", &["w", "write"], false),
    cmd("do", &["d", "do"], true),
    cmd("for", &["f", "for"], true),
    cmd("while", &["while"], true),
    cmd("kill", &["k", "kill"], false),
    cmd("lock", &["l", "lock"], false),
    cmd("read", &["r", "read"], false),
    cmd("open", &["o", "open"], false),
    cmd("close", &["c", "close"], false),
    cmd("use", &["u", "use"], false),
    cmd("new", &["n", "new"], false),
    cmd("if", &["i", "if"], true),
    cmd("elseif", &["elseif"], true),
    cmd("else", &["else"], true),
    cmd("oldelse", &["e", "else"], false),
    cmd("throw", &["throw"], false),
    cmd("try", &["try"], true),
    cmd("catch", &["catch"], true),
    cmd("job", &["j", "job"], false),
    cmd("break", &["b", "break"], false),
    cmd("merge", &["m", "merge"], false),
    cmd("return", &["ret", "return"], false),
    cmd("quit", &["q", "quit"], false),
    cmd("goto", &["g", "goto"], false),
    cmd("halt", &["h", "halt"], false),
    cmd("hang", &["h", "hang"], false),
    cmd("continue", &["continue"], false),
    cmd("tcommit", &["tc", "tcommit"], false),
    cmd("trollback", &["tro", "trollback"], false),
    cmd("tstart", &["ts", "tstart"], false),
    cmd("xecute", &["x", "xecute"], false),
    cmd("view", &["v", "view"], false),
    cmd("zbreak", &["zb", "zbreak"], false),
    cmd("zkill", &["zkill"], false),
    cmd("znspace", &["zn", "znspace"], false),
    cmd("zsu", &["zsu"], false),
    cmd("ztrap", &["zt", "ztrap"], false),
    cmd("zwrite", &["zw", "zwrite"], false),
];

/// Canonical name of the generic `zz*` command
pub const GENERIC_Z_COMMAND: &str = "zz";

fn is_generic_z_command(lower: &str) -> bool {
    lower.len() > 2
        && lower.starts_with("zz")
        && lower[2..].chars().all(|c| c.is_ascii_alphanumeric())
}

pub fn find_command(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|c| c.name == name)
}

/// True if `lower` is a spelling of any command
pub fn is_command_word(lower: &str) -> bool {
    is_generic_z_command(lower) || COMMANDS.iter().any(|c| c.forms.contains(&lower))
}

/// True if `lower` spells the command with canonical `name`
pub fn command_matches(name: &str, lower: &str) -> bool {
    if name == GENERIC_Z_COMMAND {
        return is_generic_z_command(lower);
    }
    find_command(name).is_some_and(|c| c.forms.contains(&lower))
}

/// True if any command spelled `lower` takes a `{` block
pub fn is_block_command(lower: &str) -> bool {
    COMMANDS
        .iter()
        .any(|c| c.block && c.forms.contains(&lower))
}

/// Names usable as `$name(` function calls, full and abbreviated
const SYSTEM_FUNCTIONS: &[&str] = &[
    "a", "ascii", "bit", "bitcount", "bitfind", "bitlogic", "c", "case", "char", "classmethod",
    "classname", "compile", "d", "data", "decimal", "double", "e", "extract", "f", "factor",
    "find", "fn", "fnumber", "g", "get", "i", "in", "increment", "inumber", "isobject",
    "isvaliddouble", "isvalidnum", "isvector", "j", "justify", "l", "lb", "ld", "length", "lf",
    "lfs", "lg", "li", "list", "listbuild", "listdata", "listfind", "listfromstring", "listget",
    "listlength", "listnext", "listsame", "listtostring", "listupdate", "listvalid", "ll",
    "locate", "ls", "lts", "lu", "lv", "match", "method", "na", "name", "nc", "nconvert",
    "normalize", "now", "num", "number", "o", "order", "p", "parameter", "piece",
    "prefetchoff", "prefetchon", "preprocess", "property", "q", "ql", "qlength", "qs",
    "qsubscript", "query", "r", "random", "re", "replace", "reverse", "s", "sc", "sconvert",
    "select", "seq", "sequence", "sortbegin", "sortend", "st", "stack", "t", "text", "tr",
    "translate", "v", "vd", "ve", "vector", "vectordefined", "vectorop", "view", "vop", "wa",
    "wascii", "wc", "wchar", "we", "wextract", "wf", "wfind", "wiswide", "wl", "wlength", "wre",
    "wreverse", "xecute", "zabs", "zarccos", "zarcsin", "zarctan", "zb", "zbitand",
    "zbitcount", "zbitfind", "zbitget", "zbitlen", "zbitnot", "zbitor", "zbitset", "zbitstr",
    "zbitxor", "zboolean", "zc", "zconvert", "zcos", "zcot", "zcrc", "zcsc", "zcvt", "zcyc",
    "zd", "zda", "zdascii", "zdate", "zdateh", "zdatetime", "zdatetimeh", "zdc", "zdchar",
    "zdh", "zdt", "zdth", "zexp", "zf", "zh", "zhex", "ziswide", "zla", "zlascii", "zlc",
    "zlchar", "zln", "zlog", "zname", "zobjclass", "zobjclassmethod", "zobjproperty",
    "zposition", "zpower", "zqa", "zqascii", "zqc", "zqchar", "zse", "zsearch", "zsec",
    "zseek", "zsin", "zsqr", "zstrip", "zt", "ztan", "zth", "ztime", "ztimeh", "zu", "zutil",
    "zv", "zversion", "zwa", "zwascii", "zwbpack", "zwbunpack", "zwc", "zwchar", "zwidth",
    "zwpack", "zwunpack", "zzenkaku",
];

/// Names usable as `$name` special variables, full and abbreviated
const SYSTEM_VARIABLES: &[&str] = &[
    "d", "device", "ec", "ecode", "es", "estack", "et", "etrap", "h", "halt", "horolog", "i",
    "io", "j", "job", "k", "key", "namespace", "p", "principal", "q", "quit", "roles", "s", "st",
    "stack", "storage", "sy", "system", "t", "test", "this", "throwobj", "tl", "tlevel",
    "username", "x", "y", "za", "zb", "zc", "zchild", "ze", "zeof", "zeos", "zerror", "zh",
    "zhorolog", "zi", "zio", "zj", "zjob", "zm", "zmode", "zn", "zname", "znspace", "zo",
    "zorder", "zp", "zparent", "zpi", "zpos", "zposition", "zr", "zreference", "zs",
    "zstorage", "zt", "ztimestamp", "ztimezone", "ztrap", "zts", "ztz", "zv", "zversion",
];

pub fn is_system_function(lower: &str) -> bool {
    SYSTEM_FUNCTIONS.binary_search(&lower).is_ok()
}

pub fn is_system_variable(lower: &str) -> bool {
    SYSTEM_VARIABLES.binary_search(&lower).is_ok()
}

/// Preprocessor directives, without the leading `#`
const DIRECTIVES: &[&str] = &[
    "def1arg", "define", "dim", "else", "elseif", "endif", "execute", "if", "ifdef", "ifndef",
    "import", "include", "sqlcompile", "undef",
];

pub fn is_directive(lower_without_hash: &str) -> bool {
    DIRECTIVES.binary_search(&lower_without_hash).is_ok()
}

/// Directives followed by a macro name
pub fn directive_takes_macro_name(lower_without_hash: &str) -> bool {
    matches!(lower_without_hash, "define" | "def1arg" | "undef")
}

/// Directives whose remaining line is not an expression
pub fn directive_is_bare(lower_without_hash: &str) -> bool {
    matches!(lower_without_hash, "else" | "endif" | "execute")
}

/// Body armed by a class member keyword, if the word is a member keyword
pub fn member_body(lower: &str) -> Option<BodyKind> {
    match lower {
        "method" | "classmethod" | "clientmethod" | "trigger" => Some(BodyKind::Code),
        "xdata" | "storage" | "query" => Some(BodyKind::Raw),
        "property" | "parameter" | "relationship" | "foreignkey" | "index" | "projection" => {
            Some(BodyKind::None)
        }
        _ => None,
    }
}

/// Member keywords whose braced value is an expression or a code snippet
pub fn keyword_value_body(lower: &str) -> Option<BodyKind> {
    match lower {
        "initialexpression" | "condition" => Some(BodyKind::Expr),
        "sqlcomputecode" => Some(BodyKind::Code),
        _ => None,
    }
}

/// Method languages that keep an ObjectScript body
pub fn is_objectscript_language(lower: &str) -> bool {
    matches!(lower, "objectscript" | "cache" | "ispl")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_sorted_for_binary_search() {
        for table in [SYSTEM_FUNCTIONS, SYSTEM_VARIABLES, DIRECTIVES] {
            let mut sorted = table.to_vec();
            sorted.sort_unstable();
            assert_eq!(sorted, table.to_vec());
        }
    }

    #[test]
    fn test_abbreviated_commands() {
        assert!(is_command_word("s"));
        assert!(is_command_word("zzdump"));
        assert!(!is_command_word("zz"));
        assert!(!is_command_word("x1"));
        assert!(command_matches("halt", "h"));
        assert!(command_matches("hang", "h"));
        assert!(command_matches("oldelse", "else"));
        assert!(!command_matches("else", "e"));
        assert!(command_matches(GENERIC_Z_COMMAND, "zzwrite"));
        assert!(is_command_word("zsu"));
        assert!(is_directive("execute"));
        assert!(directive_is_bare("execute"));
    }

    #[test]
    fn test_block_commands() {
        assert!(is_block_command("try"));
        assert!(is_block_command("else"));
        assert!(!is_block_command("e"));
        assert!(!is_block_command("set"));
    }

    #[test]
    fn test_dollar_names() {
        assert!(is_system_function("piece"));
        assert!(is_system_function("p"));
        assert!(is_system_variable("horolog"));
        assert!(!is_system_variable("piece"));
        assert!(!is_system_function("horolog"));
    }

    #[test]
    fn test_member_keywords() {
        assert_eq!(member_body("classmethod"), Some(BodyKind::Code));
        assert_eq!(member_body("xdata"), Some(BodyKind::Raw));
        assert_eq!(member_body("property"), Some(BodyKind::None));
        assert_eq!(member_body("class"), None);
    }
}

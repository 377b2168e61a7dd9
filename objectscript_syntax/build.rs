// build.rs - compile-time limits from config/<profile>.toml
use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct Limits {
    lexical: LexicalLimits,
    syntax: SyntaxLimits,
    incremental: IncrementalLimits,
    logging: LoggingLimits,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct LexicalLimits {
    max_token_count: usize,
    max_identifier_length: usize,
    max_string_size: usize,
    metrics_buffer_size: usize,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct SyntaxLimits {
    max_error_count: usize,
    max_missing_insertions: usize,
    max_insertion_candidates: usize,
    max_error_history: usize,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct IncrementalLimits {
    relex_backoff_tokens: usize,
    max_reuse_candidates: usize,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct LoggingLimits {
    log_buffer_size: usize,
    max_log_message_length: usize,
}

/// Generated constant: name, value, and the inclusive range it must fall in
type Constant = (&'static str, usize, usize, usize);

impl Limits {
    fn sections(&self) -> Vec<(&'static str, Vec<Constant>)> {
        vec![
            (
                "lexical",
                vec![
                    ("MAX_TOKEN_COUNT", self.lexical.max_token_count, 1, 50_000_000),
                    ("MAX_IDENTIFIER_LENGTH", self.lexical.max_identifier_length, 1, usize::MAX),
                    ("MAX_STRING_SIZE", self.lexical.max_string_size, 1, usize::MAX),
                    ("METRICS_BUFFER_SIZE", self.lexical.metrics_buffer_size, 0, usize::MAX),
                ],
            ),
            (
                "syntax",
                vec![
                    ("MAX_ERROR_COUNT", self.syntax.max_error_count, 1, 100_000),
                    ("MAX_MISSING_INSERTIONS", self.syntax.max_missing_insertions, 1, 10_000),
                    ("MAX_INSERTION_CANDIDATES", self.syntax.max_insertion_candidates, 1, 10_000),
                    ("MAX_ERROR_HISTORY", self.syntax.max_error_history, 0, usize::MAX),
                ],
            ),
            (
                "incremental",
                vec![
                    ("RELEX_BACKOFF_TOKENS", self.incremental.relex_backoff_tokens, 0, 64),
                    ("MAX_REUSE_CANDIDATES", self.incremental.max_reuse_candidates, 0, usize::MAX),
                ],
            ),
            (
                "logging",
                vec![
                    ("LOG_BUFFER_SIZE", self.logging.log_buffer_size, 100, 1_000_000),
                    ("MAX_LOG_MESSAGE_LENGTH", self.logging.max_log_message_length, 64, usize::MAX),
                ],
            ),
        ]
    }
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=OBJECTSCRIPT_BUILD_PROFILE");
    println!("cargo:rerun-if-env-changed=OBJECTSCRIPT_CONFIG_DIR");

    let profile =
        env::var("OBJECTSCRIPT_BUILD_PROFILE").unwrap_or_else(|_| "development".to_string());
    let config_dir = env::var("OBJECTSCRIPT_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    let config_path = locate_profile(&config_dir, &profile);
    println!("cargo:rerun-if-changed={}", config_path.display());

    let content = fs::read_to_string(&config_path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", config_path.display(), e));
    let limits: Limits = toml::from_str(&content)
        .unwrap_or_else(|e| panic!("Invalid limits in {}: {}", config_path.display(), e));

    let sections = limits.sections();
    check_ranges(&sections);
    if profile == "production" && limits.lexical.max_token_count > 10_000_000 {
        panic!("PRODUCTION: max_token_count too high for production");
    }

    let out_dir = env::var("OUT_DIR").expect("cargo sets OUT_DIR");
    fs::write(
        Path::new(&out_dir).join("constants.rs"),
        render(&sections, &profile),
    )
    .expect("OUT_DIR is writable");
}

/// `<workspace>/<dir>/<profile>.toml`, where the workspace is the parent of
/// this crate
fn locate_profile(config_dir: &str, profile: &str) -> PathBuf {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").expect("cargo sets CARGO_MANIFEST_DIR");
    let workspace = Path::new(&manifest_dir)
        .parent()
        .expect("crate lives inside the workspace");
    let path = workspace.join(config_dir).join(format!("{}.toml", profile));
    if !path.exists() {
        panic!(
            "Limits profile not found: {} (set OBJECTSCRIPT_BUILD_PROFILE or OBJECTSCRIPT_CONFIG_DIR)",
            path.display()
        );
    }
    path
}

fn check_ranges(sections: &[(&'static str, Vec<Constant>)]) {
    for (section, constants) in sections {
        for &(name, value, min, max) in constants {
            if value < min || value > max {
                panic!(
                    "LIMIT: {}.{} = {} is outside {}..={}",
                    section,
                    name.to_ascii_lowercase(),
                    value,
                    min,
                    max
                );
            }
        }
    }
}

fn render(sections: &[(&'static str, Vec<Constant>)], profile: &str) -> String {
    let mut code = format!(
        "// Generated by build.rs from the `{}` limits profile. Do not edit.\n\npub mod compile_time {{\n",
        profile
    );
    for (section, constants) in sections {
        let _ = writeln!(code, "    pub mod {} {{", section);
        for (name, value, _, _) in constants {
            let _ = writeln!(code, "        pub const {}: usize = {};", name, value);
        }
        code.push_str("    }\n");
    }
    code.push_str("}\n");
    code
}

//! Runtime preferences
//!
//! Each field defaults from an `OBJECTSCRIPT_*` environment variable and
//! then from a built-in value. A TOML file may override any section.

use crate::logging::LogLevel;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid runtime configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn error_code(&self) -> crate::logging::Code {
        crate::logging::codes::system::CONFIGURATION_ERROR
    }
}

/// Environment override, or `default` when unset or unparsable
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexicalPreferences {
    /// Count tokens per kind while scanning
    pub collect_detailed_metrics: bool,

    /// Log each error token as it is scanned
    pub log_error_tokens: bool,
}

impl Default for LexicalPreferences {
    fn default() -> Self {
        Self {
            collect_detailed_metrics: env_or(env_vars::LEXICAL_DETAILED_METRICS, true),
            log_error_tokens: env_or(env_vars::LEXICAL_LOG_ERROR_TOKENS, false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntaxPreferences {
    /// Whether reparse may reuse subtrees of the previous result
    pub enable_subtree_reuse: bool,

    /// Log the conflicts left in a merged table for the GLR engine
    pub log_table_conflicts: bool,

    /// Log each recovery step at debug level
    pub log_recovery_steps: bool,
}

impl Default for SyntaxPreferences {
    fn default() -> Self {
        Self {
            enable_subtree_reuse: env_or(env_vars::SYNTAX_ENABLE_REUSE, true),
            log_table_conflicts: env_or(env_vars::SYNTAX_LOG_CONFLICTS, false),
            log_recovery_steps: env_or(env_vars::SYNTAX_LOG_RECOVERY, true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingPreferences {
    /// JSON lines instead of text
    pub use_structured_logging: bool,

    pub enable_console_logging: bool,

    pub min_log_level: LogLevel,
}

impl Default for LoggingPreferences {
    fn default() -> Self {
        Self {
            use_structured_logging: env_or(env_vars::LOGGING_USE_STRUCTURED, false),
            enable_console_logging: env_or(env_vars::LOGGING_ENABLE_CONSOLE, false),
            min_log_level: env_or(env_vars::LOGGING_MIN_LEVEL, LogLevel::Info),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub lexical: LexicalPreferences,
    #[serde(default)]
    pub syntax: SyntaxPreferences,
    #[serde(default)]
    pub logging: LoggingPreferences,
}

impl RuntimeConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

pub mod env_vars {
    pub const LEXICAL_DETAILED_METRICS: &str = "OBJECTSCRIPT_LEXICAL_DETAILED_METRICS";
    pub const LEXICAL_LOG_ERROR_TOKENS: &str = "OBJECTSCRIPT_LEXICAL_LOG_ERROR_TOKENS";

    pub const SYNTAX_ENABLE_REUSE: &str = "OBJECTSCRIPT_SYNTAX_ENABLE_REUSE";
    pub const SYNTAX_LOG_CONFLICTS: &str = "OBJECTSCRIPT_SYNTAX_LOG_CONFLICTS";
    pub const SYNTAX_LOG_RECOVERY: &str = "OBJECTSCRIPT_SYNTAX_LOG_RECOVERY";

    pub const LOGGING_USE_STRUCTURED: &str = "OBJECTSCRIPT_LOGGING_USE_STRUCTURED";
    pub const LOGGING_ENABLE_CONSOLE: &str = "OBJECTSCRIPT_LOGGING_ENABLE_CONSOLE";
    pub const LOGGING_MIN_LEVEL: &str = "OBJECTSCRIPT_LOGGING_MIN_LEVEL";
}

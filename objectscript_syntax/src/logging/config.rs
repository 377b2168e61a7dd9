//! Logging configuration
//!
//! Buffer sizes are compile-time constants. Verbosity and output format are
//! runtime preferences, fixed by the first caller.

use super::events::LogLevel;
use crate::config::compile_time::logging::{LOG_BUFFER_SIZE, MAX_LOG_MESSAGE_LENGTH};
use crate::config::runtime::LoggingPreferences;
use std::sync::OnceLock;

static PREFERENCES: OnceLock<LoggingPreferences> = OnceLock::new();

pub fn init_runtime_preferences(preferences: LoggingPreferences) -> Result<(), String> {
    PREFERENCES
        .set(preferences)
        .map_err(|_| "Logging preferences already initialized".to_string())
}

fn preferences() -> &'static LoggingPreferences {
    PREFERENCES.get_or_init(LoggingPreferences::default)
}

pub fn get_min_log_level() -> LogLevel {
    preferences().min_log_level
}

pub fn use_structured_logging() -> bool {
    preferences().use_structured_logging
}

pub fn use_console_logging() -> bool {
    preferences().enable_console_logging
}

pub fn get_log_buffer_size() -> usize {
    LOG_BUFFER_SIZE
}

/// Reject compile-time limits a build profile should never set
pub fn validate_config() -> Result<(), String> {
    if LOG_BUFFER_SIZE == 0 || LOG_BUFFER_SIZE > 1_000_000 {
        return Err(format!("Log buffer size out of range: {}", LOG_BUFFER_SIZE));
    }
    if MAX_LOG_MESSAGE_LENGTH < 64 {
        return Err(format!(
            "Max log message length too small: {}",
            MAX_LOG_MESSAGE_LENGTH
        ));
    }
    Ok(())
}

pub fn get_config_summary() -> String {
    let preferences = preferences();
    format!(
        "Logging: level={} console={} structured={} buffer={} max_message={}",
        preferences.min_log_level.as_str(),
        preferences.enable_console_logging,
        preferences.use_structured_logging,
        LOG_BUFFER_SIZE,
        MAX_LOG_MESSAGE_LENGTH,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(validate_config().is_ok());
    }

    #[test]
    fn test_summary_names_every_setting() {
        let summary = get_config_summary();
        for key in ["level=", "console=", "structured=", "buffer=", "max_message="] {
            assert!(summary.contains(key), "{}", summary);
        }
    }
}

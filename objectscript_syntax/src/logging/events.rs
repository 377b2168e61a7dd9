//! Log events emitted by the lexer, composer and parser

use super::codes::{self, Code};
use crate::config::compile_time::logging::MAX_LOG_MESSAGE_LENGTH;
use crate::utils::Span;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Verbosity, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    Error = 0,
    Warning = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }

    /// Placeholder code for events logged without one
    fn uncoded(&self) -> Code {
        match self {
            LogLevel::Error => codes::system::INTERNAL_ERROR,
            LogLevel::Warning => Code::new("W000"),
            LogLevel::Info => Code::new("I000"),
            LogLevel::Debug => Code::new("D000"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    /// Accepts names in any case and the numeric levels `0..=3`
    fn from_str(level: &str) -> Result<Self, Self::Err> {
        match level.trim().to_ascii_lowercase().as_str() {
            "error" | "0" => Ok(LogLevel::Error),
            "warning" | "warn" | "1" => Ok(LogLevel::Warning),
            "info" | "2" => Ok(LogLevel::Info),
            "debug" | "3" => Ok(LogLevel::Debug),
            other => Err(format!("Unknown log level '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub code: Code,
    pub message: String,
    /// Source range the event is about, if any
    pub span: Option<Span>,
    pub context: BTreeMap<String, String>,
}

impl LogEvent {
    pub fn new(level: LogLevel, code: Code, message: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            code,
            message: truncate(message),
            span: None,
            context: BTreeMap::new(),
        }
    }

    pub fn error(code: Code, message: &str) -> Self {
        Self::new(LogLevel::Error, code, message)
    }

    pub fn warning(message: &str) -> Self {
        Self::new(LogLevel::Warning, LogLevel::Warning.uncoded(), message)
    }

    pub fn info(message: &str) -> Self {
        Self::new(LogLevel::Info, LogLevel::Info.uncoded(), message)
    }

    /// Info event carrying one of the `codes::success` codes
    pub fn success(code: Code, message: &str) -> Self {
        Self::new(LogLevel::Info, code, message)
    }

    pub fn debug(message: &str) -> Self {
        Self::new(LogLevel::Debug, LogLevel::Debug.uncoded(), message)
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_context(mut self, key: &str, value: &str) -> Self {
        self.context.insert(key.to_string(), truncate(value));
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == LogLevel::Error
    }

    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context.get(key).map(String::as_str)
    }

    pub fn category(&self) -> &'static str {
        codes::get_category(self.code.as_str())
    }

    /// Format as one JSON object per line
    pub fn format_json(&self) -> Result<String, serde_json::Error> {
        let metadata = if self.is_error() {
            codes::get_error_metadata(self.code.as_str()).map(|m| JsonMetadata {
                severity: m.severity.as_str(),
                recoverable: m.recoverable,
                requires_halt: m.requires_halt,
                description: m.description,
                recommended_action: m.recommended_action,
            })
        } else {
            None
        };
        serde_json::to_string(&JsonEvent {
            timestamp: self.timestamp.to_rfc3339(),
            level: self.level.as_str(),
            code: self.code.as_str(),
            category: self.category(),
            message: &self.message,
            span: self.span.map(JsonSpan::from),
            context: &self.context,
            error_metadata: metadata,
        })
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} - {}", self.level.as_str(), self.code, self.message)?;
        if let Some(span) = &self.span {
            write!(f, " at {}", span)?;
        }
        if !self.context.is_empty() {
            let pairs: Vec<String> = self
                .context
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            write!(f, " ({})", pairs.join(", "))?;
        }
        Ok(())
    }
}

fn truncate(text: &str) -> String {
    if text.len() <= MAX_LOG_MESSAGE_LENGTH {
        return text.to_string();
    }
    let mut cut = MAX_LOG_MESSAGE_LENGTH;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    timestamp: String,
    level: &'static str,
    code: &'static str,
    category: &'static str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    span: Option<JsonSpan>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    context: &'a BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_metadata: Option<JsonMetadata>,
}

#[derive(Serialize)]
struct JsonSpan {
    start_byte: usize,
    end_byte: usize,
    start_line: u32,
    start_column: u32,
    end_line: u32,
    end_column: u32,
}

impl From<Span> for JsonSpan {
    fn from(span: Span) -> Self {
        Self {
            start_byte: span.start().offset,
            end_byte: span.end().offset,
            start_line: span.start().line,
            start_column: span.start().column,
            end_line: span.end().line,
            end_column: span.end().column,
        }
    }
}

#[derive(Serialize)]
struct JsonMetadata {
    severity: &'static str,
    recoverable: bool,
    requires_halt: bool,
    description: &'static str,
    recommended_action: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        assert_eq!("ERROR".parse::<LogLevel>(), Ok(LogLevel::Error));
        assert_eq!("warn".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!(" 3 ".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert!("verbose".parse::<LogLevel>().is_err());
        assert!(LogLevel::Error < LogLevel::Debug);
    }

    #[test]
    fn test_uncoded_events_get_placeholder_codes() {
        assert_eq!(LogEvent::debug("x").code.as_str(), "D000");
        assert_eq!(LogEvent::warning("x").code.as_str(), "W000");
        let event = LogEvent::success(codes::success::PARSE_COMPLETE, "Parsed");
        assert_eq!(event.level, LogLevel::Info);
        assert_eq!(event.code.as_str(), "I040");
    }

    #[test]
    fn test_display_includes_span_and_context() {
        let event = LogEvent::error(codes::syntax::UNEXPECTED_TOKEN, "Unexpected token")
            .with_context("token", ")")
            .with_context("grammar", "core");
        let formatted = event.to_string();
        assert!(formatted.starts_with("[ERROR] E050 - Unexpected token"));
        assert!(formatted.ends_with("(grammar=core, token=))"));
        assert_eq!(event.context_value("token"), Some(")"));
    }

    #[test]
    fn test_long_text_is_truncated() {
        let long = "é".repeat(MAX_LOG_MESSAGE_LENGTH);
        let event = LogEvent::info(&long).with_context("source", &long);
        assert!(event.message.ends_with("..."));
        assert!(event.message.len() <= MAX_LOG_MESSAGE_LENGTH + 3);
        assert!(event.context_value("source").unwrap().ends_with("..."));
    }

    #[test]
    fn test_json_formatting() {
        let event = LogEvent::error(codes::grammar::CYCLIC_EMBEDDING, "Cycle")
            .with_span(Span::from_offsets(3, 7))
            .with_context("path", "udl -> core -> udl");

        let json = event.format_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["level"], "ERROR");
        assert_eq!(value["code"], "E102");
        assert_eq!(value["category"], "Grammar");
        assert_eq!(value["span"]["start_byte"], 3);
        assert_eq!(value["context"]["path"], "udl -> core -> udl");
        assert_eq!(value["error_metadata"]["requires_halt"], true);

        let quiet = LogEvent::info("done").format_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&quiet).unwrap();
        assert!(value.get("span").is_none());
        assert!(value.get("error_metadata").is_none());
    }
}

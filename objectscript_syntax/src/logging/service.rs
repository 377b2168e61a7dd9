//! Log sinks and the service that filters events into them

use super::codes::Code;
use super::config;
use super::events::{LogEvent, LogLevel};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

pub trait Logger: Send + Sync {
    fn log(&self, event: &LogEvent);
}

/// Level filter in front of a sink
pub struct LoggingService {
    logger: Option<Arc<dyn Logger>>,
    min_level: LogLevel,
}

impl LoggingService {
    pub fn new(logger: Arc<dyn Logger>, min_level: LogLevel) -> Self {
        Self {
            logger: Some(logger),
            min_level,
        }
    }

    /// Service described by the runtime logging preferences. With console
    /// output disabled, events are filtered and dropped.
    pub fn from_preferences() -> Self {
        let min_level = config::get_min_log_level();
        let logger: Option<Arc<dyn Logger>> = if config::use_console_logging() {
            let format = if config::use_structured_logging() {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            };
            Some(Arc::new(ConsoleLogger::new(format)))
        } else {
            None
        };
        Self { logger, min_level }
    }

    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    pub fn should_log(&self, level: LogLevel) -> bool {
        self.logger.is_some() && level <= self.min_level
    }

    pub fn log_event(&self, event: LogEvent) {
        if let Some(logger) = &self.logger {
            if event.level <= self.min_level {
                logger.log(&event);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    /// One JSON object per line
    Json,
}

/// Writes errors to stderr and everything else to stdout
pub struct ConsoleLogger {
    format: OutputFormat,
}

impl ConsoleLogger {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    fn render(&self, event: &LogEvent) -> String {
        match self.format {
            OutputFormat::Text => event.to_string(),
            OutputFormat::Json => event.format_json().unwrap_or_else(|_| event.to_string()),
        }
    }
}

impl Logger for ConsoleLogger {
    fn log(&self, event: &LogEvent) {
        let line = self.render(event);
        if event.is_error() {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }
}

/// Keeps the most recent events, up to the configured buffer size
pub struct MemoryLogger {
    events: Mutex<VecDeque<LogEvent>>,
    capacity: usize,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::with_capacity(config::get_log_buffer_size())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LogEvent>> {
        // A poisoned buffer still holds whole events
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.lock().iter().cloned().collect()
    }

    pub fn event_count(&self) -> usize {
        self.lock().len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn events_with_code(&self, code: Code) -> Vec<LogEvent> {
        self.lock().iter().filter(|e| e.code == code).cloned().collect()
    }

    pub fn has_code(&self, code: Code) -> bool {
        self.lock().iter().any(|e| e.code == code)
    }
}

impl Default for MemoryLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger for MemoryLogger {
    fn log(&self, event: &LogEvent) {
        let mut events = self.lock();
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::codes;

    #[test]
    fn test_memory_logger_keeps_most_recent() {
        let logger = MemoryLogger::with_capacity(2);
        logger.log(&LogEvent::info("first"));
        logger.log(&LogEvent::error(codes::lexical::INVALID_CHARACTER, "Bad char"));
        logger.log(&LogEvent::success(codes::success::PARSE_COMPLETE, "Parsed"));

        assert_eq!(logger.event_count(), 2);
        assert!(logger.has_code(codes::lexical::INVALID_CHARACTER));
        assert!(logger.events().iter().all(|e| e.message != "first"));
        assert_eq!(logger.events_with_code(codes::success::PARSE_COMPLETE).len(), 1);

        logger.clear();
        assert_eq!(logger.event_count(), 0);
    }

    #[test]
    fn test_service_filters_by_level() {
        let logger = Arc::new(MemoryLogger::new());
        let service = LoggingService::new(logger.clone(), LogLevel::Warning);

        service.log_event(LogEvent::debug("Shift state 4"));
        service.log_event(LogEvent::info("Parsed"));
        service.log_event(LogEvent::warning("Table has conflicts"));
        service.log_event(LogEvent::error(codes::system::INTERNAL_ERROR, "Failure"));

        assert_eq!(logger.event_count(), 2);
        assert!(service.should_log(LogLevel::Error));
        assert!(!service.should_log(LogLevel::Info));
    }

    #[test]
    fn test_console_rendering() {
        let event = LogEvent::error(codes::syntax::MISSING_SYMBOL, "Missing expression")
            .with_context("symbol", "expression");
        let text = ConsoleLogger::new(OutputFormat::Text).render(&event);
        assert!(text.starts_with("[ERROR] E042"));
        let json = ConsoleLogger::new(OutputFormat::Json).render(&event);
        assert!(json.starts_with('{'));
        assert!(json.contains("\"symbol\":\"expression\""));
    }
}

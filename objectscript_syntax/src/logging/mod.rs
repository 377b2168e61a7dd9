//! Global logging module
//!
//! Coded events go to one process-wide service. Logging before
//! initialization is a silent no-op, so library users who never initialize
//! pay for a `OnceLock` read. [`capture`] collects the events one thread
//! emits, at every level, whether or not a service is installed.

pub mod codes;
pub mod config;
pub mod events;
pub mod macros;
pub mod service;

use std::cell::RefCell;
use std::sync::{Arc, OnceLock};

pub use codes::Code;
pub use events::{LogEvent, LogLevel};
pub use service::{ConsoleLogger, Logger, LoggingService, MemoryLogger, OutputFormat};

static GLOBAL_LOGGER: OnceLock<Arc<LoggingService>> = OnceLock::new();

thread_local! {
    static CAPTURED: RefCell<Option<Vec<LogEvent>>> = const { RefCell::new(None) };
}

/// Install the service described by the runtime logging preferences
pub fn init_global_logging() -> Result<(), String> {
    config::validate_config().map_err(|e| format!("Configuration validation failed: {}", e))?;

    let required = [
        codes::system::INTERNAL_ERROR,
        codes::lexical::INVALID_CHARACTER,
        codes::syntax::UNEXPECTED_TOKEN,
        codes::grammar::CYCLIC_EMBEDDING,
        codes::incremental::INVALID_EDIT,
    ];
    for code in required {
        if codes::get_error_metadata(code.as_str()).is_none() {
            return Err(format!("Missing metadata for error code: {}", code));
        }
    }

    init_global_logging_with_service(Arc::new(LoggingService::from_preferences()))?;
    emit(LogEvent::success(
        codes::success::SYSTEM_INITIALIZATION_COMPLETED,
        "Global logging system initialized",
    ));
    Ok(())
}

/// Install a caller-built service, e.g. one over a [`MemoryLogger`]
pub fn init_global_logging_with_service(service: Arc<LoggingService>) -> Result<(), String> {
    GLOBAL_LOGGER
        .set(service)
        .map_err(|_| "Global logger already initialized".to_string())
}

pub fn is_initialized() -> bool {
    GLOBAL_LOGGER.get().is_some()
}

pub fn try_get_global_logger() -> Option<&'static LoggingService> {
    GLOBAL_LOGGER.get().map(|service| service.as_ref())
}

fn capturing() -> bool {
    CAPTURED.with(|captured| captured.borrow().is_some())
}

/// Whether an event at `level` would be kept by anyone
pub fn is_enabled(level: LogLevel) -> bool {
    capturing() || try_get_global_logger().is_some_and(|logger| logger.should_log(level))
}

/// Deliver one event to the current capture and the global service
pub fn emit(event: LogEvent) {
    if let Some(logger) = try_get_global_logger() {
        if logger.should_log(event.level) {
            CAPTURED.with(|captured| {
                if let Some(events) = captured.borrow_mut().as_mut() {
                    events.push(event.clone());
                }
            });
            logger.log_event(event);
            return;
        }
    }
    CAPTURED.with(|captured| {
        if let Some(events) = captured.borrow_mut().as_mut() {
            events.push(event);
        }
    });
}

/// Run `f` and return what it logged on this thread. Captures nest; an
/// inner capture does not see what its caller logged before it began.
pub fn capture<R>(f: impl FnOnce() -> R) -> (R, Vec<LogEvent>) {
    let outer = CAPTURED.with(|captured| captured.borrow_mut().replace(Vec::new()));
    let result = f();
    let events = CAPTURED.with(|captured| {
        let mut slot = captured.borrow_mut();
        let events = slot.take().unwrap_or_default();
        if let Some(mut outer) = outer {
            outer.extend(events.iter().cloned());
            *slot = Some(outer);
        }
        events
    });
    (result, events)
}

pub fn get_system_diagnostics() -> String {
    format!(
        "Logging initialized: {}\n{}",
        is_initialized(),
        config::get_config_summary()
    )
}

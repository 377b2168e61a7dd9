//! Logging macros
//!
//! Context values may be any `Display` type. Nothing is formatted unless an
//! event at that level would be kept.

#[doc(hidden)]
#[macro_export]
macro_rules! __log_event {
    ($level:expr, $event:expr, $span:expr $(, $key:expr => $value:expr)*) => {{
        if $crate::logging::is_enabled($level) {
            #[allow(unused_mut)]
            let mut event: $crate::logging::LogEvent = $event;
            if let Some(span) = $span {
                event = event.with_span(span);
            }
            $(
                event = event.with_context($key, &format!("{}", $value));
            )*
            $crate::logging::emit(event);
        }
    }};
}

/// `log_error!(code, message [, span = s] [, "key" => value]*)`
#[macro_export]
macro_rules! log_error {
    ($code:expr, $message:expr, span = $span:expr $(, $key:expr => $value:expr)*) => {
        $crate::__log_event!(
            $crate::logging::LogLevel::Error,
            $crate::logging::LogEvent::error($code, $message),
            Some($span)
            $(, $key => $value)*
        )
    };

    ($code:expr, $message:expr $(, $key:expr => $value:expr)*) => {
        $crate::__log_event!(
            $crate::logging::LogLevel::Error,
            $crate::logging::LogEvent::error($code, $message),
            Option::<$crate::utils::Span>::None
            $(, $key => $value)*
        )
    };
}

/// Info event with a `codes::success` code
#[macro_export]
macro_rules! log_success {
    ($code:expr, $message:expr $(, $key:expr => $value:expr)*) => {
        $crate::__log_event!(
            $crate::logging::LogLevel::Info,
            $crate::logging::LogEvent::success($code, $message),
            Option::<$crate::utils::Span>::None
            $(, $key => $value)*
        )
    };
}

#[macro_export]
macro_rules! log_info {
    ($message:expr $(, $key:expr => $value:expr)*) => {
        $crate::__log_event!(
            $crate::logging::LogLevel::Info,
            $crate::logging::LogEvent::info($message),
            Option::<$crate::utils::Span>::None
            $(, $key => $value)*
        )
    };
}

/// `log_warning!([code = c,] message [, "key" => value]*)`
#[macro_export]
macro_rules! log_warning {
    (code = $code:expr, $message:expr $(, $key:expr => $value:expr)*) => {
        $crate::__log_event!(
            $crate::logging::LogLevel::Warning,
            $crate::logging::LogEvent::new($crate::logging::LogLevel::Warning, $code, $message),
            Option::<$crate::utils::Span>::None
            $(, $key => $value)*
        )
    };

    ($message:expr $(, $key:expr => $value:expr)*) => {
        $crate::__log_event!(
            $crate::logging::LogLevel::Warning,
            $crate::logging::LogEvent::warning($message),
            Option::<$crate::utils::Span>::None
            $(, $key => $value)*
        )
    };
}

#[macro_export]
macro_rules! log_debug {
    ($message:expr $(, $key:expr => $value:expr)*) => {
        $crate::__log_event!(
            $crate::logging::LogLevel::Debug,
            $crate::logging::LogEvent::debug($message),
            Option::<$crate::utils::Span>::None
            $(, $key => $value)*
        )
    };
}

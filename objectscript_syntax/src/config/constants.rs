//! Reference copy of the compile-time limits.
//!
//! The values actually compiled in come from `config/<profile>.toml` through
//! `build.rs`; this module documents what each limit bounds.

pub mod compile_time {
    pub mod lexical {
        /// Maximum number of tokens scanned from one buffer
        /// RESOURCE: the remainder of the buffer becomes a single error token
        pub const MAX_TOKEN_COUNT: usize = 2_000_000;

        /// Identifiers longer than this are reported (not rejected)
        pub const MAX_IDENTIFIER_LENGTH: usize = 512;

        /// String literals longer than this are reported (not rejected)
        pub const MAX_STRING_SIZE: usize = 1_048_576;

        /// Buffer size for lexical metrics collection
        /// RESOURCE: Controls memory allocation for metrics
        pub const METRICS_BUFFER_SIZE: usize = 1000;
    }

    pub mod syntax {
        /// Recovery steps per parse before the rest of the input collapses
        /// into one error node
        /// RESOURCE: bounds recovery work on pathological input
        pub const MAX_ERROR_COUNT: usize = 2048;

        /// Missing-node insertions allowed at end of input
        pub const MAX_MISSING_INSERTIONS: usize = 32;

        /// Candidate symbols tried per insertion attempt
        /// PERFORMANCE: bounds the insertion search per error
        pub const MAX_INSERTION_CANDIDATES: usize = 48;

        /// Maximum error history kept by a parser instance
        /// RESOURCE: Controls memory usage for error tracking
        pub const MAX_ERROR_HISTORY: usize = 100;
    }

    pub mod incremental {
        /// Tokens to back off before the edited line when relexing
        pub const RELEX_BACKOFF_TOKENS: usize = 1;

        /// Old subtrees examined per position when looking for reuse
        pub const MAX_REUSE_CANDIDATES: usize = 64;
    }

    pub mod logging {
        /// Events retained by the in-memory logger
        pub const LOG_BUFFER_SIZE: usize = 10_000;

        /// Longer log messages are truncated
        pub const MAX_LOG_MESSAGE_LENGTH: usize = 4096;
    }
}

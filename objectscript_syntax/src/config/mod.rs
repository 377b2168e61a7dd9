//! Configuration module for the ObjectScript syntax engine
//! Automatically uses generated constants from TOML configuration

// Include generated constants from build.rs
// This file is generated at compile time from the TOML profile
include!(concat!(env!("OUT_DIR"), "/constants.rs"));

// Documented mirror of the generated constants, and runtime preferences
pub mod constants;
pub mod runtime;

/// Build information and configuration metadata
pub mod build_info {
    /// Returns the configuration profile used during build
    pub fn profile() -> &'static str {
        option_env!("OBJECTSCRIPT_BUILD_PROFILE").unwrap_or("development")
    }

    /// Returns the configuration directory used during build
    pub fn config_dir() -> &'static str {
        option_env!("OBJECTSCRIPT_CONFIG_DIR").unwrap_or("config")
    }

    /// Returns configuration source information
    pub fn source_info() -> String {
        format!("Generated from {}/{}.toml", config_dir(), profile())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_constants_are_sane() {
        assert!(compile_time::lexical::MAX_TOKEN_COUNT > 0);
        assert!(compile_time::syntax::MAX_ERROR_COUNT > 0);
        assert!(compile_time::syntax::MAX_MISSING_INSERTIONS > 0);
        assert!(compile_time::logging::LOG_BUFFER_SIZE >= 100);
    }

    #[test]
    fn test_reference_copy_matches_development_profile() {
        if build_info::profile() != "development" {
            return;
        }
        assert_eq!(
            constants::compile_time::lexical::MAX_TOKEN_COUNT,
            compile_time::lexical::MAX_TOKEN_COUNT
        );
        assert_eq!(
            constants::compile_time::syntax::MAX_ERROR_COUNT,
            compile_time::syntax::MAX_ERROR_COUNT
        );
        assert_eq!(
            constants::compile_time::incremental::MAX_REUSE_CANDIDATES,
            compile_time::incremental::MAX_REUSE_CANDIDATES
        );
    }

    #[test]
    fn test_build_info() {
        assert!(build_info::source_info().ends_with(".toml"));
    }
}

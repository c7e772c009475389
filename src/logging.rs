//! Diagnostic logging setup
//!
//! Every module logs through `tracing` macros. This module installs the global
//! subscriber once, writing to stderr so stdout stays reserved for the report.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
}

impl LogLevel {
    /// Level implied by the `--verbose` / `--debug` flags
    pub fn from_flags(verbose: bool, debug: bool) -> Self {
        if debug {
            LogLevel::Debug
        } else if verbose {
            LogLevel::Info
        } else {
            LogLevel::Warn
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
        }
    }
}

/// Log output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable console format
    #[default]
    Console,
    /// JSON format for structured logging
    Json,
    /// Compact single-line format
    Compact,
}

/// Build the filter: `RUST_LOG` wins, otherwise `level` for this crate and
/// `warn` for dependencies.
pub fn build_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,{}={}",
            env!("CARGO_CRATE_NAME"),
            level.as_str()
        ))
    })
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(level: LogLevel, format: LogFormat, use_color: bool) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(build_filter(level))
        .with_writer(std::io::stderr)
        .with_target(level <= LogLevel::Debug);

    let installed = match format {
        LogFormat::Console => builder.with_ansi(use_color).try_init(),
        LogFormat::Compact => builder.compact().with_ansi(use_color).try_init(),
        LogFormat::Json => builder.json().with_ansi(false).try_init(),
    };

    installed.map_err(|e| AppError::internal(format!("Failed to initialize logging: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_flags() {
        assert_eq!(LogLevel::from_flags(false, false), LogLevel::Warn);
        assert_eq!(LogLevel::from_flags(true, false), LogLevel::Info);
        assert_eq!(LogLevel::from_flags(true, true), LogLevel::Debug);
        assert_eq!(LogLevel::from_flags(false, true), LogLevel::Debug);
    }

    #[test]
    fn test_target_shown_at_debug_only() {
        assert!(LogLevel::Debug <= LogLevel::Debug);
        assert!(LogLevel::Info > LogLevel::Debug);
        assert_eq!(LogLevel::from_flags(true, false).as_str(), "info");
    }

    #[test]
    fn test_second_init_fails() {
        // The first call may race with other tests; the second never succeeds.
        let _ = init_logging(LogLevel::Warn, LogFormat::Compact, false);
        let err = init_logging(LogLevel::Warn, LogFormat::Compact, false).unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}

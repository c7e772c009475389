//! Non-fatal configuration checks
//!
//! `Config::validate` rejects configurations that cannot run. The checks
//! here flag configurations that run but probably do not measure what the
//! user intended.

use crate::{error::Result, models::Config};

/// Above this many virtual users a single process is likely the bottleneck
pub const HIGH_VU_COUNT: u32 = 1000;

/// Above this many virtual users a missing pause hammers the target
pub const BUSY_LOOP_VU_COUNT: u32 = 50;

/// Validation warning levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationLevel {
    Info,
    Warning,
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(level: ValidationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Configuration validator with advisory rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Run `Config::validate`, then collect advisory warnings
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        config.validate()?;

        let mut warnings = Vec::new();
        warnings.extend(Self::check_load_shape(config));
        warnings.extend(Self::check_request(config));
        warnings.extend(Self::check_timing(config));
        Ok(warnings)
    }

    fn check_load_shape(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        let peak = if config.stages.is_empty() {
            config.vus
        } else {
            config.stages.iter().map(|s| s.target).max().unwrap_or(0)
        };

        if peak > HIGH_VU_COUNT {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "{} virtual users in one process; the load generator may saturate before the target does",
                    peak
                ),
            ));
        }

        if config.pause.is_none() && peak > BUSY_LOOP_VU_COUNT {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("{} virtual users with no pause between iterations", peak),
            ));
        }

        warnings
    }

    fn check_request(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.body_file.is_some() && config.method.is_bodyless() {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("{} request with a body; many servers ignore or reject it", config.method),
            ));
        }

        if let Ok(parsed) = url::Url::parse(&config.url) {
            if parsed.host_str().is_some_and(|host| host != "localhost" && !is_loopback(host)) {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!("Target '{}' is not a local address", config.url),
                ));
            }
        }

        warnings
    }

    fn check_timing(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        let run_length = if config.iterations.is_some() {
            config.max_duration
        } else {
            config.effective_duration()
        };
        if config.timeout > run_length {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Request timeout ({}) is longer than the run ({})",
                    humantime::format_duration(config.timeout),
                    humantime::format_duration(run_length)
                ),
            ));
        }

        if config.graceful_stop.is_zero() {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                "Graceful stop is 0; requests in flight at the end of the run will be abandoned",
            ));
        }

        warnings
    }
}

fn is_loopback(host: &str) -> bool {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<std::net::IpAddr>()
        .is_ok_and(|ip| ip.is_loopback())
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}

//! Configuration data model and validation

use crate::{
    logging::LogFormat,
    models::{
        request::{RequestBody, RequestSpec},
        scenario::{humantime_serde, ScenarioConfig, Stage},
        threshold::ThresholdRule,
        metrics::StatusExpectation,
    },
    types::{AppError, BodyFormat, HttpMethod, OutputFormat, Result},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration
///
/// Also the schema of the `--config` JSON scenario file: every field is
/// optional there and durations are humantime strings such as `"30s"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Target URL
    pub url: String,

    pub method: HttpMethod,

    /// Extra request headers; these win over body-derived headers
    pub headers: BTreeMap<String, String>,

    /// File holding the request body
    pub body_file: Option<PathBuf>,

    pub body_format: BodyFormat,

    /// Number of virtual users (ignored when stages are set)
    pub vus: u32,

    /// Run duration; `None` falls back to the default unless another mode is set
    #[serde(with = "humantime_serde::option")]
    pub duration: Option<Duration>,

    /// Iterations per virtual user
    pub iterations: Option<u64>,

    /// Upper bound on an iteration-mode run
    #[serde(with = "humantime_serde")]
    pub max_duration: Duration,

    pub stages: Vec<Stage>,

    /// Pause between iterations of one virtual user
    #[serde(with = "humantime_serde::option")]
    pub pause: Option<Duration>,

    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(with = "humantime_serde")]
    pub graceful_stop: Duration,

    /// Threshold expressions, e.g. `failure_rate<0.01`
    pub thresholds: Vec<String>,

    /// Status codes counted as success; empty means 2xx/3xx
    pub expected_statuses: Vec<u16>,

    pub output_format: OutputFormat,

    /// Also write the JSON report to this file
    pub summary_export: Option<PathBuf>,

    pub enable_color: bool,

    pub verbose: bool,

    pub debug: bool,

    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: crate::defaults::DEFAULT_URL.to_string(),
            method: HttpMethod::default(),
            headers: BTreeMap::new(),
            body_file: None,
            body_format: BodyFormat::default(),
            vus: crate::defaults::DEFAULT_VUS,
            duration: None,
            iterations: None,
            max_duration: crate::defaults::DEFAULT_MAX_DURATION,
            stages: Vec::new(),
            pause: None,
            timeout: crate::defaults::DEFAULT_TIMEOUT,
            graceful_stop: crate::defaults::DEFAULT_GRACEFUL_STOP,
            thresholds: crate::defaults::DEFAULT_THRESHOLDS
                .iter()
                .map(|&s| s.to_string())
                .collect(),
            expected_statuses: Vec::new(),
            output_format: OutputFormat::default(),
            summary_export: None,
            enable_color: crate::defaults::DEFAULT_ENABLE_COLOR,
            verbose: false,
            debug: false,
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON scenario file; missing fields keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::io(format!("Failed to read config file '{}': {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| AppError::parse(format!("Invalid config file '{}': {}", path.display(), e)))
    }

    /// Switch to duration mode
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = Some(duration);
        self.iterations = None;
        self.stages.clear();
    }

    /// Switch to iteration mode
    pub fn set_iterations(&mut self, iterations: u64) {
        self.iterations = Some(iterations);
        self.duration = None;
        self.stages.clear();
    }

    /// Switch to staged mode
    pub fn set_stages(&mut self, stages: Vec<Stage>) {
        self.stages = stages;
        self.duration = None;
        self.iterations = None;
    }

    /// Effective run duration in duration mode
    pub fn effective_duration(&self) -> Duration {
        if !self.stages.is_empty() {
            self.stages.iter().map(|s| s.duration).sum()
        } else {
            self.duration.unwrap_or(crate::defaults::DEFAULT_DURATION)
        }
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(AppError::config("Target URL cannot be empty"));
        }

        match url::Url::parse(&self.url) {
            Ok(parsed) if !matches!(parsed.scheme(), "http" | "https") => {
                return Err(AppError::config(format!("Target URL must use http or https: {}", self.url)));
            }
            Err(e) => {
                return Err(AppError::config(format!("Invalid target URL '{}': {}", self.url, e)));
            }
            Ok(_) => {}
        }

        if self.stages.is_empty() && self.vus == 0 {
            return Err(AppError::config("Number of virtual users must be greater than 0"));
        }

        let modes = [self.duration.is_some(), self.iterations.is_some(), !self.stages.is_empty()];
        if modes.iter().filter(|&&set| set).count() > 1 {
            return Err(AppError::config(
                "Only one of duration, iterations or stages can be set",
            ));
        }

        if self.duration.is_some_and(|d| d.is_zero()) {
            return Err(AppError::config("Duration must be greater than 0"));
        }

        if self.iterations == Some(0) {
            return Err(AppError::config("Iterations must be greater than 0"));
        }

        if self.max_duration.is_zero() {
            return Err(AppError::config("Maximum duration must be greater than 0"));
        }

        if !self.stages.is_empty() && self.stages.iter().all(|s| s.target == 0) {
            return Err(AppError::config("At least one stage must have a target above 0"));
        }

        if self.timeout.is_zero() {
            return Err(AppError::config("Timeout must be greater than 0"));
        }

        for code in &self.expected_statuses {
            if !(100..=599).contains(code) {
                return Err(AppError::config(format!("Invalid expected status code: {}", code)));
            }
        }

        for name in self.headers.keys() {
            if name.trim().is_empty() {
                return Err(AppError::config("Header name cannot be empty"));
            }
        }

        self.threshold_rules()?;

        Ok(())
    }

    /// Build the immutable scenario handed to the scheduler
    pub fn scenario(&self) -> Result<ScenarioConfig> {
        let scenario = if !self.stages.is_empty() {
            ScenarioConfig::ramping(self.stages.clone())?
        } else if let Some(iterations) = self.iterations {
            ScenarioConfig::per_vu_iterations(self.vus, iterations, self.max_duration)?
        } else {
            ScenarioConfig::constant(self.vus, self.effective_duration())?
        };

        Ok(scenario
            .with_pause(self.pause)
            .with_graceful_stop(self.graceful_stop))
    }

    /// Build the request every virtual user repeats. Reads the body file.
    pub fn request_spec(&self) -> Result<RequestSpec> {
        let mut spec = RequestSpec::new(self.method, self.url.clone())
            .with_headers(self.headers.iter().map(|(k, v)| (k.clone(), v.clone())));

        if let Some(path) = &self.body_file {
            spec = spec.with_body(RequestBody::from_file(path, self.body_format)?);
        }

        Ok(spec)
    }

    pub fn threshold_rules(&self) -> Result<Vec<ThresholdRule>> {
        ThresholdRule::parse_all(&self.thresholds)
    }

    pub fn status_expectation(&self) -> StatusExpectation {
        StatusExpectation::new(self.expected_statuses.clone())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("HLT_URL") {
            self.url = url.trim().to_string();
        }

        if let Ok(method) = std::env::var("HLT_METHOD") {
            self.method = method.parse()?;
        }

        if let Ok(vus) = std::env::var("HLT_VUS") {
            self.vus = vus.trim().parse()
                .map_err(|e| AppError::parse(format!("Invalid HLT_VUS value '{}': {}", vus, e)))?;
        }

        let duration = std::env::var("HLT_DURATION").ok();
        let iterations = std::env::var("HLT_ITERATIONS").ok();
        if duration.is_some() && iterations.is_some() {
            return Err(AppError::config("HLT_DURATION and HLT_ITERATIONS cannot both be set"));
        }

        if let Some(duration) = duration {
            self.set_duration(parse_env_duration("HLT_DURATION", &duration)?);
        }

        if let Some(iterations) = iterations {
            let iterations = iterations.trim().parse()
                .map_err(|e| AppError::parse(format!("Invalid HLT_ITERATIONS value '{}': {}", iterations, e)))?;
            self.set_iterations(iterations);
        }

        if let Ok(pause) = std::env::var("HLT_SLEEP") {
            self.pause = Some(parse_env_duration("HLT_SLEEP", &pause)?);
        }

        if let Ok(timeout) = std::env::var("HLT_TIMEOUT") {
            self.timeout = parse_env_duration("HLT_TIMEOUT", &timeout)?;
        }

        if let Ok(thresholds) = std::env::var("HLT_THRESHOLDS") {
            self.thresholds = thresholds
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(enable_color) = std::env::var("ENABLE_COLOR") {
            self.enable_color = enable_color.trim().parse()
                .map_err(|e| AppError::parse(format!("Invalid ENABLE_COLOR value '{}': {}", enable_color, e)))?;
        }

        Ok(())
    }
}

fn parse_env_duration(name: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value.trim())
        .map_err(|e| AppError::parse(format!("Invalid {} value '{}': {}", name, value, e)))
}

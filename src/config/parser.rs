//! Configuration parsing from the scenario file, environment and CLI arguments

use crate::{
    cli::RunArgs,
    config::env::EnvManager,
    error::Result,
    models::{request::parse_header, Config, ScenarioConfig},
};

/// Configuration parser that layers defaults, the `--config` file,
/// environment variables and CLI arguments, lowest priority first
pub struct ConfigParser {
    args: RunArgs,
}

impl ConfigParser {
    pub fn new(args: RunArgs) -> Self {
        Self { args }
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<Config> {
        let mut config = self.base_config()?;

        EnvManager::load_env_file()?;
        config.merge_from_env()?;

        self.apply_cli_overrides(&mut config)?;

        config.validate()?;
        Ok(config)
    }

    /// Defaults, or the scenario file when `--config` is given
    fn base_config(&self) -> Result<Config> {
        match &self.args.config {
            Some(path) => {
                let config = Config::from_file(path)?;
                tracing::debug!(path = %path.display(), "loaded scenario file");
                Ok(config)
            }
            None => Ok(Config::default()),
        }
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut Config) -> Result<()> {
        let args = &self.args;

        if let Some(url) = &args.url {
            config.url = url.clone();
        }
        if let Some(method) = args.method {
            config.method = method;
        }
        if let Some(vus) = args.vus {
            config.vus = vus;
        }

        if let Some(duration) = args.duration {
            config.set_duration(duration);
        }
        if let Some(iterations) = args.iterations {
            config.set_iterations(iterations);
        }
        if let Some(max_duration) = args.max_duration {
            config.max_duration = max_duration;
        }
        if !args.stages.is_empty() {
            config.set_stages(args.stages.clone());
        }

        if let Some(body_file) = &args.body_file {
            config.body_file = Some(body_file.clone());
        }
        if let Some(body_format) = args.body_format {
            config.body_format = body_format;
        }
        for raw in &args.headers {
            let (name, value) = parse_header(raw)?;
            config.headers.insert(name, value);
        }

        if let Some(pause) = args.pause {
            config.pause = Some(pause).filter(|p| !p.is_zero());
        }
        if let Some(timeout) = args.timeout {
            config.timeout = timeout;
        }
        if let Some(graceful_stop) = args.graceful_stop {
            config.graceful_stop = graceful_stop;
        }

        // CLI thresholds replace the lower layers instead of adding to them
        if !args.thresholds.is_empty() {
            config.thresholds = args.thresholds.clone();
        }
        if !args.expected_statuses.is_empty() {
            config.expected_statuses = args.expected_statuses.clone();
        }

        if let Some(format) = args.format {
            config.output_format = format;
        }
        if let Some(path) = &args.summary_export {
            config.summary_export = Some(path.clone());
        }
        if args.no_color {
            config.enable_color = false;
        }
        if let Some(log_format) = args.log_format {
            config.log_format = log_format;
        }

        config.verbose |= args.verbose;
        config.debug |= args.debug;

        Ok(())
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(args: RunArgs) -> Result<Config> {
    ConfigParser::new(args).parse()
}

/// One `key: value` line per setting, for debug output
pub fn display_config_summary(config: &Config) -> Result<String> {
    let scenario: ScenarioConfig = config.scenario()?;
    let mut summary = vec![
        format!("Target: {} {}", config.method, config.url),
        format!("Virtual users: {}", scenario.concurrency()),
    ];

    match scenario.stop().iterations_per_vu() {
        Some(iterations) => summary.push(format!(
            "Iterations: {} per VU (max {})",
            iterations,
            humantime::format_duration(config.max_duration)
        )),
        None => summary.push(format!(
            "Duration: {}",
            humantime::format_duration(scenario.stop().time_limit())
        )),
    }
    if scenario.is_staged() {
        let stages: Vec<String> = scenario.stages().iter().map(ToString::to_string).collect();
        summary.push(format!("Stages: {}", stages.join(", ")));
    }
    if let Some(pause) = scenario.pause() {
        summary.push(format!("Pause: {}", humantime::format_duration(pause)));
    }
    summary.push(format!("Timeout: {}", humantime::format_duration(config.timeout)));
    summary.push(format!("Graceful stop: {}", humantime::format_duration(config.graceful_stop)));
    if let Some(body) = &config.body_file {
        summary.push(format!("Body: {} ({:?})", body.display(), config.body_format));
    }
    if !config.headers.is_empty() {
        let names: Vec<&str> = config.headers.keys().map(String::as_str).collect();
        summary.push(format!("Headers: {}", names.join(", ")));
    }
    summary.push(format!("Thresholds: {}", config.thresholds.join(", ")));
    summary.push(format!("Color Output: {}", config.enable_color));

    Ok(summary.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::error::AppError;
    use crate::models::{Stage, StopCondition};
    use crate::types::HttpMethod;
    use clap::Parser;
    use std::io::Write;
    use std::sync::Mutex;
    use std::time::Duration;

    // Tests here touch process-wide environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_VARS: &[&str] = &[
        "HLT_URL",
        "HLT_METHOD",
        "HLT_VUS",
        "HLT_DURATION",
        "HLT_ITERATIONS",
        "HLT_SLEEP",
        "HLT_TIMEOUT",
        "HLT_THRESHOLDS",
        "ENABLE_COLOR",
    ];

    fn clear_env() {
        for name in ENV_VARS {
            std::env::remove_var(name);
        }
    }

    fn args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["hlt", "run"];
        argv.extend_from_slice(extra);
        Cli::parse_from(argv).run_args().clone()
    }

    #[test]
    fn test_cli_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
        clear_env();

        let config = load_config(args(&[
            "--vus", "10",
            "--iterations", "300",
            "--sleep", "1s",
            "--timeout", "5s",
            "--header", "Authorization: Bearer abc",
            "--threshold", "p95<200ms",
            "--no-color",
            "--verbose",
        ]))
        .unwrap();

        assert_eq!(config.vus, 10);
        assert_eq!(config.iterations, Some(300));
        assert_eq!(config.duration, None);
        assert_eq!(config.pause, Some(Duration::from_secs(1)));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.headers["Authorization"], "Bearer abc");
        assert_eq!(config.thresholds, vec!["p95<200ms"]);
        assert!(!config.enable_color);
        assert!(config.verbose);
    }

    #[test]
    fn test_env_overrides_defaults_and_cli_overrides_env() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
        clear_env();
        std::env::set_var("HLT_URL", "http://127.0.0.1:8080/health");
        std::env::set_var("HLT_VUS", "7");
        std::env::set_var("HLT_ITERATIONS", "20");
        std::env::set_var("HLT_THRESHOLDS", "failure_rate<0.05, count>=1");

        let config = load_config(args(&["--vus", "3"])).unwrap();
        assert_eq!(config.url, "http://127.0.0.1:8080/health");
        assert_eq!(config.vus, 3);
        assert_eq!(config.iterations, Some(20));
        assert_eq!(config.thresholds, vec!["failure_rate<0.05", "count>=1"]);

        // A CLI mode replaces the env mode
        let config = load_config(args(&["--duration", "10s"])).unwrap();
        assert_eq!(config.iterations, None);
        assert_eq!(config.duration, Some(Duration::from_secs(10)));

        clear_env();
    }

    #[test]
    fn test_invalid_env_value() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
        clear_env();
        std::env::set_var("HLT_VUS", "many");

        assert!(matches!(load_config(args(&[])), Err(AppError::Parse(_))));
        clear_env();
    }

    #[test]
    fn test_scenario_file_layer() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
        clear_env();

        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"url": "http://localhost:3000/users/create", "method": "POST",
                "stages": [{{"duration": "10s", "target": 5}}, {{"duration": "10s", "target": 0}}]}}"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = load_config(args(&["--config", &path])).unwrap();
        assert_eq!(config.method, HttpMethod::Post);
        assert_eq!(config.stages.len(), 2);
        assert_eq!(config.scenario().unwrap().stop(), StopCondition::Duration(Duration::from_secs(20)));

        let config = load_config(args(&["--config", &path, "--stage", "5s:2"])).unwrap();
        assert_eq!(config.stages, vec![Stage::new(Duration::from_secs(5), 2)]);
    }

    #[test]
    fn test_invalid_cli_values_fail_validation() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
        clear_env();

        assert!(matches!(load_config(args(&["--vus", "0"])), Err(AppError::Config(_))));
        assert!(matches!(load_config(args(&["--duration", "0s"])), Err(AppError::Config(_))));
        assert!(matches!(load_config(args(&["--header", "broken"])), Err(AppError::Config(_))));
        assert!(matches!(load_config(args(&["--threshold", "p95<>1"])), Err(AppError::Config(_))));
        assert!(matches!(
            load_config(args(&["--config", "/nonexistent/scenario.json"])),
            Err(AppError::Io(_))
        ));
    }

    #[test]
    fn test_display_config_summary() {
        let mut config = Config::default();
        config.vus = 3;
        config.set_iterations(300);
        config.pause = Some(Duration::from_secs(1));

        let summary = display_config_summary(&config).unwrap();
        assert!(summary.contains("Target: GET http://localhost:3000/users?data-source=gatewayB"));
        assert!(summary.contains("Virtual users: 3"));
        assert!(summary.contains("Iterations: 300 per VU (max 10m)"));
        assert!(summary.contains("Pause: 1s"));
        assert!(summary.contains("Thresholds: failure_rate<0.01"));
    }
}

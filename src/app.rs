//! Main application orchestration and execution

use crate::{
    cli::{self, RunArgs},
    client::ReqwestClient,
    config::{display_config_summary, load_config, validate_config, ValidationLevel},
    error::{AppError, Result},
    executor::ScenarioScheduler,
    logging::{self, LogLevel},
    models::{Config, RunReport},
    output::{write_summary_export, OutputFormatterFactory},
    types::OutputFormat,
};
use std::io::{IsTerminal, Write};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Main application struct that coordinates all components
pub struct App {
    config: Config,
    stop: CancellationToken,
}

impl App {
    /// Build the layered configuration for a `run` invocation
    pub fn new(args: RunArgs) -> Result<Self> {
        Ok(Self::from_config(load_config(args)?))
    }

    /// Use an already validated configuration
    pub fn from_config(config: Config) -> Self {
        Self {
            config,
            stop: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cancelling this token stops the run gracefully
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Install the global tracing subscriber
    pub fn init_logging(&self) -> Result<()> {
        let level = LogLevel::from_flags(self.config.verbose, self.config.debug);
        let use_color = self.config.enable_color && std::io::stderr().is_terminal();
        logging::init_logging(level, self.config.log_format, use_color)
    }

    /// Run the scenario, print the report and return the process exit code
    pub async fn run(&self) -> Result<i32> {
        self.watch_interrupt();

        let report = self.execute().await?;

        let mut stdout = std::io::stdout().lock();
        self.write_report(&report, &mut stdout)?;
        stdout
            .flush()
            .map_err(|e| AppError::io(format!("Failed to flush stdout: {}", e)))?;
        drop(stdout);

        if let Some(path) = &self.config.summary_export {
            write_summary_export(&report, path)?;
        }

        Ok(report.exit_code())
    }

    /// Validate, build the scheduler and run the scenario to completion
    pub async fn execute(&self) -> Result<RunReport> {
        let config = &self.config;

        for warning in validate_config(config)? {
            match warning.level {
                ValidationLevel::Warning => tracing::warn!("{}", warning.message),
                ValidationLevel::Info => tracing::info!("{}", warning.message),
            }
        }

        if config.debug {
            for line in display_config_summary(config)?.lines() {
                tracing::debug!("{}", line);
            }
        }

        let scenario = config.scenario()?;
        let spec = config.request_spec()?;
        let client = Arc::new(ReqwestClient::new(config.timeout)?);

        ScenarioScheduler::new(scenario, client)
            .with_thresholds(config.threshold_rules()?)
            .with_expectation(config.status_expectation())
            .with_stop_token(self.stop.clone())
            .execute(&spec)
            .await
    }

    /// Render the report in the configured format
    pub fn write_report<W: Write>(&self, report: &RunReport, out: &mut W) -> Result<()> {
        let enable_color = self.config.output_format == OutputFormat::Text
            && self.config.enable_color
            && cli::supports_color();
        let formatter =
            OutputFormatterFactory::create_formatter(self.config.output_format, enable_color, self.config.verbose);

        let rendered = formatter.format_report(report)?;
        writeln!(out, "{}", rendered).map_err(|e| AppError::io(format!("Failed to write report: {}", e)))
    }

    fn watch_interrupt(&self) {
        let stop = self.stop.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if result.is_ok() {
                        tracing::warn!("interrupt received, stopping the run");
                        stop.cancel();
                    }
                }
                _ = stop.cancelled() => {}
            }
        });
    }
}

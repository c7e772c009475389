//! Command-line interface

use crate::{
    logging::LogFormat,
    models::Stage,
    types::{BodyFormat, HttpMethod, OutputFormat},
};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// HTTP Load Tester - drive virtual users against one HTTP endpoint and judge the run
#[derive(Parser, Debug, Clone)]
#[command(name = "hlt")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run a load test scenario
    Run(RunArgs),
}

/// Scenario options. Every option left unset falls back to the config file,
/// the environment and finally the built-in defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Number of virtual users
    #[arg(long)]
    pub vus: Option<u32>,

    /// Run for this long, e.g. 30s or 1m30s
    #[arg(long, value_parser = parse_duration, conflicts_with_all = ["iterations", "stages"])]
    pub duration: Option<Duration>,

    /// Iterations per virtual user
    #[arg(long, conflicts_with = "stages")]
    pub iterations: Option<u64>,

    /// Upper bound on an iteration run
    #[arg(long, value_parser = parse_duration, requires = "iterations")]
    pub max_duration: Option<Duration>,

    /// Ramp stage as DURATION:TARGET, e.g. 30s:20 (repeatable)
    #[arg(long = "stage", value_parser = parse_stage, action = ArgAction::Append)]
    pub stages: Vec<Stage>,

    /// Target URL
    #[arg(long)]
    pub url: Option<String>,

    /// HTTP method
    #[arg(short = 'X', long, value_parser = parse_method)]
    pub method: Option<HttpMethod>,

    /// File holding the request body
    #[arg(long = "body", value_name = "FILE")]
    pub body_file: Option<PathBuf>,

    /// How the body file is interpreted
    #[arg(long, value_enum)]
    pub body_format: Option<BodyFormat>,

    /// Extra header as 'Name: value' (repeatable)
    #[arg(short = 'H', long = "header", action = ArgAction::Append)]
    pub headers: Vec<String>,

    /// Pause between iterations of one virtual user
    #[arg(long = "sleep", value_parser = parse_duration)]
    pub pause: Option<Duration>,

    /// Per-request timeout
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Time in-flight requests get to finish once the run ends
    #[arg(long, value_parser = parse_duration)]
    pub graceful_stop: Option<Duration>,

    /// Pass/fail rule such as failure_rate<0.01 or p95<500ms (repeatable)
    #[arg(long = "threshold", action = ArgAction::Append)]
    pub thresholds: Vec<String>,

    /// Status code counted as success (repeatable); default is any 2xx/3xx
    #[arg(long = "expect-status", action = ArgAction::Append)]
    pub expected_statuses: Vec<u16>,

    /// JSON scenario file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Report format on stdout
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Also write the JSON report to this file
    #[arg(long, value_name = "FILE")]
    pub summary_export: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Log line format on stderr
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,
}

impl Cli {
    /// Arguments of the `run` subcommand
    pub fn run_args(&self) -> &RunArgs {
        match &self.command {
            Command::Run(args) => args,
        }
    }
}

impl RunArgs {
    /// Whether the CLI selected a stop mode of its own
    pub fn sets_mode(&self) -> bool {
        self.duration.is_some() || self.iterations.is_some() || !self.stages.is_empty()
    }
}

/// Parse a humantime duration ("500ms", "30s", "1m30s")
fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime::parse_duration(s.trim()).map_err(|e| format!("Invalid duration '{}': {}", s, e))
}

fn parse_stage(s: &str) -> Result<Stage, String> {
    s.parse::<Stage>().map_err(|e| e.to_string())
}

fn parse_method(s: &str) -> Result<HttpMethod, String> {
    s.parse::<HttpMethod>().map_err(|e| e.to_string())
}

/// Check if the terminal supports color output
pub fn supports_color() -> bool {
    if std::env::var("TERM").is_ok_and(|term| term == "dumb") {
        return false;
    }

    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }

    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }

    use std::io::IsTerminal;
    std::io::stdout().is_terminal()
}

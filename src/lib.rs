//! HTTP Load Tester
//!
//! A concurrent HTTP load generator. A fixed number of virtual users (or a
//! staged ramp) repeat one HTTP request until a duration or iteration count
//! is reached; every attempt is aggregated into a report that is judged by
//! pass/fail thresholds.

pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod output;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use client::{HttpClient, HttpResponse, PreparedRequest, ReqwestClient};
pub use error::{AppError, Result};
pub use executor::{ScenarioScheduler, VirtualUser};
pub use models::{
    Config, RequestBody, RequestOutcome, RequestSpec, RunReport, ScenarioConfig, Stage, StopCondition,
    ThresholdRule,
};
pub use output::{OutputFormatter, OutputFormatterFactory};
pub use stats::ResultAggregator;

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");

/// Default `User-Agent` header sent with every request
pub const USER_AGENT: &str = concat!("http-load-tester/", env!("CARGO_PKG_VERSION"));

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_URL: &str = "http://localhost:3000/users?data-source=gatewayB";
    pub const DEFAULT_VUS: u32 = 100;
    pub const DEFAULT_DURATION: Duration = Duration::from_secs(30);
    /// Upper bound on an iteration-mode run
    pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(600);
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_GRACEFUL_STOP: Duration = Duration::from_secs(30);
    pub const DEFAULT_THRESHOLDS: &[&str] = &["failure_rate<0.01"];
    pub const DEFAULT_ENABLE_COLOR: bool = true;
    /// Outcomes buffered between the runners and the collector
    pub const OUTCOME_CHANNEL_CAPACITY: usize = 1024;
}

//! Data models and structures for the load tester

pub mod config;
pub mod metrics;
pub mod report;
pub mod request;
pub mod scenario;
pub mod threshold;

// Re-export main model types
pub use config::Config;
pub use metrics::{RequestOutcome, StatusExpectation};
pub use report::{LatencySummary, RunReport, ThresholdResult};
pub use request::{RequestBody, RequestSpec};
pub use scenario::{ScenarioConfig, Stage, StopCondition};
pub use threshold::{Comparator, ThresholdMetric, ThresholdRule};

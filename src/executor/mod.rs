//! Load execution engine
//!
//! - `runner`: a virtual user looping over the prepared request
//! - `scheduler`: keeps the right number of virtual users alive, stops them
//!   gracefully and hands every outcome to the aggregator

pub mod runner;
pub mod scheduler;

pub use runner::{RunnerSummary, VirtualUser};
pub use scheduler::{ConcurrencyGauge, RunResult, ScenarioScheduler};

use crate::{
    client::ReqwestClient,
    error::Result,
    models::{RequestSpec, RunReport, ScenarioConfig, ThresholdRule},
};
use std::sync::Arc;

/// Run `scenario` against `spec` with the default HTTP client and judge it
/// with `thresholds`
pub async fn execute(
    scenario: ScenarioConfig,
    spec: &RequestSpec,
    thresholds: Vec<ThresholdRule>,
) -> Result<RunReport> {
    let client = Arc::new(ReqwestClient::new(crate::defaults::DEFAULT_TIMEOUT)?);
    ScenarioScheduler::new(scenario, client)
        .with_thresholds(thresholds)
        .execute(spec)
        .await
}

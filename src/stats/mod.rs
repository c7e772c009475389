//! Result aggregation
//!
//! `ResultAggregator` receives every `RequestOutcome` of a run and turns them
//! into a `RunReport`: counts, failure rate, throughput, latency percentiles
//! and threshold verdicts.

pub mod thresholds;

use crate::models::{LatencySummary, RequestOutcome, RunReport, ThresholdRule};
use crate::types::OutcomeStatus;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Percentiles reported for every run
pub const REPORTED_PERCENTILES: [f64; 4] = [50.0, 90.0, 95.0, 99.0];

/// Thread-safe outcome accumulator
///
/// Many tasks may `record` concurrently; `finalize` is read-only and can be
/// called any number of times with the same result.
#[derive(Debug)]
pub struct ResultAggregator {
    run_id: String,
    rules: Vec<ThresholdRule>,
    created_at: DateTime<Utc>,
    state: Mutex<Accumulator>,
}

#[derive(Debug, Default)]
struct Accumulator {
    latencies_ms: Vec<f64>,
    successful: u64,
    completed_iterations: u64,
    status_codes: BTreeMap<u16, u64>,
    errors: BTreeMap<String, u64>,
    peak_vus: u32,
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl ResultAggregator {
    /// Create an aggregator that will judge the run with `rules`
    pub fn new(rules: Vec<ThresholdRule>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            rules,
            created_at: Utc::now(),
            state: Mutex::new(Accumulator::default()),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn rules(&self) -> &[ThresholdRule] {
        &self.rules
    }

    // Poisoning is ignored: the accumulator only holds counters and samples.
    fn state(&self) -> MutexGuard<'_, Accumulator> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append one outcome
    pub fn record(&self, outcome: RequestOutcome) {
        let mut state = self.state();

        state.latencies_ms.push(outcome.latency_ms());
        *state.status_codes.entry(outcome.status_code).or_insert(0) += 1;

        if outcome.status != OutcomeStatus::Abandoned {
            state.completed_iterations += 1;
        }

        if outcome.is_successful() {
            state.successful += 1;
        } else {
            *state.errors.entry(outcome.status.as_str().to_string()).or_insert(0) += 1;
        }
    }

    /// Record the highest number of simultaneously live virtual users
    pub fn record_peak_vus(&self, peak: u32) {
        let mut state = self.state();
        state.peak_vus = state.peak_vus.max(peak);
    }

    /// Fix the run window used for throughput and report timestamps
    pub fn seal(&self, started_at: DateTime<Utc>, finished_at: DateTime<Utc>) {
        self.state().window = Some((started_at, finished_at.max(started_at)));
    }

    /// Number of outcomes recorded so far
    pub fn len(&self) -> usize {
        self.state().latencies_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build the report. Pure: never reads the clock, never mutates state.
    pub fn finalize(&self) -> RunReport {
        let state = self.state();

        let total = state.latencies_ms.len() as u64;
        let failed = total - state.successful;
        let failure_rate = if total == 0 { 0.0 } else { failed as f64 / total as f64 };

        let (started_at, finished_at) = state.window.unwrap_or((self.created_at, self.created_at));
        let duration_secs = (finished_at - started_at)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        let requests_per_second = if duration_secs > 0.0 {
            total as f64 / duration_secs
        } else {
            0.0
        };

        let mut sorted = state.latencies_ms.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let latency = summarize(&sorted);

        let mut report = RunReport {
            run_id: self.run_id.clone(),
            started_at,
            finished_at,
            duration_secs,
            total_requests: total,
            successful_requests: state.successful,
            failed_requests: failed,
            failure_rate,
            requests_per_second,
            latency,
            status_codes: state.status_codes.clone(),
            errors: state.errors.clone(),
            peak_vus: state.peak_vus,
            iterations: state.completed_iterations,
            thresholds: Vec::new(),
            passed: true,
        };
        drop(state);

        report.thresholds = thresholds::evaluate(&self.rules, &report);
        report.passed = report.thresholds.iter().all(|t| t.passed);
        report
    }
}

fn summarize(sorted: &[f64]) -> LatencySummary {
    if sorted.is_empty() {
        return LatencySummary::default();
    }

    let sum: f64 = sorted.iter().sum();
    let [p50, p90, p95, p99] = REPORTED_PERCENTILES.map(|p| percentile(sorted, p));

    LatencySummary {
        min_ms: sorted[0],
        avg_ms: sum / sorted.len() as f64,
        max_ms: sorted[sorted.len() - 1],
        p50_ms: p50,
        p90_ms: p90,
        p95_ms: p95,
        p99_ms: p99,
    }
}

/// Percentile of ascending `sorted_values` with linear interpolation between
/// the closest ranks. Returns 0 for an empty slice.
pub fn percentile(sorted_values: &[f64], percentile: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let index = (percentile.clamp(0.0, 100.0) / 100.0) * (sorted_values.len() as f64 - 1.0);
    let lower_index = index.floor() as usize;
    let upper_index = index.ceil() as usize;

    if lower_index == upper_index {
        sorted_values[lower_index]
    } else {
        let lower_value = sorted_values[lower_index];
        let upper_value = sorted_values[upper_index];
        let weight = index - lower_index as f64;
        lower_value + weight * (upper_value - lower_value)
    }
}

//! Final run report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Latency statistics over every recorded request, in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

/// Outcome of evaluating one threshold rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdResult {
    /// Canonical rule text, e.g. `failure_rate<0.01`
    pub rule: String,
    /// Observed metric value the rule was checked against
    pub observed: f64,
    pub passed: bool,
}

/// Summary of a completed run. Built once by the aggregator; read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_secs: f64,

    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// failed / total, 0 when no request was made
    pub failure_rate: f64,
    pub requests_per_second: f64,

    pub latency: LatencySummary,

    /// Response count per HTTP status code (0 = no response)
    pub status_codes: BTreeMap<u16, u64>,
    /// Failed request count per outcome kind
    pub errors: BTreeMap<String, u64>,

    /// Highest number of simultaneously live virtual users
    pub peak_vus: u32,
    /// Iterations completed across all virtual users
    pub iterations: u64,

    pub thresholds: Vec<ThresholdResult>,
    /// False as soon as a single threshold failed
    pub passed: bool,
}

impl RunReport {
    /// Threshold results that did not hold
    pub fn failed_thresholds(&self) -> impl Iterator<Item = &ThresholdResult> {
        self.thresholds.iter().filter(|t| !t.passed)
    }

    /// Process exit code for this report
    pub fn exit_code(&self) -> i32 {
        if self.passed { 0 } else { 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(thresholds: Vec<ThresholdResult>) -> RunReport {
        let passed = thresholds.iter().all(|t| t.passed);
        RunReport {
            run_id: "test".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            duration_secs: 1.0,
            total_requests: 10,
            successful_requests: 10,
            failed_requests: 0,
            failure_rate: 0.0,
            requests_per_second: 10.0,
            latency: LatencySummary::default(),
            status_codes: BTreeMap::from([(200, 10)]),
            errors: BTreeMap::new(),
            peak_vus: 1,
            iterations: 10,
            thresholds,
            passed,
        }
    }

    #[test]
    fn test_exit_code_follows_thresholds() {
        let ok = report(vec![ThresholdResult {
            rule: "failure_rate<0.01".into(),
            observed: 0.0,
            passed: true,
        }]);
        assert_eq!(ok.exit_code(), 0);
        assert_eq!(ok.failed_thresholds().count(), 0);

        let failed = report(vec![
            ThresholdResult { rule: "failure_rate<0.01".into(), observed: 0.0, passed: true },
            ThresholdResult { rule: "p95<1".into(), observed: 12.0, passed: false },
        ]);
        assert_eq!(failed.exit_code(), 1);
        assert_eq!(failed.failed_thresholds().next().unwrap().rule, "p95<1");
    }

    #[test]
    fn test_report_serializes_status_codes_as_object() {
        let json = serde_json::to_value(report(vec![])).unwrap();
        assert_eq!(json["status_codes"]["200"], 10);
        assert_eq!(json["passed"], true);
    }
}

//! Threshold evaluation against a finished report

use crate::models::{RunReport, ThresholdMetric, ThresholdResult, ThresholdRule};

/// Observed value of `metric` in `report`, in the metric's unit
pub fn observed_value(metric: ThresholdMetric, report: &RunReport) -> f64 {
    match metric {
        ThresholdMetric::FailureRate => report.failure_rate,
        ThresholdMetric::Count => report.total_requests as f64,
        ThresholdMetric::Rps => report.requests_per_second,
        ThresholdMetric::AvgLatency => report.latency.avg_ms,
        ThresholdMetric::MinLatency => report.latency.min_ms,
        ThresholdMetric::MaxLatency => report.latency.max_ms,
        ThresholdMetric::P50Latency => report.latency.p50_ms,
        ThresholdMetric::P90Latency => report.latency.p90_ms,
        ThresholdMetric::P95Latency => report.latency.p95_ms,
        ThresholdMetric::P99Latency => report.latency.p99_ms,
    }
}

/// Evaluate every rule in order
pub fn evaluate(rules: &[ThresholdRule], report: &RunReport) -> Vec<ThresholdResult> {
    rules
        .iter()
        .map(|rule| {
            let observed = observed_value(rule.metric, report);
            ThresholdResult {
                rule: rule.to_string(),
                observed,
                passed: rule.evaluate(observed),
            }
        })
        .collect()
}

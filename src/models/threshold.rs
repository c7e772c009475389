//! Threshold rules evaluated against aggregate run metrics

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Aggregate metric a threshold is checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMetric {
    /// failed / total, in [0, 1]
    FailureRate,
    /// Total number of requests
    Count,
    /// Requests per second over the run window
    Rps,
    /// Latency statistics in milliseconds
    AvgLatency,
    MinLatency,
    MaxLatency,
    P50Latency,
    P90Latency,
    P95Latency,
    P99Latency,
}

impl ThresholdMetric {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FailureRate => "failure_rate",
            Self::Count => "count",
            Self::Rps => "rps",
            Self::AvgLatency => "avg",
            Self::MinLatency => "min",
            Self::MaxLatency => "max",
            Self::P50Latency => "p50",
            Self::P90Latency => "p90",
            Self::P95Latency => "p95",
            Self::P99Latency => "p99",
        }
    }

    pub fn is_latency(&self) -> bool {
        matches!(
            self,
            Self::AvgLatency
                | Self::MinLatency
                | Self::MaxLatency
                | Self::P50Latency
                | Self::P90Latency
                | Self::P95Latency
                | Self::P99Latency
        )
    }
}

impl FromStr for ThresholdMetric {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !matches!(c, '(' | ')'))
            .collect();

        match normalized.as_str() {
            "failure_rate" | "failurerate" | "http_req_failed" => Ok(Self::FailureRate),
            "count" | "total" | "http_reqs" => Ok(Self::Count),
            "rps" => Ok(Self::Rps),
            "avg" => Ok(Self::AvgLatency),
            "min" => Ok(Self::MinLatency),
            "max" => Ok(Self::MaxLatency),
            "p50" | "med" => Ok(Self::P50Latency),
            "p90" => Ok(Self::P90Latency),
            "p95" => Ok(Self::P95Latency),
            "p99" => Ok(Self::P99Latency),
            _ => Err(AppError::config(format!("Unknown threshold metric '{}'", s.trim()))),
        }
    }
}

impl fmt::Display for ThresholdMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "==")]
    Equal,
}

impl Comparator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
            Self::Equal => "==",
        }
    }

    pub fn holds(&self, observed: f64, limit: f64) -> bool {
        match self {
            Self::Less => observed < limit,
            Self::LessOrEqual => observed <= limit,
            Self::Greater => observed > limit,
            Self::GreaterOrEqual => observed >= limit,
            Self::Equal => (observed - limit).abs() < f64::EPSILON,
        }
    }
}

/// A single pass/fail rule, e.g. `failure_rate<0.01` or `p95<500ms`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub metric: ThresholdMetric,
    pub comparator: Comparator,
    /// Limit in the metric's unit (milliseconds for latencies)
    pub limit: f64,
}

impl ThresholdRule {
    pub fn new(metric: ThresholdMetric, comparator: Comparator, limit: f64) -> Self {
        Self { metric, comparator, limit }
    }

    /// Parse every expression, failing on the first invalid one
    pub fn parse_all<S: AsRef<str>>(expressions: &[S]) -> Result<Vec<Self>> {
        expressions.iter().map(|e| e.as_ref().parse()).collect()
    }

    pub fn evaluate(&self, observed: f64) -> bool {
        self.comparator.holds(observed, self.limit)
    }
}

impl fmt::Display for ThresholdRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.metric, self.comparator.symbol(), self.limit)
    }
}

impl FromStr for ThresholdRule {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let expr = s.trim();
        let op_start = expr
            .find(&['<', '>', '='][..])
            .ok_or_else(|| AppError::config(format!("Threshold '{}' has no comparator (<, <=, >, >=, ==)", expr)))?;

        let (metric_part, rest) = expr.split_at(op_start);
        let (comparator, limit_part) = if let Some(limit) = rest.strip_prefix("<=") {
            (Comparator::LessOrEqual, limit)
        } else if let Some(limit) = rest.strip_prefix(">=") {
            (Comparator::GreaterOrEqual, limit)
        } else if let Some(limit) = rest.strip_prefix("==") {
            (Comparator::Equal, limit)
        } else if let Some(limit) = rest.strip_prefix('<') {
            (Comparator::Less, limit)
        } else if let Some(limit) = rest.strip_prefix('>') {
            (Comparator::Greater, limit)
        } else {
            return Err(AppError::config(format!("Threshold '{}' has an invalid comparator", expr)));
        };

        let metric: ThresholdMetric = metric_part.parse()?;
        let limit = parse_limit(limit_part.trim(), metric)
            .map_err(|msg| AppError::config(format!("Threshold '{}': {}", expr, msg)))?;

        Ok(Self::new(metric, comparator, limit))
    }
}

fn parse_limit(raw: &str, metric: ThresholdMetric) -> std::result::Result<f64, String> {
    if raw.is_empty() {
        return Err("missing limit".to_string());
    }

    let (number, scale) = if let Some(n) = raw.strip_suffix("ms") {
        (n, 1.0)
    } else if let Some(n) = raw.strip_suffix('s') {
        (n, 1000.0)
    } else {
        (raw, 1.0)
    };

    if number.len() != raw.len() && !metric.is_latency() {
        return Err(format!("time units are only allowed for latency metrics, not '{}'", metric));
    }

    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| format!("invalid limit '{}'", raw))?;
    if !value.is_finite() {
        return Err(format!("invalid limit '{}'", raw));
    }
    Ok(value * scale)
}

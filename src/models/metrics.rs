//! Per-request outcome data model

use crate::types::OutcomeStatus;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of one request attempt made by a virtual user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestOutcome {
    /// Virtual user that issued the request
    pub vu: u32,

    /// Zero-based iteration number within that virtual user
    pub iteration: u64,

    /// HTTP status code, 0 when no response was received
    pub status_code: u16,

    /// Wall-clock time from send to fully-read response (or failure)
    pub latency: Duration,

    /// Classification of the attempt
    pub status: OutcomeStatus,

    /// Error message for transport failures, timeouts and abandoned requests
    pub error: Option<String>,
}

impl RequestOutcome {
    /// A response was received
    pub fn response(vu: u32, iteration: u64, status_code: u16, latency: Duration, expected: bool) -> Self {
        Self {
            vu,
            iteration,
            status_code,
            latency,
            status: if expected { OutcomeStatus::Success } else { OutcomeStatus::HttpFailure },
            error: None,
        }
    }

    /// The request failed before a response arrived
    pub fn transport_error(vu: u32, iteration: u64, latency: Duration, message: String) -> Self {
        Self {
            vu,
            iteration,
            status_code: 0,
            latency,
            status: OutcomeStatus::TransportError,
            error: Some(message),
        }
    }

    /// The request exceeded its timeout
    pub fn timeout(vu: u32, iteration: u64, latency: Duration, message: String) -> Self {
        Self {
            vu,
            iteration,
            status_code: 0,
            latency,
            status: OutcomeStatus::Timeout,
            error: Some(message),
        }
    }

    /// The request was still in flight when the run was hard-stopped
    pub fn abandoned(vu: u32, iteration: u64, latency: Duration) -> Self {
        Self {
            vu,
            iteration,
            status_code: 0,
            latency,
            status: OutcomeStatus::Abandoned,
            error: Some("request abandoned after graceful stop period".to_string()),
        }
    }

    pub fn is_successful(&self) -> bool {
        self.status.is_success()
    }

    pub fn latency_ms(&self) -> f64 {
        self.latency.as_nanos() as f64 / 1_000_000.0
    }
}

/// Which response status codes count as a successful request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusExpectation {
    /// Explicit codes; empty means any 2xx or 3xx
    pub codes: Vec<u16>,
}

impl StatusExpectation {
    pub fn new(codes: Vec<u16>) -> Self {
        Self { codes }
    }

    pub fn matches(&self, status: u16) -> bool {
        if self.codes.is_empty() {
            (200..400).contains(&status)
        } else {
            self.codes.contains(&status)
        }
    }
}

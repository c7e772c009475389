//! JSON report output

use super::formatter::OutputFormatter;
use crate::{
    error::{AppError, Result},
    models::{RunReport, ThresholdResult},
};

/// Pretty-printed JSON, the default stdout format
#[derive(Debug, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_report(&self, report: &RunReport) -> Result<String> {
        serde_json::to_string_pretty(report)
            .map_err(|e| AppError::internal(format!("Failed to serialize report: {}", e)))
    }

    fn format_header(&self, _title: &str) -> String {
        String::new()
    }

    fn format_threshold(&self, result: &ThresholdResult) -> String {
        serde_json::to_string(result).unwrap_or_default()
    }

    fn format_verdict(&self, passed: bool) -> String {
        serde_json::json!({ "passed": passed }).to_string()
    }
}

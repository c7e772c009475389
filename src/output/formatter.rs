//! Core formatting trait and the plain text implementation

use crate::{
    error::{AppError, Result},
    models::{LatencySummary, RunReport, ThresholdResult},
};
use std::fmt::Write as _;

/// Main trait for report formatting
pub trait OutputFormatter {
    /// Render the whole report
    fn format_report(&self, report: &RunReport) -> Result<String>;

    /// Format a header section
    fn format_header(&self, title: &str) -> String;

    /// Format one threshold verdict line
    fn format_threshold(&self, result: &ThresholdResult) -> String;

    /// Format the final pass/fail line
    fn format_verdict(&self, passed: bool) -> String;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    /// Enable colored output
    pub enable_color: bool,
    /// Include run id, timestamps and the error breakdown
    pub verbose_mode: bool,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
        }
    }
}

/// Plain text formatter
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FormattingOptions {
        &self.options
    }
}

impl OutputFormatter for PlainFormatter {
    fn format_report(&self, report: &RunReport) -> Result<String> {
        render_report(self, report, self.options.verbose_mode, &|label, value| format!("{:<14}{}", label, value))
    }

    fn format_header(&self, title: &str) -> String {
        format!("{}\n{}", title, "=".repeat(title.chars().count()))
    }

    fn format_threshold(&self, result: &ThresholdResult) -> String {
        format!(
            "  [{}] {} (observed {})",
            if result.passed { "PASS" } else { "FAIL" },
            result.rule,
            format_observed(result.observed)
        )
    }

    fn format_verdict(&self, passed: bool) -> String {
        if passed {
            "Result: PASSED".to_string()
        } else {
            "Result: FAILED".to_string()
        }
    }
}

/// Shared report layout; `field` renders one `label: value` line
pub(crate) fn render_report(
    formatter: &dyn OutputFormatter,
    report: &RunReport,
    verbose: bool,
    field: &dyn Fn(&str, String) -> String,
) -> Result<String> {
    let mut out = String::new();
    let fmt_err = |e: std::fmt::Error| AppError::internal(format!("Failed to format report: {}", e));

    writeln!(out, "{}", formatter.format_header("HTTP Load Test Summary")).map_err(fmt_err)?;
    if verbose {
        writeln!(out, "{}", field("Run:", report.run_id.clone())).map_err(fmt_err)?;
        writeln!(
            out,
            "{}",
            field(
                "Window:",
                format!(
                    "{} -> {}",
                    report.started_at.format("%Y-%m-%d %H:%M:%S%.3f UTC"),
                    report.finished_at.format("%H:%M:%S%.3f UTC")
                )
            )
        )
        .map_err(fmt_err)?;
    }
    writeln!(out, "{}", field("Duration:", format!("{:.2}s", report.duration_secs))).map_err(fmt_err)?;
    writeln!(out, "{}", field("Peak VUs:", report.peak_vus.to_string())).map_err(fmt_err)?;
    writeln!(out, "{}", field("Iterations:", report.iterations.to_string())).map_err(fmt_err)?;
    writeln!(
        out,
        "{}",
        field(
            "Requests:",
            format!(
                "{} total, {} ok, {} failed ({:.2}%)",
                report.total_requests,
                report.successful_requests,
                report.failed_requests,
                report.failure_rate * 100.0
            )
        )
    )
    .map_err(fmt_err)?;
    writeln!(out, "{}", field("Throughput:", format!("{:.2} req/s", report.requests_per_second))).map_err(fmt_err)?;

    writeln!(out).map_err(fmt_err)?;
    writeln!(out, "Latency (ms)").map_err(fmt_err)?;
    writeln!(out, "  {}", format_latency(&report.latency)).map_err(fmt_err)?;

    if !report.status_codes.is_empty() {
        writeln!(out).map_err(fmt_err)?;
        writeln!(out, "Status codes").map_err(fmt_err)?;
        for (code, count) in &report.status_codes {
            let label = if *code == 0 { "none".to_string() } else { code.to_string() };
            writeln!(out, "  {:<6}{}", label, count).map_err(fmt_err)?;
        }
    }

    if verbose && !report.errors.is_empty() {
        writeln!(out).map_err(fmt_err)?;
        writeln!(out, "Failures").map_err(fmt_err)?;
        for (kind, count) in &report.errors {
            writeln!(out, "  {:<16}{}", kind, count).map_err(fmt_err)?;
        }
    }

    if !report.thresholds.is_empty() {
        writeln!(out).map_err(fmt_err)?;
        writeln!(out, "Thresholds").map_err(fmt_err)?;
        for result in &report.thresholds {
            writeln!(out, "{}", formatter.format_threshold(result)).map_err(fmt_err)?;
        }
    }

    writeln!(out).map_err(fmt_err)?;
    write!(out, "{}", formatter.format_verdict(report.passed)).map_err(fmt_err)?;

    Ok(out)
}

pub(crate) fn format_latency(latency: &LatencySummary) -> String {
    format!(
        "min {:.2}  avg {:.2}  p50 {:.2}  p90 {:.2}  p95 {:.2}  p99 {:.2}  max {:.2}",
        latency.min_ms,
        latency.avg_ms,
        latency.p50_ms,
        latency.p90_ms,
        latency.p95_ms,
        latency.p99_ms,
        latency.max_ms
    )
}

pub(crate) fn format_observed(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.4}", value)
    }
}

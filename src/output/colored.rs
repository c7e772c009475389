//! Colored formatter implementation with terminal color support

use super::formatter::{format_latency, format_observed, render_report, FormattingOptions, OutputFormatter};
use crate::{
    error::Result,
    models::{LatencySummary, RunReport, ThresholdResult},
};
use colored::*;

/// Latency classification used to color the latency line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceLevel {
    Excellent, // < 50ms
    Good,      // 50-100ms
    Fair,      // 100-300ms
    Poor,      // 300-1000ms
    VeryPoor,  // > 1000ms
}

impl PerformanceLevel {
    /// Determine performance level from response time in milliseconds
    pub fn from_response_time(time_ms: f64) -> Self {
        if time_ms < 50.0 {
            Self::Excellent
        } else if time_ms < 100.0 {
            Self::Good
        } else if time_ms < 300.0 {
            Self::Fair
        } else if time_ms < 1000.0 {
            Self::Poor
        } else {
            Self::VeryPoor
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Excellent => Color::Green,
            Self::Good => Color::Cyan,
            Self::Fair => Color::Yellow,
            Self::Poor => Color::Magenta,
            Self::VeryPoor => Color::Red,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
            Self::VeryPoor => "Very Poor",
        }
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub error: Color,
    pub muted: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            error: Color::Red,
            muted: Color::BrightBlack,
        }
    }
}

/// Colored formatter implementation
pub struct ColoredFormatter {
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self {
            options,
            color_scheme: ColorScheme::default(),
        }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    /// Latency line colored by p95
    pub fn format_latency_line(&self, latency: &LatencySummary) -> String {
        let level = PerformanceLevel::from_response_time(latency.p95_ms);
        format!(
            "{} {}",
            self.colorize(&format_latency(latency), level.color()),
            self.colorize(&format!("({})", level.description()), self.color_scheme.muted)
        )
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_report(&self, report: &RunReport) -> Result<String> {
        let body = render_report(self, report, self.options.verbose_mode, &|label, value| {
            format!("{}{}", self.colorize(&format!("{:<14}", label), self.color_scheme.muted), value)
        })?;

        // Replace the neutral latency line with the colored one
        let plain_line = format!("  {}", format_latency(&report.latency));
        let colored_line = format!("  {}", self.format_latency_line(&report.latency));
        Ok(body.replacen(&plain_line, &colored_line, 1))
    }

    fn format_header(&self, title: &str) -> String {
        let underline = "═".repeat(title.chars().count());
        if self.options.enable_color {
            format!("{}\n{}", title.color(self.color_scheme.header).bold(), underline.color(self.color_scheme.header))
        } else {
            format!("{}\n{}", title, underline)
        }
    }

    fn format_threshold(&self, result: &ThresholdResult) -> String {
        let (mark, color) = if result.passed {
            ("✓", self.color_scheme.success)
        } else {
            ("✗", self.color_scheme.error)
        };
        format!(
            "  {} {} {}",
            self.colorize(mark, color),
            result.rule,
            self.colorize(&format!("(observed {})", format_observed(result.observed)), self.color_scheme.muted)
        )
    }

    fn format_verdict(&self, passed: bool) -> String {
        let (mark, text, color) = if passed {
            ("✓", "PASSED", self.color_scheme.success)
        } else {
            ("✗", "FAILED", self.color_scheme.error)
        };
        if self.options.enable_color {
            format!("{} {}", mark.color(color), text.color(color).bold())
        } else {
            format!("{} {}", mark, text)
        }
    }
}

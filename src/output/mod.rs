//! Report output
//!
//! The final `RunReport` goes to stdout as JSON (default) or as a text
//! summary, colored when the terminal allows it. `--summary-export` also
//! writes the JSON form to a file.

mod colored;
mod formatter;
mod json;

pub use self::colored::{ColorScheme, ColoredFormatter, PerformanceLevel};
pub use formatter::{FormattingOptions, OutputFormatter, PlainFormatter};
pub use json::JsonFormatter;

use crate::{
    error::{AppError, Result},
    models::RunReport,
    types::OutputFormat,
};
use std::path::Path;

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter for `format`; color only applies to text output
    pub fn create_formatter(format: OutputFormat, enable_color: bool, verbose: bool) -> Box<dyn OutputFormatter> {
        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
        };

        match format {
            OutputFormat::Json => Box::new(JsonFormatter::new()),
            OutputFormat::Text if enable_color => Box::new(ColoredFormatter::new(options)),
            OutputFormat::Text => Box::new(PlainFormatter::new(options)),
        }
    }
}

/// Write the JSON report to `path`
pub fn write_summary_export(report: &RunReport, path: &Path) -> Result<()> {
    let json = JsonFormatter::new().format_report(report)?;
    std::fs::write(path, json + "\n")
        .map_err(|e| AppError::io(format!("Failed to write summary to '{}': {}", path.display(), e)))?;
    tracing::info!(path = %path.display(), "summary exported");
    Ok(())
}

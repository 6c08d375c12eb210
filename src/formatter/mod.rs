//! Report output formats.

pub mod json;
pub mod plain;

use crate::report::AnalysisReport;

/// Output format selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Colored human-readable report.
    #[default]
    Plain,
    /// Machine-readable JSON.
    Json,
}

/// Render a report in the chosen format.
pub fn format_report(report: &AnalysisReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Plain => plain::format(report),
        OutputFormat::Json => json::format(report),
    }
}

//! The per-run analysis product consumed by formatters, badges, and the UI.

use serde::{Deserialize, Serialize};

use crate::score::ScoreResult;
use crate::types::{EnrichedViolation, Severity, Tool};

/// Result of one full analysis run: parse status, enriched violations
/// (sorted by position), and the score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub tool: Tool,
    /// False when the YAML failed to parse; violations are then empty and
    /// the score is zeroed.
    pub parse_success: bool,
    pub parse_errors: Vec<String>,
    pub violations: Vec<EnrichedViolation>,
    pub score: ScoreResult,
}

impl AnalysisReport {
    /// Count violations at a given severity.
    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.violations.iter().filter(|v| v.severity == severity).count()
    }

    /// Highest severity present, if any.
    pub fn max_severity(&self) -> Option<Severity> {
        self.violations.iter().map(|v| v.severity).max()
    }

    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }
}

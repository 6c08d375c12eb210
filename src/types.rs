//! Core types shared by the Compose and Kubernetes analyzers.
//!
//! - `Severity` - violation severity levels
//! - `Category` - weighted scoring categories
//! - `RuleCode` - stable rule identifiers (e.g., "CV-S004")
//! - `Violation` - a single positioned rule violation
//! - `RuleMetadata` / `FixExample` - the static per-rule record
//! - `EnrichedViolation` - a violation merged with its rule metadata

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Severity levels for rule violations.
///
/// Ordered from most severe to least severe:
/// `Error > Warning > Info`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Critical issues that must be fixed
    Error,
    /// Important issues that should be addressed
    #[default]
    Warning,
    /// Informational suggestions
    Info,
}

impl Severity {
    /// Parse a severity from a string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warning" => Some(Self::Warning),
            "info" => Some(Self::Info),
            _ => None,
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }

    /// Base score deduction for one violation of this severity,
    /// before diminishing returns are applied.
    pub fn base_deduction(&self) -> f64 {
        match self {
            Self::Error => 15.0,
            Self::Warning => 8.0,
            Self::Info => 3.0,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher severity = lower numeric value for Ord
        let self_val = match self {
            Self::Error => 0,
            Self::Warning => 1,
            Self::Info => 2,
        };
        let other_val = match other {
            Self::Error => 0,
            Self::Warning => 1,
            Self::Info => 2,
        };
        // Reverse so Error > Warning > Info
        other_val.cmp(&self_val)
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Scoring category for a rule.
///
/// The Compose tool uses `Security | Semantic | BestPractice | Schema | Style`;
/// the Kubernetes tool uses `Security | Reliability | BestPractice | Schema |
/// CrossResource`. Each tool carries its own fixed weight table (see
/// [`crate::score`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Security,
    Semantic,
    BestPractice,
    Schema,
    Style,
    Reliability,
    CrossResource,
}

impl Category {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::Semantic => "semantic",
            Self::BestPractice => "best-practice",
            Self::Schema => "schema",
            Self::Style => "style",
            Self::Reliability => "reliability",
            Self::CrossResource => "cross-resource",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A rule code identifier (e.g., "CV-S004", "KA-C003").
///
/// Format: `<tool-prefix>-<category-letter><number>`. Codes are part of the
/// public contract and are never reused for a different rule once published.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleCode(pub String);

impl RuleCode {
    /// Create a new rule code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Get the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the tool prefix (e.g., "CV" for "CV-S004").
    pub fn prefix(&self) -> Option<&str> {
        self.0.split_once('-').map(|(p, _)| p)
    }

    /// Get the category letter (e.g., 'S' for "CV-S004").
    pub fn category_letter(&self) -> Option<char> {
        self.0.split_once('-').and_then(|(_, r)| r.chars().next())
    }

    /// Get the numeric part of the rule code.
    pub fn number(&self) -> Option<u32> {
        self.0
            .split_once('-')
            .map(|(_, r)| r.trim_start_matches(|c: char| c.is_ascii_alphabetic()))
            .and_then(|n| n.parse().ok())
    }
}

impl fmt::Display for RuleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RuleCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for RuleCode {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for RuleCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Which analyzer produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Compose,
    K8s,
}

impl Tool {
    /// Rule code prefix for this tool.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Compose => "CV",
            Self::K8s => "KA",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compose => "compose",
            Self::K8s => "k8s",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Before/after example showing how to fix a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixExample {
    /// What the fix does.
    pub description: &'static str,
    /// Offending snippet.
    pub before: &'static str,
    /// Corrected snippet.
    pub after: &'static str,
}

impl FixExample {
    /// A fix placeholder for rules without a templated fix.
    pub const EMPTY: FixExample = FixExample {
        description: "",
        before: "",
        after: "",
    };
}

/// Static, immutable per-rule record.
#[derive(Debug, Clone, Copy)]
pub struct RuleMetadata {
    /// Stable rule identifier.
    pub code: &'static str,
    /// Short human-readable title.
    pub title: &'static str,
    /// Default severity.
    pub severity: Severity,
    /// Scoring category.
    pub category: Category,
    /// Longer explanation of why the rule matters.
    pub explanation: &'static str,
    /// Fix template.
    pub fix: FixExample,
}

/// A single rule violation found during analysis.
///
/// Produced by exactly one rule evaluation; positions are 1-indexed and
/// refer to the source text the analysis ran against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// The rule code that was violated.
    pub code: RuleCode,
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed).
    pub column: u32,
    /// Optional end line for multi-line values.
    pub end_line: Option<u32>,
    /// Human-readable message describing the violation.
    pub message: String,
}

impl Violation {
    /// Create a new violation.
    pub fn new(code: impl Into<RuleCode>, line: u32, column: u32, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            line,
            column,
            end_line: None,
            message: message.into(),
        }
    }

    /// Set the end line.
    pub fn with_end_line(mut self, end_line: u32) -> Self {
        self.end_line = Some(end_line);
        self
    }
}

impl Ord for Violation {
    fn cmp(&self, other: &Self) -> Ordering {
        // Sort by line, then column, then code, so the final violation
        // list is independent of rule execution order.
        match self.line.cmp(&other.line) {
            Ordering::Equal => match self.column.cmp(&other.column) {
                Ordering::Equal => self.code.as_str().cmp(other.code.as_str()),
                other => other,
            },
            other => other,
        }
    }
}

impl PartialOrd for Violation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Fix example in owned form, as it appears in serialized reports.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FixDetail {
    pub description: String,
    pub before: String,
    pub after: String,
}

impl From<FixExample> for FixDetail {
    fn from(fix: FixExample) -> Self {
        Self {
            description: fix.description.to_string(),
            before: fix.before.to_string(),
            after: fix.after.to_string(),
        }
    }
}

/// A violation merged with its rule metadata for display.
///
/// Built via registry lookup (custom first, then schema). A violation whose
/// rule code resolves to no metadata still renders with safe fallbacks:
/// title = code, category = schema, severity = info, empty fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedViolation {
    pub code: RuleCode,
    pub title: String,
    pub severity: Severity,
    pub category: Category,
    pub line: u32,
    pub column: u32,
    pub end_line: Option<u32>,
    pub message: String,
    pub explanation: String,
    pub fix: FixDetail,
}

impl EnrichedViolation {
    /// Merge a violation with its metadata.
    pub fn from_metadata(violation: Violation, meta: &RuleMetadata) -> Self {
        Self {
            code: violation.code,
            title: meta.title.to_string(),
            severity: meta.severity,
            category: meta.category,
            line: violation.line,
            column: violation.column,
            end_line: violation.end_line,
            message: violation.message,
            explanation: meta.explanation.to_string(),
            fix: meta.fix.into(),
        }
    }

    /// Fallback enrichment for a violation with no matching metadata.
    pub fn fallback(violation: Violation) -> Self {
        let title = violation.code.as_str().to_string();
        Self {
            code: violation.code,
            title,
            severity: Severity::Info,
            category: Category::Schema,
            line: violation.line,
            column: violation.column,
            end_line: violation.end_line,
            message: violation.message,
            explanation: String::new(),
            fix: FixDetail::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("error"), Some(Severity::Error));
        assert_eq!(Severity::parse("WARNING"), Some(Severity::Warning));
        assert_eq!(Severity::parse("Info"), Some(Severity::Info));
        assert_eq!(Severity::parse("invalid"), None);
    }

    #[test]
    fn test_base_deductions() {
        assert_eq!(Severity::Error.base_deduction(), 15.0);
        assert_eq!(Severity::Warning.base_deduction(), 8.0);
        assert_eq!(Severity::Info.base_deduction(), 3.0);
    }

    #[test]
    fn test_rule_code_parts() {
        let code = RuleCode::new("CV-S004");
        assert_eq!(code.prefix(), Some("CV"));
        assert_eq!(code.category_letter(), Some('S'));
        assert_eq!(code.number(), Some(4));

        let code = RuleCode::new("KA-C003");
        assert_eq!(code.prefix(), Some("KA"));
        assert_eq!(code.category_letter(), Some('C'));
        assert_eq!(code.number(), Some(3));

        let invalid = RuleCode::new("OTHER");
        assert_eq!(invalid.prefix(), None);
        assert_eq!(invalid.number(), None);
    }

    #[test]
    fn test_violation_ordering() {
        let v1 = Violation::new("CV-S001", 5, 1, "a");
        let v2 = Violation::new("CV-S002", 3, 1, "b");
        let v3 = Violation::new("CV-S003", 3, 5, "c");
        let v4 = Violation::new("CV-A001", 3, 5, "d");

        let mut violations = vec![v1, v2, v3, v4];
        violations.sort();

        assert_eq!(violations[0].line, 3);
        assert_eq!(violations[0].column, 1);
        assert_eq!(violations[1].code.as_str(), "CV-A001");
        assert_eq!(violations[2].code.as_str(), "CV-S003");
        assert_eq!(violations[3].line, 5);
    }

    #[test]
    fn test_fallback_enrichment() {
        let v = Violation::new("ZZ-X999", 4, 2, "mystery");
        let enriched = EnrichedViolation::fallback(v);
        assert_eq!(enriched.title, "ZZ-X999");
        assert_eq!(enriched.severity, Severity::Info);
        assert_eq!(enriched.category, Category::Schema);
        assert!(enriched.fix.before.is_empty());
    }
}

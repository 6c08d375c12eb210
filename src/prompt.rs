//! Remediation prompt generator.
//!
//! Produces a text artifact an engineer can paste into an AI assistant to
//! get targeted fixes. The section order is a stable contract consumed by
//! downstream tooling: `## Role`, `## Context`, `## Instructions`,
//! `## Output format`, `## Constraints`. Violations are listed grouped by
//! severity, errors first.

use std::fmt::Write;

use crate::report::AnalysisReport;
use crate::types::{Severity, Tool};

/// Build the remediation prompt for one analysis run.
///
/// Returns None when there is nothing to remediate (clean report or parse
/// failure, which needs the parser message instead of rule fixes).
pub fn remediation_prompt(report: &AnalysisReport, document: &str) -> Option<String> {
    if !report.parse_success || report.violations.is_empty() {
        return None;
    }

    let file_kind = match report.tool {
        Tool::Compose => "Docker Compose file",
        Tool::K8s => "Kubernetes manifest",
    };

    let mut prompt = String::new();

    let _ = writeln!(prompt, "## Role");
    let _ = writeln!(
        prompt,
        "You are a senior platform engineer reviewing a {}.",
        file_kind
    );
    let _ = writeln!(prompt);

    let _ = writeln!(prompt, "## Context");
    let _ = writeln!(
        prompt,
        "The file scored {}/100 (grade {}). A linter found {} issue(s):",
        report.score.overall,
        report.score.grade,
        report.violations.len()
    );
    let _ = writeln!(prompt);
    for severity in [Severity::Error, Severity::Warning, Severity::Info] {
        for violation in report.violations.iter().filter(|v| v.severity == severity) {
            let _ = writeln!(
                prompt,
                "- [{}] {} (line {}): {}",
                violation.severity, violation.code, violation.line, violation.message
            );
        }
    }
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "```yaml");
    let _ = write!(prompt, "{}", document);
    if !document.ends_with('\n') {
        let _ = writeln!(prompt);
    }
    let _ = writeln!(prompt, "```");
    let _ = writeln!(prompt);

    let _ = writeln!(prompt, "## Instructions");
    let _ = writeln!(
        prompt,
        "Fix every issue above, starting with the errors. Preserve the file's \
         intent: do not remove services or resources to silence a finding."
    );
    let _ = writeln!(prompt);

    let _ = writeln!(prompt, "## Output format");
    let _ = writeln!(
        prompt,
        "Return the complete corrected YAML in a single fenced code block, \
         followed by a short list of the changes you made."
    );
    let _ = writeln!(prompt);

    let _ = writeln!(prompt, "## Constraints");
    let _ = writeln!(
        prompt,
        "Keep the original formatting style and key order where possible. Do \
         not invent credentials; reference secret stores instead."
    );

    Some(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose;

    const MESSY: &str = "services:\n  web:\n    image: nginx\n    privileged: true\n";

    #[test]
    fn test_sections_in_contract_order() {
        let report = compose::analyze(MESSY);
        let prompt = remediation_prompt(&report, MESSY).unwrap();

        let positions: Vec<usize> = [
            "## Role",
            "## Context",
            "## Instructions",
            "## Output format",
            "## Constraints",
        ]
        .iter()
        .map(|s| prompt.find(s).unwrap())
        .collect();
        assert!(positions.windows(2).all(|p| p[0] < p[1]));
        assert!(prompt.contains("```yaml"));
        assert!(prompt.contains("privileged"));
    }

    #[test]
    fn test_errors_listed_before_infos() {
        let report = compose::analyze(MESSY);
        let prompt = remediation_prompt(&report, MESSY).unwrap();
        let first_error = prompt.find("[error]").unwrap();
        let first_info = prompt.find("[info]").unwrap();
        assert!(first_error < first_info);
    }

    #[test]
    fn test_no_prompt_for_clean_or_unparsable_input() {
        let broken = "services:\n  web:\n   image: [unclosed\n";
        let report = compose::analyze(broken);
        assert!(remediation_prompt(&report, broken).is_none());
    }
}

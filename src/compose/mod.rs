//! Docker Compose validation: document model, rule catalog, analysis entry
//! point.

pub mod parser;
pub mod rules;

pub use parser::{parse_compose, ComposeDocument};
pub use rules::REGISTRY;

use crate::engine::run_rules;
use crate::report::AnalysisReport;
use crate::score::{score, ScoreResult, COMPOSE_WEIGHTS};
use crate::types::Tool;

/// Analyze a Compose file end to end: parse, run every rule, enrich and
/// score.
///
/// A parse failure is not an error for the caller; it produces a report
/// with `parse_success = false`, the parser message, and a zeroed score.
pub fn analyze(content: &str) -> AnalysisReport {
    let doc = match parse_compose(content) {
        Ok(doc) => doc,
        Err(err) => {
            return AnalysisReport {
                tool: Tool::Compose,
                parse_success: false,
                parse_errors: vec![err.to_string()],
                violations: Vec::new(),
                score: ScoreResult::zeroed(&COMPOSE_WEIGHTS),
            };
        }
    };

    let violations = run_rules(&doc, &REGISTRY);
    let score = score(&violations, &REGISTRY, &COMPOSE_WEIGHTS);
    let violations = violations.into_iter().map(|v| REGISTRY.enrich(v)).collect();

    AnalysisReport {
        tool: Tool::Compose,
        parse_success: true,
        parse_errors: Vec::new(),
        violations,
        score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::Grade;
    use crate::types::Severity;

    #[test]
    fn test_analyze_clean_file_scores_high() {
        let yaml = r#"services:
  web:
    image: nginx:1.25
    user: app
    ports:
      - "127.0.0.1:8080:80"
    networks:
      - frontend
    healthcheck:
      test: ["CMD", "curl", "-f", "http://localhost"]
    restart: unless-stopped
    deploy:
      resources:
        limits:
          memory: 256M
networks:
  frontend: {}
"#;
        let report = analyze(yaml);
        assert!(report.parse_success);
        assert!(report.score.overall >= 90, "overall {}", report.score.overall);
        assert_eq!(report.count_by_severity(Severity::Error), 0);
    }

    #[test]
    fn test_analyze_parse_failure_zeroes_score() {
        let report = analyze("services:\n  web:\n   image: [unclosed\n");
        assert!(!report.parse_success);
        assert_eq!(report.parse_errors.len(), 1);
        assert!(report.violations.is_empty());
        assert_eq!(report.score.overall, 0);
        assert_eq!(report.score.grade, Grade::F);
    }

    #[test]
    fn test_analyze_flags_and_enriches() {
        let yaml = "services:\n  web:\n    image: nginx\n    privileged: true\n";
        let report = analyze(yaml);
        assert!(report.parse_success);
        let privileged = report
            .violations
            .iter()
            .find(|v| v.code.as_str() == "CV-S001")
            .unwrap();
        assert_eq!(privileged.severity, Severity::Error);
        assert!(!privileged.fix.after.is_empty());
        assert!(report.score.overall < 100);
    }

    #[test]
    fn test_violations_sorted_by_position() {
        let yaml = "version: \"3\"\nservices:\n  web:\n    image: nginx\n    privileged: true\n";
        let report = analyze(yaml);
        let lines: Vec<u32> = report.violations.iter().map(|v| v.line).collect();
        let mut sorted = lines.clone();
        sorted.sort();
        assert_eq!(lines, sorted);
    }
}

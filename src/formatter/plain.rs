//! Colored terminal report.

use colored::Colorize;
use std::fmt::Write;

use crate::report::AnalysisReport;
use crate::score::Grade;
use crate::types::Severity;

fn severity_tag(severity: Severity) -> String {
    match severity {
        Severity::Error => "error".red().bold().to_string(),
        Severity::Warning => "warning".yellow().bold().to_string(),
        Severity::Info => "info".cyan().to_string(),
    }
}

fn grade_colored(grade: Grade) -> String {
    let text = grade.as_str();
    match grade {
        Grade::APlus | Grade::A | Grade::AMinus => text.green().bold().to_string(),
        Grade::BPlus | Grade::B | Grade::BMinus => text.yellow().bold().to_string(),
        Grade::F => text.red().bold().to_string(),
        _ => text.yellow().to_string(),
    }
}

pub fn format(report: &AnalysisReport) -> String {
    let mut out = String::new();

    if !report.parse_success {
        let _ = writeln!(out, "{}", "Parse failed".red().bold());
        for error in &report.parse_errors {
            let _ = writeln!(out, "  {}", error);
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Score: 0/100 ({})", grade_colored(Grade::F));
        return out;
    }

    if report.violations.is_empty() {
        let _ = writeln!(out, "{}", "No issues found".green().bold());
    } else {
        for violation in &report.violations {
            let _ = writeln!(
                out,
                "{:>4}:{:<3} {} {} {}",
                violation.line,
                violation.column,
                severity_tag(violation.severity),
                violation.code.as_str().bold(),
                violation.message,
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{} error(s), {} warning(s), {} info",
            report.count_by_severity(Severity::Error),
            report.count_by_severity(Severity::Warning),
            report.count_by_severity(Severity::Info),
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Score: {}/100 ({})",
        report.score.overall,
        grade_colored(report.score.grade)
    );
    for category in &report.score.categories {
        let _ = writeln!(
            out,
            "  {:<14} {:>6.2}  (weight {})",
            category.category.as_str(),
            category.score,
            category.weight,
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose;

    #[test]
    fn test_plain_lists_violations_and_score() {
        colored::control::set_override(false);
        let report = compose::analyze("services:\n  web:\n    image: nginx\n    privileged: true\n");
        let out = format(&report);

        assert!(out.contains("CV-S001"));
        assert!(out.contains("error"));
        assert!(out.contains("Score:"));
        assert!(out.contains("security"));
    }

    #[test]
    fn test_plain_parse_failure() {
        colored::control::set_override(false);
        let report = compose::analyze("services:\n  web:\n   image: [unclosed\n");
        let out = format(&report);
        assert!(out.contains("Parse failed"));
        assert!(out.contains("0/100"));
    }
}

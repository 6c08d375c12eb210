//! End-to-end Compose analysis scenarios.

use manifest_lint::compose;
use manifest_lint::score::Grade;
use manifest_lint::types::Severity;

/// A document engineered to satisfy every rule in the catalog.
const SPOTLESS: &str = r#"services:
  web:
    image: nginx:1.25
    user: app
    healthcheck:
      test: ["CMD", "true"]
    restart: unless-stopped
    deploy:
      resources:
        limits:
          memory: 256M
"#;

#[test]
fn clean_document_scores_perfect() {
    let report = compose::analyze(SPOTLESS);
    assert!(report.parse_success);
    assert!(
        report.violations.is_empty(),
        "unexpected violations: {:?}",
        report.violations.iter().map(|v| v.code.as_str()).collect::<Vec<_>>()
    );
    assert_eq!(report.score.overall, 100);
    assert_eq!(report.score.grade, Grade::APlus);
    assert!(report.score.categories.iter().all(|c| c.score == 100.0));
}

#[test]
fn single_security_error_only_dents_security() {
    let risky = SPOTLESS.replace("    user: app\n", "    user: app\n    privileged: true\n");
    let report = compose::analyze(&risky);

    assert_eq!(report.violations.len(), 1);
    assert_eq!(report.violations[0].code.as_str(), "CV-S001");
    assert_eq!(report.violations[0].severity, Severity::Error);

    assert!(report.score.overall < 100);
    assert_ne!(report.score.grade, Grade::APlus);
    for category in &report.score.categories {
        if category.category.as_str() == "security" {
            assert_eq!(category.score, 85.0);
        } else {
            assert_eq!(category.score, 100.0);
        }
    }
}

#[test]
fn unquoted_port_mapping_fires_schema_rule() {
    let unquoted = "services:\n  web:\n    image: nginx:1.25\n    ports:\n      - 8080:80\n";
    let report = compose::analyze(unquoted);
    let hit = report
        .violations
        .iter()
        .find(|v| v.code.as_str() == "CV-Y003")
        .expect("unquoted mapping must fire the schema rule");
    assert_eq!(hit.severity, Severity::Error);
    assert_eq!(hit.line, 5);

    let quoted = unquoted.replace("- 8080:80", "- \"8080:80\"");
    let report = compose::analyze(&quoted);
    assert!(report.violations.iter().all(|v| v.code.as_str() != "CV-Y003"));
}

#[test]
fn circular_dependency_reported_once_naming_both_services() {
    let yaml = r#"services:
  a:
    image: a:1
    depends_on:
      - b
  b:
    image: b:1
    depends_on:
      - a
"#;
    let report = compose::analyze(yaml);
    let cycles: Vec<_> = report
        .violations
        .iter()
        .filter(|v| v.code.as_str() == "CV-M001")
        .collect();
    assert_eq!(cycles.len(), 1);
    assert!(cycles[0].message.contains("\"a\""));
    assert!(cycles[0].message.contains("\"b\""));
}

#[test]
fn parse_failure_degrades_to_zero_not_panic() {
    let report = compose::analyze("services:\n  web:\n   image: [unclosed\n");
    assert!(!report.parse_success);
    assert!(!report.parse_errors.is_empty());
    assert!(report.violations.is_empty());
    assert_eq!(report.score.overall, 0);
    assert_eq!(report.score.grade, Grade::F);
}

#[test]
fn messy_real_world_file_accumulates_findings() {
    let yaml = r#"version: "3.8"
services:
  web:
    ports:
      - "9090:9090"
      - "8080:80"
    image: nginx:latest
    privileged: true
    volumes:
      - /var/run/docker.sock:/var/run/docker.sock
    depends_on:
      - db
  db:
    image: postgres
    environment:
      POSTGRES_PASSWORD: hunter2
"#;
    let report = compose::analyze(yaml);
    assert!(report.parse_success);

    let codes: Vec<&str> = report.violations.iter().map(|v| v.code.as_str()).collect();
    for expected in [
        "CV-Y001", // version field
        "CV-S001", // privileged
        "CV-S002", // docker socket
        "CV-S004", // hardcoded secret
        "CV-B001", // postgres has no tag
        "CV-B002", // nginx:latest
        "CV-T001", // web before db
        "CV-T002", // ports before image
        "CV-T004", // ports unsorted
    ] {
        assert!(codes.contains(&expected), "missing {expected} in {codes:?}");
    }

    assert!(report.score.overall < 90, "overall was {}", report.score.overall);
    assert_ne!(report.score.grade, Grade::APlus);
    assert!(report.count_by_severity(Severity::Error) >= 3);
}

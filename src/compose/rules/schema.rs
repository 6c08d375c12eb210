//! Schema conformance rules (CV-Y).
//!
//! These check the document against the Compose file format itself rather
//! than against operational practice. The set is fixed; new lint ideas
//! belong in the other categories.

use crate::compose::parser::{ComposeDocument, KNOWN_TOP_LEVEL_KEYS, RESTART_POLICIES};
use crate::engine::Rule;
use crate::types::{Category, FixExample, RuleMetadata, Severity, Violation};

pub fn rules() -> Vec<Rule<ComposeDocument>> {
    vec![
        Rule::new(
            RuleMetadata {
                code: "CV-Y001",
                title: "no-version-field",
                severity: Severity::Warning,
                category: Category::Schema,
                explanation: "The top-level version field is obsolete in the Compose \
                              specification and is ignored by current tooling.",
                fix: FixExample {
                    description: "Delete the version line",
                    before: "version: \"3.8\"\nservices:",
                    after: "services:",
                },
            },
            check_version_field,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-Y002",
                title: "require-services-section",
                severity: Severity::Error,
                category: Category::Schema,
                explanation: "A Compose file without a services section defines nothing to run.",
                fix: FixExample {
                    description: "Add a services section",
                    before: "volumes:\n  data: {}",
                    after: "services:\n  app:\n    image: app:1.0\nvolumes:\n  data: {}",
                },
            },
            check_services_section,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-Y003",
                title: "quote-port-mappings",
                severity: Severity::Error,
                category: Category::Schema,
                explanation: "An unquoted mapping like 8080:80 is parsed by YAML as a key/value \
                              pair, and values such as 22:22 are read as base-60 integers.",
                fix: FixExample {
                    description: "Quote the port mapping",
                    before: "ports:\n  - 8080:80",
                    after: "ports:\n  - \"8080:80\"",
                },
            },
            check_unquoted_ports,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-Y004",
                title: "valid-port-range",
                severity: Severity::Error,
                category: Category::Schema,
                explanation: "Ports must be between 1 and 65535; anything else fails at \
                              container start.",
                fix: FixExample {
                    description: "Use a port within 1-65535",
                    before: "ports:\n  - \"99999:80\"",
                    after: "ports:\n  - \"9999:80\"",
                },
            },
            check_port_range,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-Y005",
                title: "service-body-must-be-mapping",
                severity: Severity::Error,
                category: Category::Schema,
                explanation: "Each service must be a mapping of configuration keys; a scalar \
                              body is a structural error.",
                fix: FixExample {
                    description: "Give the service a mapping body",
                    before: "services:\n  web: nginx",
                    after: "services:\n  web:\n    image: nginx:1.25",
                },
            },
            check_service_body,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-Y006",
                title: "no-unknown-top-level-keys",
                severity: Severity::Warning,
                category: Category::Schema,
                explanation: "Unknown top-level keys are silently ignored by Compose, which \
                              usually hides a typo. x- prefixed extension keys are allowed.",
                fix: FixExample {
                    description: "Fix the typo or use an x- extension key",
                    before: "servcies:\n  web:\n    image: nginx:1.25",
                    after: "services:\n  web:\n    image: nginx:1.25",
                },
            },
            check_unknown_top_level,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-Y007",
                title: "valid-restart-policy",
                severity: Severity::Error,
                category: Category::Schema,
                explanation: "restart accepts only no, always, on-failure and unless-stopped.",
                fix: FixExample {
                    description: "Use a valid policy",
                    before: "restart: forever",
                    after: "restart: unless-stopped",
                },
            },
            check_restart_policy,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-Y008",
                title: "require-image-or-build",
                severity: Severity::Error,
                category: Category::Schema,
                explanation: "A service with neither image nor build has nothing to run.",
                fix: FixExample {
                    description: "Add an image or a build context",
                    before: "services:\n  web:\n    ports:\n      - \"80:80\"",
                    after: "services:\n  web:\n    image: nginx:1.25\n    ports:\n      - \"80:80\"",
                },
            },
            check_image_or_build,
        ),
    ]
}

fn check_version_field(doc: &ComposeDocument) -> Vec<Violation> {
    match &doc.version {
        Some(version) => vec![Violation::new(
            "CV-Y001",
            version.line,
            1,
            format!("Top-level version (\"{}\") is obsolete.", version.value),
        )],
        None => Vec::new(),
    }
}

fn check_services_section(doc: &ComposeDocument) -> Vec<Violation> {
    if doc.has_services_key {
        return Vec::new();
    }
    vec![Violation::new(
        "CV-Y002",
        1,
        1,
        "File has no services section.".to_string(),
    )]
}

fn check_unquoted_ports(doc: &ComposeDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for service in &doc.services {
        for port in &service.ports {
            // A bare container port (`- 80`) is fine; mappings are not.
            if !port.quoted && port.raw.contains(':') {
                violations.push(Violation::new(
                    "CV-Y003",
                    port.line,
                    1,
                    format!(
                        "Port mapping \"{}\" of service \"{}\" must be quoted.",
                        port.raw, service.name
                    ),
                ));
            }
        }
    }
    violations
}

fn valid_port(port: u32) -> bool {
    (1..=65535).contains(&port)
}

fn check_port_range(doc: &ComposeDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for service in &doc.services {
        for port in &service.ports {
            let bad = port.host_port.map(|p| !valid_port(p)).unwrap_or(false)
                || port.container_port.map(|p| !valid_port(p)).unwrap_or(false);
            if bad {
                violations.push(Violation::new(
                    "CV-Y004",
                    port.line,
                    1,
                    format!(
                        "Port mapping \"{}\" of service \"{}\" is out of range (1-65535).",
                        port.raw, service.name
                    ),
                ));
            }
        }
    }
    violations
}

fn check_service_body(doc: &ComposeDocument) -> Vec<Violation> {
    doc.services
        .iter()
        .filter(|s| !s.is_mapping)
        .map(|s| {
            Violation::new(
                "CV-Y005",
                s.line,
                1,
                format!("Service \"{}\" must be a mapping.", s.name),
            )
        })
        .collect()
}

fn check_unknown_top_level(doc: &ComposeDocument) -> Vec<Violation> {
    doc.top_level_keys
        .iter()
        .filter(|k| !KNOWN_TOP_LEVEL_KEYS.contains(&k.value.as_str()) && !k.value.starts_with("x-"))
        .map(|k| {
            Violation::new(
                "CV-Y006",
                k.line,
                1,
                format!("Unknown top-level key \"{}\".", k.value),
            )
        })
        .collect()
}

fn check_restart_policy(doc: &ComposeDocument) -> Vec<Violation> {
    doc.services
        .iter()
        .filter_map(|s| s.restart.as_ref().map(|r| (s, r)))
        .filter(|(_, restart)| {
            // `on-failure:5` carries a retry count.
            let policy = restart.value.split(':').next().unwrap_or("");
            !RESTART_POLICIES.contains(&policy)
        })
        .map(|(s, restart)| {
            Violation::new(
                "CV-Y007",
                restart.line,
                1,
                format!(
                    "Service \"{}\" has invalid restart policy \"{}\".",
                    s.name, restart.value
                ),
            )
        })
        .collect()
}

fn check_image_or_build(doc: &ComposeDocument) -> Vec<Violation> {
    doc.services
        .iter()
        .filter(|s| s.is_mapping && s.image.is_none() && s.build_line.is_none())
        .map(|s| {
            Violation::new(
                "CV-Y008",
                s.line,
                1,
                format!("Service \"{}\" declares neither image nor build.", s.name),
            )
        })
        .collect()
}

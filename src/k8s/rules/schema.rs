//! Schema conformance rules (KA-Y). Fixed set; structural checks the API
//! server itself would reject or silently misinterpret.

use std::collections::BTreeMap;

use crate::engine::Rule;
use crate::k8s::parser::K8sDocument;
use crate::types::{Category, FixExample, RuleMetadata, Severity, Violation};

pub fn rules() -> Vec<Rule<K8sDocument>> {
    vec![
        Rule::new(
            RuleMetadata {
                code: "KA-Y001",
                title: "require-api-version",
                severity: Severity::Error,
                category: Category::Schema,
                explanation: "Every resource must declare its apiVersion.",
                fix: FixExample {
                    description: "Add apiVersion",
                    before: "kind: Deployment",
                    after: "apiVersion: apps/v1\nkind: Deployment",
                },
            },
            check_api_version,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-Y002",
                title: "require-kind",
                severity: Severity::Error,
                category: Category::Schema,
                explanation: "Every resource must declare its kind.",
                fix: FixExample {
                    description: "Add kind",
                    before: "apiVersion: v1",
                    after: "apiVersion: v1\nkind: ConfigMap",
                },
            },
            check_kind,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-Y003",
                title: "require-name",
                severity: Severity::Error,
                category: Category::Schema,
                explanation: "Every resource needs metadata.name.",
                fix: FixExample {
                    description: "Name the resource",
                    before: "metadata: {}",
                    after: "metadata:\n  name: web",
                },
            },
            check_name,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-Y004",
                title: "valid-dns1123-name",
                severity: Severity::Error,
                category: Category::Schema,
                explanation: "Names must be DNS-1123 subdomains: lowercase alphanumerics and \
                              hyphens, starting and ending alphanumeric, at most 253 chars.",
                fix: FixExample {
                    description: "Use a DNS-compatible name",
                    before: "name: My_App",
                    after: "name: my-app",
                },
            },
            check_dns1123_names,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-Y005",
                title: "require-containers",
                severity: Severity::Error,
                category: Category::Schema,
                explanation: "A workload with an empty containers list cannot run.",
                fix: FixExample {
                    description: "Declare at least one container",
                    before: "spec:\n  containers: []",
                    after: "spec:\n  containers:\n    - name: app\n      image: app:1.0",
                },
            },
            check_containers_present,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-Y006",
                title: "require-container-image",
                severity: Severity::Error,
                category: Category::Schema,
                explanation: "A container without an image is rejected at admission.",
                fix: FixExample {
                    description: "Set the image",
                    before: "- name: app",
                    after: "- name: app\n  image: app:1.0",
                },
            },
            check_container_images,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-Y007",
                title: "valid-container-port",
                severity: Severity::Error,
                category: Category::Schema,
                explanation: "containerPort must be between 1 and 65535.",
                fix: FixExample {
                    description: "Use a valid port",
                    before: "containerPort: 99999",
                    after: "containerPort: 9999",
                },
            },
            check_container_ports,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-Y008",
                title: "selector-matches-template",
                severity: Severity::Error,
                category: Category::Schema,
                explanation: "A workload whose selector does not match its own pod template \
                              labels is rejected by the API server.",
                fix: FixExample {
                    description: "Align selector and template labels",
                    before: "selector:\n  matchLabels:\n    app: web\ntemplate:\n  metadata:\n    labels:\n      app: frontend",
                    after: "selector:\n  matchLabels:\n    app: web\ntemplate:\n  metadata:\n    labels:\n      app: web",
                },
            },
            check_selector_template_match,
        ),
    ]
}

fn check_api_version(doc: &K8sDocument) -> Vec<Violation> {
    doc.resources
        .iter()
        .filter(|r| r.api_version.is_none())
        .map(|r| Violation::new("KA-Y001", r.line, 1, format!("{} has no apiVersion.", r.display())))
        .collect()
}

fn check_kind(doc: &K8sDocument) -> Vec<Violation> {
    doc.resources
        .iter()
        .filter(|r| r.kind.is_none())
        .map(|r| Violation::new("KA-Y002", r.line, 1, "Resource has no kind.".to_string()))
        .collect()
}

fn check_name(doc: &K8sDocument) -> Vec<Violation> {
    doc.resources
        .iter()
        .filter(|r| r.name.is_none())
        .map(|r| {
            Violation::new(
                "KA-Y003",
                r.line,
                1,
                format!(
                    "{} resource has no metadata.name.",
                    r.kind.as_deref().unwrap_or("Unknown")
                ),
            )
        })
        .collect()
}

fn is_dns1123(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 253
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
        && !name.starts_with(['-', '.'])
        && !name.ends_with(['-', '.'])
}

fn check_dns1123_names(doc: &K8sDocument) -> Vec<Violation> {
    doc.resources
        .iter()
        .filter_map(|r| r.name.as_ref().map(|n| (r, n)))
        .filter(|(_, name)| !is_dns1123(name))
        .map(|(r, name)| {
            Violation::new(
                "KA-Y004",
                r.line,
                1,
                format!("Name \"{}\" is not a valid DNS-1123 subdomain.", name),
            )
        })
        .collect()
}

fn check_containers_present(doc: &K8sDocument) -> Vec<Violation> {
    doc.resources
        .iter()
        .filter(|r| r.is_workload() && r.containers.is_empty())
        .map(|r| {
            Violation::new(
                "KA-Y005",
                r.line,
                1,
                format!("{} declares no containers.", r.display()),
            )
        })
        .collect()
}

fn check_container_images(doc: &K8sDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for resource in &doc.resources {
        for container in resource.containers.iter().filter(|c| c.image.is_none()) {
            violations.push(Violation::new(
                "KA-Y006",
                container.line,
                1,
                format!(
                    "Container \"{}\" of {} has no image.",
                    container.name,
                    resource.display()
                ),
            ));
        }
    }
    violations
}

fn check_container_ports(doc: &K8sDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for resource in &doc.resources {
        for container in &resource.containers {
            for port in &container.ports {
                if !(1..=65535).contains(&port.value) {
                    violations.push(Violation::new(
                        "KA-Y007",
                        port.line,
                        1,
                        format!(
                            "containerPort {} of container \"{}\" is out of range.",
                            port.value, container.name
                        ),
                    ));
                }
            }
        }
    }
    violations
}

/// Selector must be a subset of the template labels.
fn selector_subset(selector: &BTreeMap<String, String>, labels: &BTreeMap<String, String>) -> bool {
    selector.iter().all(|(k, v)| labels.get(k) == Some(v))
}

fn check_selector_template_match(doc: &K8sDocument) -> Vec<Violation> {
    doc.resources
        .iter()
        .filter(|r| {
            matches!(
                r.kind.as_deref(),
                Some("Deployment") | Some("StatefulSet") | Some("DaemonSet") | Some("ReplicaSet")
            ) && !r.selector.is_empty()
                && !selector_subset(&r.selector, &r.template_labels)
        })
        .map(|r| {
            Violation::new(
                "KA-Y008",
                r.line,
                1,
                format!(
                    "Selector of {} does not match its pod template labels.",
                    r.display()
                ),
            )
        })
        .collect()
}

//! Style rules (CV-T). All informational; they keep large Compose files
//! consistently ordered and diff-friendly.

use crate::compose::parser::{ComposeDocument, ServiceDef};
use crate::engine::Rule;
use crate::types::{Category, FixExample, RuleMetadata, Severity, Violation};

/// Recommended ordering for service-level keys, loosely grouped: identity,
/// build/run inputs, wiring, runtime policy.
const SERVICE_KEY_ORDER: &[&str] = &[
    "image",
    "build",
    "container_name",
    "command",
    "entrypoint",
    "user",
    "environment",
    "env_file",
    "ports",
    "expose",
    "volumes",
    "networks",
    "depends_on",
    "links",
    "healthcheck",
    "restart",
    "deploy",
];

/// Recommended ordering for top-level keys.
const TOP_LEVEL_ORDER: &[&str] = &[
    "version", "name", "include", "services", "networks", "volumes", "configs", "secrets",
];

pub fn rules() -> Vec<Rule<ComposeDocument>> {
    vec![
        Rule::new(
            RuleMetadata {
                code: "CV-T001",
                title: "services-alphabetical-order",
                severity: Severity::Info,
                category: Category::Style,
                explanation: "Alphabetical service order makes large files scannable and keeps \
                              merge diffs small.",
                fix: FixExample {
                    description: "Sort services alphabetically",
                    before: "services:\n  web:\n  db:",
                    after: "services:\n  db:\n  web:",
                },
            },
            check_services_order,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-T002",
                title: "service-keys-order",
                severity: Severity::Info,
                category: Category::Style,
                explanation: "A consistent key order inside every service lets readers find \
                              image, ports and volumes in the same place each time.",
                fix: FixExample {
                    description: "Reorder keys (image first, then build inputs, wiring, policy)",
                    before: "web:\n  ports:\n    - \"80:80\"\n  image: nginx:1.25",
                    after: "web:\n  image: nginx:1.25\n  ports:\n    - \"80:80\"",
                },
            },
            check_service_keys_order,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-T003",
                title: "depends-on-alphabetical-order",
                severity: Severity::Info,
                category: Category::Style,
                explanation: "Sorted dependency lists make it obvious at a glance whether a \
                              dependency is already present.",
                fix: FixExample {
                    description: "Sort depends_on entries",
                    before: "depends_on:\n  - redis\n  - db",
                    after: "depends_on:\n  - db\n  - redis",
                },
            },
            check_depends_on_order,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-T004",
                title: "ports-sorted",
                severity: Severity::Info,
                category: Category::Style,
                explanation: "Numerically sorted port lists make collisions and gaps easier to \
                              spot.",
                fix: FixExample {
                    description: "Sort ports by host port",
                    before: "ports:\n  - \"9090:9090\"\n  - \"8080:80\"",
                    after: "ports:\n  - \"8080:80\"\n  - \"9090:9090\"",
                },
            },
            check_ports_sorted,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-T005",
                title: "no-quotes-in-volumes",
                severity: Severity::Info,
                category: Category::Style,
                explanation: "Volume mount strings never need quoting; dropping the quotes keeps \
                              them consistent with the rest of the file.",
                fix: FixExample {
                    description: "Remove the quotes",
                    before: "volumes:\n  - \"./src:/app\"",
                    after: "volumes:\n  - ./src:/app",
                },
            },
            check_quoted_volumes,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-T006",
                title: "top-level-keys-order",
                severity: Severity::Info,
                category: Category::Style,
                explanation: "Keeping services before the resource sections (networks, volumes, \
                              configs, secrets) matches the conventional file shape.",
                fix: FixExample {
                    description: "Reorder top-level sections",
                    before: "volumes:\n  data: {}\nservices:\n  web:\n    image: nginx:1.25",
                    after: "services:\n  web:\n    image: nginx:1.25\nvolumes:\n  data: {}",
                },
            },
            check_top_level_order,
        ),
    ]
}

/// Rank of a key in a recommended-order table. Unknown keys keep their
/// relative position by ranking after all known ones.
fn order_rank(table: &[&str], key: &str) -> usize {
    table.iter().position(|k| *k == key).unwrap_or(table.len())
}

fn check_services_order(doc: &ComposeDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for pair in doc.services.windows(2) {
        if pair[1].name < pair[0].name {
            violations.push(Violation::new(
                "CV-T001",
                pair[1].line,
                1,
                format!(
                    "Service \"{}\" should be declared before \"{}\".",
                    pair[1].name, pair[0].name
                ),
            ));
        }
    }
    violations
}

fn first_misordered_key(service: &ServiceDef) -> Option<&str> {
    let known: Vec<&str> = service
        .keys
        .iter()
        .map(|k| k.as_str())
        .filter(|k| SERVICE_KEY_ORDER.contains(k))
        .collect();
    known
        .windows(2)
        .find(|pair| order_rank(SERVICE_KEY_ORDER, pair[1]) < order_rank(SERVICE_KEY_ORDER, pair[0]))
        .map(|pair| pair[1])
}

fn check_service_keys_order(doc: &ComposeDocument) -> Vec<Violation> {
    doc.services
        .iter()
        .filter_map(|s| first_misordered_key(s).map(|key| (s, key)))
        .map(|(s, key)| {
            Violation::new(
                "CV-T002",
                s.line,
                1,
                format!(
                    "Key \"{}\" of service \"{}\" is out of the recommended order.",
                    key, s.name
                ),
            )
        })
        .collect()
}

fn check_depends_on_order(doc: &ComposeDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for service in &doc.services {
        for pair in service.depends_on.windows(2) {
            if pair[1].value < pair[0].value {
                violations.push(Violation::new(
                    "CV-T003",
                    pair[1].line,
                    1,
                    format!(
                        "depends_on of service \"{}\" is not sorted (\"{}\" after \"{}\").",
                        service.name, pair[1].value, pair[0].value
                    ),
                ));
                break;
            }
        }
    }
    violations
}

fn check_ports_sorted(doc: &ComposeDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for service in &doc.services {
        let sort_key =
            |p: &crate::compose::parser::PortMapping| (p.host_port, p.container_port);
        for pair in service.ports.windows(2) {
            if sort_key(&pair[1]) < sort_key(&pair[0]) {
                violations.push(Violation::new(
                    "CV-T004",
                    pair[1].line,
                    1,
                    format!(
                        "Ports of service \"{}\" are not sorted (\"{}\" after \"{}\").",
                        service.name, pair[1].raw, pair[0].raw
                    ),
                ));
                break;
            }
        }
    }
    violations
}

fn check_quoted_volumes(doc: &ComposeDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for service in &doc.services {
        for mount in service.volumes.iter().filter(|m| m.quoted) {
            violations.push(Violation::new(
                "CV-T005",
                mount.line,
                1,
                format!(
                    "Volume mount \"{}\" of service \"{}\" does not need quotes.",
                    mount.raw, service.name
                ),
            ));
        }
    }
    violations
}

fn check_top_level_order(doc: &ComposeDocument) -> Vec<Violation> {
    let keys: Vec<&crate::compose::parser::Located<String>> = doc
        .top_level_keys
        .iter()
        .filter(|k| TOP_LEVEL_ORDER.contains(&k.value.as_str()))
        .collect();
    let mut violations = Vec::new();
    for pair in keys.windows(2) {
        if order_rank(TOP_LEVEL_ORDER, &pair[1].value) < order_rank(TOP_LEVEL_ORDER, &pair[0].value)
        {
            violations.push(Violation::new(
                "CV-T006",
                pair[1].line,
                1,
                format!(
                    "Top-level key \"{}\" should come before \"{}\".",
                    pair[1].value, pair[0].value
                ),
            ));
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::parser::parse_compose;

    fn check(yaml: &str, check_fn: fn(&ComposeDocument) -> Vec<Violation>) -> Vec<Violation> {
        check_fn(&parse_compose(yaml).unwrap())
    }

    #[test]
    fn test_services_alphabetical() {
        let sorted = "services:\n  api:\n    image: a:1\n  web:\n    image: w:1\n";
        assert!(check(sorted, check_services_order).is_empty());

        let unsorted = "services:\n  web:\n    image: w:1\n  api:\n    image: a:1\n";
        let violations = check(unsorted, check_services_order);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].line, 4);
    }

    #[test]
    fn test_service_key_order() {
        let yaml = "services:\n  web:\n    ports:\n      - \"80:80\"\n    image: nginx:1.25\n";
        let violations = check(yaml, check_service_keys_order);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("image"));

        let ok = "services:\n  web:\n    image: nginx:1.25\n    ports:\n      - \"80:80\"\n";
        assert!(check(ok, check_service_keys_order).is_empty());
    }

    #[test]
    fn test_unknown_service_keys_ignored() {
        let yaml = "services:\n  web:\n    image: nginx:1.25\n    labels:\n      a: b\n    ports:\n      - \"80:80\"\n";
        assert!(check(yaml, check_service_keys_order).is_empty());
    }

    #[test]
    fn test_depends_on_order() {
        let yaml = "services:\n  web:\n    image: w:1\n    depends_on:\n      - redis\n      - db\n  db:\n    image: d:1\n  redis:\n    image: r:1\n";
        let violations = check(yaml, check_depends_on_order);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].line, 6);
    }

    #[test]
    fn test_ports_sorted() {
        let yaml = "services:\n  web:\n    image: w:1\n    ports:\n      - \"9090:9090\"\n      - \"8080:80\"\n";
        let violations = check(yaml, check_ports_sorted);
        assert_eq!(violations.len(), 1);

        let ok = "services:\n  web:\n    image: w:1\n    ports:\n      - \"8080:80\"\n      - \"9090:9090\"\n";
        assert!(check(ok, check_ports_sorted).is_empty());
    }

    #[test]
    fn test_quoted_volumes() {
        let yaml = "services:\n  web:\n    image: w:1\n    volumes:\n      - \"./src:/app\"\n      - data:/var/lib/data\nvolumes:\n  data: {}\n";
        let violations = check(yaml, check_quoted_volumes);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].line, 5);
    }

    #[test]
    fn test_top_level_order() {
        let yaml = "volumes:\n  data: {}\nservices:\n  web:\n    image: w:1\n";
        let violations = check(yaml, check_top_level_order);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("services"));
    }
}

//! Semantic rules (CV-M): cross-service consistency checks.

use std::collections::HashMap;

use crate::compose::parser::ComposeDocument;
use crate::engine::Rule;
use crate::types::{Category, FixExample, RuleMetadata, Severity, Violation};

pub fn rules() -> Vec<Rule<ComposeDocument>> {
    vec![
        Rule::new(
            RuleMetadata {
                code: "CV-M001",
                title: "no-circular-depends-on",
                severity: Severity::Error,
                category: Category::Semantic,
                explanation: "Circular depends_on chains cannot be satisfied; Compose has no \
                              valid startup order for the involved services.",
                fix: FixExample {
                    description: "Break the cycle by removing one dependency edge",
                    before: "services:\n  a:\n    depends_on: [b]\n  b:\n    depends_on: [a]",
                    after: "services:\n  a:\n    depends_on: [b]\n  b: {}",
                },
            },
            check_circular_depends_on,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-M002",
                title: "no-unknown-depends-on",
                severity: Severity::Error,
                category: Category::Semantic,
                explanation: "depends_on must reference a service defined in the same file; an \
                              unknown name fails at compose up.",
                fix: FixExample {
                    description: "Reference an existing service or define the missing one",
                    before: "depends_on:\n  - databse",
                    after: "depends_on:\n  - database",
                },
            },
            check_unknown_depends_on,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-M003",
                title: "no-duplicate-exported-ports",
                severity: Severity::Error,
                category: Category::Semantic,
                explanation: "Two services publishing the same host port cannot both start; the \
                              second bind fails at runtime.",
                fix: FixExample {
                    description: "Give each service a distinct host port",
                    before: "ports:\n  - \"8080:80\"  # in two services",
                    after: "ports:\n  - \"8081:80\"",
                },
            },
            check_duplicate_exported_ports,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-M004",
                title: "no-undeclared-networks",
                severity: Severity::Error,
                category: Category::Semantic,
                explanation: "A service can only join networks declared in the top-level networks \
                              section (or the implicit default network).",
                fix: FixExample {
                    description: "Declare the network at the top level",
                    before: "services:\n  web:\n    networks: [frontend]",
                    after: "services:\n  web:\n    networks: [frontend]\nnetworks:\n  frontend: {}",
                },
            },
            check_undeclared_networks,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-M005",
                title: "no-undeclared-volumes",
                severity: Severity::Error,
                category: Category::Semantic,
                explanation: "Named volume mounts must reference a volume declared in the \
                              top-level volumes section.",
                fix: FixExample {
                    description: "Declare the named volume at the top level",
                    before: "volumes:\n  - data:/var/lib/data",
                    after: "volumes:\n  - data:/var/lib/data\n# top level\nvolumes:\n  data: {}",
                },
            },
            check_undeclared_volumes,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-M006",
                title: "no-duplicate-container-names",
                severity: Severity::Error,
                category: Category::Semantic,
                explanation: "container_name must be unique; Docker refuses to start two \
                              containers with the same name.",
                fix: FixExample {
                    description: "Rename or drop one of the container_name fields",
                    before: "container_name: app  # in two services",
                    after: "container_name: app-worker",
                },
            },
            check_duplicate_container_names,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-M007",
                title: "no-self-depends-on",
                severity: Severity::Error,
                category: Category::Semantic,
                explanation: "A service cannot depend on itself.",
                fix: FixExample {
                    description: "Remove the self-reference",
                    before: "web:\n  depends_on: [web]",
                    after: "web: {}",
                },
            },
            check_self_depends_on,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-M008",
                title: "no-unused-declared-resources",
                severity: Severity::Info,
                category: Category::Semantic,
                explanation: "Declared networks and volumes no service references are dead \
                              configuration and usually a leftover from a rename.",
                fix: FixExample {
                    description: "Remove the unused declaration or wire it to a service",
                    before: "networks:\n  legacy: {}",
                    after: "",
                },
            },
            check_unused_declared_resources,
        ),
    ]
}

/// One violation per dependency cycle, naming every member once.
fn check_circular_depends_on(doc: &ComposeDocument) -> Vec<Violation> {
    let names: Vec<&str> = doc.services.iter().map(|s| s.name.as_str()).collect();
    let index_of: HashMap<&str, usize> =
        names.iter().enumerate().map(|(i, n)| (*n, i)).collect();

    let adjacency: Vec<Vec<usize>> = doc
        .services
        .iter()
        .map(|s| {
            s.depends_on
                .iter()
                .filter_map(|d| index_of.get(d.value.as_str()).copied())
                .collect()
        })
        .collect();

    let mut violations = Vec::new();
    for scc in strongly_connected_components(&adjacency) {
        // Self-loops are CV-M007's business.
        if scc.len() < 2 {
            continue;
        }
        let mut members: Vec<&str> = scc.iter().map(|&i| names[i]).collect();
        members.sort_unstable();

        let first = scc
            .iter()
            .map(|&i| &doc.services[i])
            .min_by_key(|s| s.line)
            .map(|s| s.depends_on_line.unwrap_or(s.line))
            .unwrap_or(1);

        violations.push(Violation::new(
            "CV-M001",
            first,
            1,
            format!(
                "Services {} form a circular depends_on chain.",
                members
                    .iter()
                    .map(|m| format!("\"{}\"", m))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        ));
    }
    violations
}

/// Tarjan's strongly connected components, iterative, in node order.
fn strongly_connected_components(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = adjacency.len();
    let mut index = vec![usize::MAX; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack = Vec::new();
    let mut next_index = 0;
    let mut components = Vec::new();

    // call stack of (node, next child position)
    let mut work: Vec<(usize, usize)> = Vec::new();

    for start in 0..n {
        if index[start] != usize::MAX {
            continue;
        }
        work.push((start, 0));
        while let Some(&mut (v, ref mut child)) = work.last_mut() {
            if *child == 0 {
                index[v] = next_index;
                lowlink[v] = next_index;
                next_index += 1;
                stack.push(v);
                on_stack[v] = true;
            }
            if let Some(&w) = adjacency[v].get(*child) {
                *child += 1;
                if index[w] == usize::MAX {
                    work.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index[w]);
                }
            } else {
                work.pop();
                if let Some(&(parent, _)) = work.last() {
                    lowlink[parent] = lowlink[parent].min(lowlink[v]);
                }
                if lowlink[v] == index[v] {
                    let mut component = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        component.push(w);
                        if w == v {
                            break;
                        }
                    }
                    component.sort_unstable();
                    components.push(component);
                }
            }
        }
    }

    components.sort_by_key(|c| c[0]);
    components
}

fn check_unknown_depends_on(doc: &ComposeDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for service in &doc.services {
        for dep in &service.depends_on {
            if dep.value != service.name && doc.service(&dep.value).is_none() {
                violations.push(Violation::new(
                    "CV-M002",
                    dep.line,
                    1,
                    format!(
                        "Service \"{}\" depends on undefined service \"{}\".",
                        service.name, dep.value
                    ),
                ));
            }
        }
    }
    violations
}

fn check_duplicate_exported_ports(doc: &ComposeDocument) -> Vec<Violation> {
    // exported binding -> (service, raw, line)
    let mut exported: HashMap<String, Vec<(&str, &str, u32)>> = HashMap::new();
    for service in &doc.services {
        for port in &service.ports {
            if let Some(key) = port.exported() {
                exported
                    .entry(key)
                    .or_default()
                    .push((&service.name, &port.raw, port.line));
            }
        }
    }

    let mut violations = Vec::new();
    for (binding, usages) in &exported {
        if usages.len() < 2 {
            continue;
        }
        for (service, _raw, line) in usages {
            let others: Vec<&str> = usages
                .iter()
                .filter(|(other, _, other_line)| !(other == service && other_line == line))
                .map(|(other, _, _)| *other)
                .collect();
            violations.push(Violation::new(
                "CV-M003",
                *line,
                1,
                format!(
                    "Host port \"{}\" of service \"{}\" is also exported by \"{}\".",
                    binding,
                    service,
                    others.join("\", \"")
                ),
            ));
        }
    }
    violations
}

fn check_undeclared_networks(doc: &ComposeDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for service in &doc.services {
        for net in &service.network_refs {
            if net.value != "default" && !doc.has_network(&net.value) {
                violations.push(Violation::new(
                    "CV-M004",
                    net.line,
                    1,
                    format!(
                        "Service \"{}\" references undeclared network \"{}\".",
                        service.name, net.value
                    ),
                ));
            }
        }
    }
    violations
}

fn check_undeclared_volumes(doc: &ComposeDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for service in &doc.services {
        for mount in &service.volumes {
            if !mount.is_named_volume() {
                continue;
            }
            let name = mount.source.as_deref().unwrap_or_default();
            if !doc.has_volume(name) {
                violations.push(Violation::new(
                    "CV-M005",
                    mount.line,
                    1,
                    format!(
                        "Service \"{}\" mounts undeclared volume \"{}\".",
                        service.name, name
                    ),
                ));
            }
        }
    }
    violations
}

fn check_duplicate_container_names(doc: &ComposeDocument) -> Vec<Violation> {
    let mut by_name: HashMap<&str, Vec<(&str, u32)>> = HashMap::new();
    for service in &doc.services {
        if let Some(cn) = &service.container_name {
            by_name
                .entry(cn.value.as_str())
                .or_default()
                .push((&service.name, cn.line));
        }
    }

    let mut violations = Vec::new();
    for (container_name, usages) in &by_name {
        if usages.len() < 2 {
            continue;
        }
        for (service, line) in usages {
            violations.push(Violation::new(
                "CV-M006",
                *line,
                1,
                format!(
                    "Container name \"{}\" of service \"{}\" is not unique.",
                    container_name, service
                ),
            ));
        }
    }
    violations
}

fn check_self_depends_on(doc: &ComposeDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for service in &doc.services {
        for dep in &service.depends_on {
            if dep.value == service.name {
                violations.push(Violation::new(
                    "CV-M007",
                    dep.line,
                    1,
                    format!("Service \"{}\" depends on itself.", service.name),
                ));
            }
        }
    }
    violations
}

fn check_unused_declared_resources(doc: &ComposeDocument) -> Vec<Violation> {
    let mut violations = Vec::new();

    for network in &doc.networks {
        if network.external {
            continue;
        }
        let used = doc
            .services
            .iter()
            .any(|s| s.network_refs.iter().any(|n| n.value == network.name));
        if !used {
            violations.push(Violation::new(
                "CV-M008",
                network.line,
                1,
                format!("Declared network \"{}\" is not used by any service.", network.name),
            ));
        }
    }

    for volume in &doc.volumes {
        if volume.external {
            continue;
        }
        let used = doc.services.iter().any(|s| {
            s.volumes
                .iter()
                .any(|m| m.is_named_volume() && m.source.as_deref() == Some(volume.name.as_str()))
        });
        if !used {
            violations.push(Violation::new(
                "CV-M008",
                volume.line,
                1,
                format!("Declared volume \"{}\" is not used by any service.", volume.name),
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
    fn test_two_service_cycle_reported_once() {
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
        let violations = check(yaml, check_circular_depends_on);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("\"a\""));
        assert!(violations[0].message.contains("\"b\""));
    }

    #[test]
    fn test_three_service_cycle() {
        let yaml = r#"services:
  a:
    image: a:1
    depends_on: [b]
  b:
    image: b:1
    depends_on: [c]
  c:
    image: c:1
    depends_on: [a]
"#;
        let violations = check(yaml, check_circular_depends_on);
        assert_eq!(violations.len(), 1);
        for name in ["\"a\"", "\"b\"", "\"c\""] {
            assert!(violations[0].message.contains(name));
        }
    }

    #[test]
    fn test_acyclic_chain_ok() {
        let yaml = r#"services:
  a:
    image: a:1
    depends_on: [b]
  b:
    image: b:1
    depends_on: [c]
  c:
    image: c:1
"#;
        assert!(check(yaml, check_circular_depends_on).is_empty());
    }

    #[test]
    fn test_self_loop_not_reported_as_cycle() {
        let yaml = "services:\n  a:\n    image: a:1\n    depends_on: [a]\n";
        assert!(check(yaml, check_circular_depends_on).is_empty());
        assert_eq!(check(yaml, check_self_depends_on).len(), 1);
    }

    #[test]
    fn test_unknown_depends_on() {
        let yaml = "services:\n  web:\n    image: w:1\n    depends_on:\n      - databse\n";
        let violations = check(yaml, check_unknown_depends_on);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].line, 5);
    }

    #[test]
    fn test_duplicate_host_ports_flag_both_services() {
        let yaml = r#"services:
  web:
    image: w:1
    ports:
      - "8080:80"
  api:
    image: a:1
    ports:
      - "8080:3000"
"#;
        let violations = check(yaml, check_duplicate_exported_ports);
        assert_eq!(violations.len(), 2);
    }

    #[test]
    fn test_same_port_different_interface_ok() {
        let yaml = r#"services:
  web:
    image: w:1
    ports:
      - "127.0.0.1:8080:80"
  api:
    image: a:1
    ports:
      - "192.168.0.2:8080:3000"
"#;
        assert!(check(yaml, check_duplicate_exported_ports).is_empty());
    }

    #[test]
    fn test_undeclared_network_and_default_allowed() {
        let yaml = r#"services:
  web:
    image: w:1
    networks:
      - default
      - frontend
"#;
        let violations = check(yaml, check_undeclared_networks);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("frontend"));
    }

    #[test]
    fn test_undeclared_named_volume_but_bind_mount_ok() {
        let yaml = r#"services:
  db:
    image: d:1
    volumes:
      - ./local:/data
      - pgdata:/var/lib/postgresql/data
"#;
        let violations = check(yaml, check_undeclared_volumes);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("pgdata"));
    }

    #[test]
    fn test_duplicate_container_names() {
        let yaml = r#"services:
  a:
    image: a:1
    container_name: app
  b:
    image: b:1
    container_name: app
"#;
        assert_eq!(check(yaml, check_duplicate_container_names).len(), 2);
    }

    #[test]
    fn test_unused_network_and_volume() {
        let yaml = r#"services:
  web:
    image: w:1
networks:
  ghost: {}
  ext:
    external: true
volumes:
  orphan: {}
"#;
        let violations = check(yaml, check_unused_declared_resources);
        assert_eq!(violations.len(), 2);
    }
}

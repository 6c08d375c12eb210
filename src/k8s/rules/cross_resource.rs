//! Cross-resource rules (KA-C), driven by the dependency graph.
//!
//! The graph builder already classifies every inter-resource reference as an
//! edge or a dangling ref; these rules translate graph findings into
//! violations with stable codes.

use std::collections::BTreeMap;

use crate::engine::Rule;
use crate::k8s::graph::{build_graph, DanglingRef, EdgeKind, ResourceGraph};
use crate::k8s::parser::K8sDocument;
use crate::types::{Category, FixExample, RuleMetadata, Severity, Violation};

pub fn rules() -> Vec<Rule<K8sDocument>> {
    vec![
        Rule::new(
            RuleMetadata {
                code: "KA-C001",
                title: "no-dangling-service-selector",
                severity: Severity::Warning,
                category: Category::CrossResource,
                explanation: "A Service whose selector matches no workload in the manifest \
                              routes traffic nowhere.",
                fix: FixExample {
                    description: "Match the selector to the pod labels",
                    before: "selector:\n  app: webb",
                    after: "selector:\n  app: web",
                },
            },
            check_service_selector,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-C002",
                title: "no-dangling-ingress-backend",
                severity: Severity::Error,
                category: Category::CrossResource,
                explanation: "An Ingress backend naming a Service that does not exist returns \
                              502 for every request.",
                fix: FixExample {
                    description: "Point the backend at an existing Service",
                    before: "backend:\n  service:\n    name: missing",
                    after: "backend:\n  service:\n    name: web",
                },
            },
            check_ingress_backends,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-C003",
                title: "no-missing-config-map",
                severity: Severity::Error,
                category: Category::CrossResource,
                explanation: "A pod referencing an absent ConfigMap stays stuck in \
                              CreateContainerConfigError.",
                fix: FixExample {
                    description: "Create the ConfigMap or fix the name",
                    before: "configMapKeyRef:\n  name: app-cfg",
                    after: "configMapKeyRef:\n  name: app-config",
                },
            },
            check_missing_config_maps,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-C004",
                title: "no-missing-secret",
                severity: Severity::Error,
                category: Category::CrossResource,
                explanation: "A pod referencing an absent Secret cannot start.",
                fix: FixExample {
                    description: "Create the Secret or fix the name",
                    before: "secretKeyRef:\n  name: db-creds",
                    after: "secretKeyRef:\n  name: db-credentials",
                },
            },
            check_missing_secrets,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-C005",
                title: "no-missing-volume-claim",
                severity: Severity::Error,
                category: Category::CrossResource,
                explanation: "A volume claiming an absent PersistentVolumeClaim keeps the pod \
                              Pending forever.",
                fix: FixExample {
                    description: "Declare the claim",
                    before: "persistentVolumeClaim:\n  claimName: data",
                    after: "apiVersion: v1\nkind: PersistentVolumeClaim\nmetadata:\n  name: data\n...",
                },
            },
            check_missing_claims,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-C006",
                title: "no-dangling-hpa-target",
                severity: Severity::Warning,
                category: Category::CrossResource,
                explanation: "An autoscaler whose scaleTargetRef matches nothing silently never \
                              scales anything.",
                fix: FixExample {
                    description: "Point the HPA at the workload",
                    before: "scaleTargetRef:\n  kind: Deployment\n  name: wrong",
                    after: "scaleTargetRef:\n  kind: Deployment\n  name: web",
                },
            },
            check_hpa_targets,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-C007",
                title: "no-duplicate-resources",
                severity: Severity::Error,
                category: Category::CrossResource,
                explanation: "Two resources with the same kind, namespace and name overwrite \
                              each other on apply; only the last one survives.",
                fix: FixExample {
                    description: "Rename or remove one of the resources",
                    before: "",
                    after: "",
                },
            },
            check_duplicates,
        ),
    ]
}

/// Dangling refs of one target kind, as (from-resource index, ref) pairs.
fn dangling_of<'a>(
    graph: &'a ResourceGraph,
    target_kind: &'a str,
) -> impl Iterator<Item = &'a DanglingRef> {
    graph
        .dangling
        .iter()
        .filter(move |d| d.target_kind == target_kind)
}

fn check_service_selector(doc: &K8sDocument) -> Vec<Violation> {
    let graph = build_graph(&doc.resources);
    doc.resources
        .iter()
        .enumerate()
        .filter(|(idx, r)| {
            r.kind.as_deref() == Some("Service")
                && !r.selector.is_empty()
                && !graph.edges_from(*idx).any(|e| e.kind == EdgeKind::Selects)
        })
        .map(|(_, r)| {
            Violation::new(
                "KA-C001",
                r.line,
                1,
                format!("{} selects no workload in this manifest.", r.display()),
            )
        })
        .collect()
}

fn check_ingress_backends(doc: &K8sDocument) -> Vec<Violation> {
    let graph = build_graph(&doc.resources);
    dangling_of(&graph, "Service")
        .map(|d| {
            Violation::new(
                "KA-C002",
                d.line,
                1,
                format!(
                    "{} routes to unknown Service \"{}\".",
                    doc.resources[d.from].display(),
                    d.target_name
                ),
            )
        })
        .collect()
}

fn check_missing_config_maps(doc: &K8sDocument) -> Vec<Violation> {
    let graph = build_graph(&doc.resources);
    dangling_of(&graph, "ConfigMap")
        .map(|d| {
            Violation::new(
                "KA-C003",
                d.line,
                1,
                format!(
                    "{} references unknown ConfigMap \"{}\".",
                    doc.resources[d.from].display(),
                    d.target_name
                ),
            )
        })
        .collect()
}

fn check_missing_secrets(doc: &K8sDocument) -> Vec<Violation> {
    let graph = build_graph(&doc.resources);
    dangling_of(&graph, "Secret")
        .map(|d| {
            Violation::new(
                "KA-C004",
                d.line,
                1,
                format!(
                    "{} references unknown Secret \"{}\".",
                    doc.resources[d.from].display(),
                    d.target_name
                ),
            )
        })
        .collect()
}

fn check_missing_claims(doc: &K8sDocument) -> Vec<Violation> {
    let graph = build_graph(&doc.resources);
    dangling_of(&graph, "PersistentVolumeClaim")
        .map(|d| {
            Violation::new(
                "KA-C005",
                d.line,
                1,
                format!(
                    "{} claims unknown PersistentVolumeClaim \"{}\".",
                    doc.resources[d.from].display(),
                    d.target_name
                ),
            )
        })
        .collect()
}

fn check_hpa_targets(doc: &K8sDocument) -> Vec<Violation> {
    let graph = build_graph(&doc.resources);
    graph
        .dangling
        .iter()
        .filter(|d| {
            doc.resources[d.from].kind.as_deref() == Some("HorizontalPodAutoscaler")
        })
        .map(|d| {
            Violation::new(
                "KA-C006",
                d.line,
                1,
                format!(
                    "{} targets unknown {} \"{}\".",
                    doc.resources[d.from].display(),
                    d.target_kind,
                    d.target_name
                ),
            )
        })
        .collect()
}

fn check_duplicates(doc: &K8sDocument) -> Vec<Violation> {
    let mut seen: BTreeMap<(String, String, String), u32> = BTreeMap::new();
    let mut violations = Vec::new();

    for resource in &doc.resources {
        let key = (
            resource.kind.clone().unwrap_or_default(),
            resource.namespace.clone().unwrap_or_else(|| "default".into()),
            resource.name.clone().unwrap_or_default(),
        );
        if key.0.is_empty() || key.2.is_empty() {
            continue;
        }
        match seen.get(&key) {
            Some(first_line) => violations.push(Violation::new(
                "KA-C007",
                resource.line,
                1,
                format!(
                    "{} is declared more than once (first at line {}).",
                    resource.display(),
                    first_line
                ),
            )),
            None => {
                seen.insert(key, resource.line);
            }
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::parser::parse_k8s;

    fn check(yaml: &str, check_fn: fn(&K8sDocument) -> Vec<Violation>) -> Vec<Violation> {
        check_fn(&parse_k8s(yaml).unwrap())
    }

    const DEPLOY_AND_SERVICE: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  selector:
    matchLabels:
      app: web
  template:
    metadata:
      labels:
        app: web
    spec:
      containers:
        - name: web
          image: nginx:1.25
---
apiVersion: v1
kind: Service
metadata:
  name: web
spec:
  selector:
    app: web
  ports:
    - port: 80
"#;

    #[test]
    fn test_matching_selector_is_clean() {
        assert!(check(DEPLOY_AND_SERVICE, check_service_selector).is_empty());
    }

    #[test]
    fn test_mismatched_selector_flagged() {
        let yaml = DEPLOY_AND_SERVICE.replace("  selector:\n    app: web", "  selector:\n    app: webb");
        let violations = check(&yaml, check_service_selector);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("Service/web"));
    }

    #[test]
    fn test_unknown_ingress_backend() {
        let yaml = format!(
            "{}---\napiVersion: networking.k8s.io/v1\nkind: Ingress\nmetadata:\n  name: edge\nspec:\n  rules:\n    - http:\n        paths:\n          - path: /\n            pathType: Prefix\n            backend:\n              service:\n                name: api\n                port:\n                  number: 80\n",
            DEPLOY_AND_SERVICE
        );
        let violations = check(&yaml, check_ingress_backends);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("\"api\""));
    }

    #[test]
    fn test_missing_config_map_and_secret() {
        let yaml = r#"apiVersion: v1
kind: Pod
metadata:
  name: app
spec:
  containers:
    - name: app
      image: app:1
      env:
        - name: URL
          valueFrom:
            configMapKeyRef:
              name: missing-cm
              key: url
        - name: TOKEN
          valueFrom:
            secretKeyRef:
              name: missing-secret
              key: token
"#;
        assert_eq!(check(yaml, check_missing_config_maps).len(), 1);
        assert_eq!(check(yaml, check_missing_secrets).len(), 1);
    }

    #[test]
    fn test_present_references_are_clean() {
        let yaml = r#"apiVersion: v1
kind: Pod
metadata:
  name: app
spec:
  containers:
    - name: app
      image: app:1
      envFrom:
        - configMapRef:
            name: app-config
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: app-config
data: {}
"#;
        assert!(check(yaml, check_missing_config_maps).is_empty());
    }

    #[test]
    fn test_hpa_target() {
        let hpa = "apiVersion: autoscaling/v2\nkind: HorizontalPodAutoscaler\nmetadata:\n  name: web-hpa\nspec:\n  scaleTargetRef:\n    kind: Deployment\n    name: api\n";
        let yaml = format!("{}---\n{}", DEPLOY_AND_SERVICE, hpa);
        let violations = check(&yaml, check_hpa_targets);
        assert_eq!(violations.len(), 1);

        let ok = format!("{}---\n{}", DEPLOY_AND_SERVICE, hpa.replace("name: api", "name: web"));
        assert!(check(&ok, check_hpa_targets).is_empty());
    }

    #[test]
    fn test_duplicate_resources() {
        let yaml = format!("{}---\napiVersion: v1\nkind: Service\nmetadata:\n  name: web\nspec:\n  selector:\n    app: web\n", DEPLOY_AND_SERVICE);
        let violations = check(&yaml, check_duplicates);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("Service/web"));
    }

    #[test]
    fn test_namespace_separates_duplicates() {
        let yaml = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cfg\n  namespace: a\ndata: {}\n---\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cfg\n  namespace: b\ndata: {}\n";
        assert!(check(yaml, check_duplicates).is_empty());
    }
}

//! Reliability rules (KA-R).

use crate::engine::Rule;
use crate::k8s::parser::{K8sDocument, Resource};
use crate::types::{Category, FixExample, RuleMetadata, Severity, Violation};

pub fn rules() -> Vec<Rule<K8sDocument>> {
    vec![
        Rule::new(
            RuleMetadata {
                code: "KA-R001",
                title: "require-liveness-probe",
                severity: Severity::Warning,
                category: Category::Reliability,
                explanation: "Without a liveness probe a deadlocked container keeps running \
                              forever; the kubelet has no signal to restart it.",
                fix: FixExample {
                    description: "Add a liveness probe",
                    before: "containers:\n  - name: app\n    image: app:1.0",
                    after: "containers:\n  - name: app\n    image: app:1.0\n    livenessProbe:\n      httpGet:\n        path: /healthz\n        port: 8080",
                },
            },
            check_liveness_probe,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-R002",
                title: "require-readiness-probe",
                severity: Severity::Warning,
                category: Category::Reliability,
                explanation: "Without a readiness probe traffic reaches the pod before it can \
                              serve, causing errors on every rollout.",
                fix: FixExample {
                    description: "Add a readiness probe",
                    before: "containers:\n  - name: app\n    image: app:1.0",
                    after: "containers:\n  - name: app\n    image: app:1.0\n    readinessProbe:\n      httpGet:\n        path: /ready\n        port: 8080",
                },
            },
            check_readiness_probe,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-R003",
                title: "require-multiple-replicas",
                severity: Severity::Warning,
                category: Category::Reliability,
                explanation: "A single replica means every node drain or crash is an outage.",
                fix: FixExample {
                    description: "Run at least two replicas",
                    before: "spec:\n  replicas: 1",
                    after: "spec:\n  replicas: 2",
                },
            },
            check_replica_count,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-R004",
                title: "require-resource-requests",
                severity: Severity::Warning,
                category: Category::Reliability,
                explanation: "Without requests the scheduler places pods blind, and the pod is \
                              first in line for eviction.",
                fix: FixExample {
                    description: "Declare requests",
                    before: "resources: {}",
                    after: "resources:\n  requests:\n    cpu: 100m\n    memory: 128Mi",
                },
            },
            check_resource_requests,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-R005",
                title: "require-resource-limits",
                severity: Severity::Warning,
                category: Category::Reliability,
                explanation: "Without limits one leaking container can take down every other \
                              pod on the node.",
                fix: FixExample {
                    description: "Declare limits",
                    before: "resources: {}",
                    after: "resources:\n  limits:\n    memory: 256Mi",
                },
            },
            check_resource_limits,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-R006",
                title: "no-recreate-strategy",
                severity: Severity::Warning,
                category: Category::Reliability,
                explanation: "The Recreate strategy stops every replica before starting new \
                              ones; rollouts become scheduled downtime.",
                fix: FixExample {
                    description: "Use rolling updates",
                    before: "strategy:\n  type: Recreate",
                    after: "strategy:\n  type: RollingUpdate",
                },
            },
            check_recreate_strategy,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-R007",
                title: "require-pod-anti-affinity",
                severity: Severity::Info,
                category: Category::Reliability,
                explanation: "Replicas without anti-affinity may all land on one node, which \
                              defeats running more than one.",
                fix: FixExample {
                    description: "Spread replicas across nodes",
                    before: "spec:\n  replicas: 3",
                    after: "spec:\n  replicas: 3\n  template:\n    spec:\n      affinity:\n        podAntiAffinity:\n          preferredDuringSchedulingIgnoredDuringExecution: ...",
                },
            },
            check_anti_affinity,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-R008",
                title: "require-pod-disruption-budget",
                severity: Severity::Info,
                category: Category::Reliability,
                explanation: "Without a PodDisruptionBudget a node drain may evict every \
                              replica at once.",
                fix: FixExample {
                    description: "Add a PDB covering the workload",
                    before: "",
                    after: "apiVersion: policy/v1\nkind: PodDisruptionBudget\nmetadata:\n  name: app-pdb\nspec:\n  minAvailable: 1\n  selector:\n    matchLabels:\n      app: app",
                },
            },
            check_pod_disruption_budget,
        ),
    ]
}

/// Kinds where probe and replica checks apply.
fn is_serving_workload(resource: &Resource) -> bool {
    matches!(
        resource.kind.as_deref(),
        Some("Deployment") | Some("StatefulSet") | Some("DaemonSet") | Some("ReplicaSet")
    )
}

fn is_replicated(resource: &Resource) -> bool {
    matches!(resource.kind.as_deref(), Some("Deployment") | Some("StatefulSet"))
}

fn check_liveness_probe(doc: &K8sDocument) -> Vec<Violation> {
    probe_check(doc, "KA-R001", "liveness", |c| c.has_liveness_probe)
}

fn check_readiness_probe(doc: &K8sDocument) -> Vec<Violation> {
    probe_check(doc, "KA-R002", "readiness", |c| c.has_readiness_probe)
}

fn probe_check(
    doc: &K8sDocument,
    code: &'static str,
    probe: &str,
    has: fn(&crate::k8s::parser::ContainerDef) -> bool,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    for resource in doc.resources.iter().filter(|r| is_serving_workload(r)) {
        for container in resource.containers.iter().filter(|c| !has(c)) {
            violations.push(Violation::new(
                code,
                container.line,
                1,
                format!(
                    "Container \"{}\" of {} has no {} probe.",
                    container.name,
                    resource.display(),
                    probe
                ),
            ));
        }
    }
    violations
}

fn check_replica_count(doc: &K8sDocument) -> Vec<Violation> {
    doc.resources
        .iter()
        .filter(|r| is_replicated(r) && r.replicas.unwrap_or(1) < 2)
        .map(|r| {
            Violation::new(
                "KA-R003",
                r.line,
                1,
                format!(
                    "{} runs {} replica(s).",
                    r.display(),
                    r.replicas.unwrap_or(1)
                ),
            )
        })
        .collect()
}

fn check_resource_requests(doc: &K8sDocument) -> Vec<Violation> {
    resources_check(doc, "KA-R004", "requests", |c| c.has_resource_requests)
}

fn check_resource_limits(doc: &K8sDocument) -> Vec<Violation> {
    resources_check(doc, "KA-R005", "limits", |c| c.has_resource_limits)
}

fn resources_check(
    doc: &K8sDocument,
    code: &'static str,
    what: &str,
    has: fn(&crate::k8s::parser::ContainerDef) -> bool,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    for resource in doc.resources.iter().filter(|r| r.is_workload()) {
        for container in resource.containers.iter().filter(|c| !has(c)) {
            violations.push(Violation::new(
                code,
                container.line,
                1,
                format!(
                    "Container \"{}\" of {} declares no resource {}.",
                    container.name,
                    resource.display(),
                    what
                ),
            ));
        }
    }
    violations
}

fn check_recreate_strategy(doc: &K8sDocument) -> Vec<Violation> {
    doc.resources
        .iter()
        .filter(|r| r.kind.as_deref() == Some("Deployment") && r.strategy.as_deref() == Some("Recreate"))
        .map(|r| {
            Violation::new(
                "KA-R006",
                r.line,
                1,
                format!("{} uses the Recreate deployment strategy.", r.display()),
            )
        })
        .collect()
}

fn check_anti_affinity(doc: &K8sDocument) -> Vec<Violation> {
    doc.resources
        .iter()
        .filter(|r| is_replicated(r) && r.replicas.unwrap_or(1) >= 2 && !r.has_pod_anti_affinity)
        .map(|r| {
            Violation::new(
                "KA-R007",
                r.line,
                1,
                format!("{} has multiple replicas but no pod anti-affinity.", r.display()),
            )
        })
        .collect()
}

fn check_pod_disruption_budget(doc: &K8sDocument) -> Vec<Violation> {
    let pdbs: Vec<&Resource> = doc
        .resources
        .iter()
        .filter(|r| r.kind.as_deref() == Some("PodDisruptionBudget"))
        .collect();

    doc.resources
        .iter()
        .filter(|r| is_replicated(r) && r.replicas.unwrap_or(1) >= 2)
        .filter(|r| {
            !pdbs.iter().any(|pdb| {
                !pdb.selector.is_empty()
                    && pdb.selector.iter().all(|(k, v)| r.template_labels.get(k) == Some(v))
            })
        })
        .map(|r| {
            Violation::new(
                "KA-R008",
                r.line,
                1,
                format!("{} has no covering PodDisruptionBudget.", r.display()),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::parser::parse_k8s;

    fn check(yaml: &str, check_fn: fn(&K8sDocument) -> Vec<Violation>) -> Vec<Violation> {
        check_fn(&parse_k8s(yaml).unwrap())
    }

    const BARE_DEPLOYMENT: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  replicas: 1
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
"#;

    #[test]
    fn test_bare_deployment_missing_everything() {
        assert_eq!(check(BARE_DEPLOYMENT, check_liveness_probe).len(), 1);
        assert_eq!(check(BARE_DEPLOYMENT, check_readiness_probe).len(), 1);
        assert_eq!(check(BARE_DEPLOYMENT, check_replica_count).len(), 1);
        assert_eq!(check(BARE_DEPLOYMENT, check_resource_requests).len(), 1);
        assert_eq!(check(BARE_DEPLOYMENT, check_resource_limits).len(), 1);
    }

    #[test]
    fn test_probe_rules_skip_jobs() {
        let yaml = r#"apiVersion: batch/v1
kind: Job
metadata:
  name: migrate
spec:
  template:
    spec:
      containers:
        - name: migrate
          image: migrate:1
"#;
        assert!(check(yaml, check_liveness_probe).is_empty());
        assert!(check(yaml, check_readiness_probe).is_empty());
        // Resource checks still apply to Jobs.
        assert_eq!(check(yaml, check_resource_limits).len(), 1);
    }

    #[test]
    fn test_default_replicas_counts_as_one() {
        let yaml = BARE_DEPLOYMENT.replace("  replicas: 1\n", "");
        let violations = check(&yaml, check_replica_count);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("1 replica"));
    }

    #[test]
    fn test_recreate_strategy_flagged() {
        let yaml = BARE_DEPLOYMENT.replace(
            "spec:\n  replicas: 1\n",
            "spec:\n  replicas: 1\n  strategy:\n    type: Recreate\n",
        );
        assert_eq!(check(&yaml, check_recreate_strategy).len(), 1);
    }

    #[test]
    fn test_anti_affinity_only_for_multi_replica() {
        assert!(check(BARE_DEPLOYMENT, check_anti_affinity).is_empty());
        let multi = BARE_DEPLOYMENT.replace("replicas: 1", "replicas: 3");
        assert_eq!(check(&multi, check_anti_affinity).len(), 1);
    }

    #[test]
    fn test_pdb_coverage() {
        let multi = BARE_DEPLOYMENT.replace("replicas: 1", "replicas: 3");
        assert_eq!(check(&multi, check_pod_disruption_budget).len(), 1);

        let with_pdb = format!(
            "{}---\napiVersion: policy/v1\nkind: PodDisruptionBudget\nmetadata:\n  name: web-pdb\nspec:\n  minAvailable: 1\n  selector:\n    matchLabels:\n      app: web\n",
            multi
        );
        assert!(check(&with_pdb, check_pod_disruption_budget).is_empty());
    }
}

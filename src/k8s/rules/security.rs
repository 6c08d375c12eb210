//! Security rules (KA-S).

use crate::engine::Rule;
use crate::k8s::parser::{K8sDocument, VolumeSource};
use crate::types::{Category, FixExample, RuleMetadata, Severity, Violation};

/// Capabilities that grant near-host-level control.
const DANGEROUS_CAPABILITIES: &[&str] =
    &["ALL", "SYS_ADMIN", "NET_ADMIN", "SYS_PTRACE", "SYS_MODULE"];

/// Env var name fragments that suggest a credential.
const SECRET_NAME_MARKERS: &[&str] = &["PASSWORD", "SECRET", "TOKEN", "API_KEY", "PRIVATE_KEY"];

pub fn rules() -> Vec<Rule<K8sDocument>> {
    vec![
        Rule::new(
            RuleMetadata {
                code: "KA-S001",
                title: "no-privileged-containers",
                severity: Severity::Error,
                category: Category::Security,
                explanation: "A privileged container has full access to the node; a compromise \
                              of the container is a compromise of the host.",
                fix: FixExample {
                    description: "Drop privileged mode",
                    before: "securityContext:\n  privileged: true",
                    after: "securityContext:\n  privileged: false",
                },
            },
            check_privileged,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-S002",
                title: "no-privilege-escalation",
                severity: Severity::Warning,
                category: Category::Security,
                explanation: "allowPrivilegeEscalation lets a process gain more privileges than \
                              its parent, defeating runAsNonRoot.",
                fix: FixExample {
                    description: "Disallow escalation",
                    before: "securityContext:\n  allowPrivilegeEscalation: true",
                    after: "securityContext:\n  allowPrivilegeEscalation: false",
                },
            },
            check_privilege_escalation,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-S003",
                title: "require-run-as-non-root",
                severity: Severity::Warning,
                category: Category::Security,
                explanation: "Containers default to running as root; runAsNonRoot makes the \
                              kubelet reject a root image at admission.",
                fix: FixExample {
                    description: "Require a non-root user",
                    before: "containers:\n  - name: app\n    image: app:1.0",
                    after: "containers:\n  - name: app\n    image: app:1.0\n    securityContext:\n      runAsNonRoot: true",
                },
            },
            check_run_as_non_root,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-S004",
                title: "require-read-only-root-filesystem",
                severity: Severity::Info,
                category: Category::Security,
                explanation: "A writable root filesystem lets an attacker persist tooling \
                              inside the container.",
                fix: FixExample {
                    description: "Mount the root filesystem read-only",
                    before: "securityContext: {}",
                    after: "securityContext:\n  readOnlyRootFilesystem: true",
                },
            },
            check_read_only_root_fs,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-S005",
                title: "no-host-network",
                severity: Severity::Error,
                category: Category::Security,
                explanation: "hostNetwork exposes the node's interfaces to the pod and bypasses \
                              network policy.",
                fix: FixExample {
                    description: "Remove hostNetwork",
                    before: "spec:\n  hostNetwork: true",
                    after: "spec: {}",
                },
            },
            check_host_network,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-S006",
                title: "no-host-pid-ipc",
                severity: Severity::Error,
                category: Category::Security,
                explanation: "Sharing the host PID or IPC namespace lets the pod inspect and \
                              signal every process on the node.",
                fix: FixExample {
                    description: "Remove hostPID and hostIPC",
                    before: "spec:\n  hostPID: true",
                    after: "spec: {}",
                },
            },
            check_host_pid_ipc,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-S007",
                title: "no-host-path-volumes",
                severity: Severity::Warning,
                category: Category::Security,
                explanation: "hostPath mounts pierce the container boundary; a path like \
                              /var/run/docker.sock grants control of the node's runtime.",
                fix: FixExample {
                    description: "Use a PersistentVolumeClaim instead",
                    before: "volumes:\n  - name: data\n    hostPath:\n      path: /data",
                    after: "volumes:\n  - name: data\n    persistentVolumeClaim:\n      claimName: data",
                },
            },
            check_host_path_volumes,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-S008",
                title: "no-dangerous-capabilities",
                severity: Severity::Error,
                category: Category::Security,
                explanation: "Capabilities like SYS_ADMIN and NET_ADMIN are root-equivalent on \
                              most kernels.",
                fix: FixExample {
                    description: "Drop the capability",
                    before: "capabilities:\n  add:\n    - SYS_ADMIN",
                    after: "capabilities:\n  drop:\n    - ALL",
                },
            },
            check_dangerous_capabilities,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-S009",
                title: "no-plaintext-secrets-in-env",
                severity: Severity::Error,
                category: Category::Security,
                explanation: "Credential-looking env vars with literal values end up in the \
                              manifest, version control, and `kubectl describe` output.",
                fix: FixExample {
                    description: "Reference a Secret instead",
                    before: "env:\n  - name: DB_PASSWORD\n    value: hunter2",
                    after: "env:\n  - name: DB_PASSWORD\n    valueFrom:\n      secretKeyRef:\n        name: db-credentials\n        key: password",
                },
            },
            check_plaintext_secrets,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-S010",
                title: "no-automounted-service-account-token",
                severity: Severity::Info,
                category: Category::Security,
                explanation: "Pods that never call the API server should not carry API \
                              credentials; the token is mounted by default.",
                fix: FixExample {
                    description: "Opt out of the token mount",
                    before: "spec:\n  containers: ...",
                    after: "spec:\n  automountServiceAccountToken: false\n  containers: ...",
                },
            },
            check_automount_token,
        ),
    ]
}

fn check_privileged(doc: &K8sDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for resource in &doc.resources {
        for container in &resource.containers {
            if container.privileged == Some(true) {
                violations.push(Violation::new(
                    "KA-S001",
                    container.line,
                    1,
                    format!(
                        "Container \"{}\" of {} runs privileged.",
                        container.name,
                        resource.display()
                    ),
                ));
            }
        }
    }
    violations
}

fn check_privilege_escalation(doc: &K8sDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for resource in &doc.resources {
        for container in &resource.containers {
            if container.allow_privilege_escalation == Some(true) {
                violations.push(Violation::new(
                    "KA-S002",
                    container.line,
                    1,
                    format!(
                        "Container \"{}\" of {} allows privilege escalation.",
                        container.name,
                        resource.display()
                    ),
                ));
            }
        }
    }
    violations
}

fn check_run_as_non_root(doc: &K8sDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for resource in &doc.resources {
        for container in &resource.containers {
            if resource.effective_run_as_non_root(container) != Some(true) {
                violations.push(Violation::new(
                    "KA-S003",
                    container.line,
                    1,
                    format!(
                        "Container \"{}\" of {} does not require a non-root user.",
                        container.name,
                        resource.display()
                    ),
                ));
            }
        }
    }
    violations
}

fn check_read_only_root_fs(doc: &K8sDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for resource in &doc.resources {
        for container in &resource.containers {
            if container.read_only_root_filesystem != Some(true) {
                violations.push(Violation::new(
                    "KA-S004",
                    container.line,
                    1,
                    format!(
                        "Container \"{}\" of {} has a writable root filesystem.",
                        container.name,
                        resource.display()
                    ),
                ));
            }
        }
    }
    violations
}

fn check_host_network(doc: &K8sDocument) -> Vec<Violation> {
    doc.resources
        .iter()
        .filter(|r| r.host_network)
        .map(|r| {
            Violation::new(
                "KA-S005",
                r.line,
                1,
                format!("{} uses the host network namespace.", r.display()),
            )
        })
        .collect()
}

fn check_host_pid_ipc(doc: &K8sDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for resource in &doc.resources {
        if resource.host_pid {
            violations.push(Violation::new(
                "KA-S006",
                resource.line,
                1,
                format!("{} shares the host PID namespace.", resource.display()),
            ));
        }
        if resource.host_ipc {
            violations.push(Violation::new(
                "KA-S006",
                resource.line,
                1,
                format!("{} shares the host IPC namespace.", resource.display()),
            ));
        }
    }
    violations
}

fn check_host_path_volumes(doc: &K8sDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for resource in &doc.resources {
        for volume in &resource.volumes {
            if let VolumeSource::HostPath(path) = &volume.source {
                violations.push(Violation::new(
                    "KA-S007",
                    volume.line,
                    1,
                    format!(
                        "Volume \"{}\" of {} mounts host path \"{}\".",
                        volume.name,
                        resource.display(),
                        path
                    ),
                ));
            }
        }
    }
    violations
}

fn check_dangerous_capabilities(doc: &K8sDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for resource in &doc.resources {
        for container in &resource.containers {
            for cap in &container.added_capabilities {
                if DANGEROUS_CAPABILITIES.contains(&cap.as_str()) {
                    violations.push(Violation::new(
                        "KA-S008",
                        container.line,
                        1,
                        format!(
                            "Container \"{}\" of {} adds dangerous capability \"{}\".",
                            container.name,
                            resource.display(),
                            cap
                        ),
                    ));
                }
            }
        }
    }
    violations
}

fn check_plaintext_secrets(doc: &K8sDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for resource in &doc.resources {
        for container in &resource.containers {
            for env in &container.env {
                let upper = env.name.to_uppercase();
                let looks_secret = SECRET_NAME_MARKERS.iter().any(|m| upper.contains(m));
                let has_literal = env.value.as_ref().map(|v| !v.is_empty()).unwrap_or(false);
                if looks_secret && has_literal {
                    violations.push(Violation::new(
                        "KA-S009",
                        env.line,
                        1,
                        format!(
                            "Env var \"{}\" of container \"{}\" in {} holds a literal credential.",
                            env.name,
                            container.name,
                            resource.display()
                        ),
                    ));
                }
            }
        }
    }
    violations
}

fn check_automount_token(doc: &K8sDocument) -> Vec<Violation> {
    doc.resources
        .iter()
        .filter(|r| r.has_pod_spec() && r.automount_service_account_token != Some(false))
        .map(|r| {
            Violation::new(
                "KA-S010",
                r.line,
                1,
                format!(
                    "{} mounts the service account token by default.",
                    r.display()
                ),
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

    const RISKY_POD: &str = r#"apiVersion: v1
kind: Pod
metadata:
  name: risky
spec:
  hostNetwork: true
  hostPID: true
  hostIPC: true
  containers:
    - name: app
      image: app:1
      securityContext:
        privileged: true
        allowPrivilegeEscalation: true
        capabilities:
          add:
            - SYS_ADMIN
            - CHOWN
      env:
        - name: DB_PASSWORD
          value: hunter2
  volumes:
    - name: docker
      hostPath:
        path: /var/run/docker.sock
"#;

    #[test]
    fn test_risky_pod_trips_every_flag() {
        assert_eq!(check(RISKY_POD, check_privileged).len(), 1);
        assert_eq!(check(RISKY_POD, check_privilege_escalation).len(), 1);
        assert_eq!(check(RISKY_POD, check_host_network).len(), 1);
        assert_eq!(check(RISKY_POD, check_host_pid_ipc).len(), 2);
        assert_eq!(check(RISKY_POD, check_host_path_volumes).len(), 1);
        assert_eq!(check(RISKY_POD, check_plaintext_secrets).len(), 1);

        // CHOWN is benign; only SYS_ADMIN is flagged.
        let caps = check(RISKY_POD, check_dangerous_capabilities);
        assert_eq!(caps.len(), 1);
        assert!(caps[0].message.contains("SYS_ADMIN"));
    }

    #[test]
    fn test_hardened_pod_is_clean() {
        let yaml = r#"apiVersion: v1
kind: Pod
metadata:
  name: safe
spec:
  automountServiceAccountToken: false
  containers:
    - name: app
      image: app:1
      securityContext:
        runAsNonRoot: true
        readOnlyRootFilesystem: true
        allowPrivilegeEscalation: false
      env:
        - name: DB_PASSWORD
          valueFrom:
            secretKeyRef:
              name: db-credentials
              key: password
"#;
        for check_fn in [
            check_privileged,
            check_privilege_escalation,
            check_run_as_non_root,
            check_read_only_root_fs,
            check_host_network,
            check_host_pid_ipc,
            check_host_path_volumes,
            check_dangerous_capabilities,
            check_plaintext_secrets,
            check_automount_token,
        ] {
            assert!(check(yaml, check_fn).is_empty());
        }
    }

    #[test]
    fn test_pod_level_run_as_non_root_inherited() {
        let yaml = r#"apiVersion: v1
kind: Pod
metadata:
  name: app
spec:
  securityContext:
    runAsNonRoot: true
  containers:
    - name: app
      image: app:1
"#;
        assert!(check(yaml, check_run_as_non_root).is_empty());
    }

    #[test]
    fn test_automount_default_flagged() {
        let yaml = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: a\nspec:\n  containers:\n    - name: app\n      image: app:1\n";
        assert_eq!(check(yaml, check_automount_token).len(), 1);
    }

    #[test]
    fn test_interpolated_secret_value_still_literal() {
        // Any inline value counts; only valueFrom references are safe.
        let yaml = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: a\nspec:\n  containers:\n    - name: app\n      image: app:1\n      env:\n        - name: API_TOKEN\n          value: abc123\n";
        assert_eq!(check(yaml, check_plaintext_secrets).len(), 1);
    }
}

//! Best-practice rules (KA-B).

use crate::engine::Rule;
use crate::k8s::parser::K8sDocument;
use crate::types::{Category, FixExample, RuleMetadata, Severity, Violation};

/// apiVersions removed from current clusters and their replacements.
const DEPRECATED_API_VERSIONS: &[(&str, &str)] = &[
    ("extensions/v1beta1", "apps/v1 or networking.k8s.io/v1"),
    ("apps/v1beta1", "apps/v1"),
    ("apps/v1beta2", "apps/v1"),
    ("networking.k8s.io/v1beta1", "networking.k8s.io/v1"),
    ("policy/v1beta1", "policy/v1"),
    ("autoscaling/v2beta1", "autoscaling/v2"),
    ("autoscaling/v2beta2", "autoscaling/v2"),
    ("batch/v1beta1", "batch/v1"),
];

pub fn rules() -> Vec<Rule<K8sDocument>> {
    vec![
        Rule::new(
            RuleMetadata {
                code: "KA-B001",
                title: "no-latest-tag",
                severity: Severity::Warning,
                category: Category::BestPractice,
                explanation: ":latest changes on every node pull; two replicas can run \
                              different code under the same manifest.",
                fix: FixExample {
                    description: "Pin a versioned tag",
                    before: "image: nginx:latest",
                    after: "image: nginx:1.25",
                },
            },
            check_latest_tag,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-B002",
                title: "require-image-tag",
                severity: Severity::Warning,
                category: Category::BestPractice,
                explanation: "An untagged image silently resolves to :latest.",
                fix: FixExample {
                    description: "Pin an explicit tag",
                    before: "image: nginx",
                    after: "image: nginx:1.25",
                },
            },
            check_missing_tag,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-B003",
                title: "require-recommended-labels",
                severity: Severity::Info,
                category: Category::BestPractice,
                explanation: "The app.kubernetes.io/name label is the hook tooling uses to \
                              group resources belonging to one application.",
                fix: FixExample {
                    description: "Add the recommended label",
                    before: "metadata:\n  name: web",
                    after: "metadata:\n  name: web\n  labels:\n    app.kubernetes.io/name: web",
                },
            },
            check_recommended_labels,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-B004",
                title: "no-default-namespace",
                severity: Severity::Info,
                category: Category::BestPractice,
                explanation: "Resources without an explicit namespace pile up in default, where \
                              access control and quotas are hardest to reason about.",
                fix: FixExample {
                    description: "Set a namespace",
                    before: "metadata:\n  name: web",
                    after: "metadata:\n  name: web\n  namespace: prod",
                },
            },
            check_default_namespace,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-B005",
                title: "no-always-pull-pinned-image",
                severity: Severity::Info,
                category: Category::BestPractice,
                explanation: "Pulling a pinned tag on every start adds registry load and a \
                              startup dependency for no change in the image.",
                fix: FixExample {
                    description: "Let the kubelet cache the image",
                    before: "image: app:1.2.3\nimagePullPolicy: Always",
                    after: "image: app:1.2.3\nimagePullPolicy: IfNotPresent",
                },
            },
            check_always_pull_pinned,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-B006",
                title: "no-deprecated-api-versions",
                severity: Severity::Warning,
                category: Category::BestPractice,
                explanation: "Removed apiVersions are rejected outright by current clusters.",
                fix: FixExample {
                    description: "Use the current apiVersion",
                    before: "apiVersion: extensions/v1beta1",
                    after: "apiVersion: apps/v1",
                },
            },
            check_deprecated_api_versions,
        ),
        Rule::new(
            RuleMetadata {
                code: "KA-B007",
                title: "require-service-account",
                severity: Severity::Info,
                category: Category::BestPractice,
                explanation: "Workloads without an explicit serviceAccountName share the \
                              namespace default account and its permissions.",
                fix: FixExample {
                    description: "Give the workload its own account",
                    before: "spec:\n  containers: ...",
                    after: "spec:\n  serviceAccountName: web\n  containers: ...",
                },
            },
            check_service_account,
        ),
    ]
}

fn image_tag(image: &str) -> Option<&str> {
    let after_slash = image.rsplit('/').next().unwrap_or(image);
    if let Some((_, digest)) = after_slash.split_once('@') {
        return Some(digest);
    }
    after_slash.split_once(':').map(|(_, tag)| tag)
}

fn check_latest_tag(doc: &K8sDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for resource in &doc.resources {
        for container in &resource.containers {
            if let Some(image) = &container.image {
                if image_tag(&image.value) == Some("latest") {
                    violations.push(Violation::new(
                        "KA-B001",
                        image.line,
                        1,
                        format!(
                            "Container \"{}\" of {} pins the mutable :latest tag.",
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

fn check_missing_tag(doc: &K8sDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for resource in &doc.resources {
        for container in &resource.containers {
            if let Some(image) = &container.image {
                if image_tag(&image.value).is_none() {
                    violations.push(Violation::new(
                        "KA-B002",
                        image.line,
                        1,
                        format!(
                            "Image \"{}\" of container \"{}\" in {} has no tag.",
                            image.value,
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

fn check_recommended_labels(doc: &K8sDocument) -> Vec<Violation> {
    doc.resources
        .iter()
        .filter(|r| r.is_workload() && !r.labels.contains_key("app.kubernetes.io/name"))
        .map(|r| {
            Violation::new(
                "KA-B003",
                r.line,
                1,
                format!("{} lacks the app.kubernetes.io/name label.", r.display()),
            )
        })
        .collect()
}

fn check_default_namespace(doc: &K8sDocument) -> Vec<Violation> {
    doc.resources
        .iter()
        .filter(|r| {
            r.kind.as_deref() != Some("Namespace")
                && matches!(r.namespace.as_deref(), None | Some("default"))
        })
        .map(|r| {
            Violation::new(
                "KA-B004",
                r.line,
                1,
                format!("{} lands in the default namespace.", r.display()),
            )
        })
        .collect()
}

fn check_always_pull_pinned(doc: &K8sDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for resource in &doc.resources {
        for container in &resource.containers {
            let pinned = container
                .image
                .as_ref()
                .and_then(|i| image_tag(&i.value))
                .map(|tag| tag != "latest")
                .unwrap_or(false);
            if pinned && container.image_pull_policy.as_deref() == Some("Always") {
                violations.push(Violation::new(
                    "KA-B005",
                    container.line,
                    1,
                    format!(
                        "Container \"{}\" of {} always re-pulls a pinned image.",
                        container.name,
                        resource.display()
                    ),
                ));
            }
        }
    }
    violations
}

fn check_deprecated_api_versions(doc: &K8sDocument) -> Vec<Violation> {
    doc.resources
        .iter()
        .filter_map(|r| {
            let api = r.api_version.as_deref()?;
            let (_, replacement) = DEPRECATED_API_VERSIONS.iter().find(|(old, _)| *old == api)?;
            Some(Violation::new(
                "KA-B006",
                r.line,
                1,
                format!(
                    "{} uses removed apiVersion \"{}\" (use {}).",
                    r.display(),
                    api,
                    replacement
                ),
            ))
        })
        .collect()
}

fn check_service_account(doc: &K8sDocument) -> Vec<Violation> {
    doc.resources
        .iter()
        .filter(|r| r.is_workload() && r.has_pod_spec() && r.service_account_name.is_none())
        .map(|r| {
            Violation::new(
                "KA-B007",
                r.line,
                1,
                format!("{} has no explicit serviceAccountName.", r.display()),
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

    fn pod(image: &str, extra: &str) -> String {
        format!(
            "apiVersion: v1\nkind: Pod\nmetadata:\n  name: app\nspec:\n  containers:\n    - name: app\n      image: {}\n{}",
            image, extra
        )
    }

    #[test]
    fn test_image_tag_variants() {
        assert_eq!(check(&pod("nginx", ""), check_missing_tag).len(), 1);
        assert_eq!(check(&pod("nginx:latest", ""), check_latest_tag).len(), 1);
        assert!(check(&pod("nginx:1.25", ""), check_missing_tag).is_empty());
        assert!(check(&pod("nginx:1.25", ""), check_latest_tag).is_empty());
        // A digest is pinned, not missing.
        assert!(check(&pod("nginx@sha256:abcd", ""), check_missing_tag).is_empty());
    }

    #[test]
    fn test_always_pull_only_flagged_when_pinned() {
        let pinned = pod("app:1.2.3", "      imagePullPolicy: Always\n");
        assert_eq!(check(&pinned, check_always_pull_pinned).len(), 1);

        let latest = pod("app:latest", "      imagePullPolicy: Always\n");
        assert!(check(&latest, check_always_pull_pinned).is_empty());
    }

    #[test]
    fn test_default_namespace_flagged() {
        assert_eq!(check(&pod("app:1", ""), check_default_namespace).len(), 1);
        let namespaced = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: app\n  namespace: prod\nspec:\n  containers:\n    - name: app\n      image: app:1\n";
        assert!(check(namespaced, check_default_namespace).is_empty());
    }

    #[test]
    fn test_deprecated_api_version() {
        let yaml = "apiVersion: extensions/v1beta1\nkind: Deployment\nmetadata:\n  name: web\nspec:\n  template:\n    spec:\n      containers:\n        - name: web\n          image: nginx:1.25\n";
        let violations = check(yaml, check_deprecated_api_versions);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("apps/v1"));
    }

    #[test]
    fn test_recommended_labels_and_service_account() {
        assert_eq!(check(&pod("app:1", ""), check_recommended_labels).len(), 1);
        assert_eq!(check(&pod("app:1", ""), check_service_account).len(), 1);

        let labeled = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: app\n  labels:\n    app.kubernetes.io/name: app\nspec:\n  serviceAccountName: app\n  containers:\n    - name: app\n      image: app:1\n";
        assert!(check(labeled, check_recommended_labels).is_empty());
        assert!(check(labeled, check_service_account).is_empty());
    }
}

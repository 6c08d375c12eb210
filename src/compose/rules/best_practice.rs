//! Best-practice rules (CV-B).

use crate::compose::parser::ComposeDocument;
use crate::engine::Rule;
use crate::types::{Category, FixExample, RuleMetadata, Severity, Violation};

pub fn rules() -> Vec<Rule<ComposeDocument>> {
    vec![
        Rule::new(
            RuleMetadata {
                code: "CV-B001",
                title: "require-image-tag",
                severity: Severity::Warning,
                category: Category::BestPractice,
                explanation: "An image without a tag silently resolves to :latest, so deployments \
                              stop being reproducible.",
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
                code: "CV-B002",
                title: "no-latest-tag",
                severity: Severity::Warning,
                category: Category::BestPractice,
                explanation: ":latest changes under you on every pull; two hosts can run \
                              different code while claiming the same tag.",
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
                code: "CV-B003",
                title: "require-restart-policy",
                severity: Severity::Info,
                category: Category::BestPractice,
                explanation: "Without a restart policy a crashed service stays down until \
                              someone notices.",
                fix: FixExample {
                    description: "Add a restart policy",
                    before: "web:\n  image: nginx:1.25",
                    after: "web:\n  image: nginx:1.25\n  restart: unless-stopped",
                },
            },
            check_missing_restart,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-B004",
                title: "require-healthcheck",
                severity: Severity::Info,
                category: Category::BestPractice,
                explanation: "Healthchecks let Compose distinguish a started container from a \
                              working one; depends_on conditions need them.",
                fix: FixExample {
                    description: "Add a healthcheck",
                    before: "web:\n  image: nginx:1.25",
                    after: "web:\n  image: nginx:1.25\n  healthcheck:\n    test: [\"CMD\", \"curl\", \"-f\", \"http://localhost\"]",
                },
            },
            check_missing_healthcheck,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-B005",
                title: "no-build-and-image",
                severity: Severity::Warning,
                category: Category::BestPractice,
                explanation: "Declaring both build and image is ambiguous about which one a \
                              given environment actually runs.",
                fix: FixExample {
                    description: "Keep build (with image as the build tag) or image alone",
                    before: "build: .\nimage: registry/app:1.0",
                    after: "image: registry/app:1.0",
                },
            },
            check_build_and_image,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-B006",
                title: "avoid-container-name",
                severity: Severity::Info,
                category: Category::BestPractice,
                explanation: "Fixed container names prevent scaling beyond one replica and \
                              collide across projects.",
                fix: FixExample {
                    description: "Let Compose generate container names",
                    before: "container_name: my-app",
                    after: "",
                },
            },
            check_container_name,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-B007",
                title: "require-resource-limits",
                severity: Severity::Info,
                category: Category::BestPractice,
                explanation: "A service without memory or CPU limits can starve every other \
                              container on the host.",
                fix: FixExample {
                    description: "Declare limits under deploy.resources",
                    before: "web:\n  image: nginx:1.25",
                    after: "web:\n  image: nginx:1.25\n  deploy:\n    resources:\n      limits:\n        memory: 256M",
                },
            },
            check_missing_resource_limits,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-B008",
                title: "no-legacy-links",
                severity: Severity::Warning,
                category: Category::BestPractice,
                explanation: "links is a deprecated legacy-network feature; services on a shared \
                              network already resolve each other by name.",
                fix: FixExample {
                    description: "Replace links with a shared network",
                    before: "links:\n  - db",
                    after: "networks:\n  - backend",
                },
            },
            check_legacy_links,
        ),
    ]
}

/// Split an image reference into (repository, tag). Registry ports
/// (`registry:5000/app`) are not tags.
fn image_tag(image: &str) -> Option<&str> {
    let after_slash = image.rsplit('/').next().unwrap_or(image);
    after_slash.split_once(':').map(|(_, tag)| tag)
}

fn check_missing_tag(doc: &ComposeDocument) -> Vec<Violation> {
    doc.services
        .iter()
        .filter_map(|s| s.image.as_ref().map(|i| (s, i)))
        .filter(|(_, image)| image_tag(&image.value).is_none())
        .map(|(s, image)| {
            Violation::new(
                "CV-B001",
                image.line,
                1,
                format!(
                    "Image \"{}\" of service \"{}\" has no explicit tag.",
                    image.value, s.name
                ),
            )
        })
        .collect()
}

fn check_latest_tag(doc: &ComposeDocument) -> Vec<Violation> {
    doc.services
        .iter()
        .filter_map(|s| s.image.as_ref().map(|i| (s, i)))
        .filter(|(_, image)| image_tag(&image.value) == Some("latest"))
        .map(|(s, image)| {
            Violation::new(
                "CV-B002",
                image.line,
                1,
                format!("Service \"{}\" pins the mutable :latest tag.", s.name),
            )
        })
        .collect()
}

fn check_missing_restart(doc: &ComposeDocument) -> Vec<Violation> {
    doc.services
        .iter()
        .filter(|s| s.is_mapping && s.restart.is_none())
        .map(|s| {
            Violation::new(
                "CV-B003",
                s.line,
                1,
                format!("Service \"{}\" has no restart policy.", s.name),
            )
        })
        .collect()
}

fn check_missing_healthcheck(doc: &ComposeDocument) -> Vec<Violation> {
    doc.services
        .iter()
        .filter(|s| s.is_mapping && !s.has_healthcheck)
        .map(|s| {
            Violation::new(
                "CV-B004",
                s.line,
                1,
                format!("Service \"{}\" has no healthcheck.", s.name),
            )
        })
        .collect()
}

fn check_build_and_image(doc: &ComposeDocument) -> Vec<Violation> {
    doc.services
        .iter()
        .filter(|s| s.build_line.is_some() && s.image.is_some())
        .map(|s| {
            Violation::new(
                "CV-B005",
                s.build_line.unwrap_or(s.line),
                1,
                format!("Service \"{}\" declares both build and image.", s.name),
            )
        })
        .collect()
}

fn check_container_name(doc: &ComposeDocument) -> Vec<Violation> {
    doc.services
        .iter()
        .filter_map(|s| s.container_name.as_ref().map(|cn| (s, cn)))
        .map(|(s, cn)| {
            Violation::new(
                "CV-B006",
                cn.line,
                1,
                format!("Service \"{}\" sets a fixed container_name.", s.name),
            )
        })
        .collect()
}

fn check_missing_resource_limits(doc: &ComposeDocument) -> Vec<Violation> {
    doc.services
        .iter()
        .filter(|s| s.is_mapping && !s.has_resource_limits)
        .map(|s| {
            Violation::new(
                "CV-B007",
                s.line,
                1,
                format!("Service \"{}\" has no resource limits.", s.name),
            )
        })
        .collect()
}

fn check_legacy_links(doc: &ComposeDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for service in &doc.services {
        for link in &service.links {
            violations.push(Violation::new(
                "CV-B008",
                link.line,
                1,
                format!(
                    "Service \"{}\" uses legacy links (\"{}\").",
                    service.name, link.value
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
    fn test_image_tag_helper() {
        assert_eq!(image_tag("nginx"), None);
        assert_eq!(image_tag("nginx:1.25"), Some("1.25"));
        assert_eq!(image_tag("registry:5000/app"), None);
        assert_eq!(image_tag("registry:5000/app:2"), Some("2"));
    }

    #[test]
    fn test_missing_tag_and_latest() {
        let yaml = "services:\n  a:\n    image: nginx\n  b:\n    image: nginx:latest\n  c:\n    image: nginx:1.25\n";
        assert_eq!(check(yaml, check_missing_tag).len(), 1);
        assert_eq!(check(yaml, check_latest_tag).len(), 1);
    }

    #[test]
    fn test_build_and_image() {
        let yaml = "services:\n  app:\n    build: .\n    image: app:1\n";
        let violations = check(yaml, check_build_and_image);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].line, 3);
    }

    #[test]
    fn test_restart_and_healthcheck_presence() {
        let yaml = r#"services:
  good:
    image: a:1
    restart: unless-stopped
    healthcheck:
      test: ["CMD", "true"]
  bare:
    image: b:1
"#;
        let restart = check(yaml, check_missing_restart);
        assert_eq!(restart.len(), 1);
        assert!(restart[0].message.contains("bare"));
        assert_eq!(check(yaml, check_missing_healthcheck).len(), 1);
    }

    #[test]
    fn test_resource_limits_deploy_and_legacy() {
        let yaml = r#"services:
  modern:
    image: a:1
    deploy:
      resources:
        limits:
          memory: 256M
  legacy:
    image: b:1
    mem_limit: 512m
  none:
    image: c:1
"#;
        let violations = check(yaml, check_missing_resource_limits);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("none"));
    }

    #[test]
    fn test_links_flagged() {
        let yaml = "services:\n  web:\n    image: a:1\n    links:\n      - db\n  db:\n    image: d:1\n";
        assert_eq!(check(yaml, check_legacy_links).len(), 1);
    }

    #[test]
    fn test_container_name_flagged() {
        let yaml = "services:\n  web:\n    image: a:1\n    container_name: web-1\n";
        assert_eq!(check(yaml, check_container_name).len(), 1);
    }
}

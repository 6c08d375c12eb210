//! Security rules (CV-S).

use crate::compose::parser::ComposeDocument;
use crate::engine::Rule;
use crate::types::{Category, FixExample, RuleMetadata, Severity, Violation};

const DANGEROUS_CAPABILITIES: &[&str] = &["ALL", "SYS_ADMIN", "NET_ADMIN", "SYS_PTRACE", "SYS_MODULE"];

const SENSITIVE_HOST_PATHS: &[&str] = &["/etc", "/proc", "/sys", "/boot", "/dev", "/var/lib", "/usr"];

const SECRET_KEY_MARKERS: &[&str] = &[
    "PASSWORD", "PASSWD", "SECRET", "TOKEN", "API_KEY", "APIKEY", "ACCESS_KEY", "PRIVATE_KEY",
];

pub fn rules() -> Vec<Rule<ComposeDocument>> {
    vec![
        Rule::new(
            RuleMetadata {
                code: "CV-S001",
                title: "no-privileged-mode",
                severity: Severity::Error,
                category: Category::Security,
                explanation: "Privileged containers get unrestricted access to host devices and \
                              kernel capabilities, defeating container isolation entirely.",
                fix: FixExample {
                    description: "Drop privileged mode and grant only the capabilities the workload needs",
                    before: "privileged: true",
                    after: "cap_add:\n  - NET_BIND_SERVICE",
                },
            },
            check_privileged,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-S002",
                title: "no-docker-socket-mount",
                severity: Severity::Error,
                category: Category::Security,
                explanation: "Mounting the Docker socket hands the container full control of the \
                              Docker daemon, which is equivalent to root on the host.",
                fix: FixExample {
                    description: "Remove the socket mount; use a constrained proxy if the service must talk to Docker",
                    before: "volumes:\n  - /var/run/docker.sock:/var/run/docker.sock",
                    after: "volumes: []",
                },
            },
            check_docker_socket,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-S003",
                title: "no-host-network-mode",
                severity: Severity::Warning,
                category: Category::Security,
                explanation: "host networking bypasses the network namespace, exposing every \
                              container port directly on the host and disabling network isolation.",
                fix: FixExample {
                    description: "Use the default bridge network and publish only needed ports",
                    before: "network_mode: host",
                    after: "ports:\n  - \"127.0.0.1:8080:8080\"",
                },
            },
            check_host_network,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-S004",
                title: "no-hardcoded-secrets",
                severity: Severity::Error,
                category: Category::Security,
                explanation: "Credentials committed in compose files leak through version control \
                              and image metadata. Use environment interpolation or secrets.",
                fix: FixExample {
                    description: "Reference the secret from the environment instead of inlining it",
                    before: "environment:\n  DB_PASSWORD: hunter2",
                    after: "environment:\n  DB_PASSWORD: ${DB_PASSWORD}",
                },
            },
            check_hardcoded_secrets,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-S005",
                title: "no-dangerous-capabilities",
                severity: Severity::Error,
                category: Category::Security,
                explanation: "Capabilities like SYS_ADMIN or ALL grant broad kernel access that \
                              collapses the container security boundary.",
                fix: FixExample {
                    description: "Grant the narrowest capability that works",
                    before: "cap_add:\n  - SYS_ADMIN",
                    after: "cap_add:\n  - CHOWN",
                },
            },
            check_dangerous_capabilities,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-S006",
                title: "require-bound-port-interfaces",
                severity: Severity::Warning,
                category: Category::Security,
                explanation: "Ports without an explicit host interface bind to 0.0.0.0 and are \
                              reachable from every network the host is on.",
                fix: FixExample {
                    description: "Bind to localhost unless external exposure is intended",
                    before: "ports:\n  - \"8080:80\"",
                    after: "ports:\n  - \"127.0.0.1:8080:80\"",
                },
            },
            check_unbound_interfaces,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-S007",
                title: "no-root-user",
                severity: Severity::Warning,
                category: Category::Security,
                explanation: "Running as root inside the container amplifies any escape or file \
                              permission mistake into host-level impact.",
                fix: FixExample {
                    description: "Run as an unprivileged user",
                    before: "user: root",
                    after: "user: \"1000:1000\"",
                },
            },
            check_root_user,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-S008",
                title: "no-sensitive-host-paths",
                severity: Severity::Warning,
                category: Category::Security,
                explanation: "Bind-mounting system directories gives the container read (often \
                              write) access to host configuration and device state.",
                fix: FixExample {
                    description: "Mount a dedicated data directory instead of a system path",
                    before: "volumes:\n  - /etc:/host-etc",
                    after: "volumes:\n  - ./config:/app/config:ro",
                },
            },
            check_sensitive_host_paths,
        ),
        Rule::new(
            RuleMetadata {
                code: "CV-S009",
                title: "no-disabled-security-profiles",
                severity: Severity::Warning,
                category: Category::Security,
                explanation: "Disabling seccomp or AppArmor removes the syscall filter that \
                              contains a compromised process.",
                fix: FixExample {
                    description: "Keep the default profile or supply a custom one",
                    before: "security_opt:\n  - seccomp:unconfined",
                    after: "security_opt:\n  - seccomp:./profile.json",
                },
            },
            check_disabled_security_profiles,
        ),
    ]
}

fn check_privileged(doc: &ComposeDocument) -> Vec<Violation> {
    doc.services
        .iter()
        .filter_map(|s| s.privileged.as_ref().filter(|p| p.value).map(|p| (s, p)))
        .map(|(s, p)| {
            Violation::new(
                "CV-S001",
                p.line,
                1,
                format!("Service \"{}\" runs in privileged mode.", s.name),
            )
        })
        .collect()
}

fn check_docker_socket(doc: &ComposeDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for service in &doc.services {
        for mount in &service.volumes {
            if matches!(&mount.source, Some(src) if src.trim_end_matches('/') == "/var/run/docker.sock") {
                violations.push(Violation::new(
                    "CV-S002",
                    mount.line,
                    1,
                    format!("Service \"{}\" mounts the Docker socket.", service.name),
                ));
            }
        }
    }
    violations
}

fn check_host_network(doc: &ComposeDocument) -> Vec<Violation> {
    doc.services
        .iter()
        .filter_map(|s| {
            s.network_mode
                .as_ref()
                .filter(|m| m.value == "host")
                .map(|m| (s, m))
        })
        .map(|(s, m)| {
            Violation::new(
                "CV-S003",
                m.line,
                1,
                format!("Service \"{}\" uses host network mode.", s.name),
            )
        })
        .collect()
}

fn looks_like_secret_key(key: &str) -> bool {
    let upper = key.to_uppercase();
    SECRET_KEY_MARKERS.iter().any(|marker| upper.contains(marker))
}

fn is_literal_secret(value: &str) -> bool {
    // Interpolations and empty values come from the environment, not the file.
    !value.is_empty() && !value.starts_with("${") && !value.starts_with('$')
}

fn check_hardcoded_secrets(doc: &ComposeDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for service in &doc.services {
        for entry in &service.environment {
            if looks_like_secret_key(&entry.key) && is_literal_secret(&entry.value) {
                violations.push(Violation::new(
                    "CV-S004",
                    entry.line,
                    1,
                    format!(
                        "Service \"{}\" hardcodes a credential in \"{}\".",
                        service.name, entry.key
                    ),
                ));
            }
        }
    }
    violations
}

fn check_dangerous_capabilities(doc: &ComposeDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for service in &doc.services {
        for cap in &service.cap_add {
            if DANGEROUS_CAPABILITIES.contains(&cap.value.to_uppercase().as_str()) {
                violations.push(Violation::new(
                    "CV-S005",
                    cap.line,
                    1,
                    format!(
                        "Service \"{}\" adds dangerous capability \"{}\".",
                        service.name, cap.value
                    ),
                ));
            }
        }
    }
    violations
}

fn check_unbound_interfaces(doc: &ComposeDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for service in &doc.services {
        for port in &service.ports {
            if port.host_port.is_none() {
                continue;
            }
            let unbound = match &port.host_ip {
                None => true,
                Some(ip) => ip == "0.0.0.0" || ip == "::",
            };
            if unbound {
                violations.push(Violation::new(
                    "CV-S006",
                    port.line,
                    1,
                    format!(
                        "Port \"{}\" of service \"{}\" binds to all interfaces.",
                        port.raw, service.name
                    ),
                ));
            }
        }
    }
    violations
}

fn check_root_user(doc: &ComposeDocument) -> Vec<Violation> {
    doc.services
        .iter()
        .filter_map(|s| {
            s.user
                .as_ref()
                .filter(|u| {
                    let user = u.value.split(':').next().unwrap_or("");
                    user == "root" || user == "0"
                })
                .map(|u| (s, u))
        })
        .map(|(s, u)| {
            Violation::new(
                "CV-S007",
                u.line,
                1,
                format!("Service \"{}\" runs as root.", s.name),
            )
        })
        .collect()
}

fn check_sensitive_host_paths(doc: &ComposeDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for service in &doc.services {
        for mount in &service.volumes {
            let Some(source) = &mount.source else { continue };
            if !mount.is_bind_mount() {
                continue;
            }
            let normalized = source.trim_end_matches('/');
            let sensitive = normalized == ""
                || normalized == "/"
                || SENSITIVE_HOST_PATHS
                    .iter()
                    .any(|p| normalized == *p || normalized.starts_with(&format!("{}/", p)));
            // The docker socket has its own dedicated rule.
            if sensitive && normalized != "/var/run/docker.sock" {
                violations.push(Violation::new(
                    "CV-S008",
                    mount.line,
                    1,
                    format!(
                        "Service \"{}\" bind-mounts sensitive host path \"{}\".",
                        service.name, source
                    ),
                ));
            }
        }
    }
    violations
}

fn check_disabled_security_profiles(doc: &ComposeDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    for service in &doc.services {
        for opt in &service.security_opt {
            let normalized = opt.value.replace(char::is_whitespace, "").to_lowercase();
            if normalized == "seccomp:unconfined" || normalized == "apparmor:unconfined" {
                violations.push(Violation::new(
                    "CV-S009",
                    opt.line,
                    1,
                    format!(
                        "Service \"{}\" disables a security profile (\"{}\").",
                        service.name, opt.value
                    ),
                ));
            }
        }
    }
    violations
}

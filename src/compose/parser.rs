//! Compose document model builder.
//!
//! Converts raw YAML text into a line-annotated model of a Docker Compose
//! file. yaml-rust2 gives us the node tree; positions come from scanning the
//! raw source, so every service and field carries the 1-indexed line it was
//! declared on. Port and volume values are normalized regardless of
//! short/long YAML syntax without losing the original line reference.

use std::collections::HashMap;
use yaml_rust2::{Yaml, YamlLoader};

use crate::error::ParseError;

/// Top-level keys the Compose schema knows about. `x-` prefixed extension
/// keys are always allowed.
pub const KNOWN_TOP_LEVEL_KEYS: &[&str] = &[
    "version", "name", "services", "networks", "volumes", "configs", "secrets", "include",
];

/// Valid values for `restart`.
pub const RESTART_POLICIES: &[&str] = &["no", "always", "on-failure", "unless-stopped"];

/// A value paired with the source line it was declared on (1-indexed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located<T> {
    pub value: T,
    pub line: u32,
}

impl<T> Located<T> {
    pub fn new(value: T, line: u32) -> Self {
        Self { value, line }
    }
}

/// A declared top-level resource (network, volume, config, secret).
#[derive(Debug, Clone)]
pub struct NamedDecl {
    pub name: String,
    pub line: u32,
    /// True when the declaration marks `external: true`.
    pub external: bool,
}

/// Normalized port mapping.
///
/// All of `80`, `"8080:80"`, `"127.0.0.1:8080:80/udp"` and the long
/// `target:`/`published:` syntax collapse into this shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    /// The raw value as it appears in source.
    pub raw: String,
    pub line: u32,
    /// Whether the value was quoted in source.
    pub quoted: bool,
    pub host_ip: Option<String>,
    pub host_port: Option<u32>,
    pub container_port: Option<u32>,
    pub protocol: Option<String>,
}

impl PortMapping {
    /// Parse a short-syntax port string.
    pub fn parse(raw: &str, line: u32, quoted: bool) -> Option<Self> {
        let raw_trimmed = raw.trim();
        if raw_trimmed.is_empty() {
            return None;
        }

        let (port_part, protocol) = match raw_trimmed.rsplit_once('/') {
            Some((p, proto)) => (p, Some(proto.to_string())),
            None => (raw_trimmed, None),
        };

        let parts: Vec<&str> = port_part.split(':').collect();
        let (host_ip, host_port, container_port) = match parts.len() {
            1 => (None, None, parts[0].parse().ok()),
            2 => (None, parts[0].parse().ok(), parts[1].parse().ok()),
            3 => (
                Some(parts[0].to_string()),
                parts[1].parse().ok(),
                parts[2].parse().ok(),
            ),
            _ => return None,
        };

        Some(Self {
            raw: raw_trimmed.to_string(),
            line,
            quoted,
            host_ip,
            host_port,
            container_port,
            protocol,
        })
    }

    /// The exported host binding used for duplicate detection
    /// (`ip:port` or bare `port`).
    pub fn exported(&self) -> Option<String> {
        self.host_port.map(|p| match &self.host_ip {
            Some(ip) => format!("{}:{}", ip, p),
            None => p.to_string(),
        })
    }
}

/// Normalized volume mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    pub raw: String,
    pub line: u32,
    pub quoted: bool,
    /// Source path or named volume. None for anonymous volumes.
    pub source: Option<String>,
    pub target: String,
    pub options: Option<String>,
}

impl VolumeMount {
    pub fn parse(raw: &str, line: u32, quoted: bool) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let parts: Vec<&str> = raw.splitn(3, ':').collect();
        let (source, target, options) = match parts.len() {
            1 => (None, parts[0].to_string(), None),
            2 => (Some(parts[0].to_string()), parts[1].to_string(), None),
            3 => (
                Some(parts[0].to_string()),
                parts[1].to_string(),
                Some(parts[2].to_string()),
            ),
            _ => return None,
        };

        Some(Self {
            raw: raw.to_string(),
            line,
            quoted,
            source,
            target,
            options,
        })
    }

    /// True when the source is a named volume rather than a host path.
    pub fn is_named_volume(&self) -> bool {
        match &self.source {
            Some(s) => {
                !s.starts_with('/') && !s.starts_with('.') && !s.starts_with('~') && !s.starts_with('$')
            }
            None => false,
        }
    }

    /// True when the source is a host path bind mount.
    pub fn is_bind_mount(&self) -> bool {
        matches!(&self.source, Some(s) if s.starts_with('/') || s.starts_with('.') || s.starts_with('~'))
    }
}

/// An environment entry with its source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvEntry {
    pub key: String,
    pub value: String,
    pub line: u32,
}

/// Normalized, semantically typed view of one Compose service.
#[derive(Debug, Clone, Default)]
pub struct ServiceDef {
    pub name: String,
    pub line: u32,
    pub end_line: Option<u32>,
    /// False when the service body is not a mapping (schema violation).
    pub is_mapping: bool,
    /// Keys of the service mapping, in declaration order.
    pub keys: Vec<String>,

    pub image: Option<Located<String>>,
    pub build_line: Option<u32>,
    pub container_name: Option<Located<String>>,

    pub ports: Vec<PortMapping>,
    pub ports_line: Option<u32>,
    pub ports_end_line: Option<u32>,

    pub volumes: Vec<VolumeMount>,
    pub volumes_line: Option<u32>,

    pub depends_on: Vec<Located<String>>,
    pub depends_on_line: Option<u32>,

    pub environment: Vec<EnvEntry>,
    pub network_refs: Vec<Located<String>>,
    pub links: Vec<Located<String>>,

    pub restart: Option<Located<String>>,
    pub network_mode: Option<Located<String>>,
    pub pid: Option<Located<String>>,
    pub user: Option<Located<String>>,
    pub privileged: Option<Located<bool>>,
    pub cap_add: Vec<Located<String>>,
    pub security_opt: Vec<Located<String>>,

    pub has_healthcheck: bool,
    pub has_resource_limits: bool,
}

/// Line-annotated model of a whole Compose file.
#[derive(Debug, Clone, Default)]
pub struct ComposeDocument {
    pub version: Option<Located<String>>,
    pub name: Option<Located<String>>,
    /// Top-level keys in declaration order with their lines.
    pub top_level_keys: Vec<Located<String>>,
    pub has_services_key: bool,
    pub services_line: Option<u32>,
    /// Services in declaration order.
    pub services: Vec<ServiceDef>,
    pub networks: Vec<NamedDecl>,
    pub volumes: Vec<NamedDecl>,
    pub configs: Vec<NamedDecl>,
    pub secrets: Vec<NamedDecl>,
    /// Raw source, kept for position lookups.
    pub source: String,
}

impl ComposeDocument {
    pub fn service(&self, name: &str) -> Option<&ServiceDef> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn has_network(&self, name: &str) -> bool {
        self.networks.iter().any(|n| n.name == name)
    }

    pub fn has_volume(&self, name: &str) -> bool {
        self.volumes.iter().any(|v| v.name == name)
    }
}

/// Parse Compose YAML into the document model.
pub fn parse_compose(content: &str) -> Result<ComposeDocument, ParseError> {
    let docs = YamlLoader::load_from_str(content).map_err(|e| ParseError::Yaml(e.to_string()))?;
    let doc = docs.into_iter().next().ok_or(ParseError::EmptyDocument)?;

    let hash = match &doc {
        Yaml::Hash(h) => h,
        Yaml::Null => return Err(ParseError::EmptyDocument),
        _ => return Err(ParseError::InvalidStructure("root must be a mapping".into())),
    };

    let mut compose = ComposeDocument {
        source: content.to_string(),
        ..Default::default()
    };

    for (key, _) in hash {
        if let Yaml::String(k) = key {
            let line = find_line_for_key(content, &[k]).unwrap_or(1);
            compose.top_level_keys.push(Located::new(k.clone(), line));
        }
    }

    if let Some(Yaml::String(version)) = hash.get(&Yaml::String("version".into())) {
        let line = find_line_for_key(content, &["version"]).unwrap_or(1);
        compose.version = Some(Located::new(version.clone(), line));
    }
    // `version: 3` without quotes arrives as a number
    if compose.version.is_none() {
        match hash.get(&Yaml::String("version".into())) {
            Some(Yaml::Integer(v)) => {
                let line = find_line_for_key(content, &["version"]).unwrap_or(1);
                compose.version = Some(Located::new(v.to_string(), line));
            }
            Some(Yaml::Real(v)) => {
                let line = find_line_for_key(content, &["version"]).unwrap_or(1);
                compose.version = Some(Located::new(v.clone(), line));
            }
            _ => {}
        }
    }

    if let Some(Yaml::String(name)) = hash.get(&Yaml::String("name".into())) {
        let line = find_line_for_key(content, &["name"]).unwrap_or(1);
        compose.name = Some(Located::new(name.clone(), line));
    }

    if let Some(services_yaml) = hash.get(&Yaml::String("services".into())) {
        compose.has_services_key = true;
        compose.services_line = find_line_for_key(content, &["services"]);

        if let Yaml::Hash(services) = services_yaml {
            for (name_yaml, service_yaml) in services {
                if let Yaml::String(name) = name_yaml {
                    compose.services.push(parse_service(name, service_yaml, content));
                }
            }
        }

        // Service end lines: up to the line before the next service, or the
        // end of the file for the last one.
        let total_lines = content.lines().count() as u32;
        let starts: Vec<u32> = compose.services.iter().map(|s| s.line).collect();
        for (idx, service) in compose.services.iter_mut().enumerate() {
            let end = starts
                .get(idx + 1)
                .map(|next| next.saturating_sub(1))
                .unwrap_or(total_lines);
            if end > service.line {
                service.end_line = Some(end);
            }
        }
    }

    for (section, target) in [
        ("networks", &mut compose.networks),
        ("volumes", &mut compose.volumes),
        ("configs", &mut compose.configs),
        ("secrets", &mut compose.secrets),
    ] {
        if let Some(Yaml::Hash(entries)) = hash.get(&Yaml::String(section.into())) {
            for (name_yaml, value_yaml) in entries {
                if let Yaml::String(name) = name_yaml {
                    let line = find_line_for_key(content, &[section, name]).unwrap_or(1);
                    let external = matches!(
                        value_yaml,
                        Yaml::Hash(h) if matches!(
                            h.get(&Yaml::String("external".into())),
                            Some(Yaml::Boolean(true))
                        )
                    );
                    target.push(NamedDecl {
                        name: name.clone(),
                        line,
                        external,
                    });
                }
            }
        }
    }

    Ok(compose)
}

fn parse_service(name: &str, yaml: &Yaml, source: &str) -> ServiceDef {
    let line = find_line_for_key(source, &["services", name]).unwrap_or(1);

    let hash = match yaml {
        Yaml::Hash(h) => h,
        _ => {
            // Scalar or null service body: recorded for the schema rule.
            return ServiceDef {
                name: name.to_string(),
                line,
                is_mapping: matches!(yaml, Yaml::Null),
                ..Default::default()
            };
        }
    };

    let mut service = ServiceDef {
        name: name.to_string(),
        line,
        is_mapping: true,
        ..Default::default()
    };

    for (key, _) in hash {
        if let Yaml::String(k) = key {
            service.keys.push(k.clone());
        }
    }

    let key_line = |key: &str| find_line_for_key(source, &["services", name, key]);

    if let Some(Yaml::String(image)) = hash.get(&Yaml::String("image".into())) {
        service.image = Some(Located::new(image.clone(), key_line("image").unwrap_or(line)));
    }
    if hash.get(&Yaml::String("build".into())).is_some() {
        service.build_line = key_line("build");
    }
    if let Some(Yaml::String(cn)) = hash.get(&Yaml::String("container_name".into())) {
        service.container_name = Some(Located::new(cn.clone(), key_line("container_name").unwrap_or(line)));
    }

    if let Some(ports_yaml) = hash.get(&Yaml::String("ports".into())) {
        service.ports_line = key_line("ports");
        if let Yaml::Array(items) = ports_yaml {
            let item_lines = list_item_lines(source, service.ports_line.unwrap_or(line), items.len());
            for (item, item_line) in items.iter().zip(item_lines.iter()) {
                if let Some(port) = parse_port_item(item, source, *item_line) {
                    service.ports.push(port);
                }
            }
            service.ports_end_line = item_lines.last().copied().filter(|end| {
                service.ports_line.map(|start| *end > start).unwrap_or(false)
            });
        }
    }

    if let Some(volumes_yaml) = hash.get(&Yaml::String("volumes".into())) {
        service.volumes_line = key_line("volumes");
        if let Yaml::Array(items) = volumes_yaml {
            let item_lines = list_item_lines(source, service.volumes_line.unwrap_or(line), items.len());
            for (item, item_line) in items.iter().zip(item_lines.iter()) {
                if let Yaml::String(s) = item {
                    let quoted = value_quoted_at_line(source, *item_line);
                    if let Some(mount) = VolumeMount::parse(s, *item_line, quoted) {
                        service.volumes.push(mount);
                    }
                }
            }
        }
    }

    if let Some(depends_yaml) = hash.get(&Yaml::String("depends_on".into())) {
        service.depends_on_line = key_line("depends_on");
        let start = service.depends_on_line.unwrap_or(line);
        match depends_yaml {
            Yaml::Array(items) => {
                let item_lines = list_item_lines(source, start, items.len());
                for (item, item_line) in items.iter().zip(item_lines.iter()) {
                    if let Yaml::String(dep) = item {
                        service.depends_on.push(Located::new(dep.clone(), *item_line));
                    }
                }
            }
            Yaml::Hash(h) => {
                // Long syntax: depends_on: { db: { condition: ... } }
                for (dep_name, _) in h {
                    if let Yaml::String(dep) = dep_name {
                        let dep_line =
                            find_line_for_key(source, &["services", name, "depends_on", dep])
                                .unwrap_or(start);
                        service.depends_on.push(Located::new(dep.clone(), dep_line));
                    }
                }
            }
            _ => {}
        }
    }

    if let Some(env_yaml) = hash.get(&Yaml::String("environment".into())) {
        let env_line = key_line("environment").unwrap_or(line);
        match env_yaml {
            Yaml::Hash(h) => {
                for (k, v) in h {
                    if let Yaml::String(k) = k {
                        let value = scalar_to_string(v);
                        let entry_line =
                            find_line_for_key(source, &["services", name, "environment", k])
                                .unwrap_or(env_line);
                        service.environment.push(EnvEntry {
                            key: k.clone(),
                            value,
                            line: entry_line,
                        });
                    }
                }
            }
            Yaml::Array(items) => {
                let item_lines = list_item_lines(source, env_line, items.len());
                for (item, item_line) in items.iter().zip(item_lines.iter()) {
                    if let Yaml::String(s) = item {
                        let (key, value) = match s.split_once('=') {
                            Some((k, v)) => (k.to_string(), v.to_string()),
                            None => (s.clone(), String::new()),
                        };
                        service.environment.push(EnvEntry {
                            key,
                            value,
                            line: *item_line,
                        });
                    }
                }
            }
            _ => {}
        }
    }

    for (field, target) in [
        ("networks", &mut service.network_refs),
        ("links", &mut service.links),
        ("cap_add", &mut service.cap_add),
        ("security_opt", &mut service.security_opt),
    ] {
        if let Some(field_yaml) = hash.get(&Yaml::String(field.into())) {
            let field_line = key_line(field).unwrap_or(line);
            match field_yaml {
                Yaml::Array(items) => {
                    let item_lines = list_item_lines(source, field_line, items.len());
                    for (item, item_line) in items.iter().zip(item_lines.iter()) {
                        if let Yaml::String(s) = item {
                            target.push(Located::new(s.clone(), *item_line));
                        }
                    }
                }
                // networks may also be a mapping of network -> config
                Yaml::Hash(h) => {
                    for (k, _) in h {
                        if let Yaml::String(s) = k {
                            target.push(Located::new(s.clone(), field_line));
                        }
                    }
                }
                _ => {}
            }
        }
    }

    for (field, target) in [
        ("restart", &mut service.restart),
        ("network_mode", &mut service.network_mode),
        ("pid", &mut service.pid),
        ("user", &mut service.user),
    ] {
        match hash.get(&Yaml::String(field.into())) {
            Some(Yaml::String(s)) => {
                *target = Some(Located::new(s.clone(), key_line(field).unwrap_or(line)));
            }
            Some(Yaml::Integer(i)) => {
                *target = Some(Located::new(i.to_string(), key_line(field).unwrap_or(line)));
            }
            _ => {}
        }
    }

    if let Some(Yaml::Boolean(b)) = hash.get(&Yaml::String("privileged".into())) {
        service.privileged = Some(Located::new(*b, key_line("privileged").unwrap_or(line)));
    }

    service.has_healthcheck = hash.get(&Yaml::String("healthcheck".into())).is_some();
    service.has_resource_limits = has_resource_limits(hash);

    service
}

fn parse_port_item(item: &Yaml, source: &str, line: u32) -> Option<PortMapping> {
    match item {
        Yaml::String(s) => {
            let quoted = value_quoted_at_line(source, line);
            PortMapping::parse(s, line, quoted)
        }
        Yaml::Integer(i) => PortMapping::parse(&i.to_string(), line, false),
        Yaml::Hash(h) => {
            if h.contains_key(&Yaml::String("target".into())) {
                // Long syntax.
                let target = yaml_port_number(h.get(&Yaml::String("target".into())))?;
                let published = yaml_port_number(h.get(&Yaml::String("published".into())));
                let host_ip = match h.get(&Yaml::String("host_ip".into())) {
                    Some(Yaml::String(ip)) => Some(ip.clone()),
                    _ => None,
                };
                let protocol = match h.get(&Yaml::String("protocol".into())) {
                    Some(Yaml::String(p)) => Some(p.clone()),
                    _ => None,
                };
                Some(PortMapping {
                    raw: format!("{}:{}", published.unwrap_or(target), target),
                    line,
                    quoted: true,
                    host_ip,
                    host_port: published,
                    container_port: Some(target),
                    protocol,
                })
            } else if h.len() == 1 {
                // An unquoted `- 8080:80` parses as a single-pair mapping,
                // the classic YAML footgun the schema rule flags.
                let (k, v) = h.iter().next()?;
                let raw = format!("{}:{}", yaml_scalar_repr(k)?, yaml_scalar_repr(v)?);
                PortMapping::parse(&raw, line, false)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn yaml_port_number(value: Option<&Yaml>) -> Option<u32> {
    match value {
        Some(Yaml::Integer(i)) => u32::try_from(*i).ok(),
        Some(Yaml::String(s)) => s.parse().ok(),
        _ => None,
    }
}

fn yaml_scalar_repr(value: &Yaml) -> Option<String> {
    match value {
        Yaml::Integer(i) => Some(i.to_string()),
        Yaml::String(s) => Some(s.clone()),
        Yaml::Real(r) => Some(r.clone()),
        _ => None,
    }
}

fn scalar_to_string(value: &Yaml) -> String {
    match value {
        Yaml::String(s) => s.clone(),
        Yaml::Integer(i) => i.to_string(),
        Yaml::Real(r) => r.clone(),
        Yaml::Boolean(b) => b.to_string(),
        _ => String::new(),
    }
}

fn has_resource_limits(hash: &yaml_rust2::yaml::Hash) -> bool {
    if hash.contains_key(&Yaml::String("mem_limit".into()))
        || hash.contains_key(&Yaml::String("cpus".into()))
    {
        return true;
    }
    if let Some(Yaml::Hash(deploy)) = hash.get(&Yaml::String("deploy".into())) {
        if let Some(Yaml::Hash(resources)) = deploy.get(&Yaml::String("resources".into())) {
            return resources.contains_key(&Yaml::String("limits".into()));
        }
    }
    false
}

/// Find the 1-indexed line of a nested key by scanning the raw source.
///
/// Each path element must appear at a strictly deeper indent than the
/// previous one.
pub fn find_line_for_key(source: &str, path: &[&str]) -> Option<u32> {
    if path.is_empty() {
        return Some(1);
    }

    let mut path_idx = 0;
    let mut parent_indent: Option<usize> = None;

    for (line_num, raw_line) in source.lines().enumerate() {
        let trimmed = raw_line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let indent = raw_line.len() - raw_line.trim_start().len();

        // Leaving the current parent's block resets nothing deeper than it.
        if let Some(p) = parent_indent {
            if indent <= p && path_idx > 0 {
                continue;
            }
        }

        let target = path[path_idx];
        let matches_key = trimmed == target
            || trimmed.starts_with(&format!("{}:", target))
            || trimmed.starts_with(&format!("\"{}\":", target))
            || trimmed.starts_with(&format!("'{}':", target));

        // The first path element must sit at the top level; deeper elements
        // must be strictly more indented than their parent.
        if matches_key && parent_indent.map(|p| indent > p).unwrap_or(indent == 0) {
            path_idx += 1;
            parent_indent = Some(indent);
            if path_idx == path.len() {
                return Some((line_num + 1) as u32);
            }
        }
    }

    None
}

/// Lines of the items of a block list whose key sits on `key_line`.
///
/// Falls back to the key line itself for flow-style lists and for any item
/// the scan cannot attribute.
pub fn list_item_lines(source: &str, key_line: u32, item_count: usize) -> Vec<u32> {
    let lines: Vec<&str> = source.lines().collect();
    let mut result = Vec::with_capacity(item_count);

    let key_idx = (key_line - 1) as usize;
    let base_indent = lines
        .get(key_idx)
        .map(|l| l.len() - l.trim_start().len())
        .unwrap_or(0);

    for (offset, raw_line) in lines.iter().enumerate().skip(key_idx + 1) {
        if result.len() == item_count {
            break;
        }
        let trimmed = raw_line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let indent = raw_line.len() - raw_line.trim_start().len();
        if indent <= base_indent {
            break;
        }
        if trimmed.starts_with('-') {
            result.push((offset + 1) as u32);
        }
    }

    // Flow-style list or scan shortfall: attribute to the key line.
    while result.len() < item_count {
        result.push(key_line);
    }
    result
}

/// Whether the value on a given source line is quoted.
pub fn value_quoted_at_line(source: &str, line: u32) -> bool {
    let Some(raw_line) = source.lines().nth((line - 1) as usize) else {
        return false;
    };
    let trimmed = raw_line.trim();
    if let Some(after_dash) = trimmed.strip_prefix('-') {
        let value = after_dash.trim();
        return value.starts_with('"') || value.starts_with('\'');
    }
    if let Some(pos) = trimmed.find(':') {
        let value = trimmed[pos + 1..].trim();
        return value.starts_with('"') || value.starts_with('\'');
    }
    false
}

/// Per-service depends_on adjacency, used by the cycle rules.
pub fn dependency_adjacency(doc: &ComposeDocument) -> HashMap<&str, Vec<&str>> {
    doc.services
        .iter()
        .map(|s| {
            (
                s.name.as_str(),
                s.depends_on.iter().map(|d| d.value.as_str()).collect(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_compose() {
        let yaml = r#"name: myproject
services:
  web:
    image: nginx:1.25
    ports:
      - "8080:80"
  db:
    image: postgres:15
"#;
        let doc = parse_compose(yaml).unwrap();
        assert_eq!(doc.name.as_ref().map(|n| n.value.as_str()), Some("myproject"));
        assert_eq!(doc.services.len(), 2);

        let web = doc.service("web").unwrap();
        assert_eq!(web.line, 3);
        assert_eq!(web.image.as_ref().map(|i| i.value.as_str()), Some("nginx:1.25"));
        assert_eq!(web.ports.len(), 1);
        assert_eq!(web.ports[0].host_port, Some(8080));
        assert_eq!(web.ports[0].container_port, Some(80));
        assert!(web.ports[0].quoted);
        assert_eq!(web.ports[0].line, 6);
        assert_eq!(web.end_line, Some(6));
    }

    #[test]
    fn test_parse_error_on_malformed_yaml() {
        let result = parse_compose("services:\n  web:\n   image: [unclosed\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_root_not_mapping() {
        assert!(matches!(
            parse_compose("- just\n- a list\n"),
            Err(ParseError::InvalidStructure(_))
        ));
    }

    #[test]
    fn test_unquoted_port_is_detected_as_mapping() {
        // `- 8080:80` without quotes parses as {8080: 80}; the model must
        // still normalize it and record it as unquoted.
        let yaml = "services:\n  web:\n    image: nginx:1.25\n    ports:\n      - 8080:80\n";
        let doc = parse_compose(yaml).unwrap();
        let web = doc.service("web").unwrap();
        assert_eq!(web.ports.len(), 1);
        assert!(!web.ports[0].quoted);
        assert_eq!(web.ports[0].host_port, Some(8080));
        assert_eq!(web.ports[0].container_port, Some(80));
        assert_eq!(web.ports[0].line, 5);
    }

    #[test]
    fn test_long_syntax_port() {
        let yaml = r#"services:
  web:
    image: nginx:1.25
    ports:
      - target: 80
        published: 8080
        host_ip: 127.0.0.1
"#;
        let doc = parse_compose(yaml).unwrap();
        let web = doc.service("web").unwrap();
        assert_eq!(web.ports.len(), 1);
        assert_eq!(web.ports[0].container_port, Some(80));
        assert_eq!(web.ports[0].host_port, Some(8080));
        assert_eq!(web.ports[0].host_ip.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn test_depends_on_short_and_long() {
        let yaml = r#"services:
  web:
    image: nginx:1.25
    depends_on:
      - db
      - cache
  api:
    image: api:1
    depends_on:
      db:
        condition: service_healthy
  db:
    image: postgres:15
  cache:
    image: redis:7
"#;
        let doc = parse_compose(yaml).unwrap();
        let web = doc.service("web").unwrap();
        assert_eq!(
            web.depends_on.iter().map(|d| d.value.as_str()).collect::<Vec<_>>(),
            vec!["db", "cache"]
        );
        assert_eq!(web.depends_on[0].line, 5);

        let api = doc.service("api").unwrap();
        assert_eq!(api.depends_on.len(), 1);
        assert_eq!(api.depends_on[0].value, "db");
    }

    #[test]
    fn test_environment_forms() {
        let yaml = r#"services:
  app:
    image: app:1
    environment:
      DB_HOST: postgres
      DB_PASSWORD: hunter2
  worker:
    image: app:1
    environment:
      - QUEUE=jobs
      - EMPTY
"#;
        let doc = parse_compose(yaml).unwrap();
        let app = doc.service("app").unwrap();
        assert_eq!(app.environment.len(), 2);
        assert_eq!(app.environment[1].key, "DB_PASSWORD");
        assert_eq!(app.environment[1].value, "hunter2");
        assert_eq!(app.environment[1].line, 6);

        let worker = doc.service("worker").unwrap();
        assert_eq!(worker.environment[0].key, "QUEUE");
        assert_eq!(worker.environment[0].value, "jobs");
        assert_eq!(worker.environment[1].value, "");
    }

    #[test]
    fn test_security_fields() {
        let yaml = r#"services:
  danger:
    image: tool:1
    privileged: true
    network_mode: host
    user: root
    cap_add:
      - SYS_ADMIN
    security_opt:
      - seccomp:unconfined
"#;
        let doc = parse_compose(yaml).unwrap();
        let svc = doc.service("danger").unwrap();
        assert_eq!(svc.privileged.as_ref().map(|p| p.value), Some(true));
        assert_eq!(svc.network_mode.as_ref().map(|m| m.value.as_str()), Some("host"));
        assert_eq!(svc.user.as_ref().map(|u| u.value.as_str()), Some("root"));
        assert_eq!(svc.cap_add[0].value, "SYS_ADMIN");
        assert_eq!(svc.security_opt[0].value, "seccomp:unconfined");
    }

    #[test]
    fn test_declared_networks_and_volumes() {
        let yaml = r#"services:
  web:
    image: nginx:1.25
    networks:
      - frontend
    volumes:
      - data:/var/lib/data
networks:
  frontend: {}
  backend:
    external: true
volumes:
  data: {}
"#;
        let doc = parse_compose(yaml).unwrap();
        assert!(doc.has_network("frontend"));
        assert!(doc.has_network("backend"));
        assert!(doc.networks.iter().find(|n| n.name == "backend").unwrap().external);
        assert!(doc.has_volume("data"));

        let web = doc.service("web").unwrap();
        assert_eq!(web.network_refs[0].value, "frontend");
        assert!(web.volumes[0].is_named_volume());
    }

    #[test]
    fn test_volume_classification() {
        let bind = VolumeMount::parse("./src:/app", 1, false).unwrap();
        assert!(bind.is_bind_mount());
        assert!(!bind.is_named_volume());

        let named = VolumeMount::parse("data:/var/lib/data:ro", 1, false).unwrap();
        assert!(named.is_named_volume());
        assert_eq!(named.options.as_deref(), Some("ro"));

        let anon = VolumeMount::parse("/data", 1, false).unwrap();
        assert!(!anon.is_named_volume());
        assert_eq!(anon.target, "/data");
    }

    #[test]
    fn test_port_parse_formats() {
        let p = PortMapping::parse("80", 1, false).unwrap();
        assert_eq!(p.container_port, Some(80));
        assert_eq!(p.host_port, None);

        let p = PortMapping::parse("127.0.0.1:8080:80/udp", 1, true).unwrap();
        assert_eq!(p.host_ip.as_deref(), Some("127.0.0.1"));
        assert_eq!(p.protocol.as_deref(), Some("udp"));
        assert_eq!(p.exported().as_deref(), Some("127.0.0.1:8080"));

        let p = PortMapping::parse("99999:80", 1, true).unwrap();
        assert_eq!(p.host_port, Some(99999)); // out of range; schema rule flags it
    }

    #[test]
    fn test_find_line_for_key_nested() {
        let yaml = "services:\n  web:\n    image: nginx\n  db:\n    image: postgres\n";
        assert_eq!(find_line_for_key(yaml, &["services"]), Some(1));
        assert_eq!(find_line_for_key(yaml, &["services", "web"]), Some(2));
        assert_eq!(find_line_for_key(yaml, &["services", "web", "image"]), Some(3));
        assert_eq!(find_line_for_key(yaml, &["services", "db"]), Some(4));
        assert_eq!(find_line_for_key(yaml, &["services", "missing"]), None);
    }

    #[test]
    fn test_list_item_lines_skips_comments() {
        let yaml = "ports:\n  # first\n  - \"80:80\"\n\n  - \"443:443\"\n";
        assert_eq!(list_item_lines(yaml, 1, 2), vec![3, 5]);
    }

    #[test]
    fn test_service_end_line_spans_block() {
        let yaml = "services:\n  web:\n    image: nginx:1\n    ports:\n      - \"80:80\"\n  db:\n    image: pg:15\n";
        let doc = parse_compose(yaml).unwrap();
        assert_eq!(doc.service("web").unwrap().end_line, Some(5));
        assert_eq!(doc.service("db").unwrap().end_line, Some(7));
    }

    #[test]
    fn test_scalar_service_body_flagged() {
        let yaml = "services:\n  broken: just-a-string\n";
        let doc = parse_compose(yaml).unwrap();
        assert!(!doc.service("broken").unwrap().is_mapping);
    }
}

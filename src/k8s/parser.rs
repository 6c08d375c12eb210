//! Kubernetes document model builder.
//!
//! A manifest file may contain several resources separated by `---`. Each
//! document is parsed into a normalized [`Resource`] carrying the fields the
//! rules care about, with 1-indexed absolute line positions recovered by
//! scanning the raw source of its own chunk.

use std::collections::BTreeMap;
use yaml_rust2::{yaml::Hash, Yaml, YamlLoader};

use crate::error::ParseError;

/// Workload kinds that wrap a pod template.
pub const WORKLOAD_KINDS: &[&str] = &[
    "Deployment",
    "StatefulSet",
    "DaemonSet",
    "ReplicaSet",
    "Job",
    "CronJob",
];

/// A value paired with its absolute source line (1-indexed).
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

/// One environment variable of a container.
#[derive(Debug, Clone, Default)]
pub struct EnvVarDef {
    pub name: String,
    /// Literal value, if given inline.
    pub value: Option<String>,
    /// ConfigMap referenced via valueFrom.configMapKeyRef.
    pub config_map_ref: Option<String>,
    /// Secret referenced via valueFrom.secretKeyRef.
    pub secret_ref: Option<String>,
    pub line: u32,
}

/// A pod volume and what it is backed by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeSource {
    ConfigMap(String),
    Secret(String),
    PersistentVolumeClaim(String),
    HostPath(String),
    Other,
}

#[derive(Debug, Clone)]
pub struct VolumeDef {
    pub name: String,
    pub source: VolumeSource,
    pub line: u32,
}

/// Normalized view of one container (or init container).
#[derive(Debug, Clone, Default)]
pub struct ContainerDef {
    pub name: String,
    pub line: u32,
    pub image: Option<Located<String>>,
    pub image_pull_policy: Option<String>,
    pub ports: Vec<Located<i64>>,
    pub env: Vec<EnvVarDef>,
    /// ConfigMaps pulled in whole via envFrom.
    pub env_from_config_maps: Vec<Located<String>>,
    /// Secrets pulled in whole via envFrom.
    pub env_from_secrets: Vec<Located<String>>,

    pub privileged: Option<bool>,
    pub allow_privilege_escalation: Option<bool>,
    pub run_as_non_root: Option<bool>,
    pub read_only_root_filesystem: Option<bool>,
    pub added_capabilities: Vec<String>,

    pub has_liveness_probe: bool,
    pub has_readiness_probe: bool,
    pub has_resource_requests: bool,
    pub has_resource_limits: bool,
}

/// Reference target of an HPA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleTarget {
    pub kind: String,
    pub name: String,
    pub line: u32,
}

/// One Kubernetes resource, normalized across kinds.
///
/// Workload kinds have their pod template flattened into the pod-level
/// fields; `Pod` resources fill the same fields from their own spec.
#[derive(Debug, Clone, Default)]
pub struct Resource {
    pub api_version: Option<String>,
    pub kind: Option<String>,
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub labels: BTreeMap<String, String>,
    /// Absolute line of the document's first content line.
    pub line: u32,
    pub end_line: u32,

    pub replicas: Option<i64>,
    /// spec.selector.matchLabels for workloads and PDBs, spec.selector for
    /// Services.
    pub selector: BTreeMap<String, String>,
    /// Labels on the pod template (workloads only).
    pub template_labels: BTreeMap<String, String>,
    /// Deployment spec.strategy.type, when set.
    pub strategy: Option<String>,
    pub has_pod_anti_affinity: bool,

    pub containers: Vec<ContainerDef>,
    pub volumes: Vec<VolumeDef>,
    pub host_network: bool,
    pub host_pid: bool,
    pub host_ipc: bool,
    pub automount_service_account_token: Option<bool>,
    pub service_account_name: Option<String>,
    /// Pod-level runAsNonRoot, inherited by containers that do not set it.
    pub pod_run_as_non_root: Option<bool>,

    /// Service spec.ports entries (the `port` field).
    pub service_ports: Vec<Located<i64>>,
    /// Service names referenced by Ingress backends.
    pub ingress_backends: Vec<Located<String>>,
    /// HPA scaleTargetRef.
    pub scale_target: Option<ScaleTarget>,
}

impl Resource {
    pub fn is_workload(&self) -> bool {
        matches!(&self.kind, Some(k) if WORKLOAD_KINDS.contains(&k.as_str()) || k == "Pod")
    }

    pub fn has_pod_spec(&self) -> bool {
        !self.containers.is_empty()
            || self.host_network
            || self.host_pid
            || self.host_ipc
            || !self.volumes.is_empty()
    }

    /// Effective runAsNonRoot for a container, honoring pod-level default.
    pub fn effective_run_as_non_root(&self, container: &ContainerDef) -> Option<bool> {
        container.run_as_non_root.or(self.pod_run_as_non_root)
    }

    /// Display name used in violation messages.
    pub fn display(&self) -> String {
        format!(
            "{}/{}",
            self.kind.as_deref().unwrap_or("?"),
            self.name.as_deref().unwrap_or("?")
        )
    }
}

/// The full multi-document manifest, the unit rules run over.
#[derive(Debug, Clone, Default)]
pub struct K8sDocument {
    pub resources: Vec<Resource>,
    pub source: String,
}

/// Parse a (possibly multi-document) Kubernetes manifest.
pub fn parse_k8s(content: &str) -> Result<K8sDocument, ParseError> {
    let mut resources = Vec::new();

    for chunk in split_documents(content) {
        if chunk.text.trim().is_empty() {
            continue;
        }
        let docs =
            YamlLoader::load_from_str(&chunk.text).map_err(|e| ParseError::Yaml(e.to_string()))?;
        for doc in docs {
            if let Yaml::Hash(hash) = doc {
                resources.push(parse_resource(&hash, &chunk));
            }
        }
    }

    if resources.is_empty() {
        return Err(ParseError::EmptyDocument);
    }

    Ok(K8sDocument {
        resources,
        source: content.to_string(),
    })
}

/// One `---`-delimited document with its position in the whole file.
struct Chunk {
    /// 0-indexed line offset of the chunk's first line in the file.
    offset: usize,
    text: String,
}

impl Chunk {
    fn first_content_line(&self) -> u32 {
        for (idx, line) in self.text.lines().enumerate() {
            let trimmed = line.trim();
            if !trimmed.is_empty() && !trimmed.starts_with('#') {
                return (self.offset + idx + 1) as u32;
            }
        }
        (self.offset + 1) as u32
    }

    fn last_line(&self) -> u32 {
        (self.offset + self.text.lines().count().max(1)) as u32
    }

    /// Absolute line of the first chunk line at or after `from` (absolute,
    /// 1-indexed) satisfying the predicate.
    fn find_line(&self, from: u32, pred: impl Fn(&str) -> bool) -> Option<u32> {
        for (idx, line) in self.text.lines().enumerate() {
            let absolute = (self.offset + idx + 1) as u32;
            if absolute < from {
                continue;
            }
            let trimmed = line.trim();
            if !trimmed.is_empty() && !trimmed.starts_with('#') && pred(trimmed) {
                return Some(absolute);
            }
        }
        None
    }

    /// Line of a `key: value` (or bare `key:`) occurrence.
    fn key_line(&self, from: u32, key: &str) -> Option<u32> {
        let prefix = format!("{}:", key);
        self.find_line(from, |t| {
            t == prefix || t.starts_with(&format!("{} ", prefix)) || t.starts_with(&prefix)
        })
    }
}

fn split_documents(content: &str) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut start = 0usize;

    for (idx, line) in content.lines().enumerate() {
        if line.trim() == "---" {
            chunks.push(Chunk {
                offset: start,
                text: std::mem::take(&mut current),
            });
            start = idx + 1;
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    chunks.push(Chunk {
        offset: start,
        text: current,
    });
    chunks
}

fn get<'a>(hash: &'a Hash, key: &str) -> Option<&'a Yaml> {
    hash.get(&Yaml::String(key.to_string()))
}

fn get_hash<'a>(hash: &'a Hash, key: &str) -> Option<&'a Hash> {
    match get(hash, key) {
        Some(Yaml::Hash(h)) => Some(h),
        _ => None,
    }
}

fn get_vec<'a>(hash: &'a Hash, key: &str) -> Option<&'a Vec<Yaml>> {
    match get(hash, key) {
        Some(Yaml::Array(a)) => Some(a),
        _ => None,
    }
}

fn get_string(hash: &Hash, key: &str) -> Option<String> {
    match get(hash, key) {
        Some(Yaml::String(s)) => Some(s.clone()),
        Some(Yaml::Integer(i)) => Some(i.to_string()),
        Some(Yaml::Real(r)) => Some(r.clone()),
        _ => None,
    }
}

fn get_i64(hash: &Hash, key: &str) -> Option<i64> {
    match get(hash, key) {
        Some(Yaml::Integer(i)) => Some(*i),
        Some(Yaml::String(s)) => s.parse().ok(),
        _ => None,
    }
}

fn get_bool(hash: &Hash, key: &str) -> Option<bool> {
    match get(hash, key) {
        Some(Yaml::Boolean(b)) => Some(*b),
        _ => None,
    }
}

fn string_map(yaml: Option<&Yaml>) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    if let Some(Yaml::Hash(h)) = yaml {
        for (k, v) in h {
            if let Yaml::String(key) = k {
                map.insert(key.clone(), scalar_to_string(v));
            }
        }
    }
    map
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

fn parse_resource(hash: &Hash, chunk: &Chunk) -> Resource {
    let mut resource = Resource {
        api_version: get_string(hash, "apiVersion"),
        kind: get_string(hash, "kind"),
        line: chunk.first_content_line(),
        end_line: chunk.last_line(),
        ..Default::default()
    };

    if let Some(metadata) = get_hash(hash, "metadata") {
        resource.name = get_string(metadata, "name");
        resource.namespace = get_string(metadata, "namespace");
        resource.labels = string_map(get(metadata, "labels"));
    }

    let Some(spec) = get_hash(hash, "spec") else {
        return resource;
    };

    resource.replicas = get_i64(spec, "replicas");

    match resource.kind.as_deref() {
        Some("Service") => {
            resource.selector = string_map(get(spec, "selector"));
            if let Some(ports) = get_vec(spec, "ports") {
                let mut cursor = resource.line;
                for port_yaml in ports {
                    if let Yaml::Hash(p) = port_yaml {
                        if let Some(port) = get_i64(p, "port") {
                            let line = chunk
                                .find_line(cursor, |t| {
                                    t.contains("port:") && t.contains(&port.to_string())
                                })
                                .unwrap_or(resource.line);
                            resource.service_ports.push(Located::new(port, line));
                            cursor = line;
                        }
                    }
                }
            }
        }
        Some("Ingress") => {
            parse_ingress_backends(spec, chunk, &mut resource);
        }
        Some("HorizontalPodAutoscaler") => {
            if let Some(target) = get_hash(spec, "scaleTargetRef") {
                if let (Some(kind), Some(name)) =
                    (get_string(target, "kind"), get_string(target, "name"))
                {
                    let line = chunk
                        .key_line(resource.line, "scaleTargetRef")
                        .unwrap_or(resource.line);
                    resource.scale_target = Some(ScaleTarget { kind, name, line });
                }
            }
        }
        Some("PodDisruptionBudget") => {
            if let Some(selector) = get_hash(spec, "selector") {
                resource.selector = string_map(get(selector, "matchLabels"));
            }
        }
        Some("Pod") => {
            parse_pod_spec(spec, chunk, resource.line, &mut resource);
        }
        Some(kind) if WORKLOAD_KINDS.contains(&kind) => {
            if let Some(selector) = get_hash(spec, "selector") {
                resource.selector = string_map(get(selector, "matchLabels"));
            }
            if let Some(strategy) = get_hash(spec, "strategy") {
                resource.strategy = get_string(strategy, "type");
            }

            let template = if kind == "CronJob" {
                get_hash(spec, "jobTemplate")
                    .and_then(|jt| get_hash(jt, "spec"))
                    .and_then(|s| get_hash(s, "template"))
            } else {
                get_hash(spec, "template")
            };

            if let Some(template) = template {
                if let Some(meta) = get_hash(template, "metadata") {
                    resource.template_labels = string_map(get(meta, "labels"));
                }
                if let Some(pod_spec) = get_hash(template, "spec") {
                    let pod_line = chunk
                        .key_line(resource.line, "template")
                        .unwrap_or(resource.line);
                    parse_pod_spec(pod_spec, chunk, pod_line, &mut resource);
                }
            }
        }
        _ => {}
    }

    resource
}

fn parse_ingress_backends(spec: &Hash, chunk: &Chunk, resource: &mut Resource) {
    let start = resource.line;
    let mut push_backend = |backend: &Hash| {
        if let Some(service) = get_hash(backend, "service") {
            if let Some(name) = get_string(service, "name") {
                let line = chunk
                    .find_line(start, |t| t.contains(&format!("name: {}", name)))
                    .unwrap_or(start);
                resource.ingress_backends.push(Located::new(name, line));
            }
        }
    };

    if let Some(default_backend) = get_hash(spec, "defaultBackend") {
        push_backend(default_backend);
    }
    if let Some(rules) = get_vec(spec, "rules") {
        for rule in rules {
            let Yaml::Hash(rule) = rule else { continue };
            let Some(http) = get_hash(rule, "http") else { continue };
            let Some(paths) = get_vec(http, "paths") else { continue };
            for path in paths {
                let Yaml::Hash(path) = path else { continue };
                if let Some(backend) = get_hash(path, "backend") {
                    push_backend(backend);
                }
            }
        }
    }
}

fn parse_pod_spec(pod: &Hash, chunk: &Chunk, pod_line: u32, resource: &mut Resource) {
    resource.host_network = get_bool(pod, "hostNetwork").unwrap_or(false);
    resource.host_pid = get_bool(pod, "hostPID").unwrap_or(false);
    resource.host_ipc = get_bool(pod, "hostIPC").unwrap_or(false);
    resource.automount_service_account_token = get_bool(pod, "automountServiceAccountToken");
    resource.service_account_name = get_string(pod, "serviceAccountName");

    if let Some(sc) = get_hash(pod, "securityContext") {
        resource.pod_run_as_non_root = get_bool(sc, "runAsNonRoot");
    }

    if let Some(affinity) = get_hash(pod, "affinity") {
        resource.has_pod_anti_affinity = get(affinity, "podAntiAffinity").is_some();
    }

    if let Some(volumes) = get_vec(pod, "volumes") {
        let volumes_line = chunk.key_line(pod_line, "volumes").unwrap_or(pod_line);
        for volume in volumes {
            let Yaml::Hash(volume) = volume else { continue };
            let Some(name) = get_string(volume, "name") else { continue };
            let source = if let Some(cm) = get_hash(volume, "configMap") {
                get_string(cm, "name").map(VolumeSource::ConfigMap)
            } else if let Some(secret) = get_hash(volume, "secret") {
                get_string(secret, "secretName").map(VolumeSource::Secret)
            } else if let Some(pvc) = get_hash(volume, "persistentVolumeClaim") {
                get_string(pvc, "claimName").map(VolumeSource::PersistentVolumeClaim)
            } else if let Some(host) = get_hash(volume, "hostPath") {
                get_string(host, "path").map(VolumeSource::HostPath)
            } else {
                Some(VolumeSource::Other)
            };
            let line = chunk
                .find_line(volumes_line, |t| t.contains(&format!("name: {}", name)))
                .unwrap_or(volumes_line);
            resource.volumes.push(VolumeDef {
                name,
                source: source.unwrap_or(VolumeSource::Other),
                line,
            });
        }
    }

    let mut cursor = pod_line;
    for key in ["initContainers", "containers"] {
        if let Some(containers) = get_vec(pod, key) {
            for container in containers {
                if let Yaml::Hash(container) = container {
                    let parsed = parse_container(container, chunk, cursor);
                    cursor = parsed.line.max(cursor);
                    resource.containers.push(parsed);
                }
            }
        }
    }
}

fn parse_container(container: &Hash, chunk: &Chunk, from: u32) -> ContainerDef {
    let name = get_string(container, "name").unwrap_or_default();
    let image = get_string(container, "image");

    // Locate the container by its image line, the most distinctive marker;
    // fall back to the name line.
    let line = image
        .as_ref()
        .and_then(|img| chunk.find_line(from, |t| t.contains(&format!("image: {}", img))))
        .or_else(|| chunk.find_line(from, |t| t.contains(&format!("name: {}", name))))
        .unwrap_or(from);

    let mut def = ContainerDef {
        name,
        line,
        image: image.map(|img| {
            let img_line = chunk
                .find_line(line, |t| t.contains(&format!("image: {}", img)))
                .unwrap_or(line);
            Located::new(img, img_line)
        }),
        image_pull_policy: get_string(container, "imagePullPolicy"),
        ..Default::default()
    };

    if let Some(ports) = get_vec(container, "ports") {
        for port in ports {
            if let Yaml::Hash(port) = port {
                if let Some(container_port) = get_i64(port, "containerPort") {
                    let port_line = chunk
                        .find_line(line, |t| {
                            t.contains("containerPort:") && t.contains(&container_port.to_string())
                        })
                        .unwrap_or(line);
                    def.ports.push(Located::new(container_port, port_line));
                }
            }
        }
    }

    if let Some(env) = get_vec(container, "env") {
        let env_line = chunk.key_line(line, "env").unwrap_or(line);
        for entry in env {
            let Yaml::Hash(entry) = entry else { continue };
            let Some(var_name) = get_string(entry, "name") else { continue };
            let mut var = EnvVarDef {
                line: chunk
                    .find_line(env_line, |t| t.contains(&format!("name: {}", var_name)))
                    .unwrap_or(env_line),
                name: var_name,
                value: get_string(entry, "value"),
                ..Default::default()
            };
            if let Some(value_from) = get_hash(entry, "valueFrom") {
                if let Some(cm) = get_hash(value_from, "configMapKeyRef") {
                    var.config_map_ref = get_string(cm, "name");
                }
                if let Some(secret) = get_hash(value_from, "secretKeyRef") {
                    var.secret_ref = get_string(secret, "name");
                }
            }
            def.env.push(var);
        }
    }

    if let Some(env_from) = get_vec(container, "envFrom") {
        let env_from_line = chunk.key_line(line, "envFrom").unwrap_or(line);
        for entry in env_from {
            let Yaml::Hash(entry) = entry else { continue };
            if let Some(cm) = get_hash(entry, "configMapRef") {
                if let Some(name) = get_string(cm, "name") {
                    def.env_from_config_maps.push(Located::new(name, env_from_line));
                }
            }
            if let Some(secret) = get_hash(entry, "secretRef") {
                if let Some(name) = get_string(secret, "name") {
                    def.env_from_secrets.push(Located::new(name, env_from_line));
                }
            }
        }
    }

    if let Some(sc) = get_hash(container, "securityContext") {
        def.privileged = get_bool(sc, "privileged");
        def.allow_privilege_escalation = get_bool(sc, "allowPrivilegeEscalation");
        def.run_as_non_root = get_bool(sc, "runAsNonRoot");
        def.read_only_root_filesystem = get_bool(sc, "readOnlyRootFilesystem");
        if let Some(caps) = get_hash(sc, "capabilities") {
            if let Some(add) = get_vec(caps, "add") {
                for cap in add {
                    if let Yaml::String(cap) = cap {
                        def.added_capabilities.push(cap.clone());
                    }
                }
            }
        }
    }

    def.has_liveness_probe = get(container, "livenessProbe").is_some();
    def.has_readiness_probe = get(container, "readinessProbe").is_some();
    if let Some(resources) = get_hash(container, "resources") {
        def.has_resource_requests = get(resources, "requests").is_some();
        def.has_resource_limits = get(resources, "limits").is_some();
    }

    def
}

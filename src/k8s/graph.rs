//! Cross-resource dependency graph.
//!
//! Built once per analysis from the parsed resource list. Edges are inferred
//! references between resources in the same manifest; references whose target
//! does not exist become dangling entries instead of edges, and reference
//! cycles are reported distinctly.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::k8s::parser::{Resource, VolumeSource, WORKLOAD_KINDS};

/// Why one resource points at another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    /// Service selector matches the workload's pod labels.
    Selects,
    /// Ingress backend routes to the Service.
    Routes,
    /// Container or volume reads a ConfigMap.
    ReadsConfig,
    /// Container or volume reads a Secret.
    ReadsSecret,
    /// Pod volume claims a PersistentVolumeClaim.
    ClaimsStorage,
    /// HorizontalPodAutoscaler scales the workload.
    Scales,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    /// Index into `nodes`.
    pub from: usize,
    pub to: usize,
    pub kind: EdgeKind,
}

/// A reference whose target does not exist in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingRef {
    pub from: usize,
    pub target_kind: String,
    pub target_name: String,
    pub line: u32,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ResourceGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    /// Strongly connected reference groups (size >= 2) and self-references.
    pub cycles: Vec<Vec<usize>>,
    pub dangling: Vec<DanglingRef>,
}

impl ResourceGraph {
    pub fn edges_from(&self, node: usize) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |e| e.from == node)
    }
}

fn effective_namespace(resource: &Resource) -> String {
    resource.namespace.clone().unwrap_or_else(|| "default".to_string())
}

/// True when every selector pair appears in the label set.
fn selector_matches(selector: &BTreeMap<String, String>, labels: &BTreeMap<String, String>) -> bool {
    !selector.is_empty() && selector.iter().all(|(k, v)| labels.get(k) == Some(v))
}

/// Build the reference graph over all resources of one manifest.
pub fn build_graph(resources: &[Resource]) -> ResourceGraph {
    let mut graph = ResourceGraph {
        nodes: resources
            .iter()
            .map(|r| GraphNode {
                kind: r.kind.clone().unwrap_or_default(),
                name: r.name.clone().unwrap_or_default(),
                namespace: effective_namespace(r),
            })
            .collect(),
        ..Default::default()
    };

    // Lookup of (kind, namespace, name) -> node index. Later duplicates win
    // the lookup slot; the duplicate itself is a lint violation, not a graph
    // concern.
    let mut index: BTreeMap<(String, String, String), usize> = BTreeMap::new();
    for (idx, node) in graph.nodes.iter().enumerate() {
        index.insert((node.kind.clone(), node.namespace.clone(), node.name.clone()), idx);
    }

    for (from, resource) in resources.iter().enumerate() {
        let ns = effective_namespace(resource);
        let link = |graph: &mut ResourceGraph, kind: &str, name: &str, edge_kind: EdgeKind, line: u32| {
            let target = index
                .get(&(kind.to_string(), ns.clone(), name.to_string()))
                .copied();
            match target {
                Some(to) => graph.edges.push(GraphEdge { from, to, kind: edge_kind }),
                None => graph.dangling.push(DanglingRef {
                    from,
                    target_kind: kind.to_string(),
                    target_name: name.to_string(),
                    line,
                }),
            }
        };

        match resource.kind.as_deref() {
            Some("Service") => {
                for (to, target) in resources.iter().enumerate() {
                    if to == from || effective_namespace(target) != ns {
                        continue;
                    }
                    let labels = match target.kind.as_deref() {
                        Some("Pod") => &target.labels,
                        Some(k) if WORKLOAD_KINDS.contains(&k) => &target.template_labels,
                        _ => continue,
                    };
                    if selector_matches(&resource.selector, labels) {
                        graph.edges.push(GraphEdge { from, to, kind: EdgeKind::Selects });
                    }
                }
            }
            Some("Ingress") => {
                for backend in &resource.ingress_backends {
                    link(&mut graph, "Service", &backend.value, EdgeKind::Routes, backend.line);
                }
            }
            Some("HorizontalPodAutoscaler") => {
                if let Some(target) = &resource.scale_target {
                    link(&mut graph, &target.kind, &target.name, EdgeKind::Scales, target.line);
                }
            }
            _ => {}
        }

        for container in &resource.containers {
            for env in &container.env {
                if let Some(cm) = &env.config_map_ref {
                    link(&mut graph, "ConfigMap", cm, EdgeKind::ReadsConfig, env.line);
                }
                if let Some(secret) = &env.secret_ref {
                    link(&mut graph, "Secret", secret, EdgeKind::ReadsSecret, env.line);
                }
            }
            for cm in &container.env_from_config_maps {
                link(&mut graph, "ConfigMap", &cm.value, EdgeKind::ReadsConfig, cm.line);
            }
            for secret in &container.env_from_secrets {
                link(&mut graph, "Secret", &secret.value, EdgeKind::ReadsSecret, secret.line);
            }
        }

        for volume in &resource.volumes {
            match &volume.source {
                VolumeSource::ConfigMap(name) => {
                    link(&mut graph, "ConfigMap", name, EdgeKind::ReadsConfig, volume.line)
                }
                VolumeSource::Secret(name) => {
                    link(&mut graph, "Secret", name, EdgeKind::ReadsSecret, volume.line)
                }
                VolumeSource::PersistentVolumeClaim(name) => {
                    link(&mut graph, "PersistentVolumeClaim", name, EdgeKind::ClaimsStorage, volume.line)
                }
                VolumeSource::HostPath(_) | VolumeSource::Other => {}
            }
        }
    }

    graph.edges.dedup();
    graph.cycles = find_cycles(graph.nodes.len(), &graph.edges);
    graph
}

/// Strongly connected components of size >= 2, plus self-referencing nodes.
/// Iterative Tarjan; node count is small but recursion depth is unbounded
/// in principle.
fn find_cycles(node_count: usize, edges: &[GraphEdge]) -> Vec<Vec<usize>> {
    let mut adjacency = vec![Vec::new(); node_count];
    for edge in edges {
        adjacency[edge.from].push(edge.to);
    }

    const UNVISITED: usize = usize::MAX;
    let mut index = vec![UNVISITED; node_count];
    let mut lowlink = vec![0usize; node_count];
    let mut on_stack = vec![false; node_count];
    let mut stack = Vec::new();
    let mut next_index = 0usize;
    let mut cycles = Vec::new();

    for start in 0..node_count {
        if index[start] != UNVISITED {
            continue;
        }

        let mut work: Vec<(usize, usize)> = vec![(start, 0)];
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
                if index[w] == UNVISITED {
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
                    let self_loop =
                        component.len() == 1 && adjacency[v].contains(&v);
                    if component.len() >= 2 || self_loop {
                        cycles.push(component);
                    }
                }
            }
        }
    }

    cycles.sort();
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::parser::parse_k8s;

    const STACK: &str = r#"apiVersion: apps/v1
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
          env:
            - name: DB_URL
              valueFrom:
                configMapKeyRef:
                  name: web-config
                  key: url
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
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: web-config
data:
  url: postgres://db
---
apiVersion: networking.k8s.io/v1
kind: Ingress
metadata:
  name: edge
spec:
  rules:
    - http:
        paths:
          - path: /
            pathType: Prefix
            backend:
              service:
                name: web
                port:
                  number: 80
"#;

    fn edge_kinds(graph: &ResourceGraph) -> Vec<EdgeKind> {
        graph.edges.iter().map(|e| e.kind).collect()
    }

    #[test]
    fn test_full_stack_edges() {
        let doc = parse_k8s(STACK).unwrap();
        let graph = build_graph(&doc.resources);

        assert_eq!(graph.nodes.len(), 4);
        assert!(graph.dangling.is_empty());
        assert!(graph.cycles.is_empty());

        let kinds = edge_kinds(&graph);
        assert!(kinds.contains(&EdgeKind::Selects));
        assert!(kinds.contains(&EdgeKind::ReadsConfig));
        assert!(kinds.contains(&EdgeKind::Routes));

        // Ingress (node 3) routes to Service (node 1).
        let route = graph.edges.iter().find(|e| e.kind == EdgeKind::Routes).unwrap();
        assert_eq!(route.from, 3);
        assert_eq!(route.to, 1);
    }

    #[test]
    fn test_dangling_refs_do_not_become_edges() {
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
            name: missing-config
"#;
        let doc = parse_k8s(yaml).unwrap();
        let graph = build_graph(&doc.resources);
        assert!(graph.edges.is_empty());
        assert_eq!(graph.dangling.len(), 1);
        assert_eq!(graph.dangling[0].target_kind, "ConfigMap");
        assert_eq!(graph.dangling[0].target_name, "missing-config");
    }

    #[test]
    fn test_selector_must_be_full_subset() {
        let yaml = r#"apiVersion: v1
kind: Service
metadata:
  name: web
spec:
  selector:
    app: web
    tier: frontend
  ports:
    - port: 80
---
apiVersion: apps/v1
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
"#;
        let doc = parse_k8s(yaml).unwrap();
        let graph = build_graph(&doc.resources);
        // `tier: frontend` is not on the pod template, so nothing matches.
        assert!(graph.edges.iter().all(|e| e.kind != EdgeKind::Selects));
    }

    #[test]
    fn test_namespaces_isolate_references() {
        let yaml = r#"apiVersion: v1
kind: Pod
metadata:
  name: app
  namespace: prod
spec:
  containers:
    - name: app
      image: app:1
  volumes:
    - name: conf
      configMap:
        name: app-config
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: app-config
  namespace: staging
data: {}
"#;
        let doc = parse_k8s(yaml).unwrap();
        let graph = build_graph(&doc.resources);
        assert!(graph.edges.is_empty());
        assert_eq!(graph.dangling.len(), 1);
    }

    #[test]
    fn test_tarjan_reports_cycle() {
        // Synthetic edges; manifests rarely cycle but the detector must not
        // hang or miss one when they do.
        let edges = vec![
            GraphEdge { from: 0, to: 1, kind: EdgeKind::Routes },
            GraphEdge { from: 1, to: 2, kind: EdgeKind::Routes },
            GraphEdge { from: 2, to: 0, kind: EdgeKind::Routes },
            GraphEdge { from: 2, to: 3, kind: EdgeKind::Routes },
        ];
        let cycles = find_cycles(4, &edges);
        assert_eq!(cycles, vec![vec![0, 1, 2]]);
    }
}

//! End-to-end Kubernetes analysis scenarios.

use manifest_lint::k8s::{self, build_graph, parse_k8s};
use manifest_lint::score::Grade;
use manifest_lint::types::Severity;

const STACK: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
  namespace: prod
  labels:
    app.kubernetes.io/name: web
spec:
  replicas: 2
  selector:
    matchLabels:
      app: web
  template:
    metadata:
      labels:
        app: web
    spec:
      serviceAccountName: web
      automountServiceAccountToken: false
      affinity:
        podAntiAffinity:
          preferredDuringSchedulingIgnoredDuringExecution: []
      containers:
        - name: web
          image: nginx:1.25
          ports:
            - containerPort: 80
          securityContext:
            runAsNonRoot: true
            readOnlyRootFilesystem: true
          livenessProbe:
            httpGet:
              path: /healthz
              port: 80
          readinessProbe:
            httpGet:
              path: /ready
              port: 80
          resources:
            requests:
              memory: 64Mi
            limits:
              memory: 128Mi
---
apiVersion: v1
kind: Service
metadata:
  name: web
  namespace: prod
spec:
  selector:
    app: web
  ports:
    - port: 80
---
apiVersion: policy/v1
kind: PodDisruptionBudget
metadata:
  name: web-pdb
  namespace: prod
spec:
  minAvailable: 1
  selector:
    matchLabels:
      app: web
"#;

#[test]
fn hardened_stack_has_no_errors_or_warnings() {
    let report = k8s::analyze(STACK);
    assert!(report.parse_success);
    assert_eq!(
        report.count_by_severity(Severity::Error),
        0,
        "errors: {:?}",
        report.violations.iter().map(|v| v.code.as_str()).collect::<Vec<_>>()
    );
    assert_eq!(report.count_by_severity(Severity::Warning), 0);
    assert!(report.score.overall >= 90, "overall was {}", report.score.overall);
}

#[test]
fn graph_connects_the_stack() {
    let doc = parse_k8s(STACK).unwrap();
    let graph = build_graph(&doc.resources);
    assert_eq!(graph.nodes.len(), 3);
    assert!(graph.dangling.is_empty());
    assert!(graph.cycles.is_empty());
    // Service -> Deployment via selector.
    assert!(graph.edges.iter().any(|e| e.from == 1 && e.to == 0));
}

#[test]
fn broken_references_surface_as_cross_resource_errors() {
    let yaml = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: api
spec:
  selector:
    matchLabels:
      app: api
  template:
    metadata:
      labels:
        app: api
    spec:
      containers:
        - name: api
          image: api:3.1
          envFrom:
            - configMapRef:
                name: api-config
            - secretRef:
                name: api-secrets
---
apiVersion: v1
kind: Service
metadata:
  name: api
spec:
  selector:
    app: backend
  ports:
    - port: 8080
"#;
    let report = k8s::analyze(yaml);
    let codes: Vec<&str> = report.violations.iter().map(|v| v.code.as_str()).collect();
    assert!(codes.contains(&"KA-C001"), "selector matches nothing: {codes:?}");
    assert!(codes.contains(&"KA-C003"), "missing ConfigMap: {codes:?}");
    assert!(codes.contains(&"KA-C004"), "missing Secret: {codes:?}");
}

#[test]
fn selector_template_mismatch_is_schema_error() {
    let yaml = r#"apiVersion: apps/v1
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
        app: frontend
    spec:
      containers:
        - name: web
          image: nginx:1.25
"#;
    let report = k8s::analyze(yaml);
    let hit = report
        .violations
        .iter()
        .find(|v| v.code.as_str() == "KA-Y008")
        .expect("selector mismatch must fire");
    assert_eq!(hit.severity, Severity::Error);
}

#[test]
fn empty_manifest_is_parse_failure() {
    let report = k8s::analyze("---\n---\n");
    assert!(!report.parse_success);
    assert_eq!(report.score.grade, Grade::F);
}

#[test]
fn duplicate_resources_flagged_once() {
    let yaml = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cfg\ndata: {}\n---\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cfg\ndata: {}\n";
    let report = k8s::analyze(yaml);
    let dups: Vec<_> = report
        .violations
        .iter()
        .filter(|v| v.code.as_str() == "KA-C007")
        .collect();
    assert_eq!(dups.len(), 1);
}

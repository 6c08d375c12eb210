//! Built-in sample manifests.
//!
//! Used by the CLI when no file is given and as the fallback document when a
//! shared-state fragment fails to decode. Deliberately imperfect: they carry
//! a handful of findings so a first run demonstrates the tool.

/// Docker Compose sample.
pub const COMPOSE_SAMPLE: &str = r#"services:
  web:
    image: nginx:latest
    ports:
      - "8080:80"
    depends_on:
      - api
  api:
    image: example/api:2.3
    environment:
      DB_HOST: db
    depends_on:
      - db
  db:
    image: postgres:15
    volumes:
      - db-data:/var/lib/postgresql/data

volumes:
  db-data: {}
"#;

/// Kubernetes sample.
pub const K8S_SAMPLE: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
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
      containers:
        - name: web
          image: nginx:latest
          ports:
            - containerPort: 80
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

/// Sample for a tool.
pub fn for_tool(tool: crate::types::Tool) -> &'static str {
    match tool {
        crate::types::Tool::Compose => COMPOSE_SAMPLE,
        crate::types::Tool::K8s => K8S_SAMPLE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compose, k8s};

    #[test]
    fn test_samples_parse_and_have_findings() {
        let compose_report = compose::analyze(COMPOSE_SAMPLE);
        assert!(compose_report.parse_success);
        assert!(compose_report.has_violations());

        let k8s_report = k8s::analyze(K8S_SAMPLE);
        assert!(k8s_report.parse_success);
        assert!(k8s_report.has_violations());
    }
}

//! Kubernetes rule registries.
//!
//! Same shape as the Compose side: hand-authored lint rules (security,
//! reliability, best-practice, cross-resource) plus the fixed schema
//! conformance set, assembled once at startup.
//!
//! Rule code letters: S security, R reliability, B best-practice,
//! C cross-resource, Y schema.

pub mod best_practice;
pub mod cross_resource;
pub mod reliability;
pub mod schema;
pub mod security;

use once_cell::sync::Lazy;

use crate::engine::Registry;
use crate::k8s::parser::K8sDocument;

/// The Kubernetes rule registry (custom + schema).
pub static REGISTRY: Lazy<Registry<K8sDocument>> = Lazy::new(|| {
    let mut custom = Vec::new();
    custom.extend(security::rules());
    custom.extend(reliability::rules());
    custom.extend(best_practice::rules());
    custom.extend(cross_resource::rules());
    Registry::new(custom, schema::rules())
});

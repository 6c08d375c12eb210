//! Compose rule registries.
//!
//! Two parallel registries: the hand-authored lint rules (security,
//! semantic, best-practice, style) and the fixed schema conformance rules.
//! Each rule is static metadata plus a pure check function over the whole
//! document model; the catalog is assembled once at startup.
//!
//! Rule code letters: S security, M semantic, B best-practice, T style,
//! Y schema.

pub mod best_practice;
pub mod schema;
pub mod security;
pub mod semantic;
pub mod style;

use once_cell::sync::Lazy;

use crate::compose::parser::ComposeDocument;
use crate::engine::Registry;

/// The Compose rule registry (custom + schema).
pub static REGISTRY: Lazy<Registry<ComposeDocument>> = Lazy::new(|| {
    let mut custom = Vec::new();
    custom.extend(security::rules());
    custom.extend(semantic::rules());
    custom.extend(best_practice::rules());
    custom.extend(style::rules());
    Registry::new(custom, schema::rules())
});

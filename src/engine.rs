//! Generic rule engine.
//!
//! A registry is a flat catalog of independent rules; each rule is data
//! (its [`RuleMetadata`]) plus a pure evaluation function over the whole
//! document model. The engine runs every rule, isolates per-rule failures,
//! and sorts the combined violation list so the output is independent of
//! registry order.

use std::panic::{self, AssertUnwindSafe};

use crate::types::{EnrichedViolation, RuleCode, RuleMetadata, Violation};

/// A single validation rule over a document model `D`.
///
/// Rules receive the full document (not one service/resource) because many
/// checks are cross-resource: duplicate host ports, circular `depends_on`,
/// dangling references. Rules never observe another rule's output.
pub struct Rule<D> {
    pub meta: RuleMetadata,
    pub check: fn(&D) -> Vec<Violation>,
}

impl<D> Rule<D> {
    pub const fn new(meta: RuleMetadata, check: fn(&D) -> Vec<Violation>) -> Self {
        Self { meta, check }
    }

    pub fn code(&self) -> RuleCode {
        RuleCode::new(self.meta.code)
    }
}

/// The two parallel registries for one tool: hand-authored lint rules
/// (custom) and formal schema conformance rules (schema).
///
/// Metadata lookup consults custom first, then schema. Callers that find
/// neither fall back to safe placeholder metadata via
/// [`EnrichedViolation::fallback`].
pub struct Registry<D> {
    custom: Vec<Rule<D>>,
    schema: Vec<Rule<D>>,
}

impl<D> Registry<D> {
    /// Assemble a registry. Panics on duplicate rule codes; registries are
    /// static data built once at startup, so a collision is a programming
    /// error caught by the registry tests.
    pub fn new(custom: Vec<Rule<D>>, schema: Vec<Rule<D>>) -> Self {
        let mut seen = std::collections::HashSet::new();
        for rule in custom.iter().chain(schema.iter()) {
            assert!(
                seen.insert(rule.meta.code),
                "duplicate rule code: {}",
                rule.meta.code
            );
        }
        Self { custom, schema }
    }

    /// All rules, custom then schema.
    pub fn all(&self) -> impl Iterator<Item = &Rule<D>> {
        self.custom.iter().chain(self.schema.iter())
    }

    /// Number of rules across both registries.
    pub fn len(&self) -> usize {
        self.custom.len() + self.schema.len()
    }

    pub fn is_empty(&self) -> bool {
        self.custom.is_empty() && self.schema.is_empty()
    }

    /// Look up rule metadata by code: custom first, then schema.
    pub fn metadata_for(&self, code: &RuleCode) -> Option<&RuleMetadata> {
        self.custom
            .iter()
            .map(|r| &r.meta)
            .find(|m| m.code == code.as_str())
            .or_else(|| {
                self.schema
                    .iter()
                    .map(|r| &r.meta)
                    .find(|m| m.code == code.as_str())
            })
    }

    /// Merge a violation with its metadata, falling back to safe
    /// placeholders when the code is unknown to both registries.
    pub fn enrich(&self, violation: Violation) -> EnrichedViolation {
        match self.metadata_for(&violation.code) {
            Some(meta) => EnrichedViolation::from_metadata(violation, meta),
            None => EnrichedViolation::fallback(violation),
        }
    }
}

/// Run every rule in the registry against the document.
///
/// A rule that panics while evaluating contributes zero violations and does
/// not abort the other rules. The result is sorted by (line, column, code)
/// so it is a pure function of the document, not of registry order.
pub fn run_rules<D>(doc: &D, registry: &Registry<D>) -> Vec<Violation> {
    let mut violations = Vec::new();

    for rule in registry.all() {
        let check = rule.check;
        match panic::catch_unwind(AssertUnwindSafe(|| check(doc))) {
            Ok(found) => violations.extend(found),
            Err(_) => {
                log::warn!("rule {} panicked during evaluation, skipping", rule.meta.code);
            }
        }
    }

    violations.sort();
    violations
}

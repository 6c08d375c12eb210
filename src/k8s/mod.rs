//! Kubernetes manifest validation: multi-document model, dependency graph,
//! rule catalog, analysis entry point.

pub mod graph;
pub mod parser;
pub mod rules;

pub use graph::{build_graph, ResourceGraph};
pub use parser::{parse_k8s, K8sDocument, Resource};
pub use rules::REGISTRY;

use crate::engine::run_rules;
use crate::report::AnalysisReport;
use crate::score::{score, ScoreResult, K8S_WEIGHTS};
use crate::types::Tool;

/// Analyze a Kubernetes manifest end to end: parse all documents, run every
/// rule, enrich and score.
pub fn analyze(content: &str) -> AnalysisReport {
    let doc = match parse_k8s(content) {
        Ok(doc) => doc,
        Err(err) => {
            return AnalysisReport {
                tool: Tool::K8s,
                parse_success: false,
                parse_errors: vec![err.to_string()],
                violations: Vec::new(),
                score: ScoreResult::zeroed(&K8S_WEIGHTS),
            };
        }
    };

    let violations = run_rules(&doc, &REGISTRY);
    let score = score(&violations, &REGISTRY, &K8S_WEIGHTS);
    let violations = violations.into_iter().map(|v| REGISTRY.enrich(v)).collect();

    AnalysisReport {
        tool: Tool::K8s,
        parse_success: true,
        parse_errors: Vec::new(),
        violations,
        score,
    }
}

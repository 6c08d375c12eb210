//! # manifest-lint
//!
//! Validation and scoring engine for Docker Compose files and Kubernetes
//! manifests. Each tool parses raw YAML into a line-annotated document
//! model, runs a catalog of independent rules over it, and produces a
//! weighted quality score with a letter grade.
//!
//! ## Example
//!
//! ```rust
//! use manifest_lint::compose;
//!
//! let report = compose::analyze("services:\n  web:\n    image: nginx:1.25\n");
//! assert!(report.parse_success);
//! println!("{}/100 ({})", report.score.overall, report.score.grade);
//! ```

pub mod badge;
pub mod cli;
pub mod compose;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod formatter;
pub mod k8s;
pub mod prompt;
pub mod report;
pub mod samples;
pub mod score;
pub mod session;
pub mod share;
pub mod types;

pub use error::{ParseError, Result, ShareError};
pub use report::AnalysisReport;
pub use score::{Grade, ScoreResult};
pub use session::Session;
pub use types::{Category, EnrichedViolation, Severity, Tool, Violation};

/// The current version of the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Error types for manifest-lint.

use thiserror::Error;

/// Errors produced while parsing a manifest into the document model.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("YAML parse error: {0}")]
    Yaml(String),
    #[error("Empty document")]
    EmptyDocument,
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),
}

/// Errors produced by the shareable-state codec.
#[derive(Debug, Error)]
pub enum ShareError {
    #[error("compression failed: {0}")]
    Compression(#[from] std::io::Error),
}

/// Crate-level result alias.
pub type Result<T, E = ParseError> = std::result::Result<T, E>;

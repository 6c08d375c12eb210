//! Diagnostics adapter: maps violations to editor-displayable ranges.
//!
//! Violations are computed against a snapshot of the document; by the time
//! they are rendered the buffer may have been edited. Every position is
//! therefore clamped against the current document so a stale violation can
//! never produce an out-of-range span. Stale positions degrade to pointing
//! at the last line rather than crashing range computation.

use serde::{Deserialize, Serialize};

use crate::types::{EnrichedViolation, Severity};

/// A position inside the current document: 1-indexed line, 0-indexed column
/// offset within that line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorPos {
    pub line: u32,
    pub column: u32,
}

/// An editor-displayable diagnostic range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorRange {
    pub from: EditorPos,
    pub to: EditorPos,
    pub severity: Severity,
    pub message: String,
}

/// Compute editor ranges for a violation list against the current
/// (possibly edited) document text.
pub fn editor_ranges(violations: &[EnrichedViolation], current: &str) -> Vec<EditorRange> {
    let lines: Vec<&str> = current.lines().collect();
    let line_count = lines.len().max(1) as u32;
    let len_of = |line: u32| -> u32 {
        lines
            .get((line - 1) as usize)
            .map(|l| l.chars().count() as u32)
            .unwrap_or(0)
    };

    violations
        .iter()
        .map(|v| {
            let from_line = v.line.clamp(1, line_count);
            // 1-indexed column -> 0-indexed offset, clamped into the line.
            let from_col = v.column.saturating_sub(1).min(len_of(from_line));

            let to_line = match v.end_line {
                Some(end) => end.clamp(from_line, line_count),
                None => from_line,
            };
            let to_col = len_of(to_line);

            EditorRange {
                from: EditorPos {
                    line: from_line,
                    column: from_col,
                },
                to: EditorPos {
                    line: to_line,
                    column: to_col,
                },
                severity: v.severity,
                message: v.message.clone(),
            }
        })
        .collect()
}

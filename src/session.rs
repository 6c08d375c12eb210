//! Analysis session store.
//!
//! An explicit state container for the editor-facing lifecycle: the current
//! document text, the stale flag, and the last result. Initialized empty at
//! session start, written only by the document-change path and the analyze
//! trigger. Analysis runs against a snapshot of the text, so edits during a
//! run cannot corrupt it; a re-entrant analyze simply overwrites the
//! previous result (last-write-wins, no queueing).

use crate::report::AnalysisReport;

/// Mutable per-session state.
#[derive(Debug, Default)]
pub struct Session {
    text: String,
    stale: bool,
    last: Option<AnalysisReport>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current document text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the last result predates the most recent edit.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Last analysis result, possibly stale.
    pub fn last_result(&self) -> Option<&AnalysisReport> {
        self.last.as_ref()
    }

    /// Replace the document text. Marks any existing result stale.
    pub fn edit(&mut self, text: impl Into<String>) {
        self.text = text.into();
        if self.last.is_some() {
            self.stale = true;
        }
    }

    /// Run an analysis against a snapshot of the current text, store the
    /// result, and clear the stale flag.
    pub fn analyze(&mut self, run: impl FnOnce(&str) -> AnalysisReport) -> &AnalysisReport {
        let snapshot = self.text.clone();
        let report = run(&snapshot);
        self.stale = false;
        self.last.insert(report)
    }

    /// Discard the document and any result.
    pub fn clear(&mut self) {
        self.text.clear();
        self.stale = false;
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{COMPOSE_WEIGHTS, ScoreResult};
    use crate::types::Tool;

    fn dummy_report(_text: &str) -> AnalysisReport {
        AnalysisReport {
            tool: Tool::Compose,
            parse_success: true,
            parse_errors: Vec::new(),
            violations: Vec::new(),
            score: ScoreResult::perfect(&COMPOSE_WEIGHTS),
        }
    }

    #[test]
    fn test_initial_state_empty() {
        let session = Session::new();
        assert_eq!(session.text(), "");
        assert!(!session.is_stale());
        assert!(session.last_result().is_none());
    }

    #[test]
    fn test_edit_before_first_analysis_not_stale() {
        let mut session = Session::new();
        session.edit("services: {}");
        assert!(!session.is_stale());
    }

    #[test]
    fn test_edit_after_analysis_marks_stale() {
        let mut session = Session::new();
        session.edit("services: {}");
        session.analyze(dummy_report);
        assert!(!session.is_stale());

        session.edit("services:\n  web: {}");
        assert!(session.is_stale());
        // stale result is still available for display
        assert!(session.last_result().is_some());
    }

    #[test]
    fn test_reanalyze_clears_stale_and_overwrites() {
        let mut session = Session::new();
        session.edit("a: 1");
        session.analyze(dummy_report);
        session.edit("a: 2");
        assert!(session.is_stale());

        session.analyze(dummy_report);
        assert!(!session.is_stale());
    }

    #[test]
    fn test_analyze_sees_snapshot_of_current_text() {
        let mut session = Session::new();
        session.edit("snapshot-me");
        session.analyze(|text| {
            assert_eq!(text, "snapshot-me");
            dummy_report(text)
        });
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut session = Session::new();
        session.edit("x: 1");
        session.analyze(dummy_report);
        session.clear();
        assert_eq!(session.text(), "");
        assert!(session.last_result().is_none());
        assert!(!session.is_stale());
    }
}

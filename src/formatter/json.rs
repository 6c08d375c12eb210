//! Machine-readable JSON report.

use crate::report::AnalysisReport;

/// Serialize the full report as pretty-printed JSON.
///
/// `AnalysisReport` contains only serializable leaf types, so
/// serialization cannot fail; a defect in the derives would surface in
/// tests, not at a caller.
pub fn format(report: &AnalysisReport) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|e| {
        log::error!("report serialization failed: {e}");
        String::from("{}")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose;

    #[test]
    fn test_json_round_trips() {
        let report = compose::analyze("services:\n  web:\n    image: nginx\n    privileged: true\n");
        let json = format(&report);

        let parsed: AnalysisReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
    }

    #[test]
    fn test_json_shape() {
        let report = compose::analyze("services:\n  web:\n    image: nginx:1.25\n");
        let value: serde_json::Value = serde_json::from_str(&format(&report)).unwrap();
        assert_eq!(value["tool"], "compose");
        assert_eq!(value["parse_success"], true);
        assert!(value["score"]["overall"].is_u64());
        assert!(value["violations"].is_array());
    }
}

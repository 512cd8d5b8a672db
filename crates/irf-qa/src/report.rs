//! Human-readable QA summaries

use std::fmt::Write as _;

use crate::engine::{QaFinding, QaOutcome};

fn label(finding: &QaFinding) -> &'static str {
    if finding.passed {
        "PASS"
    } else if finding.is_blocking_failure() {
        "FAIL"
    } else {
        "WARN"
    }
}

/// Render one section's QA outcome as text
#[must_use]
pub fn format_qa_report(heading: &str, outcome: &QaOutcome) -> String {
    let mut out = String::new();
    let status = if outcome.passed() { "PASS" } else { "NEEDS REVIEW" };
    let _ = writeln!(out, "## {heading}");
    let _ = writeln!(out, "Overall: {status}");
    for finding in &outcome.findings {
        let _ = writeln!(
            out,
            "  [{}] {}: {}",
            label(finding),
            finding.rule_name,
            finding.message
        );
    }
    let blocking = outcome.blocking_failures().count();
    let warnings = outcome.warnings().count();
    let _ = writeln!(out, "{blocking} blocking, {warnings} warnings");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use irf_schema::Severity;

    fn finding(name: &str, severity: Severity, passed: bool) -> QaFinding {
        QaFinding {
            rule_name: name.into(),
            severity,
            passed,
            message: "detail".into(),
        }
    }

    #[test]
    fn labels_each_finding() {
        let outcome = QaOutcome {
            findings: vec![
                finding("min_words", Severity::Blocking, true),
                finding("min_citations", Severity::Blocking, false),
                finding("no_hype_language", Severity::Warning, false),
            ],
        };
        let text = format_qa_report("Section 1: Executive Summary", &outcome);
        assert!(text.contains("Overall: NEEDS REVIEW"));
        assert!(text.contains("[PASS] min_words"));
        assert!(text.contains("[FAIL] min_citations"));
        assert!(text.contains("[WARN] no_hype_language"));
        assert!(text.ends_with("1 blocking, 1 warnings\n"));
    }
}

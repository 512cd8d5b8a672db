//! Rule evaluation
//!
//! Evaluation is pure: the same content, definition and inputs always give
//! the same findings, in rule order.

use irf_schema::{Predicate, QaRule, SectionDefinition, SectionInputs, Severity};
use serde::{Deserialize, Serialize};

use crate::text;

/// Result of one rule against one piece of content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaFinding {
    /// Name of the rule that produced this finding
    pub rule_name: String,
    /// Severity copied from the rule
    pub severity: Severity,
    /// Whether the check passed
    pub passed: bool,
    /// Human-readable detail
    pub message: String,
}

impl QaFinding {
    /// Failed finding from a blocking rule
    #[inline]
    #[must_use]
    pub fn is_blocking_failure(&self) -> bool {
        !self.passed && self.severity == Severity::Blocking
    }

    /// Failed finding from a warning rule
    #[inline]
    #[must_use]
    pub fn is_warning(&self) -> bool {
        !self.passed && self.severity == Severity::Warning
    }
}

/// Ordered findings for one section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaOutcome {
    /// One finding per rule, in rule order
    pub findings: Vec<QaFinding>,
}

impl QaOutcome {
    /// True when no blocking rule failed
    #[must_use]
    pub fn passed(&self) -> bool {
        !self.findings.iter().any(QaFinding::is_blocking_failure)
    }

    /// Failed blocking findings
    pub fn blocking_failures(&self) -> impl Iterator<Item = &QaFinding> {
        self.findings.iter().filter(|f| f.is_blocking_failure())
    }

    /// Failed warning findings
    pub fn warnings(&self) -> impl Iterator<Item = &QaFinding> {
        self.findings.iter().filter(|f| f.is_warning())
    }
}

/// Evaluate every rule of `definition` against `content`
#[must_use]
pub fn run_qa(content: &str, definition: &SectionDefinition, inputs: &SectionInputs) -> QaOutcome {
    QaOutcome {
        findings: definition
            .qa_rules
            .iter()
            .map(|rule| evaluate(rule, content, inputs))
            .collect(),
    }
}

/// Evaluate one rule
#[must_use]
pub fn evaluate(rule: &QaRule, content: &str, inputs: &SectionInputs) -> QaFinding {
    let (passed, message) = check(&rule.predicate, content, inputs);
    QaFinding {
        rule_name: rule.name.clone(),
        severity: rule.severity,
        passed,
        message,
    }
}

fn check(predicate: &Predicate, content: &str, inputs: &SectionInputs) -> (bool, String) {
    match predicate {
        Predicate::MinWords { min } => {
            let words = text::word_count(content);
            (words >= *min as usize, format!("{words} words (minimum {min})"))
        }
        Predicate::MaxWords { max } => {
            let words = text::word_count(content);
            (words <= *max as usize, format!("{words} words (maximum {max})"))
        }
        Predicate::MinCitations { min } => {
            let n = text::citation_markers(content).len();
            (n >= *min as usize, format!("{n} citations (minimum {min})"))
        }
        Predicate::MaxCitations { max } => {
            let n = text::citation_markers(content).len();
            (n <= *max as usize, format!("{n} citations (maximum {max})"))
        }
        Predicate::NoPlaceholders { tokens } => {
            let lower = content.to_lowercase();
            let found: Vec<&str> = tokens
                .iter()
                .filter(|t| lower.contains(&t.to_lowercase()))
                .map(String::as_str)
                .collect();
            if found.is_empty() {
                (true, "no placeholder tokens".into())
            } else {
                (false, format!("placeholder tokens present: {}", found.join(", ")))
            }
        }
        Predicate::NoHypeLanguage { words } => {
            let found: Vec<&str> = words
                .iter()
                .filter(|w| text::contains_word(content, w))
                .map(String::as_str)
                .collect();
            if found.is_empty() {
                (true, "no hype language".into())
            } else {
                (false, format!("hype language: {}", found.join(", ")))
            }
        }
        Predicate::NoFirstPerson => {
            let hits = text::first_person_hits(content);
            if hits.is_empty() {
                (true, "no first-person language".into())
            } else {
                (false, format!("{} first-person references", hits.len()))
            }
        }
        Predicate::RequiresTable => {
            if text::has_table(content) {
                (true, "table present".into())
            } else {
                (false, "no Markdown table found".into())
            }
        }
        Predicate::MentionsAny { terms } => {
            if terms.is_empty() {
                return (false, "rule lists no terms".into());
            }
            let lower = content.to_lowercase();
            match terms.iter().find(|t| lower.contains(&t.to_lowercase())) {
                Some(term) => (true, format!("mentions `{term}`")),
                None => (false, format!("none of: {}", terms.join(", "))),
            }
        }
        Predicate::MinMetrics { min } => {
            let n = text::metric_count(content);
            (n >= *min as usize, format!("{n} specific metrics (minimum {min})"))
        }
        Predicate::FiguresMatchInputs {
            keys,
            tolerance_pct,
        } => check_figures(keys, *tolerance_pct, content, inputs),
    }
}

fn check_figures(
    keys: &[String],
    tolerance_pct: f64,
    content: &str,
    inputs: &SectionInputs,
) -> (bool, String) {
    let expected: Vec<(&str, f64)> = keys
        .iter()
        .filter_map(|k| Some((k.as_str(), inputs.get(k)?.as_number()?)))
        .collect();
    if expected.is_empty() {
        return (true, "no numeric inputs supplied; not applicable".into());
    }

    let found = text::figures(content);
    let mismatched: Vec<&str> = expected
        .iter()
        .filter(|(_, value)| !found.iter().any(|f| f.matches(*value, tolerance_pct)))
        .map(|(key, _)| *key)
        .collect();

    if mismatched.is_empty() {
        (true, format!("{} input figures matched", expected.len()))
    } else {
        (
            false,
            format!("figures not found in content: {}", mismatched.join(", ")),
        )
    }
}

//! Declarative QA rules
//!
//! A [`QaRule`] pairs a [`Predicate`] with a [`Severity`]. Rules are plain
//! data so frameworks can carry their own catalogue; evaluation lives in the
//! `irf-qa` crate.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Whether a failing rule blocks the section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Failure moves the section to `qa_failed`
    Blocking,
    /// Failure is recorded only
    Warning,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Blocking => f.write_str("blocking"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// Tokens that mark unfinished text
pub const DEFAULT_PLACEHOLDER_TOKENS: &[&str] =
    &["TODO", "TBD", "XXX", "[INSERT", "lorem ipsum", "{{"];

/// Promotional vocabulary unsuitable for institutional research
pub const DEFAULT_HYPE_WORDS: &[&str] = &[
    "massive",
    "incredible",
    "game-changing",
    "revolutionary",
    "unprecedented",
    "explosive",
    "skyrocket",
    "moonshot",
    "disruptive",
    "phenomenal",
    "extraordinary",
    "jaw-dropping",
];

fn default_placeholder_tokens() -> Vec<String> {
    DEFAULT_PLACEHOLDER_TOKENS.iter().map(|s| (*s).to_string()).collect()
}

fn default_hype_words() -> Vec<String> {
    DEFAULT_HYPE_WORDS.iter().map(|s| (*s).to_string()).collect()
}

const fn default_tolerance_pct() -> f64 {
    1.0
}

/// Check performed against section content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    /// At least `min` words
    MinWords {
        /// Lower bound
        min: u32,
    },
    /// At most `max` words
    MaxWords {
        /// Upper bound
        max: u32,
    },
    /// At least `min` inline `[N]` citation markers
    MinCitations {
        /// Lower bound
        min: u32,
    },
    /// At most `max` inline citation markers
    MaxCitations {
        /// Upper bound
        max: u32,
    },
    /// None of the listed tokens appear (case-insensitive)
    NoPlaceholders {
        /// Tokens to reject
        #[serde(default = "default_placeholder_tokens")]
        tokens: Vec<String>,
    },
    /// None of the listed words appear as whole words (case-insensitive)
    NoHypeLanguage {
        /// Words to reject
        #[serde(default = "default_hype_words")]
        words: Vec<String>,
    },
    /// No first-person pronouns
    NoFirstPerson,
    /// At least one Markdown table
    RequiresTable,
    /// At least one of the terms appears (case-insensitive)
    MentionsAny {
        /// Candidate terms
        terms: Vec<String>,
    },
    /// At least `min` concrete figures (amounts, percentages, grouped numbers)
    MinMetrics {
        /// Lower bound
        min: u32,
    },
    /// Each listed numeric input that was supplied appears in the content
    FiguresMatchInputs {
        /// Input keys to cross-check
        keys: Vec<String>,
        /// Allowed relative deviation, in percent
        #[serde(default = "default_tolerance_pct")]
        tolerance_pct: f64,
    },
}

impl Predicate {
    /// Placeholder check with the default token list
    #[must_use]
    pub fn no_placeholders() -> Self {
        Predicate::NoPlaceholders {
            tokens: default_placeholder_tokens(),
        }
    }

    /// Hype check with the default word list
    #[must_use]
    pub fn no_hype_language() -> Self {
        Predicate::NoHypeLanguage {
            words: default_hype_words(),
        }
    }

    /// Short kind label, matching the serialized `kind` tag
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Predicate::MinWords { .. } => "min_words",
            Predicate::MaxWords { .. } => "max_words",
            Predicate::MinCitations { .. } => "min_citations",
            Predicate::MaxCitations { .. } => "max_citations",
            Predicate::NoPlaceholders { .. } => "no_placeholders",
            Predicate::NoHypeLanguage { .. } => "no_hype_language",
            Predicate::NoFirstPerson => "no_first_person",
            Predicate::RequiresTable => "requires_table",
            Predicate::MentionsAny { .. } => "mentions_any",
            Predicate::MinMetrics { .. } => "min_metrics",
            Predicate::FiguresMatchInputs { .. } => "figures_match_inputs",
        }
    }
}

/// A named QA rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaRule {
    /// Rule name, reported in findings
    pub name: String,
    /// Check to run
    pub predicate: Predicate,
    /// Effect of a failure
    pub severity: Severity,
}

impl QaRule {
    /// Rule whose failure blocks the section
    pub fn blocking(name: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            name: name.into(),
            predicate,
            severity: Severity::Blocking,
        }
    }

    /// Rule whose failure is only recorded
    pub fn warning(name: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            name: name.into(),
            predicate,
            severity: Severity::Warning,
        }
    }

    /// Whether a failure blocks the section
    #[inline]
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Blocking
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicate_serializes_with_kind_tag() {
        let rule = QaRule::blocking("citations", Predicate::MinCitations { min: 1 });
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["predicate"]["kind"], "min_citations");
        assert_eq!(json["predicate"]["min"], 1);
        assert_eq!(json["severity"], "blocking");
    }

    #[test]
    fn list_predicates_fill_defaults() {
        let p: Predicate = serde_json::from_str(r#"{"kind":"no_placeholders"}"#).unwrap();
        assert_eq!(p, Predicate::no_placeholders());
        let p: Predicate =
            serde_json::from_str(r#"{"kind":"figures_match_inputs","keys":["revenue"]}"#).unwrap();
        assert_eq!(
            p,
            Predicate::FiguresMatchInputs {
                keys: vec!["revenue".into()],
                tolerance_pct: 1.0
            }
        );
    }

    #[test]
    fn unit_predicates_deserialize() {
        let p: Predicate = serde_json::from_str(r#"{"kind":"no_first_person"}"#).unwrap();
        assert_eq!(p.kind(), "no_first_person");
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(serde_json::from_str::<Predicate>(r#"{"kind":"vibes"}"#).is_err());
    }
}

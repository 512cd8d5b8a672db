//! Text measurements used by QA predicates

use once_cell::sync::Lazy;
use pulldown_cmark::{Event, Options, Parser, Tag};
use regex::Regex;

static CITATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(\d+)\]").expect("static regex"));

static METRIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$[\d,.]+[BMK]?|\d+\.?\d*%|\d{1,3}(?:,\d{3})+").expect("static regex")
});

static FIRST_PERSON_I: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bI\b").expect("static regex"));

// Mixed-case forms only so that "US" (the country) is not flagged.
static FIRST_PERSON_OTHER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:[Ww]e|WE|[Oo]ur|OUR|[Mm]y|MY|[Uu]s)\b").expect("static regex")
});

static FIGURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)([-\x{2212}(])?\$?(\d{1,3}(?:,\d{3})+|\d+)(\.\d+)?\s*(%|billion\b|million\b|thousand\b|bn\b|[kmb]\b)?(\))?",
    )
    .expect("static regex")
});

/// Whitespace-separated word count
#[must_use]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Every `[N]` citation marker, in order of appearance
#[must_use]
pub fn citation_markers(text: &str) -> Vec<u32> {
    CITATION
        .captures_iter(text)
        .filter_map(|c| c.get(1)?.as_str().parse().ok())
        .collect()
}

/// Number of concrete figures: dollar amounts, percentages, grouped numbers
#[must_use]
pub fn metric_count(text: &str) -> usize {
    METRIC.find_iter(text).count()
}

/// Whether the Markdown contains at least one table
#[must_use]
pub fn has_table(text: &str) -> bool {
    Parser::new_ext(text, Options::ENABLE_TABLES)
        .any(|event| matches!(event, Event::Start(Tag::Table(_))))
}

/// First-person pronouns found in the text
#[must_use]
pub fn first_person_hits(text: &str) -> Vec<String> {
    FIRST_PERSON_I
        .find_iter(text)
        .chain(FIRST_PERSON_OTHER.find_iter(text))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Whole-word, case-insensitive occurrences of `word`
#[must_use]
pub fn contains_word(text: &str, word: &str) -> bool {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(word)))
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}

/// Numeric figures with magnitude words and suffixes applied
///
/// `$1.2B`, `1.2 billion` and `1,200 million` all yield `1.2e9`;
/// percentages keep their face value and are flagged. A leading minus sign
/// or accounting parentheses (`($0.3B)`) make the figure negative; a hyphen
/// directly after a letter or digit (`2024-25`, `Q3-5%`) does not.
#[must_use]
pub fn figures(text: &str) -> Vec<Figure> {
    FIGURE
        .captures_iter(text)
        .filter_map(|c| {
            let integer: String = c.get(2)?.as_str().chars().filter(|ch| *ch != ',').collect();
            let fraction = c.get(3).map_or("", |m| m.as_str());
            let value: f64 = format!("{integer}{fraction}").parse().ok()?;
            let negative = c.get(1).is_some_and(|sign| match sign.as_str() {
                "(" => c.get(5).is_some(),
                _ => !text[..sign.start()]
                    .chars()
                    .next_back()
                    .is_some_and(char::is_alphanumeric),
            });
            let value = if negative { -value } else { value };
            let unit = c.get(4).map(|m| m.as_str().to_ascii_lowercase());
            let (scale, percent) = match unit.as_deref() {
                Some("%") => (1.0, true),
                Some("k" | "thousand") => (1e3, false),
                Some("m" | "million") => (1e6, false),
                Some("b" | "bn" | "billion") => (1e9, false),
                _ => (1.0, false),
            };
            Some(Figure {
                value: value * scale,
                percent,
            })
        })
        .collect()
}

/// A number read from prose
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Figure {
    /// Scaled value
    pub value: f64,
    /// Written as a percentage
    pub percent: bool,
}

impl Figure {
    /// Whether this figure matches `expected` within `tolerance_pct` percent
    ///
    /// Fractions (`0.453`) also match percentages written as `45.3%`.
    #[must_use]
    pub fn matches(&self, expected: f64, tolerance_pct: f64) -> bool {
        let close = |a: f64, b: f64| {
            let tolerance = (tolerance_pct / 100.0) * b.abs();
            (a - b).abs() <= tolerance.max(f64::EPSILON)
        };
        close(self.value, expected)
            || (self.percent && expected.abs() < 1.0 && close(self.value, expected * 100.0))
    }
}

//! Externally supplied section inputs

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// One input value: free text or a number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    /// Numeric figure (revenue, margin, multiple...)
    Number(f64),
    /// Opaque text (peer table, news digest...)
    Text(String),
}

impl InputValue {
    /// Numeric value, parsing text such as `$1.2B` or `45.3%` when possible
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            InputValue::Number(n) => Some(*n),
            InputValue::Text(t) => parse_figure(t),
        }
    }
}

impl Display for InputValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            InputValue::Number(n) => write!(f, "{n}"),
            InputValue::Text(t) => f.write_str(t),
        }
    }
}

impl From<&str> for InputValue {
    fn from(s: &str) -> Self {
        InputValue::Text(s.to_string())
    }
}

impl From<String> for InputValue {
    fn from(s: String) -> Self {
        InputValue::Text(s)
    }
}

impl From<f64> for InputValue {
    fn from(n: f64) -> Self {
        InputValue::Number(n)
    }
}

/// Parse a figure like `$1,234.5M`, `12.5%`, `3.1B` into its plain value
///
/// Magnitude suffixes scale the value (`K` = 1e3, `M` = 1e6, `B` = 1e9);
/// percentages keep their face value.
#[must_use]
pub fn parse_figure(text: &str) -> Option<f64> {
    let trimmed = text.trim().trim_start_matches('$').trim_end_matches('%');
    let (digits, scale) = match trimmed.chars().last()? {
        'K' | 'k' => (&trimmed[..trimmed.len() - 1], 1e3),
        'M' | 'm' => (&trimmed[..trimmed.len() - 1], 1e6),
        'B' | 'b' => (&trimmed[..trimmed.len() - 1], 1e9),
        _ => (trimmed, 1.0),
    };
    let cleaned: String = digits.chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().map(|v| v * scale)
}

/// Input key to value, for one ticker and quarter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionInputs(BTreeMap<String, InputValue>);

impl SectionInputs {
    /// Empty input set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a value
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<InputValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Add or replace a value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<InputValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up a value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&InputValue> {
        self.0.get(key)
    }

    /// Keys from `required` that have no value
    #[must_use]
    pub fn missing<'a>(&self, required: &'a BTreeSet<String>) -> Vec<&'a str> {
        required
            .iter()
            .filter(|k| !self.0.contains_key(k.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Subset restricted to the given keys
    #[must_use]
    pub fn select(&self, keys: &BTreeSet<String>) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(k, _)| keys.contains(*k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &InputValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, InputValue)> for SectionInputs {
    fn from_iter<T: IntoIterator<Item = (String, InputValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

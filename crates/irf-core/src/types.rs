//! Core types for IRF reports
//!
//! - Report identity: [`ReportId`], [`Ticker`], [`Quarter`]
//! - Session tuning: [`ReportConfig`], [`DependencyPolicy`]
//! - Citation sources: [`Reference`]

use std::fmt::{self, Display};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::ReportError;
use crate::retry::RetryPolicy;

/// Unique report identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReportId(pub Ulid);

impl ReportId {
    /// Generate new report ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ReportId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ReportId {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| ReportError::InvalidArgument(format!("report id `{s}`: {e}")))
    }
}

/// Exchange ticker, normalized to upper case
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    /// Longest accepted ticker
    pub const MAX_LEN: usize = 10;

    /// Validate and upper-case a ticker (`nvda`, `BRK.B`, `RDS-A`)
    ///
    /// # Errors
    /// Returns [`ReportError::InvalidArgument`] for empty, over-long or
    /// non-alphanumeric input
    pub fn parse(raw: &str) -> Result<Self, ReportError> {
        let ticker = raw.trim().to_ascii_uppercase();
        let valid = !ticker.is_empty()
            && ticker.len() <= Self::MAX_LEN
            && ticker.starts_with(|c: char| c.is_ascii_alphanumeric())
            && ticker
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
        if valid {
            Ok(Self(ticker))
        } else {
            Err(ReportError::InvalidArgument(format!("invalid ticker `{raw}`")))
        }
    }

    /// Ticker text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Ticker {
    type Error = ReportError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Ticker> for String {
    fn from(t: Ticker) -> Self {
        t.0
    }
}

impl Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reporting period label, e.g. `Q3 2025`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Quarter(String);

impl Quarter {
    /// Accept any non-blank label, collapsing inner whitespace
    ///
    /// # Errors
    /// Returns [`ReportError::InvalidArgument`] for blank input
    pub fn parse(raw: &str) -> Result<Self, ReportError> {
        let label = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if label.is_empty() {
            Err(ReportError::InvalidArgument("quarter must not be blank".into()))
        } else {
            Ok(Self(label))
        }
    }

    /// Label text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File-name friendly form (`Q3 2025` -> `Q3_2025`)
    #[must_use]
    pub fn slug(&self) -> String {
        self.0
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    }
}

impl TryFrom<String> for Quarter {
    type Error = ReportError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Quarter> for String {
    fn from(q: Quarter) -> Self {
        q.0
    }
}

impl Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Minimum upstream status a dependent section may build on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyPolicy {
    /// Generated, QA-passed or approved content
    #[default]
    Generated,
    /// QA-passed or approved content only
    QaPassed,
    /// Approved content only
    Approved,
}

impl FromStr for DependencyPolicy {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generated" => Ok(Self::Generated),
            "qa_passed" => Ok(Self::QaPassed),
            "approved" => Ok(Self::Approved),
            other => Err(ReportError::InvalidArgument(format!(
                "unknown dependency policy `{other}`"
            ))),
        }
    }
}

/// One entry in a report's reference list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Number used by `[n]` markers
    pub id: u32,
    /// Document title
    pub title: String,
    /// Publisher or filer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Location of the document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Retry schedule for transient generation failures
    pub retry: RetryPolicy,
    /// Deadline for a single generation call
    pub call_timeout: Duration,
    /// Sections generated at once by `generate_report`
    pub max_concurrency: usize,
    /// Minimum upstream status for dependents
    pub dependency_policy: DependencyPolicy,
    /// Run QA right after each successful generation
    pub auto_qa: bool,
}

impl ReportConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With retry policy
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// With per-call timeout
    #[inline]
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// With concurrency bound (at least 1)
    #[inline]
    #[must_use]
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    /// With dependency policy
    #[inline]
    #[must_use]
    pub fn with_dependency_policy(mut self, policy: DependencyPolicy) -> Self {
        self.dependency_policy = policy;
        self
    }

    /// With automatic QA after generation
    #[inline]
    #[must_use]
    pub fn with_auto_qa(mut self, auto_qa: bool) -> Self {
        self.auto_qa = auto_qa;
        self
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            call_timeout: Duration::from_secs(120),
            max_concurrency: 2,
            dependency_policy: DependencyPolicy::Generated,
            auto_qa: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_normalizes_case() {
        assert_eq!(Ticker::parse(" nvda ").unwrap().as_str(), "NVDA");
        assert_eq!(Ticker::parse("brk.b").unwrap().as_str(), "BRK.B");
        assert!(Ticker::parse("").is_err());
        assert!(Ticker::parse("-ABC").is_err());
        assert!(Ticker::parse("TOOLONGTICKER").is_err());
        assert!(Ticker::parse("AB CD").is_err());
    }

    #[test]
    fn quarter_slug() {
        let q = Quarter::parse("  Q3   2025 ").unwrap();
        assert_eq!(q.as_str(), "Q3 2025");
        assert_eq!(q.slug(), "Q3_2025");
        assert!(Quarter::parse("   ").is_err());
    }

    #[test]
    fn serde_revalidates() {
        let t: Ticker = serde_json::from_str("\"amd\"").unwrap();
        assert_eq!(t.as_str(), "AMD");
        assert!(serde_json::from_str::<Ticker>("\"\"").is_err());
    }

    #[test]
    fn report_id_parses_own_display() {
        let id = ReportId::new();
        assert_eq!(id.to_string().parse::<ReportId>().unwrap(), id);
        assert!("nope".parse::<ReportId>().is_err());
    }

    #[test]
    fn concurrency_floor() {
        assert_eq!(ReportConfig::new().with_max_concurrency(0).max_concurrency, 1);
    }
}

//! Section status and per-section state

use std::fmt::{self, Display};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use irf_qa::QaFinding;
use serde::{Deserialize, Serialize};

use crate::types::DependencyPolicy;

/// Lifecycle position of one section
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    /// Never generated
    Pending,
    /// A generation call is in flight
    Generating,
    /// Content present, QA not yet run
    Generated,
    /// QA ran with no blocking failures
    QaPassed,
    /// QA ran and a blocking rule failed
    QaFailed,
    /// Generation failed with a non-transient error
    Failed,
    /// Content predates an upstream regeneration
    Stale,
    /// Reviewed and signed off
    Approved,
}

impl SectionStatus {
    /// Every status, in lifecycle order
    pub const ALL: [SectionStatus; 8] = [
        Self::Pending,
        Self::Generating,
        Self::Generated,
        Self::QaPassed,
        Self::QaFailed,
        Self::Failed,
        Self::Stale,
        Self::Approved,
    ];

    /// Stable snake_case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Generating => "generating",
            Self::Generated => "generated",
            Self::QaPassed => "qa_passed",
            Self::QaFailed => "qa_failed",
            Self::Failed => "failed",
            Self::Stale => "stale",
            Self::Approved => "approved",
        }
    }

    /// May be generated without `force`
    #[inline]
    #[must_use]
    pub fn needs_generation(self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Stale | Self::QaFailed | Self::Failed
        )
    }

    /// Holds current content that QA can be run against
    #[inline]
    #[must_use]
    pub fn accepts_qa(self) -> bool {
        matches!(self, Self::Generated | Self::QaPassed | Self::QaFailed)
    }

    /// Counts as done for report completeness
    #[inline]
    #[must_use]
    pub fn is_complete(self) -> bool {
        matches!(self, Self::Generated | Self::QaPassed | Self::Approved)
    }

    /// Can serve as upstream context for a dependent under `policy`
    #[must_use]
    pub fn satisfies(self, policy: DependencyPolicy) -> bool {
        match policy {
            DependencyPolicy::Generated => self.is_complete(),
            DependencyPolicy::QaPassed => matches!(self, Self::QaPassed | Self::Approved),
            DependencyPolicy::Approved => self == Self::Approved,
        }
    }
}

impl Display for SectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown section status `{s}`"))
    }
}

/// Everything tracked about one section of one report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionState {
    /// Lifecycle position
    pub status: SectionStatus,
    /// Latest generated text
    pub content: Option<String>,
    /// Findings from the latest QA run
    #[serde(default)]
    pub qa_findings: Vec<QaFinding>,
    /// When `content` was produced
    pub generated_at: Option<DateTime<Utc>>,
    /// Transient failures since the last successful generation
    #[serde(default)]
    pub retry_count: u32,
    /// Content is out of date relative to an upstream section
    #[serde(default)]
    pub stale: bool,
    /// Message of the last non-transient failure
    #[serde(default)]
    pub last_error: Option<String>,
    /// Last change to this record
    pub updated_at: DateTime<Utc>,
}

impl SectionState {
    /// Fresh pending section
    #[must_use]
    pub fn pending() -> Self {
        Self {
            status: SectionStatus::Pending,
            content: None,
            qa_findings: Vec::new(),
            generated_at: None,
            retry_count: 0,
            stale: false,
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    /// Word count of the current content
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.content.as_deref().map_or(0, irf_qa::text::word_count)
    }

    /// Failed blocking findings from the latest QA run
    pub fn blocking_failures(&self) -> impl Iterator<Item = &QaFinding> {
        self.qa_findings.iter().filter(|f| f.is_blocking_failure())
    }

    /// Failed warning findings from the latest QA run
    pub fn warnings(&self) -> impl Iterator<Item = &QaFinding> {
        self.qa_findings.iter().filter(|f| f.is_warning())
    }
}

impl Default for SectionState {
    fn default() -> Self {
        Self::pending()
    }
}

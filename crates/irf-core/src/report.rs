//! Report snapshot: the durable view of one report

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use irf_qa::text::citation_markers;
use irf_qa::{validate_citations, CitationCheck, QaFinding, QaOutcome};
use irf_resolver::ResolvedFramework;
use irf_schema::{FrameworkId, SectionId, SectionInputs, Severity, TargetRange};
use serde::{Deserialize, Serialize};

use crate::status::{SectionState, SectionStatus};
use crate::types::{Quarter, Reference, ReportId, Ticker};

/// One report: identity, the framework it was created with, and every
/// section's state
///
/// The resolved framework is captured at creation; later edits to the
/// source framework do not reach existing reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Report id
    pub id: ReportId,
    /// Company ticker
    pub ticker: Ticker,
    /// Reporting period
    pub quarter: Quarter,
    /// Framework captured at creation
    pub framework: Arc<ResolvedFramework>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Financial inputs supplied at creation
    #[serde(default)]
    pub inputs: SectionInputs,
    /// Reference list for `[n]` markers
    #[serde(default)]
    pub references: Vec<Reference>,
    /// State of each of the 11 sections
    pub sections: BTreeMap<SectionId, SectionState>,
}

impl Report {
    /// New report with every section pending
    #[must_use]
    pub fn new(ticker: Ticker, quarter: Quarter, framework: Arc<ResolvedFramework>) -> Self {
        Self {
            id: ReportId::new(),
            ticker,
            quarter,
            framework,
            created_at: Utc::now(),
            inputs: SectionInputs::new(),
            references: Vec::new(),
            sections: SectionId::all().map(|id| (id, SectionState::pending())).collect(),
        }
    }

    /// With inputs
    #[must_use]
    pub fn with_inputs(mut self, inputs: SectionInputs) -> Self {
        self.inputs = inputs;
        self
    }

    /// With reference list
    #[must_use]
    pub fn with_references(mut self, references: Vec<Reference>) -> Self {
        self.references = references;
        self
    }

    /// Id of the framework the report was created with
    #[must_use]
    pub fn framework_id(&self) -> &FrameworkId {
        self.framework.framework_id()
    }

    /// State of one section
    #[must_use]
    pub fn section(&self, id: SectionId) -> Option<&SectionState> {
        self.sections.get(&id)
    }

    /// Every section holds current content and no blocking QA finding is
    /// outstanding
    #[must_use]
    pub fn is_complete(&self) -> bool {
        SectionId::all().all(|id| {
            self.sections.get(&id).is_some_and(|s| {
                s.status.is_complete() && !s.stale && s.blocking_failures().next().is_none()
            })
        })
    }

    /// Cross-check inline markers against the reference list
    #[must_use]
    pub fn citation_check(&self) -> CitationCheck {
        let ids: BTreeSet<u32> = self.references.iter().map(|r| r.id).collect();
        validate_citations(
            self.sections.values().filter_map(|s| s.content.as_deref()),
            &ids,
        )
    }

    /// Whole-report checks, all warnings
    ///
    /// - `total_words`: words across sections within the framework's summed
    ///   word target
    /// - `total_citations`: citation markers across sections within the
    ///   summed citation target
    /// - `no_uncited_references`: every listed reference is cited somewhere
    #[must_use]
    pub fn report_findings(&self) -> QaOutcome {
        let contents = || self.sections.values().filter_map(|s| s.content.as_deref());
        let words: usize = self.sections.values().map(SectionState::word_count).sum();
        let markers: usize = contents().map(|c| citation_markers(c).len()).sum();
        let uncited = self.citation_check().uncited;

        let words_target = self.framework.total_word_target();
        let citations_target = self.framework.total_citation_target();
        QaOutcome {
            findings: vec![
                range_finding("total_words", "words", words, words_target),
                range_finding("total_citations", "citations", markers, citations_target),
                QaFinding {
                    rule_name: "no_uncited_references".into(),
                    severity: Severity::Warning,
                    passed: uncited.is_empty(),
                    message: if uncited.is_empty() {
                        "every reference is cited".into()
                    } else {
                        format!("references never cited: {uncited:?}")
                    },
                },
            ],
        }
    }

    /// Counts for status displays
    #[must_use]
    pub fn summary(&self) -> ReportSummary {
        let mut by_status = BTreeMap::new();
        let mut summary = ReportSummary::default();
        for state in self.sections.values() {
            *by_status.entry(state.status).or_insert(0) += 1;
            summary.total_words += state.word_count();
            summary.blocking_failures += state.blocking_failures().count();
            summary.warnings += state.warnings().count();
            summary.total_retries += state.retry_count;
        }
        summary.by_status = by_status;
        summary.complete = self.is_complete();
        summary
    }
}

fn range_finding(rule: &str, unit: &str, n: usize, target: TargetRange) -> QaFinding {
    QaFinding {
        rule_name: rule.into(),
        severity: Severity::Warning,
        passed: (target.min as usize..=target.max as usize).contains(&n),
        message: format!("{n} {unit} (target {}-{})", target.min, target.max),
    }
}

/// Aggregate view of a report's sections
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Sections per status
    pub by_status: BTreeMap<SectionStatus, usize>,
    /// Words across all sections
    pub total_words: usize,
    /// Outstanding blocking QA failures
    pub blocking_failures: usize,
    /// Outstanding QA warnings
    pub warnings: usize,
    /// Transient failures across sections
    pub total_retries: u32,
    /// Result of [`Report::is_complete`]
    pub complete: bool,
}

impl ReportSummary {
    /// Sections currently in `status`
    #[must_use]
    pub fn count(&self, status: SectionStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

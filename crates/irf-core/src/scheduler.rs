//! Whole-report generation
//!
//! Sections run in dependency order with at most `max_concurrency` calls in
//! flight. A section is dispatched once every dependency that is part of the
//! same run has finished; ties go to the lower section id. Section-scoped
//! failures are recorded and the run continues. A fatal failure (rejected
//! credentials, persistence) stops dispatching: calls already in flight are
//! drained and every section not yet started is reported as aborted.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use irf_schema::SectionId;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::error::ReportError;
use crate::session::ReportSession;
use crate::status::{SectionState, SectionStatus};

/// What happened to one section during a run
#[derive(Debug)]
pub enum SectionOutcome {
    /// Generated successfully
    Generated(SectionState),
    /// Not part of the run; already held acceptable content
    Skipped(SectionStatus),
    /// Generation was attempted and failed
    Failed(ReportError),
    /// Not started because an earlier fatal failure stopped the run
    Aborted,
}

impl SectionOutcome {
    /// Short label for status lines
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Generated(_) => "generated",
            Self::Skipped(_) => "skipped",
            Self::Failed(_) => "failed",
            Self::Aborted => "aborted",
        }
    }
}

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Sections generated
    pub generated: usize,
    /// Sections skipped
    pub skipped: usize,
    /// Sections that failed
    pub failed: usize,
    /// Sections not started after a fatal failure
    pub aborted: usize,
    /// Most calls in flight at once
    pub peak_concurrency: usize,
    /// Wall-clock duration
    pub elapsed: Duration,
}

/// Result of [`ReportSession::generate_report`]
#[derive(Debug)]
pub struct ReportRun {
    /// Outcome per section, in generation order
    pub outcomes: Vec<(SectionId, SectionOutcome)>,
    /// Run counters
    pub stats: RunStats,
}

impl ReportRun {
    /// Outcome for one section
    #[must_use]
    pub fn outcome(&self, id: SectionId) -> Option<&SectionOutcome> {
        self.outcomes.iter().find(|(s, _)| *s == id).map(|(_, o)| o)
    }

    /// Failed sections with their errors
    pub fn failures(&self) -> impl Iterator<Item = (SectionId, &ReportError)> {
        self.outcomes.iter().filter_map(|(id, o)| match o {
            SectionOutcome::Failed(e) => Some((*id, e)),
            _ => None,
        })
    }

    /// Every section was attempted and none failed
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.stats.failed == 0 && self.stats.aborted == 0
    }
}

impl ReportSession {
    /// Generate every section that needs it, in dependency order
    ///
    /// Without `force`, sections that need generation are run together with
    /// everything downstream of them; the rest are skipped. With `force`
    /// every section runs.
    #[instrument(skip(self), fields(report = %self.id()))]
    pub async fn generate_report(&self, force: bool) -> ReportRun {
        let started = Instant::now();
        let framework = self.framework();
        let order = framework.generation_order();

        let mut targets: BTreeSet<SectionId> = order
            .iter()
            .copied()
            .filter(|&id| force || self.status(id).needs_generation())
            .collect();
        let downstream: BTreeSet<SectionId> = targets
            .iter()
            .flat_map(|&id| framework.dependents_of(id).iter().copied())
            .collect();
        targets.extend(downstream);

        let mut results: BTreeMap<SectionId, SectionOutcome> = BTreeMap::new();
        for &id in order {
            if !targets.contains(&id) {
                results.insert(id, SectionOutcome::Skipped(self.status(id)));
            }
        }

        let max = self.config().max_concurrency.max(1);
        let mut pending: Vec<SectionId> = order.iter().copied().filter(|id| targets.contains(id)).collect();
        let mut running: BTreeSet<SectionId> = BTreeSet::new();
        let mut in_flight = FuturesUnordered::new();
        let mut stats = RunStats::default();

        info!(targets = pending.len(), max_concurrency = max, force, "report generation started");

        let mut halted = false;
        loop {
            let mut i = 0;
            while !halted && i < pending.len() && in_flight.len() < max {
                let id = pending[i];
                let blocked = framework
                    .dependencies_of(id)
                    .iter()
                    .any(|dep| running.contains(dep) || pending.contains(dep));
                if blocked {
                    i += 1;
                    continue;
                }
                pending.remove(i);
                running.insert(id);
                // A section that needs generation runs unforced so that a
                // concurrent caller already generating it is not overridden.
                let force_this = force || !self.status(id).needs_generation();
                in_flight.push(async move { (id, self.generate_section(id, force_this).await) });
            }
            stats.peak_concurrency = stats.peak_concurrency.max(in_flight.len());

            let Some((id, result)) = in_flight.next().await else {
                break;
            };
            running.remove(&id);
            let outcome = match result {
                Ok(state) => {
                    stats.generated += 1;
                    SectionOutcome::Generated(state)
                }
                Err(error) => {
                    stats.failed += 1;
                    if error.is_fatal() && !halted {
                        halted = true;
                        warn!(section = %id, error = %error, "fatal failure; stopping report run");
                    } else {
                        warn!(section = %id, error = %error, "section failed during report run");
                    }
                    SectionOutcome::Failed(error)
                }
            };
            results.insert(id, outcome);
        }

        stats.aborted = pending.len();
        for id in pending {
            results.insert(id, SectionOutcome::Aborted);
        }
        stats.skipped = results
            .values()
            .filter(|o| matches!(o, SectionOutcome::Skipped(_)))
            .count();
        stats.elapsed = started.elapsed();
        info!(
            generated = stats.generated,
            failed = stats.failed,
            aborted = stats.aborted,
            skipped = stats.skipped,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "report generation finished"
        );

        let outcomes = order
            .iter()
            .filter_map(|id| results.remove(id).map(|o| (*id, o)))
            .collect();
        ReportRun { outcomes, stats }
    }
}

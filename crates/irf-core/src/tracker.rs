//! Per-section status tracking
//!
//! Every change to a section goes through a compare-and-set on that
//! section's entry: the current status is checked, the transition is
//! validated, the new record is committed to the [`ReportSink`], and only
//! then is it visible to readers. A failed commit leaves the entry as it was,
//! with one exception: when the commit that settles an in-flight generation
//! fails, the entry is put back to its pre-generation record in memory only.
//! The stored row then still reads `generating` and [`StatusTracker::restore`]
//! settles it on the next load.
//!
//! The entry lock is never held while touching another section.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use irf_qa::QaOutcome;
use irf_schema::SectionId;
use tracing::{debug, warn};

use crate::collaborators::ReportSink;
use crate::error::ReportError;
use crate::journal::TransitionLog;
use crate::state_machine::validate_transition;
use crate::status::{SectionState, SectionStatus};
use crate::types::{DependencyPolicy, ReportId};

/// Live status of every section in one report
pub struct StatusTracker {
    report_id: ReportId,
    sections: DashMap<SectionId, SectionState>,
    journal: TransitionLog,
    sink: Arc<dyn ReportSink>,
}

impl std::fmt::Debug for StatusTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusTracker")
            .field("report_id", &self.report_id)
            .field("sections", &self.sections.len())
            .field("transitions", &self.journal.len())
            .finish_non_exhaustive()
    }
}

impl StatusTracker {
    /// Track `states`, filling missing sections with pending records
    ///
    /// A section recorded as `generating` belongs to a call that no longer
    /// exists; it is settled to `stale` when it has content and `pending`
    /// otherwise.
    pub fn restore(
        report_id: ReportId,
        mut states: BTreeMap<SectionId, SectionState>,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        let sections = DashMap::new();
        for id in SectionId::all() {
            let mut state = states.remove(&id).unwrap_or_default();
            if state.status == SectionStatus::Generating {
                warn!(report = %report_id, section = %id, "settling interrupted generation");
                if state.content.is_some() {
                    state.status = SectionStatus::Stale;
                    state.stale = true;
                } else {
                    state.status = SectionStatus::Pending;
                }
            }
            sections.insert(id, state);
        }
        Self {
            report_id,
            sections,
            journal: TransitionLog::new(),
            sink,
        }
    }

    /// Report the tracker belongs to
    #[must_use]
    pub fn report_id(&self) -> ReportId {
        self.report_id
    }

    /// Copy of one section's record
    #[must_use]
    pub fn get(&self, id: SectionId) -> SectionState {
        self.sections
            .get(&id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Current status of one section
    #[must_use]
    pub fn status(&self, id: SectionId) -> SectionStatus {
        self.sections
            .get(&id)
            .map_or(SectionStatus::Pending, |entry| entry.status)
    }

    /// Copy of every section's record, by id
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<SectionId, SectionState> {
        SectionId::all().map(|id| (id, self.get(id))).collect()
    }

    /// Transition history of this session
    #[must_use]
    pub fn journal(&self) -> &TransitionLog {
        &self.journal
    }

    /// Dependencies whose status does not satisfy `policy`
    #[must_use]
    pub fn unmet_dependencies(
        &self,
        dependencies: &BTreeSet<SectionId>,
        policy: DependencyPolicy,
    ) -> Vec<(SectionId, SectionStatus)> {
        dependencies
            .iter()
            .map(|&dep| (dep, self.status(dep)))
            .filter(|(_, status)| !status.satisfies(policy))
            .collect()
    }

    /// Move a section into `generating`
    ///
    /// Without `force` only sections that need generation are accepted; a
    /// section already generating is always refused.
    ///
    /// # Errors
    /// [`ReportError::AlreadyGenerated`] when the section is not eligible,
    /// [`ReportError::Persistence`] when the sink rejects the change
    pub fn begin_generation(&self, id: SectionId, force: bool) -> Result<InFlight<'_>, ReportError> {
        let mut entry = self.entry(id);
        let from = entry.status;
        if from == SectionStatus::Generating || !(force || from.needs_generation()) {
            return Err(ReportError::AlreadyGenerated {
                section: id,
                status: from,
            });
        }
        self.check(id, from, SectionStatus::Generating)?;

        let prior = entry.clone();
        let mut next = prior.clone();
        next.status = SectionStatus::Generating;
        next.stale = false;
        next.updated_at = Utc::now();
        self.commit(id, &next)?;
        *entry = next;
        drop(entry);

        self.journal.record(id, from, SectionStatus::Generating);
        debug!(report = %self.report_id, section = %id, %from, "generation started");
        Ok(InFlight {
            tracker: self,
            section: id,
            prior: Some(prior),
        })
    }

    /// Record QA findings and move to `qa_passed` / `qa_failed`
    ///
    /// # Errors
    /// [`ReportError::NotGenerated`] without content,
    /// [`ReportError::IllegalTransition`] when the status does not accept QA
    pub fn apply_qa(&self, id: SectionId, outcome: &QaOutcome) -> Result<SectionState, ReportError> {
        let mut entry = self.entry(id);
        let from = entry.status;
        if entry.content.is_none() {
            return Err(ReportError::NotGenerated { section: id });
        }
        let to = if outcome.passed() {
            SectionStatus::QaPassed
        } else {
            SectionStatus::QaFailed
        };
        if !from.accepts_qa() {
            return Err(ReportError::IllegalTransition {
                section: id,
                from,
                to,
            });
        }
        self.check(id, from, to)?;

        let mut next = entry.clone();
        next.status = to;
        next.qa_findings.clone_from(&outcome.findings);
        next.updated_at = Utc::now();
        self.commit(id, &next)?;
        *entry = next.clone();
        drop(entry);

        self.journal.record(id, from, to);
        Ok(next)
    }

    /// Sign off a QA-passed section
    ///
    /// # Errors
    /// [`ReportError::IllegalTransition`] unless the section is `qa_passed`
    pub fn approve(&self, id: SectionId) -> Result<SectionState, ReportError> {
        self.set_status(id, SectionStatus::Approved)
    }

    /// Mark content-bearing sections in `ids` stale
    ///
    /// A section currently generating keeps its status and is flagged, so the
    /// in-flight call settles into `stale`. Returns the ids whose status
    /// changed.
    ///
    /// # Errors
    /// [`ReportError::Persistence`] when the sink rejects a change
    pub fn mark_stale(&self, ids: &BTreeSet<SectionId>) -> Result<Vec<SectionId>, ReportError> {
        let mut marked = Vec::new();
        for &id in ids {
            let mut entry = self.entry(id);
            let from = entry.status;
            match from {
                SectionStatus::Generated
                | SectionStatus::QaPassed
                | SectionStatus::QaFailed
                | SectionStatus::Approved => {
                    let mut next = entry.clone();
                    next.status = SectionStatus::Stale;
                    next.stale = true;
                    next.updated_at = Utc::now();
                    self.commit(id, &next)?;
                    *entry = next;
                    drop(entry);
                    self.journal.record(id, from, SectionStatus::Stale);
                    marked.push(id);
                }
                SectionStatus::Generating if !entry.stale => {
                    let mut next = entry.clone();
                    next.stale = true;
                    self.commit(id, &next)?;
                    *entry = next;
                }
                SectionStatus::Failed if entry.content.is_some() && !entry.stale => {
                    let mut next = entry.clone();
                    next.stale = true;
                    self.commit(id, &next)?;
                    *entry = next;
                }
                SectionStatus::Pending
                | SectionStatus::Generating
                | SectionStatus::Failed
                | SectionStatus::Stale => {}
            }
        }
        Ok(marked)
    }

    /// Count one transient failure against an in-flight section
    fn bump_retry(&self, id: SectionId) -> Result<u32, ReportError> {
        let mut entry = self.entry(id);
        let mut next = entry.clone();
        next.retry_count += 1;
        next.updated_at = Utc::now();
        self.commit(id, &next)?;
        *entry = next;
        Ok(entry.retry_count)
    }

    fn finish(&self, id: SectionId, settle: Settle) -> Result<SectionState, ReportError> {
        let mut entry = self.entry(id);
        let from = entry.status;
        let mut next = entry.clone();
        let now = Utc::now();
        match settle {
            Settle::Complete(content) => {
                next.status = if entry.stale {
                    SectionStatus::Stale
                } else {
                    SectionStatus::Generated
                };
                next.content = Some(content);
                next.generated_at = Some(now);
                next.qa_findings.clear();
                next.retry_count = 0;
                next.last_error = None;
            }
            Settle::Revert(prior, note) => {
                let overtaken = entry.stale && prior.content.is_some();
                next.status = if overtaken && prior.status != SectionStatus::Failed {
                    SectionStatus::Stale
                } else {
                    prior.status
                };
                next.stale = prior.stale || overtaken;
                next.content = prior.content;
                next.qa_findings = prior.qa_findings;
                next.generated_at = prior.generated_at;
                if note.is_some() {
                    next.last_error = note;
                } else {
                    next.last_error = prior.last_error;
                }
            }
            Settle::Fail(message) => {
                next.status = SectionStatus::Failed;
                next.last_error = Some(message);
            }
        }
        next.updated_at = now;
        self.check(id, from, next.status)?;
        self.commit(id, &next)?;
        *entry = next.clone();
        drop(entry);

        self.journal.record(id, from, next.status);
        debug!(report = %self.report_id, section = %id, to = %next.status, "generation settled");
        Ok(next)
    }

    /// Put an in-flight section back to `prior` without committing
    fn settle_in_memory(&self, id: SectionId, prior: SectionState) {
        let mut entry = self.entry(id);
        let from = entry.status;
        if from != SectionStatus::Generating {
            return;
        }
        let overtaken = entry.stale && prior.content.is_some();
        let mut next = prior;
        if overtaken && next.status != SectionStatus::Failed {
            next.status = SectionStatus::Stale;
            next.stale = true;
        }
        next.updated_at = Utc::now();
        let to = next.status;
        *entry = next;
        drop(entry);

        self.journal.record(id, from, to);
        warn!(report = %self.report_id, section = %id, %to, "settle not persisted; restored in memory");
    }

    fn set_status(&self, id: SectionId, to: SectionStatus) -> Result<SectionState, ReportError> {
        let mut entry = self.entry(id);
        let from = entry.status;
        self.check(id, from, to)?;
        let mut next = entry.clone();
        next.status = to;
        next.updated_at = Utc::now();
        self.commit(id, &next)?;
        *entry = next.clone();
        drop(entry);
        self.journal.record(id, from, to);
        Ok(next)
    }

    fn entry(&self, id: SectionId) -> dashmap::mapref::one::RefMut<'_, SectionId, SectionState> {
        self.sections.entry(id).or_default()
    }

    fn check(&self, id: SectionId, from: SectionStatus, to: SectionStatus) -> Result<(), ReportError> {
        validate_transition(from, to).map_err(|(from, to)| ReportError::IllegalTransition {
            section: id,
            from,
            to,
        })
    }

    fn commit(&self, id: SectionId, state: &SectionState) -> Result<(), ReportError> {
        self.sink
            .commit_section(self.report_id, id, state)
            .map_err(ReportError::from)
    }
}

enum Settle {
    Complete(String),
    Revert(SectionState, Option<String>),
    Fail(String),
}

/// A section held in `generating` by the current caller
///
/// Dropping it without settling restores the section's prior status, so a
/// cancelled or abandoned call never leaves a section stuck in `generating`.
#[must_use = "dropping an InFlight reverts the section"]
pub struct InFlight<'a> {
    tracker: &'a StatusTracker,
    section: SectionId,
    prior: Option<SectionState>,
}

impl std::fmt::Debug for InFlight<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlight")
            .field("section", &self.section)
            .field("prior", &self.prior)
            .finish_non_exhaustive()
    }
}

impl InFlight<'_> {
    /// Section being generated
    #[must_use]
    pub fn section(&self) -> SectionId {
        self.section
    }

    /// Count a transient failure; returns the section's retry count
    ///
    /// # Errors
    /// [`ReportError::Persistence`] when the sink rejects the change
    pub fn record_transient_failure(&self) -> Result<u32, ReportError> {
        self.tracker.bump_retry(self.section)
    }

    /// Store new content; settles into `generated`, or `stale` when an
    /// upstream section was regenerated meanwhile
    ///
    /// # Errors
    /// [`ReportError::Persistence`] when the sink rejects the change
    pub fn complete(mut self, content: String) -> Result<SectionState, ReportError> {
        let result = self.tracker.finish(self.section, Settle::Complete(content));
        self.settled(result)
    }

    /// Restore the status held before generation started
    ///
    /// # Errors
    /// [`ReportError::Persistence`] when the sink rejects the change
    pub fn revert(mut self, note: Option<String>) -> Result<SectionState, ReportError> {
        let prior = self.prior.clone().unwrap_or_default();
        let result = self.tracker.finish(self.section, Settle::Revert(prior, note));
        self.settled(result)
    }

    /// Settle into `failed` with `message`
    ///
    /// # Errors
    /// [`ReportError::Persistence`] when the sink rejects the change
    pub fn fail(mut self, message: String) -> Result<SectionState, ReportError> {
        let result = self.tracker.finish(self.section, Settle::Fail(message));
        self.settled(result)
    }

    /// The prior record is released only once the settle is committed
    fn settled(
        &mut self,
        result: Result<SectionState, ReportError>,
    ) -> Result<SectionState, ReportError> {
        let prior = self.prior.take();
        if result.is_err() {
            if let Some(prior) = prior {
                self.tracker.settle_in_memory(self.section, prior);
            }
        }
        result
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(prior) = self.prior.take() {
            warn!(section = %self.section, "abandoned generation; restoring prior status");
            if let Err(e) = self
                .tracker
                .finish(self.section, Settle::Revert(prior.clone(), None))
            {
                warn!(section = %self.section, error = %e, "failed to restore section");
                self.tracker.settle_in_memory(self.section, prior);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::NullSink;
    use crate::error::PersistError;
    use irf_qa::QaFinding;
    use irf_schema::Severity;
    use parking_lot::Mutex;

    fn id(n: u32) -> SectionId {
        SectionId::new(n).unwrap()
    }

    fn tracker() -> StatusTracker {
        StatusTracker::restore(ReportId::new(), BTreeMap::new(), Arc::new(NullSink))
    }

    fn outcome(passed: bool) -> QaOutcome {
        QaOutcome {
            findings: vec![QaFinding {
                rule_name: "min_citations".into(),
                severity: Severity::Blocking,
                passed,
                message: String::new(),
            }],
        }
    }

    #[test]
    fn starts_all_pending() {
        let t = tracker();
        let snap = t.snapshot();
        assert_eq!(snap.len(), 11);
        assert!(snap.values().all(|s| s.status == SectionStatus::Pending));
        assert!(t.journal().is_empty());
    }

    #[test]
    fn second_begin_is_refused() {
        let t = tracker();
        let held = t.begin_generation(id(1), false).unwrap();
        let err = t.begin_generation(id(1), true).unwrap_err();
        assert!(matches!(
            err,
            ReportError::AlreadyGenerated {
                status: SectionStatus::Generating,
                ..
            }
        ));
        held.complete("text [1]".into()).unwrap();
        assert_eq!(t.status(id(1)), SectionStatus::Generated);
    }

    #[test]
    fn generated_needs_force() {
        let t = tracker();
        t.begin_generation(id(2), false)
            .unwrap()
            .complete("a".into())
            .unwrap();
        assert!(t.begin_generation(id(2), false).is_err());
        let held = t.begin_generation(id(2), true).unwrap();
        drop(held);
        assert_eq!(t.status(id(2)), SectionStatus::Generated);
        assert_eq!(t.get(id(2)).content.as_deref(), Some("a"));
    }

    #[test]
    fn upstream_regeneration_during_flight_settles_stale() {
        let t = tracker();
        let held = t.begin_generation(id(5), false).unwrap();
        assert!(t.mark_stale(&[id(5)].into()).unwrap().is_empty());
        let state = held.complete("new".into()).unwrap();
        assert_eq!(state.status, SectionStatus::Stale);
        assert!(state.stale);
    }

    #[test]
    fn revert_keeps_retry_count() {
        let t = tracker();
        let held = t.begin_generation(id(3), false).unwrap();
        assert_eq!(held.record_transient_failure().unwrap(), 1);
        assert_eq!(held.record_transient_failure().unwrap(), 2);
        let state = held.revert(Some("timed out".into())).unwrap();
        assert_eq!(state.status, SectionStatus::Pending);
        assert_eq!(state.retry_count, 2);
        assert_eq!(state.last_error.as_deref(), Some("timed out"));
    }

    #[test]
    fn qa_and_approval() {
        let t = tracker();
        assert!(matches!(
            t.apply_qa(id(1), &outcome(true)),
            Err(ReportError::NotGenerated { .. })
        ));
        t.begin_generation(id(1), false)
            .unwrap()
            .complete("x".into())
            .unwrap();
        assert!(t.approve(id(1)).is_err());
        assert_eq!(t.apply_qa(id(1), &outcome(false)).unwrap().status, SectionStatus::QaFailed);
        assert_eq!(t.apply_qa(id(1), &outcome(true)).unwrap().status, SectionStatus::QaPassed);
        assert_eq!(t.approve(id(1)).unwrap().status, SectionStatus::Approved);
        assert!(t.journal().verify_integrity().is_ok());
    }

    #[test]
    fn stale_cascade_skips_pending() {
        let t = tracker();
        t.begin_generation(id(4), false)
            .unwrap()
            .complete("x".into())
            .unwrap();
        let marked = t.mark_stale(&[id(4), id(5)].into()).unwrap();
        assert_eq!(marked, vec![id(4)]);
        assert_eq!(t.status(id(4)), SectionStatus::Stale);
        assert_eq!(t.status(id(5)), SectionStatus::Pending);
    }

    #[test]
    fn restore_settles_interrupted_generation() {
        let mut states = BTreeMap::new();
        let mut with_content = SectionState::pending();
        with_content.status = SectionStatus::Generating;
        with_content.content = Some("old".into());
        let mut without = SectionState::pending();
        without.status = SectionStatus::Generating;
        states.insert(id(1), with_content);
        states.insert(id(2), without);

        let t = StatusTracker::restore(ReportId::new(), states, Arc::new(NullSink));
        assert_eq!(t.status(id(1)), SectionStatus::Stale);
        assert_eq!(t.status(id(2)), SectionStatus::Pending);
    }

    /// Fails the `fail_at`th commit; 0 fails every commit
    struct FailingSink {
        calls: Mutex<u32>,
        fail_at: u32,
    }

    impl FailingSink {
        fn at(fail_at: u32) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(0),
                fail_at,
            })
        }
    }

    impl ReportSink for FailingSink {
        fn commit_section(
            &self,
            _report: ReportId,
            _section: SectionId,
            _state: &SectionState,
        ) -> Result<(), PersistError> {
            let mut calls = self.calls.lock();
            *calls += 1;
            if self.fail_at == 0 || *calls == self.fail_at {
                return Err(PersistError("disk full".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn failed_commit_leaves_state_unchanged() {
        let sink = FailingSink::at(0);
        let t = StatusTracker::restore(ReportId::new(), BTreeMap::new(), sink.clone());
        assert!(matches!(
            t.begin_generation(id(1), false),
            Err(ReportError::Persistence(_))
        ));
        assert_eq!(t.status(id(1)), SectionStatus::Pending);
        assert_eq!(*sink.calls.lock(), 1);
        assert!(t.journal().is_empty());
    }

    #[test]
    fn failed_settle_restores_prior_in_memory() {
        let t = StatusTracker::restore(ReportId::new(), BTreeMap::new(), FailingSink::at(2));
        let held = t.begin_generation(id(1), false).unwrap();
        assert!(matches!(
            held.complete("text [1]".into()),
            Err(ReportError::Persistence(_))
        ));
        assert_eq!(t.status(id(1)), SectionStatus::Pending);
        assert!(t.get(id(1)).content.is_none());

        let state = t
            .begin_generation(id(1), true)
            .unwrap()
            .complete("text [1]".into())
            .unwrap();
        assert_eq!(state.status, SectionStatus::Generated);
    }

    #[test]
    fn failed_revert_on_drop_restores_prior_in_memory() {
        let t = StatusTracker::restore(ReportId::new(), BTreeMap::new(), FailingSink::at(4));
        t.begin_generation(id(2), false)
            .unwrap()
            .complete("first".into())
            .unwrap();
        drop(t.begin_generation(id(2), true).unwrap());
        assert_eq!(t.status(id(2)), SectionStatus::Generated);
        assert_eq!(t.get(id(2)).content.as_deref(), Some("first"));
    }

    #[test]
    fn stale_flag_on_in_flight_section_is_committed() {
        let sink = FailingSink::at(u32::MAX);
        let t = StatusTracker::restore(ReportId::new(), BTreeMap::new(), sink.clone());
        let held = t.begin_generation(id(6), false).unwrap();
        t.mark_stale(&[id(6)].into()).unwrap();
        assert_eq!(*sink.calls.lock(), 2);
        assert!(t.get(id(6)).stale);
        drop(held);
    }
}

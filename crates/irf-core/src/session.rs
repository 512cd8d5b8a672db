//! Report session: section generation, QA and approval
//!
//! A [`ReportSession`] owns the live state of one report. Section-level
//! operations are safe to call concurrently; each section is guarded by a
//! compare-and-set in the [`StatusTracker`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use irf_qa::QaOutcome;
use irf_resolver::ResolvedFramework;
use irf_schema::{SectionDefinition, SectionId, SectionInputs};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::collaborators::{
    GenerationRequest, InputProvider, NullSink, ReportSink, TextGenerator,
};
use crate::error::{GenerationError, ReportError};
use crate::journal::Transition;
use crate::prompt::{assemble_prompt, PromptParts, Upstream};
use crate::report::Report;
use crate::status::{SectionState, SectionStatus};
use crate::tracker::{InFlight, StatusTracker};
use crate::types::{Quarter, Reference, ReportConfig, ReportId, Ticker};

/// Build a new report with every section pending
///
/// # Errors
/// [`ReportError::InvalidArgument`] for a malformed ticker or blank quarter
pub fn create_report(
    ticker: &str,
    framework: Arc<ResolvedFramework>,
    quarter: &str,
) -> Result<Report, ReportError> {
    let report = Report::new(Ticker::parse(ticker)?, Quarter::parse(quarter)?, framework);
    info!(
        report = %report.id,
        ticker = %report.ticker,
        quarter = %report.quarter,
        framework = %report.framework_id(),
        "report created"
    );
    metrics::counter!("irf_reports_created_total").increment(1);
    Ok(report)
}

/// Fetch inputs for `report` from `provider` and attach them
///
/// # Errors
/// [`ReportError::DependencyDataUnavailable`] when the provider fails; the
/// error names the first section that requires inputs
pub async fn attach_inputs(
    mut report: Report,
    provider: &dyn InputProvider,
) -> Result<Report, ReportError> {
    match provider.fetch(&report.ticker).await {
        Ok(inputs) => {
            debug!(report = %report.id, count = inputs.len(), "inputs attached");
            report.inputs = inputs;
            Ok(report)
        }
        Err(reason) => {
            let section = report
                .framework
                .sections()
                .iter()
                .find(|s| !s.required_inputs.is_empty())
                .map_or_else(|| report.framework.generation_order()[0], |s| s.id);
            Err(ReportError::DependencyDataUnavailable { section, reason })
        }
    }
}

/// Evaluate a section's QA rules against its current content
///
/// # Errors
/// [`ReportError::NotGenerated`] when the section has no content
pub fn evaluate_section(
    state: &SectionState,
    definition: &SectionDefinition,
    inputs: &SectionInputs,
) -> Result<QaOutcome, ReportError> {
    let content = state.content.as_deref().ok_or(ReportError::NotGenerated {
        section: definition.id,
    })?;
    Ok(irf_qa::run_qa(content, definition, inputs))
}

/// Builder for [`ReportSession`]
pub struct SessionBuilder {
    report: Report,
    generator: Arc<dyn TextGenerator>,
    config: ReportConfig,
    sink: Arc<dyn ReportSink>,
    cancel: CancellationToken,
}

impl SessionBuilder {
    /// With configuration
    #[must_use]
    pub fn with_config(mut self, config: ReportConfig) -> Self {
        self.config = config;
        self
    }

    /// With a sink that persists each transition
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = sink;
        self
    }

    /// With an externally owned cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Finish building
    #[must_use]
    pub fn build(self) -> ReportSession {
        let Report {
            id,
            ticker,
            quarter,
            framework,
            created_at,
            inputs,
            references,
            sections,
        } = self.report;
        ReportSession {
            ticker,
            quarter,
            created_at,
            framework,
            inputs,
            references,
            tracker: StatusTracker::restore(id, sections, self.sink),
            generator: self.generator,
            config: self.config,
            cancel: self.cancel,
        }
    }
}

/// Live state of one report
pub struct ReportSession {
    ticker: Ticker,
    quarter: Quarter,
    created_at: DateTime<Utc>,
    framework: Arc<ResolvedFramework>,
    inputs: SectionInputs,
    references: Vec<Reference>,
    tracker: StatusTracker,
    generator: Arc<dyn TextGenerator>,
    config: ReportConfig,
    cancel: CancellationToken,
}

impl std::fmt::Debug for ReportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportSession")
            .field("id", &self.tracker.report_id())
            .field("ticker", &self.ticker)
            .field("quarter", &self.quarter)
            .field("framework", self.framework.framework_id())
            .finish_non_exhaustive()
    }
}

enum CallError {
    Cancelled,
    Exhausted { attempts: u32, last: GenerationError },
    Fatal(GenerationError),
    Report(ReportError),
}

impl ReportSession {
    /// Start a session over `report`
    #[must_use]
    pub fn builder(report: Report, generator: Arc<dyn TextGenerator>) -> SessionBuilder {
        SessionBuilder {
            report,
            generator,
            config: ReportConfig::default(),
            sink: Arc::new(NullSink),
            cancel: CancellationToken::new(),
        }
    }

    /// Report id
    #[must_use]
    pub fn id(&self) -> ReportId {
        self.tracker.report_id()
    }

    /// Company ticker
    #[must_use]
    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    /// Reporting period
    #[must_use]
    pub fn quarter(&self) -> &Quarter {
        &self.quarter
    }

    /// Framework captured at creation
    #[must_use]
    pub fn framework(&self) -> &Arc<ResolvedFramework> {
        &self.framework
    }

    /// Session configuration
    #[must_use]
    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Report inputs
    #[must_use]
    pub fn inputs(&self) -> &SectionInputs {
        &self.inputs
    }

    /// Copy of one section's state
    #[must_use]
    pub fn section(&self, id: SectionId) -> SectionState {
        self.tracker.get(id)
    }

    /// Current status of one section
    #[must_use]
    pub fn status(&self, id: SectionId) -> SectionStatus {
        self.tracker.status(id)
    }

    /// Consistent-per-section snapshot of the whole report
    #[must_use]
    pub fn report(&self) -> Report {
        Report {
            id: self.id(),
            ticker: self.ticker.clone(),
            quarter: self.quarter.clone(),
            framework: Arc::clone(&self.framework),
            created_at: self.created_at,
            inputs: self.inputs.clone(),
            references: self.references.clone(),
            sections: self.tracker.snapshot(),
        }
    }

    /// Transitions made during this session
    #[must_use]
    pub fn history(&self) -> Vec<Transition> {
        self.tracker.journal().entries()
    }

    pub(crate) fn tracker(&self) -> &StatusTracker {
        &self.tracker
    }

    /// Token that cancels every in-flight generation of this session
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel in-flight generations; later generation calls fail with
    /// [`ReportError::Cancelled`]
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Generate one section
    ///
    /// Requires every dependency to satisfy the configured
    /// [`DependencyPolicy`](crate::DependencyPolicy) and every required input
    /// to be present. Transient failures are retried per the
    /// [`RetryPolicy`](crate::RetryPolicy); exhausting them, or cancellation,
    /// restores the section's prior status. Authentication and other provider
    /// failures leave the section `failed`.
    ///
    /// On success every direct and transitive dependent holding content is
    /// marked stale.
    ///
    /// # Errors
    /// - [`ReportError::DependencyUnmet`]
    /// - [`ReportError::DependencyDataUnavailable`]
    /// - [`ReportError::AlreadyGenerated`] unless `force`, or while another
    ///   call is generating the section
    /// - [`ReportError::GenerationFailed`], [`ReportError::Auth`],
    ///   [`ReportError::Provider`], [`ReportError::Cancelled`]
    #[instrument(skip(self), fields(report = %self.id()))]
    pub async fn generate_section(
        &self,
        id: SectionId,
        force: bool,
    ) -> Result<SectionState, ReportError> {
        let definition = self.framework.section(id);

        let unmet = self
            .tracker
            .unmet_dependencies(&definition.depends_on, self.config.dependency_policy);
        if !unmet.is_empty() {
            metrics::counter!("irf_generation_rejected_total", "reason" => "dependency_unmet")
                .increment(1);
            return Err(ReportError::DependencyUnmet { section: id, unmet });
        }

        let missing = self.inputs.missing(&definition.required_inputs);
        if !missing.is_empty() {
            metrics::counter!("irf_generation_rejected_total", "reason" => "inputs_missing")
                .increment(1);
            return Err(ReportError::DependencyDataUnavailable {
                section: id,
                reason: format!("missing inputs: {}", missing.join(", ")),
            });
        }

        let flight = self.tracker.begin_generation(id, force)?;
        let request = self.request_for(definition);
        let started = Instant::now();
        let result = self.call_with_retry(&flight, &request).await;
        metrics::histogram!("irf_generation_seconds").record(started.elapsed().as_secs_f64());

        match result {
            Ok(text) => {
                let state = flight.complete(text)?;
                let marked = self.tracker.mark_stale(self.framework.dependents_of(id))?;
                if !marked.is_empty() {
                    info!(section = %id, stale = ?marked, "dependents marked stale");
                }
                metrics::counter!("irf_sections_generated_total").increment(1);
                info!(section = %id, words = state.word_count(), status = %state.status, "section generated");
                if self.config.auto_qa && state.status == SectionStatus::Generated {
                    self.run_qa(id)?;
                    return Ok(self.tracker.get(id));
                }
                Ok(state)
            }
            Err(CallError::Cancelled) => {
                flight.revert(None)?;
                metrics::counter!("irf_generation_cancelled_total").increment(1);
                Err(ReportError::Cancelled { section: id })
            }
            Err(CallError::Exhausted { attempts, last }) => {
                flight.revert(Some(last.to_string()))?;
                metrics::counter!("irf_generation_failures_total", "kind" => last.kind())
                    .increment(1);
                warn!(section = %id, attempts, error = %last, "retries exhausted");
                Err(ReportError::GenerationFailed {
                    section: id,
                    attempts,
                    source: last,
                })
            }
            Err(CallError::Fatal(error)) => {
                metrics::counter!("irf_generation_failures_total", "kind" => error.kind())
                    .increment(1);
                warn!(section = %id, error = %error, "generation failed");
                match error {
                    GenerationError::Auth(message) => {
                        flight.fail(format!("authentication failed: {message}"))?;
                        Err(ReportError::Auth { section: id, message })
                    }
                    other => {
                        let message = other.to_string();
                        flight.fail(message.clone())?;
                        Err(ReportError::Provider { section: id, message })
                    }
                }
            }
            Err(CallError::Report(error)) => Err(error),
        }
    }

    fn request_for(&self, definition: &SectionDefinition) -> GenerationRequest {
        let upstream_states: Vec<(SectionId, SectionState)> = definition
            .depends_on
            .iter()
            .map(|&dep| (dep, self.tracker.get(dep)))
            .collect();
        let upstream: Vec<Upstream<'_>> = upstream_states
            .iter()
            .filter_map(|(dep, state)| {
                Some(Upstream {
                    id: *dep,
                    title: &self.framework.section(*dep).title,
                    content: state.content.as_deref()?,
                })
            })
            .collect();
        let prompt = assemble_prompt(&PromptParts {
            definition,
            ticker: &self.ticker,
            quarter: &self.quarter,
            inputs: &self.inputs,
            upstream: &upstream,
            references: &self.references,
        });
        GenerationRequest {
            section_id: definition.id,
            prompt,
            context: format!("{} {}", self.ticker, self.quarter),
        }
    }

    async fn call_with_retry(
        &self,
        flight: &InFlight<'_>,
        request: &GenerationRequest,
    ) -> Result<String, CallError> {
        let policy = self.config.retry;
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            metrics::counter!("irf_generation_attempts_total").increment(1);

            let call = tokio::time::timeout(self.config.call_timeout, self.generator.generate(request));
            let result = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(CallError::Cancelled),
                r = call => r.unwrap_or(Err(GenerationError::Timeout)),
            };

            let error = match result {
                Ok(text) if text.trim().is_empty() => {
                    GenerationError::Provider("empty response".into())
                }
                Ok(text) => return Ok(text),
                Err(error) => error,
            };
            if !error.is_transient() {
                return Err(CallError::Fatal(error));
            }

            flight.record_transient_failure().map_err(CallError::Report)?;
            metrics::counter!("irf_generation_retries_total", "kind" => error.kind()).increment(1);
            if attempt >= policy.max_attempts() {
                return Err(CallError::Exhausted {
                    attempts: attempt,
                    last: error,
                });
            }

            let delay = policy.delay(attempt - 1, error.retry_after());
            warn!(
                section = %flight.section(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "transient generation failure; retrying"
            );
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(CallError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Run QA on a section and record the findings
    ///
    /// The section moves to `qa_passed` when no blocking rule fails and to
    /// `qa_failed` otherwise.
    ///
    /// # Errors
    /// [`ReportError::NotGenerated`] without content,
    /// [`ReportError::IllegalTransition`] when the section is stale or
    /// generating
    pub fn run_qa(&self, id: SectionId) -> Result<QaOutcome, ReportError> {
        let state = self.tracker.get(id);
        let outcome = evaluate_section(&state, self.framework.section(id), &self.inputs)?;
        self.tracker.apply_qa(id, &outcome)?;
        let blocking = outcome.blocking_failures().count();
        metrics::counter!(
            "irf_qa_runs_total",
            "result" => if blocking == 0 { "passed" } else { "failed" }
        )
        .increment(1);
        debug!(section = %id, blocking, warnings = outcome.warnings().count(), "qa recorded");
        Ok(outcome)
    }

    /// Run QA on every section that holds current content
    pub fn run_qa_all(&self) -> BTreeMap<SectionId, Result<QaOutcome, ReportError>> {
        SectionId::all()
            .filter(|&id| self.tracker.status(id).accepts_qa())
            .map(|id| (id, self.run_qa(id)))
            .collect()
    }

    /// Sign off a QA-passed section
    ///
    /// # Errors
    /// [`ReportError::IllegalTransition`] unless the section is `qa_passed`
    pub fn approve_section(&self, id: SectionId) -> Result<SectionState, ReportError> {
        let state = self.tracker.approve(id)?;
        info!(report = %self.id(), section = %id, "section approved");
        Ok(state)
    }
}

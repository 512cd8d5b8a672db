//! Testing utilities for IRF workspace
//!
//! Shared generators, fixtures and content builders.

#![allow(missing_docs)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use irf_core::{
    create_report, GenerationError, GenerationRequest, PersistError, ReportConfig, ReportId,
    ReportSession, ReportSink, RetryPolicy, SectionState, SectionStatus, TextGenerator,
};
use irf_qa::text::word_count;
use irf_resolver::ResolvedFramework;
use irf_schema::{Framework, FrameworkId, Override, Predicate, SectionDefinition, SectionId, SectionInputs};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::Semaphore;

pub fn sid(n: u32) -> SectionId {
    SectionId::new(n).unwrap()
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn resolved(framework: &Framework) -> Arc<ResolvedFramework> {
    Arc::new(irf_resolver::resolve(framework).unwrap())
}

pub fn base_framework() -> Arc<ResolvedFramework> {
    resolved(&Framework::base())
}

/// Section 4 rewritten for design wins; section 11 builds on section 7
pub fn semiconductor_fabless() -> Framework {
    let rules = json!([
        {"name": "min_words", "predicate": {"kind": "min_words", "min": 400}, "severity": "blocking"},
        {"name": "design_win_citations", "predicate": {"kind": "min_citations", "min": 10}, "severity": "blocking"},
        {"name": "kpis", "predicate": {"kind": "mentions_any", "terms": ["tape-out", "design win"]}, "severity": "warning"}
    ]);
    Framework::new(
        FrameworkId::parse("semiconductor_fabless").unwrap(),
        "semiconductors",
        "Semiconductor - Fabless",
    )
    .with_description("Fabless chip designers")
    .with_override(
        Override::new(4)
            .set("title", json!("Design Wins & Product Cycle"))
            .set(
                "prompt_template",
                json!("Analyse design wins, tape-outs and the product cycle for {ticker} in {quarter}."),
            )
            .set("qa_rules", rules),
    )
    .with_override(Override::new(11).set("depends_on", json!([7])))
}

/// 5 -> 7 -> {8, 11}
pub fn dependency_chain() -> Framework {
    Framework::new(
        FrameworkId::parse("dependency_chain").unwrap(),
        "test",
        "Dependency Chain",
    )
    .with_override(Override::new(7).set("depends_on", json!([5])))
    .with_override(Override::new(8).set("depends_on", json!([7])))
    .with_override(Override::new(11).set("depends_on", json!([7])))
}

pub fn nvda_inputs() -> SectionInputs {
    SectionInputs::new()
        .with("revenue", "$35.1B")
        .with("gross_margin", "74.6%")
        .with("eps_gaap", 0.78)
        .with("company_name", "NVIDIA Corporation")
}

pub fn fast_config() -> ReportConfig {
    ReportConfig::new()
        .with_retry(RetryPolicy::immediate(3))
        .with_call_timeout(Duration::from_secs(5))
}

pub fn session_with(
    framework: Arc<ResolvedFramework>,
    generator: Arc<dyn TextGenerator>,
) -> ReportSession {
    let report = create_report("NVDA", framework, "Q3 2025").unwrap();
    ReportSession::builder(report, generator)
        .with_config(fast_config())
        .build()
}

// ---------------------------------------------------------------------------
// Content builders
// ---------------------------------------------------------------------------

const FILLER: &str = "Gross margin expanded on favourable product mix and disciplined operating expense growth. ";

fn min_words(def: &SectionDefinition) -> usize {
    def.qa_rules
        .iter()
        .filter_map(|r| match r.predicate {
            Predicate::MinWords { min } => Some(min),
            _ => None,
        })
        .chain([def.word_target.min])
        .max()
        .unwrap_or(0) as usize
}

fn min_citations(def: &SectionDefinition) -> u32 {
    def.qa_rules
        .iter()
        .filter_map(|r| match r.predicate {
            Predicate::MinCitations { min } => Some(min),
            _ => None,
        })
        .chain([def.citation_target.min])
        .max()
        .unwrap_or(0)
}

/// Content that passes every default rule of `def`
pub fn passing_content(def: &SectionDefinition) -> String {
    let mut out = format!("## {}\n\n", def.title);
    out.push_str("| Metric | Value |\n|---|---|\n| Revenue | $35.1B |\n\n");
    out.push_str("Each risk carries an assessed probability and impact. Design win and tape-out activity remained steady.\n\n");
    for i in 1..=min_citations(def).max(1) {
        out.push_str(&format!("Segment revenue trends were documented in filing [{i}]. "));
    }
    let target = min_words(def) + 5;
    while word_count(&out) < target {
        out.push_str(FILLER);
    }
    out
}

/// Content long enough for `def` but with no citation markers
pub fn uncited_content(def: &SectionDefinition) -> String {
    let mut out = String::new();
    let target = min_words(def) + 5;
    while word_count(&out) < target {
        out.push_str(FILLER);
    }
    out
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

type Script = VecDeque<Result<String, GenerationError>>;

/// Generator that answers from per-section scripts, falling back to
/// [`passing_content`]
pub struct ScriptedGenerator {
    framework: Arc<ResolvedFramework>,
    scripts: Mutex<HashMap<SectionId, Script>>,
    calls: Mutex<Vec<GenerationRequest>>,
    delay: Duration,
    gate: Option<Arc<Semaphore>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(framework: Arc<ResolvedFramework>) -> Self {
        Self {
            framework,
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            gate: None,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Queue a response for `section`; queued responses are used in order
    pub fn with_response(self, section: u32, response: Result<String, GenerationError>) -> Self {
        self.scripts
            .lock()
            .entry(sid(section))
            .or_default()
            .push_back(response);
        self
    }

    /// Queue the same error `times` times
    pub fn with_errors(mut self, section: u32, error: GenerationError, times: usize) -> Self {
        for _ in 0..times {
            self = self.with_response(section, Err(error.clone()));
        }
        self
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Block every call until the test adds a permit to `gate`
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, section: u32) -> usize {
        let id = sid(section);
        self.calls.lock().iter().filter(|c| c.section_id == id).count()
    }

    /// Order in which sections were first requested
    pub fn call_order(&self) -> Vec<u8> {
        let mut seen = Vec::new();
        for call in self.calls.lock().iter() {
            let id = call.section_id.get();
            if !seen.contains(&id) {
                seen.push(id);
            }
        }
        seen
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.calls.lock().push(request.clone());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = ActiveGuard(&self.active);

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let scripted = self
            .scripts
            .lock()
            .get_mut(&request.section_id)
            .and_then(VecDeque::pop_front);
        scripted.unwrap_or_else(|| Ok(passing_content(self.framework.section(request.section_id))))
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Sink that records every committed status
#[derive(Default)]
pub struct RecordingSink {
    commits: Mutex<Vec<(SectionId, SectionStatus)>>,
    attempts: AtomicUsize,
    fail_at: Option<usize>,
}

impl RecordingSink {
    /// Sink whose `n`th commit attempt (1-based) fails with a disk error
    pub fn failing_at(n: usize) -> Self {
        Self {
            fail_at: Some(n),
            ..Self::default()
        }
    }

    pub fn commits(&self) -> Vec<(SectionId, SectionStatus)> {
        self.commits.lock().clone()
    }

    pub fn statuses_for(&self, section: u32) -> Vec<SectionStatus> {
        let id = sid(section);
        self.commits
            .lock()
            .iter()
            .filter(|(s, _)| *s == id)
            .map(|(_, status)| *status)
            .collect()
    }
}

impl ReportSink for RecordingSink {
    fn commit_section(
        &self,
        _report: ReportId,
        section: SectionId,
        state: &SectionState,
    ) -> Result<(), PersistError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_at == Some(attempt) {
            return Err(PersistError("disk full".into()));
        }
        self.commits.lock().push((section, state.status));
        Ok(())
    }
}

//! IRF Core - report generation orchestration
//!
//! Drives one report from eleven pending sections to a complete document:
//! - Generates sections through a pluggable [`TextGenerator`], respecting the
//!   framework's dependency DAG
//! - Retries transient failures with backoff, honours cancellation
//! - Runs QA and records findings; approves QA-passed sections
//! - Marks downstream sections stale when an upstream one is regenerated
//! - Persists every transition through a [`ReportSink`]
//!
//! # Example
//!
//! ```rust,ignore
//! use irf_core::{create_report, ReportConfig, ReportSession};
//!
//! # async fn example(framework: std::sync::Arc<irf_resolver::ResolvedFramework>,
//! #                  generator: std::sync::Arc<dyn irf_core::TextGenerator>) -> Result<(), irf_core::ReportError> {
//! let report = create_report("NVDA", framework, "Q3 2025")?;
//! let session = ReportSession::builder(report, generator)
//!     .with_config(ReportConfig::new().with_auto_qa(true))
//!     .build();
//!
//! let run = session.generate_report(false).await;
//! println!("{} generated, {} failed", run.stats.generated, run.stats.failed);
//! println!("{}", irf_core::render_markdown(&session.report()));
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod collaborators;
pub mod error;
pub mod export;
pub mod journal;
pub mod prompt;
pub mod report;
pub mod retry;
pub mod scheduler;
pub mod session;
pub mod state_machine;
pub mod status;
pub mod tracker;
pub mod types;

pub use collaborators::{
    GenerationRequest, InputProvider, NullSink, ReportSink, StaticInputs, TextGenerator,
};
pub use error::{GenerationError, PersistError, ReportError};
pub use export::{export_path, render_json, render_markdown};
pub use journal::{IntegrityError, Transition, TransitionLog};
pub use report::{Report, ReportSummary};
pub use retry::RetryPolicy;
pub use scheduler::{ReportRun, RunStats, SectionOutcome};
pub use session::{attach_inputs, create_report, evaluate_section, ReportSession, SessionBuilder};
pub use state_machine::{allowed_transitions, validate_transition};
pub use status::{SectionState, SectionStatus};
pub use tracker::{InFlight, StatusTracker};
pub use types::{DependencyPolicy, Quarter, Reference, ReportConfig, ReportId, Ticker};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

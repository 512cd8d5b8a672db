//! IRF QA Engine
//!
//! Pure evaluation of declarative [`QaRule`](irf_schema::QaRule)s against
//! generated section content.
//!
//! - [`run_qa`]: evaluate a section's rules in order
//! - [`QaOutcome::passed`]: no blocking rule failed
//! - [`format_qa_report`]: PASS / WARN / FAIL summary
//! - [`validate_citations`]: report-wide marker/reference cross-check
//!
//! # Example
//!
//! ```rust,ignore
//! let outcome = irf_qa::run_qa(&content, resolved.section(id), &inputs);
//! if !outcome.passed() {
//!     println!("{}", irf_qa::format_qa_report("Section 7", &outcome));
//! }
//! ```

#![warn(unreachable_pub)]

pub mod citations;
pub mod engine;
pub mod report;
pub mod text;

pub use citations::{validate_citations, CitationCheck};
pub use engine::{evaluate, run_qa, QaFinding, QaOutcome};
pub use report::format_qa_report;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

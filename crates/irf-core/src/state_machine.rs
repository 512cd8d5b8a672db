//! Section lifecycle transitions
//!
//! ```text
//! pending ──> generating ──> generated ──> qa_passed ──> approved
//!                 │  ▲           │             │
//!                 │  └───────────┴── qa_failed ┘
//!                 └──> failed
//! any content-bearing status ──> stale (upstream regenerated)
//! ```
//!
//! `generating` may settle back into whatever status it left when a call is
//! cancelled or exhausts its retries.

use crate::status::SectionStatus;

/// Check that `from -> to` is a legal move
///
/// # Errors
/// Returns the offending pair when the move is not allowed
pub fn validate_transition(
    from: SectionStatus,
    to: SectionStatus,
) -> Result<(), (SectionStatus, SectionStatus)> {
    if allowed(from, to) {
        Ok(())
    } else {
        Err((from, to))
    }
}

/// Statuses reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: SectionStatus) -> Vec<SectionStatus> {
    use SectionStatus::*;
    match from {
        Pending => vec![Generating],
        Generating => vec![Pending, Generated, QaPassed, QaFailed, Failed, Stale, Approved],
        Generated => vec![Generating, QaPassed, QaFailed, Stale],
        QaPassed => vec![Generating, QaPassed, QaFailed, Stale, Approved],
        QaFailed => vec![Generating, QaPassed, QaFailed, Stale],
        Failed => vec![Generating],
        Stale => vec![Generating],
        Approved => vec![Generating, Stale],
    }
}

fn allowed(from: SectionStatus, to: SectionStatus) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}

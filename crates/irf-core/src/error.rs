//! Error types for IRF Core
//!
//! Two layers:
//! - [`GenerationError`]: what a text generator reports for one call
//! - [`ReportError`]: what a report operation reports to its caller
//!
//! Transient generation failures are retried inside the session and only
//! surface as [`ReportError::GenerationFailed`] once retries are spent.

use std::time::Duration;

use irf_schema::SectionId;

use crate::status::SectionStatus;

/// Failure of a single text-generation call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// Provider asked us to slow down
    #[error("rate limited{}", retry_hint(.retry_after))]
    RateLimited {
        /// Provider-suggested wait, when it sent one
        retry_after: Option<Duration>,
    },

    /// Call exceeded its deadline
    #[error("generation timed out")]
    Timeout,

    /// Credentials rejected
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Any other provider-side failure
    #[error("provider error: {0}")]
    Provider(String),
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    retry_after
        .map(|d| format!(" (retry after {}s)", d.as_secs()))
        .unwrap_or_default()
}

impl GenerationError {
    /// Rate limits and timeouts are worth another attempt
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Timeout)
    }

    /// Provider-suggested delay before the next attempt
    #[inline]
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Stable label for metrics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::Timeout => "timeout",
            Self::Auth(_) => "auth",
            Self::Provider(_) => "provider",
        }
    }
}

/// Failure reported by the sink that persists section transitions
#[derive(Debug, Clone, thiserror::Error)]
#[error("persistence failed: {0}")]
pub struct PersistError(pub String);

/// Main report error type
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Invalid ticker, quarter or other caller-supplied value
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Upstream sections are not in a satisfying state
    #[error("section {section} depends on unfinished sections: {}", format_unmet(.unmet))]
    DependencyUnmet {
        /// Section that was asked to generate
        section: SectionId,
        /// Each unmet dependency with its current status
        unmet: Vec<(SectionId, SectionStatus)>,
    },

    /// Required inputs are missing or could not be fetched
    #[error("input data unavailable for section {section}: {reason}")]
    DependencyDataUnavailable {
        /// Section whose inputs are missing
        section: SectionId,
        /// Missing keys or the fetch failure
        reason: String,
    },

    /// Section already has content, or a generation is in flight
    #[error("section {section} is already {status}")]
    AlreadyGenerated {
        /// Section that was asked to generate
        section: SectionId,
        /// Status that blocked the request
        status: SectionStatus,
    },

    /// Transient failures exhausted the retry budget
    #[error("section {section} failed after {attempts} attempts: {source}")]
    GenerationFailed {
        /// Section being generated
        section: SectionId,
        /// Calls made, including the first
        attempts: u32,
        /// Last failure seen
        #[source]
        source: GenerationError,
    },

    /// Credentials rejected; never retried
    #[error("authentication failed while generating section {section}: {message}")]
    Auth {
        /// Section being generated
        section: SectionId,
        /// Provider message
        message: String,
    },

    /// Non-transient provider failure
    #[error("provider failed on section {section}: {message}")]
    Provider {
        /// Section being generated
        section: SectionId,
        /// Provider message
        message: String,
    },

    /// Generation was cancelled before it finished
    #[error("generation of section {section} was cancelled")]
    Cancelled {
        /// Section being generated
        section: SectionId,
    },

    /// Operation needs content the section does not have
    #[error("section {section} has no generated content")]
    NotGenerated {
        /// Section without content
        section: SectionId,
    },

    /// Status change not permitted by the section state machine
    #[error("section {section}: transition {from} -> {to} is not allowed")]
    IllegalTransition {
        /// Section being changed
        section: SectionId,
        /// Current status
        from: SectionStatus,
        /// Requested status
        to: SectionStatus,
    },

    /// Transition could not be persisted
    #[error(transparent)]
    Persistence(#[from] PersistError),
}

fn format_unmet(unmet: &[(SectionId, SectionStatus)]) -> String {
    unmet
        .iter()
        .map(|(id, status)| format!("{id} ({status})"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ReportError {
    /// Section the error belongs to, if any
    #[must_use]
    pub fn section(&self) -> Option<SectionId> {
        match self {
            Self::DependencyUnmet { section, .. }
            | Self::DependencyDataUnavailable { section, .. }
            | Self::AlreadyGenerated { section, .. }
            | Self::GenerationFailed { section, .. }
            | Self::Auth { section, .. }
            | Self::Provider { section, .. }
            | Self::Cancelled { section }
            | Self::NotGenerated { section }
            | Self::IllegalTransition { section, .. } => Some(*section),
            Self::InvalidArgument(_) | Self::Persistence(_) => None,
        }
    }

    /// Affects only one section; the rest of the report can continue
    #[inline]
    #[must_use]
    pub fn is_section_scoped(&self) -> bool {
        !self.is_fatal() && self.section().is_some()
    }

    /// Retrying the same operation later may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::GenerationFailed { .. } | Self::Cancelled { .. } | Self::Provider { .. }
        )
    }

    /// Nothing else in the report will succeed until a human intervenes
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth { .. } | Self::Persistence(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> SectionId {
        SectionId::new(n).unwrap()
    }

    #[test]
    fn transient_classification() {
        assert!(GenerationError::Timeout.is_transient());
        assert!(GenerationError::RateLimited { retry_after: None }.is_transient());
        assert!(!GenerationError::Auth("bad key".into()).is_transient());
        assert!(!GenerationError::Provider("500".into()).is_transient());
    }

    #[test]
    fn retry_after_only_for_rate_limits() {
        let e = GenerationError::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(e.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(e.to_string(), "rate limited (retry after 7s)");
        assert_eq!(GenerationError::Timeout.retry_after(), None);
    }

    #[test]
    fn unmet_message_lists_statuses() {
        let e = ReportError::DependencyUnmet {
            section: id(11),
            unmet: vec![(id(7), SectionStatus::Pending)],
        };
        assert_eq!(
            e.to_string(),
            "section 11 depends on unfinished sections: 7 (pending)"
        );
        assert!(e.is_section_scoped());
        assert!(!e.is_fatal());
    }

    #[test]
    fn auth_is_fatal() {
        let e = ReportError::Auth {
            section: id(1),
            message: "invalid x-api-key".into(),
        };
        assert!(e.is_fatal());
        assert!(!e.is_section_scoped());
        assert!(!e.is_retryable());
    }
}

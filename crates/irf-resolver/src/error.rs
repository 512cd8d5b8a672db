//! Resolution errors
//!
//! Every variant is fatal to the operation that produced it: a framework that
//! fails to resolve is never persisted and never drives a report.

use irf_schema::{FieldName, FingerprintError, SectionId};
use thiserror::Error;

/// Errors raised while resolving, importing or exporting a framework
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Override targets an unknown section or field, or carries a bad value
    #[error("invalid override for section {section}{}: {reason}", field_suffix(.field))]
    InvalidOverride {
        /// Raw section id from the override
        section: u32,
        /// Offending field, when the problem is field-specific
        field: Option<String>,
        /// What is wrong
        reason: String,
    },

    /// `depends_on` edges form a cycle
    #[error("dependency cycle among sections {}", join_ids(.sections))]
    DependencyCycle {
        /// Sections on the cycle, ascending
        sections: Vec<SectionId>,
    },

    /// `depends_on` references a section id that does not exist
    #[error("section {section} depends on unknown section {dependency}")]
    UnknownDependency {
        /// Section declaring the dependency
        section: SectionId,
        /// The unknown id
        dependency: u32,
    },

    /// A required field is empty after the merge
    #[error("section {section} is missing required field `{field}`")]
    MissingRequiredField {
        /// Section with the empty field
        section: SectionId,
        /// The field
        field: FieldName,
    },

    /// Framework-level metadata is invalid
    #[error("invalid framework: {reason}")]
    InvalidFramework {
        /// What is wrong
        reason: String,
    },

    /// Export/import document could not be read or written
    #[error("framework document error: {0}")]
    Document(String),

    /// Fingerprint computation failed
    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),
}

impl ResolveError {
    pub(crate) fn invalid_override(
        section: u32,
        field: impl Into<Option<String>>,
        reason: impl Into<String>,
    ) -> Self {
        ResolveError::InvalidOverride {
            section,
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Section the error is about, when there is exactly one
    #[must_use]
    pub fn section(&self) -> Option<u32> {
        match self {
            ResolveError::InvalidOverride { section, .. } => Some(*section),
            ResolveError::UnknownDependency { section, .. }
            | ResolveError::MissingRequiredField { section, .. } => Some(u32::from(section.get())),
            _ => None,
        }
    }
}

fn field_suffix(field: &Option<String>) -> String {
    field
        .as_ref()
        .map(|f| format!(", field `{f}`"))
        .unwrap_or_default()
}

fn join_ids(ids: &[SectionId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl From<serde_json::Error> for ResolveError {
    fn from(e: serde_json::Error) -> Self {
        ResolveError::Document(format!("JSON: {e}"))
    }
}

impl From<serde_yaml::Error> for ResolveError {
    fn from(e: serde_yaml::Error) -> Self {
        ResolveError::Document(format!("YAML: {e}"))
    }
}

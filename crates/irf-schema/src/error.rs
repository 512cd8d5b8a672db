//! Error types for the data model

use thiserror::Error;

/// Errors raised when constructing data-model values from raw input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Section id outside 1..=11
    #[error("section id {0} is out of range (expected 1..=11)")]
    SectionOutOfRange(u32),

    /// Override names a field that section definitions do not have
    #[error("unknown section field `{0}`")]
    UnknownField(String),

    /// Framework id contains characters other than `[a-z0-9_]`
    #[error("invalid framework id `{0}`: use lowercase letters, digits and underscores")]
    InvalidFrameworkId(String),

    /// Target range with min greater than max
    #[error("invalid range: min {min} exceeds max {max}")]
    InvalidRange {
        /// Lower bound
        min: u32,
        /// Upper bound
        max: u32,
    },
}

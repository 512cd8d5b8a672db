//! IRF Data Model
//!
//! Typed building blocks shared by every IRF crate.
//!
//! # Core Concepts
//!
//! - [`SectionId`]: one of the 11 report sections, range-checked
//! - [`SectionDefinition`]: title, prompt template, inputs, QA rules and dependencies
//! - [`QaRule`] / [`Predicate`]: declarative content checks
//! - [`Framework`] / [`Override`]: sector-specific field replacements
//! - [`base_schema`]: the fixed reference definition every framework extends
//!
//! # Example
//!
//! ```rust,ignore
//! use irf_schema::{Framework, FrameworkId, Override};
//! use serde_json::json;
//!
//! let framework = Framework::new(FrameworkId::parse("semiconductor_fabless")?, "semis", "Fabless")
//!     .with_override(Override::new(4).set("title", json!("Design Wins & Product Cycle")));
//! ```

#![warn(unreachable_pub)]

mod base;
mod error;
mod fingerprint;
mod framework;
mod inputs;
mod rules;
mod section;

pub use base::{base_schema, base_section, total_citation_target, total_word_target};
pub use error::SchemaError;
pub use fingerprint::{Fingerprint, FingerprintError};
pub use framework::{Framework, FrameworkId, Override};
pub use inputs::{parse_figure, InputValue, SectionInputs};
pub use rules::{Predicate, QaRule, Severity, DEFAULT_HYPE_WORDS, DEFAULT_PLACEHOLDER_TOKENS};
pub use section::{FieldName, SectionDefinition, SectionId, TargetRange, SECTION_COUNT};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

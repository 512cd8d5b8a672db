//! IRF Framework Resolver
//!
//! Merges a sector [`Framework`](irf_schema::Framework)'s overrides onto the
//! base schema and produces an immutable [`ResolvedFramework`].
//!
//! # Guarantees
//!
//! - Field-level merge: a field named in an override wins, all others inherit
//! - Unknown section ids and field names are rejected
//! - Title, prompt template and QA rules are non-empty after the merge
//! - `depends_on` forms a DAG; cycles fail here, never at generation time
//! - Deterministic: equal frameworks resolve to equal values
//!
//! # Example
//!
//! ```rust,ignore
//! use irf_resolver::{resolve, DocumentFormat};
//!
//! let resolved = resolve(&framework)?;
//! for id in resolved.generation_order() {
//!     println!("{id}: {}", resolved.section(*id).title);
//! }
//! let json = irf_resolver::export(&framework, DocumentFormat::Json)?;
//! ```

#![warn(unreachable_pub)]

pub mod cache;
pub mod dag;
pub mod document;
pub mod error;
mod merge;
mod resolved;
mod resolver;

pub use cache::ResolutionCache;
pub use dag::DependencyGraph;
pub use document::{export, import, render_markdown, DocumentFormat, FrameworkDocument};
pub use error::ResolveError;
pub use merge::apply_override;
pub use resolved::ResolvedFramework;
pub use resolver::{resolve, resolve_with_base};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

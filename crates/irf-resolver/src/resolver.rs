//! Framework resolution
//!
//! `resolve` is a pure function of the base schema and the framework's
//! overrides: the same framework value always yields an equal result.

use irf_schema::{base_schema, Framework, SectionDefinition, SectionId};

use crate::error::ResolveError;
use crate::merge::apply_override;
use crate::resolved::ResolvedFramework;

/// Resolve a framework against the shipped base schema
///
/// # Errors
/// Any [`ResolveError`]; nothing is partially applied.
pub fn resolve(framework: &Framework) -> Result<ResolvedFramework, ResolveError> {
    resolve_with_base(base_schema(), framework)
}

/// Resolve a framework against an explicit base schema
///
/// # Errors
/// Any [`ResolveError`]; nothing is partially applied.
pub fn resolve_with_base(
    base: &[SectionDefinition],
    framework: &Framework,
) -> Result<ResolvedFramework, ResolveError> {
    if framework.name.trim().is_empty() {
        return Err(ResolveError::InvalidFramework {
            reason: format!("framework `{}` has no name", framework.id),
        });
    }

    for ov in framework.overrides() {
        if SectionId::new(ov.section_id).is_err() {
            return Err(ResolveError::invalid_override(
                ov.section_id,
                None,
                "section id out of range (expected 1..=11)",
            ));
        }
    }

    let sections = base
        .iter()
        .map(|section| match framework.override_for(u32::from(section.id.get())) {
            Some(ov) => apply_override(section, ov),
            None => Ok(section.clone()),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let resolved = ResolvedFramework::seal(
        framework.id.clone(),
        framework.sector.clone(),
        framework.name.clone(),
        framework.description.clone(),
        sections,
    )?;

    tracing::debug!(
        framework = %framework.id,
        overrides = framework.override_count(),
        fingerprint = %resolved.fingerprint().short(),
        "framework resolved"
    );
    Ok(resolved)
}

//! Resolved Framework - Proof-Carrying Type
//!
//! A [`ResolvedFramework`] can only be obtained from [`crate::resolve`] or by
//! deserializing a snapshot, which re-runs the same validation. Holding one
//! is therefore proof that:
//! 1. There are exactly 11 sections with ids 1..=11, in order
//! 2. Every section has a title, a prompt template and at least one QA rule
//! 3. `depends_on` edges form a DAG over existing sections
//!
//! The value is immutable and is shared across workers behind an `Arc`.

use std::collections::{BTreeMap, BTreeSet};

use irf_schema::{
    total_citation_target, total_word_target, FieldName, Fingerprint, FrameworkId,
    SectionDefinition, SectionId, TargetRange, SECTION_COUNT,
};
use serde::{Deserialize, Serialize};

use crate::dag::DependencyGraph;
use crate::error::ResolveError;

/// The fully merged 11-section definition driving one report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ResolvedSnapshot", into = "ResolvedSnapshot")]
pub struct ResolvedFramework {
    framework_id: FrameworkId,
    sector: String,
    name: String,
    description: String,
    sections: Vec<SectionDefinition>,
    order: Vec<SectionId>,
    dependents: BTreeMap<SectionId, BTreeSet<SectionId>>,
    fingerprint: Fingerprint,
}

/// Serialized form; the derived indexes are rebuilt on load
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ResolvedSnapshot {
    framework_id: FrameworkId,
    sector: String,
    name: String,
    #[serde(default)]
    description: String,
    sections: Vec<SectionDefinition>,
}

impl ResolvedFramework {
    /// Validate merged sections and derive the order and dependents index
    pub(crate) fn seal(
        framework_id: FrameworkId,
        sector: String,
        name: String,
        description: String,
        sections: Vec<SectionDefinition>,
    ) -> Result<Self, ResolveError> {
        validate_sections(&sections)?;
        let graph = DependencyGraph::build(&sections)?;
        let fingerprint = Fingerprint::of(&sections)?;
        Ok(Self {
            framework_id,
            sector,
            name,
            description,
            order: graph.topological_order(),
            dependents: graph.dependents_index(),
            sections,
            fingerprint,
        })
    }

    /// Id of the source framework
    #[must_use]
    pub fn framework_id(&self) -> &FrameworkId {
        &self.framework_id
    }

    /// Sector label
    #[must_use]
    pub fn sector(&self) -> &str {
        &self.sector
    }

    /// Display name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// All 11 sections, ordered by id
    #[must_use]
    pub fn sections(&self) -> &[SectionDefinition] {
        &self.sections
    }

    /// One section
    #[must_use]
    pub fn section(&self, id: SectionId) -> &SectionDefinition {
        &self.sections[id.index()]
    }

    /// Dependency-respecting order, ties broken by ascending id
    #[must_use]
    pub fn generation_order(&self) -> &[SectionId] {
        &self.order
    }

    /// Every section downstream of `id`, direct and transitive
    #[must_use]
    pub fn dependents_of(&self, id: SectionId) -> &BTreeSet<SectionId> {
        static EMPTY: BTreeSet<SectionId> = BTreeSet::new();
        self.dependents.get(&id).unwrap_or(&EMPTY)
    }

    /// Sections `id` depends on directly
    #[must_use]
    pub fn dependencies_of(&self, id: SectionId) -> &BTreeSet<SectionId> {
        &self.section(id).depends_on
    }

    /// Content fingerprint of the merged sections
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Sum of word targets
    #[must_use]
    pub fn total_word_target(&self) -> TargetRange {
        total_word_target(&self.sections)
    }

    /// Sum of citation targets
    #[must_use]
    pub fn total_citation_target(&self) -> TargetRange {
        total_citation_target(&self.sections)
    }
}

fn validate_sections(sections: &[SectionDefinition]) -> Result<(), ResolveError> {
    if sections.len() != usize::from(SECTION_COUNT) {
        return Err(ResolveError::InvalidFramework {
            reason: format!("expected {SECTION_COUNT} sections, found {}", sections.len()),
        });
    }
    for (section, expected) in sections.iter().zip(SectionId::all()) {
        if section.id != expected {
            return Err(ResolveError::InvalidFramework {
                reason: format!("section {} found at position {expected}", section.id),
            });
        }
        if let Some(field) = FieldName::ALL
            .into_iter()
            .filter(|f| f.is_required())
            .find(|f| section.is_field_empty(*f))
        {
            return Err(ResolveError::MissingRequiredField {
                section: section.id,
                field,
            });
        }
    }
    Ok(())
}

impl TryFrom<ResolvedSnapshot> for ResolvedFramework {
    type Error = ResolveError;

    fn try_from(s: ResolvedSnapshot) -> Result<Self, Self::Error> {
        Self::seal(s.framework_id, s.sector, s.name, s.description, s.sections)
    }
}

impl From<ResolvedFramework> for ResolvedSnapshot {
    fn from(r: ResolvedFramework) -> Self {
        Self {
            framework_id: r.framework_id,
            sector: r.sector,
            name: r.name,
            description: r.description,
            sections: r.sections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use irf_schema::base_schema;

    fn base_resolved() -> ResolvedFramework {
        ResolvedFramework::seal(
            FrameworkId::parse("base").unwrap(),
            "general".into(),
            "Base".into(),
            String::new(),
            base_schema().to_vec(),
        )
        .unwrap()
    }

    #[test]
    fn snapshot_round_trip_rebuilds_indexes() {
        let resolved = base_resolved();
        let json = serde_json::to_string(&resolved).unwrap();
        assert!(!json.contains("dependents"));
        let back: ResolvedFramework = serde_json::from_str(&json).unwrap();
        assert_eq!(back, resolved);
    }

    #[test]
    fn tampered_snapshot_is_rejected() {
        let resolved = base_resolved();
        let mut value = serde_json::to_value(&resolved).unwrap();
        value["sections"][2]["title"] = serde_json::json!("");
        assert!(serde_json::from_value::<ResolvedFramework>(value).is_err());
    }

    #[test]
    fn wrong_section_count_is_rejected() {
        let err = ResolvedFramework::seal(
            FrameworkId::parse("short").unwrap(),
            "x".into(),
            "x".into(),
            String::new(),
            base_schema()[..10].to_vec(),
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::InvalidFramework { .. }));
    }
}

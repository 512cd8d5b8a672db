//! Framework export/import documents
//!
//! The document shape is `{id, sector, name, description, overrides: [{section_id, fields}]}`
//! in JSON or YAML. Import parses, rebuilds the [`Framework`] and resolves it;
//! any failure rejects the whole document. Markdown is export-only
//! documentation of the resolved sections.

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter, Write as _};
use std::path::Path;
use std::str::FromStr;

use irf_schema::{Framework, FrameworkId, Override};
use serde::{Deserialize, Serialize};

use crate::error::ResolveError;
use crate::resolved::ResolvedFramework;
use crate::resolver::resolve;

/// Serialized framework
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkDocument {
    /// Framework id
    pub id: String,
    /// Sector label
    pub sector: String,
    /// Display name
    pub name: String,
    /// Description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Overrides, ascending by section
    #[serde(default)]
    pub overrides: Vec<Override>,
}

impl From<&Framework> for FrameworkDocument {
    fn from(fw: &Framework) -> Self {
        Self {
            id: fw.id.to_string(),
            sector: fw.sector.clone(),
            name: fw.name.clone(),
            description: fw.description.clone(),
            overrides: fw.overrides().cloned().collect(),
        }
    }
}

impl FrameworkDocument {
    /// Rebuild the framework; duplicate section entries are rejected
    ///
    /// # Errors
    /// [`ResolveError::InvalidFramework`] for a bad id,
    /// [`ResolveError::InvalidOverride`] for duplicate sections
    pub fn into_framework(self) -> Result<Framework, ResolveError> {
        let id = FrameworkId::parse(self.id).map_err(|e| ResolveError::InvalidFramework {
            reason: e.to_string(),
        })?;
        let mut framework =
            Framework::new(id, self.sector, self.name).with_description(self.description);
        let mut seen = BTreeSet::new();
        for ov in self.overrides {
            if !seen.insert(ov.section_id) {
                return Err(ResolveError::invalid_override(
                    ov.section_id,
                    None,
                    "more than one override for this section",
                ));
            }
            framework.set_override(ov);
        }
        Ok(framework)
    }
}

/// Document encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// JSON, pretty-printed
    Json,
    /// YAML
    Yaml,
    /// Markdown documentation (export only)
    Markdown,
}

impl DocumentFormat {
    /// Guess the format from a file extension
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }

    /// Conventional file extension
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Json => "json",
            DocumentFormat::Yaml => "yaml",
            DocumentFormat::Markdown => "md",
        }
    }
}

impl FromStr for DocumentFormat {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(DocumentFormat::Json),
            "yaml" | "yml" => Ok(DocumentFormat::Yaml),
            "md" | "markdown" => Ok(DocumentFormat::Markdown),
            other => Err(ResolveError::Document(format!("unknown format `{other}`"))),
        }
    }
}

impl Display for DocumentFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Serialize a framework
///
/// # Errors
/// Encoding failures; for Markdown, any resolution failure
pub fn export(framework: &Framework, format: DocumentFormat) -> Result<String, ResolveError> {
    let doc = FrameworkDocument::from(framework);
    match format {
        DocumentFormat::Json => Ok(serde_json::to_string_pretty(&doc)?),
        DocumentFormat::Yaml => Ok(serde_yaml::to_string(&doc)?),
        DocumentFormat::Markdown => Ok(render_markdown(&resolve(framework)?)),
    }
}

/// Parse and validate a framework document
///
/// Returns the framework together with its resolution; callers persist only
/// after this succeeds.
///
/// # Errors
/// Parse failures and every resolution error
pub fn import(
    text: &str,
    format: DocumentFormat,
) -> Result<(Framework, ResolvedFramework), ResolveError> {
    let doc: FrameworkDocument = match format {
        DocumentFormat::Json => serde_json::from_str(text)?,
        DocumentFormat::Yaml => serde_yaml::from_str(text)?,
        DocumentFormat::Markdown => {
            return Err(ResolveError::Document(
                "markdown documents cannot be imported".into(),
            ))
        }
    };
    let framework = doc.into_framework()?;
    let resolved = resolve(&framework)?;
    Ok((framework, resolved))
}

/// Markdown documentation of a resolved framework
#[must_use]
pub fn render_markdown(resolved: &ResolvedFramework) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}", resolved.name());
    let _ = writeln!(out);
    if !resolved.description().is_empty() {
        let _ = writeln!(out, "{}", resolved.description());
        let _ = writeln!(out);
    }
    let words = resolved.total_word_target();
    let cites = resolved.total_citation_target();
    let _ = writeln!(out, "- Framework id: `{}`", resolved.framework_id());
    let _ = writeln!(out, "- Sector: {}", resolved.sector());
    let _ = writeln!(out, "- Total words: {words}");
    let _ = writeln!(out, "- Total citations: {cites}");
    let _ = writeln!(out);
    let _ = writeln!(out, "## Sections");

    for section in resolved.sections() {
        let _ = writeln!(out);
        let _ = writeln!(out, "### Section {}: {}", section.id, section.title);
        let _ = writeln!(out, "- Word count: {}", section.word_target);
        let _ = writeln!(out, "- Citations: {}", section.citation_target);
        if !section.depends_on.is_empty() {
            let deps: Vec<String> = section.depends_on.iter().map(ToString::to_string).collect();
            let _ = writeln!(out, "- Depends on: {}", deps.join(", "));
        }
        if !section.required_inputs.is_empty() {
            let inputs: Vec<&str> = section.required_inputs.iter().map(String::as_str).collect();
            let _ = writeln!(out, "- Required inputs: {}", inputs.join(", "));
        }
        if !section.required_elements.is_empty() {
            let _ = writeln!(out, "- Required elements:");
            for element in &section.required_elements {
                let _ = writeln!(out, "  - {element}");
            }
        }
        let _ = writeln!(out, "- QA rules:");
        for rule in &section.qa_rules {
            let _ = writeln!(
                out,
                "  - {} ({}, {})",
                rule.name,
                rule.predicate.kind(),
                rule.severity
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Framework {
        Framework::new(FrameworkId::parse("banks").unwrap(), "financials", "Banks")
            .with_description("Regional and money-centre banks")
            .with_override(Override::new(7).set("title", json!("Net Interest Income")))
            .with_override(Override::new(11).set("depends_on", json!([7])))
    }

    #[test]
    fn json_round_trip() {
        let fw = sample();
        let text = export(&fw, DocumentFormat::Json).unwrap();
        let (back, _) = import(&text, DocumentFormat::Json).unwrap();
        assert_eq!(back, fw);
    }

    #[test]
    fn yaml_round_trip() {
        let fw = sample();
        let text = export(&fw, DocumentFormat::Yaml).unwrap();
        let (back, _) = import(&text, DocumentFormat::Yaml).unwrap();
        assert_eq!(back, fw);
    }

    #[test]
    fn duplicate_sections_are_rejected() {
        let text = r#"{"id":"dup","sector":"x","name":"Dup","overrides":[
            {"section_id":2,"fields":{"title":"A"}},
            {"section_id":2,"fields":{"title":"B"}}]}"#;
        assert!(matches!(
            import(text, DocumentFormat::Json),
            Err(ResolveError::InvalidOverride { section: 2, .. })
        ));
    }

    #[test]
    fn failing_resolution_rejects_import() {
        let text = r#"{"id":"cyc","sector":"x","name":"Cyc","overrides":[
            {"section_id":1,"fields":{"depends_on":[2]}},
            {"section_id":2,"fields":{"depends_on":[1]}}]}"#;
        assert!(matches!(
            import(text, DocumentFormat::Json),
            Err(ResolveError::DependencyCycle { .. })
        ));
    }

    #[test]
    fn malformed_document_is_a_document_error() {
        assert!(matches!(
            import("{not json", DocumentFormat::Json),
            Err(ResolveError::Document(_))
        ));
        assert!(import("# Title", DocumentFormat::Markdown).is_err());
    }

    #[test]
    fn markdown_lists_sections() {
        let md = export(&sample(), DocumentFormat::Markdown).unwrap();
        assert!(md.starts_with("# Banks"));
        assert!(md.contains("### Section 7: Net Interest Income"));
        assert!(md.contains("- Depends on: 7"));
        assert_eq!(md.matches("### Section ").count(), 11);
    }

    #[test]
    fn format_from_path() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("fw/semis.yml")),
            Some(DocumentFormat::Yaml)
        );
        assert_eq!(DocumentFormat::from_path(Path::new("fw/semis")), None);
    }
}

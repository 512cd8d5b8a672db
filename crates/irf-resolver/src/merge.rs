//! Field-level merge of an override onto a base section
//!
//! Precedence is fixed: a field named in the override wins, every other
//! field is taken from the base. A `null` value clears the field.

use std::collections::BTreeSet;

use irf_schema::{FieldName, Override, QaRule, SectionDefinition, SectionId, TargetRange};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ResolveError;

/// Apply `ov` to `base`, returning the merged definition
///
/// # Errors
/// [`ResolveError::InvalidOverride`] for unknown field names or values of the
/// wrong shape, [`ResolveError::UnknownDependency`] for out-of-range
/// `depends_on` ids.
pub fn apply_override(
    base: &SectionDefinition,
    ov: &Override,
) -> Result<SectionDefinition, ResolveError> {
    let mut merged = base.clone();
    for (name, value) in &ov.fields {
        let field: FieldName = name
            .parse()
            .map_err(|_| ResolveError::invalid_override(ov.section_id, name.clone(), "unknown field"))?;
        set_field(&mut merged, field, value).map_err(|e| match e {
            FieldError::Shape(reason) => {
                ResolveError::invalid_override(ov.section_id, name.clone(), reason)
            }
            FieldError::UnknownDependency(dependency) => ResolveError::UnknownDependency {
                section: base.id,
                dependency,
            },
        })?;
    }
    Ok(merged)
}

enum FieldError {
    Shape(String),
    UnknownDependency(u32),
}

impl From<String> for FieldError {
    fn from(reason: String) -> Self {
        FieldError::Shape(reason)
    }
}

fn set_field(
    section: &mut SectionDefinition,
    field: FieldName,
    value: &Value,
) -> Result<(), FieldError> {
    match field {
        FieldName::Title => section.title = decode::<String>(value)?,
        FieldName::PromptTemplate => section.prompt_template = decode::<String>(value)?,
        FieldName::RequiredInputs => {
            section.required_inputs = decode::<BTreeSet<String>>(value)?;
        }
        FieldName::QaRules => section.qa_rules = decode::<Vec<QaRule>>(value)?,
        FieldName::RequiredElements => section.required_elements = decode::<Vec<String>>(value)?,
        FieldName::WordTarget => section.word_target = decode_range(value)?,
        FieldName::CitationTarget => section.citation_target = decode_range(value)?,
        FieldName::DependsOn => {
            let mut deps = BTreeSet::new();
            for raw in decode::<Vec<u32>>(value)? {
                match SectionId::new(raw) {
                    Ok(id) => {
                        deps.insert(id);
                    }
                    Err(_) => return Err(FieldError::UnknownDependency(raw)),
                }
            }
            section.depends_on = deps;
        }
    }
    Ok(())
}

fn decode<T: DeserializeOwned + Default>(value: &Value) -> Result<T, String> {
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value.clone()).map_err(|e| e.to_string())
}

fn decode_range(value: &Value) -> Result<TargetRange, String> {
    if value.is_null() {
        return Err("range fields cannot be cleared".to_string());
    }
    let range: TargetRange = serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
    if !range.is_valid() {
        return Err(format!("min {} exceeds max {}", range.min, range.max));
    }
    Ok(range)
}

//! Section identifiers and definitions

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::rules::QaRule;

/// Number of sections in every report
pub const SECTION_COUNT: u8 = 11;

/// Identifier of one of the 11 report sections
///
/// Always within `1..=11`; the only way to build one is through
/// [`SectionId::new`] or the `TryFrom` conversions, which check the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u8")]
pub struct SectionId(u8);

impl SectionId {
    /// Build a section id, rejecting values outside `1..=11`
    ///
    /// # Errors
    /// Returns [`SchemaError::SectionOutOfRange`] for out-of-range values
    pub fn new(id: u32) -> Result<Self, SchemaError> {
        match u8::try_from(id) {
            Ok(n) if (1..=SECTION_COUNT).contains(&n) => Ok(Self(n)),
            _ => Err(SchemaError::SectionOutOfRange(id)),
        }
    }

    /// Numeric value
    #[inline]
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Zero-based position in the base schema
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize - 1
    }

    /// All section ids in ascending order
    pub fn all() -> impl Iterator<Item = SectionId> {
        (1..=SECTION_COUNT).map(SectionId)
    }
}

impl TryFrom<u32> for SectionId {
    type Error = SchemaError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SectionId> for u8 {
    fn from(id: SectionId) -> Self {
        id.0
    }
}

impl Display for SectionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SectionId {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n: u32 = s
            .trim()
            .parse()
            .map_err(|_| SchemaError::SectionOutOfRange(0))?;
        Self::new(n)
    }
}

/// Inclusive `min..=max` target for words or citations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRange {
    /// Lower bound
    pub min: u32,
    /// Upper bound
    pub max: u32,
}

impl TargetRange {
    /// Build a range, rejecting `min > max`
    ///
    /// # Errors
    /// Returns [`SchemaError::InvalidRange`] when `min > max`
    pub fn new(min: u32, max: u32) -> Result<Self, SchemaError> {
        if min > max {
            return Err(SchemaError::InvalidRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// Whether `min <= max`
    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.min <= self.max
    }
}

impl Display for TargetRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// Field of a [`SectionDefinition`] that an override may replace
///
/// `id` is deliberately absent: a section's identity never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldName {
    /// `title`
    Title,
    /// `prompt_template`
    PromptTemplate,
    /// `required_inputs`
    RequiredInputs,
    /// `qa_rules`
    QaRules,
    /// `depends_on`
    DependsOn,
    /// `word_target`
    WordTarget,
    /// `citation_target`
    CitationTarget,
    /// `required_elements`
    RequiredElements,
}

impl FieldName {
    /// Every overridable field
    pub const ALL: [FieldName; 8] = [
        FieldName::Title,
        FieldName::PromptTemplate,
        FieldName::RequiredInputs,
        FieldName::QaRules,
        FieldName::DependsOn,
        FieldName::WordTarget,
        FieldName::CitationTarget,
        FieldName::RequiredElements,
    ];

    /// Name as written in framework documents
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            FieldName::Title => "title",
            FieldName::PromptTemplate => "prompt_template",
            FieldName::RequiredInputs => "required_inputs",
            FieldName::QaRules => "qa_rules",
            FieldName::DependsOn => "depends_on",
            FieldName::WordTarget => "word_target",
            FieldName::CitationTarget => "citation_target",
            FieldName::RequiredElements => "required_elements",
        }
    }

    /// Fields that must be non-empty after a merge
    #[must_use]
    pub const fn is_required(self) -> bool {
        matches!(
            self,
            FieldName::Title | FieldName::PromptTemplate | FieldName::QaRules
        )
    }
}

impl Display for FieldName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldName {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldName::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| SchemaError::UnknownField(s.to_string()))
    }
}

/// Definition of one report section
///
/// Values held inside a resolved framework are only reachable through shared
/// references, so they cannot change after resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionDefinition {
    /// Section id (1..=11)
    pub id: SectionId,
    /// Heading shown in the report
    pub title: String,
    /// Instruction text handed to the text generator
    pub prompt_template: String,
    /// Keys of externally supplied inputs this section needs
    #[serde(default)]
    pub required_inputs: BTreeSet<String>,
    /// QA rules, evaluated in order
    pub qa_rules: Vec<QaRule>,
    /// Sections whose content feeds this one
    #[serde(default)]
    pub depends_on: BTreeSet<SectionId>,
    /// Word count target
    pub word_target: TargetRange,
    /// Inline citation target
    pub citation_target: TargetRange,
    /// Elements the content must cover, in presentation order
    #[serde(default)]
    pub required_elements: Vec<String>,
}

impl SectionDefinition {
    /// Whether a required field is empty
    #[must_use]
    pub fn is_field_empty(&self, field: FieldName) -> bool {
        match field {
            FieldName::Title => self.title.trim().is_empty(),
            FieldName::PromptTemplate => self.prompt_template.trim().is_empty(),
            FieldName::QaRules => self.qa_rules.is_empty(),
            FieldName::RequiredInputs => self.required_inputs.is_empty(),
            FieldName::DependsOn => self.depends_on.is_empty(),
            FieldName::RequiredElements => self.required_elements.is_empty(),
            FieldName::WordTarget | FieldName::CitationTarget => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_id_range() {
        assert!(SectionId::new(0).is_err());
        assert!(SectionId::new(12).is_err());
        assert_eq!(SectionId::new(11).unwrap().get(), 11);
        assert_eq!(SectionId::all().count(), 11);
    }

    #[test]
    fn section_id_serde_rejects_out_of_range() {
        let ok: SectionId = serde_json::from_str("4").unwrap();
        assert_eq!(ok.get(), 4);
        assert!(serde_json::from_str::<SectionId>("12").is_err());
        assert!(serde_json::from_str::<SectionId>("0").is_err());
    }

    #[test]
    fn section_id_parses_from_str() {
        assert_eq!("7".parse::<SectionId>().unwrap().get(), 7);
        assert!("seven".parse::<SectionId>().is_err());
    }

    #[test]
    fn field_name_round_trip() {
        for field in FieldName::ALL {
            assert_eq!(field.as_str().parse::<FieldName>().unwrap(), field);
        }
        assert_eq!(
            "id".parse::<FieldName>(),
            Err(SchemaError::UnknownField("id".into()))
        );
    }

    #[test]
    fn target_range_validation() {
        assert!(TargetRange::new(10, 5).is_err());
        assert_eq!(TargetRange::new(5, 5).unwrap().to_string(), "5-5");
    }
}

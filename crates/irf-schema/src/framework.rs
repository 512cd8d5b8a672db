//! Sector frameworks and their per-section overrides

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Identifier of a framework, e.g. `semiconductor_fabless`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FrameworkId(String);

impl FrameworkId {
    /// Id of the framework that applies no overrides
    pub const BASE: &'static str = "base";

    /// Parse an id; only `[a-z0-9_]+` is accepted
    ///
    /// # Errors
    /// Returns [`SchemaError::InvalidFrameworkId`] for anything else
    pub fn parse(id: impl Into<String>) -> Result<Self, SchemaError> {
        let id = id.into();
        let valid = !id.is_empty()
            && id
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
        if valid {
            Ok(Self(id))
        } else {
            Err(SchemaError::InvalidFrameworkId(id))
        }
    }

    /// Borrow as `&str`
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for FrameworkId {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<FrameworkId> for String {
    fn from(id: FrameworkId) -> Self {
        id.0
    }
}

impl FromStr for FrameworkId {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for FrameworkId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Field replacements for one section
///
/// `section_id` and the field names are kept raw so that an override can be
/// read from any document; the resolver validates both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Override {
    /// Target section (must be within 1..=11 to resolve)
    pub section_id: u32,
    /// Field name to replacement value
    pub fields: IndexMap<String, serde_json::Value>,
}

impl Override {
    /// Empty override for a section
    #[must_use]
    pub fn new(section_id: u32) -> Self {
        Self {
            section_id,
            fields: IndexMap::new(),
        }
    }

    /// Add or replace one field
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(field.into(), value);
        self
    }

    /// Whether the override replaces nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A named sector framework
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Framework {
    /// Unique id
    pub id: FrameworkId,
    /// Sector label
    pub sector: String,
    /// Display name
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    overrides: BTreeMap<u32, Override>,
}

impl Framework {
    /// Framework with no overrides
    #[must_use]
    pub fn new(id: FrameworkId, sector: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            sector: sector.into(),
            name: name.into(),
            description: String::new(),
            overrides: BTreeMap::new(),
        }
    }

    /// The override-free base framework
    #[must_use]
    pub fn base() -> Self {
        Self::new(
            FrameworkId(FrameworkId::BASE.to_string()),
            "general",
            "Base Framework",
        )
    }

    /// Builder: set description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder: add an override, replacing any existing one for that section
    #[must_use]
    pub fn with_override(mut self, ov: Override) -> Self {
        self.set_override(ov);
        self
    }

    /// Insert an override, returning the one it replaced
    pub fn set_override(&mut self, ov: Override) -> Option<Override> {
        self.overrides.insert(ov.section_id, ov)
    }

    /// Remove the override for a section
    pub fn remove_override(&mut self, section_id: u32) -> Option<Override> {
        self.overrides.remove(&section_id)
    }

    /// Override for a section, if any
    #[must_use]
    pub fn override_for(&self, section_id: u32) -> Option<&Override> {
        self.overrides.get(&section_id)
    }

    /// Overrides in ascending section order
    pub fn overrides(&self) -> impl Iterator<Item = &Override> {
        self.overrides.values()
    }

    /// Number of overridden sections
    #[inline]
    #[must_use]
    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }

    /// Copy under a new id and name; the override map is duplicated by value
    #[must_use]
    pub fn clone_as(&self, id: FrameworkId, name: Option<String>) -> Self {
        Self {
            id,
            sector: self.sector.clone(),
            name: name.unwrap_or_else(|| format!("Copy of {}", self.name)),
            description: self.description.clone(),
            overrides: self.overrides.clone(),
        }
    }
}

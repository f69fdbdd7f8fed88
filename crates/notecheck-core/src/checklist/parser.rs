//! Checklist parsing from YAML/JSON.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::overrides::MeetingTypeOverride;
use crate::types::Severity;

/// Origin label used for checklists that did not come from a file.
pub const INLINE_ORIGIN: &str = "<inline>";

/// Errors that can occur when loading or resolving checklists.
#[derive(Error, Debug)]
pub enum ChecklistError {
    #[error("Failed to read checklist file {path}: {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(
        "Checklist (source: {origin}) is missing required top-level fields: {}",
        .fields.join(", ")
    )]
    MissingFields { origin: String, fields: Vec<String> },

    #[error("Checklist (source: {origin}) field '{field}' {reason}")]
    InvalidField {
        origin: String,
        field: String,
        reason: String,
    },

    #[error("Checklist (source: {origin}) 'elements' must be a non-empty list")]
    EmptyElements { origin: String },

    #[error(
        "Checklist (source: {origin}) element[{index}] (id={element_id}) is missing required fields: {}",
        .fields.join(", ")
    )]
    MissingElementFields {
        origin: String,
        index: usize,
        element_id: String,
        fields: Vec<String>,
    },

    #[error(
        "Checklist (source: {origin}) element[{index}] (id={element_id}) has invalid severity '{value}'. \
         Must be one of: critical, high, medium, low"
    )]
    InvalidSeverity {
        origin: String,
        index: usize,
        element_id: String,
        value: String,
    },

    #[error("Checklist (source: {origin}) element[{index}] (id={element_id}) field '{field}' {reason}")]
    InvalidElementField {
        origin: String,
        index: usize,
        element_id: String,
        field: String,
        reason: String,
    },

    #[error("Checklist (source: {origin}) has duplicate element id '{element_id}'")]
    DuplicateElementId { origin: String, element_id: String },

    #[error("Checklist (source: {origin}) meeting type '{meeting_type}': {reason}")]
    InvalidOverride {
        origin: String,
        meeting_type: String,
        reason: String,
    },

    #[error("Checklist validation failed: {0}")]
    ValidationError(String),

    #[error("Checklist '{reference}' not found. {hint}")]
    NotFound { reference: String, hint: String },
}

/// One checklist requirement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Element {
    /// Unique identifier within the checklist
    pub id: String,

    /// Optional human-readable label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Plain-English requirement
    pub description: String,

    /// Whether the element must be present for the note to pass
    pub required: bool,

    /// Compliance impact if absent or partial
    pub severity: Severity,

    /// Reviewer guidance for the outbound request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,

    /// Phrases that would count as evidence
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,

    /// Phrases that do not count as evidence
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anti_patterns: Vec<String>,
}

impl Element {
    /// Human-readable name, derived from the id when not set.
    ///
    /// `client_objectives` becomes `Client Objectives`.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.trim().to_string();
        }

        self.id
            .split(|c: char| c == '_' || c == '-')
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A regulatory checklist (framework).
///
/// Elements are reference-counted so derived checklists (see
/// [`Checklist::apply_meeting_type`]) share every element they do not change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checklist {
    /// Checklist identifier
    #[serde(rename = "framework_id", alias = "id")]
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Checklist version; numeric YAML versions are kept as text
    #[serde(deserialize_with = "scalar_to_string")]
    pub version: String,

    /// Regulator or standards body
    pub regulator: String,

    /// Detailed description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Ordered requirements
    pub elements: Vec<Arc<Element>>,

    /// Per-meeting-type element overrides
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meeting_type_overrides: BTreeMap<String, MeetingTypeOverride>,
}

impl Checklist {
    /// Parse a checklist from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ChecklistError> {
        Self::from_yaml_with_origin(yaml, INLINE_ORIGIN)
    }

    /// Parse a checklist from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ChecklistError> {
        Self::from_json_with_origin(json, INLINE_ORIGIN)
    }

    /// Parse a checklist from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ChecklistError> {
        let path = path.as_ref();
        let contents = read_checklist_file(path)?;
        Self::from_yaml_with_origin(&contents, &path.display().to_string())
    }

    /// Parse a checklist from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ChecklistError> {
        let path = path.as_ref();
        let contents = read_checklist_file(path)?;
        Self::from_json_with_origin(&contents, &path.display().to_string())
    }

    pub(crate) fn from_yaml_with_origin(yaml: &str, origin: &str) -> Result<Self, ChecklistError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value, origin)
    }

    pub(crate) fn from_json_with_origin(json: &str, origin: &str) -> Result<Self, ChecklistError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value, origin)
    }

    /// Validate a raw document and convert it into a checklist.
    pub fn from_value(value: serde_json::Value, origin: &str) -> Result<Self, ChecklistError> {
        super::schema::validate_checklist_schema(&value, origin)?;
        let checklist: Checklist = serde_json::from_value(value)?;
        checklist.validate(origin)?;
        Ok(checklist)
    }

    /// Semantic checks that survive deserialization.
    fn validate(&self, origin: &str) -> Result<(), ChecklistError> {
        if self.id.trim().is_empty() {
            return Err(ChecklistError::MissingFields {
                origin: origin.to_string(),
                fields: vec!["framework_id".to_string()],
            });
        }

        for (index, element) in self.elements.iter().enumerate() {
            if element.id.trim().is_empty() {
                return Err(ChecklistError::InvalidElementField {
                    origin: origin.to_string(),
                    index,
                    element_id: "<empty>".to_string(),
                    field: "id".to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Find an element by id.
    pub fn element(&self, id: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == id).map(|e| e.as_ref())
    }

    /// Number of required elements.
    pub fn required_count(&self) -> usize {
        self.elements.iter().filter(|e| e.required).count()
    }

    /// Meeting types this checklist defines overrides for.
    pub fn meeting_types(&self) -> impl Iterator<Item = &str> {
        self.meeting_type_overrides.keys().map(String::as_str)
    }
}

fn read_checklist_file(path: &Path) -> Result<String, ChecklistError> {
    fs::read_to_string(path).map_err(|source| ChecklistError::IoError {
        path: path.display().to_string(),
        source,
    })
}

fn scalar_to_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => Err(D::Error::custom(format!("expected a scalar version, got {}", other))),
    }
}

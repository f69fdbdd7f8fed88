//! Structural validation of raw checklist documents.
//!
//! Runs on the untyped document before deserialization so errors can name
//! the offending field and element instead of surfacing a bare serde message.

use serde_json::{Map, Value};
use std::collections::HashSet;

use super::parser::ChecklistError;
use crate::types::Severity;

const REQUIRED_TOP_LEVEL: &[&str] = &["framework_id", "name", "version", "regulator", "elements"];
const REQUIRED_ELEMENT_FIELDS: &[&str] = &["id", "description", "required", "severity"];

/// Validate a raw checklist document.
pub(crate) fn validate_checklist_schema(doc: &Value, origin: &str) -> Result<(), ChecklistError> {
    let root = doc.as_object().ok_or_else(|| {
        ChecklistError::ValidationError(format!(
            "checklist (source: {}) must be a mapping at the top level",
            origin
        ))
    })?;

    let missing: Vec<String> = REQUIRED_TOP_LEVEL
        .iter()
        .filter(|field| match **field {
            // `id` is accepted as a shorthand for `framework_id`
            "framework_id" => !root.contains_key("framework_id") && !root.contains_key("id"),
            other => !root.contains_key(other),
        })
        .map(|field| field.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ChecklistError::MissingFields {
            origin: origin.to_string(),
            fields: missing,
        });
    }

    validate_top_level_types(root, origin)?;

    let elements = match root.get("elements") {
        Some(Value::Array(items)) if !items.is_empty() => items,
        _ => {
            return Err(ChecklistError::EmptyElements {
                origin: origin.to_string(),
            })
        }
    };

    let mut seen = HashSet::new();
    for (index, element) in elements.iter().enumerate() {
        let element_id = element
            .get("id")
            .map(display_scalar)
            .unwrap_or_else(|| "<unknown>".to_string());

        let fields = element.as_object().ok_or_else(|| ChecklistError::InvalidElementField {
            origin: origin.to_string(),
            index,
            element_id: element_id.clone(),
            field: "element".to_string(),
            reason: "must be a mapping".to_string(),
        })?;

        validate_element(fields, index, &element_id, origin)?;

        if !seen.insert(element_id.clone()) {
            return Err(ChecklistError::DuplicateElementId {
                origin: origin.to_string(),
                element_id,
            });
        }
    }

    if let Some(overrides) = root.get("meeting_type_overrides") {
        validate_overrides(overrides, origin)?;
    }

    Ok(())
}

fn validate_element(
    fields: &Map<String, Value>,
    index: usize,
    element_id: &str,
    origin: &str,
) -> Result<(), ChecklistError> {
    let missing: Vec<String> = REQUIRED_ELEMENT_FIELDS
        .iter()
        .filter(|field| !fields.contains_key(**field))
        .map(|field| field.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ChecklistError::MissingElementFields {
            origin: origin.to_string(),
            index,
            element_id: element_id.to_string(),
            fields: missing,
        });
    }

    let invalid = |field: &str, reason: &str| ChecklistError::InvalidElementField {
        origin: origin.to_string(),
        index,
        element_id: element_id.to_string(),
        field: field.to_string(),
        reason: reason.to_string(),
    };

    if !fields["id"].is_string() {
        return Err(invalid("id", "must be a string"));
    }
    if !fields["description"].is_string() {
        return Err(invalid("description", "must be a string"));
    }
    if !fields["required"].is_boolean() {
        return Err(invalid("required", "must be true or false"));
    }
    for field in ["name", "guidance"] {
        if fields.get(field).is_some_and(|v| !v.is_null() && !v.is_string()) {
            return Err(invalid(field, "must be a string"));
        }
    }
    for field in ["examples", "anti_patterns"] {
        if fields.get(field).is_some_and(|v| !is_string_list(v)) {
            return Err(invalid(field, "must be a list of strings"));
        }
    }

    let severity = &fields["severity"];
    if severity.as_str().and_then(Severity::parse).is_none() {
        return Err(ChecklistError::InvalidSeverity {
            origin: origin.to_string(),
            index,
            element_id: element_id.to_string(),
            value: display_scalar(severity),
        });
    }

    Ok(())
}

fn validate_top_level_types(root: &Map<String, Value>, origin: &str) -> Result<(), ChecklistError> {
    let invalid = |field: &str, reason: &str| ChecklistError::InvalidField {
        origin: origin.to_string(),
        field: field.to_string(),
        reason: reason.to_string(),
    };

    for field in ["framework_id", "id", "name", "regulator"] {
        if root.get(field).is_some_and(|v| !v.is_string()) {
            return Err(invalid(field, "must be a string"));
        }
    }
    if root
        .get("version")
        .is_some_and(|v| !(v.is_string() || v.is_number() || v.is_boolean()))
    {
        return Err(invalid("version", "must be a string or number"));
    }
    if root.get("description").is_some_and(|v| !v.is_null() && !v.is_string()) {
        return Err(invalid("description", "must be a string"));
    }

    Ok(())
}

fn is_string_list(value: &Value) -> bool {
    value
        .as_array()
        .is_some_and(|items| items.iter().all(Value::is_string))
}

fn validate_overrides(overrides: &Value, origin: &str) -> Result<(), ChecklistError> {
    let invalid = |meeting_type: &str, reason: String| ChecklistError::InvalidOverride {
        origin: origin.to_string(),
        meeting_type: meeting_type.to_string(),
        reason,
    };

    let by_type = match overrides {
        Value::Null => return Ok(()),
        Value::Object(map) => map,
        _ => return Err(invalid("*", "meeting_type_overrides must be a mapping".to_string())),
    };

    for (meeting_type, body) in by_type {
        let elements = match body.get("elements") {
            None | Some(Value::Null) => continue,
            Some(Value::Object(map)) => map,
            Some(_) => return Err(invalid(meeting_type, "'elements' must be a mapping".to_string())),
        };

        for (element_id, fragment) in elements {
            if let Some(required) = fragment.get("required") {
                if !required.is_boolean() {
                    return Err(invalid(
                        meeting_type,
                        format!("element '{}' has a non-boolean 'required'", element_id),
                    ));
                }
            }
            if let Some(severity) = fragment.get("severity") {
                if severity.as_str().and_then(Severity::parse).is_none() {
                    return Err(invalid(
                        meeting_type,
                        format!(
                            "element '{}' has invalid severity '{}'",
                            element_id,
                            display_scalar(severity)
                        ),
                    ));
                }
            }
        }
    }

    Ok(())
}

fn display_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

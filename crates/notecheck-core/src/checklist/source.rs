//! Resolving checklist references to checklists.
//!
//! A reference is either a file path or the id of a checklist bundled with
//! this crate. Resolution happens once per run, before any request is made.

use std::path::Path;

use super::parser::{Checklist, ChecklistError};

/// Checklists compiled into the crate, keyed by id.
const BUILTIN_CHECKLISTS: &[(&str, &str)] = &[(
    "fca_suitability_v1",
    include_str!("../../checklists/fca_suitability_v1.yaml"),
)];

const FILE_SUFFIXES: &[&str] = &[".yaml", ".yml", ".json"];

/// Ids of the bundled checklists.
pub fn builtin_ids() -> impl Iterator<Item = &'static str> {
    BUILTIN_CHECKLISTS.iter().map(|(id, _)| *id)
}

/// Load a bundled checklist by id.
pub fn builtin_checklist(id: &str) -> Result<Checklist, ChecklistError> {
    let (_, yaml) = BUILTIN_CHECKLISTS
        .iter()
        .find(|(builtin, _)| *builtin == id)
        .ok_or_else(|| ChecklistError::NotFound {
            reference: id.to_string(),
            hint: format!(
                "Built-in checklists: {}. If you meant a file, make sure the path ends in \
                 '.yaml', '.yml' or '.json', or contains a path separator.",
                builtin_ids().collect::<Vec<_>>().join(", ")
            ),
        })?;

    Checklist::from_yaml_with_origin(yaml, &format!("builtin:{}", id))
}

/// Whether a reference should be treated as a file path.
///
/// Any known checklist suffix or a path separator is sufficient.
pub fn is_file_reference(reference: &str) -> bool {
    let lower = reference.to_lowercase();
    FILE_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
        || reference.contains('/')
        || reference.contains('\\')
        || reference.contains(std::path::MAIN_SEPARATOR)
}

/// Resolve a checklist reference: a file path or a built-in id.
pub fn resolve_checklist(reference: &str) -> Result<Checklist, ChecklistError> {
    if !is_file_reference(reference) {
        return builtin_checklist(reference);
    }

    let path = Path::new(reference);
    if !path.exists() {
        return Err(ChecklistError::NotFound {
            reference: reference.to_string(),
            hint: "Check that the path is correct and the file exists.".to_string(),
        });
    }

    let is_json = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        Checklist::from_json_file(path)
    } else {
        Checklist::from_yaml_file(path)
    }
}

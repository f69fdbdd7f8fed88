//! Meeting-type overrides.
//!
//! A checklist may carry alternate required/severity profiles keyed by
//! meeting type. Applying one never touches the source checklist: the result
//! is a new checklist that shares every unchanged element with its source.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::parser::{Checklist, Element};
use crate::types::Severity;

/// Override fragments for one meeting type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MeetingTypeOverride {
    /// Why this meeting type differs from the base checklist
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Element id -> replacement fields
    #[serde(default)]
    pub elements: BTreeMap<String, ElementOverride>,
}

/// Replacement fields for one element. Unset fields keep the base value.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ElementOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

impl ElementOverride {
    fn apply(&self, base: &Element) -> Element {
        let mut element = base.clone();
        if let Some(required) = self.required {
            element.required = required;
        }
        if let Some(severity) = self.severity {
            element.severity = severity;
        }
        element
    }

    fn changes(&self, base: &Element) -> bool {
        self.required.is_some_and(|r| r != base.required)
            || self.severity.is_some_and(|s| s != base.severity)
    }
}

/// The checklist actually used for an assessment.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveChecklist {
    /// Checklist with overrides applied
    pub checklist: Checklist,

    /// Meeting type whose overrides were applied, if any
    pub meeting_type: Option<String>,
}

impl Checklist {
    /// Resolve the effective checklist for a meeting type.
    ///
    /// - `None` returns the base checklist and no meeting type.
    /// - An unknown meeting type is a silent no-op: the base checklist and no
    ///   meeting type, indistinguishable from `None`.
    /// - A known meeting type returns a derived checklist with the override
    ///   fields replaced on the named elements.
    pub fn apply_meeting_type(&self, meeting_type: Option<&str>) -> EffectiveChecklist {
        let Some(requested) = meeting_type else {
            return EffectiveChecklist {
                checklist: self.clone(),
                meeting_type: None,
            };
        };

        let Some(profile) = self.meeting_type_overrides.get(requested) else {
            tracing::debug!(
                checklist = %self.id,
                meeting_type = requested,
                "No overrides defined for meeting type; using base checklist"
            );
            return EffectiveChecklist {
                checklist: self.clone(),
                meeting_type: None,
            };
        };

        for element_id in profile.elements.keys() {
            if self.element(element_id).is_none() {
                tracing::warn!(
                    checklist = %self.id,
                    meeting_type = requested,
                    element_id = %element_id,
                    "Override names an element that is not in the checklist; ignoring"
                );
            }
        }

        let elements = self
            .elements
            .iter()
            .map(|element| match profile.elements.get(&element.id) {
                Some(fragment) if fragment.changes(element) => Arc::new(fragment.apply(element)),
                _ => Arc::clone(element),
            })
            .collect();

        EffectiveChecklist {
            checklist: Checklist {
                elements,
                ..self.clone()
            },
            meeting_type: Some(requested.to_string()),
        }
    }
}

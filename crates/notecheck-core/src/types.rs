//! Core types for gap assessment.
//!
//! These are the data structures passed between the response parser, the
//! aggregator and the report sink. Every value here is produced once and
//! never mutated afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Impact tier of a checklist element.
///
/// Ordered from most to least severe so sorting puts critical gaps first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// All severities, most severe first.
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }

    /// Parse a severity label exactly as it appears in a checklist.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "critical" => Some(Severity::Critical),
            "high" => Some(Severity::High),
            "medium" => Some(Severity::Medium),
            "low" => Some(Severity::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an element was found in the note.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ElementStatus {
    Present,
    Partial,
    Missing,
}

impl ElementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementStatus::Present => "present",
            ElementStatus::Partial => "partial",
            ElementStatus::Missing => "missing",
        }
    }

    /// A gap is anything short of fully present.
    pub fn is_gap(&self) -> bool {
        !matches!(self, ElementStatus::Present)
    }
}

impl fmt::Display for ElementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-facing compliance rating.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OverallRating {
    /// Passed with every element present.
    #[serde(rename = "Compliant")]
    Compliant,

    /// Passed, but at least one element is partial or missing.
    #[serde(rename = "Minor Gaps")]
    MinorGaps,

    /// Failed without any critical blocker.
    #[serde(rename = "Requires Attention")]
    RequiresAttention,

    /// Failed because of a critical required element.
    #[serde(rename = "Non-Compliant")]
    NonCompliant,
}

impl OverallRating {
    pub fn label(&self) -> &'static str {
        match self {
            OverallRating::Compliant => "Compliant",
            OverallRating::MinorGaps => "Minor Gaps",
            OverallRating::RequiresAttention => "Requires Attention",
            OverallRating::NonCompliant => "Non-Compliant",
        }
    }
}

impl fmt::Display for OverallRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Assessment of a single checklist element.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementResult {
    /// Element id as defined in the checklist
    pub element_id: String,

    /// Human-readable element name
    pub name: String,

    /// Present, partial or missing
    pub status: ElementStatus,

    /// Reconciled score, nominally 0.0 to 1.0 (not clamped)
    pub score: f64,

    /// Supporting text from the note.
    ///
    /// `None` exactly when `status` is missing. `Some("")` means the element
    /// was found but there was nothing quotable.
    pub evidence: Option<String>,

    /// Severity copied from the effective element definition
    pub severity: Severity,

    /// Required flag copied from the effective element definition
    pub required: bool,

    /// Reviewer commentary, only captured in verbose mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Up to three remediation suggestions; always empty when present
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl ElementResult {
    /// Whether this result counts as a gap.
    pub fn is_gap(&self) -> bool {
        self.status.is_gap()
    }
}

/// Summary counts over a set of element results.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComplianceStats {
    pub total_elements: usize,
    pub required_elements: usize,
    pub present_count: usize,
    pub partial_count: usize,
    pub missing_count: usize,
    pub critical_gaps: usize,
    pub high_gaps: usize,
    pub medium_gaps: usize,
    pub low_gaps: usize,
    /// Required elements that are partial or missing
    pub required_missing_count: usize,
}

impl ComplianceStats {
    /// Gap count for one severity tier.
    pub fn gaps_for(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical_gaps,
            Severity::High => self.high_gaps,
            Severity::Medium => self.medium_gaps,
            Severity::Low => self.low_gaps,
        }
    }

    /// Elements that are partial or missing, regardless of severity.
    pub fn gap_count(&self) -> usize {
        self.partial_count + self.missing_count
    }
}

/// The assembled outcome of one assessment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    /// Checklist the note was assessed against
    pub checklist_id: String,

    /// Version of that checklist
    pub checklist_version: String,

    /// Pass/fail under the active pass policy
    pub passed: bool,

    /// Weighted mean score (required x2, optional x1)
    pub overall_score: f64,

    /// Rating derived from `passed` and the result list
    pub overall_rating: OverallRating,

    /// One result per effective element, in checklist order
    pub results: Vec<ElementResult>,

    /// Narrative summary, generated or templated
    pub summary: String,

    /// Derived counts
    pub stats: ComplianceStats,

    /// Meeting type whose overrides were actually applied
    #[serde(default)]
    pub meeting_type: Option<String>,

    /// Whether PII redaction ran on the note before assessment
    #[serde(default)]
    pub pii_redacted: bool,

    /// When the report was assembled
    pub evaluated_at: DateTime<Utc>,

    /// Audit fields (model, provider, evaluation_time, caller keys)
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl ComplianceReport {
    /// Results that are not fully present, in checklist order.
    pub fn gaps(&self) -> impl Iterator<Item = &ElementResult> {
        self.results.iter().filter(|r| r.is_gap())
    }

    /// Look up the result for one element.
    pub fn result(&self, element_id: &str) -> Option<&ElementResult> {
        self.results.iter().find(|r| r.element_id == element_id)
    }
}

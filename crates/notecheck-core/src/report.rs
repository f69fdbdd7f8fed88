//! Report documents: the externally visible shape of a [`ComplianceReport`].
//!
//! These types carry no semantics. They are plain data for JSON writers and
//! other sinks, converted from the core report in one place.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{ComplianceReport, ComplianceStats, ElementResult, ElementStatus, OverallRating, Severity};

/// Checklist identity as written in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkRef {
    pub id: String,
    pub version: String,
}

/// One element entry in a report document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDocument {
    pub id: String,
    pub name: String,
    pub status: ElementStatus,
    pub severity: Severity,
    pub score: f64,
    /// `null` exactly when the element is missing
    pub evidence: Option<String>,
    pub suggestions: Vec<String>,
}

/// Full report document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub framework: FrameworkRef,
    pub meeting_type: Option<String>,
    pub overall_score: f64,
    pub overall_rating: OverallRating,
    pub severity_summary: ComplianceStats,
    pub elements: Vec<ElementDocument>,
    pub metadata: BTreeMap<String, String>,
}

/// Report document without per-element entries, for batch listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryDocument {
    pub framework: FrameworkRef,
    pub meeting_type: Option<String>,
    pub passed: bool,
    pub overall_score: f64,
    pub overall_rating: OverallRating,
    pub severity_summary: ComplianceStats,
    pub summary: String,
    pub metadata: BTreeMap<String, String>,
}

impl From<&ElementResult> for ElementDocument {
    fn from(result: &ElementResult) -> Self {
        Self {
            id: result.element_id.clone(),
            name: result.name.clone(),
            status: result.status,
            severity: result.severity,
            score: result.score,
            evidence: match result.status {
                ElementStatus::Missing => None,
                _ => Some(result.evidence.clone().unwrap_or_default()),
            },
            suggestions: result.suggestions.clone(),
        }
    }
}

/// `framework_version` first, then report metadata on top of it.
fn document_metadata(report: &ComplianceReport) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    metadata.insert("framework_version".to_string(), report.checklist_version.clone());
    metadata.extend(report.metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
    metadata
}

fn framework_ref(report: &ComplianceReport) -> FrameworkRef {
    FrameworkRef {
        id: report.checklist_id.clone(),
        version: report.checklist_version.clone(),
    }
}

impl From<&ComplianceReport> for ReportDocument {
    fn from(report: &ComplianceReport) -> Self {
        Self {
            framework: framework_ref(report),
            meeting_type: report.meeting_type.clone(),
            overall_score: report.overall_score,
            overall_rating: report.overall_rating,
            severity_summary: report.stats,
            elements: report.results.iter().map(ElementDocument::from).collect(),
            metadata: document_metadata(report),
        }
    }
}

impl From<&ComplianceReport> for SummaryDocument {
    fn from(report: &ComplianceReport) -> Self {
        Self {
            framework: framework_ref(report),
            meeting_type: report.meeting_type.clone(),
            passed: report.passed,
            overall_score: report.overall_score,
            overall_rating: report.overall_rating,
            severity_summary: report.stats,
            summary: report.summary.clone(),
            metadata: document_metadata(report),
        }
    }
}

impl ComplianceReport {
    /// The report as a plain document.
    pub fn to_document(&self) -> ReportDocument {
        self.into()
    }

    /// The report document as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_document())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::Value;

    fn report() -> ComplianceReport {
        let mut metadata = BTreeMap::new();
        metadata.insert("model".to_string(), "test-model".to_string());
        metadata.insert("note_id".to_string(), "N-1".to_string());

        ComplianceReport {
            checklist_id: "fw".to_string(),
            checklist_version: "1.0.0".to_string(),
            passed: false,
            overall_score: 0.45,
            overall_rating: OverallRating::NonCompliant,
            results: vec![
                ElementResult {
                    element_id: "a".to_string(),
                    name: "A".to_string(),
                    status: ElementStatus::Present,
                    score: 0.9,
                    evidence: Some("quoted".to_string()),
                    severity: Severity::Critical,
                    required: true,
                    notes: Some("internal".to_string()),
                    suggestions: Vec::new(),
                },
                ElementResult {
                    element_id: "b".to_string(),
                    name: "B".to_string(),
                    status: ElementStatus::Missing,
                    score: 0.0,
                    evidence: None,
                    severity: Severity::Critical,
                    required: true,
                    notes: None,
                    suggestions: vec!["Ask".to_string()],
                },
            ],
            summary: "Summary".to_string(),
            stats: ComplianceStats {
                total_elements: 2,
                required_elements: 2,
                present_count: 1,
                missing_count: 1,
                critical_gaps: 1,
                required_missing_count: 1,
                ..ComplianceStats::default()
            },
            meeting_type: None,
            pii_redacted: false,
            evaluated_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            metadata,
        }
    }

    #[test]
    fn test_top_level_keys() {
        let value = serde_json::to_value(report().to_document()).unwrap();
        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "elements",
                "framework",
                "meeting_type",
                "metadata",
                "overall_rating",
                "overall_score",
                "severity_summary"
            ]
        );
        assert_eq!(value["framework"]["id"], "fw");
        assert_eq!(value["framework"]["version"], "1.0.0");
        assert_eq!(value["overall_rating"], "Non-Compliant");
        assert_eq!(value["meeting_type"], Value::Null);
        assert_eq!(value["severity_summary"]["critical_gaps"], 1);
    }

    #[test]
    fn test_evidence_null_exactly_when_missing() {
        let value = serde_json::to_value(report().to_document()).unwrap();
        assert_eq!(value["elements"][0]["evidence"], "quoted");
        assert_eq!(value["elements"][1]["evidence"], Value::Null);
        assert_eq!(value["elements"][1]["status"], "missing");
        // Notes and required are not part of the element document
        assert!(value["elements"][0].get("notes").is_none());
    }

    #[test]
    fn test_metadata_includes_framework_version_and_caller_wins() {
        let mut report = report();
        let doc = report.to_document();
        assert_eq!(doc.metadata.get("framework_version").map(String::as_str), Some("1.0.0"));
        assert_eq!(doc.metadata.get("note_id").map(String::as_str), Some("N-1"));

        report
            .metadata
            .insert("framework_version".to_string(), "override".to_string());
        let doc = report.to_document();
        assert_eq!(doc.metadata.get("framework_version").map(String::as_str), Some("override"));
    }

    #[test]
    fn test_summary_document_omits_elements() {
        let value = serde_json::to_value(SummaryDocument::from(&report())).unwrap();
        assert!(value.get("elements").is_none());
        assert_eq!(value["passed"], false);
        assert_eq!(value["summary"], "Summary");
    }

    #[test]
    fn test_json_pretty_is_indented() {
        let json = report().to_json_pretty().unwrap();
        assert!(json.starts_with("{\n  \"framework\""));
        assert!(json.contains("\"overall_rating\": \"Non-Compliant\""));
    }
}

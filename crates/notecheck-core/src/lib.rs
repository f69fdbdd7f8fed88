//! # notecheck-core
//!
//! Deterministic gap assessment for compliance notes.
//!
//! This crate turns per-element replies from a reviewer into a compliance
//! report, answering:
//! - Which checklist elements does the note evidence?
//! - Which gaps block a pass?
//! - How should the note be rated overall?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same replies and policy always produce the same report
//! 2. **No network calls**: Request issuing lives in `notecheck-runtime`
//! 3. **Never fails on a reply**: Unreadable replies degrade to `missing`
//! 4. **Immutable checklists**: Meeting-type overrides build a new checklist
//!
//! ## Example
//!
//! ```rust,ignore
//! use notecheck_core::{resolve_checklist, Aggregator, PassPolicy, ResponseParser};
//!
//! let checklist = resolve_checklist("fca_suitability_v1")?;
//! let effective = checklist.apply_meeting_type(Some("annual_review"));
//!
//! let parser = ResponseParser::new(PassPolicy::default());
//! let results: Vec<_> = effective
//!     .checklist
//!     .elements
//!     .iter()
//!     .zip(replies)
//!     .map(|(element, reply)| parser.parse(&reply, element))
//!     .collect();
//!
//! let verdict = Aggregator::new(PassPolicy::default()).verdict(&results);
//! println!("{} ({:.0}%)", verdict.overall_rating, verdict.overall_score * 100.0);
//! ```

pub mod aggregator;
pub mod checklist;
pub mod policy;
pub mod redaction;
pub mod report;
pub mod response;
pub mod types;

// Re-export main types at crate root
pub use aggregator::{fallback_summary, Aggregator, Verdict};
pub use checklist::{
    builtin_checklist, builtin_ids, resolve_checklist, Checklist, ChecklistError,
    EffectiveChecklist, Element, ElementOverride, MeetingTypeOverride,
};
pub use policy::PassPolicy;
pub use redaction::{PiiKind, Redaction, Redactor};
pub use report::{ElementDocument, FrameworkRef, ReportDocument, SummaryDocument};
pub use response::ResponseParser;
pub use types::{
    ComplianceReport, ComplianceStats, ElementResult, ElementStatus, OverallRating, Severity,
};

use chrono::{DateTime, Utc};

/// Assess a note from replies that have already been collected.
///
/// `replies` pairs each element id with the raw reply text. Elements with no
/// reply are assessed as an empty reply, which degrades to `missing`.
/// The summary is templated from the counts.
pub fn assess_replies_at(
    checklist: &Checklist,
    meeting_type: Option<&str>,
    replies: &[(&str, &str)],
    policy: PassPolicy,
    evaluated_at: DateTime<Utc>,
) -> ComplianceReport {
    let effective = checklist.apply_meeting_type(meeting_type);
    let parser = ResponseParser::new(policy);

    let results: Vec<ElementResult> = effective
        .checklist
        .elements
        .iter()
        .map(|element| {
            let reply = replies
                .iter()
                .rev()
                .find(|(id, _)| *id == element.id)
                .map(|(_, text)| *text)
                .unwrap_or("");
            parser.parse(reply, element)
        })
        .collect();

    let aggregator = Aggregator::new(policy);
    let summary = fallback_summary(&aggregator.stats(&results));
    aggregator.aggregate_at(
        &effective.checklist,
        effective.meeting_type,
        results,
        summary,
        evaluated_at,
    )
}

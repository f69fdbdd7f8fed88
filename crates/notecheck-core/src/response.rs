//! Response parser: one raw reply in, one typed [`ElementResult`] out.
//!
//! Replies are expected in a label-delimited format:
//!
//! ```text
//! STATUS: present|partial|missing
//! SCORE: 0.0-1.0
//! EVIDENCE: <quote or "None found">
//! NOTES: <reasoning>
//! SUGGESTIONS: <first> | <second> | <third>
//! ```
//!
//! Labels are case-insensitive and must start a line. A value runs until the
//! next recognised label or the end of the text, so values may span lines.
//! When a label repeats, the last occurrence wins.
//!
//! Parsing never fails. Anything that cannot be interpreted degrades to
//! `missing` with a score of 0.0 and no evidence.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

use crate::checklist::Element;
use crate::policy::PassPolicy;
use crate::types::{ElementResult, ElementStatus};

/// Maximum number of suggestions kept per element.
pub const MAX_SUGGESTIONS: usize = 3;

lazy_static! {
    static ref LABEL_PATTERN: Regex = Regex::new(
        r"(?im)^[ \t]*(STATUS|SCORE|EVIDENCE|NOTES|SUGGESTIONS)[ \t]*:"
    ).unwrap();

    static ref FLOAT_PATTERN: Regex = Regex::new(
        r"-?(?:\d+(?:\.\d*)?|\.\d+)"
    ).unwrap();
}

/// A recognised reply label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Status,
    Score,
    Evidence,
    Notes,
    Suggestions,
}

impl Label {
    fn from_match(text: &str) -> Option<Self> {
        match text.to_ascii_uppercase().as_str() {
            "STATUS" => Some(Label::Status),
            "SCORE" => Some(Label::Score),
            "EVIDENCE" => Some(Label::Evidence),
            "NOTES" => Some(Label::Notes),
            "SUGGESTIONS" => Some(Label::Suggestions),
            _ => None,
        }
    }
}

/// Split a reply into label values.
///
/// Each value is the trimmed text between its label and the next label.
/// Text before the first label is ignored.
pub fn scan_labels(reply: &str) -> HashMap<Label, String> {
    let mut fields = HashMap::new();

    let matches: Vec<_> = LABEL_PATTERN.captures_iter(reply).collect();
    for (i, caps) in matches.iter().enumerate() {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Some(label) = Label::from_match(name.as_str()) else {
            continue;
        };

        let end = matches
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(reply.len());

        fields.insert(label, reply[whole.end()..end].trim().to_string());
    }

    fields
}

/// Normalise a raw STATUS value. Unrecognised text is `missing`.
pub fn parse_status(raw: &str) -> ElementStatus {
    let lower = raw.to_lowercase();
    if lower.contains("present") && !lower.contains("partial") {
        ElementStatus::Present
    } else if lower.contains("partial") {
        ElementStatus::Partial
    } else {
        ElementStatus::Missing
    }
}

/// First number-looking token in a raw SCORE value, or 0.0.
pub fn parse_score(raw: &str) -> f64 {
    FLOAT_PATTERN
        .find_iter(raw)
        .find_map(|m| m.as_str().parse::<f64>().ok())
        .filter(|score| score.is_finite())
        .unwrap_or(0.0)
}

/// Split a raw SUGGESTIONS value into at most [`MAX_SUGGESTIONS`] items.
pub fn parse_suggestions(raw: &str) -> Vec<String> {
    let separator = if raw.contains(" | ") { " | " } else { "|" };

    raw.split(separator)
        .map(str::trim)
        .filter(|part| {
            !part.is_empty()
                && !part.eq_ignore_ascii_case("none")
                && !part.eq_ignore_ascii_case("n/a")
        })
        .take(MAX_SUGGESTIONS)
        .map(str::to_string)
        .collect()
}

fn normalize_evidence(raw: Option<&str>) -> String {
    match raw {
        Some(text)
            if !text.is_empty()
                && !text.eq_ignore_ascii_case("none")
                && !text.eq_ignore_ascii_case("none found") =>
        {
            text.to_string()
        }
        _ => String::new(),
    }
}

/// Parses element replies under a pass policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser {
    policy: PassPolicy,
    verbose: bool,
}

impl ResponseParser {
    pub fn new(policy: PassPolicy) -> Self {
        Self {
            policy,
            verbose: false,
        }
    }

    /// Keep NOTES in the parsed results.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Turn one raw reply for `element` into a result.
    pub fn parse(&self, reply: &str, element: &Element) -> ElementResult {
        let fields = scan_labels(reply);
        let field = |label: Label| fields.get(&label).map(String::as_str);

        let status = parse_status(field(Label::Status).unwrap_or(""));
        let raw_score = parse_score(field(Label::Score).unwrap_or(""));
        let score = self.policy.reconcile_score(status, raw_score);

        if score != raw_score {
            tracing::debug!(
                element_id = %element.id,
                status = %status,
                reported = raw_score,
                corrected = score,
                "Reconciled score with status"
            );
        }
        if !fields.contains_key(&Label::Status) {
            tracing::debug!(element_id = %element.id, "Reply has no STATUS label; treating as missing");
        }

        let evidence = match status {
            ElementStatus::Missing => None,
            _ => Some(normalize_evidence(field(Label::Evidence))),
        };

        let notes = if self.verbose {
            field(Label::Notes)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
        } else {
            None
        };

        let suggestions = match status {
            ElementStatus::Present => Vec::new(),
            _ => field(Label::Suggestions)
                .map(parse_suggestions)
                .unwrap_or_default(),
        };

        ElementResult {
            element_id: element.id.clone(),
            name: element.display_name(),
            status,
            score,
            evidence,
            severity: element.severity,
            required: element.required,
            notes,
            suggestions,
        }
    }
}

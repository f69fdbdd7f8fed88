//! PII redaction applied to note text before assessment.
//!
//! ## Built-in Patterns
//!
//! | Kind | Pattern |
//! |------|---------|
//! | Email | local@domain.tld |
//! | Card | 16 digits in groups of four |
//! | NI number | UK National Insurance number (AB 12 34 56 C) |
//! | SSN | US Social Security Number (123-45-6789) |
//! | Phone | International, UK and US formats |
//! | Postcode | UK postcode (SW1A 1AA) |
//!
//! Patterns run in table order, so a card number is replaced before the
//! phone pattern can claim part of it.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

lazy_static! {
    static ref EMAIL_PATTERN: Regex = Regex::new(
        r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}"
    ).unwrap();

    static ref CARD_PATTERN: Regex = Regex::new(
        r"\b\d{4}[\s-]?\d{4}[\s-]?\d{4}[\s-]?\d{4}\b"
    ).unwrap();

    static ref NI_NUMBER_PATTERN: Regex = Regex::new(
        r"(?i)\b[A-CEGHJ-PR-TW-Z][A-CEGHJ-NPR-TW-Z]\s?\d{2}\s?\d{2}\s?\d{2}\s?[A-D]\b"
    ).unwrap();

    static ref SSN_PATTERN: Regex = Regex::new(
        r"\b\d{3}-\d{2}-\d{4}\b"
    ).unwrap();

    static ref PHONE_PATTERN: Regex = Regex::new(
        r"(?:\+\d{1,3}[\s.-]?|\b)(?:\(\d{2,5}\)|\d{2,5})[\s.-]?\d{3,4}[\s.-]?\d{3,4}\b"
    ).unwrap();

    static ref POSTCODE_PATTERN: Regex = Regex::new(
        r"\b[A-Z]{1,2}\d[A-Z\d]?\s*\d[A-Z]{2}\b"
    ).unwrap();
}

/// Category of personal data a pattern detects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiKind {
    Email,
    Card,
    NiNumber,
    Ssn,
    Phone,
    Postcode,
}

impl PiiKind {
    /// Every kind, in the order patterns are applied.
    pub const ALL: [PiiKind; 6] = [
        PiiKind::Email,
        PiiKind::Card,
        PiiKind::NiNumber,
        PiiKind::Ssn,
        PiiKind::Phone,
        PiiKind::Postcode,
    ];

    fn pattern(&self) -> &'static Regex {
        match self {
            PiiKind::Email => &*EMAIL_PATTERN,
            PiiKind::Card => &*CARD_PATTERN,
            PiiKind::NiNumber => &*NI_NUMBER_PATTERN,
            PiiKind::Ssn => &*SSN_PATTERN,
            PiiKind::Phone => &*PHONE_PATTERN,
            PiiKind::Postcode => &*POSTCODE_PATTERN,
        }
    }

    /// Replacement token, e.g. `[REDACTED_EMAIL]`.
    pub fn placeholder(&self) -> &'static str {
        match self {
            PiiKind::Email => "[REDACTED_EMAIL]",
            PiiKind::Card => "[REDACTED_CARD]",
            PiiKind::NiNumber => "[REDACTED_NI_NUMBER]",
            PiiKind::Ssn => "[REDACTED_SSN]",
            PiiKind::Phone => "[REDACTED_PHONE]",
            PiiKind::Postcode => "[REDACTED_POSTCODE]",
        }
    }
}

impl fmt::Display for PiiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PiiKind::Email => "email",
            PiiKind::Card => "card",
            PiiKind::NiNumber => "ni_number",
            PiiKind::Ssn => "ssn",
            PiiKind::Phone => "phone",
            PiiKind::Postcode => "postcode",
        };
        f.write_str(name)
    }
}

/// Redacted text plus how many matches of each kind were replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redaction {
    pub text: String,
    pub counts: BTreeMap<PiiKind, usize>,
}

impl Redaction {
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

/// Regex-based redactor over a chosen set of PII kinds.
#[derive(Debug, Clone)]
pub struct Redactor {
    kinds: Vec<PiiKind>,
}

impl Default for Redactor {
    fn default() -> Self {
        Self {
            kinds: PiiKind::ALL.to_vec(),
        }
    }
}

impl Redactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only redact the given kinds. Application order stays fixed.
    pub fn with_kinds(kinds: &[PiiKind]) -> Self {
        Self {
            kinds: PiiKind::ALL
                .iter()
                .copied()
                .filter(|k| kinds.contains(k))
                .collect(),
        }
    }

    pub fn redact(&self, text: &str) -> Redaction {
        let mut current = text.to_string();
        let mut counts = BTreeMap::new();

        for kind in &self.kinds {
            let pattern = kind.pattern();
            let found = pattern.find_iter(&current).count();
            if found == 0 {
                continue;
            }
            current = pattern.replace_all(&current, kind.placeholder()).into_owned();
            counts.insert(*kind, found);
        }

        if !counts.is_empty() {
            tracing::debug!(
                redactions = counts.values().sum::<usize>(),
                kinds = ?counts.keys().collect::<Vec<_>>(),
                "Redacted PII from note text"
            );
        }

        Redaction {
            text: current,
            counts,
        }
    }
}

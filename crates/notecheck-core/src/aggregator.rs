//! Aggregator: combines per-element results into the final verdict.
//!
//! Three independent computations run over the full result list:
//!
//! | Output | Rule |
//! |--------|------|
//! | Overall score | Weighted mean, required x2, optional x1, 0.0 when empty |
//! | Pass | No required element is a blocker under the pass policy |
//! | Rating | Derived from the pass decision and the result list |
//!
//! ## Blockers
//!
//! Optional elements never block. For required elements:
//!
//! | Severity | Blocks when |
//! |----------|-------------|
//! | critical | missing (`block_on_critical_missing`), or partial below `critical_partial_threshold` (`block_on_critical_partial`) |
//! | high | missing (`block_on_high_missing`), or partial below `required_pass_threshold` |
//! | medium, low | partial below `required_pass_threshold` |

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::checklist::Checklist;
use crate::policy::PassPolicy;
use crate::types::{
    ComplianceReport, ComplianceStats, ElementResult, ElementStatus, OverallRating, Severity,
};

const REQUIRED_WEIGHT: f64 = 2.0;
const OPTIONAL_WEIGHT: f64 = 1.0;

/// The verdict for a result list, before any narrative is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub passed: bool,
    pub overall_score: f64,
    pub overall_rating: OverallRating,
    pub stats: ComplianceStats,
}

/// Aggregates element results under a pass policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Aggregator {
    policy: PassPolicy,
}

impl Aggregator {
    pub fn new(policy: PassPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PassPolicy {
        &self.policy
    }

    /// Weighted mean score. Exactly 0.0 for an empty list.
    pub fn overall_score(&self, results: &[ElementResult]) -> f64 {
        let (weighted, total) = results.iter().fold((0.0, 0.0), |(sum, weight), result| {
            let w = if result.required {
                REQUIRED_WEIGHT
            } else {
                OPTIONAL_WEIGHT
            };
            (sum + result.score * w, weight + w)
        });

        if total > 0.0 {
            weighted / total
        } else {
            0.0
        }
    }

    /// Whether one result blocks a pass on its own.
    pub fn is_blocker(&self, result: &ElementResult) -> bool {
        if !result.required {
            return false;
        }

        let policy = &self.policy;
        match (result.severity, result.status) {
            (Severity::Critical, ElementStatus::Missing) => policy.block_on_critical_missing,
            (Severity::Critical, ElementStatus::Partial) => {
                policy.block_on_critical_partial && result.score < policy.critical_partial_threshold
            }
            (Severity::High, ElementStatus::Missing) => policy.block_on_high_missing,
            (_, ElementStatus::Partial) => result.score < policy.required_pass_threshold,
            _ => false,
        }
    }

    /// Results that block a pass, in input order.
    pub fn blockers<'a>(&'a self, results: &'a [ElementResult]) -> impl Iterator<Item = &'a ElementResult> {
        results.iter().filter(move |r| self.is_blocker(r))
    }

    /// True when no result blocks.
    pub fn determine_pass(&self, results: &[ElementResult]) -> bool {
        self.blockers(results).next().is_none()
    }

    /// Rating from the pass decision and the results.
    pub fn overall_rating(&self, passed: bool, results: &[ElementResult]) -> OverallRating {
        if !passed {
            let critical_blocker = results.iter().any(|r| {
                r.required
                    && r.severity == Severity::Critical
                    && match r.status {
                        ElementStatus::Missing => true,
                        ElementStatus::Partial => r.score < self.policy.critical_partial_threshold,
                        ElementStatus::Present => false,
                    }
            });
            return if critical_blocker {
                OverallRating::NonCompliant
            } else {
                OverallRating::RequiresAttention
            };
        }

        if results.iter().all(|r| r.status == ElementStatus::Present) {
            OverallRating::Compliant
        } else {
            OverallRating::MinorGaps
        }
    }

    /// Counts over the results.
    pub fn stats(&self, results: &[ElementResult]) -> ComplianceStats {
        let mut stats = ComplianceStats {
            total_elements: results.len(),
            ..ComplianceStats::default()
        };

        for result in results {
            if result.required {
                stats.required_elements += 1;
            }
            match result.status {
                ElementStatus::Present => stats.present_count += 1,
                ElementStatus::Partial => stats.partial_count += 1,
                ElementStatus::Missing => stats.missing_count += 1,
            }
            if result.is_gap() {
                match result.severity {
                    Severity::Critical => stats.critical_gaps += 1,
                    Severity::High => stats.high_gaps += 1,
                    Severity::Medium => stats.medium_gaps += 1,
                    Severity::Low => stats.low_gaps += 1,
                }
                if result.required {
                    stats.required_missing_count += 1;
                }
            }
        }

        stats
    }

    /// All three computations at once.
    pub fn verdict(&self, results: &[ElementResult]) -> Verdict {
        let passed = self.determine_pass(results);
        Verdict {
            passed,
            overall_score: self.overall_score(results),
            overall_rating: self.overall_rating(passed, results),
            stats: self.stats(results),
        }
    }

    /// Assemble a report from results and a narrative summary.
    ///
    /// `evaluated_at` is caller-provided so the same inputs always produce
    /// the same report.
    pub fn aggregate_at(
        &self,
        checklist: &Checklist,
        meeting_type: Option<String>,
        results: Vec<ElementResult>,
        summary: String,
        evaluated_at: DateTime<Utc>,
    ) -> ComplianceReport {
        let verdict = self.verdict(&results);

        tracing::debug!(
            checklist = %checklist.id,
            passed = verdict.passed,
            overall_score = verdict.overall_score,
            rating = %verdict.overall_rating,
            "Aggregated element results"
        );

        ComplianceReport {
            checklist_id: checklist.id.clone(),
            checklist_version: checklist.version.clone(),
            passed: verdict.passed,
            overall_score: verdict.overall_score,
            overall_rating: verdict.overall_rating,
            results,
            summary,
            stats: verdict.stats,
            meeting_type,
            pii_redacted: false,
            evaluated_at,
            metadata: BTreeMap::new(),
        }
    }
}

/// Summary text used when no narrative could be generated.
pub fn fallback_summary(stats: &ComplianceStats) -> String {
    format!(
        "Evaluated {} framework elements; {} present, {} gap(s) identified.",
        stats.total_elements,
        stats.present_count,
        stats.gap_count()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, status: ElementStatus, score: f64, severity: Severity, required: bool) -> ElementResult {
        ElementResult {
            element_id: id.to_string(),
            name: id.to_string(),
            status,
            score,
            evidence: match status {
                ElementStatus::Missing => None,
                _ => Some(String::new()),
            },
            severity,
            required,
            notes: None,
            suggestions: Vec::new(),
        }
    }

    /// Nine elements shaped like a suitability checklist, all present.
    fn nine_present() -> Vec<ElementResult> {
        vec![
            result("client_objectives", ElementStatus::Present, 0.9, Severity::Critical, true),
            result("risk_attitude", ElementStatus::Present, 0.85, Severity::Critical, true),
            result("capacity_for_loss", ElementStatus::Present, 0.8, Severity::Critical, true),
            result("financial_situation", ElementStatus::Present, 0.9, Severity::High, true),
            result("knowledge_experience", ElementStatus::Present, 0.75, Severity::High, true),
            result("recommendation_rationale", ElementStatus::Present, 0.95, Severity::Critical, true),
            result("charges_disclosure", ElementStatus::Present, 0.8, Severity::High, true),
            result("alternatives_considered", ElementStatus::Present, 0.7, Severity::Medium, false),
            result("client_confirmation", ElementStatus::Present, 0.9, Severity::Low, false),
        ]
    }

    #[test]
    fn test_empty_list_scores_zero() {
        let aggregator = Aggregator::default();
        assert_eq!(aggregator.overall_score(&[]), 0.0);
        assert!(aggregator.determine_pass(&[]));
        assert_eq!(aggregator.stats(&[]), ComplianceStats::default());
    }

    #[test]
    fn test_single_required_element_score() {
        let aggregator = Aggregator::default();
        let results = vec![result("a", ElementStatus::Partial, 0.63, Severity::Medium, true)];
        assert_eq!(aggregator.overall_score(&results), 0.63);
    }

    #[test]
    fn test_weighted_mean() {
        let aggregator = Aggregator::default();
        let results = vec![
            result("a", ElementStatus::Present, 1.0, Severity::High, true),
            result("b", ElementStatus::Missing, 0.0, Severity::Low, false),
        ];
        // (1.0 * 2 + 0.0 * 1) / 3
        assert!((aggregator.overall_score(&results) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_all_present_is_compliant() {
        let aggregator = Aggregator::default();
        let verdict = aggregator.verdict(&nine_present());
        assert!(verdict.passed);
        assert_eq!(verdict.overall_rating, OverallRating::Compliant);
        assert_eq!(verdict.stats.present_count, 9);
        assert_eq!(verdict.stats.required_elements, 7);
        assert_eq!(verdict.stats.gap_count(), 0);
    }

    #[test]
    fn test_critical_missing_is_non_compliant() {
        let aggregator = Aggregator::default();
        let mut results = nine_present();
        results[0] = result("client_objectives", ElementStatus::Missing, 0.0, Severity::Critical, true);

        let verdict = aggregator.verdict(&results);
        assert!(!verdict.passed);
        assert_eq!(verdict.overall_rating, OverallRating::NonCompliant);
        assert_eq!(verdict.stats.critical_gaps, 1);
        assert_eq!(verdict.stats.required_missing_count, 1);
    }

    #[test]
    fn test_critical_partial_threshold() {
        let aggregator = Aggregator::default();
        let weak = [result("a", ElementStatus::Partial, 0.4, Severity::Critical, true)];
        let strong = [result("a", ElementStatus::Partial, 0.5, Severity::Critical, true)];

        assert!(!aggregator.determine_pass(&weak));
        assert_eq!(aggregator.overall_rating(false, &weak), OverallRating::NonCompliant);
        assert!(aggregator.determine_pass(&strong));
        assert_eq!(aggregator.overall_rating(true, &strong), OverallRating::MinorGaps);
    }

    #[test]
    fn test_high_missing_requires_attention() {
        let aggregator = Aggregator::default();
        let results = vec![
            result("a", ElementStatus::Present, 0.9, Severity::Critical, true),
            result("b", ElementStatus::Missing, 0.0, Severity::High, true),
        ];
        let verdict = aggregator.verdict(&results);
        assert!(!verdict.passed);
        assert_eq!(verdict.overall_rating, OverallRating::RequiresAttention);
    }

    #[test]
    fn test_high_missing_allowed_when_switch_off() {
        let aggregator = Aggregator::new(PassPolicy {
            block_on_high_missing: false,
            ..PassPolicy::default()
        });
        let results = vec![result("b", ElementStatus::Missing, 0.0, Severity::High, true)];
        assert!(aggregator.determine_pass(&results));
    }

    #[test]
    fn test_medium_missing_never_blocks() {
        let aggregator = Aggregator::default();
        let results = vec![
            result("a", ElementStatus::Missing, 0.0, Severity::Medium, true),
            result("b", ElementStatus::Missing, 0.0, Severity::Low, true),
        ];
        assert!(aggregator.determine_pass(&results));
        assert_eq!(aggregator.overall_rating(true, &results), OverallRating::MinorGaps);
    }

    #[test]
    fn test_low_partial_below_required_threshold_blocks() {
        let aggregator = Aggregator::default();
        let results = vec![result("a", ElementStatus::Partial, 0.55, Severity::Medium, true)];
        assert!(!aggregator.determine_pass(&results));
        assert_eq!(aggregator.overall_rating(false, &results), OverallRating::RequiresAttention);

        let results = vec![result("a", ElementStatus::Partial, 0.6, Severity::Low, true)];
        assert!(aggregator.determine_pass(&results));
    }

    #[test]
    fn test_optional_elements_never_block() {
        let aggregator = Aggregator::default();
        let results = vec![
            result("a", ElementStatus::Missing, 0.0, Severity::Critical, false),
            result("b", ElementStatus::Partial, 0.1, Severity::High, false),
        ];
        assert!(aggregator.determine_pass(&results));
        let stats = aggregator.stats(&results);
        // Gaps are counted regardless of required
        assert_eq!(stats.critical_gaps, 1);
        assert_eq!(stats.high_gaps, 1);
        assert_eq!(stats.required_missing_count, 0);
    }

    fn assert_never_recovers(aggregator: &Aggregator, severity: Severity, steps: &[(ElementStatus, f64)]) {
        let mut failed = false;
        for (status, score) in steps {
            let mut results = nine_present();
            results.push(result("x", *status, *score, severity, true));
            let passed = aggregator.determine_pass(&results);
            assert!(!(failed && passed), "{severity}: report recovered after worsening to {status} {score}");
            failed |= !passed;
        }
    }

    #[test]
    fn test_pass_decision_is_monotonic() {
        let aggregator = Aggregator::default();
        let full_ladder = [
            (ElementStatus::Present, 1.0),
            (ElementStatus::Present, 0.7),
            (ElementStatus::Partial, 0.9),
            (ElementStatus::Partial, 0.6),
            (ElementStatus::Partial, 0.5),
            (ElementStatus::Partial, 0.2),
            (ElementStatus::Missing, 0.0),
        ];
        assert_never_recovers(&aggregator, Severity::Critical, &full_ladder);
        assert_never_recovers(&aggregator, Severity::High, &full_ladder);

        // Missing never blocks at medium/low, so only score lowering is ordered there
        let score_ladder = [
            (ElementStatus::Partial, 0.9),
            (ElementStatus::Partial, 0.6),
            (ElementStatus::Partial, 0.59),
            (ElementStatus::Partial, 0.0),
        ];
        assert_never_recovers(&aggregator, Severity::Medium, &score_ladder);
        assert_never_recovers(&aggregator, Severity::Low, &score_ladder);
    }

    #[test]
    fn test_worsening_other_elements_keeps_failing_report_failing() {
        let aggregator = Aggregator::default();
        let mut results = nine_present();
        results[0] = result("client_objectives", ElementStatus::Missing, 0.0, Severity::Critical, true);
        assert!(!aggregator.determine_pass(&results));

        for i in 1..results.len() {
            let mut worse = results.clone();
            worse[i].status = ElementStatus::Missing;
            worse[i].score = 0.0;
            worse[i].evidence = None;
            assert!(!aggregator.determine_pass(&worse), "{}", worse[i].element_id);
        }
    }

    #[test]
    fn test_fallback_summary() {
        let aggregator = Aggregator::default();
        let results = vec![
            result("a", ElementStatus::Present, 0.9, Severity::Critical, true),
            result("b", ElementStatus::Partial, 0.5, Severity::High, true),
            result("c", ElementStatus::Missing, 0.0, Severity::Low, false),
        ];
        assert_eq!(
            fallback_summary(&aggregator.stats(&results)),
            "Evaluated 3 framework elements; 1 present, 2 gap(s) identified."
        );
    }

    #[test]
    fn test_aggregate_at_is_deterministic() {
        let checklist = crate::checklist::resolve_checklist("fca_suitability_v1").unwrap();
        let at = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let aggregator = Aggregator::default();

        let a = aggregator.aggregate_at(&checklist, None, nine_present(), "ok".into(), at);
        let b = aggregator.aggregate_at(&checklist, None, nine_present(), "ok".into(), at);
        assert_eq!(a.overall_score, b.overall_score);
        assert_eq!(a.evaluated_at, b.evaluated_at);
        assert_eq!(a.checklist_id, "fca_suitability_v1");
        assert_eq!(a.overall_rating, OverallRating::Compliant);
    }
}

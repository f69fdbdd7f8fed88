//! Pass policy: which gaps block a pass, and how inconsistent
//! status/score pairs are reconciled.
//!
//! The policy is caller-supplied configuration. Nothing in this crate learns
//! or adjusts it; once constructed it is read-only.

use serde::{Deserialize, Serialize};

use crate::types::ElementStatus;

fn default_true() -> bool {
    true
}

fn default_critical_partial_threshold() -> f64 {
    0.5
}

fn default_required_pass_threshold() -> f64 {
    0.6
}

fn default_missing_cutoff() -> f64 {
    0.2
}

fn default_present_min() -> f64 {
    0.5
}

fn default_present_floor() -> f64 {
    0.7
}

/// Configurable rules for the pass decision and score reconciliation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PassPolicy {
    /// A missing required critical element blocks a pass
    #[serde(default = "default_true")]
    pub block_on_critical_missing: bool,

    /// A weak partial required critical element blocks a pass
    #[serde(default = "default_true")]
    pub block_on_critical_partial: bool,

    /// A missing required high-severity element blocks a pass
    #[serde(default = "default_true")]
    pub block_on_high_missing: bool,

    /// Critical partials scoring below this are treated as blockers
    #[serde(default = "default_critical_partial_threshold")]
    pub critical_partial_threshold: f64,

    /// Non-critical required partials scoring below this block a pass
    #[serde(default = "default_required_pass_threshold")]
    pub required_pass_threshold: f64,

    /// Missing elements reported above this score are reset to 0.0
    #[serde(default = "default_missing_cutoff")]
    pub score_correction_missing_cutoff: f64,

    /// Present elements reported below this score are raised
    #[serde(default = "default_present_min")]
    pub score_correction_present_min: f64,

    /// Score a low-scoring present element is raised to
    #[serde(default = "default_present_floor")]
    pub score_correction_present_floor: f64,
}

impl Default for PassPolicy {
    fn default() -> Self {
        Self {
            block_on_critical_missing: true,
            block_on_critical_partial: true,
            block_on_high_missing: true,
            critical_partial_threshold: default_critical_partial_threshold(),
            required_pass_threshold: default_required_pass_threshold(),
            score_correction_missing_cutoff: default_missing_cutoff(),
            score_correction_present_min: default_present_min(),
            score_correction_present_floor: default_present_floor(),
        }
    }
}

impl PassPolicy {
    /// Make a reported score consistent with the reported status.
    ///
    /// | Status | Condition | Result |
    /// |--------|-----------|--------|
    /// | missing | score > missing cutoff | 0.0 |
    /// | present | score < present min | max(score, present floor) |
    /// | partial | - | unchanged |
    ///
    /// Scores outside these bands pass through untouched, including values
    /// above 1.0.
    pub fn reconcile_score(&self, status: ElementStatus, score: f64) -> f64 {
        match status {
            ElementStatus::Missing if score > self.score_correction_missing_cutoff => 0.0,
            ElementStatus::Present if score < self.score_correction_present_min => {
                score.max(self.score_correction_present_floor)
            }
            _ => score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = PassPolicy::default();
        assert!(policy.block_on_critical_missing);
        assert!(policy.block_on_critical_partial);
        assert!(policy.block_on_high_missing);
        assert_eq!(policy.critical_partial_threshold, 0.5);
        assert_eq!(policy.required_pass_threshold, 0.6);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let policy: PassPolicy =
            serde_yaml::from_str("block_on_high_missing: false\nrequired_pass_threshold: 0.75\n")
                .unwrap();
        assert!(!policy.block_on_high_missing);
        assert_eq!(policy.required_pass_threshold, 0.75);
        assert_eq!(policy.score_correction_present_floor, 0.7);
        assert!(policy.block_on_critical_missing);
    }

    #[test]
    fn test_missing_with_high_score_reset() {
        let policy = PassPolicy::default();
        assert_eq!(policy.reconcile_score(ElementStatus::Missing, 0.9), 0.0);
        assert_eq!(policy.reconcile_score(ElementStatus::Missing, 0.21), 0.0);
    }

    #[test]
    fn test_missing_at_cutoff_unchanged() {
        let policy = PassPolicy::default();
        assert_eq!(policy.reconcile_score(ElementStatus::Missing, 0.2), 0.2);
        assert_eq!(policy.reconcile_score(ElementStatus::Missing, 0.1), 0.1);
    }

    #[test]
    fn test_present_with_low_score_raised() {
        let policy = PassPolicy::default();
        assert_eq!(policy.reconcile_score(ElementStatus::Present, 0.3), 0.7);
        assert_eq!(policy.reconcile_score(ElementStatus::Present, 0.0), 0.7);
        assert_eq!(policy.reconcile_score(ElementStatus::Present, 0.5), 0.5);
        assert_eq!(policy.reconcile_score(ElementStatus::Present, 0.85), 0.85);
    }

    #[test]
    fn test_partial_never_corrected() {
        let policy = PassPolicy::default();
        assert_eq!(policy.reconcile_score(ElementStatus::Partial, 0.0), 0.0);
        assert_eq!(policy.reconcile_score(ElementStatus::Partial, 1.7), 1.7);
    }

    #[test]
    fn test_reconciliation_is_idempotent() {
        let policies = [
            PassPolicy::default(),
            PassPolicy {
                score_correction_present_min: 0.9,
                score_correction_present_floor: 0.4,
                ..PassPolicy::default()
            },
        ];
        let scores = [-0.5, 0.0, 0.1, 0.2, 0.3, 0.45, 0.5, 0.69, 0.7, 0.95, 1.0, 1.7];
        let statuses = [ElementStatus::Present, ElementStatus::Partial, ElementStatus::Missing];

        for policy in &policies {
            for status in statuses {
                for score in scores {
                    let once = policy.reconcile_score(status, score);
                    let twice = policy.reconcile_score(status, once);
                    assert_eq!(once, twice, "{status} {score}");
                }
            }
        }
    }
}

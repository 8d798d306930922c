//! Deterministic confidence scoring for the correction loop.
//!
//! After each corrective pass over a generated layout, the evaluator turns
//! a before/after pair of quality snapshots into a bounded confidence
//! score, an accept/retry/fail decision, and a stop reason explaining the
//! decision. It is a pure function of its inputs: no clock, no randomness,
//! no internal state, so identical inputs always yield identical results
//! and one evaluator instance can serve many independent correction loops.
//!
//! The caller owns the loop: it keeps the layout-hash history across
//! attempts and feeds each attempt's snapshots back in. See
//! [`crate::correction`] for a ready-made harness.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Violation codes that block acceptance regardless of confidence.
pub const CRITICAL_CODES: [&str; 5] = [
    "MISSING_FINAL_CTA",
    "FINAL_CTA_NOT_LAST",
    "PRIMARY_COUNT_INVALID",
    "PRIMARY_MISUSE",
    "DARK_MISUSE",
];

/// The dark-on-light misuse code carries its own penalty and stop reason on
/// top of the general critical penalty.
pub const DARK_MISUSE_CODE: &str = "DARK_MISUSE";

/// Attempt ceiling used when none is configured.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// One rule violation reported by the quality collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Taxonomy code, optionally qualified after a colon
    /// (e.g. `PRIMARY_MISUSE: section 3`).
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Violation {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            detail: None,
        }
    }

    /// The code with any trailing qualifier stripped.
    pub fn base_code(&self) -> &str {
        self.code.split(':').next().unwrap_or("").trim()
    }

    /// Whether this violation is in the fixed critical set.
    pub fn is_critical(&self) -> bool {
        CRITICAL_CODES.contains(&self.base_code())
    }
}

/// Quality measurements for one candidate layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualitySnapshot {
    pub score: i32,
    #[serde(default)]
    pub violations: Vec<Violation>,
    /// Structural digest of the candidate; empty/absent means "never
    /// oscillating".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_hash: Option<String>,
}

impl QualitySnapshot {
    pub fn new(score: i32) -> Self {
        Self {
            score,
            violations: Vec::new(),
            layout_hash: None,
        }
    }

    pub fn with_violations(mut self, violations: Vec<Violation>) -> Self {
        self.violations = violations;
        self
    }

    pub fn with_layout_hash(mut self, hash: impl Into<String>) -> Self {
        self.layout_hash = Some(hash.into());
        self
    }

    fn critical_codes(&self) -> BTreeSet<String> {
        self.violations
            .iter()
            .filter(|v| v.is_critical())
            .map(|v| v.base_code().to_string())
            .collect()
    }
}

/// What to do with the candidate under evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Accept,
    Retry,
    Fail,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Accept => write!(f, "ACCEPT"),
            Decision::Retry => write!(f, "RETRY"),
            Decision::Fail => write!(f, "FAIL"),
        }
    }
}

/// Why a decision was reached. Derived from the same predicates as the
/// decision itself, so the two are always consistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopReason {
    // Accept
    HighConfidence,
    AcceptableNoCritical,
    MaxAttemptsNoCritical,
    // Fail
    OscillationDetected,
    NoProgressStagnation,
    DarkMisuseViolation,
    MaxAttemptsWithCritical,
    LowConfidence,
    UnknownFail,
    // Retry
    RetryDarkMisuse,
    RetryHasCritical,
    RetryLowConfidence,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StopReason::HighConfidence => "HIGH_CONFIDENCE",
            StopReason::AcceptableNoCritical => "ACCEPTABLE_NO_CRITICAL",
            StopReason::MaxAttemptsNoCritical => "MAX_ATTEMPTS_NO_CRITICAL",
            StopReason::OscillationDetected => "OSCILLATION_DETECTED",
            StopReason::NoProgressStagnation => "NO_PROGRESS_STAGNATION",
            StopReason::DarkMisuseViolation => "DARK_MISUSE_VIOLATION",
            StopReason::MaxAttemptsWithCritical => "MAX_ATTEMPTS_WITH_CRITICAL",
            StopReason::LowConfidence => "LOW_CONFIDENCE",
            StopReason::UnknownFail => "UNKNOWN_FAIL",
            StopReason::RetryDarkMisuse => "RETRY_DARK_MISUSE",
            StopReason::RetryHasCritical => "RETRY_HAS_CRITICAL",
            StopReason::RetryLowConfidence => "RETRY_LOW_CONFIDENCE",
        };
        write!(f, "{s}")
    }
}

/// Attempt-over-attempt movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Improvement {
    pub score_delta: i32,
    /// Positive means fewer violations than before.
    pub violations_delta: i32,
    pub critical_removed: bool,
}

/// Full output of one evaluation. Never persisted; lives only within the
/// caller's retry loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceResult {
    /// Bounded to [0, 100].
    pub confidence: u8,
    pub decision: Decision,
    pub stop_reason: Option<StopReason>,
    pub improvement: Improvement,
    pub has_critical: bool,
    pub is_oscillation: bool,
    pub critical_violations: BTreeSet<String>,
}

/// The confidence/decision engine. Stateless; `max_attempts` is the only
/// knob.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceEvaluator {
    max_attempts: u32,
}

impl Default for ConfidenceEvaluator {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ConfidenceEvaluator {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Evaluate one corrective pass.
    ///
    /// `attempt` is 1-based; `history` holds the structural hashes of all
    /// prior attempts in the same correction loop.
    ///
    /// Decision precedence, in order: oscillation fails; stagnation
    /// (no score or violation progress past attempt 1) fails — even when
    /// critical violations are also present, and attempt 1 is exempt
    /// because there is no prior baseline to regress from; confidence of
    /// at least 40 without criticals accepts; low confidence under the
    /// attempt ceiling retries; at the ceiling, criticals fail and their
    /// absence forces acceptance rather than looping forever.
    pub fn evaluate(
        &self,
        before: &QualitySnapshot,
        after: &QualitySnapshot,
        attempt: u32,
        history: &[String],
    ) -> ConfidenceResult {
        let score_delta = after.score - before.score;
        let violations_delta = before.violations.len() as i32 - after.violations.len() as i32;

        let before_critical = before.critical_codes();
        let after_critical = after.critical_codes();
        let critical_removed = before_critical.len() > after_critical.len();
        let has_critical = !after_critical.is_empty();
        let has_dark_misuse = after_critical.contains(DARK_MISUSE_CODE);

        let is_oscillation = after
            .layout_hash
            .as_deref()
            .is_some_and(|hash| !hash.is_empty() && history.iter().any(|h| h == hash));

        let mut confidence: i32 = 50;
        if score_delta >= 4 {
            confidence += 10;
        } else if score_delta >= 2 {
            confidence += 5;
        }
        if critical_removed {
            confidence += 10;
        }
        if violations_delta >= 2 {
            confidence += 5;
        }
        if score_delta <= 0 {
            confidence -= 15;
        }
        // No penalty for a flat violation count when there is nothing left
        // to remove.
        if violations_delta <= 0 && !after.violations.is_empty() {
            confidence -= 10;
        }
        if has_critical {
            confidence -= 20;
        }
        // Dark misuse is doubly penalized: critical, and a dedicated rule.
        if has_dark_misuse {
            confidence -= 20;
        }
        if is_oscillation {
            confidence -= 25;
        }
        let confidence = confidence.clamp(0, 100) as u8;

        let stagnation = score_delta <= 0 && violations_delta <= 0 && attempt > 1;
        let at_ceiling = attempt >= self.max_attempts;

        let decision = if is_oscillation {
            Decision::Fail
        } else if stagnation {
            Decision::Fail
        } else if confidence >= 40 && !has_critical {
            Decision::Accept
        } else if confidence < 40 && !at_ceiling {
            Decision::Retry
        } else if at_ceiling && has_critical {
            Decision::Fail
        } else if at_ceiling {
            Decision::Accept
        } else if !at_ceiling {
            Decision::Retry
        } else {
            Decision::Fail
        };

        let stop_reason = match decision {
            Decision::Accept => {
                if confidence >= 70 {
                    StopReason::HighConfidence
                } else if confidence >= 40 {
                    StopReason::AcceptableNoCritical
                } else {
                    StopReason::MaxAttemptsNoCritical
                }
            }
            Decision::Fail => {
                if is_oscillation {
                    StopReason::OscillationDetected
                } else if stagnation {
                    StopReason::NoProgressStagnation
                } else if has_dark_misuse {
                    StopReason::DarkMisuseViolation
                } else if at_ceiling && has_critical {
                    StopReason::MaxAttemptsWithCritical
                } else if confidence < 40 {
                    StopReason::LowConfidence
                } else {
                    StopReason::UnknownFail
                }
            }
            Decision::Retry => {
                if has_dark_misuse {
                    StopReason::RetryDarkMisuse
                } else if has_critical {
                    StopReason::RetryHasCritical
                } else {
                    StopReason::RetryLowConfidence
                }
            }
        };

        ConfidenceResult {
            confidence,
            decision,
            stop_reason: Some(stop_reason),
            improvement: Improvement {
                score_delta,
                violations_delta,
                critical_removed,
            },
            has_critical,
            is_oscillation,
            critical_violations: after_critical,
        }
    }
}

/// Whether any violation in the list is in the fixed critical set.
pub fn has_critical_violations(violations: &[Violation]) -> bool {
    violations.iter().any(Violation::is_critical)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval() -> ConfidenceEvaluator {
        ConfidenceEvaluator::default()
    }

    #[test]
    fn test_scenario_improving_clean_pass_accepts() {
        // before 40 no violations, after 48 no violations, attempt 1
        let before = QualitySnapshot::new(40);
        let after = QualitySnapshot::new(48);
        let result = eval().evaluate(&before, &after, 1, &[]);

        assert_eq!(result.improvement.score_delta, 8);
        assert_eq!(result.improvement.violations_delta, 0);
        assert_eq!(result.confidence, 60);
        assert_eq!(result.decision, Decision::Accept);
        assert_eq!(result.stop_reason, Some(StopReason::AcceptableNoCritical));
    }

    #[test]
    fn test_scenario_stagnation_fires_before_critical_check() {
        // Flat score, a critical violation appears, attempt 2: the
        // stagnation branch wins over everything but oscillation.
        let before = QualitySnapshot::new(40);
        let after = QualitySnapshot::new(40)
            .with_violations(vec![Violation::new("MISSING_FINAL_CTA")]);
        let result = eval().evaluate(&before, &after, 2, &[]);

        assert_eq!(result.decision, Decision::Fail);
        assert_eq!(result.stop_reason, Some(StopReason::NoProgressStagnation));
        assert!(result.has_critical);
    }

    #[test]
    fn test_stagnation_exempts_attempt_one() {
        let before = QualitySnapshot::new(40);
        let after = QualitySnapshot::new(40)
            .with_violations(vec![Violation::new("MISSING_FINAL_CTA")]);
        let result = eval().evaluate(&before, &after, 1, &[]);

        // Attempt 1 has no baseline to regress from; the critical retries
        assert_eq!(result.decision, Decision::Retry);
        assert_eq!(result.stop_reason, Some(StopReason::RetryHasCritical));
    }

    #[test]
    fn test_scenario_oscillation_overrides_everything() {
        let before = QualitySnapshot::new(40);
        let after = QualitySnapshot::new(90).with_layout_hash("abc123");
        let history = vec!["abc123".to_string()];
        let result = eval().evaluate(&before, &after, 1, &history);

        assert!(result.is_oscillation);
        assert_eq!(result.decision, Decision::Fail);
        assert_eq!(result.stop_reason, Some(StopReason::OscillationDetected));
        // 50 + 10 (delta) - 25 (oscillation) = 35
        assert_eq!(result.confidence, 35);
    }

    #[test]
    fn test_empty_hash_never_oscillates() {
        let before = QualitySnapshot::new(40);
        let after = QualitySnapshot::new(48).with_layout_hash("");
        let history = vec![String::new()];
        let result = eval().evaluate(&before, &after, 1, &history);
        assert!(!result.is_oscillation);
    }

    #[test]
    fn test_confidence_clamped_to_zero_under_max_penalties() {
        let before = QualitySnapshot::new(50);
        let after = QualitySnapshot::new(40)
            .with_violations(vec![
                Violation::new("DARK_MISUSE"),
                Violation::new("MISSING_FINAL_CTA"),
            ])
            .with_layout_hash("h1");
        let history = vec!["h1".to_string()];
        let result = eval().evaluate(&before, &after, 1, &history);
        // 50 - 15 - 10 - 20 - 20 - 25 would be -40
        assert_eq!(result.confidence, 0);
    }

    #[test]
    fn test_confidence_clamped_to_hundred_under_max_bonuses() {
        let before = QualitySnapshot::new(10).with_violations(vec![
            Violation::new("MISSING_FINAL_CTA"),
            Violation::new("SPACING"),
            Violation::new("ALIGNMENT"),
        ]);
        let after = QualitySnapshot::new(90);
        let result = eval().evaluate(&before, &after, 1, &[]);
        // 50 + 10 + 10 + 5 = 75, well inside bounds; bound holds regardless
        assert!(result.confidence <= 100);
        assert_eq!(result.confidence, 75);
        assert_eq!(result.decision, Decision::Accept);
        assert_eq!(result.stop_reason, Some(StopReason::HighConfidence));
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let before = QualitySnapshot::new(40)
            .with_violations(vec![Violation::new("PRIMARY_MISUSE: section 2")]);
        let after = QualitySnapshot::new(43)
            .with_violations(vec![Violation::new("SPACING")])
            .with_layout_hash("deadbeef");
        let history = vec!["cafebabe".to_string()];

        let first = eval().evaluate(&before, &after, 2, &history);
        let second = eval().evaluate(&before, &after, 2, &history);
        assert_eq!(first, second);
    }

    #[test]
    fn test_code_qualifier_stripped_before_classification() {
        let violation = Violation::new("DARK_MISUSE: hero section on light bg");
        assert_eq!(violation.base_code(), "DARK_MISUSE");
        assert!(violation.is_critical());
        assert!(!Violation::new("DARKISH").is_critical());
    }

    #[test]
    fn test_dark_misuse_double_penalty() {
        let before = QualitySnapshot::new(40);
        let plain_critical = QualitySnapshot::new(45)
            .with_violations(vec![Violation::new("MISSING_FINAL_CTA")]);
        let dark = QualitySnapshot::new(45)
            .with_violations(vec![Violation::new("DARK_MISUSE")]);

        let plain = eval().evaluate(&before, &plain_critical, 1, &[]);
        let misuse = eval().evaluate(&before, &dark, 1, &[]);
        assert_eq!(plain.confidence - misuse.confidence, 20);
        assert_eq!(misuse.stop_reason, Some(StopReason::RetryDarkMisuse));
    }

    #[test]
    fn test_max_attempts_with_critical_fails() {
        let before = QualitySnapshot::new(40);
        let after = QualitySnapshot::new(45)
            .with_violations(vec![Violation::new("PRIMARY_COUNT_INVALID")]);
        let result = eval().evaluate(&before, &after, 3, &[]);

        assert_eq!(result.decision, Decision::Fail);
        assert_eq!(result.stop_reason, Some(StopReason::MaxAttemptsWithCritical));
    }

    #[test]
    fn test_max_attempts_without_critical_forces_accept() {
        // Low confidence, no criticals, at the ceiling: forced acceptance
        let before = QualitySnapshot::new(40);
        let after = QualitySnapshot::new(41)
            .with_violations(vec![Violation::new("SPACING"), Violation::new("ALIGNMENT")]);
        let result = eval().evaluate(&before, &after, 3, &[]);

        // 50 - 10 (flat violations, non-empty after) = 40 -> accept path
        assert_eq!(result.decision, Decision::Accept);
    }

    #[test]
    fn test_forced_accept_reason_at_ceiling_with_low_confidence() {
        // Drive confidence under 40 without criticals or stagnation:
        // regressing score but fewer violations than before.
        let before = QualitySnapshot::new(50).with_violations(vec![
            Violation::new("SPACING"),
            Violation::new("ALIGNMENT"),
            Violation::new("RHYTHM"),
        ]);
        let after = QualitySnapshot::new(46)
            .with_violations(vec![Violation::new("SPACING"), Violation::new("RHYTHM")]);
        let result = eval().evaluate(&before, &after, 3, &[]);

        // 50 - 15 (score regressed) = 35, attempt at ceiling, no criticals
        assert_eq!(result.confidence, 35);
        assert_eq!(result.decision, Decision::Accept);
        assert_eq!(result.stop_reason, Some(StopReason::MaxAttemptsNoCritical));
    }

    #[test]
    fn test_low_confidence_under_ceiling_retries() {
        let before = QualitySnapshot::new(50).with_violations(vec![
            Violation::new("SPACING"),
            Violation::new("ALIGNMENT"),
            Violation::new("RHYTHM"),
        ]);
        let after = QualitySnapshot::new(46)
            .with_violations(vec![Violation::new("SPACING"), Violation::new("RHYTHM")]);
        let result = eval().evaluate(&before, &after, 2, &[]);

        assert_eq!(result.decision, Decision::Retry);
        assert_eq!(result.stop_reason, Some(StopReason::RetryLowConfidence));
    }

    #[test]
    fn test_critical_removed_bonus_and_set() {
        let before = QualitySnapshot::new(40).with_violations(vec![
            Violation::new("MISSING_FINAL_CTA"),
            Violation::new("PRIMARY_MISUSE"),
        ]);
        let after = QualitySnapshot::new(46)
            .with_violations(vec![Violation::new("PRIMARY_MISUSE")]);
        let result = eval().evaluate(&before, &after, 1, &[]);

        assert!(result.improvement.critical_removed);
        assert_eq!(
            result.critical_violations,
            BTreeSet::from(["PRIMARY_MISUSE".to_string()])
        );
        assert!(result.has_critical);
    }

    #[test]
    fn test_total_over_pathological_inputs() {
        // Empty everything still yields a structured result
        let result = eval().evaluate(
            &QualitySnapshot::default(),
            &QualitySnapshot::default(),
            1,
            &[],
        );
        assert!(result.stop_reason.is_some());
        // Zero deltas at attempt 1: 50 - 15 = 35, retry
        assert_eq!(result.decision, Decision::Retry);
    }

    #[test]
    fn test_has_critical_violations_helper() {
        assert!(has_critical_violations(&[Violation::new("DARK_MISUSE")]));
        assert!(!has_critical_violations(&[Violation::new("SPACING")]));
        assert!(!has_critical_violations(&[]));
    }

    #[test]
    fn test_decision_and_reason_serialize_as_codes() {
        assert_eq!(
            serde_json::to_string(&Decision::Accept).unwrap(),
            "\"ACCEPT\""
        );
        assert_eq!(
            serde_json::to_string(&StopReason::NoProgressStagnation).unwrap(),
            "\"NO_PROGRESS_STAGNATION\""
        );
        assert_eq!(StopReason::OscillationDetected.to_string(), "OSCILLATION_DETECTED");
    }
}

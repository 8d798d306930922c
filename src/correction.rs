//! Caller-side harness for the corrective retry loop.
//!
//! Drives a candidate source through up to `max_attempts` rounds, feeding
//! each round's before/after quality snapshots to the
//! [`ConfidenceEvaluator`](crate::confidence::ConfidenceEvaluator) and
//! maintaining the layout-hash history it needs for oscillation detection.
//! Tracks the best-scoring candidate so a terminal FAIL can still hand back
//! the strongest attempt seen, with forced-accept bookkeeping when no
//! critical violations remain.
//!
//! The orchestrator never calls this; it wraps a single step (typically the
//! corrective regeneration step) on the caller's side of the API.

use crate::confidence::{
    ConfidenceEvaluator, ConfidenceResult, Decision, QualitySnapshot, StopReason,
    has_critical_violations,
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CorrectionError {
    #[error("Failed to generate a usable candidate after {attempts} attempts")]
    AllAttemptsFailed { attempts: u32 },
}

/// One round's output from the candidate source: the candidate itself plus
/// its quality measured before and after the corrective fix pass. The
/// `after` snapshot should carry the candidate's structural hash.
#[derive(Debug, Clone)]
pub struct CorrectionAttempt<T> {
    pub candidate: T,
    pub before: QualitySnapshot,
    pub after: QualitySnapshot,
}

/// Terminal result of a correction loop.
#[derive(Debug, Clone)]
pub struct CorrectionOutcome<T> {
    pub candidate: T,
    /// Post-fix quality of the returned candidate.
    pub quality: QualitySnapshot,
    /// Evaluation backing the returned candidate (the terminal attempt's,
    /// or the best attempt's when that one was substituted).
    pub evaluation: ConfidenceResult,
    pub decision: Decision,
    pub stop_reason: Option<StopReason>,
    pub attempts: u32,
    /// True when acceptance was forced (ceiling reached without criticals)
    /// or the best earlier attempt was substituted for a failed final one.
    pub forced_accept: bool,
}

impl<T> CorrectionOutcome<T> {
    pub fn accepted(&self) -> bool {
        self.decision == Decision::Accept
    }
}

struct BestCandidate<T> {
    candidate: T,
    quality: QualitySnapshot,
    evaluation: ConfidenceResult,
}

/// Runs candidate generation until the evaluator accepts, fails, or the
/// attempt ceiling is reached.
pub struct CorrectionLoop {
    evaluator: ConfidenceEvaluator,
}

impl CorrectionLoop {
    pub fn new(evaluator: ConfidenceEvaluator) -> Self {
        Self { evaluator }
    }

    /// Drive `generate` until a terminal decision.
    ///
    /// `generate` receives the 1-based attempt number and, from attempt 2
    /// on, the previous round's post-fix snapshot so it can build corrective
    /// feedback. A generation error skips the round and consumes the
    /// attempt, matching the loop's upstream behavior.
    pub fn run<T, G>(&self, mut generate: G) -> Result<CorrectionOutcome<T>, CorrectionError>
    where
        G: FnMut(u32, Option<&QualitySnapshot>) -> Result<CorrectionAttempt<T>, String>,
    {
        let max_attempts = self.evaluator.max_attempts();
        let mut hash_history: Vec<String> = Vec::new();
        let mut previous: Option<QualitySnapshot> = None;
        let mut best: Option<BestCandidate<T>> = None;

        for attempt in 1..=max_attempts {
            let round = match generate(attempt, previous.as_ref()) {
                Ok(round) => round,
                Err(message) => {
                    debug!(attempt, %message, "candidate generation failed, skipping round");
                    continue;
                }
            };

            let evaluation =
                self.evaluator
                    .evaluate(&round.before, &round.after, attempt, &hash_history);
            if let Some(hash) = round.after.layout_hash.clone() {
                if !hash.is_empty() {
                    hash_history.push(hash);
                }
            }
            debug!(
                attempt,
                confidence = evaluation.confidence,
                decision = %evaluation.decision,
                "correction round evaluated"
            );

            let is_best = best
                .as_ref()
                .is_none_or(|b| round.after.score > b.quality.score);

            match evaluation.decision {
                Decision::Accept => {
                    let forced =
                        evaluation.stop_reason == Some(StopReason::MaxAttemptsNoCritical);
                    return Ok(CorrectionOutcome {
                        candidate: round.candidate,
                        quality: round.after,
                        decision: Decision::Accept,
                        stop_reason: evaluation.stop_reason,
                        evaluation,
                        attempts: attempt,
                        forced_accept: forced,
                    });
                }
                Decision::Fail => {
                    // Fall back to a strictly better earlier attempt when one
                    // exists; acceptance is forced only if it is free of
                    // criticals.
                    if !is_best {
                        if let Some(b) = best {
                            let forced = !has_critical_violations(&b.quality.violations);
                            return Ok(CorrectionOutcome {
                                candidate: b.candidate,
                                quality: b.quality,
                                decision: if forced { Decision::Accept } else { Decision::Fail },
                                stop_reason: evaluation.stop_reason,
                                evaluation: b.evaluation,
                                attempts: attempt,
                                forced_accept: forced,
                            });
                        }
                    }
                    return Ok(CorrectionOutcome {
                        candidate: round.candidate,
                        quality: round.after,
                        decision: Decision::Fail,
                        stop_reason: evaluation.stop_reason,
                        evaluation,
                        attempts: attempt,
                        forced_accept: false,
                    });
                }
                Decision::Retry => {
                    previous = Some(round.after.clone());
                    if is_best {
                        best = Some(BestCandidate {
                            candidate: round.candidate,
                            quality: round.after,
                            evaluation,
                        });
                    }
                }
            }
        }

        // Ceiling reached on a RETRY (or every round errored): hand back the
        // best attempt, forced-accepted only when clean of criticals.
        match best {
            Some(b) => {
                let has_critical = has_critical_violations(&b.quality.violations);
                Ok(CorrectionOutcome {
                    candidate: b.candidate,
                    quality: b.quality,
                    decision: if has_critical { Decision::Fail } else { Decision::Accept },
                    stop_reason: Some(if has_critical {
                        StopReason::MaxAttemptsWithCritical
                    } else {
                        StopReason::MaxAttemptsNoCritical
                    }),
                    evaluation: b.evaluation,
                    attempts: max_attempts,
                    forced_accept: !has_critical,
                })
            }
            None => Err(CorrectionError::AllAttemptsFailed {
                attempts: max_attempts,
            }),
        }
    }
}

use serde_json::json;
use twinraven_types::{
    Backoff, DefaultBehavior, ErrorStrategy, Event, InputSource, Outcome, Predicate, RetryPolicy,
    StepErrorPolicy,
};

/// Derives a per-step error strategy from observed outcomes across
/// `samples`, one of four policies per step:
///
/// - every sample reaching the step fails, and none recover afterward: an
///   unconditional abort condition (the step is a hard dependency);
/// - the step fails in some samples but the session still runs to a
///   successful close afterward: a skip fallback onto the remaining steps;
/// - the step fails in under half of the samples that reach it: a retry;
/// - no failures: no entry, which defaults to aborting the chain.
pub fn derive_error_strategy(step_count: usize, samples: &[Vec<Event>]) -> ErrorStrategy {
    let mut strategy = ErrorStrategy::default();

    for step_idx in 0..step_count {
        let mut total = 0usize;
        let mut failures = 0usize;
        let mut recovered = 0usize;

        for sample in samples {
            let Some(event) = sample.get(step_idx) else {
                continue;
            };
            total += 1;
            if event.outcome != Outcome::Success {
                failures += 1;
                if chain_recovers_after(sample, step_idx) {
                    recovered += 1;
                }
            }
        }

        if total == 0 || failures == 0 {
            continue;
        }

        let policy = if recovered > 0 {
            StepErrorPolicy {
                retry: None,
                fallback: Some(((step_idx + 1)..step_count).collect()),
                abort_conditions: Vec::new(),
                default_behavior: DefaultBehavior::Skip,
            }
        } else if failures == total {
            StepErrorPolicy {
                retry: None,
                fallback: None,
                abort_conditions: vec![unconditional_abort()],
                default_behavior: DefaultBehavior::Abort,
            }
        } else if (failures as f64 / total as f64) < 0.5 {
            StepErrorPolicy {
                retry: Some(RetryPolicy {
                    max_attempts: 3,
                    backoff: Backoff::Exponential,
                    base_delay_ms: 500,
                }),
                fallback: None,
                abort_conditions: Vec::new(),
                default_behavior: DefaultBehavior::Retry,
            }
        } else {
            StepErrorPolicy {
                retry: None,
                fallback: None,
                abort_conditions: vec![unconditional_abort()],
                default_behavior: DefaultBehavior::Abort,
            }
        };

        strategy.per_step.insert(step_idx, policy);
    }

    strategy
}

/// A sample "recovers" from a step's failure when the session still has a
/// later step that ran and succeeded, evidence that a working fallback path
/// already exists in production rather than one we're guessing at.
fn chain_recovers_after(sample: &[Event], step_idx: usize) -> bool {
    step_idx + 1 < sample.len()
        && sample
            .last()
            .map(|e| e.outcome == Outcome::Success)
            .unwrap_or(false)
}

/// `Predicate` only expresses comparisons over parameter/wiring sources, with
/// no notion of "this step's outcome". An abort condition driven purely by
/// observed failure rate has no such source to compare, so it is represented
/// as a trivially-true predicate: the step's own failure is the trigger.
fn unconditional_abort() -> Predicate {
    Predicate::Eq {
        left: InputSource::Constant { value: json!(true) },
        right: InputSource::Constant { value: json!(true) },
    }
}

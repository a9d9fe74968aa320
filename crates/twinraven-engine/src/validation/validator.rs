use uuid::Uuid;

use chrono::Utc;
use twinraven_types::{
    EquivalenceScore, Event, InputSource, SimilarityMethod, SynthesizedTool, ValidationResult,
};

use crate::error::{Error, Result};
use crate::validation::similarity::score;

#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub min_sessions: usize,
    pub similarity_threshold: f64,
    pub method: SimilarityMethod,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_sessions: 3,
            similarity_threshold: 0.8,
            method: SimilarityMethod::CosineTfidf,
        }
    }
}

/// Replays recorded sessions against a synthesized tool's step definitions
/// without invoking any real tool: for each step, the value its
/// `input_mapping` would produce from the session's own recorded data is
/// compared against what was actually recorded, rather than simulating a
/// live execution.
pub struct Validator;

impl Validator {
    pub fn validate(
        tool: &SynthesizedTool,
        sessions: Vec<Vec<Event>>,
        config: &ValidatorConfig,
    ) -> Result<ValidationResult> {
        if sessions.len() < config.min_sessions {
            return Err(Error::InsufficientData(format!(
                "need at least {} replayable sessions, got {}",
                config.min_sessions,
                sessions.len()
            )));
        }

        let mut similarities = Vec::new();
        let mut error_parity_violations = 0usize;
        let mut total_observed_latency = 0i64;

        for session in &sessions {
            let mut session_had_failure = false;
            let mut policy_accounted_for_failure = true;

            for step in &tool.steps {
                let Some(event) = session.get(step.index) else {
                    continue;
                };
                total_observed_latency += event.latency_ms as i64;

                if event.outcome != twinraven_types::Outcome::Success {
                    session_had_failure = true;
                    // A retry, a fallback sequence, or an explicit abort
                    // clause all count as the failure being accounted for;
                    // only a step with no policy at all breaks parity.
                    let covered = tool
                        .error_strategy
                        .per_step
                        .get(&step.index)
                        .map(|p| p.retry.is_some() || p.fallback.is_some() || !p.abort_conditions.is_empty())
                        .unwrap_or(false);
                    if !covered {
                        policy_accounted_for_failure = false;
                    }
                }

                for (key, source) in &step.input_mapping {
                    let expected = resolve_source(source, session, step.index);
                    if let Some(expected_value) = expected {
                        if let Some(actual_value) = event.input_params.get(key) {
                            similarities.push(score(config.method, &expected_value, actual_value));
                        }
                    }
                }
            }

            if session_had_failure && !policy_accounted_for_failure {
                error_parity_violations += 1;
            }
        }

        let mean = if similarities.is_empty() {
            1.0
        } else {
            similarities.iter().sum::<f64>() / similarities.len() as f64
        };
        let min = similarities.iter().cloned().fold(f64::INFINITY, f64::min);
        let min = if min.is_finite() { min } else { 1.0 };

        let equivalence = EquivalenceScore {
            mean,
            min,
            method: config.method,
            threshold: config.similarity_threshold,
        };
        let error_parity = error_parity_violations == 0;

        let baseline_latency = tool.source_chain.avg_latency_ms.max(1.0);
        let avg_observed = total_observed_latency as f64 / sessions.len() as f64;
        let latency_ratio = avg_observed / baseline_latency;

        let mut failure_reasons = Vec::new();
        if mean < config.similarity_threshold {
            failure_reasons.push(format!(
                "mean equivalence {:.2} below threshold {:.2}",
                mean, config.similarity_threshold
            ));
        }
        if !error_parity {
            failure_reasons.push(format!(
                "{} session(s) had unhandled failures",
                error_parity_violations
            ));
        }

        let pass = mean >= config.similarity_threshold && error_parity;

        Ok(ValidationResult {
            id: Uuid::new_v4(),
            tool_slug: tool.slug.clone(),
            tool_version: tool.version,
            sessions_replayed: sessions.len(),
            equivalence,
            error_parity,
            latency_ratio,
            pass,
            failure_reasons,
            validated_at: Utc::now(),
        })
    }
}

fn resolve_source(
    source: &InputSource,
    session: &[Event],
    current_step: usize,
) -> Option<serde_json::Value> {
    match source {
        InputSource::Constant { value } => Some(value.clone()),
        InputSource::Parameter { name } => session
            .get(current_step)
            .and_then(|e| e.input_params.get(name))
            .cloned(),
        InputSource::Wiring { step, .. } => session
            .get(*step)
            .and_then(|e| e.output_summary.clone())
            .map(serde_json::Value::String),
    }
}

use std::collections::HashMap;

use chrono::Utc;
use serde_json::Value;
use twinraven_llm::{generate_with_retry, LLMProvider, LlmRequest, RetryPolicy};
use twinraven_types::{CandidateChain, Event, InputSource, StepDefinition, SynthesizedTool, ToolState};

use crate::error::{Error, Result};
use crate::synthesis::error_strategy::derive_error_strategy;
use crate::synthesis::flow::{infer_input_sources, reconcile_parallelism};
use crate::synthesis::prompt::{build_prompt, build_reprompt, response_schema};
use crate::synthesis::schema::{
    parse_input_mapping, parse_parallelizable_with, parse_predicate, validate_predicate,
    validate_proposal_shape, validate_wiring_references,
};

/// Turns a candidate chain into a draft `SynthesizedTool` proposal. The LLM
/// boundary proposes naming, description, the external parameter schema, and
/// each step's wiring/predicate/parallelism; the heuristic inference over the
/// chain's own sample events fills in anything the model's `input_mapping`
/// left unaddressed.
pub struct Synthesizer;

impl Synthesizer {
    /// Rejects a candidate before any LLM call is made if its mined failure
    /// rate exceeds `max_failure_rate`.
    pub fn check_failure_rate(chain: &CandidateChain, max_failure_rate: f64) -> Result<()> {
        if chain.failure_rate > max_failure_rate {
            return Err(Error::FailureRateTooHigh(chain.failure_rate));
        }
        Ok(())
    }

    pub async fn synthesize(
        chain: &CandidateChain,
        samples: Vec<Vec<Event>>,
        provider: &dyn LLMProvider,
        max_parallel_steps: usize,
    ) -> Result<SynthesizedTool> {
        let inferred = infer_input_sources(chain, &samples);

        let parsed = Self::request_and_validate(provider, chain, max_parallel_steps).await?;

        let slug = parsed["slug"].as_str().unwrap_or_default().to_string();
        let description = parsed["description"].as_str().unwrap_or_default().to_string();
        let parameters = parsed["parameters"].clone();

        let mut steps = Self::build_steps(chain, &parsed, &inferred)?;
        reconcile_parallelism(&mut steps, max_parallel_steps);

        let error_strategy = derive_error_strategy(chain.tools.len(), &samples);

        let tool = SynthesizedTool {
            slug,
            description,
            parameters,
            steps,
            error_strategy,
            source_chain: chain.clone(),
            version: 1,
            state: ToolState::Draft,
            created_at: Utc::now(),
            promoted_at: None,
            retired_at: None,
            retirement_reason: None,
        };
        tool.validate_structure()?;
        Ok(tool)
    }

    /// Requests a proposal and validates it against both the fixed shape and
    /// the chain it was synthesized from. On failure, re-prompts exactly
    /// once with the failure reason fed back; a second failure is terminal.
    async fn request_and_validate(
        provider: &dyn LLMProvider,
        chain: &CandidateChain,
        max_parallel_steps: usize,
    ) -> Result<Value> {
        let first_prompt = build_prompt(chain, max_parallel_steps);
        match Self::request_proposal(provider, &first_prompt).await {
            Ok(parsed) => match Self::validate_against_chain(chain, &parsed) {
                Ok(()) => Ok(parsed),
                Err(reason) => {
                    Self::reprompt_once(provider, chain, max_parallel_steps, &reason).await
                }
            },
            Err(reason) => Self::reprompt_once(provider, chain, max_parallel_steps, &reason).await,
        }
    }

    async fn reprompt_once(
        provider: &dyn LLMProvider,
        chain: &CandidateChain,
        max_parallel_steps: usize,
        reason: &str,
    ) -> Result<Value> {
        let retry_prompt = build_reprompt(chain, max_parallel_steps, reason);
        let parsed = Self::request_proposal(provider, &retry_prompt)
            .await
            .map_err(Error::MalformedProposal)?;
        Self::validate_against_chain(chain, &parsed).map_err(Error::MalformedProposal)?;
        Ok(parsed)
    }

    async fn request_proposal(
        provider: &dyn LLMProvider,
        prompt: &str,
    ) -> std::result::Result<Value, String> {
        let request = LlmRequest {
            prompt: prompt.to_string(),
            response_schema: Some(response_schema()),
            max_tokens: 2048,
            temperature: 0.0,
        };
        let response = generate_with_retry(provider, request, RetryPolicy::default())
            .await
            .map_err(|e| e.to_string())?;
        let parsed = match response.parsed {
            Some(value) => value,
            None => serde_json::from_str(&response.content).map_err(|e| e.to_string())?,
        };
        validate_proposal_shape(&parsed)?;
        Ok(parsed)
    }

    /// Beyond the fixed shape, a proposal must name exactly the chain's steps
    /// in order, and any wiring or predicate it attaches must only reach into
    /// earlier steps.
    fn validate_against_chain(chain: &CandidateChain, parsed: &Value) -> std::result::Result<(), String> {
        let steps = parsed["steps"].as_array().cloned().unwrap_or_default();
        if steps.len() != chain.tools.len() {
            return Err(format!(
                "response proposed {} steps for a {}-step chain",
                steps.len(),
                chain.tools.len()
            ));
        }
        for (index, (tool_id, proposed)) in chain.tools.iter().zip(steps.iter()).enumerate() {
            if proposed["tool_id"].as_str() != Some(tool_id.as_str()) {
                return Err(format!(
                    "steps[{}] tool_id mismatch: chain has `{}`",
                    index, tool_id
                ));
            }
            if let Some(mapping_value) = proposed.get("input_mapping") {
                if mapping_value.as_object().map(|m| !m.is_empty()).unwrap_or(false) {
                    let mapping = parse_input_mapping(mapping_value)?;
                    validate_wiring_references(index, &mapping)?;
                }
            }
            if let Some(predicate_value) = proposed.get("predicate") {
                if !predicate_value.is_null() {
                    let predicate = parse_predicate(predicate_value)?;
                    validate_predicate(index, &predicate)?;
                }
            }
        }
        Ok(())
    }

    fn build_steps(
        chain: &CandidateChain,
        parsed: &Value,
        inferred: &[HashMap<String, InputSource>],
    ) -> Result<Vec<StepDefinition>> {
        let proposed_steps = parsed["steps"].as_array().cloned().unwrap_or_default();

        let mut steps = Vec::with_capacity(chain.tools.len());
        for (index, tool_id) in chain.tools.iter().enumerate() {
            let proposed = &proposed_steps[index];

            let mut input_mapping = inferred.get(index).cloned().unwrap_or_default();
            if let Some(mapping_value) = proposed.get("input_mapping") {
                if mapping_value.as_object().map(|m| !m.is_empty()).unwrap_or(false) {
                    let proposed_mapping =
                        parse_input_mapping(mapping_value).map_err(Error::MalformedProposal)?;
                    input_mapping.extend(proposed_mapping);
                }
            }

            let predicate = match proposed.get("predicate") {
                Some(value) if !value.is_null() => {
                    Some(parse_predicate(value).map_err(Error::MalformedProposal)?)
                }
                _ => None,
            };

            let parallelizable_with = match proposed.get("parallelizable_with") {
                Some(value) if !value.is_null() => {
                    parse_parallelizable_with(value).map_err(Error::MalformedProposal)?
                }
                _ => Vec::new(),
            };

            steps.push(StepDefinition {
                index,
                tool_id: tool_id.clone(),
                input_mapping,
                predicate,
                parallelizable_with,
                timeout_ms: None,
            });
        }
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use twinraven_llm::MockProvider;
    use twinraven_types::{EventId, InputHash, MiningConfig, Outcome};

    fn chain() -> CandidateChain {
        CandidateChain {
            tools: vec!["search".into(), "read".into()],
            support: 0.5,
            confidence: 0.8,
            avg_latency_ms: 100.0,
            failure_rate: 0.0,
            sample_event_ids: vec![],
            discovered_at: Utc::now(),
            mining_config: MiningConfig::default(),
        }
    }

    fn event(tool: &str, params: serde_json::Value) -> Event {
        Event {
            id: EventId::new(),
            session_id: "s1".to_string(),
            tool_id: tool.to_string(),
            input_hash: InputHash(1),
            input_params: params,
            output_summary: None,
            predecessor: None,
            successor: None,
            timestamp: Utc::now(),
            latency_ms: 10,
            outcome: Outcome::Success,
            tags: vec![],
        }
    }

    #[tokio::test]
    async fn synthesizes_draft_tool_from_valid_response() {
        let samples = vec![vec![
            event("search", json!({"query": "cats"})),
            event("read", json!({})),
        ]];
        let provider = MockProvider::with_parsed(json!({
            "slug": "search_and_read",
            "description": "search then read",
            "parameters": {"type": "object", "properties": {"query": {"type": "string"}}},
            "steps": [
                {"tool_id": "search", "input_mapping": {}},
                {"tool_id": "read", "input_mapping": {}},
            ],
        }));

        let tool = Synthesizer::synthesize(&chain(), samples, &provider, 2).await.unwrap();
        assert_eq!(tool.slug, "search_and_read");
        assert_eq!(tool.state, ToolState::Draft);
        assert_eq!(tool.steps.len(), 2);
    }

    #[tokio::test]
    async fn honors_the_models_declared_wiring_and_predicate() {
        let samples = vec![vec![
            event("search", json!({"query": "cats"})),
            event("read", json!({})),
        ]];
        let provider = MockProvider::with_parsed(json!({
            "slug": "search_and_read",
            "description": "search then read",
            "parameters": {"type": "object", "properties": {"query": {"type": "string"}}},
            "steps": [
                {"tool_id": "search", "input_mapping": {}},
                {
                    "tool_id": "read",
                    "input_mapping": {
                        "doc_id": {"kind": "wiring", "step": 0, "field": "output"}
                    },
                    "predicate": {
                        "op": "ne",
                        "left": {"kind": "wiring", "step": 0, "field": "output"},
                        "right": {"kind": "constant", "value": null}
                    }
                },
            ],
        }));

        let tool = Synthesizer::synthesize(&chain(), samples, &provider, 2).await.unwrap();
        assert!(matches!(
            tool.steps[1].input_mapping.get("doc_id"),
            Some(InputSource::Wiring { step: 0, .. })
        ));
        assert!(tool.steps[1].predicate.is_some());
    }

    #[tokio::test]
    async fn forward_wiring_reference_is_rejected_even_after_retry() {
        let provider = MockProvider::with_parsed(json!({
            "slug": "search_and_read",
            "description": "search then read",
            "parameters": {},
            "steps": [
                {
                    "tool_id": "search",
                    "input_mapping": {"q": {"kind": "wiring", "step": 1, "field": "out"}}
                },
                {"tool_id": "read", "input_mapping": {}},
            ],
        }));

        let result = Synthesizer::synthesize(&chain(), vec![], &provider, 2).await;
        assert!(matches!(result, Err(Error::MalformedProposal(_))));
    }

    #[tokio::test]
    async fn malformed_response_is_rejected() {
        let provider = MockProvider::with_parsed(json!({"slug": "x"}));
        let result = Synthesizer::synthesize(&chain(), vec![], &provider, 2).await;
        assert!(matches!(result, Err(Error::MalformedProposal(_))));
    }

    #[test]
    fn high_failure_rate_is_rejected_before_synthesis() {
        let mut high_failure = chain();
        high_failure.failure_rate = 0.6;
        let result = Synthesizer::check_failure_rate(&high_failure, 0.3);
        assert!(matches!(result, Err(Error::FailureRateTooHigh(rate)) if rate == 0.6));
    }

    #[test]
    fn failure_rate_within_guard_passes() {
        let mut acceptable = chain();
        acceptable.failure_rate = 0.1;
        assert!(Synthesizer::check_failure_rate(&acceptable, 0.3).is_ok());
    }
}

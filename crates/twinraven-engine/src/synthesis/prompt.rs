use serde_json::json;
use twinraven_types::CandidateChain;

/// Response schema advertised to the LLMProvider alongside the prompt, so a
/// provider that honors `response_schema` can constrain its own decoding.
///
/// `input_mapping` doubles as the internal wiring graph: a
/// `{"kind": "wiring", "step": N, "field": "..."}` entry claims step N's
/// output feeds this step. `predicate` and `parallelizable_with` are
/// optional; a provider that omits them gets no conditional execution and no
/// declared parallelism for that step.
pub fn response_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["slug", "description", "parameters", "steps"],
        "properties": {
            "slug": {"type": "string"},
            "description": {"type": "string"},
            "parameters": {"type": "object"},
            "steps": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "required": ["tool_id", "input_mapping"],
                    "properties": {
                        "tool_id": {"type": "string"},
                        "input_mapping": {"type": "object"},
                        "predicate": {"type": ["object", "null"]},
                        "parallelizable_with": {"type": ["array", "null"]}
                    }
                }
            }
        }
    })
}

/// Renders the synthesis request for a candidate chain: the observed tool
/// sequence plus its measured reliability, asking the model to propose a
/// composite tool definition.
pub fn build_prompt(chain: &CandidateChain, max_parallel_steps: usize) -> String {
    let tool_list = chain.tools.join(" -> ");
    format!(
        "You are designing a composite tool that automates a recurring sequence \
         of tool calls observed in agent telemetry.\n\n\
         Observed chain: {tool_list}\n\
         Support: {support:.2} (fraction of sessions containing this chain)\n\
         Confidence: {confidence:.2} (P(next step | prefix observed))\n\
         Average end-to-end latency: {latency:.0}ms\n\
         Observed failure rate: {failure:.2}\n\n\
         Propose a single JSON object describing a composite tool with fields \
         `slug` (snake_case identifier), `description`, `parameters` (a JSON \
         Schema for the tool's external inputs), and `steps` (an ordered array, \
         one entry per chain step, in the same order as the observed chain). \
         Each step needs `tool_id` and `input_mapping` (a map from input key to \
         one of `{{\"kind\": \"constant\", \"value\": ...}}`, \
         `{{\"kind\": \"parameter\", \"name\": \"...\"}}`, or \
         `{{\"kind\": \"wiring\", \"step\": N, \"field\": \"...\"}}` where N is the \
         index of an earlier step in this same array). A step may optionally \
         include `predicate` (a boolean expression over those same sources, \
         restricted to `eq`/`ne`/`gt`/`lt`/`and`/`or`/`not`) gating whether it \
         runs, and `parallelizable_with` (indices of sibling steps it may run \
         alongside); at most {max_parallel_steps} steps may ever be grouped \
         together this way, and a step can never be parallel with one of its \
         own wiring ancestors. Respond with the JSON object only.",
        tool_list = tool_list,
        support = chain.support,
        confidence = chain.confidence,
        latency = chain.avg_latency_ms,
        failure = chain.failure_rate,
        max_parallel_steps = max_parallel_steps,
    )
}

/// Re-prompt issued once, after a response fails shape or semantic
/// validation, feeding the validator's own error text back so the model can
/// correct the specific problem rather than guessing again from scratch.
pub fn build_reprompt(chain: &CandidateChain, max_parallel_steps: usize, error: &str) -> String {
    format!(
        "{base}\n\nYour previous response was rejected for this reason: {error}\n\
         Return a corrected JSON object only.",
        base = build_prompt(chain, max_parallel_steps),
        error = error,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use twinraven_types::MiningConfig;

    fn chain() -> CandidateChain {
        CandidateChain {
            tools: vec!["search".into(), "read".into()],
            support: 0.4,
            confidence: 0.8,
            avg_latency_ms: 120.0,
            failure_rate: 0.05,
            sample_event_ids: vec![],
            discovered_at: Utc::now(),
            mining_config: MiningConfig::default(),
        }
    }

    #[test]
    fn prompt_includes_chain_tools_in_order() {
        let prompt = build_prompt(&chain(), 2);
        assert!(prompt.contains("search -> read"));
    }

    #[test]
    fn prompt_mentions_the_parallel_step_cap() {
        let prompt = build_prompt(&chain(), 3);
        assert!(prompt.contains("at most 3 steps"));
    }

    #[test]
    fn reprompt_carries_the_validation_error_forward() {
        let prompt = build_reprompt(&chain(), 2, "steps[1] tool_id mismatch");
        assert!(prompt.contains("steps[1] tool_id mismatch"));
        assert!(prompt.contains("search -> read"));
    }
}

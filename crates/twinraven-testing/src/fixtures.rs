//! Builders for the data shapes used across TwinRaven's integration tests:
//! event chains, candidate chains, synthesized tool proposals, and
//! validation results. Every builder returns a fully-formed value with
//! sensible defaults so a test only has to override what it cares about.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use twinraven_types::{
    CandidateChain, EquivalenceScore, ErrorStrategy, Event, EventId, InputSource, MiningConfig,
    Outcome, SimilarityMethod, StepDefinition, SynthesizedTool, ToolState, ValidationResult,
};

/// One event, with every field defaulted except `session_id`/`tool_id`.
/// Timestamps are `base + index` seconds apart so a built chain sorts
/// deterministically.
pub fn event(session_id: &str, tool_id: &str, index: i64) -> Event {
    Event {
        id: EventId::new(),
        session_id: session_id.to_string(),
        tool_id: tool_id.to_string(),
        input_hash: twinraven_types::InputHash(index as u64),
        input_params: json!({"index": index}),
        output_summary: Some(format!("{} output {}", tool_id, index)),
        predecessor: None,
        successor: None,
        timestamp: base_time() + Duration::seconds(index),
        latency_ms: 10,
        outcome: Outcome::Success,
        tags: vec![],
    }
}

/// A linked chain of events for one session: each event's `predecessor`
/// points at the one before it, and `successor` at the one after, matching
/// what the `Collector` produces in immediate mode.
pub fn session_chain(session_id: &str, tool_ids: &[&str]) -> Vec<Event> {
    let mut events: Vec<Event> = tool_ids
        .iter()
        .enumerate()
        .map(|(i, tool_id)| event(session_id, tool_id, i as i64))
        .collect();

    for i in 0..events.len() {
        let prev = if i > 0 { Some(events[i - 1].id) } else { None };
        let next = events.get(i + 1).map(|e| e.id);
        events[i].predecessor = prev;
        events[i].successor = next;
    }
    events
}

/// A failing chain: the last step's outcome is `Failure` and its
/// `output_summary` carries the error message instead of a result summary.
pub fn session_chain_with_failure(session_id: &str, tool_ids: &[&str], error: &str) -> Vec<Event> {
    let mut events = session_chain(session_id, tool_ids);
    if let Some(last) = events.last_mut() {
        last.outcome = Outcome::Failure;
        last.output_summary = Some(error.to_string());
    }
    events
}

/// A `CandidateChain` over `tools`, with `support`/`confidence` overridable
/// and everything else defaulted.
pub fn candidate_chain(tools: &[&str], support: f64, confidence: f64) -> CandidateChain {
    CandidateChain {
        tools: tools.iter().map(|t| t.to_string()).collect(),
        support,
        confidence,
        avg_latency_ms: 50.0,
        failure_rate: 0.0,
        sample_event_ids: vec![EventId::new(), EventId::new()],
        discovered_at: base_time(),
        mining_config: MiningConfig::default(),
    }
}

/// A `SynthesizedTool` with one step per entry in `tool_ids`, each step's
/// input mapping wired from the prior step's `result` field (or an external
/// `parameters.input` for the first step).
pub fn synthesized_tool(slug: &str, tool_ids: &[&str], state: ToolState) -> SynthesizedTool {
    let steps = tool_ids
        .iter()
        .enumerate()
        .map(|(i, tool_id)| {
            let mut input_mapping = HashMap::new();
            let source = if i == 0 {
                InputSource::Parameter {
                    name: "input".to_string(),
                }
            } else {
                InputSource::Wiring {
                    step: i - 1,
                    field: "result".to_string(),
                }
            };
            input_mapping.insert("value".to_string(), source);
            StepDefinition {
                index: i,
                tool_id: tool_id.to_string(),
                input_mapping,
                predicate: None,
                parallelizable_with: vec![],
                timeout_ms: None,
            }
        })
        .collect();

    SynthesizedTool {
        slug: slug.to_string(),
        description: format!("synthesized from {}", tool_ids.join(" -> ")),
        parameters: json!({
            "type": "object",
            "properties": {"input": {"type": "string"}},
            "required": ["input"],
        }),
        steps,
        error_strategy: ErrorStrategy::default(),
        source_chain: candidate_chain(tool_ids, 0.5, 0.9),
        version: 1,
        state,
        created_at: base_time(),
        promoted_at: None,
        retired_at: None,
        retirement_reason: None,
    }
}

/// A passing `ValidationResult` for `slug`/`version`, overridable via the
/// returned struct's fields.
pub fn validation_result(slug: &str, version: u32, sessions_replayed: usize) -> ValidationResult {
    ValidationResult {
        id: uuid::Uuid::new_v4(),
        tool_slug: slug.to_string(),
        tool_version: version,
        sessions_replayed,
        equivalence: EquivalenceScore {
            mean: 0.97,
            min: 0.9,
            method: SimilarityMethod::CosineTfidf,
            threshold: 0.8,
        },
        error_parity: true,
        latency_ratio: 1.0,
        pass: true,
        failure_reasons: vec![],
        validated_at: base_time(),
    }
}

fn base_time() -> DateTime<Utc> {
    "2026-01-01T00:00:00Z".parse().expect("valid fixture timestamp")
}

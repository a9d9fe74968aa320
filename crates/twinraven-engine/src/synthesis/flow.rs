use std::collections::{HashMap, HashSet};

use serde_json::Value;
use twinraven_types::{CandidateChain, Event, InputSource, StepDefinition};

/// Per-step inferred sources for each observed input key: constant across all
/// samples, a free parameter, or wired from an earlier step's output.
pub fn infer_input_sources(
    chain: &CandidateChain,
    samples: &[Vec<Event>],
) -> Vec<HashMap<String, InputSource>> {
    let step_count = chain.tools.len();
    let mut result = vec![HashMap::new(); step_count];

    for step_idx in 0..step_count {
        let keys = collect_keys(samples, step_idx);
        for key in keys {
            let values: Vec<&Value> = samples
                .iter()
                .filter_map(|sample| sample.get(step_idx))
                .filter_map(|event| event.input_params.get(&key))
                .collect();

            let source = if values.windows(2).all(|w| w[0] == w[1]) && !values.is_empty() {
                InputSource::Constant {
                    value: values[0].clone(),
                }
            } else if let Some(wiring_step) = find_wiring_source(samples, step_idx, &key) {
                InputSource::Wiring {
                    step: wiring_step,
                    field: "output".to_string(),
                }
            } else {
                InputSource::Parameter { name: key.clone() }
            };

            result[step_idx].insert(key, source);
        }
    }

    result
}

fn collect_keys(samples: &[Vec<Event>], step_idx: usize) -> HashSet<String> {
    let mut keys = HashSet::new();
    for sample in samples {
        if let Some(event) = sample.get(step_idx) {
            if let Value::Object(map) = &event.input_params {
                keys.extend(map.keys().cloned());
            }
        }
    }
    keys
}

/// Heuristic: a value is wired from an earlier step if its string form shows
/// up in that step's output summary across every sample where both are
/// present.
fn find_wiring_source(samples: &[Vec<Event>], step_idx: usize, key: &str) -> Option<usize> {
    if step_idx == 0 {
        return None;
    }
    for upstream in (0..step_idx).rev() {
        let mut all_match = true;
        let mut any_checked = false;
        for sample in samples {
            let (Some(current), Some(prior)) = (sample.get(step_idx), sample.get(upstream)) else {
                continue;
            };
            let Some(value) = current.input_params.get(key) else {
                continue;
            };
            let Some(output) = &prior.output_summary else {
                continue;
            };
            any_checked = true;
            if !output.contains(&value_as_text(value)) {
                all_match = false;
                break;
            }
        }
        if any_checked && all_match {
            return Some(upstream);
        }
    }
    None
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Reconciles a proposal's declared `parallelizable_with` sets against the
/// wiring dependency graph: drops any pair where one step is a transitive
/// ancestor of the other, makes the remaining relation symmetric, then trims
/// each step's partner set so no parallel group exceeds `max_parallel_steps`.
pub fn reconcile_parallelism(steps: &mut [StepDefinition], max_parallel_steps: usize) {
    let n = steps.len();
    let mut deps: Vec<Vec<usize>> = vec![Vec::new(); n];
    for step in steps.iter() {
        for source in step.input_mapping.values() {
            if let InputSource::Wiring { step: upstream, .. } = source {
                if *upstream < n {
                    deps[step.index].push(*upstream);
                }
            }
        }
    }

    let is_ancestor = |a: usize, b: usize| -> bool {
        let mut stack = vec![a];
        let mut seen = vec![false; n];
        while let Some(cur) = stack.pop() {
            if seen[cur] {
                continue;
            }
            seen[cur] = true;
            if cur == b {
                return true;
            }
            for &d in &deps[cur] {
                stack.push(d);
            }
        }
        false
    };

    let mut pairs: HashSet<(usize, usize)> = HashSet::new();
    for step in steps.iter() {
        for &sibling in &step.parallelizable_with {
            if sibling >= n || sibling == step.index {
                continue;
            }
            if is_ancestor(step.index, sibling) || is_ancestor(sibling, step.index) {
                continue;
            }
            pairs.insert((step.index.min(sibling), step.index.max(sibling)));
        }
    }

    let cap = max_parallel_steps.saturating_sub(1);
    for step in steps.iter_mut() {
        let mut partners: Vec<usize> = pairs
            .iter()
            .filter_map(|&(a, b)| {
                if a == step.index {
                    Some(b)
                } else if b == step.index {
                    Some(a)
                } else {
                    None
                }
            })
            .collect();
        partners.sort_unstable();
        partners.truncate(cap);
        step.parallelizable_with = partners;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use twinraven_types::{EventId, InputHash, MiningConfig, Outcome};

    fn event(tool: &str, params: Value, output: Option<&str>) -> Event {
        Event {
            id: EventId::new(),
            session_id: "s1".to_string(),
            tool_id: tool.to_string(),
            input_hash: InputHash(1),
            input_params: params,
            output_summary: output.map(|s| s.to_string()),
            predecessor: None,
            successor: None,
            timestamp: Utc::now(),
            latency_ms: 10,
            outcome: Outcome::Success,
            tags: vec![],
        }
    }

    fn chain() -> CandidateChain {
        CandidateChain {
            tools: vec!["search".into(), "read".into()],
            support: 1.0,
            confidence: 1.0,
            avg_latency_ms: 10.0,
            failure_rate: 0.0,
            sample_event_ids: vec![],
            discovered_at: Utc::now(),
            mining_config: MiningConfig::default(),
        }
    }

    #[test]
    fn constant_value_detected() {
        let samples = vec![
            vec![
                event("search", json!({"engine": "default"}), Some("doc-1")),
                event("read", json!({"doc_id": "doc-1"}), None),
            ],
            vec![
                event("search", json!({"engine": "default"}), Some("doc-2")),
                event("read", json!({"doc_id": "doc-2"}), None),
            ],
        ];
        let sources = infer_input_sources(&chain(), &samples);
        assert!(matches!(
            sources[0].get("engine"),
            Some(InputSource::Constant { .. })
        ));
    }

    #[test]
    fn wiring_detected_from_upstream_output() {
        let samples = vec![
            vec![
                event("search", json!({}), Some("doc-1")),
                event("read", json!({"doc_id": "doc-1"}), None),
            ],
            vec![
                event("search", json!({}), Some("doc-2")),
                event("read", json!({"doc_id": "doc-2"}), None),
            ],
        ];
        let sources = infer_input_sources(&chain(), &samples);
        assert!(matches!(
            sources[1].get("doc_id"),
            Some(InputSource::Wiring { step: 0, .. })
        ));
    }

    #[test]
    fn varying_unmatched_value_is_a_parameter() {
        let samples = vec![
            vec![
                event("search", json!({"query": "cats"}), Some("doc-1")),
                event("read", json!({}), None),
            ],
            vec![
                event("search", json!({"query": "dogs"}), Some("doc-2")),
                event("read", json!({}), None),
            ],
        ];
        let sources = infer_input_sources(&chain(), &samples);
        assert!(matches!(
            sources[0].get("query"),
            Some(InputSource::Parameter { .. })
        ));
    }

    fn step(index: usize, parallel: Vec<usize>, wired_from: Option<usize>) -> StepDefinition {
        let mut input_mapping = HashMap::new();
        if let Some(upstream) = wired_from {
            input_mapping.insert(
                "in".to_string(),
                InputSource::Wiring { step: upstream, field: "out".to_string() },
            );
        }
        StepDefinition {
            index,
            tool_id: format!("tool-{}", index),
            input_mapping,
            predicate: None,
            parallelizable_with: parallel,
            timeout_ms: None,
        }
    }

    #[test]
    fn ancestor_pairs_are_dropped() {
        let mut steps = vec![
            step(0, vec![1], None),
            step(1, vec![0], Some(0)),
        ];
        reconcile_parallelism(&mut steps, 2);
        assert!(steps[0].parallelizable_with.is_empty());
        assert!(steps[1].parallelizable_with.is_empty());
    }

    #[test]
    fn non_ancestor_pairs_stay_and_become_symmetric() {
        let mut steps = vec![step(0, vec![1], None), step(1, vec![], None)];
        reconcile_parallelism(&mut steps, 2);
        assert_eq!(steps[0].parallelizable_with, vec![1]);
        assert_eq!(steps[1].parallelizable_with, vec![0]);
    }

    #[test]
    fn partner_set_is_trimmed_to_the_configured_cap() {
        let mut steps = vec![
            step(0, vec![1, 2, 3], None),
            step(1, vec![0], None),
            step(2, vec![0], None),
            step(3, vec![0], None),
        ];
        reconcile_parallelism(&mut steps, 2);
        assert_eq!(steps[0].parallelizable_with.len(), 1);
    }
}

use chrono::Utc;
use twinraven_types::{CandidateChain, Event, MiningConfig, Outcome};

use crate::error::{Error, Result};
use crate::mining::prefixspan;
use crate::mining::sequence::{build_sequences, Sequence};

/// Discovers recurring tool-call chains in a set of events.
pub struct Miner;

impl Miner {
    /// Runs the configured mining algorithm over `events`, returning
    /// deduplicated, subsumption-filtered candidate chains.
    pub fn mine(events: &[Event], config: &MiningConfig) -> Result<Vec<CandidateChain>> {
        config
            .validate()
            .map_err(Error::InvalidMiningConfig)?;

        let filtered = filter_events(events, config);
        let sampled = apply_sample_rate(filtered, config.sample_rate);
        let sequences = build_sequences(&sampled, config);
        let tool_sequences: Vec<Vec<String>> = sequences.iter().map(|s| s.tools.clone()).collect();

        let patterns = prefixspan::mine(&tool_sequences, config.min_support, config.max_chain_length);
        let total = tool_sequences.len().max(1);

        let mut chains: Vec<CandidateChain> = Vec::new();
        for pattern in &patterns {
            let support = pattern.sequence_indices.len() as f64 / total as f64;
            let prefix_count = if pattern.tools.len() > 1 {
                count_containing(&tool_sequences, &pattern.tools[..pattern.tools.len() - 1])
            } else {
                total
            };
            let confidence = if prefix_count == 0 {
                0.0
            } else {
                pattern.sequence_indices.len() as f64 / prefix_count as f64
            };
            if confidence < config.min_confidence {
                continue;
            }

            let (avg_latency_ms, failure_rate, sample_event_ids) =
                summarize_matches(&sequences, pattern, config.max_sample_events.min(10));

            let chain = CandidateChain {
                tools: pattern.tools.clone(),
                support,
                confidence,
                avg_latency_ms,
                failure_rate,
                sample_event_ids,
                discovered_at: Utc::now(),
                mining_config: config.clone(),
            };
            chain.validate()?;
            chains.push(chain);
        }

        Ok(drop_subsumed(chains, config.subsumption_threshold))
    }
}

fn filter_events(events: &[Event], config: &MiningConfig) -> Vec<Event> {
    events
        .iter()
        .filter(|e| config.since.map(|s| e.timestamp >= s).unwrap_or(true))
        .filter(|e| config.until.map(|u| e.timestamp <= u).unwrap_or(true))
        .filter(|e| {
            config
                .session_ids
                .as_ref()
                .map(|ids| ids.iter().any(|id| id == &e.session_id))
                .unwrap_or(true)
        })
        .cloned()
        .collect()
}

/// Deterministically keeps a `sample_rate` fraction of sessions, selected by
/// a stable hash of the session id so repeated mining runs over the same
/// data are reproducible.
fn apply_sample_rate(events: Vec<Event>, sample_rate: f64) -> Vec<Event> {
    if sample_rate >= 1.0 {
        return events;
    }
    events
        .into_iter()
        .filter(|e| fnv1a(e.session_id.as_bytes()) as f64 / u64::MAX as f64 <= sample_rate)
        .collect()
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn count_containing(sequences: &[Vec<String>], prefix: &[String]) -> usize {
    sequences.iter().filter(|seq| contains_subsequence(seq, prefix)).count()
}

fn contains_subsequence(seq: &[String], sub: &[String]) -> bool {
    let mut cursor = 0;
    for item in seq {
        if cursor < sub.len() && item == &sub[cursor] {
            cursor += 1;
        }
    }
    cursor == sub.len()
}

/// `failure_rate` is the fraction of matched sequences in which the pattern's
/// steps include at least one non-success outcome, not the fraction of
/// individual matched events — a chain with a 100%-reliable first step and an
/// unreliable last step should read as unreliable, not diluted by the steps
/// that never fail.
fn summarize_matches(
    sequences: &[Sequence],
    pattern: &prefixspan::Pattern,
    max_samples: usize,
) -> (f64, f64, Vec<twinraven_types::EventId>) {
    let mut latencies = Vec::new();
    let mut sample_ids = Vec::new();
    let mut matched_sequences = 0usize;
    let mut failed_sequences = 0usize;

    for &idx in &pattern.sequence_indices {
        let sequence = &sequences[idx];
        let matched_events = pick_matching_events(sequence, &pattern.tools);
        matched_sequences += 1;
        let mut sequence_failed = false;
        for event in matched_events {
            latencies.push(event.latency_ms as f64);
            if event.outcome != Outcome::Success {
                sequence_failed = true;
            }
            if sample_ids.len() < max_samples {
                sample_ids.push(event.id);
            }
        }
        if sequence_failed {
            failed_sequences += 1;
        }
    }

    let avg_latency_ms = if latencies.is_empty() {
        0.0
    } else {
        latencies.iter().sum::<f64>() / latencies.len() as f64
    };
    let failure_rate = if matched_sequences == 0 {
        0.0
    } else {
        failed_sequences as f64 / matched_sequences as f64
    };

    (avg_latency_ms, failure_rate, sample_ids)
}

fn pick_matching_events<'a>(sequence: &'a Sequence, pattern: &[String]) -> Vec<&'a Event> {
    let mut cursor = 0;
    let mut matched = Vec::new();
    for event in &sequence.events {
        if cursor < pattern.len() && event.tool_id == pattern[cursor] {
            matched.push(event);
            cursor += 1;
        }
    }
    matched
}

/// Relative support difference against the longer chain's own support, per
/// `|supp(A) - supp(B)| / supp(B)` with `B` the longer (subsuming) chain.
fn relative_support_diff(longer_support: f64, shorter_support: f64) -> f64 {
    if longer_support <= f64::EPSILON {
        return 0.0;
    }
    (longer_support - shorter_support).abs() / longer_support
}

fn drop_subsumed(mut chains: Vec<CandidateChain>, threshold: f64) -> Vec<CandidateChain> {
    chains.sort_by(|a, b| b.tools.len().cmp(&a.tools.len()));
    let mut kept: Vec<CandidateChain> = Vec::new();

    'outer: for chain in chains {
        for existing in &kept {
            if existing.tools.len() > chain.tools.len()
                && contains_subsequence(&existing.tools, &chain.tools)
                && relative_support_diff(existing.support, chain.support) <= threshold
            {
                continue 'outer;
            }
        }
        kept.push(chain);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use twinraven_types::{EventId, InputHash};

    fn event(session: &str, tool: &str, offset_secs: i64, outcome: Outcome) -> Event {
        Event {
            id: EventId::new(),
            session_id: session.to_string(),
            tool_id: tool.to_string(),
            input_hash: InputHash(1),
            input_params: Value::Null,
            output_summary: None,
            predecessor: None,
            successor: None,
            timestamp: Utc::now() + chrono::Duration::seconds(offset_secs),
            latency_ms: 50,
            outcome,
            tags: vec![],
        }
    }

    #[test]
    fn discovers_a_recurring_two_step_chain() {
        let mut events = Vec::new();
        for i in 0..5 {
            events.push(event(&format!("s{}", i), "search", 0, Outcome::Success));
            events.push(event(&format!("s{}", i), "read", 1, Outcome::Success));
        }
        let config = MiningConfig {
            min_support: 0.5,
            min_confidence: 0.5,
            ..Default::default()
        };
        let chains = Miner::mine(&events, &config).unwrap();
        assert!(chains.iter().any(|c| c.tools == vec!["search", "read"]));
    }

    #[test]
    fn rejects_invalid_config_before_any_mining() {
        let config = MiningConfig {
            min_support: 5.0,
            ..Default::default()
        };
        let result = Miner::mine(&[], &config);
        assert!(matches!(result, Err(Error::InvalidMiningConfig(_))));
    }

    #[test]
    fn session_filter_excludes_other_sessions() {
        let events = vec![
            event("keep", "search", 0, Outcome::Success),
            event("keep", "read", 1, Outcome::Success),
            event("drop", "search", 0, Outcome::Success),
            event("drop", "read", 1, Outcome::Success),
        ];
        let config = MiningConfig {
            session_ids: Some(vec!["keep".to_string()]),
            min_support: 0.5,
            ..Default::default()
        };
        let chains = Miner::mine(&events, &config).unwrap();
        assert!(chains.iter().all(|c| c.sample_event_ids.len() <= 10));
    }
}

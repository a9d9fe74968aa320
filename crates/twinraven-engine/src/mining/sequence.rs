use std::collections::HashMap;

use twinraven_types::{Event, MiningConfig};

/// One ordered run of tool ids observed within a single time-window bucket of
/// a session, together with the events that produced it.
pub struct Sequence {
    pub session_id: String,
    pub tools: Vec<String>,
    pub events: Vec<Event>,
}

/// Groups events by session, splits each session into sub-sequences whenever
/// the gap between consecutive events exceeds `time_window_seconds`, and
/// (when `collapse_repeats` is set) collapses consecutive repeats of the same
/// tool into a single step.
pub fn build_sequences(events: &[Event], config: &MiningConfig) -> Vec<Sequence> {
    let mut by_session: HashMap<&str, Vec<&Event>> = HashMap::new();
    for event in events {
        by_session.entry(event.session_id.as_str()).or_default().push(event);
    }

    let mut sequences = Vec::new();
    for (session_id, mut session_events) in by_session {
        session_events.sort_by_key(|e| e.timestamp);

        let mut bucket: Vec<&Event> = Vec::new();
        let mut last_ts = None;

        for event in session_events {
            if let Some(prev) = last_ts {
                let gap = (event.timestamp - prev).num_seconds();
                if gap > config.time_window_seconds as i64 {
                    flush_bucket(session_id, &mut bucket, config, &mut sequences);
                }
            }
            last_ts = Some(event.timestamp);
            bucket.push(event);
        }
        flush_bucket(session_id, &mut bucket, config, &mut sequences);
    }

    sequences
}

fn flush_bucket<'a>(
    session_id: &str,
    bucket: &mut Vec<&'a Event>,
    config: &MiningConfig,
    out: &mut Vec<Sequence>,
) {
    if bucket.is_empty() {
        return;
    }
    let mut tools = Vec::new();
    let mut events = Vec::new();
    for event in bucket.drain(..) {
        if config.collapse_repeats {
            if tools.last().map(|t: &String| t == &event.tool_id).unwrap_or(false) {
                continue;
            }
        }
        tools.push(event.tool_id.clone());
        events.push(event.clone());
    }
    out.push(Sequence {
        session_id: session_id.to_string(),
        tools,
        events,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::Value;
    use twinraven_types::{EventId, InputHash, Outcome};

    fn event(session: &str, tool: &str, offset_secs: i64) -> Event {
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
            latency_ms: 10,
            outcome: Outcome::Success,
            tags: vec![],
        }
    }

    #[test]
    fn splits_on_time_gap() {
        let config = MiningConfig {
            time_window_seconds: 60,
            ..Default::default()
        };
        let events = vec![
            event("s1", "search", 0),
            event("s1", "read", 10),
            event("s1", "summarize", 1000),
        ];
        let sequences = build_sequences(&events, &config);
        assert_eq!(sequences.len(), 2);
    }

    #[test]
    fn collapses_consecutive_repeats() {
        let config = MiningConfig {
            collapse_repeats: true,
            ..Default::default()
        };
        let events = vec![event("s1", "search", 0), event("s1", "search", 1), event("s1", "read", 2)];
        let sequences = build_sequences(&events, &config);
        assert_eq!(sequences[0].tools, vec!["search", "read"]);
    }
}
